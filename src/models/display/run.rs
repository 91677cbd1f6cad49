//! Toolkit run display model

use serde::Serialize;
use tabled::Tabled;

use crate::output::formatters::format_duration;
use crate::toolkit::RunOutput;

#[derive(Debug, Clone, Tabled, Serialize)]
pub struct RunDisplay {
    #[tabled(rename = "COMMAND")]
    pub command: String,

    #[tabled(rename = "STATUS")]
    pub status: String,

    #[tabled(rename = "EXIT")]
    pub exit_code: String,

    #[tabled(rename = "TIME")]
    pub duration: String,
}

impl From<&RunOutput> for RunDisplay {
    fn from(run: &RunOutput) -> Self {
        Self {
            command: run.command.clone(),
            status: if run.success { "ok" } else { "failed" }.to_string(),
            exit_code: run
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "--".to_string()),
            duration: format_duration(run.duration),
        }
    }
}
