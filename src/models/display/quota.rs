//! GitHub quota display model

use chrono::Utc;
use serde::Serialize;
use tabled::Tabled;

use crate::client::QuotaState;
use crate::output::formatters::format_reset;

#[derive(Debug, Clone, Tabled, Serialize)]
pub struct QuotaDisplay {
    #[tabled(rename = "REMAINING")]
    pub remaining: u32,

    #[tabled(rename = "LIMIT")]
    pub limit: u32,

    #[tabled(rename = "USED")]
    pub used: u32,

    #[tabled(rename = "RESETS")]
    pub resets: String,
}

impl From<&QuotaState> for QuotaDisplay {
    fn from(quota: &QuotaState) -> Self {
        Self {
            remaining: quota.remaining,
            limit: quota.limit,
            used: quota.limit.saturating_sub(quota.remaining),
            resets: format_reset(quota.reset_at, Utc::now()),
        }
    }
}
