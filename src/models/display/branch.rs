//! Branch display model

use serde::Serialize;
use tabled::Tabled;

#[derive(Debug, Clone, Tabled, Serialize)]
pub struct BranchDisplay {
    #[tabled(rename = "BRANCH")]
    pub name: String,
}

impl From<String> for BranchDisplay {
    fn from(name: String) -> Self {
        Self { name }
    }
}
