//! JSON output formatting

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::client::QuotaState;

/// Wrapper for JSON output with metadata
#[derive(Debug, Serialize)]
pub struct JsonOutput<T> {
    /// The actual data
    pub data: T,

    /// Metadata about the response
    pub meta: Metadata,
}

/// Metadata included in JSON output
#[derive(Debug, Serialize)]
pub struct Metadata {
    /// Timestamp of the response
    pub timestamp: String,

    /// CLI version
    pub version: String,

    /// GitHub quota after the command's API calls, for commands that made any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota: Option<QuotaMeta>,
}

#[derive(Debug, Serialize)]
pub struct QuotaMeta {
    pub remaining: u32,
    pub limit: u32,
    pub reset_at: DateTime<Utc>,
}

impl From<&QuotaState> for QuotaMeta {
    fn from(q: &QuotaState) -> Self {
        Self {
            remaining: q.remaining,
            limit: q.limit,
            reset_at: q.reset_at,
        }
    }
}

impl<T> JsonOutput<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            meta: Metadata {
                timestamp: Utc::now().to_rfc3339(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                quota: None,
            },
        }
    }

    pub fn with_quota(mut self, quota: &QuotaState) -> Self {
        self.meta.quota = Some(quota.into());
        self
    }
}

/// Format data as pretty-printed JSON
pub fn format_json<T: Serialize + ?Sized>(data: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&JsonOutput::new(data))
}

/// Format data as pretty-printed JSON, reporting the quota in `meta`
pub fn format_json_with_quota<T: Serialize + ?Sized>(
    data: &T,
    quota: &QuotaState,
) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&JsonOutput::new(data).with_quota(quota))
}
