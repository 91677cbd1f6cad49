//! GitHub API access
//!
//! The [`GitHubTransport`] trait is the seam between the fetch orchestrator
//! and HTTP: it performs one GET and hands back status, quota headers and
//! body without interpreting them. Only connection-level failures are errors.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::error::{ApiError, Result};

pub mod github;
#[cfg(test)]
pub mod mock;
pub mod models;
pub mod rate_limit;

pub use github::GitHubClient;
pub use rate_limit::{QuotaHeaders, QuotaState, RateLimiter, RetryPlan};

/// Raw response from the GitHub REST API
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub quota: QuotaHeaders,
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse response: {}", e)).into()
        })
    }

    /// GitHub's `message` field, falling back to the raw body
    pub fn message(&self) -> String {
        #[derive(serde::Deserialize)]
        struct ErrorBody {
            message: String,
        }

        serde_json::from_slice::<ErrorBody>(&self.body)
            .map(|b| b.message)
            .unwrap_or_else(|_| String::from_utf8_lossy(&self.body).trim().to_string())
    }
}

/// One HTTP GET against the API, relative to the configured base URL
#[async_trait]
pub trait GitHubTransport: Send + Sync {
    async fn get(&self, path: &str) -> Result<RawResponse>;
}

#[async_trait]
impl<T: GitHubTransport + ?Sized> GitHubTransport for Arc<T> {
    async fn get(&self, path: &str) -> Result<RawResponse> {
        (**self).get(path).await
    }
}
