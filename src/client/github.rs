//! reqwest-backed GitHub transport

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;

use super::{GitHubTransport, QuotaHeaders, RawResponse};
use crate::config::DEFAULT_API_HOST;
use crate::error::{ApiError, Result};

/// API version pinned in every request
const API_VERSION: &str = "2022-11-28";

/// GitHub REST API client
pub struct GitHubClient {
    http: HttpClient,
    base_url: String,
    token: Option<String>,
}

impl GitHubClient {
    /// Create a client against api.github.com
    pub fn new(token: Option<String>, timeout: Duration) -> Result<Self> {
        Self::with_base_url(token, timeout, DEFAULT_API_HOST)
    }

    /// Create a client against a custom API host (GitHub Enterprise, tests)
    pub fn with_base_url(token: Option<String>, timeout: Duration, base_url: &str) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .user_agent(concat!("repodeploy/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

#[async_trait]
impl GitHubTransport for GitHubClient {
    async fn get(&self, path: &str) -> Result<RawResponse> {
        let url = format!("{}{}", self.base_url, path);
        log::debug!("GET {}", url);

        let mut request = self
            .http
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await.map_err(ApiError::from)?;

        let status = response.status();
        let quota = QuotaHeaders::from_headers(response.headers());
        let body = response.bytes().await.map_err(ApiError::from)?.to_vec();

        log::debug!(
            "{} {} ({} bytes, quota remaining {:?})",
            status,
            path,
            body.len(),
            quota.remaining
        );

        Ok(RawResponse {
            status,
            quota,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = GitHubClient::new(Some("ghp_test".to_string()), Duration::from_secs(30));
        assert!(client.is_ok());
        assert!(client.unwrap().is_authenticated());
    }

    #[test]
    fn test_empty_token_is_anonymous() {
        let client = GitHubClient::new(Some(String::new()), Duration::from_secs(30)).unwrap();
        assert!(!client.is_authenticated());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client =
            GitHubClient::with_base_url(None, Duration::from_secs(5), "http://127.0.0.1:9/")
                .unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:9");
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Port 9 (discard) is essentially never listening on test hosts
        let client =
            GitHubClient::with_base_url(None, Duration::from_secs(5), "http://127.0.0.1:9")
                .unwrap();

        let result = client.get("/rate_limit").await;
        assert!(matches!(
            result,
            Err(crate::error::Error::Api(ApiError::Network(_)))
        ));
    }
}
