//! Mock GitHub transport and virtual clock for testing
//!
//! Provides canned responses per request path, records every call, and a
//! clock whose `sleep` advances virtual time instantly.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Utc};
use reqwest::StatusCode;

use super::rate_limit::Clock;
use super::{GitHubTransport, QuotaHeaders, RawResponse};
use crate::error::{ApiError, Result};

/// One scripted reply
#[derive(Debug, Clone)]
pub enum MockReply {
    Response(RawResponse),
    NetworkError(String),
}

/// Mock transport for testing.
///
/// Replies are queued per path; the last reply for a path repeats once the
/// queue is down to one. Unknown paths answer 404.
///
/// # Example
/// ```ignore
/// let mock = MockTransport::new()
///     .with_package("acme", "widgets", "main", &[("config.dev.yaml", "x: 1")]);
/// ```
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, VecDeque<MockReply>>>,
    calls: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for a path
    pub fn with_reply(self, path: &str, reply: MockReply) -> Self {
        self.routes
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Queue a JSON response with no quota headers
    pub fn with_json(self, path: &str, status: StatusCode, body: &str) -> Self {
        self.with_reply(path, MockReply::Response(response(status, body, QuotaHeaders::default())))
    }

    /// Queue a JSON response carrying quota headers
    pub fn with_json_quota(
        self,
        path: &str,
        status: StatusCode,
        body: &str,
        quota: QuotaHeaders,
    ) -> Self {
        self.with_reply(path, MockReply::Response(response(status, body, quota)))
    }

    /// Queue a bare status (429, 5xx, ...)
    pub fn with_status(self, path: &str, status: StatusCode) -> Self {
        self.with_json(path, status, r#"{"message": "scripted failure"}"#)
    }

    pub fn with_network_error(self, path: &str, message: &str) -> Self {
        self.with_reply(path, MockReply::NetworkError(message.to_string()))
    }

    /// Register a tree listing plus one blob per file
    pub fn with_package(self, owner: &str, repo: &str, reference: &str, files: &[(&str, &str)]) -> Self {
        let entries: Vec<String> = files
            .iter()
            .enumerate()
            .map(|(i, (path, _))| {
                format!(
                    r#"{{"path": "{}", "type": "blob", "sha": "{}"}}"#,
                    path,
                    blob_sha(owner, repo, reference, i)
                )
            })
            .collect();
        let tree = format!(
            r#"{{"sha": "root", "tree": [{}], "truncated": false}}"#,
            entries.join(",")
        );

        let mut mock = self.with_json(&tree_path(owner, repo, reference), StatusCode::OK, &tree);
        for (i, (_, content)) in files.iter().enumerate() {
            let blob = format!(
                r#"{{"content": "{}", "encoding": "base64"}}"#,
                general_purpose::STANDARD.encode(content)
            );
            mock = mock.with_json(
                &format!("/repos/{}/{}/git/blobs/{}", owner, repo, blob_sha(owner, repo, reference, i)),
                StatusCode::OK,
                &blob,
            );
        }
        mock
    }

    /// All requested paths, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls whose path starts with `prefix`
    pub fn call_count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.starts_with(prefix))
            .count()
    }
}

/// Path of the recursive tree listing for a ref
pub fn tree_path(owner: &str, repo: &str, reference: &str) -> String {
    format!("/repos/{}/{}/git/trees/{}?recursive=1", owner, repo, reference)
}

fn blob_sha(owner: &str, repo: &str, reference: &str, index: usize) -> String {
    format!("{}-{}-{}-{}", owner, repo, reference, index)
}

fn response(status: StatusCode, body: &str, quota: QuotaHeaders) -> RawResponse {
    RawResponse {
        status,
        quota,
        body: body.as_bytes().to_vec(),
    }
}

#[async_trait]
impl GitHubTransport for MockTransport {
    async fn get(&self, path: &str) -> Result<RawResponse> {
        self.calls.lock().unwrap().push(path.to_string());

        let reply = {
            let mut routes = self.routes.lock().unwrap();
            match routes.get_mut(path) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match reply {
            Some(MockReply::Response(resp)) => Ok(resp),
            Some(MockReply::NetworkError(msg)) => Err(ApiError::Network(msg).into()),
            None => Ok(response(
                StatusCode::NOT_FOUND,
                r#"{"message": "Not Found"}"#,
                QuotaHeaders::default(),
            )),
        }
    }
}

/// Virtual clock: `sleep` records the duration and advances time.
pub struct MockClock {
    now: Mutex<DateTime<Utc>>,
    sleeps: Mutex<Vec<Duration>>,
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc::now()),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(by).unwrap();
    }

    /// Every sleep requested so far
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let mock = MockTransport::new();
        let resp = mock.get("/nope").await.unwrap();
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
        assert_eq!(mock.calls(), vec!["/nope".to_string()]);
    }

    #[tokio::test]
    async fn test_replies_drain_then_repeat_last() {
        let mock = MockTransport::new()
            .with_status("/x", StatusCode::TOO_MANY_REQUESTS)
            .with_json("/x", StatusCode::OK, "{}");

        assert_eq!(mock.get("/x").await.unwrap().status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(mock.get("/x").await.unwrap().status, StatusCode::OK);
        assert_eq!(mock.get("/x").await.unwrap().status, StatusCode::OK);
        assert_eq!(mock.call_count("/x"), 3);
    }

    #[tokio::test]
    async fn test_clock_sleep_advances_time() {
        let clock = MockClock::new();
        let start = clock.now();
        clock.sleep(Duration::from_secs(5)).await;

        assert_eq!(clock.now() - start, chrono::Duration::seconds(5));
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(5)]);
    }
}
