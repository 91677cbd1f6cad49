//! Fetch orchestrator
//!
//! Wraps a [`GitHubTransport`] with the session cache and the rate limiter.
//! A package fetch checks the cache first; on a miss it lists the tree and
//! downloads every blob, one gated call at a time, and caches the result
//! only when the whole download succeeded.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use reqwest::StatusCode;

use crate::cache::{CacheEntry, CacheKey, CacheStats, RepositoryCache};
use crate::client::models::{BlobResponse, Branch, RateLimitResponse, TreeEntry, TreeResponse};
use crate::client::rate_limit::Verdict;
use crate::client::{GitHubTransport, QuotaState, RateLimiter, RawResponse};
use crate::error::{ApiError, Result};
use crate::package::{PackageDescriptor, PackageSnapshot};

/// Cached, rate-limited access to packages hosted on GitHub
pub struct PackageFetcher<T: GitHubTransport> {
    transport: T,
    limiter: RateLimiter,
    cache: RepositoryCache,
    timeout: Option<Duration>,
}

impl<T: GitHubTransport> PackageFetcher<T> {
    pub fn new(transport: T, limiter: RateLimiter) -> Self {
        Self {
            transport,
            limiter,
            cache: RepositoryCache::new(),
            timeout: None,
        }
    }

    /// Bound each package fetch (including backoff waits) by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Fetch a package and describe it. Served from the cache when present.
    pub async fn fetch_package(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
    ) -> Result<PackageDescriptor> {
        let entry = self.snapshot(owner, repo, reference).await?;
        Ok(entry.descriptor())
    }

    /// The cached entry for a package, fetching it on a miss
    pub async fn snapshot(&self, owner: &str, repo: &str, reference: &str) -> Result<Arc<CacheEntry>> {
        let key = CacheKey::new(owner, repo, reference);

        if let Some(entry) = self.cache.get(&key) {
            debug!("Cache hit: {}", key);
            return Ok(entry);
        }

        debug!("Cache miss: {}", key);
        let payload = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.download(&key))
                .await
                .map_err(|_| ApiError::Timeout(limit))??,
            None => self.download(&key).await?,
        };

        info!("Fetched {} ({} files)", key, payload.len());
        Ok(self.cache.put(key, payload))
    }

    /// Current quota snapshot
    pub fn rate_limit_status(&self) -> QuotaState {
        self.limiter.status()
    }

    /// Forget every cached package
    pub fn clear_cache(&self) -> usize {
        let removed = self.cache.clear();
        debug!("Cleared {} cached packages", removed);
        removed
    }

    /// Drop the cache and download the package again
    pub async fn refresh(&self, owner: &str, repo: &str, reference: &str) -> Result<Arc<CacheEntry>> {
        self.clear_cache();
        self.snapshot(owner, repo, reference).await
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Branch names of a repository (not cached)
    pub async fn list_branches(&self, owner: &str, repo: &str) -> Result<Vec<String>> {
        let resp = self
            .call(&format!("/repos/{}/{}/branches?per_page=100", owner, repo))
            .await?;
        let branches: Vec<Branch> = resp.json()?;
        Ok(branches.into_iter().map(|b| b.name).collect())
    }

    /// Ask GitHub for the authoritative quota and adopt it
    pub async fn check_api_status(&self) -> Result<QuotaState> {
        let resp = self.call("/rate_limit").await?;
        let body: RateLimitResponse = resp.json()?;
        let quota = body.resources.core.to_quota()?;
        self.limiter.set_status(quota);
        Ok(quota)
    }

    async fn download(&self, key: &CacheKey) -> Result<PackageSnapshot> {
        let blobs = self.list_blobs(key).await?;
        debug!("{}: {} files to download", key, blobs.len());

        let mut files = BTreeMap::new();
        for entry in blobs {
            let blob: BlobResponse = self
                .call(&format!(
                    "/repos/{}/{}/git/blobs/{}",
                    key.owner, key.repo, entry.sha
                ))
                .await?
                .json()?;
            files.insert(entry.path, blob.decode()?);
        }

        Ok(PackageSnapshot::new(files))
    }

    /// Every blob of the package. GitHub cuts recursive listings of large
    /// trees short; those are completed one directory level at a time.
    async fn list_blobs(&self, key: &CacheKey) -> Result<Vec<TreeEntry>> {
        let tree: TreeResponse = self
            .call(&format!(
                "/repos/{}/{}/git/trees/{}?recursive=1",
                key.owner, key.repo, key.reference
            ))
            .await?
            .json()?;

        if !tree.truncated {
            return Ok(tree.tree.into_iter().filter(|e| e.is_blob()).collect());
        }

        warn!("Tree listing for {} was truncated, walking it level by level", key);
        let mut blobs = Vec::new();
        let mut pending = vec![(String::new(), tree.sha)];
        while let Some((prefix, sha)) = pending.pop() {
            let level: TreeResponse = self
                .call(&format!("/repos/{}/{}/git/trees/{}", key.owner, key.repo, sha))
                .await?
                .json()?;
            if level.truncated {
                return Err(ApiError::MalformedPackage(format!(
                    "directory '{}' of {} has too many entries to list",
                    prefix, key
                ))
                .into());
            }

            for entry in level.tree {
                let path = if prefix.is_empty() {
                    entry.path.clone()
                } else {
                    format!("{}/{}", prefix, entry.path)
                };
                if entry.is_blob() {
                    blobs.push(TreeEntry { path, ..entry });
                } else if entry.kind == "tree" {
                    pending.push((path, entry.sha));
                }
            }
        }
        Ok(blobs)
    }

    /// One logical call: gate, send, classify, and retry transient failures
    async fn call(&self, path: &str) -> Result<RawResponse> {
        loop {
            self.limiter.acquire().await?;

            // Connection failures propagate without retry
            let resp = self.transport.get(path).await?;

            // Only 403 bodies matter for classification
            let message = (resp.status == StatusCode::FORBIDDEN).then(|| resp.message());
            match self
                .limiter
                .record_response(resp.status, &resp.quota, message.as_deref())
            {
                Verdict::Done => return check_status(resp, path),
                Verdict::Retry(delay) => {
                    warn!(
                        "GitHub returned {} for {}, retrying in {}s",
                        resp.status,
                        path,
                        delay.as_secs()
                    );
                }
                Verdict::Exhausted { attempts, status } => {
                    warn!("Giving up on {} after {} attempts ({})", path, attempts, status);
                    return Err(self.limiter.exceeded(Some(status)).into());
                }
            }
        }
    }
}

/// Map non-transient statuses to errors
fn check_status(resp: RawResponse, path: &str) -> Result<RawResponse> {
    match resp.status {
        status if status.is_success() => Ok(resp),
        StatusCode::NOT_FOUND => Err(ApiError::NotFound(path.to_string()).into()),
        StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized.into()),
        StatusCode::FORBIDDEN => Err(ApiError::Forbidden(resp.message()).into()),
        status => Err(ApiError::InvalidResponse(format!(
            "Unexpected status {} for {}: {}",
            status,
            path,
            resp.message()
        ))
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::QuotaHeaders;
    use crate::client::mock::{MockClock, MockTransport, tree_path};
    use crate::client::rate_limit::{Clock, RetryPlan};
    use crate::error::Error;

    const DELAYS: [u64; 5] = [1, 2, 5, 10, 30];

    fn fetcher(
        mock: MockTransport,
        clock: &Arc<MockClock>,
        quota: QuotaState,
    ) -> (PackageFetcher<Arc<MockTransport>>, Arc<MockTransport>) {
        let mock = Arc::new(mock);
        let limiter = RateLimiter::new(
            quota,
            RetryPlan::new(DELAYS.iter().map(|s| Duration::from_secs(*s)).collect()),
        )
        .with_clock(clock.clone());
        (PackageFetcher::new(Arc::clone(&mock), limiter), mock)
    }

    fn full(clock: &MockClock) -> QuotaState {
        QuotaState::full(5000, clock.now())
    }

    fn widgets() -> MockTransport {
        MockTransport::new().with_package(
            "acme",
            "widgets",
            "main",
            &[
                ("config.dev.yaml", "environment: dev"),
                ("README.dev.md", "# Dev"),
                ("modules/x.sql", "select 1"),
            ],
        )
    }

    #[tokio::test]
    async fn test_fetch_package_builds_descriptor() {
        let clock = Arc::new(MockClock::new());
        let (fetcher, mock) = fetcher(widgets(), &clock, full(&clock));

        let desc = fetcher.fetch_package("acme", "widgets", "main").await.unwrap();

        assert_eq!(desc.name, "widgets");
        assert!(desc.has_config("dev"));
        assert_eq!(desc.readme_for("dev"), Some("# Dev"));
        // One tree listing + three blobs
        assert_eq!(mock.calls().len(), 4);
        assert_eq!(fetcher.rate_limit_status().remaining, 4996);
    }

    #[tokio::test]
    async fn test_second_fetch_served_from_cache() {
        let clock = Arc::new(MockClock::new());
        let (fetcher, mock) = fetcher(widgets(), &clock, full(&clock));

        let first = fetcher.fetch_package("acme", "widgets", "main").await.unwrap();
        let calls_after_first = mock.calls().len();
        let quota_after_first = fetcher.rate_limit_status();

        let second = fetcher.fetch_package("acme", "widgets", "main").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(mock.call_count(&tree_path("acme", "widgets", "main")), 1);
        assert_eq!(mock.calls().len(), calls_after_first);
        // Cache hits do not touch the limiter
        assert_eq!(fetcher.rate_limit_status(), quota_after_first);
    }

    #[tokio::test]
    async fn test_clear_cache_forces_refetch() {
        let clock = Arc::new(MockClock::new());
        let (fetcher, mock) = fetcher(widgets(), &clock, full(&clock));

        fetcher.fetch_package("acme", "widgets", "main").await.unwrap();
        assert_eq!(fetcher.clear_cache(), 1);
        fetcher.fetch_package("acme", "widgets", "main").await.unwrap();

        assert_eq!(mock.call_count(&tree_path("acme", "widgets", "main")), 2);
    }

    #[tokio::test]
    async fn test_quota_gate_scenario() {
        let clock = Arc::new(MockClock::new());
        let reset_at = clock.now() + chrono::Duration::seconds(3600);
        let quota = QuotaState {
            remaining: 2,
            limit: 60,
            reset_at,
        };
        let mock = MockTransport::new()
            .with_package("acme", "one", "main", &[])
            .with_package("acme", "two", "main", &[])
            .with_package("acme", "three", "main", &[]);
        let (fetcher, _mock) = fetcher(mock, &clock, quota);

        fetcher.fetch_package("acme", "one", "main").await.unwrap();
        assert_eq!(fetcher.rate_limit_status().remaining, 1);
        fetcher.fetch_package("acme", "two", "main").await.unwrap();
        assert_eq!(fetcher.rate_limit_status().remaining, 0);
        assert!(clock.sleeps().is_empty());

        fetcher.fetch_package("acme", "three", "main").await.unwrap();

        assert!(clock.now() >= reset_at);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(3600)]);
        assert_eq!(fetcher.rate_limit_status().remaining, 59);
    }

    #[tokio::test]
    async fn test_quota_gate_with_capped_wait_fails() {
        let clock = Arc::new(MockClock::new());
        let quota = QuotaState {
            remaining: 0,
            limit: 60,
            reset_at: clock.now() + chrono::Duration::seconds(3600),
        };
        let mock = Arc::new(MockTransport::new().with_package("acme", "one", "main", &[]));
        let limiter = RateLimiter::new(quota, RetryPlan::default())
            .with_clock(clock.clone())
            .with_max_quota_wait(Duration::from_secs(60));
        let fetcher = PackageFetcher::new(Arc::clone(&mock), limiter);

        let result = fetcher.fetch_package("acme", "one", "main").await;

        assert!(matches!(
            result,
            Err(Error::Api(ApiError::RateLimitExceeded { .. }))
        ));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_retries_429_with_planned_delays() {
        let clock = Arc::new(MockClock::new());
        let path = tree_path("acme", "widgets", "main");
        let mock = MockTransport::new()
            .with_status(&path, StatusCode::TOO_MANY_REQUESTS)
            .with_status(&path, StatusCode::TOO_MANY_REQUESTS)
            .with_status(&path, StatusCode::TOO_MANY_REQUESTS)
            .with_package("acme", "widgets", "main", &[("config.prod.yaml", "p")]);
        let (fetcher, mock) = fetcher(mock, &clock, full(&clock));

        let desc = fetcher.fetch_package("acme", "widgets", "main").await.unwrap();

        assert_eq!(
            clock.sleeps(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(5)
            ]
        );
        assert_eq!(mock.call_count(&path), 4);
        assert!(desc.has_config("prod"));
    }

    #[tokio::test]
    async fn test_exhausted_plan_is_rate_limit_exceeded() {
        let clock = Arc::new(MockClock::new());
        let path = tree_path("acme", "widgets", "main");
        let mock = MockTransport::new().with_status(&path, StatusCode::SERVICE_UNAVAILABLE);
        let (fetcher, mock) = fetcher(mock, &clock, full(&clock));

        let result = fetcher.fetch_package("acme", "widgets", "main").await;

        assert!(matches!(
            result,
            Err(Error::Api(ApiError::RateLimitExceeded {
                last_status: Some(503),
                ..
            }))
        ));
        assert_eq!(mock.call_count(&path), DELAYS.len());
        let sleeps = clock.sleeps();
        assert!(sleeps.windows(2).all(|w| w[1] >= w[0]));

        // Nothing cached: the next attempt goes to the network again
        let _ = fetcher.fetch_package("acme", "widgets", "main").await;
        assert_eq!(mock.call_count(&path), DELAYS.len() * 2);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let clock = Arc::new(MockClock::new());
        let (fetcher, mock) = fetcher(MockTransport::new(), &clock, full(&clock));

        let result = fetcher.fetch_package("acme", "missing", "main").await;

        assert!(matches!(result, Err(Error::Api(ApiError::NotFound(_)))));
        assert_eq!(mock.calls().len(), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_network_error_propagates_immediately() {
        let clock = Arc::new(MockClock::new());
        let path = tree_path("acme", "widgets", "main");
        let mock = MockTransport::new().with_network_error(&path, "connection refused");
        let (fetcher, mock) = fetcher(mock, &clock, full(&clock));

        let result = fetcher.fetch_package("acme", "widgets", "main").await;

        assert!(matches!(result, Err(Error::Api(ApiError::Network(_)))));
        assert_eq!(mock.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_blob_leaves_cache_empty() {
        let clock = Arc::new(MockClock::new());
        let tree = r#"{"sha": "r", "tree": [{"path": "config.dev.yaml", "type": "blob", "sha": "gone"}]}"#;
        let mock = MockTransport::new().with_json(
            &tree_path("acme", "widgets", "main"),
            StatusCode::OK,
            tree,
        );
        let (fetcher, _mock) = fetcher(mock, &clock, full(&clock));

        let result = fetcher.fetch_package("acme", "widgets", "main").await;

        assert!(matches!(result, Err(Error::Api(ApiError::NotFound(_)))));
        assert_eq!(fetcher.cache_stats().entries, 0);
    }

    #[tokio::test]
    async fn test_plain_forbidden_is_not_retried() {
        let clock = Arc::new(MockClock::new());
        let path = tree_path("acme", "secret", "main");
        let mock = MockTransport::new().with_json(
            &path,
            StatusCode::FORBIDDEN,
            r#"{"message": "Resource not accessible"}"#,
        );
        let (fetcher, mock) = fetcher(mock, &clock, full(&clock));

        let result = fetcher.fetch_package("acme", "secret", "main").await;

        match result {
            Err(Error::Api(ApiError::Forbidden(msg))) => assert!(msg.contains("not accessible")),
            other => panic!("Expected Forbidden, got {:?}", other),
        }
        assert_eq!(mock.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_headers_update_quota() {
        let clock = Arc::new(MockClock::new());
        let reset = (clock.now() + chrono::Duration::minutes(30)).timestamp();
        let mock = MockTransport::new().with_json_quota(
            "/repos/acme/widgets/branches?per_page=100",
            StatusCode::OK,
            r#"[{"name": "main"}, {"name": "dev", "protected": true}]"#,
            QuotaHeaders {
                remaining: Some(42),
                limit: Some(60),
                reset: Some(reset),
                retry_after: None,
            },
        );
        let (fetcher, _mock) = fetcher(mock, &clock, full(&clock));

        let branches = fetcher.list_branches("acme", "widgets").await.unwrap();

        assert_eq!(branches, vec!["main".to_string(), "dev".to_string()]);
        let status = fetcher.rate_limit_status();
        assert_eq!(status.remaining, 42);
        assert_eq!(status.limit, 60);
        assert_eq!(status.reset_at.timestamp(), reset);
    }

    #[tokio::test]
    async fn test_check_api_status_adopts_body_quota() {
        let clock = Arc::new(MockClock::new());
        let mock = MockTransport::new().with_json(
            "/rate_limit",
            StatusCode::OK,
            r#"{"resources": {"core": {"limit": 5000, "remaining": 4321, "reset": 1900000000, "used": 679}}}"#,
        );
        let (fetcher, _mock) = fetcher(mock, &clock, full(&clock));

        let quota = fetcher.check_api_status().await.unwrap();

        assert_eq!(quota.remaining, 4321);
        assert_eq!(fetcher.rate_limit_status(), quota);
    }

    #[tokio::test]
    async fn test_package_without_configs_is_empty_not_error() {
        let clock = Arc::new(MockClock::new());
        let mock = MockTransport::new().with_package("acme", "plain", "main", &[("README.md", "hi")]);
        let (fetcher, _mock) = fetcher(mock, &clock, full(&clock));

        let desc = fetcher.fetch_package("acme", "plain", "main").await.unwrap();

        assert!(desc.available_configs.is_empty());
        assert_eq!(fetcher.cache_stats().entries, 1);
    }

    /// Transport whose requests never complete
    struct Stalled;

    #[async_trait::async_trait]
    impl GitHubTransport for Stalled {
        async fn get(&self, _path: &str) -> Result<RawResponse> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_fetch_timeout_gives_up() {
        let clock = Arc::new(MockClock::new());
        let limiter = RateLimiter::new(full(&clock), RetryPlan::default()).with_clock(clock.clone());
        let fetcher = PackageFetcher::new(Stalled, limiter).with_timeout(Duration::from_millis(50));

        let result = fetcher.fetch_package("acme", "widgets", "main").await;

        assert!(matches!(result, Err(Error::Api(ApiError::Timeout(_)))));
        assert_eq!(fetcher.cache_stats().entries, 0);
    }

    #[tokio::test]
    async fn test_refresh_downloads_again() {
        let clock = Arc::new(MockClock::new());
        let (fetcher, mock) = fetcher(widgets(), &clock, full(&clock));

        fetcher.snapshot("acme", "widgets", "main").await.unwrap();
        let entry = fetcher.refresh("acme", "widgets", "main").await.unwrap();

        assert!(entry.payload.get("config.dev.yaml").is_some());
        assert_eq!(mock.call_count(&tree_path("acme", "widgets", "main")), 2);
        assert_eq!(fetcher.cache_stats().entries, 1);
    }

    #[tokio::test]
    async fn test_secondary_rate_limit_is_retried() {
        let clock = Arc::new(MockClock::new());
        let path = tree_path("acme", "widgets", "main");
        let mock = MockTransport::new()
            .with_json_quota(
                &path,
                StatusCode::FORBIDDEN,
                r#"{"message": "You have exceeded a secondary rate limit. Please wait a few minutes before you try again."}"#,
                QuotaHeaders {
                    remaining: Some(4990),
                    limit: Some(5000),
                    reset: None,
                    retry_after: Some(60),
                },
            )
            .with_package("acme", "widgets", "main", &[("config.dev.yaml", "x")]);
        let (fetcher, mock) = fetcher(mock, &clock, full(&clock));

        let desc = fetcher.fetch_package("acme", "widgets", "main").await.unwrap();

        assert!(desc.has_config("dev"));
        assert_eq!(mock.call_count(&path), 2);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(60)]);
    }

    #[tokio::test]
    async fn test_truncated_tree_is_walked_per_directory() {
        let clock = Arc::new(MockClock::new());
        let blob = |text: &str| {
            format!(
                r#"{{"content": "{}", "encoding": "base64"}}"#,
                base64::Engine::encode(&base64::engine::general_purpose::STANDARD, text)
            )
        };
        let mock = MockTransport::new()
            .with_json(
                &tree_path("acme", "big", "main"),
                StatusCode::OK,
                r#"{"sha": "root", "tree": [{"path": "config.dev.yaml", "type": "blob", "sha": "b1"}], "truncated": true}"#,
            )
            .with_json(
                "/repos/acme/big/git/trees/root",
                StatusCode::OK,
                r#"{"sha": "root", "tree": [
                    {"path": "config.dev.yaml", "type": "blob", "sha": "b1"},
                    {"path": "docs", "type": "tree", "sha": "t1"}
                ], "truncated": false}"#,
            )
            .with_json(
                "/repos/acme/big/git/trees/t1",
                StatusCode::OK,
                r#"{"sha": "t1", "tree": [{"path": "README.dev.md", "type": "blob", "sha": "b2"}], "truncated": false}"#,
            )
            .with_json("/repos/acme/big/git/blobs/b1", StatusCode::OK, &blob("env: dev"))
            .with_json("/repos/acme/big/git/blobs/b2", StatusCode::OK, &blob("Dev docs"));
        let (fetcher, _mock) = fetcher(mock, &clock, full(&clock));

        let entry = fetcher.snapshot("acme", "big", "main").await.unwrap();

        assert_eq!(entry.payload.len(), 2);
        assert_eq!(entry.payload.get("docs/README.dev.md"), Some(&b"Dev docs"[..]));
        assert_eq!(entry.descriptor().readme_for("dev"), Some("Dev docs"));
    }

    #[tokio::test]
    async fn test_unlistable_truncated_tree_is_not_cached() {
        let clock = Arc::new(MockClock::new());
        let truncated = r#"{"sha": "root", "tree": [], "truncated": true}"#;
        let mock = MockTransport::new()
            .with_json(&tree_path("acme", "big", "main"), StatusCode::OK, truncated)
            .with_json("/repos/acme/big/git/trees/root", StatusCode::OK, truncated);
        let (fetcher, _mock) = fetcher(mock, &clock, full(&clock));

        let result = fetcher.snapshot("acme", "big", "main").await;

        assert!(matches!(
            result,
            Err(Error::Api(ApiError::MalformedPackage(_)))
        ));
        assert_eq!(fetcher.cache_stats().entries, 0);
    }
}
