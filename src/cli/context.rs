//! Command execution context
//!
//! Loads the configuration, applies CLI overrides, and builds the GitHub
//! client, rate limiter, fetcher, workspace and toolkit runner that the
//! command handlers share.

use std::path::Path;

use chrono::Utc;
use log::debug;

use crate::cli::OutputFormat;
use crate::cli::args::{GlobalOptions, RepoArgs};
use crate::client::rate_limit::{AUTHENTICATED_LIMIT, UNAUTHENTICATED_LIMIT};
use crate::client::{GitHubClient, QuotaState, RateLimiter, RetryPlan};
use crate::cache::CacheKey;
use crate::config::Config;
use crate::error::Result;
use crate::fetch::PackageFetcher;
use crate::package::Workspace;
use crate::toolkit::ToolkitRunner;

/// Context for command execution containing config, clients and options.
pub struct CommandContext {
    /// Loaded configuration with CLI overrides applied
    pub config: Config,
    /// Cached, rate-limited package access
    pub fetcher: PackageFetcher<GitHubClient>,
    pub workspace: Workspace,
    pub toolkit: ToolkitRunner,
    pub format: OutputFormat,
}

impl CommandContext {
    /// Create a new command context.
    ///
    /// # Errors
    /// Returns error if the config cannot be loaded or is invalid, or the
    /// HTTP client cannot be built.
    pub fn new(opts: &GlobalOptions) -> Result<Self> {
        let mut config = Config::load_at(opts.config_ref())?;
        config.apply_overrides(opts.token_ref(), opts.api_host_ref());
        config.validate()?;

        let fetcher = build_fetcher(&config)?;

        let workspace = match &config.workspace_dir {
            Some(dir) => Workspace::new(dir.clone()),
            None => Workspace::new(Workspace::default_root()?),
        };

        let toolkit = ToolkitRunner::from_settings(&config.toolkit);

        Ok(Self {
            config,
            fetcher,
            workspace,
            toolkit,
            format: opts.format,
        })
    }

    /// Apply `--env-file` to the toolkit environment, if one was given
    pub fn with_env_file(mut self, path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            self.toolkit = self.toolkit.with_env_file(path)?;
        }
        Ok(self)
    }

    /// Resolve repository arguments against the config defaults
    pub fn resolve(&self, args: &RepoArgs) -> Result<CacheKey> {
        let (repo, reference) = args.resolve(&self.config.defaults)?;
        Ok(CacheKey::new(&repo.owner, &repo.name, &reference))
    }
}

/// Client, limiter and fetcher from the `github` config section
pub fn build_fetcher(config: &Config) -> Result<PackageFetcher<GitHubClient>> {
    let github = &config.github;
    let client = GitHubClient::with_base_url(
        github.token.clone(),
        github.request_timeout(),
        &github.api_host,
    )?;

    let limit = if client.is_authenticated() {
        AUTHENTICATED_LIMIT
    } else {
        UNAUTHENTICATED_LIMIT
    };
    debug!(
        "Using {} with an initial quota of {} calls",
        client.base_url(),
        limit
    );

    let mut limiter = RateLimiter::new(
        QuotaState::full(limit, Utc::now()),
        RetryPlan::new(github.retry_delays()),
    );
    if let Some(interval) = github.min_interval() {
        limiter = limiter.with_min_interval(interval);
    }
    if let Some(max) = github.max_quota_wait() {
        limiter = limiter.with_max_quota_wait(max);
    }

    let mut fetcher = PackageFetcher::new(client, limiter);
    if let Some(timeout) = github.fetch_timeout() {
        fetcher = fetcher.with_timeout(timeout);
    }
    Ok(fetcher)
}
