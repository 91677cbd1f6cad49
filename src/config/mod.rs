//! Configuration management for repodeploy

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::client::rate_limit::DEFAULT_RETRY_DELAYS;
use crate::error::{ConfigError, Result};

/// Default GitHub REST API host
pub const DEFAULT_API_HOST: &str = "https://api.github.com";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// GitHub access settings
    #[serde(default)]
    pub github: GitHubSettings,

    /// External build/deploy tool settings
    #[serde(default)]
    pub toolkit: ToolkitSettings,

    /// Where fetched packages are extracted (defaults to the user cache dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_dir: Option<PathBuf>,

    /// Defaults used by the wizard
    #[serde(default)]
    pub defaults: Defaults,
}

/// GitHub API client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubSettings {
    /// Personal access token (raises the quota from 60 to 5000 calls/hour)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// API base URL
    #[serde(default = "default_api_host")]
    pub api_host: String,

    /// Per-request HTTP timeout
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Upper bound on a whole package fetch (unbounded when absent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_timeout_secs: Option<u64>,

    /// Minimum spacing between API calls; 0 disables pacing
    #[serde(default = "default_min_interval")]
    pub min_interval_ms: u64,

    /// Backoff delays applied after 429/5xx responses
    #[serde(default = "default_retry_delays")]
    pub retry_delays_secs: Vec<u64>,

    /// Fail instead of waiting longer than this for the quota to reset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_quota_wait_secs: Option<u64>,
}

/// External toolkit settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolkitSettings {
    /// Program to invoke
    #[serde(default = "default_toolkit_program")]
    pub program: String,

    /// Subprocess timeout
    #[serde(default = "default_toolkit_timeout")]
    pub timeout_secs: u64,

    /// Extra environment variables (credentials, project names)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

/// Wizard defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Defaults {
    /// Repository as `owner/name` or a GitHub URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,

    /// Branch, tag or commit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

fn default_api_host() -> String {
    DEFAULT_API_HOST.to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_min_interval() -> u64 {
    1000
}

fn default_retry_delays() -> Vec<u64> {
    DEFAULT_RETRY_DELAYS.to_vec()
}

fn default_toolkit_program() -> String {
    "cdf".to_string()
}

fn default_toolkit_timeout() -> u64 {
    300
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            token: None,
            api_host: default_api_host(),
            request_timeout_secs: default_request_timeout(),
            fetch_timeout_secs: None,
            min_interval_ms: default_min_interval(),
            retry_delays_secs: default_retry_delays(),
            max_quota_wait_secs: None,
        }
    }
}

impl Default for ToolkitSettings {
    fn default() -> Self {
        Self {
            program: default_toolkit_program(),
            timeout_secs: default_toolkit_timeout(),
            env: BTreeMap::new(),
        }
    }
}

impl GitHubSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_secs.map(Duration::from_secs)
    }

    pub fn min_interval(&self) -> Option<Duration> {
        (self.min_interval_ms > 0).then(|| Duration::from_millis(self.min_interval_ms))
    }

    pub fn retry_delays(&self) -> Vec<Duration> {
        self.retry_delays_secs
            .iter()
            .map(|s| Duration::from_secs(*s))
            .collect()
    }

    pub fn max_quota_wait(&self) -> Option<Duration> {
        self.max_quota_wait_secs.map(Duration::from_secs)
    }
}

impl ToolkitSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::Invalid(
            "Could not determine home directory".to_string(),
        ))?;

        Ok(home.join(".repodeploy").join("config.yaml"))
    }

    /// Resolve the config path from an optional override
    pub fn resolve_path(path: Option<&str>) -> Result<PathBuf> {
        match path {
            Some(p) => Ok(PathBuf::from(p)),
            None => Self::default_path(),
        }
    }

    /// Load configuration from an optional path.
    ///
    /// A missing default file yields the built-in defaults; a missing
    /// explicitly requested file is an error.
    pub fn load_at(path: Option<&str>) -> Result<Self> {
        let resolved = Self::resolve_path(path)?;
        if !resolved.exists() {
            if path.is_some() {
                return Err(ConfigError::NotFound(resolved.display().to_string()).into());
            }
            log::debug!("No config at {}, using defaults", resolved.display());
            return Ok(Self::default());
        }
        Self::load_from(resolved)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()).into());
        }

        let contents = std::fs::read_to_string(&path)?;
        let config: Config = serde_yaml::from_str(&contents).map_err(ConfigError::from)?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents =
            serde_yaml::to_string(self).map_err(|e| ConfigError::SaveError(e.to_string()))?;

        std::fs::write(&path, contents)?;

        // The file may hold a token
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&path)?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(&path, perms)?;
        }

        Ok(())
    }

    /// Apply CLI/environment overrides on top of the file values
    pub fn apply_overrides(&mut self, token: Option<&str>, api_host: Option<&str>) {
        if let Some(token) = token {
            self.github.token = Some(token.to_string());
        }
        if let Some(host) = api_host {
            self.github.api_host = host.trim_end_matches('/').to_string();
        }
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        if self.github.api_host.trim().is_empty() {
            return Err(ConfigError::Invalid("github.api_host must not be empty".to_string()).into());
        }
        if self.toolkit.program.trim().is_empty() {
            return Err(ConfigError::Invalid("toolkit.program must not be empty".to_string()).into());
        }
        if self.toolkit.timeout_secs == 0 {
            return Err(ConfigError::Invalid("toolkit.timeout_secs must be positive".to_string()).into());
        }
        Ok(())
    }
}
