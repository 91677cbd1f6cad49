//! Error types for repodeploy

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type alias for repodeploy operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the application
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Toolkit(#[from] ToolkitError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Interactive prompt error: {0}")]
    Dialoguer(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Operation failed: {0}")]
    Other(String),
}

impl From<dialoguer::Error> for Error {
    fn from(err: dialoguer::Error) -> Self {
        Error::Dialoguer(err.to_string())
    }
}

impl Error {
    /// Suggested follow-up for the user, if the error has an obvious one.
    pub fn hint(&self) -> Option<String> {
        match self {
            Error::Api(api) => api.hint(),
            Error::Toolkit(ToolkitError::NotFound(program)) => Some(format!(
                "Install the toolkit so that `{}` is on PATH, or set toolkit.program in the config file.",
                program
            )),
            Error::Config(ConfigError::NotFound(_)) => {
                Some("Create the file or drop --config to use defaults.".to_string())
            }
            Error::Config(ConfigError::MissingEnvVars(_)) => Some(
                "Add the variables to the --env-file or to toolkit.env in the config file.".to_string(),
            ),
            _ => None,
        }
    }
}

/// GitHub API errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{}", exceeded_message(.remaining, .limit, .reset_at, .last_status))]
    RateLimitExceeded {
        remaining: u32,
        limit: u32,
        reset_at: DateTime<Utc>,
        /// HTTP status of the last attempt, when retries ran out
        last_status: Option<u16>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication failed. Check the GitHub token.")]
    Unauthorized,

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    #[error("Malformed package: {0}")]
    MalformedPackage(String),

    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),
}

impl ApiError {
    /// Actionable message for errors the user can do something about.
    pub fn hint(&self) -> Option<String> {
        match self {
            ApiError::RateLimitExceeded {
                last_status: Some(status),
                ..
            } if *status >= 500 => Some(format!(
                "GitHub kept answering HTTP {}. This is on GitHub's side; retry in a few minutes.",
                status
            )),
            ApiError::RateLimitExceeded { reset_at, .. } => {
                let wait = reset_at.signed_duration_since(Utc::now());
                let minutes = wait.num_minutes().max(0) + 1;
                Some(format!(
                    "Wait about {} minute(s) and retry, or configure a GitHub token for a higher quota. \
                     Run `repodeploy api-status` to check the current quota.",
                    minutes
                ))
            }
            ApiError::NotFound(_) => {
                Some("Check the repository owner, name and ref. Private repositories need a token.".to_string())
            }
            ApiError::Forbidden(_) => Some(
                "This might be a private repository. Configure a token with read access.".to_string(),
            ),
            ApiError::Network(_) | ApiError::Timeout(_) => {
                Some("Check the network connection and retry.".to_string())
            }
            _ => None,
        }
    }
}

fn exceeded_message(
    remaining: &u32,
    limit: &u32,
    reset_at: &DateTime<Utc>,
    last_status: &Option<u16>,
) -> String {
    match last_status {
        Some(status) if *status >= 500 => format!(
            "GitHub API kept failing with HTTP {} and retries ran out ({}/{} calls left)",
            status, remaining, limit
        ),
        Some(status) => format!(
            "GitHub API rate limit exceeded (HTTP {}, {}/{} calls left, quota resets at {})",
            status, remaining, limit, reset_at
        ),
        None => format!(
            "GitHub API rate limit exceeded ({}/{} calls left, quota resets at {})",
            remaining, limit, reset_at
        ),
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Network("Request timed out".to_string())
        } else if err.is_connect() {
            ApiError::Network("Failed to connect to GitHub API".to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to save configuration: {0}")]
    SaveError(String),

    #[error("Failed to read environment file: {0}")]
    EnvFile(String),

    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingEnvVars(Vec<String>),
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Errors from running the external build/deploy tool
#[derive(Debug, Error)]
pub enum ToolkitError {
    #[error("Toolkit program `{0}` not found")]
    NotFound(String),

    #[error("Toolkit command `{command}` timed out after {timeout:?}")]
    TimedOut { command: String, timeout: Duration },

    #[error("Toolkit I/O error: {0}")]
    Io(String),
}

/// Wizard state machine errors
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Cannot {event} while in the {from} step")]
    InvalidTransition { from: String, event: String },

    #[error("Unknown configuration '{0}'")]
    UnknownConfig(String),
}
