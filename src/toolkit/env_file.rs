//! `.env` files with toolkit credentials
//!
//! The toolkit reads its project and cluster from the environment. A file of
//! `KEY=VALUE` lines can supply them per invocation instead of the config.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::ConfigError;

/// Variables the toolkit cannot run without
pub const REQUIRED_VARS: [&str; 2] = ["CDF_PROJECT", "CDF_CLUSTER"];

/// Parse an env file. Comments, blank lines and quoting follow the usual
/// `.env` conventions.
pub fn load(path: &Path) -> Result<BTreeMap<String, String>, ConfigError> {
    let iter = dotenv::from_path_iter(path)
        .map_err(|e| ConfigError::EnvFile(format!("{}: {}", path.display(), e)))?;

    iter.map(|item| item.map_err(|e| ConfigError::EnvFile(format!("{}: {}", path.display(), e))))
        .collect()
}

/// Required variables that are absent or empty
pub fn missing_required(env: &BTreeMap<String, String>) -> Vec<String> {
    REQUIRED_VARS
        .iter()
        .filter(|name| env.get(**name).is_none_or(|v| v.trim().is_empty()))
        .map(|name| name.to_string())
        .collect()
}

/// Layer the file over `base` and check the result has what the toolkit needs
pub fn merge(
    base: &BTreeMap<String, String>,
    path: &Path,
) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut env = base.clone();
    let loaded = load(path)?;
    log::debug!("Loaded {} variables from {}", loaded.len(), path.display());
    env.extend(loaded);

    let missing = missing_required(&env);
    if !missing.is_empty() {
        return Err(ConfigError::MissingEnvVars(missing));
    }
    Ok(env)
}
