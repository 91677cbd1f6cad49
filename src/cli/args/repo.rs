//! Repository selection arguments

use std::fmt;
use std::str::FromStr;

use clap::Args;

use crate::config::Defaults;
use crate::error::{ConfigError, Error, Result};

/// Ref used when neither the command line nor the config names one
pub const DEFAULT_REF: &str = "main";

/// Repository and ref selection, shared by every package command
#[derive(Debug, Clone, Args, Default)]
pub struct RepoArgs {
    /// Repository as OWNER/NAME or a GitHub URL (defaults to defaults.repo)
    pub repo: Option<String>,

    /// Branch, tag or commit SHA (defaults to defaults.reference, then main)
    #[arg(long = "ref", short = 'r')]
    pub reference: Option<String>,
}

impl RepoArgs {
    /// Resolve against config defaults. A ref embedded in a `/tree/<ref>`
    /// URL wins over `defaults.reference` but not over `--ref`.
    pub fn resolve(&self, defaults: &Defaults) -> Result<(RepoRef, String)> {
        let raw = self
            .repo
            .as_deref()
            .or(defaults.repo.as_deref())
            .ok_or_else(|| {
                ConfigError::Invalid(
                    "No repository given. Pass OWNER/NAME or set defaults.repo in the config file."
                        .to_string(),
                )
            })?;
        let repo: RepoRef = raw.parse()?;

        let reference = self
            .reference
            .clone()
            .or_else(|| repo.reference.clone())
            .or_else(|| defaults.reference.clone())
            .unwrap_or_else(|| DEFAULT_REF.to_string());

        Ok((repo, reference))
    }
}

/// A GitHub repository coordinate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
    /// Ref taken from a `/tree/<ref>` URL
    pub reference: Option<String>,
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoRef {
    type Err = Error;

    /// Accepts `owner/name`, `github.com/owner/name`,
    /// `https://github.com/owner/name[.git][/tree/<ref>]` and
    /// `git@github.com:owner/name.git`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || -> Error {
            ConfigError::Invalid(format!(
                "Invalid repository '{}'. Expected OWNER/NAME or a GitHub URL.",
                s
            ))
            .into()
        };

        let trimmed = s.trim().trim_end_matches('/');
        let path = trimmed
            .strip_prefix("git@github.com:")
            .or_else(|| {
                let no_scheme = trimmed
                    .strip_prefix("https://")
                    .or_else(|| trimmed.strip_prefix("http://"))
                    .unwrap_or(trimmed);
                no_scheme
                    .strip_prefix("www.github.com/")
                    .or_else(|| no_scheme.strip_prefix("github.com/"))
            })
            .unwrap_or(trimmed);

        let mut parts = path.splitn(3, '/');
        let owner = parts.next().filter(|p| !p.is_empty()).ok_or_else(invalid)?;
        let name = parts
            .next()
            .map(|n| n.strip_suffix(".git").unwrap_or(n))
            .filter(|n| !n.is_empty())
            .ok_or_else(invalid)?;

        let reference = match parts.next() {
            None => None,
            Some(rest) => match rest.strip_prefix("tree/") {
                Some(r) if !r.is_empty() => Some(r.to_string()),
                _ => return Err(invalid()),
            },
        };

        if owner.contains(':') || owner.contains(' ') || name.contains(' ') {
            return Err(invalid());
        }

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
            reference,
        })
    }
}
