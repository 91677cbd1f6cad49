//! External build/deploy toolkit
//!
//! Runs the toolkit program (`cdf` by default) inside a materialized package
//! and captures its output. Every invocation is bounded by a timeout; the
//! child is killed when the timeout fires.

pub mod env_file;

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use log::{debug, info};
use serde::Serialize;
use tokio::process::Command;

use crate::config::ToolkitSettings;
use crate::error::{ConfigError, ToolkitError};

const VERSION_TIMEOUT: Duration = Duration::from_secs(10);

/// Captured result of one toolkit invocation
#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    /// Command line as executed, for display
    pub command: String,
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    #[serde(serialize_with = "serialize_secs")]
    pub duration: Duration,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Invokes the toolkit program
#[derive(Debug, Clone)]
pub struct ToolkitRunner {
    program: String,
    timeout: Duration,
    env: BTreeMap<String, String>,
}

impl ToolkitRunner {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
            env: BTreeMap::new(),
        }
    }

    pub fn from_settings(settings: &ToolkitSettings) -> Self {
        Self::new(settings.program.clone(), settings.timeout()).with_env(settings.env.clone())
    }

    /// Extra environment passed to every invocation
    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Layer an env file over the configured environment. Fails when the
    /// result lacks a required toolkit variable.
    pub fn with_env_file(mut self, path: &Path) -> Result<Self, ConfigError> {
        self.env = env_file::merge(&self.env, path)?;
        Ok(self)
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// `<program> --version`, trimmed
    pub async fn version(&self) -> Result<String, ToolkitError> {
        let output = self.exec(None, &["--version"], VERSION_TIMEOUT).await?;
        let text = if output.stdout.trim().is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        Ok(text.trim().to_string())
    }

    pub async fn build(&self, dir: &Path, env: &str) -> Result<RunOutput, ToolkitError> {
        self.run(dir, &["build", "--env", env]).await
    }

    pub async fn deploy(&self, dir: &Path, env: &str, dry_run: bool) -> Result<RunOutput, ToolkitError> {
        let mut args = vec!["deploy", "--env", env];
        if dry_run {
            args.push("--dry-run");
        }
        self.run(dir, &args).await
    }

    /// Build, then deploy only if the build succeeded. The deploy output is
    /// `None` when it was skipped.
    pub async fn build_and_deploy(
        &self,
        dir: &Path,
        env: &str,
        dry_run: bool,
    ) -> Result<(RunOutput, Option<RunOutput>), ToolkitError> {
        let build = self.build(dir, env).await?;
        if !build.success {
            info!("Build failed, skipping deploy");
            return Ok((build, None));
        }
        let deploy = self.deploy(dir, env, dry_run).await?;
        Ok((build, Some(deploy)))
    }

    /// Run `<program> <args>` in `dir` with the configured timeout
    pub async fn run(&self, dir: &Path, args: &[&str]) -> Result<RunOutput, ToolkitError> {
        self.exec(Some(dir), args, self.timeout).await
    }

    async fn exec(
        &self,
        dir: Option<&Path>,
        args: &[&str],
        timeout: Duration,
    ) -> Result<RunOutput, ToolkitError> {
        let command = std::iter::once(self.program.as_str())
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");

        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }

        debug!("Running `{}`", command);
        let started = Instant::now();

        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
                return Err(ToolkitError::NotFound(self.program.clone()));
            }
            Ok(Err(e)) => return Err(ToolkitError::Io(e.to_string())),
            // Dropping the output future kills the child
            Err(_) => return Err(ToolkitError::TimedOut { command, timeout }),
        };

        let duration = started.elapsed();
        debug!(
            "`{}` exited with {:?} after {:.1}s",
            command,
            output.status.code(),
            duration.as_secs_f64()
        );

        Ok(RunOutput {
            command,
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration,
        })
    }
}
