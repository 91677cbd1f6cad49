//! CLI command definitions and handlers

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod args;
pub mod context;
pub mod deploy;
pub mod package;
pub mod spinner;
pub mod status;
pub mod wizard;
pub mod workspace;

pub use args::{OutputFormat, RepoArgs};
pub use context::CommandContext;

/// repodeploy - fetch deployment packages from GitHub and run them through
/// the build/deploy toolkit
#[derive(Parser, Debug)]
#[command(name = "repodeploy")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (pretty, table, json)
    #[arg(
        long,
        global = true,
        env = "REPODEPLOY_FORMAT",
        default_value = "pretty",
        hide_env = true,
        hide_possible_values = true
    )]
    pub format: OutputFormat,

    /// Override config file location
    #[arg(long, global = true, env = "REPODEPLOY_CONFIG", hide_env = true)]
    pub config: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true, env = "REPODEPLOY_DEBUG", hide_env = true)]
    pub debug: bool,

    /// GitHub token (raises the API quota to 5000 calls/hour)
    #[arg(
        long,
        global = true,
        env = "GITHUB_TOKEN",
        hide_env_values = true
    )]
    pub token: Option<String>,

    /// GitHub API base URL (GitHub Enterprise or testing)
    #[arg(long, global = true, env = "REPODEPLOY_API_HOST", hide_env = true)]
    pub api_host: Option<String>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download a package and summarize it
    Fetch {
        #[command(flatten)]
        repo: RepoArgs,

        /// Also write the package to the workspace directory
        #[arg(long)]
        extract: bool,
    },

    /// List the configurations a package provides
    Configs {
        #[command(flatten)]
        repo: RepoArgs,
    },

    /// Show the README for one configuration
    Readme {
        #[command(flatten)]
        repo: RepoArgs,

        /// Configuration name, as in config.<ENV>.yaml
        #[arg(long, short = 'e')]
        env: String,
    },

    /// List branches of a repository
    Branches {
        #[command(flatten)]
        repo: RepoArgs,
    },

    /// Build a configuration with the toolkit
    Build {
        #[command(flatten)]
        repo: RepoArgs,

        /// Configuration name, as in config.<ENV>.yaml
        #[arg(long, short = 'e')]
        env: String,

        /// `.env` file with toolkit variables, layered over toolkit.env
        #[arg(long, value_name = "PATH")]
        env_file: Option<PathBuf>,
    },

    /// Deploy a configuration with the toolkit
    Deploy {
        #[command(flatten)]
        repo: RepoArgs,

        /// Configuration name, as in config.<ENV>.yaml
        #[arg(long, short = 'e')]
        env: String,

        /// Validate without applying changes
        #[arg(long)]
        dry_run: bool,

        /// Build first and deploy only if the build succeeds
        #[arg(long)]
        build: bool,

        /// `.env` file with toolkit variables, layered over toolkit.env
        #[arg(long, value_name = "PATH")]
        env_file: Option<PathBuf>,
    },

    /// Query GitHub for the current API quota
    ApiStatus,

    /// Show configuration, token and toolkit status
    Status,

    /// Manage extracted packages on disk
    #[command(subcommand)]
    Workspace(WorkspaceCommands),

    /// Interactive download / select / build & deploy wizard
    Wizard {
        /// `.env` file with toolkit variables, layered over toolkit.env
        #[arg(long, value_name = "PATH")]
        env_file: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

/// Workspace management subcommands
#[derive(Subcommand, Debug)]
pub enum WorkspaceCommands {
    /// Show workspace statistics
    Status,

    /// Remove all extracted packages
    Clear,

    /// Print the workspace directory
    Path,
}
