//! repodeploy - fetch deployment packages from GitHub and drive the
//! build/deploy toolkit

use clap::Parser;
use colored::Colorize;
use log::LevelFilter;

mod cache;
mod cli;
mod client;
mod config;
mod error;
mod fetch;
mod models;
mod output;
mod package;
mod toolkit;
mod workflow;

use cli::args::GlobalOptions;
use cli::{Cli, Commands, WorkspaceCommands};
use error::Result;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{} {}", "Error:".red().bold(), err);
        if let Some(hint) = err.hint() {
            eprintln!("  {} {}", "→".dimmed(), hint);
        }
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let opts = GlobalOptions::from_cli(&cli);

    match cli.command {
        Commands::Fetch { repo, extract } => cli::package::fetch(&opts, &repo, extract).await,
        Commands::Configs { repo } => cli::package::configs(&opts, &repo).await,
        Commands::Readme { repo, env } => cli::package::readme(&opts, &repo, &env).await,
        Commands::Branches { repo } => cli::package::branches(&opts, &repo).await,
        Commands::Build {
            repo,
            env,
            env_file,
        } => cli::deploy::build(&opts, &repo, &env, env_file.as_deref()).await,
        Commands::Deploy {
            repo,
            env,
            dry_run,
            build,
            env_file,
        } => cli::deploy::deploy(&opts, &repo, &env, dry_run, build, env_file.as_deref()).await,
        Commands::ApiStatus => cli::status::api(&opts).await,
        Commands::Status => cli::status::run(&opts).await,
        Commands::Workspace(cmd) => match cmd {
            WorkspaceCommands::Status => cli::workspace::status(&opts),
            WorkspaceCommands::Clear => cli::workspace::clear(&opts),
            WorkspaceCommands::Path => cli::workspace::path(&opts),
        },
        Commands::Wizard { env_file } => cli::wizard::run(&opts, env_file.as_deref()).await,
        Commands::Version => {
            println!("repodeploy version {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Warnings by default, debug with `--debug`; `RUST_LOG` refines either.
fn init_logging(debug: bool) {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_env("RUST_LOG")
        .format_timestamp(None)
        .init();
}
