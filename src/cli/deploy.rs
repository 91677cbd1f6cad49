//! Build and deploy commands

use std::path::{Path, PathBuf};

use colored::Colorize;
use log::info;

use crate::cache::CacheEntry;
use crate::cli::args::GlobalOptions;
use crate::cli::{CommandContext, OutputFormat, RepoArgs, spinner};
use crate::error::{Error, Result, WorkflowError};
use crate::models::RunDisplay;
use crate::output::{self, formatters::format_duration};
use crate::package::Workspace;
use crate::toolkit::RunOutput;

use super::package::load;

/// Materialize a package and return the directory the toolkit runs in for
/// configuration `env`
pub(crate) fn prepare(workspace: &Workspace, entry: &CacheEntry, env: &str) -> Result<PathBuf> {
    let descriptor = entry.descriptor();
    let project = descriptor
        .project_dir(env)
        .ok_or_else(|| WorkflowError::UnknownConfig(env.to_string()))?;

    let root = workspace.materialize(&entry.key, &entry.payload)?;
    info!("Prepared {} for {} in {}", entry.key, env, root.display());
    Ok(if project.is_empty() {
        root
    } else {
        root.join(project)
    })
}

/// Run the build command
pub async fn build(
    opts: &GlobalOptions,
    args: &RepoArgs,
    env: &str,
    env_file: Option<&Path>,
) -> Result<()> {
    let ctx = CommandContext::new(opts)?.with_env_file(env_file)?;
    let entry = load(&ctx, args).await?;
    let dir = prepare(&ctx.workspace, &entry, env)?;

    let pb = spinner::start(format!("{} build --env {}", ctx.toolkit.program(), env), ctx.format);
    let result = ctx.toolkit.build(&dir, env).await;
    pb.finish_and_clear();

    finish(ctx.format, &[result?])
}

/// Run the deploy command
pub async fn deploy(
    opts: &GlobalOptions,
    args: &RepoArgs,
    env: &str,
    dry_run: bool,
    with_build: bool,
    env_file: Option<&Path>,
) -> Result<()> {
    let ctx = CommandContext::new(opts)?.with_env_file(env_file)?;
    let entry = load(&ctx, args).await?;
    let dir = prepare(&ctx.workspace, &entry, env)?;

    let pb = spinner::start(
        format!("{} deploy --env {}", ctx.toolkit.program(), env),
        ctx.format,
    );
    let runs = if with_build {
        ctx.toolkit
            .build_and_deploy(&dir, env, dry_run)
            .await
            .map(|(build, deploy)| std::iter::once(build).chain(deploy).collect::<Vec<_>>())
    } else {
        ctx.toolkit.deploy(&dir, env, dry_run).await.map(|run| vec![run])
    };
    pb.finish_and_clear();

    finish(ctx.format, &runs?)
}

/// Print toolkit runs and fail if any of them failed
pub(crate) fn finish(format: OutputFormat, runs: &[RunOutput]) -> Result<()> {
    print_runs(format, runs)?;

    match runs.iter().find(|r| !r.success) {
        Some(failed) => Err(Error::Other(format!(
            "`{}` exited with status {}",
            failed.command,
            failed
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        ))),
        None => Ok(()),
    }
}

pub(crate) fn print_runs(format: OutputFormat, runs: &[RunOutput]) -> Result<()> {
    match format {
        OutputFormat::Json => output::print_json(runs),
        OutputFormat::Table => {
            let rows: Vec<RunDisplay> = runs.iter().map(RunDisplay::from).collect();
            output::print(&rows, format)
        }
        OutputFormat::Pretty => {
            for run in runs {
                let mark = if run.success { "✓".green() } else { "✗".red() };
                println!(
                    "{} {} ({})",
                    mark,
                    run.command.bold(),
                    format_duration(run.duration)
                );
                if !run.stdout.trim().is_empty() {
                    println!("{}", run.stdout.trim_end());
                }
                if !run.stderr.trim().is_empty() {
                    eprintln!("{}", run.stderr.trim_end().dimmed());
                }
            }
            Ok(())
        }
    }
}
