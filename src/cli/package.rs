//! Package commands: fetch, configs, readme, branches

use std::path::PathBuf;
use std::sync::Arc;

use colored::Colorize;
use log::debug;
use serde::Serialize;

use crate::cache::CacheEntry;
use crate::cli::args::GlobalOptions;
use crate::cli::{CommandContext, OutputFormat, RepoArgs, spinner};
use crate::error::{Result, WorkflowError};
use crate::models::{BranchDisplay, ConfigDisplay, PackageDisplay};
use crate::output::formatters::format_size;
use crate::output::{self, json, table};
use crate::package::PackageDescriptor;

/// JSON shape of `fetch`
#[derive(Debug, Serialize)]
struct FetchReport<'a> {
    owner: &'a str,
    repo: &'a str,
    reference: &'a str,
    files: Vec<&'a str>,
    size_bytes: usize,
    descriptor: PackageDescriptor,
    #[serde(skip_serializing_if = "Option::is_none")]
    extracted_to: Option<PathBuf>,
}

/// Fetch the package for `args`, with a spinner
pub(crate) async fn load(ctx: &CommandContext, args: &RepoArgs) -> Result<Arc<CacheEntry>> {
    let key = ctx.resolve(args)?;
    let pb = spinner::start(format!("Fetching {}", key), ctx.format);
    let result = ctx
        .fetcher
        .snapshot(&key.owner, &key.repo, &key.reference)
        .await;
    pb.finish_and_clear();
    result
}

/// Run the fetch command
pub async fn fetch(opts: &GlobalOptions, args: &RepoArgs, extract: bool) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let entry = load(&ctx, args).await?;

    let extracted_to = if extract {
        Some(ctx.workspace.materialize(&entry.key, &entry.payload)?)
    } else {
        None
    };

    match ctx.format {
        OutputFormat::Json => {
            let report = FetchReport {
                owner: &entry.key.owner,
                repo: &entry.key.repo,
                reference: &entry.key.reference,
                files: entry.payload.files().keys().map(String::as_str).collect(),
                size_bytes: entry.payload.size_bytes(),
                descriptor: entry.descriptor(),
                extracted_to,
            };
            println!(
                "{}",
                json::format_json_with_quota(&report, &ctx.fetcher.rate_limit_status())?
            );
        }
        OutputFormat::Table => {
            println!("{}", table::format_table(&[PackageDisplay::from(&*entry)]));
        }
        OutputFormat::Pretty => {
            let descriptor = entry.descriptor();
            println!(
                "{} Fetched {} ({} files, {})",
                "✓".green(),
                entry.key.to_string().bold(),
                entry.payload.len(),
                format_size(entry.payload.size_bytes() as u64)
            );
            if descriptor.available_configs.is_empty() {
                println!(
                    "{} No config.<name>.yaml files found in this package",
                    "⚠".yellow()
                );
            } else {
                let names: Vec<&str> = descriptor
                    .available_configs
                    .iter()
                    .map(String::as_str)
                    .collect();
                println!("  Configurations: {}", names.join(", ").cyan());
            }
            if let Some(dir) = extracted_to {
                println!("  Extracted to:   {}", dir.display());
            }
            print_quota_footer(&ctx);
        }
    }

    Ok(())
}

/// Run the configs command
pub async fn configs(opts: &GlobalOptions, args: &RepoArgs) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let entry = load(&ctx, args).await?;
    let descriptor = entry.descriptor();

    let rows = ConfigDisplay::rows(&descriptor);
    if ctx.format == OutputFormat::Pretty && rows.is_empty() {
        println!(
            "{} {} has no configurations (no config.<name>.yaml files)",
            "⚠".yellow(),
            entry.key
        );
        return Ok(());
    }
    output::print(&rows, ctx.format)
}

/// Run the readme command
pub async fn readme(opts: &GlobalOptions, args: &RepoArgs, env: &str) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let key = ctx.resolve(args)?;
    let pb = spinner::start(format!("Fetching {}", key), ctx.format);
    let result = ctx
        .fetcher
        .fetch_package(&key.owner, &key.repo, &key.reference)
        .await;
    pb.finish_and_clear();
    let descriptor = result?;

    if !descriptor.has_config(env) {
        return Err(WorkflowError::UnknownConfig(env.to_string()).into());
    }
    let text = descriptor.readme_for(env);

    match (ctx.format, text) {
        (OutputFormat::Json, text) => {
            #[derive(Serialize)]
            struct Readme<'a> {
                config: &'a str,
                readme: Option<&'a str>,
            }
            output::print_json(&Readme { config: env, readme: text })?;
        }
        (_, Some(text)) => println!("{}", text),
        (_, None) => {
            debug!("{} has no README for {}", key, env);
            println!("{} No README for configuration '{}'", "○".dimmed(), env);
        }
    }

    Ok(())
}

/// Run the branches command
pub async fn branches(opts: &GlobalOptions, args: &RepoArgs) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let (repo, _) = args.resolve(&ctx.config.defaults)?;

    let pb = spinner::start(format!("Listing branches of {}", repo), ctx.format);
    let result = ctx.fetcher.list_branches(&repo.owner, &repo.name).await;
    pb.finish_and_clear();

    let rows: Vec<BranchDisplay> = result?.into_iter().map(BranchDisplay::from).collect();
    output::print(&rows, ctx.format)
}

/// Quota line shown after pretty output of network commands
pub(crate) fn print_quota_footer(ctx: &CommandContext) {
    let quota = ctx.fetcher.rate_limit_status();
    let line = format!("  API quota:      {}/{} remaining", quota.remaining, quota.limit);
    if quota.remaining * 10 < quota.limit {
        println!("{}", line.yellow());
    } else {
        println!("{}", line.dimmed());
    }
}
