//! Status and api-status commands

use colored::Colorize;
use serde::Serialize;

use crate::cli::args::GlobalOptions;
use crate::cli::{CommandContext, OutputFormat, spinner};
use crate::client::QuotaState;
use crate::config::{Config, DEFAULT_API_HOST};
use crate::error::Result;
use crate::models::QuotaDisplay;
use crate::output::formatters::{format_reset, format_size};
use crate::output::{self, json, table};
use crate::package::WorkspaceStats;

#[derive(Debug, Serialize)]
struct StatusReport {
    config_path: String,
    config_found: bool,
    api_host: String,
    token_configured: bool,
    toolkit_program: String,
    toolkit_version: Option<String>,
    workspace_dir: String,
    workspace: WorkspaceStats,
}

/// Run the status command to display configuration status
pub async fn run(opts: &GlobalOptions) -> Result<()> {
    let config_path = Config::resolve_path(opts.config_ref())?;
    let ctx = CommandContext::new(opts)?;

    // A missing toolkit is reported, not fatal
    let toolkit_version = ctx.toolkit.version().await.ok();
    let workspace = ctx.workspace.stats()?;

    let report = StatusReport {
        config_path: config_path.display().to_string(),
        config_found: config_path.exists(),
        api_host: ctx.config.github.api_host.clone(),
        token_configured: ctx.config.github.token.is_some(),
        toolkit_program: ctx.toolkit.program().to_string(),
        toolkit_version,
        workspace_dir: ctx.workspace.root().display().to_string(),
        workspace,
    };

    match ctx.format {
        OutputFormat::Json => output::print_json(&report),
        OutputFormat::Table => {
            let fields = [
                ("Config file", report.config_path.clone()),
                ("Config found", report.config_found.to_string()),
                ("API host", report.api_host.clone()),
                ("Token", report.token_configured.to_string()),
                ("Toolkit", report.toolkit_program.clone()),
                (
                    "Toolkit version",
                    report.toolkit_version.clone().unwrap_or_else(|| "--".to_string()),
                ),
                ("Workspace", report.workspace_dir.clone()),
                ("Packages", report.workspace.packages.to_string()),
            ];
            println!("{}", table::format_fields(&fields));
            Ok(())
        }
        OutputFormat::Pretty => {
            print_pretty(&report);
            Ok(())
        }
    }
}

fn print_pretty(report: &StatusReport) {
    println!("{}\n", "repodeploy Status".bold());

    if report.config_found {
        println!("Config file: {}", report.config_path.cyan());
    } else {
        println!(
            "Config file: {} {}",
            report.config_path.cyan(),
            "(not found, using defaults)".dimmed()
        );
    }
    println!();

    if report.token_configured {
        println!("{} GitHub token configured (5000 calls/hour)", "✓".green());
    } else {
        println!(
            "{} No GitHub token (60 calls/hour, public repositories only)",
            "○".dimmed()
        );
        println!("  → Set GITHUB_TOKEN or github.token in the config file");
    }

    if report.api_host != DEFAULT_API_HOST {
        println!("{} Custom API host: {}", "○".dimmed(), report.api_host.cyan());
    }

    match &report.toolkit_version {
        Some(version) => println!(
            "{} Toolkit `{}` available ({})",
            "✓".green(),
            report.toolkit_program,
            version
        ),
        None => {
            println!(
                "{} Toolkit `{}` not found",
                "✗".red(),
                report.toolkit_program
            );
            println!("  → Install it or set toolkit.program in the config file");
        }
    }

    println!(
        "{} Workspace: {} ({} packages, {})",
        "○".dimmed(),
        report.workspace_dir,
        report.workspace.packages,
        format_size(report.workspace.total_size_bytes)
    );
    println!();
}

/// Run the api-status command: ask GitHub for the authoritative quota
pub async fn api(opts: &GlobalOptions) -> Result<()> {
    let ctx = CommandContext::new(opts)?;

    let pb = spinner::start("Checking GitHub API quota", ctx.format);
    let result = ctx.fetcher.check_api_status().await;
    pb.finish_and_clear();
    let quota = result?;

    match ctx.format {
        OutputFormat::Json => {
            println!("{}", json::format_json_with_quota(&QuotaDisplay::from(&quota), &quota)?);
        }
        OutputFormat::Table => output::print(&vec![QuotaDisplay::from(&quota)], ctx.format)?,
        OutputFormat::Pretty => print_quota(&quota, ctx.config.github.token.is_some()),
    }

    Ok(())
}

pub(crate) fn print_quota(quota: &QuotaState, authenticated: bool) {
    println!("{}\n", "GitHub API Quota".bold());

    let counts = format!("{}/{}", quota.remaining, quota.limit);
    let mark = if quota.remaining == 0 {
        "✗".red()
    } else if quota.remaining * 10 < quota.limit {
        "⚠".yellow()
    } else {
        "✓".green()
    };
    println!("{} Remaining: {}", mark, counts.bold());
    println!(
        "  Resets:    {}",
        format_reset(quota.reset_at, chrono::Utc::now())
    );
    println!(
        "  Mode:      {}",
        if authenticated {
            "authenticated"
        } else {
            "unauthenticated"
        }
    );
    println!();
}
