//! Interactive deployer wizard
//!
//! Prompts drive [`WorkflowState`] through download, configuration choice
//! and build/deploy. The state machine decides which step comes next; this
//! module only renders prompts and runs the work each step asks for.

use std::io::IsTerminal;
use std::path::Path;

use colored::Colorize;
use dialoguer::{Confirm, Input, Select, theme::ColorfulTheme};
use log::debug;

use crate::cli::args::{DEFAULT_REF, GlobalOptions, RepoRef};
use crate::cli::deploy::{prepare, print_runs};
use crate::cli::status::print_quota;
use crate::cli::{CommandContext, spinner};
use crate::error::{Error, Result};
use crate::output::formatters::format_size;
use crate::toolkit::RunOutput;
use crate::workflow::{Event, Step, WorkflowState};

const BACK: &str = "← Back";
const REFRESH: &str = "↻ Re-download (force refresh)";
const API_STATUS: &str = "Check API status";

/// Actions offered in the build & deploy step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Build,
    DryRun,
    Deploy,
    BuildAndDeploy,
    CheckApiStatus,
    Back,
    StartOver,
    Quit,
}

impl Action {
    const ALL: [Action; 8] = [
        Action::Build,
        Action::DryRun,
        Action::Deploy,
        Action::BuildAndDeploy,
        Action::CheckApiStatus,
        Action::Back,
        Action::StartOver,
        Action::Quit,
    ];

    fn label(self) -> &'static str {
        match self {
            Action::Build => "Build",
            Action::DryRun => "Deploy (dry run)",
            Action::Deploy => "Deploy",
            Action::BuildAndDeploy => "Build, then deploy",
            Action::CheckApiStatus => API_STATUS,
            Action::Back => "← Choose another configuration",
            Action::StartOver => "Start over with another package",
            Action::Quit => "Quit",
        }
    }
}

/// Run the wizard
pub async fn run(opts: &GlobalOptions, env_file: Option<&Path>) -> Result<()> {
    if !std::io::stdin().is_terminal() {
        return Err(Error::Other(
            "The wizard needs an interactive terminal".to_string(),
        ));
    }

    let ctx = CommandContext::new(opts)?.with_env_file(env_file)?;
    let theme = ColorfulTheme::default();
    let mut state = WorkflowState::new();

    println!("{}", "repodeploy wizard".bold().green());
    println!("Fetch a package from GitHub, pick a configuration, then build and deploy it.\n");

    loop {
        let step = state.settle();
        header(step);
        let keep_going = match step {
            Step::Download => download(&ctx, &theme, &mut state).await?,
            Step::SelectConfig => select_config(&ctx, &theme, &mut state).await?,
            Step::BuildDeploy => build_deploy(&ctx, &theme, &mut state).await?,
        };
        if !keep_going {
            break;
        }
    }

    Ok(())
}

fn header(step: Step) {
    println!(
        "\n{}",
        format!("Step {} of {}: {}", step.number(), Step::ALL.len(), step).bold()
    );
}

/// Returns false when the user gives up
async fn download(
    ctx: &CommandContext,
    theme: &ColorfulTheme,
    state: &mut WorkflowState,
) -> Result<bool> {
    let mut prompt = Input::<String>::with_theme(theme).with_prompt("Repository (OWNER/NAME or URL)");
    if let Some(repo) = &ctx.config.defaults.repo {
        prompt = prompt.default(repo.clone());
    }
    let raw = prompt.interact_text()?;

    let repo: RepoRef = match raw.parse() {
        Ok(repo) => repo,
        Err(err) => {
            println!("{} {}", "✗".red(), err);
            return Ok(true);
        }
    };

    let reference = match repo.reference.clone() {
        Some(reference) => reference,
        None => pick_ref(ctx, theme, &repo).await?,
    };

    let pb = spinner::start(format!("Fetching {}@{}", repo, reference), ctx.format);
    let result = ctx
        .fetcher
        .snapshot(&repo.owner, &repo.name, &reference)
        .await;
    pb.finish_and_clear();

    match result {
        Ok(entry) => {
            let descriptor = entry.descriptor();
            println!(
                "{} Fetched {} ({} files)",
                "✓".green(),
                entry.key,
                entry.payload.len()
            );
            state.apply(Event::PackageLoaded {
                key: entry.key.clone(),
                descriptor,
            })?;
            Ok(true)
        }
        Err(err) => {
            report(&err);
            Ok(Confirm::with_theme(theme)
                .with_prompt("Try another repository?")
                .default(true)
                .interact()?)
        }
    }
}

/// Offer the repository's branches, falling back to free text when they
/// cannot be listed
async fn pick_ref(ctx: &CommandContext, theme: &ColorfulTheme, repo: &RepoRef) -> Result<String> {
    let fallback = ctx
        .config
        .defaults
        .reference
        .clone()
        .unwrap_or_else(|| DEFAULT_REF.to_string());

    let branches = match ctx.fetcher.list_branches(&repo.owner, &repo.name).await {
        Ok(branches) if !branches.is_empty() => branches,
        Ok(_) => Vec::new(),
        Err(err) => {
            debug!("Could not list branches of {}: {}", repo, err);
            Vec::new()
        }
    };

    if branches.is_empty() {
        return Ok(Input::<String>::with_theme(theme)
            .with_prompt("Branch, tag or commit")
            .default(fallback)
            .interact_text()?);
    }

    let default = branches.iter().position(|b| *b == fallback).unwrap_or(0);
    let choice = Select::with_theme(theme)
        .with_prompt("Branch")
        .items(&branches)
        .default(default)
        .interact()?;
    Ok(branches[choice].clone())
}

async fn select_config(
    ctx: &CommandContext,
    theme: &ColorfulTheme,
    state: &mut WorkflowState,
) -> Result<bool> {
    let configs: Vec<String> = state
        .descriptor
        .as_ref()
        .map(|d| d.available_configs.iter().cloned().collect())
        .unwrap_or_default();

    if configs.is_empty() {
        println!(
            "{} This package has no config.<name>.yaml files. Pick another one.",
            "⚠".yellow()
        );
        state.apply(Event::Back)?;
        return Ok(true);
    }

    let mut items = configs.clone();
    items.extend([REFRESH, API_STATUS, BACK].map(String::from));

    let Some(choice) = Select::with_theme(theme)
        .with_prompt("Configuration")
        .items(&items)
        .default(0)
        .interact_opt()?
    else {
        return Ok(false);
    };

    match choice.checked_sub(configs.len()) {
        Some(0) => {
            reload(ctx, state).await?;
            return Ok(true);
        }
        Some(1) => {
            api_status(ctx).await;
            return Ok(true);
        }
        Some(_) => {
            state.apply(Event::Back)?;
            return Ok(true);
        }
        None => {}
    }

    state.apply(Event::ConfigSelected(configs[choice].clone()))?;
    match state.selected_readme() {
        Some(readme) => println!("\n{}\n", readme.trim_end()),
        None => println!("{}", "(no README for this configuration)".dimmed()),
    }
    Ok(true)
}

async fn build_deploy(
    ctx: &CommandContext,
    theme: &ColorfulTheme,
    state: &mut WorkflowState,
) -> Result<bool> {
    let labels: Vec<&str> = Action::ALL.iter().map(|a| a.label()).collect();
    let Some(choice) = Select::with_theme(theme)
        .with_prompt("What next?")
        .items(&labels)
        .default(0)
        .interact_opt()?
    else {
        return Ok(false);
    };

    let action = Action::ALL[choice];
    match action {
        Action::Quit => return Ok(false),
        Action::CheckApiStatus => {
            api_status(ctx).await;
            return Ok(true);
        }
        Action::Back => {
            state.apply(Event::Back)?;
            return Ok(true);
        }
        Action::StartOver => {
            state.apply(Event::Reset)?;
            return Ok(true);
        }
        _ => {}
    }

    let (Some(key), Some(env)) = (state.package.clone(), state.selected_config.clone()) else {
        state.apply(Event::Reset)?;
        return Ok(true);
    };
    let entry = ctx
        .fetcher
        .snapshot(&key.owner, &key.repo, &key.reference)
        .await?;
    let dir = prepare(&ctx.workspace, &entry, &env)?;

    let pb = spinner::start(format!("Running {} for {}", ctx.toolkit.program(), env), ctx.format);
    let result: std::result::Result<Vec<RunOutput>, _> = match action {
        Action::Build => ctx.toolkit.build(&dir, &env).await.map(|r| vec![r]),
        Action::DryRun => ctx.toolkit.deploy(&dir, &env, true).await.map(|r| vec![r]),
        Action::Deploy => ctx.toolkit.deploy(&dir, &env, false).await.map(|r| vec![r]),
        _ => ctx
            .toolkit
            .build_and_deploy(&dir, &env, false)
            .await
            .map(|(build, deploy)| std::iter::once(build).chain(deploy).collect()),
    };
    pb.finish_and_clear();

    match result {
        Ok(runs) => {
            print_runs(ctx.format, &runs)?;
            if let Some(last) = runs.last() {
                state.apply(Event::RunFinished(last.clone()))?;
            }
        }
        Err(err) => report(&Error::from(err)),
    }

    Ok(true)
}

/// Drop the cache and fetch the current package again. Failures are shown
/// and leave the state as it was.
async fn reload(ctx: &CommandContext, state: &mut WorkflowState) -> Result<()> {
    let Some(key) = state.package.clone() else {
        return Ok(());
    };

    let pb = spinner::start(format!("Re-downloading {}", key), ctx.format);
    let result = ctx.fetcher.refresh(&key.owner, &key.repo, &key.reference).await;
    pb.finish_and_clear();

    match result {
        Ok(entry) => {
            println!(
                "{} Re-downloaded {} ({} files)",
                "✓".green(),
                entry.key,
                entry.payload.len()
            );
            state.apply(Event::PackageLoaded {
                key: entry.key.clone(),
                descriptor: entry.descriptor(),
            })?;
        }
        Err(err) => report(&err),
    }
    Ok(())
}

/// Live quota from GitHub plus what this session has cached
async fn api_status(ctx: &CommandContext) {
    let pb = spinner::start("Checking GitHub API quota", ctx.format);
    let result = ctx.fetcher.check_api_status().await;
    pb.finish_and_clear();

    match result {
        Ok(quota) => print_quota(&quota, ctx.config.github.token.is_some()),
        Err(err) => report(&err),
    }

    let stats = ctx.fetcher.cache_stats();
    println!(
        "{} Cached packages: {} ({})",
        "○".dimmed(),
        stats.entries,
        format_size(stats.total_size_bytes as u64)
    );
}

fn report(err: &Error) {
    println!("{} {}", "✗".red(), err);
    if let Some(hint) = err.hint() {
        println!("  → {}", hint);
    }
}
