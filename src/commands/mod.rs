//! CLI command implementations
//!
//! Each handler parses its arguments, invokes one use case and formats the
//! result; domain logic stays in the library crates.

pub mod api;
pub mod build;
pub mod export;
pub mod init;
pub mod mcp;
pub mod new;
pub mod serve;
pub mod validate;
pub mod watch;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use tokio_util::sync::CancellationToken;

use loko_core::usecase::BuildArchitectureGraph;
use loko_core::{
    ArchitectureGraph, Progress, ProgressReporter, Project, ProjectRepository, ScaffoldError,
    System,
};
use loko_store::{D2SyntaxParser, FsProjectRepository};

/// Progress events rendered for the terminal.
pub struct TerminalReporter;

impl ProgressReporter for TerminalReporter {
    fn report(&self, event: Progress) {
        match event {
            Progress::Step { step, current, total, message } => {
                println!("{} [{current}/{total}] {message}", step.dimmed());
            }
            Progress::Info(message) => println!("{} {message}", "·".dimmed()),
            Progress::Success(message) => println!("{} {message}", "✓".green()),
            Progress::Error(message) => eprintln!("{} {message}", "✗".red()),
        }
    }
}

/// Load the project, its systems and the derived graph.
pub async fn load_model(
    root: &Path,
    reporter: &dyn ProgressReporter,
) -> Result<(Project, Vec<System>, ArchitectureGraph)> {
    let repo = FsProjectRepository::new();
    let project = repo.load_project(root).await?;
    let systems = repo.list_systems(root).await?;
    let persisted = repo.load_relationships(root).await?;
    let graph = BuildArchitectureGraph::new(Arc::new(D2SyntaxParser::new()))
        .execute(&systems, &persisted, reporter)
        .await?;
    Ok((project, systems, graph))
}

/// Cancellation token wired to SIGINT/SIGTERM.
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutting down");
        trigger.cancel();
    });
    token
}

/// Expand a `[aliases]` entry in the project's loko.toml before parsing.
pub fn expand_aliases(mut args: Vec<String>) -> Vec<String> {
    // The root may be set ahead of the subcommand.
    let root = args
        .iter()
        .position(|a| a == "--root" || a == "-r")
        .and_then(|i| args.get(i + 1))
        .map(|r| std::path::PathBuf::from(r))
        .unwrap_or_else(|| std::path::PathBuf::from("."));
    let Ok(config) = loko_store::config::load_config(&root, &loko_store::config::ConfigEnv::from_process())
    else {
        return args;
    };
    if config.aliases.is_empty() {
        return args;
    }

    // First token that is neither a flag nor the value of --root/-r.
    let mut position = None;
    let mut index = 1;
    while index < args.len() {
        let arg = &args[index];
        if arg == "--root" || arg == "-r" {
            index += 2;
            continue;
        }
        if arg.starts_with('-') {
            index += 1;
            continue;
        }
        position = Some(index);
        break;
    }
    let Some(position) = position else { return args };
    if let Some(alias) = config.aliases.get(&args[position]) {
        let expansion = alias.to_argv();
        args.splice(position..=position, expansion);
    }
    args
}

/// Exit code policy: 2 for argument/configuration mistakes, 1 otherwise.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(scaffold) = err.downcast_ref::<ScaffoldError>() {
        return match scaffold {
            ScaffoldError::InvalidParent { .. } | ScaffoldError::Validation(_) => 2,
            _ => 1,
        };
    }
    if err.to_string().contains("invalid configuration") {
        return 2;
    }
    1
}
