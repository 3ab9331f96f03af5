// src/lib.rs

//! Supervised external-process runner.
//!
//! [`ShellRunner`] launches one child process described by
//! [`RunnerSettings`], streams its stdout / stderr line by line into
//! `tracing` and optional handlers, enforces an overall timeout, honours
//! cooperative cancellation, and kills the child together with its
//! descendants when it stops.

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{ArgumentsSpec, RawRunConfig, join_arguments, load_from_path};

pub use crate::config::{LineHandler, RunConfig, RunnerSettings};
pub use crate::errors::RunnerError;
pub use crate::exec::{ProcessTerminator, ShellRunner, StopReport};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - run-file loading and CLI overrides
/// - the runner itself
/// - Ctrl-C handling (cancels the run, which kills the process tree)
pub async fn run(args: CliArgs) -> Result<()> {
    let run_config =
        resolve_run_config(&args).context("failed to resolve run configuration")?;

    if args.dry_run {
        print_dry_run(&run_config);
        return Ok(());
    }

    let cancel = CancellationToken::new();

    // Ctrl-C → cancel the run.
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Ctrl+C received; cancelling run");
            cancel.cancel();
        });
    }

    let RunConfig { settings, timeout } = run_config;
    let mut runner = ShellRunner::new(settings);
    runner.run(timeout, &cancel).await?;

    Ok(())
}

/// Merge the optional run file with CLI overrides and validate the result.
///
/// A command after `--` replaces the run file's command and arguments;
/// `--timeout`, `--cwd` and `--env` override or extend the file values.
pub fn resolve_run_config(args: &CliArgs) -> errors::Result<RunConfig> {
    let mut raw = match &args.config {
        Some(path) => load_from_path(path)?,
        None => RawRunConfig::default(),
    };

    if let Some((command, rest)) = args.command.split_first() {
        raw.command = command.clone();
        raw.arguments = Some(ArgumentsSpec::List(rest.to_vec()));
    } else if args.config.is_none() {
        return Err(RunnerError::ConfigError(
            "nothing to run: pass --config <PATH> or a command after `--`".to_string(),
        ));
    }

    if let Some(timeout) = &args.timeout {
        raw.timeout = Some(timeout.clone());
    }
    if let Some(dir) = &args.cwd {
        raw.working_directory = Some(dir.clone());
    }
    for (key, value) in &args.env {
        raw.environment.insert(key.clone(), value.clone());
    }

    RunConfig::try_from(raw)
}

/// Simple dry-run output: print what would be started.
fn print_dry_run(cfg: &RunConfig) {
    let settings = &cfg.settings;
    println!("shellrunner dry-run");
    println!("  command: {}", settings.command());
    if !settings.arguments().is_empty() {
        println!("  arguments: {}", join_arguments(settings.arguments()));
    }
    println!("  working_directory: {}", settings.working_dir().display());
    println!("  timeout: {}", types::PrettyDuration(cfg.timeout));
    if !settings.environment().is_empty() {
        println!("  environment:");
        for (key, value) in settings.environment() {
            println!("    {key}={value}");
        }
    }

    debug!("dry-run complete (no execution)");
}
