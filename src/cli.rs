// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `shellrunner`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "shellrunner",
    version,
    about = "Run a command under supervision: stream its output, enforce a timeout, and kill its whole process tree on exit.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to a run file (TOML) describing the command.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Overall timeout, e.g. `500ms`, `30s`, `5m`.
    ///
    /// Overrides the run file. Default: 60s.
    #[arg(long, value_name = "DURATION")]
    pub timeout: Option<String>,

    /// Working directory for the command. Overrides the run file.
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Extra environment variable for the command (repeatable).
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SHELLRUNNER_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Resolve and print the run, but don't start anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Command and arguments, after `--`. Replaces the run file's command.
    #[arg(last = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

fn parse_env_pair(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{s}'"))?;
    if key.is_empty() {
        return Err(format!("invalid KEY=VALUE: empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
