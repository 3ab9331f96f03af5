// src/errors.rs

//! Crate-wide error type and result alias.

use std::time::Duration;

use thiserror::Error;

use crate::types::PrettyDuration;

#[derive(Error, Debug)]
pub enum RunnerError {
    /// The OS refused to create the process (missing executable, permissions,
    /// bad working directory).
    #[error("failed to start '{command}' command: {source}")]
    StartFailure {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "failed to complete '{command}' command within {} timeout (elapsed {})",
        PrettyDuration::from(.timeout),
        PrettyDuration::from(.elapsed)
    )]
    Timeout {
        command: String,
        timeout: Duration,
        elapsed: Duration,
    },

    #[error("'{command}' command was cancelled after {}", PrettyDuration::from(.elapsed))]
    Cancelled { command: String, elapsed: Duration },

    #[error(
        "'{command}' command exited with code {code} after {}",
        PrettyDuration::from(.elapsed)
    )]
    AbnormalExit {
        command: String,
        code: i32,
        elapsed: Duration,
    },

    /// Only ever surfaced as `false` from `ShellRunner::try_send_message`.
    #[error("failed to send message to '{command}' command: {reason}")]
    SendFailure { command: String, reason: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RunnerError {
    /// Exit code of the child for `AbnormalExit`, `None` otherwise.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            RunnerError::AbnormalExit { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RunnerError>;
