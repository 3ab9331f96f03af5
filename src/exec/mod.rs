// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running the configured command,
//! using `tokio::process::Command`, and supervising it until it finishes, is
//! stopped, times out or is cancelled.
//!
//! - [`runner`] owns [`ShellRunner`], the per-process state machine.
//! - [`pump`] drains stdout / stderr line by line into logs and handlers.
//! - [`terminator`] provides the `ProcessTerminator` trait and the
//!   platform implementations that kill a child together with its
//!   descendants.

pub mod pump;
pub mod runner;
pub mod terminator;

pub use runner::{ShellRunner, StopReport};
pub use terminator::{DirectKill, ProcessTerminator, for_current_platform};
