// src/config/mod.rs

//! Run settings and run-file loading.
//!
//! - [`model`] holds [`RunnerSettings`] (what the runner starts) plus the
//!   serde model of a TOML run file.
//! - [`loader`] reads run files; [`validate`] turns the raw model into a
//!   checked [`RunConfig`].
//! - [`arguments`] defines how a single argument string is split.

pub mod arguments;
pub mod loader;
pub mod model;
pub mod validate;

pub use arguments::{join_arguments, quote_argument, split_arguments};
pub use loader::{load_and_validate, load_from_path};
pub use model::{ArgumentsSpec, DEFAULT_TIMEOUT, LineHandler, RawRunConfig, RunConfig, RunnerSettings};
