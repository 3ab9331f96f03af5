// src/config/model.rs

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::config::arguments::split_arguments;
use crate::errors::Result;

/// Per-line callback for a child's stdout or stderr.
///
/// Invoked synchronously on the draining task; it must not block.
pub type LineHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Timeout used when a run file does not set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Description of what a [`ShellRunner`](crate::exec::ShellRunner) starts.
///
/// Built with the consuming `with`-style methods below and then handed to the
/// runner, which never changes it afterwards. Environment overrides are
/// applied to the spawned process only.
///
/// ```no_run
/// use shellrunner::RunnerSettings;
///
/// let settings = RunnerSettings::new("ping")
///     .args(["-c", "2", "localhost"])
///     .env("LANG", "C")
///     .on_stdout(|line| println!("ping says: {line}"));
/// ```
#[derive(Clone)]
pub struct RunnerSettings {
    command: String,
    arguments: Vec<String>,
    working_directory: PathBuf,
    environment: BTreeMap<String, String>,
    on_stdout: Option<LineHandler>,
    on_stderr: Option<LineHandler>,
}

impl RunnerSettings {
    /// Settings for `command` with no arguments, running in the current
    /// directory of the calling process.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            arguments: Vec::new(),
            working_directory: current_dir_or_dot(),
            environment: BTreeMap::new(),
            on_stdout: None,
            on_stderr: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.arguments.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append arguments given as one string, split with
    /// [`split_arguments`](crate::config::arguments::split_arguments).
    pub fn arguments_line(self, line: &str) -> Result<Self> {
        Ok(self.args(split_arguments(line)?))
    }

    pub fn working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = dir.into();
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn on_stdout<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_stdout = Some(Arc::new(handler));
        self
    }

    pub fn on_stderr<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_stderr = Some(Arc::new(handler));
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_directory
    }

    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    pub fn stdout_handler(&self) -> Option<&LineHandler> {
        self.on_stdout.as_ref()
    }

    pub fn stderr_handler(&self) -> Option<&LineHandler> {
        self.on_stderr.as_ref()
    }
}

impl fmt::Debug for RunnerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnerSettings")
            .field("command", &self.command)
            .field("arguments", &self.arguments)
            .field("working_directory", &self.working_directory)
            .field("environment", &self.environment)
            .field("on_stdout", &self.on_stdout.is_some())
            .field("on_stderr", &self.on_stderr.is_some())
            .finish()
    }
}

/// A validated run: what to start and how long it may take.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub settings: RunnerSettings,
    pub timeout: Duration,
}

impl RunConfig {
    pub(crate) fn new_unchecked(settings: RunnerSettings, timeout: Duration) -> Self {
        Self { settings, timeout }
    }
}

/// Run file as read from TOML, before validation.
///
/// ```toml
/// command = "sleep"
/// arguments = ["2"]        # or: arguments = "-c 'echo hi'"
/// working_directory = "."  # relative to the run file
/// timeout = "30s"
///
/// [environment]
/// TEST_VAR = "kontur"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawRunConfig {
    /// Executable to start. Looked up on `PATH` when it has no separator.
    pub command: String,

    #[serde(default)]
    pub arguments: Option<ArgumentsSpec>,

    /// Defaults to the current directory of the calling process.
    #[serde(default)]
    pub working_directory: Option<PathBuf>,

    /// Overall timeout such as `"30s"`; defaults to [`DEFAULT_TIMEOUT`].
    #[serde(default)]
    pub timeout: Option<String>,

    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

/// Arguments either as an explicit list or as one string to be split.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ArgumentsSpec {
    List(Vec<String>),
    Line(String),
}

pub(crate) fn current_dir_or_dot() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
