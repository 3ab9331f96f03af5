#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use shellrunner::RunnerSettings;

/// Settings for `sh -c <script>`.
pub fn sh(script: &str) -> RunnerSettings {
    RunnerSettings::new("sh").arg("-c").arg(script)
}

/// Thread-safe sink for lines delivered by a runner handler.
#[derive(Debug, Clone, Default)]
pub struct LineCollector {
    lines: Arc<Mutex<Vec<String>>>,
}

impl LineCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closure suitable for `RunnerSettings::on_stdout` / `on_stderr`.
    pub fn handler(&self) -> impl Fn(&str) + Send + Sync + 'static {
        let lines = Arc::clone(&self.lines);
        move |line: &str| {
            lines
                .lock()
                .expect("line collector poisoned")
                .push(line.to_string());
        }
    }

    /// Snapshot of everything collected so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("line collector poisoned").clone()
    }
}

/// `sh -c <script>` with stdout and stderr each wired to a collector.
pub struct ScriptFixture {
    pub settings: RunnerSettings,
    pub stdout: LineCollector,
    pub stderr: LineCollector,
}

impl ScriptFixture {
    pub fn new(script: &str) -> Self {
        Self::from_settings(sh(script))
    }

    pub fn in_dir(script: &str, dir: &Path) -> Self {
        Self::from_settings(sh(script).working_directory(dir))
    }

    pub fn from_settings(settings: RunnerSettings) -> Self {
        let stdout = LineCollector::new();
        let stderr = LineCollector::new();
        let settings = settings
            .on_stdout(stdout.handler())
            .on_stderr(stderr.handler());
        Self {
            settings,
            stdout,
            stderr,
        }
    }
}
