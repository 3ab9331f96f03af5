// src/exec/runner.rs

//! Supervisor for a single child-process lifetime.

use std::fmt;
use std::future::Future;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{RunnerSettings, join_arguments};
use crate::errors::{Result, RunnerError};
use crate::exec::pump::spawn_pump;
use crate::exec::terminator::{self, ProcessTerminator};
use crate::types::{PrettyDuration, StreamKind};

/// How long `stop` waits for the output pipes to close after the kill.
const DRAIN_AFTER_KILL: Duration = Duration::from_secs(5);

/// Starts, supervises and stops one external process at a time.
///
/// State machine: `Idle -> Running -> Idle`. Every terminal path (natural
/// exit observed by [`run`](Self::run), [`stop`](Self::stop), timeout,
/// cancellation) returns the runner to idle, and the same instance can be
/// started again afterwards.
///
/// Output is drained by two pumps (stdout, stderr) that log every line and
/// forward it to the handlers in [`RunnerSettings`]. The process tree is
/// killed through a [`ProcessTerminator`] so that grandchildren do not
/// outlive the runner.
///
/// All methods that spawn must be called from within a Tokio runtime.
pub struct ShellRunner {
    settings: Arc<RunnerSettings>,
    command: Arc<str>,
    terminator: Arc<dyn ProcessTerminator>,
    process: Option<RunningProcess>,
}

/// Handle of the currently supervised process.
///
/// - `exit` flips to `Some(code)` once the OS reports the exit (`-1` when no
///   code is available, e.g. killed by a signal).
/// - `drained` flips to `true` once both pumps reached end-of-stream.
/// - `kill` asks the exit watcher to kill the direct child.
struct RunningProcess {
    pid: Option<u32>,
    stdin: Option<ChildStdin>,
    exit: watch::Receiver<Option<i32>>,
    drained: watch::Receiver<bool>,
    kill: Option<oneshot::Sender<()>>,
    started_at: Instant,
}

impl RunningProcess {
    fn has_exited(&self) -> bool {
        self.exit.borrow().is_some()
    }

    fn has_drained(&self) -> bool {
        *self.drained.borrow()
    }

    /// Exited and drained: nothing of the tree can be left.
    ///
    /// A child that exited while a descendant still holds its output pipes
    /// is not settled; the descendant must still be killed.
    fn is_settled(&self) -> bool {
        self.has_exited() && self.has_drained()
    }
}

/// Outcome of [`ShellRunner::stop`].
///
/// Stopping never fails; problems met while tearing the process down are
/// logged and collected here as warnings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopReport {
    stopped: bool,
    pid: Option<u32>,
    warnings: Vec<String>,
}

impl StopReport {
    /// Whether a running process, or descendants still holding its output,
    /// had to be killed.
    pub fn stopped(&self) -> bool {
        self.stopped
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

enum Race<T> {
    Finished(T),
    TimedOut,
    Cancelled,
}

impl ShellRunner {
    /// Runner using the process terminator of the current platform.
    pub fn new(settings: RunnerSettings) -> Self {
        Self::with_terminator(settings, terminator::for_current_platform())
    }

    /// Runner using a caller-supplied terminator.
    ///
    /// Passing the same terminator to several runners is allowed; see
    /// [`terminator`](crate::exec::terminator) for what that implies.
    pub fn with_terminator(settings: RunnerSettings, terminator: Arc<dyn ProcessTerminator>) -> Self {
        let command: Arc<str> = Arc::from(settings.command());
        Self {
            settings: Arc::new(settings),
            command,
            terminator,
            process: None,
        }
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    /// True between a successful start and the observed end of the process.
    pub fn is_running(&self) -> bool {
        self.process.as_ref().is_some_and(|p| !p.has_exited())
    }

    /// OS process id of the running child.
    pub fn pid(&self) -> Option<u32> {
        self.process
            .as_ref()
            .filter(|p| !p.has_exited())
            .and_then(|p| p.pid)
    }

    /// Spawn the process. Does nothing if it is already running.
    pub fn start(&mut self) -> Result<()> {
        self.ensure_started().map(|_| ())
    }

    /// Kill the process tree and wait until it is gone and its output is
    /// fully drained.
    ///
    /// Does nothing if the process exited and its output is closed. A child
    /// that exited while descendants keep its pipes open still gets its tree
    /// killed.
    pub async fn stop(&mut self) -> StopReport {
        let Some(mut process) = self.process.take() else {
            return StopReport::default();
        };
        if process.is_settled() {
            debug!(command = %self.command, "stop requested but command already exited");
            return StopReport::default();
        }

        let mut report = StopReport {
            stopped: true,
            pid: process.pid,
            warnings: Vec::new(),
        };

        if process.has_exited() {
            info!(
                command = %self.command,
                pid = ?process.pid,
                "command exited but descendants still hold its output; killing process tree"
            );
        } else {
            info!(command = %self.command, pid = ?process.pid, "killing command process tree");
        }

        match process.pid {
            Some(pid) => {
                if let Err(err) = self.terminator.terminate(pid) {
                    report
                        .warnings
                        .push(format!("failed to kill process tree of pid {pid}: {err}"));
                }
            }
            None => report
                .warnings
                .push("process id unavailable; only the direct child was killed".to_string()),
        }

        if let Some(kill) = process.kill.take() {
            if kill.send(()).is_err() {
                debug!(command = %self.command, "exit watcher already finished");
            }
        }
        drop(process.stdin.take());

        if wait_exit(&mut process.exit).await.is_none() {
            report
                .warnings
                .push("exit watcher ended without reporting an exit code".to_string());
        }
        if tokio::time::timeout(DRAIN_AFTER_KILL, wait_drained(&mut process.drained))
            .await
            .is_err()
        {
            report.warnings.push(format!(
                "output still open {} after kill; a descendant may have escaped the process tree",
                PrettyDuration(DRAIN_AFTER_KILL)
            ));
        }

        for warning in report.warnings() {
            error!(command = %self.command, warning = %warning, "failed to stop command cleanly");
        }
        info!(
            command = %self.command,
            pid = ?process.pid,
            elapsed = %PrettyDuration(process.started_at.elapsed()),
            "stopped command"
        );

        report
    }

    /// Start the process (if needed) and supervise it to completion.
    ///
    /// Success means both output streams were fully drained and the process
    /// exited with code 0. If `timeout` elapses or `cancel` fires first, the
    /// process tree is killed before `Timeout` / `Cancelled` is returned.
    pub async fn run(&mut self, timeout: Duration, cancel: &CancellationToken) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let (mut drained, mut exit, started_at) = {
            let process = self.ensure_started()?;
            (process.drained.clone(), process.exit.clone(), process.started_at)
        };

        // Output first: handlers have seen every line before we report.
        match race(wait_drained(&mut drained), deadline, cancel).await {
            Race::Finished(()) => {}
            Race::TimedOut => return Err(self.abort_timed_out(timeout, started_at).await),
            Race::Cancelled => return Err(self.abort_cancelled(started_at).await),
        }

        // A process may close its pipes and keep running; the deadline
        // still applies.
        let code = match race(wait_exit(&mut exit), deadline, cancel).await {
            Race::Finished(code) => code,
            Race::TimedOut => return Err(self.abort_timed_out(timeout, started_at).await),
            Race::Cancelled => return Err(self.abort_cancelled(started_at).await),
        };

        self.process = None;
        let elapsed = started_at.elapsed();

        match code {
            Some(0) => {
                info!(
                    command = %self.command,
                    exit_code = 0,
                    elapsed = %PrettyDuration(elapsed),
                    "finished command"
                );
                Ok(())
            }
            other => {
                let code = other.unwrap_or(-1);
                error!(
                    command = %self.command,
                    exit_code = code,
                    elapsed = %PrettyDuration(elapsed),
                    "command exited abnormally"
                );
                Err(RunnerError::AbnormalExit {
                    command: self.command.to_string(),
                    code,
                    elapsed,
                })
            }
        }
    }

    /// Blocking variant of [`run`](Self::run).
    ///
    /// Builds a private current-thread runtime, so it must not be called from
    /// inside an async context. `cancel` may be fired from another thread.
    pub fn run_blocking(&mut self, timeout: Duration, cancel: &CancellationToken) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.run(timeout, cancel))
    }

    /// Write `message` plus a newline to the child's stdin.
    ///
    /// Returns `false` (and logs) when the process is not running or the write
    /// fails, e.g. because the child just closed its input.
    pub async fn try_send_message(&mut self, message: &str) -> bool {
        match self.send_line(message).await {
            Ok(()) => {
                debug!(command = %self.command, message = %message, "sent message");
                true
            }
            Err(err) => {
                error!(
                    command = %self.command,
                    message = %message,
                    error = %err,
                    "failed to send message"
                );
                false
            }
        }
    }

    async fn send_line(&mut self, message: &str) -> Result<()> {
        let command = Arc::clone(&self.command);
        let failure = move |reason: String| RunnerError::SendFailure {
            command: command.to_string(),
            reason,
        };

        let process = match self.process.as_mut() {
            Some(process) if !process.has_exited() => process,
            _ => return Err(failure("command is not running".to_string())),
        };
        let stdin = process
            .stdin
            .as_mut()
            .ok_or_else(|| failure("stdin is closed".to_string()))?;

        let mut line = String::with_capacity(message.len() + 1);
        line.push_str(message);
        line.push('\n');

        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| failure(e.to_string()))?;
        stdin.flush().await.map_err(|e| failure(e.to_string()))?;
        Ok(())
    }

    fn ensure_started(&mut self) -> Result<&mut RunningProcess> {
        let process = match self.process.take() {
            Some(process) if !process.has_exited() => process,
            Some(previous) => {
                self.kill_leftovers(&previous);
                self.spawn()?
            }
            None => self.spawn()?,
        };
        Ok(self.process.insert(process))
    }

    /// Kill the process tree unless it has fully settled.
    fn kill_leftovers(&self, process: &RunningProcess) {
        if process.is_settled() {
            return;
        }
        let Some(pid) = process.pid else {
            return;
        };
        debug!(command = %self.command, pid, "killing unsettled process tree");
        if let Err(err) = self.terminator.terminate(pid) {
            warn!(command = %self.command, pid, error = %err, "failed to kill process tree");
        }
    }

    fn spawn(&self) -> Result<RunningProcess> {
        let settings = &self.settings;

        info!(
            command = %self.command,
            arguments = %join_arguments(settings.arguments()),
            directory = %settings.working_dir().display(),
            terminator = self.terminator.name(),
            "starting command"
        );

        let mut cmd = Command::new(settings.command());
        cmd.args(settings.arguments())
            .current_dir(settings.working_dir())
            .envs(settings.environment())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(windows)]
        cmd.creation_flags(terminator::CREATE_NO_WINDOW);
        self.terminator.prepare(&mut cmd);

        let started_at = Instant::now();
        let mut child = cmd.spawn().map_err(|source| {
            error!(command = %self.command, error = %source, "failed to start command");
            RunnerError::StartFailure {
                command: self.command.to_string(),
                source,
            }
        })?;

        let pid = child.id();
        if let Some(pid) = pid {
            if let Err(err) = self.terminator.register(pid) {
                warn!(
                    command = %self.command,
                    pid,
                    terminator = self.terminator.name(),
                    error = %err,
                    "failed to register process for tree kill"
                );
            }
        }

        let stdin = child.stdin.take();
        let stdout = child.stdout.take().map(|out| {
            spawn_pump(
                out,
                StreamKind::Stdout,
                Arc::clone(&self.command),
                settings.stdout_handler().cloned(),
            )
        });
        let stderr = child.stderr.take().map(|err| {
            spawn_pump(
                err,
                StreamKind::Stderr,
                Arc::clone(&self.command),
                settings.stderr_handler().cloned(),
            )
        });

        let drained = spawn_drain_signal(stdout, stderr);
        let (kill_tx, kill_rx) = oneshot::channel();
        let exit = spawn_exit_watcher(child, Arc::clone(&self.command), kill_rx);

        info!(command = %self.command, pid = ?pid, "started command");

        Ok(RunningProcess {
            pid,
            stdin,
            exit,
            drained,
            kill: Some(kill_tx),
            started_at,
        })
    }

    async fn abort_timed_out(&mut self, timeout: Duration, started_at: Instant) -> RunnerError {
        self.stop().await;
        let elapsed = started_at.elapsed();
        error!(
            command = %self.command,
            timeout = %PrettyDuration(timeout),
            elapsed = %PrettyDuration(elapsed),
            "failed to complete command within timeout"
        );
        RunnerError::Timeout {
            command: self.command.to_string(),
            timeout,
            elapsed,
        }
    }

    async fn abort_cancelled(&mut self, started_at: Instant) -> RunnerError {
        self.stop().await;
        let elapsed = started_at.elapsed();
        error!(
            command = %self.command,
            elapsed = %PrettyDuration(elapsed),
            "command cancelled"
        );
        RunnerError::Cancelled {
            command: self.command.to_string(),
            elapsed,
        }
    }
}

impl Drop for ShellRunner {
    fn drop(&mut self) {
        let Some(mut process) = self.process.take() else {
            return;
        };
        if process.is_settled() {
            return;
        }

        warn!(
            command = %self.command,
            pid = ?process.pid,
            "runner dropped while command is running; killing process tree"
        );
        self.kill_leftovers(&process);
        if let Some(kill) = process.kill.take() {
            let _ = kill.send(());
        }
    }
}

impl fmt::Debug for ShellRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShellRunner")
            .field("settings", &self.settings)
            .field("terminator", &self.terminator.name())
            .field("running", &self.is_running())
            .field("pid", &self.pid())
            .finish()
    }
}

async fn race<F: Future>(fut: F, deadline: Instant, cancel: &CancellationToken) -> Race<F::Output> {
    tokio::select! {
        biased;
        out = fut => Race::Finished(out),
        _ = cancel.cancelled() => Race::Cancelled,
        _ = sleep_until(deadline) => Race::TimedOut,
    }
}

async fn wait_drained(drained: &mut watch::Receiver<bool>) {
    // A dropped sender also means the pumps are gone.
    let _ = drained.wait_for(|done| *done).await;
}

async fn wait_exit(exit: &mut watch::Receiver<Option<i32>>) -> Option<i32> {
    match exit.wait_for(Option::is_some).await {
        Ok(code) => *code,
        Err(_) => None,
    }
}

/// Join both pumps and publish `true` once they are done.
fn spawn_drain_signal(
    stdout: Option<JoinHandle<u64>>,
    stderr: Option<JoinHandle<u64>>,
) -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        for pump in [stdout, stderr].into_iter().flatten() {
            if let Err(err) = pump.await {
                warn!(error = %err, "output pump task failed");
            }
        }
        let _ = tx.send(true);
    });

    rx
}

/// Own the child until it exits and publish its exit code.
///
/// A kill request (or the request channel being dropped) kills the direct
/// child; descendants are the terminator's job.
fn spawn_exit_watcher(
    mut child: Child,
    command: Arc<str>,
    kill_rx: oneshot::Receiver<()>,
) -> watch::Receiver<Option<i32>> {
    let (tx, rx) = watch::channel(None);

    tokio::spawn(async move {
        let status = tokio::select! {
            status = child.wait() => status,
            _ = kill_rx => {
                if let Err(e) = child.start_kill() {
                    debug!(command = %command, error = %e, "direct kill failed; process may have exited already");
                }
                child.wait().await
            }
        };

        let code = match status {
            Ok(status) => status.code().unwrap_or(-1),
            Err(e) => {
                warn!(command = %command, error = %e, "failed to wait for command process");
                -1
            }
        };
        debug!(command = %command, exit_code = code, "command process exited");
        let _ = tx.send(Some(code));
    });

    rx
}
