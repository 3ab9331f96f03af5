// src/exec/terminator.rs

//! Process-tree termination.
//!
//! Killing only the direct child leaks grandchildren (e.g. a shell that
//! started a long-running sub-command), and those keep the output pipes open
//! so the pumps never see end-of-stream. A [`ProcessTerminator`] knows how to
//! take the whole tree down on the current platform:
//!
//! - Unix: [`ProcessGroupKill`] starts every child as the leader of its own
//!   process group and kills the group with `SIGKILL`.
//! - Windows: [`JobObjectKillLink`] adds every child to a job object created
//!   with kill-on-close, and kills the tree with `taskkill /T /F`. Dropping the
//!   link kills every process still registered with it.
//! - Elsewhere: [`DirectKill`] does nothing extra; the runner still kills the
//!   direct child.
//!
//! Sharing one terminator between several runners is allowed, but on Windows
//! it couples the fates of every process registered with the shared link.

use std::fmt::Debug;
use std::io;
use std::sync::Arc;

use tokio::process::Command;
#[cfg(windows)]
use tracing::warn;

/// `CREATE_NO_WINDOW` process creation flag.
#[cfg(windows)]
pub(crate) const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Platform capability for killing a child together with its descendants.
pub trait ProcessTerminator: Send + Sync + Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Adjust the command before spawn (e.g. put it into its own group).
    fn prepare(&self, _command: &mut Command) {}

    /// Associate a freshly spawned process with this terminator.
    fn register(&self, pid: u32) -> io::Result<()>;

    /// Forcefully kill `pid` and its descendants.
    ///
    /// A tree that is already gone is not an error.
    fn terminate(&self, pid: u32) -> io::Result<()>;
}

/// Select the terminator for the platform we are running on.
pub fn for_current_platform() -> Arc<dyn ProcessTerminator> {
    #[cfg(unix)]
    {
        Arc::new(ProcessGroupKill)
    }

    #[cfg(windows)]
    {
        match JobObjectKillLink::new() {
            Ok(link) => Arc::new(link),
            Err(err) => {
                warn!(error = %err, "failed to create job object; descendants will not be tracked");
                Arc::new(DirectKill)
            }
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        Arc::new(DirectKill)
    }
}

/// No tree handling: only the direct child is killed (by the runner).
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectKill;

impl ProcessTerminator for DirectKill {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn register(&self, _pid: u32) -> io::Result<()> {
        Ok(())
    }

    fn terminate(&self, _pid: u32) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(unix)]
pub use unix::ProcessGroupKill;

#[cfg(unix)]
mod unix {
    use std::io;

    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;
    use tokio::process::Command;
    use tracing::debug;

    use super::ProcessTerminator;

    /// Native process-group kill. Registration is a no-op: the group is the
    /// registration.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct ProcessGroupKill;

    impl ProcessTerminator for ProcessGroupKill {
        fn name(&self) -> &'static str {
            "process-group"
        }

        fn prepare(&self, command: &mut Command) {
            // pgid == pid of the child.
            command.process_group(0);
        }

        fn register(&self, _pid: u32) -> io::Result<()> {
            Ok(())
        }

        fn terminate(&self, pid: u32) -> io::Result<()> {
            let raw = i32::try_from(pid)
                .ok()
                .filter(|raw| *raw > 1)
                .ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("refusing to signal process group {pid}"),
                    )
                })?;

            match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
                Ok(()) => {
                    debug!(pgid = raw, "sent SIGKILL to process group");
                    Ok(())
                }
                Err(Errno::ESRCH) => {
                    debug!(pgid = raw, "process group already gone");
                    Ok(())
                }
                Err(errno) => Err(io::Error::from(errno)),
            }
        }
    }
}

#[cfg(windows)]
pub use windows::JobObjectKillLink;

#[cfg(windows)]
mod windows {
    use std::ffi::c_void;
    use std::io;
    use std::process::Stdio;

    use tracing::debug;
    use windows_sys::Win32::Foundation::{CloseHandle, HANDLE};
    use windows_sys::Win32::System::JobObjects::{
        AssignProcessToJobObject, CreateJobObjectW, JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE,
        JOBOBJECT_EXTENDED_LIMIT_INFORMATION, JobObjectExtendedLimitInformation,
        SetInformationJobObject,
    };
    use windows_sys::Win32::System::Threading::{OpenProcess, PROCESS_SET_QUOTA, PROCESS_TERMINATE};

    use super::{CREATE_NO_WINDOW, ProcessTerminator};

    /// Job object that every registered process is assigned to.
    #[derive(Debug)]
    pub struct JobObjectKillLink {
        job: OwnedHandle,
    }

    #[derive(Debug)]
    struct OwnedHandle(HANDLE);

    // The handle is only passed to thread-safe Win32 calls.
    unsafe impl Send for OwnedHandle {}
    unsafe impl Sync for OwnedHandle {}

    impl Drop for OwnedHandle {
        fn drop(&mut self) {
            unsafe {
                CloseHandle(self.0);
            }
        }
    }

    impl JobObjectKillLink {
        pub fn new() -> io::Result<Self> {
            let handle = unsafe { CreateJobObjectW(std::ptr::null(), std::ptr::null()) };
            if handle.is_null() {
                return Err(io::Error::last_os_error());
            }
            let job = OwnedHandle(handle);

            let mut info: JOBOBJECT_EXTENDED_LIMIT_INFORMATION = unsafe { std::mem::zeroed() };
            info.BasicLimitInformation.LimitFlags = JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE;
            let ok = unsafe {
                SetInformationJobObject(
                    job.0,
                    JobObjectExtendedLimitInformation,
                    &info as *const JOBOBJECT_EXTENDED_LIMIT_INFORMATION as *const c_void,
                    std::mem::size_of::<JOBOBJECT_EXTENDED_LIMIT_INFORMATION>() as u32,
                )
            };
            if ok == 0 {
                return Err(io::Error::last_os_error());
            }

            Ok(Self { job })
        }
    }

    impl ProcessTerminator for JobObjectKillLink {
        fn name(&self) -> &'static str {
            "job-object"
        }

        fn register(&self, pid: u32) -> io::Result<()> {
            let process = unsafe { OpenProcess(PROCESS_SET_QUOTA | PROCESS_TERMINATE, 0, pid) };
            if process.is_null() {
                return Err(io::Error::last_os_error());
            }
            let process = OwnedHandle(process);

            let ok = unsafe { AssignProcessToJobObject(self.job.0, process.0) };
            if ok == 0 {
                return Err(io::Error::last_os_error());
            }
            debug!(pid, "process assigned to kill job");
            Ok(())
        }

        fn terminate(&self, pid: u32) -> io::Result<()> {
            use std::os::windows::process::CommandExt;

            // taskkill exits with 128 when the process is already gone.
            let status = std::process::Command::new("taskkill")
                .args(["/T", "/F", "/PID", &pid.to_string()])
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .creation_flags(CREATE_NO_WINDOW)
                .status()?;
            match status.code() {
                Some(0) | Some(128) => Ok(()),
                code => Err(io::Error::other(format!(
                    "taskkill failed for pid {pid} (exit {code:?})"
                ))),
            }
        }
    }
}
