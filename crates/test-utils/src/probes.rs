//! Liveness checks for processes started by the tests.

use std::time::Duration;

/// Whether `pid` still names a live (non-zombie) process.
///
/// On Linux a zombie still answers signals, so `/proc/<pid>/stat` is
/// consulted first: a missing entry or state `Z` / `X` counts as dead.
pub fn process_alive(pid: u32) -> bool {
    #[cfg(target_os = "linux")]
    {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => {
                // Format: "<pid> (<comm>) <state> ..."; comm may contain spaces.
                let state = stat
                    .rfind(')')
                    .and_then(|idx| stat[idx + 1..].split_whitespace().next());
                !matches!(state, Some("Z") | Some("X") | None)
            }
            Err(_) => false,
        }
    }

    #[cfg(not(target_os = "linux"))]
    {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };
        kill(Pid::from_raw(raw), None).is_ok()
    }
}

/// Poll until `pid` is gone or `limit` elapses. Returns whether it died.
pub async fn wait_until_dead(pid: u32, limit: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if !process_alive(pid) {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}
