// src/types.rs

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which of the child's output streams a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stdout" | "out" => Ok(StreamKind::Stdout),
            "stderr" | "err" => Ok(StreamKind::Stderr),
            other => Err(format!(
                "invalid stream: {other} (expected \"stdout\" or \"stderr\")"
            )),
        }
    }
}

/// Human-friendly rendering of a duration for log lines and error messages.
///
/// - below one second: `250ms`
/// - below one minute: `1.50s`
/// - below one hour: `2m 3s`
/// - otherwise: `1h 5m`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrettyDuration(pub Duration);

impl From<Duration> for PrettyDuration {
    fn from(d: Duration) -> Self {
        PrettyDuration(d)
    }
}

impl From<&Duration> for PrettyDuration {
    fn from(d: &Duration) -> Self {
        PrettyDuration(*d)
    }
}

impl fmt::Display for PrettyDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = self.0;
        let secs = d.as_secs();
        if secs == 0 {
            write!(f, "{}ms", d.as_millis())
        } else if secs < 60 {
            write!(f, "{:.2}s", d.as_secs_f64())
        } else if secs < 60 * 60 {
            write!(f, "{}m {}s", secs / 60, secs % 60)
        } else {
            write!(f, "{}h {}m", secs / 3600, (secs % 3600) / 60)
        }
    }
}

/// Parse a duration like `500ms`, `5s`, `2m` or `1h`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };

    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration too large: '{s}'"))
}
