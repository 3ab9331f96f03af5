// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{RawRunConfig, RunConfig};
use crate::errors::Result;

/// Load a run file from a given path and return the raw `RawRunConfig`.
///
/// This only performs TOML deserialization plus one path fix-up: a relative
/// `working_directory` is resolved against the directory containing the run
/// file. Use [`load_and_validate`] for semantic checks.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawRunConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let mut config: RawRunConfig = toml::from_str(&contents)?;

    if let Some(dir) = config.working_directory.take() {
        config.working_directory = Some(resolve_relative(&dir, path));
    }

    Ok(config)
}

/// Load a run file from path and validate it into a [`RunConfig`].
///
/// - Reads TOML.
/// - Applies defaults (working directory, timeout).
/// - Checks the command, environment names, timeout and argument quoting.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<RunConfig> {
    let raw_config = load_from_path(&path)?;
    let config = RunConfig::try_from(raw_config)?;
    Ok(config)
}

/// Directory that relative paths in a run file are resolved against.
///
/// - If the run file path has a non-empty parent (e.g. "jobs/build.toml"),
///   we use that directory.
/// - If it's just a bare filename like "build.toml" (parent = ""),
///   relative paths stay relative to the current working directory.
fn resolve_relative(dir: &Path, config_path: &Path) -> PathBuf {
    if dir.is_absolute() {
        return dir.to_path_buf();
    }
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(dir),
        _ => dir.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_directories_follow_the_run_file() {
        let cfg = Path::new("jobs/build.toml");
        assert_eq!(resolve_relative(Path::new("out"), cfg), PathBuf::from("jobs/out"));
        assert_eq!(
            resolve_relative(Path::new("out"), Path::new("build.toml")),
            PathBuf::from("out")
        );
        let abs = std::env::temp_dir();
        assert_eq!(resolve_relative(&abs, cfg), abs);
    }
}
