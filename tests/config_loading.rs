use std::error::Error;
use std::fs;
use std::time::Duration;

use shellrunner::RunnerError;
use shellrunner::config::{DEFAULT_TIMEOUT, load_and_validate};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn full_run_file_is_loaded() -> TestResult {
    let dir = tempfile::tempdir()?;
    fs::create_dir(dir.path().join("work"))?;
    let path = dir.path().join("job.toml");
    fs::write(
        &path,
        r#"
command = "sleep"
arguments = ["2"]
working_directory = "work"
timeout = "5s"

[environment]
TEST_VAR = "kontur"
"#,
    )?;

    let cfg = load_and_validate(&path)?;

    assert_eq!(cfg.settings.command(), "sleep");
    assert_eq!(cfg.settings.arguments(), ["2"]);
    assert_eq!(cfg.settings.working_dir(), dir.path().join("work"));
    assert_eq!(cfg.timeout, Duration::from_secs(5));
    assert_eq!(
        cfg.settings.environment().get("TEST_VAR").map(String::as_str),
        Some("kontur")
    );
    Ok(())
}

#[test]
fn argument_string_is_split_and_timeout_defaults() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("job.toml");
    fs::write(&path, "command = \"sh\"\narguments = \"-c 'echo hello world'\"\n")?;

    let cfg = load_and_validate(&path)?;

    assert_eq!(cfg.settings.arguments(), ["-c", "echo hello world"]);
    assert_eq!(cfg.timeout, DEFAULT_TIMEOUT);
    Ok(())
}

#[test]
fn absolute_working_directory_is_kept() -> TestResult {
    let dir = tempfile::tempdir()?;
    let elsewhere = tempfile::tempdir()?;
    let path = dir.path().join("job.toml");
    fs::write(
        &path,
        format!(
            "command = \"true\"\nworking_directory = {:?}\n",
            elsewhere.path().display().to_string()
        ),
    )?;

    let cfg = load_and_validate(&path)?;
    assert_eq!(cfg.settings.working_dir(), elsewhere.path());
    Ok(())
}

#[test]
fn invalid_run_files_are_rejected() -> TestResult {
    let dir = tempfile::tempdir()?;
    let cases = [
        ("unknown field", "command = \"true\"\nshell = true\n"),
        ("zero timeout", "command = \"true\"\ntimeout = \"0s\"\n"),
        ("bad timeout", "command = \"true\"\ntimeout = \"soon\"\n"),
        ("empty command", "command = \"  \"\n"),
        ("unterminated quote", "command = \"sh\"\narguments = \"-c 'echo\"\n"),
        ("bad env name", "command = \"true\"\n[environment]\n\"A=B\" = \"x\"\n"),
    ];

    for (name, contents) in cases {
        let path = dir.path().join("job.toml");
        fs::write(&path, contents)?;
        let result = load_and_validate(&path);
        assert!(result.is_err(), "{name}: expected an error, got {result:?}");
    }
    Ok(())
}

#[test]
fn missing_run_file_is_an_io_error() {
    let result = load_and_validate("/definitely/not/here/job.toml");
    assert!(matches!(result, Err(RunnerError::IoError(_))), "got {result:?}");
}
