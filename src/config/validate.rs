// src/config/validate.rs

use crate::config::arguments::split_arguments;
use crate::config::model::{
    ArgumentsSpec, DEFAULT_TIMEOUT, RawRunConfig, RunConfig, RunnerSettings,
};
use crate::errors::{Result, RunnerError};
use crate::types::parse_duration;

impl TryFrom<RawRunConfig> for RunConfig {
    type Error = crate::errors::RunnerError;

    fn try_from(raw: RawRunConfig) -> std::result::Result<Self, Self::Error> {
        validate_command(&raw.command)?;
        validate_environment(&raw)?;
        let timeout = resolve_timeout(raw.timeout.as_deref())?;
        let arguments = resolve_arguments(raw.arguments)?;

        let mut settings = RunnerSettings::new(raw.command.trim()).args(arguments);
        if let Some(dir) = raw.working_directory {
            settings = settings.working_directory(dir);
        }
        for (key, value) in raw.environment {
            settings = settings.env(key, value);
        }

        Ok(RunConfig::new_unchecked(settings, timeout))
    }
}

fn validate_command(command: &str) -> Result<()> {
    if command.trim().is_empty() {
        return Err(RunnerError::ConfigError(
            "command must not be empty".to_string(),
        ));
    }
    if command.contains('\0') {
        return Err(RunnerError::ConfigError(
            "command must not contain NUL bytes".to_string(),
        ));
    }
    Ok(())
}

fn validate_environment(cfg: &RawRunConfig) -> Result<()> {
    for (key, value) in cfg.environment.iter() {
        if key.is_empty() {
            return Err(RunnerError::ConfigError(
                "[environment] contains an empty variable name".to_string(),
            ));
        }
        if key.contains('=') || key.contains('\0') {
            return Err(RunnerError::ConfigError(format!(
                "[environment] variable name '{key}' must not contain '=' or NUL"
            )));
        }
        if value.contains('\0') {
            return Err(RunnerError::ConfigError(format!(
                "[environment] value of '{key}' must not contain NUL"
            )));
        }
    }
    Ok(())
}

pub(crate) fn resolve_timeout(raw: Option<&str>) -> Result<std::time::Duration> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_TIMEOUT);
    };
    let timeout = parse_duration(raw)
        .map_err(|e| RunnerError::ConfigError(format!("invalid timeout '{raw}': {e}")))?;
    if timeout.is_zero() {
        return Err(RunnerError::ConfigError(
            "timeout must be greater than zero".to_string(),
        ));
    }
    Ok(timeout)
}

fn resolve_arguments(spec: Option<ArgumentsSpec>) -> Result<Vec<String>> {
    match spec {
        None => Ok(Vec::new()),
        Some(ArgumentsSpec::List(list)) => Ok(list),
        Some(ArgumentsSpec::Line(line)) => split_arguments(&line),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use super::*;

    fn raw(command: &str) -> RawRunConfig {
        RawRunConfig {
            command: command.to_string(),
            ..RawRunConfig::default()
        }
    }

    fn expect_config_error(raw: RawRunConfig, needle: &str) {
        match RunConfig::try_from(raw) {
            Err(RunnerError::ConfigError(msg)) => {
                assert!(msg.contains(needle), "message {msg:?} should mention {needle:?}")
            }
            Err(e) => panic!("Expected ConfigError, got: {:?}", e),
            Ok(_) => panic!("Expected error, got Ok"),
        }
    }

    #[test]
    fn minimal_config_uses_defaults() -> Result<()> {
        let cfg = RunConfig::try_from(raw(" sleep "))?;
        assert_eq!(cfg.settings.command(), "sleep");
        assert!(cfg.settings.arguments().is_empty());
        assert!(cfg.settings.environment().is_empty());
        assert_eq!(cfg.timeout, DEFAULT_TIMEOUT);
        Ok(())
    }

    #[test]
    fn line_arguments_are_split() -> Result<()> {
        let mut r = raw("sh");
        r.arguments = Some(ArgumentsSpec::Line("-c 'exit 3'".to_string()));
        r.timeout = Some("5s".to_string());
        let cfg = RunConfig::try_from(r)?;
        assert_eq!(cfg.settings.arguments(), ["-c", "exit 3"]);
        assert_eq!(cfg.timeout, Duration::from_secs(5));
        Ok(())
    }

    #[test]
    fn empty_command_is_rejected() {
        expect_config_error(raw("   "), "command must not be empty");
    }

    #[test]
    fn bad_environment_names_are_rejected() {
        let mut r = raw("env");
        r.environment = BTreeMap::from([("A=B".to_string(), "x".to_string())]);
        expect_config_error(r, "A=B");

        let mut r = raw("env");
        r.environment = BTreeMap::from([(String::new(), "x".to_string())]);
        expect_config_error(r, "empty variable name");
    }

    #[test]
    fn bad_timeouts_are_rejected() {
        let mut r = raw("sleep");
        r.timeout = Some("soon".to_string());
        expect_config_error(r, "invalid timeout 'soon'");

        let mut r = raw("sleep");
        r.timeout = Some("0s".to_string());
        expect_config_error(r, "greater than zero");
    }

    #[test]
    fn unbalanced_quotes_are_rejected() {
        let mut r = raw("sh");
        r.arguments = Some(ArgumentsSpec::Line("-c 'echo".to_string()));
        expect_config_error(r, "unterminated");
    }
}
