// src/config/arguments.rs

//! Argument-string quoting contract.
//!
//! The runner never goes through a shell: the executable is started directly
//! with a list of arguments. When arguments are given as a single string
//! (e.g. `arguments = "-c 'echo hi'"` in a run file) they are split with
//! POSIX shell word-splitting rules:
//!
//! - unquoted whitespace separates arguments;
//! - `'...'` groups text literally;
//! - `"..."` groups text; inside, a backslash only escapes `"`, `\`, `$`,
//!   `` ` `` and newline;
//! - outside quotes, a backslash makes the next character literal;
//! - a word starting with `#` begins a comment that runs to end of line.
//!
//! No variable expansion, globbing or redirection happens. An unterminated
//! quote or a dangling backslash is a configuration error.

use std::borrow::Cow;

use crate::errors::{Result, RunnerError};

/// Split an argument string into individual arguments.
pub fn split_arguments(line: &str) -> Result<Vec<String>> {
    shell_words::split(line).map_err(|err| {
        RunnerError::ConfigError(format!("unterminated quote in arguments ({err}): {line}"))
    })
}

/// Quote a single argument so that [`split_arguments`] yields it back unchanged.
pub fn quote_argument(arg: &str) -> Cow<'_, str> {
    shell_words::quote(arg)
}

/// Render a list of arguments as one string, quoting where needed.
pub fn join_arguments<S: AsRef<str>>(args: &[S]) -> String {
    shell_words::join(args)
}
