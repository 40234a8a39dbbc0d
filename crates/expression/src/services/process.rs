//! External process execution for `exec` and `exec_binary`
//!
//! Every command runs on its own single-use thread and the caller blocks
//! until the process exits. There is no timeout.

use std::process::Command;
use std::thread;

use structr_log::debug;

use crate::error::{ExpressionError, ExpressionResult};

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub status: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

pub trait ProcessRunner: Send + Sync {
    /// Run a command line to completion
    fn run(&self, command_line: &str) -> ExpressionResult<ProcessOutput>;
}

/// Runs command lines through `sh -c`
#[derive(Debug, Clone)]
pub struct ShellProcessRunner {
    shell: String,
}

impl ShellProcessRunner {
    pub fn new() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }

    /// Use a different shell binary, invoked as `<shell> -c <command>`
    #[must_use]
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }
}

impl Default for ShellProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRunner for ShellProcessRunner {
    fn run(&self, command_line: &str) -> ExpressionResult<ProcessOutput> {
        let shell = self.shell.clone();
        let line = command_line.to_string();
        debug!(command = %line, "Executing script");

        let worker = thread::Builder::new()
            .name("structr-exec".to_string())
            .spawn(move || Command::new(shell).arg("-c").arg(line).output())?;

        let output = worker
            .join()
            .map_err(|_| ExpressionError::internal("script worker panicked"))??;

        Ok(ProcessOutput {
            status: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_captures_both_streams() {
        let output = ShellProcessRunner::new()
            .run("printf out; printf err 1>&2; exit 3")
            .unwrap();
        assert_eq!(output.stdout_text(), "out");
        assert_eq!(output.stderr_text(), "err");
        assert_eq!(output.status, Some(3));
    }

    #[test]
    fn test_missing_shell_is_io_error() {
        let err = ShellProcessRunner::new()
            .with_shell("/definitely/not/a/shell")
            .run("true")
            .unwrap_err();
        assert_eq!(err.code(), "EXPR:IO");
    }
}
