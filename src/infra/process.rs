//! External tool invocation
//!
//! Every partitioning, mkfs, mount and btrfs call goes through the
//! [`CommandRunner`] trait. [`SystemRunner`] spawns real processes; tests
//! substitute a recording runner.

use std::fmt;
use std::io::{self, Write};
use std::process::{Command, Stdio};

/// A command to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program name, looked up on `PATH`
    pub program: String,
    /// Arguments
    pub args: Vec<String>,
    /// Data written to the child's standard input
    pub stdin: Option<String>,
}

impl Invocation {
    /// Start building an invocation
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    /// Add a single argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Feed `input` to the child's standard input
    #[must_use]
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, -1 when terminated by a signal
    pub code: i32,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the command exited with status 0
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// A short failure description: trimmed stderr, or the exit code
    pub fn failure_message(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            format!("exit code {}", self.code)
        } else {
            format!("exit code {}: {stderr}", self.code)
        }
    }
}

/// Runs external commands to completion
pub trait CommandRunner: Send + Sync {
    /// Run a command, blocking until it exits.
    ///
    /// An `Err` means the command could not be started or did not accept
    /// its input; a non-zero exit is reported through [`CommandOutput::code`].
    fn run(&self, invocation: &Invocation) -> io::Result<CommandOutput>;
}

/// Runs commands as real child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> io::Result<CommandOutput> {
        tracing::debug!("Running: {}", invocation);

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });

        let mut child = command.spawn()?;
        // The pipe closes when the match arm ends, so the child sees EOF
        let written = match (&invocation.stdin, child.stdin.take()) {
            (Some(input), Some(mut pipe)) => pipe.write_all(input.as_bytes()),
            _ => Ok(()),
        };
        // Reap the child even when it stopped reading early
        let output = child.wait_with_output()?;

        let result = CommandOutput {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        if let Err(e) = written {
            return Err(io::Error::new(
                e.kind(),
                format!(
                    "failed to write input to {}: {e} ({})",
                    invocation.program,
                    result.failure_message()
                ),
            ));
        }
        if !result.success() {
            tracing::debug!("{} failed with {}", invocation.program, result.failure_message());
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_builder_and_display() {
        let invocation = Invocation::new("mkfs.fat")
            .arg("-F")
            .args(["32", "/dev/sda1"]);
        assert_eq!(invocation.to_string(), "mkfs.fat -F 32 /dev/sda1");
        assert!(invocation.stdin.is_none());
    }

    #[test]
    fn test_failure_message() {
        let output = CommandOutput {
            code: 32,
            stderr: "  mount: wrong fs type\n".to_string(),
            ..CommandOutput::default()
        };
        assert!(!output.success());
        assert_eq!(output.failure_message(), "exit code 32: mount: wrong fs type");

        let silent = CommandOutput {
            code: 1,
            ..CommandOutput::default()
        };
        assert_eq!(silent.failure_message(), "exit code 1");
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_captures_exit_code_and_stdin() {
        let runner = SystemRunner;
        let output = runner
            .run(&Invocation::new("sh").args(["-c", "cat; exit 3"]).stdin("hello"))
            .unwrap();
        assert_eq!(output.code, 3);
        assert_eq!(output.stdout, "hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_reaps_child_that_ignores_stdin() {
        // Larger than a pipe buffer, so the write fails once the child exits
        let input = "x".repeat(1 << 20);
        let err = SystemRunner
            .run(
                &Invocation::new("sh")
                    .args(["-c", "echo 'no input wanted' >&2; exit 3"])
                    .stdin(input),
            )
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        let message = err.to_string();
        assert!(message.contains("failed to write input to sh"));
        assert!(message.contains("exit code 3: no input wanted"));
    }

    #[test]
    fn test_system_runner_missing_program() {
        let result = SystemRunner.run(&Invocation::new("lithos-no-such-program"));
        assert!(result.is_err());
    }
}
