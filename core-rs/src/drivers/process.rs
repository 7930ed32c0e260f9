//! Subprocess execution
//!
//! Every external command (git, docker, composer, npm, hook scripts) goes
//! through [`ProcessRunner`] so workflows can be exercised with a scripted
//! runner instead of real tools.

use std::path::Path;
use std::process::{Command, Stdio};

use crate::errors::{Result, WtmError};

/// Captured result of one command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Turn a non-zero exit into `SubprocessFailure`
    pub fn require_success(self, command: &str) -> Result<Self> {
        if self.success() {
            return Ok(self);
        }
        Err(WtmError::SubprocessFailure {
            command: command.to_string(),
            exit_code: self.exit_code,
            stderr: self.stderr,
        })
    }
}

pub trait ProcessRunner {
    /// Run `program` with `args` in `cwd`
    fn run(&self, program: &str, args: &[&str], cwd: &Path) -> Result<CommandOutput>;

    /// Run a command line through `sh -c`
    fn run_shell(&self, command: &str, cwd: &Path) -> Result<CommandOutput> {
        self.run("sh", &["-c", command], cwd)
    }
}

/// Runs real processes
///
/// With `stream_stdout` the child's stdout goes straight to the terminal
/// (installers are chatty) and only stderr is captured.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner {
    stream_stdout: bool,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn streaming() -> Self {
        SystemRunner {
            stream_stdout: true,
        }
    }
}

impl ProcessRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str], cwd: &Path) -> Result<CommandOutput> {
        tracing::debug!(program, ?args, cwd = %cwd.display(), "spawning");

        let mut command = Command::new(program);
        command.args(args).current_dir(cwd);
        if self.stream_stdout {
            command.stdout(Stdio::inherit());
        }

        let output = command.output()?;
        let result = CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        tracing::debug!(program, exit_code = result.exit_code, "process finished");
        Ok(result)
    }
}
