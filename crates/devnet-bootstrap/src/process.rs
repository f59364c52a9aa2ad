//! External process invocation.
//!
//! Commands are always an explicit program plus argument list; nothing is
//! ever passed through a shell.

use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::process::Stdio;
use tracing::debug;

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program to run, looked up on `PATH` when not a path.
    pub program: OsString,
    /// Arguments, passed verbatim.
    pub args: Vec<OsString>,
}

impl Invocation {
    /// Starts an invocation of `program` with no arguments.
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// What a finished process left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when terminated by a signal.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the process exited with code 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs external programs.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `invocation` to completion, capturing its output.
    ///
    /// An `Err` means the process could not be started at all; a process
    /// that starts and fails is an `Ok` with a non-zero code.
    async fn run(&self, invocation: &Invocation) -> std::io::Result<CommandOutput>;

    /// Whether `program` can be launched.
    async fn is_available(&self, program: &str) -> bool;
}

/// Runs programs as child processes of this one.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> std::io::Result<CommandOutput> {
        debug!(command = %invocation, "Running command");

        let output = tokio::process::Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .output()
            .await?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn is_available(&self, program: &str) -> bool {
        let probe = tokio::process::Command::new(program)
            .arg("--help")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        debug!(program, available = probe.is_ok(), "Probed program");
        probe.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn invocation_builder() {
        let inv = Invocation::new("docker")
            .arg("run")
            .args(["--rm", "-v", "/a b:/data"]);
        assert_eq!(inv.args.len(), 4);
        // Arguments with spaces stay one argument.
        assert_eq!(inv.args[3], OsString::from("/a b:/data"));
        assert_eq!(inv.to_string(), "docker run --rm -v /a b:/data");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn system_runner_captures_output() {
        let runner = SystemRunner;
        let out = runner
            .run(&Invocation::new("sh").args(["-c", "echo hello; echo oops >&2; exit 3"]))
            .await
            .unwrap();
        assert_eq!(out.code, Some(3));
        assert_eq!(out.stdout, "hello\n");
        assert_eq!(out.stderr, "oops\n");
        assert!(!out.success());
    }

    #[tokio::test]
    async fn missing_program_is_unavailable() {
        let runner = SystemRunner;
        assert!(!runner.is_available("devnet-no-such-program-xyz").await);
        assert!(runner
            .run(&Invocation::new("devnet-no-such-program-xyz"))
            .await
            .is_err());
    }
}
