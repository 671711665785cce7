//! External command execution
//!
//! Every tool a release drives (git, the build frontend, the container
//! engine) goes through `CommandRunner`, so pipelines can be exercised
//! against a recording fake instead of real processes.

use anyhow::{Context, Result};
use async_trait::async_trait;
use slipway_core::domain::release::CommandLine;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::Secret;

/// A command to run: program, arguments, working directory and optional stdin
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Written to the child's stdin, then closed; never rendered by `display()`
    pub stdin: Option<Secret>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            stdin: None,
        }
    }

    pub fn from_command_line(command: &CommandLine) -> Self {
        Self::new(command.program()).args(command.args().iter().cloned())
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn stdin_secret(mut self, secret: Secret) -> Self {
        self.stdin = Some(secret);
        self
    }

    /// Printable command line, safe to log
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// -1 when the process was killed by a signal
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs external commands
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs a command to completion
    ///
    /// Returns an error only when the process could not be started; a
    /// non-zero exit status is reported through `CommandOutput`.
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;

    /// Runs a command and turns a non-zero exit status into an error
    async fn run_checked(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let output = self.run(spec).await?;
        if !output.success() {
            anyhow::bail!(
                "'{}' failed with exit code {}:\nstdout: {}\nstderr: {}",
                spec.display(),
                output.exit_code,
                output.stdout.trim(),
                output.stderr.trim()
            );
        }
        Ok(output)
    }
}

/// Runs commands as child processes of the current process
#[derive(Debug, Clone, Default)]
pub struct SystemCommandRunner;

impl SystemCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        debug!("Running: {}", spec.display());

        let mut command = tokio::process::Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }

        let mut child = command
            .spawn()
            .with_context(|| format!("Failed to execute '{}'. Is it installed?", spec.program))?;

        if let Some(secret) = &spec.stdin {
            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(secret.expose().as_bytes())
                    .await
                    .with_context(|| format!("Failed to write stdin of '{}'", spec.program))?;
            }
        }

        let output = child
            .wait_with_output()
            .await
            .with_context(|| format!("Failed to wait for '{}'", spec.program))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        // Always log stdout/stderr as debug
        if !stdout.trim().is_empty() {
            debug!("{} stdout: {}", spec.program, stdout.trim());
        }
        if !stderr.trim().is_empty() {
            debug!("{} stderr: {}", spec.program, stderr.trim());
        }

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout,
            stderr,
        })
    }
}
