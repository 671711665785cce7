//! Source checkout
//!
//! Runs once per release, before any pipeline starts, so the package and
//! image pipelines both read the tree of the triggering commit and never
//! move it under each other.

use anyhow::{Context, Result};
use slipway_core::domain::log::LogLevel;
use slipway_core::domain::report::{FailureKind, PipelineKind, PipelineReport};
use std::path::PathBuf;
use std::sync::Arc;

use super::PipelineRun;
use crate::process::{CommandRunner, CommandSpec};
use crate::service::LogBufferService;

/// Puts the workdir at the triggering commit
pub struct SourceCheckout {
    workdir: PathBuf,
    sha: String,
    runner: Arc<dyn CommandRunner>,
    logs: Arc<dyn LogBufferService>,
}

impl SourceCheckout {
    pub fn new(
        workdir: PathBuf,
        sha: impl Into<String>,
        runner: Arc<dyn CommandRunner>,
        logs: Arc<dyn LogBufferService>,
    ) -> Self {
        Self {
            workdir,
            sha: sha.into(),
            runner,
            logs,
        }
    }

    /// Runs the `checkout` step; a workdir outside git is left as it is
    pub async fn run(&self) -> PipelineReport {
        let mut run = PipelineRun::new(PipelineKind::Source, self.logs.clone());

        if self.is_git_checkout().await {
            run.step("checkout", FailureKind::Checkout, self.checkout())
                .await;
        } else {
            run.skip("checkout", "workdir is not a git checkout");
        }

        run.finish()
    }

    async fn git(&self, args: &[&str]) -> Result<String> {
        let output = self
            .runner
            .run_checked(
                &CommandSpec::new("git")
                    .args(args.iter().copied())
                    .current_dir(&self.workdir),
            )
            .await?;
        Ok(output.stdout.trim().to_string())
    }

    async fn is_git_checkout(&self) -> bool {
        tokio::fs::try_exists(self.workdir.join(".git"))
            .await
            .unwrap_or(false)
    }

    async fn checkout(&self) -> Result<()> {
        let head = self.git(&["rev-parse", "HEAD"]).await?;
        if self.sha.is_empty() || head == self.sha {
            self.logs
                .log(LogLevel::Info, format!("Workdir is at {}", head));
            return Ok(());
        }

        self.logs.log(
            LogLevel::Info,
            format!("Checking out {} (was {})", self.sha, head),
        );
        self.git(&["checkout", "--detach", self.sha.as_str()])
            .await
            .with_context(|| format!("Failed to check out {}", self.sha))?;
        Ok(())
    }
}
