//! Trigger event flags
//!
//! Builds a `TriggerEvent` from flags, falling back to the variables the CI
//! platform exports.

use anyhow::{Context, Result};
use clap::Args;
use slipway_core::domain::trigger::{EventKind, TriggerEvent};
use slipway_runner::process::{CommandRunner, CommandSpec, SystemCommandRunner};
use std::path::{Path, PathBuf};

/// Flags describing the triggering event
#[derive(Args, Debug, Clone)]
pub struct EventArgs {
    /// Event name (pull_request, push, workflow_dispatch)
    #[arg(long, env = "GITHUB_EVENT_NAME", default_value = "workflow_dispatch")]
    pub event: String,

    /// Full git ref, e.g. refs/heads/main or refs/tags/4.1.0
    #[arg(long = "ref", env = "GITHUB_REF")]
    pub git_ref: Option<String>,

    /// Commit SHA being built
    #[arg(long, env = "GITHUB_SHA")]
    pub sha: Option<String>,

    /// Changed file (repeatable)
    #[arg(long = "changed-file")]
    pub changed_files: Vec<String>,

    /// File listing changed files, one per line
    #[arg(long)]
    pub changed_files_from: Option<PathBuf>,

    /// Compute changed files with `git diff --name-only <REV>...HEAD`
    #[arg(long)]
    pub diff_base: Option<String>,
}

impl EventArgs {
    /// Resolves the flags into an event, running git when needed
    pub async fn to_event(&self, workdir: &Path) -> Result<TriggerEvent> {
        let kind = EventKind::parse(&self.event)
            .with_context(|| format!("Unknown event '{}'", self.event))?;

        let git_ref = match &self.git_ref {
            Some(git_ref) if !git_ref.trim().is_empty() => git_ref.trim().to_string(),
            _ => anyhow::bail!("No ref given; pass --ref or set GITHUB_REF"),
        };

        let mut changed_files = self.changed_files.clone();
        if let Some(path) = &self.changed_files_from {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            changed_files.extend(parse_file_list(&content));
        }
        if let Some(base) = &self.diff_base {
            let output = SystemCommandRunner::new()
                .run_checked(
                    &CommandSpec::new("git")
                        .args(["diff", "--name-only"])
                        .arg(format!("{}...HEAD", base))
                        .current_dir(workdir),
                )
                .await
                .context("Failed to compute changed files")?;
            changed_files.extend(parse_file_list(&output.stdout));
        }
        dedup_in_order(&mut changed_files);

        Ok(TriggerEvent {
            kind,
            git_ref,
            sha: self.sha.clone().unwrap_or_default(),
            changed_files,
        })
    }
}

fn parse_file_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

fn dedup_in_order(files: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    files.retain(|f| seen.insert(f.clone()));
}
