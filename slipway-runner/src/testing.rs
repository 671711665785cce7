//! Test doubles for the runner's seams

use anyhow::Result;
use async_trait::async_trait;
use slipway_client::UploadOutcome;
use slipway_core::domain::artifact::BuildArtifact;
use slipway_core::domain::image::ImageTagSet;
use slipway_core::domain::trigger::{EventKind, TriggerContext};
use std::path::Path;
use std::sync::Mutex;

use crate::config::Credentials;
use crate::process::{CommandOutput, CommandRunner, CommandSpec};
use crate::service::{PackageIndex, TagRequest, TagResolver};

type Effect = Box<dyn Fn(&CommandSpec) + Send + Sync>;

/// Command runner that records every command instead of spawning it
///
/// Rules match on a substring of `CommandSpec::display()`. Commands without
/// a matching rule succeed with empty output.
#[derive(Default)]
pub struct RecordingCommandRunner {
    calls: Mutex<Vec<CommandSpec>>,
    failures: Vec<(String, String)>,
    responses: Vec<(String, String)>,
    effects: Vec<(String, Effect)>,
}

impl RecordingCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Matching commands exit with status 1 and `stderr`
    pub fn fail_on(mut self, pattern: &str, stderr: &str) -> Self {
        self.failures.push((pattern.to_string(), stderr.to_string()));
        self
    }

    /// Matching commands print `stdout`
    pub fn respond(mut self, pattern: &str, stdout: &str) -> Self {
        self.responses.push((pattern.to_string(), stdout.to_string()));
        self
    }

    /// Runs `effect` whenever a matching command runs
    pub fn on_run(
        mut self,
        pattern: &str,
        effect: impl Fn(&CommandSpec) + Send + Sync + 'static,
    ) -> Self {
        self.effects.push((pattern.to_string(), Box::new(effect)));
        self
    }

    pub fn recorded(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.recorded().iter().map(CommandSpec::display).collect()
    }
}

#[async_trait]
impl CommandRunner for RecordingCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let line = spec.display();
        self.calls.lock().unwrap().push(spec.clone());

        for (pattern, effect) in &self.effects {
            if line.contains(pattern.as_str()) {
                effect(spec);
            }
        }

        if let Some((_, stderr)) = self.failures.iter().find(|(p, _)| line.contains(p.as_str())) {
            return Ok(CommandOutput {
                exit_code: 1,
                stdout: String::new(),
                stderr: stderr.clone(),
            });
        }

        let stdout = self
            .responses
            .iter()
            .find(|(p, _)| line.contains(p.as_str()))
            .map(|(_, out)| out.clone())
            .unwrap_or_default();

        Ok(CommandOutput {
            exit_code: 0,
            stdout,
            stderr: String::new(),
        })
    }
}

/// Package index keeping uploaded file names in memory
#[derive(Default)]
pub struct InMemoryIndex {
    files: Mutex<Vec<String>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uploaded(&self) -> Vec<String> {
        self.files.lock().unwrap().clone()
    }
}

#[async_trait]
impl PackageIndex for InMemoryIndex {
    async fn upload(
        &self,
        artifact: &BuildArtifact,
        _credentials: &Credentials,
    ) -> Result<UploadOutcome> {
        let mut files = self.files.lock().unwrap();
        let name = artifact.file_name();
        if files.contains(&name) {
            return Ok(UploadOutcome::AlreadyExists);
        }
        files.push(name);
        Ok(UploadOutcome::Uploaded)
    }
}

/// Tag resolver whose tag source is always unreachable
pub struct FailingTagResolver;

#[async_trait]
impl TagResolver for FailingTagResolver {
    async fn resolve_tags(&self, _request: &TagRequest) -> Result<ImageTagSet> {
        anyhow::bail!("tag source unavailable")
    }
}

/// Context of a tag push at `abc123`
pub fn tag_context(tag: &str) -> TriggerContext {
    TriggerContext {
        event: EventKind::Push,
        git_ref: format!("refs/tags/{}", tag),
        sha: "abc123".to_string(),
        is_tag_build: true,
        is_main_branch: false,
    }
}

/// Writes an sdist and a wheel into `dir`, as a build frontend would
pub fn write_dist(dir: &Path, name: &str, version: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(format!("{}-{}.tar.gz", name, version)), b"sdist").unwrap();
    std::fs::write(
        dir.join(format!("{}-{}-py3-none-any.whl", name, version)),
        b"wheel",
    )
    .unwrap();
}
