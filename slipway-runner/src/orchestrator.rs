//! Release orchestrator
//!
//! Evaluates the trigger once, checks out the triggering commit, then runs
//! the selected pipelines concurrently. The workdir is not touched again once
//! the pipelines start; each gets its own log buffer and produces its own
//! report.

use anyhow::{Context, Result};
use chrono::Utc;
use slipway_client::{GithubClient, PackageIndexClient};
use slipway_core::domain::release::{IndexConfig, ReleaseDeclaration};
use slipway_core::domain::report::RunReport;
use slipway_core::domain::trigger::{TriggerDecision, TriggerEvent, evaluate};
use slipway_lua::{ProcessEnv, load_declaration};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::Config;
use crate::container::ContainerEngine;
use crate::pipeline::{ImagePipeline, PackagePipeline, SourceCheckout};
use crate::process::{CommandRunner, SystemCommandRunner};
use crate::service::{
    ArtifactStore, FilesystemArtifactStore, GithubTagResolver, InMemoryLogBuffer, PackageIndex,
    TagResolver,
};

/// Which pipelines a run executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineSelection {
    #[default]
    All,
    Package,
    Images,
}

impl PipelineSelection {
    pub fn includes_package(self) -> bool {
        matches!(self, PipelineSelection::All | PipelineSelection::Package)
    }

    pub fn includes_images(self) -> bool {
        matches!(self, PipelineSelection::All | PipelineSelection::Images)
    }
}

/// External collaborators of a run
#[derive(Clone)]
pub struct Services {
    pub runner: Arc<dyn CommandRunner>,
    pub store: Arc<dyn ArtifactStore>,
    pub index: Arc<dyn PackageIndex>,
    pub tags: Arc<dyn TagResolver>,
}

impl Services {
    /// Production services: real processes, the filesystem store, HTTP clients
    pub fn from_config(config: &Config, declaration: &ReleaseDeclaration) -> Self {
        let index_url = declaration
            .package
            .as_ref()
            .map(|package| package.index.url.clone())
            .unwrap_or_else(|| IndexConfig::default().url);
        let github = GithubClient::new(
            &config.github_api_url,
            config
                .secrets
                .github_token
                .as_ref()
                .map(|token| token.expose().to_string()),
        );

        Self {
            runner: Arc::new(SystemCommandRunner::new()),
            store: Arc::new(FilesystemArtifactStore::new(config.artifact_root())),
            index: Arc::new(PackageIndexClient::new(index_url)),
            tags: Arc::new(GithubTagResolver::new(
                github,
                config.github_repository.clone(),
            )),
        }
    }
}

/// Runs a release declaration against trigger events
pub struct ReleaseOrchestrator {
    config: Config,
    declaration: ReleaseDeclaration,
    services: Services,
}

impl ReleaseOrchestrator {
    pub fn new(config: Config, declaration: ReleaseDeclaration, services: Services) -> Self {
        Self {
            config,
            declaration,
            services,
        }
    }

    /// Loads the declaration named by `config` and wires production services
    pub fn from_config(config: Config) -> Result<Self> {
        let declaration = load_declaration(&config.workdir, &config.declaration, ProcessEnv)
            .with_context(|| {
                format!(
                    "Failed to load release declaration {}",
                    config.declaration.display()
                )
            })?;
        let services = Services::from_config(&config, &declaration);
        Ok(Self::new(config, declaration, services))
    }

    pub fn declaration(&self) -> &ReleaseDeclaration {
        &self.declaration
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Evaluates the trigger and runs the selected pipelines
    ///
    /// A skipped trigger yields a report without pipelines. A failed checkout
    /// ends the run before any pipeline starts.
    pub async fn run(&self, event: &TriggerEvent, selection: PipelineSelection) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let decision = evaluate(event, &self.declaration.trigger);

        let context = match &decision {
            TriggerDecision::Skip(reason) => {
                info!("Release {} skipped: {}", self.declaration.name, reason);
                return RunReport {
                    run_id,
                    started_at,
                    decision,
                    source: None,
                    package: None,
                    images: None,
                };
            }
            TriggerDecision::Run(context) => context.clone(),
        };

        info!(
            "Starting release run {} of {} for {} at {}",
            run_id, self.declaration.name, context.git_ref, context.sha
        );

        let source = SourceCheckout::new(
            self.config.workdir.clone(),
            context.sha.clone(),
            self.services.runner.clone(),
            Arc::new(InMemoryLogBuffer::new()),
        )
        .run()
        .await;
        if !source.succeeded() {
            error!(
                "Release run {} stopped: {} could not be checked out",
                run_id, context.sha
            );
            return RunReport {
                run_id,
                started_at,
                decision,
                source: Some(source),
                package: None,
                images: None,
            };
        }

        let engine = ContainerEngine::new(
            &self.config.container_engine,
            self.services.runner.clone(),
        );

        let package = async {
            let Some(config) = self.declaration.package.as_ref() else {
                return None;
            };
            if !selection.includes_package() {
                return None;
            }
            let pipeline = PackagePipeline::new(
                config.clone(),
                context.clone(),
                self.config.workdir.clone(),
                self.services.runner.clone(),
                engine.clone(),
                self.services.store.clone(),
                self.services.index.clone(),
                self.config.secrets.index.clone(),
                Arc::new(InMemoryLogBuffer::new()),
            );
            Some(pipeline.run().await)
        };

        let images = async {
            let Some(config) = self.declaration.images.as_ref() else {
                return None;
            };
            if !selection.includes_images() {
                return None;
            }
            let pipeline = ImagePipeline::new(
                config.clone(),
                context.clone(),
                self.config.workdir.clone(),
                run_id,
                engine.clone(),
                self.services.tags.clone(),
                self.config.secrets.registry.clone(),
                Arc::new(InMemoryLogBuffer::new()),
            );
            Some(pipeline.run().await)
        };

        let (package, images) = tokio::join!(package, images);

        let report = RunReport {
            run_id,
            started_at,
            decision,
            source: Some(source),
            package,
            images,
        };
        info!(
            "Release run {} finished: {}",
            run_id,
            if report.succeeded() { "success" } else { "failure" }
        );
        report
    }
}
