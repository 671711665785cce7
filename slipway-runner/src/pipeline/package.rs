//! Package pipeline
//!
//! toolchain → build → verify-sdist → verify-installed-data →
//! isolated-install → upload-artifact → publish (tag builds only).

use anyhow::{Context, Result};
use slipway_core::domain::artifact::{BuildArtifact, BuildArtifactSet};
use slipway_core::domain::log::LogLevel;
use slipway_core::domain::release::PackageConfig;
use slipway_core::domain::report::{FailureKind, PipelineKind, PipelineReport};
use slipway_core::domain::trigger::TriggerContext;
use slipway_client::UploadOutcome;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::PipelineRun;
use crate::config::Credentials;
use crate::container::{ContainerEngine, Mount};
use crate::process::{CommandRunner, CommandSpec};
use crate::service::{ArtifactBundle, ArtifactStore, LogBufferService, PackageIndex};

/// Mount point of the output directory inside the isolation container
const ISOLATION_MOUNT: &str = "/dist";

/// Output of the build step
struct BuildOutput {
    artifacts: BuildArtifactSet,
    /// Everything the build wrote, recognised or not
    files: Vec<PathBuf>,
}

/// Builds, verifies, retains and publishes the package
pub struct PackagePipeline {
    config: PackageConfig,
    context: TriggerContext,
    workdir: PathBuf,
    runner: Arc<dyn CommandRunner>,
    engine: ContainerEngine,
    store: Arc<dyn ArtifactStore>,
    index: Arc<dyn PackageIndex>,
    credentials: Option<Credentials>,
    logs: Arc<dyn LogBufferService>,
}

impl PackagePipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: PackageConfig,
        context: TriggerContext,
        workdir: PathBuf,
        runner: Arc<dyn CommandRunner>,
        engine: ContainerEngine,
        store: Arc<dyn ArtifactStore>,
        index: Arc<dyn PackageIndex>,
        credentials: Option<Credentials>,
        logs: Arc<dyn LogBufferService>,
    ) -> Self {
        Self {
            config,
            context,
            workdir,
            runner,
            engine,
            store,
            index,
            credentials,
            logs,
        }
    }

    /// Runs every step in order, stopping at the first failure
    pub async fn run(&self) -> PipelineReport {
        let mut run = PipelineRun::new(PipelineKind::Package, self.logs.clone());

        if run
            .step("toolchain", FailureKind::Toolchain, self.toolchain())
            .await
            .is_none()
        {
            return run.finish();
        }

        let Some(output) = run.step("build", FailureKind::Build, self.build()).await else {
            return run.finish();
        };
        run.log(
            LogLevel::Info,
            format!(
                "Built {}",
                output
                    .artifacts
                    .iter()
                    .map(BuildArtifact::file_name)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        );

        if run
            .step(
                "verify-sdist",
                FailureKind::Verification,
                self.verify_sdist(&output.artifacts),
            )
            .await
            .is_none()
        {
            return run.finish();
        }

        if run
            .step(
                "verify-installed-data",
                FailureKind::Verification,
                self.verify_installed_data(&output.artifacts),
            )
            .await
            .is_none()
        {
            return run.finish();
        }

        if run
            .step(
                "isolated-install",
                FailureKind::Isolation,
                self.isolated_install(&output.artifacts),
            )
            .await
            .is_none()
        {
            return run.finish();
        }

        if run
            .step(
                "upload-artifact",
                FailureKind::ArtifactUpload,
                self.upload_artifact(&output.files),
            )
            .await
            .is_none()
        {
            return run.finish();
        }

        if self.context.is_tag_build {
            run.step(
                "publish",
                FailureKind::Publish,
                self.publish(&output.artifacts),
            )
            .await;
        } else {
            run.skip("publish", "not a tag build");
        }

        run.finish()
    }

    fn output_dir(&self) -> PathBuf {
        self.workdir.join(&self.config.output_dir)
    }

    async fn toolchain(&self) -> Result<()> {
        for runtime in &self.config.toolchain.runtimes {
            let output = self
                .runner
                .run_checked(&CommandSpec::new(runtime).arg("--version"))
                .await
                .with_context(|| format!("Runtime '{}' is not available", runtime))?;
            let version = if output.stdout.trim().is_empty() {
                output.stderr.trim()
            } else {
                output.stdout.trim()
            };
            self.logs
                .log(LogLevel::Info, format!("{}: {}", runtime, version));
        }

        for command in &self.config.toolchain.install {
            self.runner
                .run_checked(&CommandSpec::from_command_line(command).current_dir(&self.workdir))
                .await
                .with_context(|| format!("Failed to install build tooling with '{}'", command))?;
        }
        Ok(())
    }

    async fn build(&self) -> Result<BuildOutput> {
        let output_dir = self.output_dir();
        if tokio::fs::try_exists(&output_dir).await.unwrap_or(false) {
            tokio::fs::remove_dir_all(&output_dir)
                .await
                .with_context(|| format!("Failed to clean {}", output_dir.display()))?;
        }

        self.runner
            .run_checked(
                &CommandSpec::from_command_line(&self.config.build).current_dir(&self.workdir),
            )
            .await?;

        let files = list_files(&output_dir)
            .await
            .with_context(|| format!("Build wrote no output to {}", output_dir.display()))?;
        let artifacts = BuildArtifactSet::from_paths(files.iter().cloned());
        if artifacts.is_empty() {
            anyhow::bail!(
                "build produced no package artifacts in {}",
                output_dir.display()
            );
        }

        Ok(BuildOutput { artifacts, files })
    }

    async fn verify_sdist(&self, artifacts: &BuildArtifactSet) -> Result<()> {
        let sdist = artifacts.sdist().context("no source archive was built")?;
        let command = self
            .config
            .verify_sdist
            .with_arg(sdist.path.display().to_string());

        self.runner
            .run_checked(&CommandSpec::from_command_line(&command).current_dir(&self.workdir))
            .await
            .with_context(|| format!("Source archive {} failed verification", sdist.file_name()))?;
        Ok(())
    }

    async fn verify_installed_data(&self, artifacts: &BuildArtifactSet) -> Result<()> {
        let wheel = artifacts.wheel().context("no binary package was built")?;
        let install = self
            .config
            .install_wheel
            .with_arg(wheel.path.display().to_string());

        self.runner
            .run_checked(&CommandSpec::from_command_line(&install).current_dir(&self.workdir))
            .await
            .with_context(|| format!("Failed to install {}", wheel.file_name()))?;

        self.runner
            .run_checked(
                &CommandSpec::from_command_line(&self.config.verify_installed)
                    .current_dir(&self.workdir),
            )
            .await
            .context("Installed package data failed verification")?;
        Ok(())
    }

    async fn isolated_install(&self, artifacts: &BuildArtifactSet) -> Result<()> {
        let sdist = artifacts.sdist().context("no source archive was built")?;
        let output_dir = tokio::fs::canonicalize(self.output_dir())
            .await
            .context("Failed to resolve the output directory")?;

        let command = self
            .config
            .isolation
            .install
            .with_arg(format!("{}/{}", ISOLATION_MOUNT, sdist.file_name()));
        let argv: Vec<String> = std::iter::once(command.program().to_string())
            .chain(command.args().iter().cloned())
            .collect();

        self.engine
            .run_disposable(
                &self.config.isolation.image,
                &[Mount {
                    host: output_dir,
                    container: ISOLATION_MOUNT.to_string(),
                }],
                &argv,
            )
            .await
            .with_context(|| {
                format!(
                    "{} does not install in {}",
                    sdist.file_name(),
                    self.config.isolation.image
                )
            })?;
        Ok(())
    }

    async fn upload_artifact(&self, files: &[PathBuf]) -> Result<()> {
        let stored = self
            .store
            .upload(&ArtifactBundle {
                name: self.config.artifact.name.clone(),
                sha: self.context.sha.clone(),
                retention_days: self.config.artifact.retention_days,
                files: files.to_vec(),
            })
            .await?;

        self.logs.log(
            LogLevel::Info,
            format!(
                "Retained {} file(s) in {} for {} days",
                stored.manifest.files.len(),
                stored.location.display(),
                stored.manifest.retention_days
            ),
        );
        Ok(())
    }

    async fn publish(&self, artifacts: &BuildArtifactSet) -> Result<()> {
        let credentials = self
            .credentials
            .as_ref()
            .context("package index credentials are not configured (PYPI_PASSWORD)")?;

        for artifact in artifacts.iter() {
            let outcome = self
                .index
                .upload(artifact, credentials)
                .await
                .with_context(|| format!("Failed to publish {}", artifact.file_name()))?;

            let message = match outcome {
                UploadOutcome::Uploaded => format!("Published {}", artifact.file_name()),
                UploadOutcome::AlreadyExists => {
                    format!("{} is already published, skipping", artifact.file_name())
                }
            };
            self.logs.log(LogLevel::Info, message);
        }
        Ok(())
    }
}

/// Regular files directly inside `dir`, sorted by name
async fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
