//! Container engine operations
//!
//! Wraps the docker-compatible CLI for everything a release needs:
//! - checking the engine is available
//! - disposable containers for isolated installs
//! - the ephemeral local registry side service
//! - QEMU emulation and buildx builders for multi-platform images
//! - registry login and image build-and-push

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Secret;
use crate::process::{CommandOutput, CommandRunner, CommandSpec};

const BINFMT_IMAGE: &str = "tonistiigi/binfmt";

/// A read-only bind mount for a disposable container
#[derive(Debug, Clone)]
pub struct Mount {
    pub host: PathBuf,
    pub container: String,
}

/// One multi-platform build, pushed under every tag
#[derive(Debug, Clone)]
pub struct BuildxRequest {
    pub builder: String,
    pub context: PathBuf,
    pub platforms: Vec<String>,
    pub tags: Vec<String>,
    pub build_args: BTreeMap<String, String>,
}

/// Container engine driven through its CLI
#[derive(Clone)]
pub struct ContainerEngine {
    program: String,
    runner: Arc<dyn CommandRunner>,
}

impl ContainerEngine {
    /// Creates an engine wrapper
    ///
    /// # Arguments
    /// * `program` - Engine CLI, e.g. `docker` or `podman`
    /// * `runner` - Command runner used for every invocation
    pub fn new(program: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            program: program.into(),
            runner,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self) -> CommandSpec {
        CommandSpec::new(&self.program)
    }

    /// Checks that the engine CLI is installed and answers
    pub async fn check_available(&self) -> Result<String> {
        let output = self
            .runner
            .run_checked(&self.command().arg("--version"))
            .await
            .with_context(|| format!("'{}' is not working correctly", self.program))?;

        let version = output.stdout.trim().to_string();
        info!("Container engine is available: {}", version);
        Ok(version)
    }

    /// Runs a command in a throwaway container that is removed on exit
    ///
    /// Mounts are attached read-only.
    pub async fn run_disposable(
        &self,
        image: &str,
        mounts: &[Mount],
        command: &[String],
    ) -> Result<CommandOutput> {
        let mut spec = self.command().args(["run", "--rm"]);
        for mount in mounts {
            spec = spec
                .arg("-v")
                .arg(format!("{}:{}:ro", mount.host.display(), mount.container));
        }
        spec = spec.arg(image).args(command.iter().cloned());

        info!("Running disposable container from {}", image);
        self.runner
            .run_checked(&spec)
            .await
            .with_context(|| format!("Command in disposable {} container failed", image))
    }

    /// Starts a detached registry container publishing `port` on the host
    pub async fn start_registry(&self, name: &str, image: &str, port: u16) -> Result<()> {
        info!("Starting local registry {} on port {}", name, port);
        let output = self
            .runner
            .run_checked(&self.command().args([
                "run".to_string(),
                "-d".to_string(),
                "--rm".to_string(),
                "-p".to_string(),
                format!("{}:5000", port),
                "--name".to_string(),
                name.to_string(),
                image.to_string(),
            ]))
            .await
            .with_context(|| format!("Failed to start local registry {}", name))?;

        debug!("Registry container id: {}", output.stdout.trim());
        Ok(())
    }

    /// Stops a container started with `--rm`, which also removes it
    pub async fn stop_container(&self, name: &str) -> Result<()> {
        debug!("Stopping container {}", name);
        self.runner
            .run_checked(&self.command().args(["stop", name]))
            .await
            .with_context(|| format!("Failed to stop container {}", name))?;
        Ok(())
    }

    /// Registers QEMU handlers so foreign platforms can be built
    pub async fn setup_emulation(&self) -> Result<()> {
        info!("Installing binfmt emulators");
        self.runner
            .run_checked(&self.command().args([
                "run",
                "--privileged",
                "--rm",
                BINFMT_IMAGE,
                "--install",
                "all",
            ]))
            .await
            .context("Failed to install binfmt emulators")?;
        Ok(())
    }

    /// Creates and selects a buildx builder
    ///
    /// `host_network` lets the builder reach a registry on the host's
    /// localhost.
    pub async fn create_builder(&self, name: &str, host_network: bool) -> Result<()> {
        info!("Creating buildx builder {}", name);
        let mut spec = self
            .command()
            .args(["buildx", "create", "--use", "--name", name]);
        if host_network {
            spec = spec.args(["--driver-opt", "network=host"]);
        }

        self.runner
            .run_checked(&spec)
            .await
            .with_context(|| format!("Failed to create buildx builder {}", name))?;
        Ok(())
    }

    pub async fn remove_builder(&self, name: &str) -> Result<()> {
        debug!("Removing buildx builder {}", name);
        self.runner
            .run_checked(&self.command().args(["buildx", "rm", name]))
            .await
            .with_context(|| format!("Failed to remove buildx builder {}", name))?;
        Ok(())
    }

    /// Logs in to a registry; the password goes through stdin
    ///
    /// `registry` of `None` means the engine's default registry.
    pub async fn login(
        &self,
        registry: Option<&str>,
        username: &str,
        password: &Secret,
    ) -> Result<()> {
        info!(
            "Logging in to {} as {}",
            registry.unwrap_or("default registry"),
            username
        );
        let mut spec = self
            .command()
            .args(["login", "-u", username, "--password-stdin"])
            .stdin_secret(password.clone());
        if let Some(registry) = registry {
            spec = spec.arg(registry);
        }

        self.runner
            .run_checked(&spec)
            .await
            .context("Registry login failed")?;
        Ok(())
    }

    /// Builds for every platform and pushes each tag
    pub async fn buildx_build(&self, request: &BuildxRequest) -> Result<()> {
        if request.tags.is_empty() {
            anyhow::bail!("refusing to build {} without tags", request.context.display());
        }

        let mut spec = self.command().args([
            "buildx".to_string(),
            "build".to_string(),
            "--builder".to_string(),
            request.builder.clone(),
            "--platform".to_string(),
            request.platforms.join(","),
            "--push".to_string(),
        ]);
        for tag in &request.tags {
            spec = spec.arg("--tag").arg(tag);
        }
        for (key, value) in &request.build_args {
            spec = spec.arg("--build-arg").arg(format!("{}={}", key, value));
        }
        spec = spec.arg(request.context.display().to_string());

        info!(
            "Building {} for {} as {}",
            request.context.display(),
            request.platforms.join(","),
            request.tags.join(", ")
        );
        self.runner
            .run_checked(&spec)
            .await
            .with_context(|| format!("Image build of {} failed", request.context.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingCommandRunner;

    fn engine() -> (ContainerEngine, Arc<RecordingCommandRunner>) {
        let runner = Arc::new(RecordingCommandRunner::new());
        (ContainerEngine::new("docker", runner.clone()), runner)
    }

    #[tokio::test]
    async fn test_run_disposable_mounts_read_only() {
        let (engine, runner) = engine();
        engine
            .run_disposable(
                "python:3.9-slim-bullseye",
                &[Mount {
                    host: PathBuf::from("/src/dist"),
                    container: "/dist".to_string(),
                }],
                &["pip".to_string(), "install".to_string(), "/dist/a.tar.gz".to_string()],
            )
            .await
            .unwrap();

        assert_eq!(
            runner.commands(),
            vec![
                "docker run --rm -v /src/dist:/dist:ro python:3.9-slim-bullseye pip install /dist/a.tar.gz"
            ]
        );
    }

    #[tokio::test]
    async fn test_registry_lifecycle() {
        let (engine, runner) = engine();
        engine
            .start_registry("slipway-registry-1", "registry:2", 5000)
            .await
            .unwrap();
        engine.stop_container("slipway-registry-1").await.unwrap();

        assert_eq!(
            runner.commands(),
            vec![
                "docker run -d --rm -p 5000:5000 --name slipway-registry-1 registry:2",
                "docker stop slipway-registry-1",
            ]
        );
    }

    #[tokio::test]
    async fn test_builder_setup() {
        let (engine, runner) = engine();
        engine.setup_emulation().await.unwrap();
        engine.create_builder("slipway-1", true).await.unwrap();
        engine.create_builder("slipway-2", false).await.unwrap();
        engine.remove_builder("slipway-1").await.unwrap();

        assert_eq!(
            runner.commands(),
            vec![
                "docker run --privileged --rm tonistiigi/binfmt --install all",
                "docker buildx create --use --name slipway-1 --driver-opt network=host",
                "docker buildx create --use --name slipway-2",
                "docker buildx rm slipway-1",
            ]
        );
    }

    #[tokio::test]
    async fn test_login_pipes_password() {
        let (engine, runner) = engine();
        engine
            .login(None, "bot", &Secret::new("hunter2"))
            .await
            .unwrap();

        let recorded = runner.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].display(), "docker login -u bot --password-stdin");
        assert_eq!(recorded[0].stdin.as_ref().unwrap().expose(), "hunter2");
    }

    #[tokio::test]
    async fn test_buildx_build_command() {
        let (engine, runner) = engine();
        let mut build_args = BTreeMap::new();
        build_args.insert("BASE_IMAGE".to_string(), "jupyterhub/jupyterhub:4.1.0".to_string());
        build_args.insert("JUPYTERHUB_VERSION".to_string(), "4.1.0".to_string());

        engine
            .buildx_build(&BuildxRequest {
                builder: "slipway-1".to_string(),
                context: PathBuf::from("/src/onbuild"),
                platforms: vec!["linux/amd64".to_string(), "linux/arm64".to_string()],
                tags: vec![
                    "jupyterhub/jupyterhub-onbuild:4.1.0".to_string(),
                    "jupyterhub/jupyterhub-onbuild:latest".to_string(),
                ],
                build_args,
            })
            .await
            .unwrap();

        assert_eq!(
            runner.commands(),
            vec![
                "docker buildx build --builder slipway-1 --platform linux/amd64,linux/arm64 --push \
                 --tag jupyterhub/jupyterhub-onbuild:4.1.0 --tag jupyterhub/jupyterhub-onbuild:latest \
                 --build-arg BASE_IMAGE=jupyterhub/jupyterhub:4.1.0 --build-arg JUPYTERHUB_VERSION=4.1.0 \
                 /src/onbuild"
            ]
        );
    }

    #[tokio::test]
    async fn test_buildx_build_requires_tags() {
        let (engine, runner) = engine();
        let err = engine
            .buildx_build(&BuildxRequest {
                builder: "b".to_string(),
                context: PathBuf::from("."),
                platforms: vec!["linux/amd64".to_string()],
                tags: Vec::new(),
                build_args: BTreeMap::new(),
            })
            .await
            .unwrap_err();

        assert!(err.to_string().contains("without tags"));
        assert!(runner.commands().is_empty());
    }

    #[tokio::test]
    async fn test_failed_command_is_an_error() {
        let runner = Arc::new(RecordingCommandRunner::new().fail_on("buildx create", "no driver"));
        let engine = ContainerEngine::new("podman", runner.clone());

        let err = engine.create_builder("slipway-1", false).await.unwrap_err();
        assert!(format!("{:#}", err).contains("no driver"));
    }
}
