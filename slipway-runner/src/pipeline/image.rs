//! Image pipeline
//!
//! registry → builder-setup → registry-login → image:<name>... → teardown.
//!
//! Images build in declaration order. A failed image does not stop its
//! siblings, but every image whose base failed (directly or transitively) is
//! reported as `Blocked` without being attempted.

use anyhow::{Context, Result};
use slipway_core::domain::image::{ImageSpec, ImageTagSet};
use slipway_core::domain::log::LogLevel;
use slipway_core::domain::registry::RegistryTarget;
use slipway_core::domain::release::ImagesConfig;
use slipway_core::domain::report::{FailureKind, PipelineKind, PipelineReport};
use slipway_core::domain::trigger::TriggerContext;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use super::{PipelineRun, StepTimer};
use crate::config::Credentials;
use crate::container::{BuildxRequest, ContainerEngine};
use crate::service::{LogBufferService, TagRequest, TagResolver};

/// Builds and pushes the declared multi-platform images
pub struct ImagePipeline {
    config: ImagesConfig,
    context: TriggerContext,
    workdir: PathBuf,
    run_id: Uuid,
    engine: ContainerEngine,
    tags: Arc<dyn TagResolver>,
    credentials: Option<Credentials>,
    logs: Arc<dyn LogBufferService>,
}

impl ImagePipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ImagesConfig,
        context: TriggerContext,
        workdir: PathBuf,
        run_id: Uuid,
        engine: ContainerEngine,
        tags: Arc<dyn TagResolver>,
        credentials: Option<Credentials>,
        logs: Arc<dyn LogBufferService>,
    ) -> Self {
        Self {
            config,
            context,
            workdir,
            run_id,
            engine,
            tags,
            credentials,
            logs,
        }
    }

    fn builder_name(&self) -> String {
        format!("slipway-{}", self.run_id.simple())
    }

    fn registry_name(&self) -> String {
        format!("slipway-registry-{}", self.run_id.simple())
    }

    /// Runs the pipeline; side services are torn down whatever the outcome
    pub async fn run(&self) -> PipelineReport {
        let mut run = PipelineRun::new(PipelineKind::Images, self.logs.clone());

        let target = RegistryTarget::resolve(&self.context, &self.config.local_registry.endpoint());
        run.log(LogLevel::Info, format!("Pushing images to the {}", target));
        run.set_registry(target.clone());

        let mut registry_started = false;
        let mut builder_created = false;

        let ready = match &target {
            RegistryTarget::Local { .. } => {
                registry_started = run
                    .step("registry", FailureKind::RegistrySetup, self.start_registry())
                    .await
                    .is_some();
                registry_started
            }
            RegistryTarget::Public => {
                run.skip("registry", "pushing to the public registry");
                true
            }
        };

        let ready = ready
            && run
                .step(
                    "builder-setup",
                    FailureKind::RegistrySetup,
                    self.setup_builder(target.is_local(), &mut builder_created),
                )
                .await
                .is_some();

        let ready = ready
            && match &target {
                RegistryTarget::Public => run
                    .step("registry-login", FailureKind::RegistrySetup, self.login())
                    .await
                    .is_some(),
                RegistryTarget::Local { .. } => {
                    run.skip("registry-login", "local registry needs no credentials");
                    true
                }
            };

        if ready {
            self.build_images(&mut run, &target).await;
        }

        self.teardown(&run, builder_created, registry_started).await;
        run.finish()
    }

    async fn start_registry(&self) -> Result<()> {
        let registry = &self.config.local_registry;
        self.engine
            .start_registry(&self.registry_name(), &registry.image, registry.port)
            .await
    }

    async fn setup_builder(&self, host_network: bool, created: &mut bool) -> Result<()> {
        self.engine.setup_emulation().await?;
        self.engine
            .create_builder(&self.builder_name(), host_network)
            .await?;
        *created = true;
        Ok(())
    }

    async fn login(&self) -> Result<()> {
        let credentials = self.credentials.as_ref().context(
            "registry credentials are not configured (DOCKER_USERNAME, DOCKER_PASSWORD)",
        )?;
        self.engine
            .login(None, &credentials.username, &credentials.password)
            .await
    }

    async fn build_images(&self, run: &mut PipelineRun, target: &RegistryTarget) {
        // First tag of every image that built; absent means failed or blocked
        let mut built: HashMap<String, String> = HashMap::new();

        for spec in &self.config.builds {
            let step = format!("image:{}", spec.name);

            let base_tag = match &spec.base {
                Some(base) => match built.get(&base.image) {
                    Some(tag) => Some((base.arg.clone(), tag.clone())),
                    None => {
                        run.fail_now(
                            &step,
                            FailureKind::Blocked,
                            format!("base image '{}' was not built", base.image),
                        );
                        continue;
                    }
                },
                None => None,
            };

            let timer = StepTimer::start();
            run.log(LogLevel::Info, format!("Step {} started", step));

            let tags = match self.resolve_tags(spec, target).await {
                Ok(tags) => tags,
                Err(e) => {
                    run.fail(&step, timer, FailureKind::TagCalculation, &e);
                    continue;
                }
            };
            if tags.defaulted {
                run.log(
                    LogLevel::Info,
                    format!("No version tag for {}, using {}", spec.name, tags.first()),
                );
            }

            let mut build_args = spec.expand_build_args(&self.context);
            if let Some((arg, tag)) = base_tag {
                build_args.insert(arg, tag);
            }

            let request = BuildxRequest {
                builder: self.builder_name(),
                context: self.workdir.join(&spec.context),
                platforms: spec.platforms.clone(),
                tags: tags.tags().to_vec(),
                build_args,
            };

            match self.engine.buildx_build(&request).await {
                Ok(()) => {
                    run.log(
                        LogLevel::Info,
                        format!("Pushed {}", tags.tags().join(", ")),
                    );
                    built.insert(spec.name.clone(), tags.first().to_string());
                    run.succeed(&step, timer);
                }
                Err(e) => run.fail(&step, timer, FailureKind::ImageBuild, &e),
            }
        }
    }

    async fn resolve_tags(&self, spec: &ImageSpec, target: &RegistryTarget) -> Result<ImageTagSet> {
        let prefix = spec.tag_prefix(&target.prefix());
        let request = TagRequest {
            git_ref: self.context.git_ref.clone(),
            default_tag: format!("{}{}", prefix, self.config.default_tag),
            prefix,
            branch_pattern: self.config.branch_pattern.clone(),
        };
        self.tags
            .resolve_tags(&request)
            .await
            .with_context(|| format!("Failed to compute tags for {}", spec.name))
    }

    async fn teardown(&self, run: &PipelineRun, builder_created: bool, registry_started: bool) {
        if builder_created {
            if let Err(e) = self.engine.remove_builder(&self.builder_name()).await {
                run.log(LogLevel::Warning, format!("Teardown: {:#}", e));
            }
        }
        if registry_started {
            if let Err(e) = self.engine.stop_container(&self.registry_name()).await {
                run.log(LogLevel::Warning, format!("Teardown: {:#}", e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Secret;
    use crate::service::{InMemoryLogBuffer, StaticTagResolver};
    use crate::testing::{FailingTagResolver, RecordingCommandRunner, tag_context};
    use slipway_core::domain::image::BaseImageRef;
    use slipway_core::domain::report::StepStatus;
    use slipway_core::domain::trigger::EventKind;
    use std::collections::BTreeMap;

    fn image(name: &str, repository: &str, base: Option<&str>, platforms: &[&str]) -> ImageSpec {
        ImageSpec {
            name: name.to_string(),
            repository: repository.to_string(),
            context: name.to_string(),
            platforms: platforms.iter().map(|p| p.to_string()).collect(),
            base: base.map(|b| BaseImageRef {
                image: b.to_string(),
                arg: "BASE_IMAGE".to_string(),
            }),
            build_args: BTreeMap::new(),
        }
    }

    fn config() -> ImagesConfig {
        let multi = ["linux/amd64", "linux/arm64"];
        let mut base = image("base", "jupyterhub/jupyterhub", None, &multi);
        base.build_args
            .insert("JUPYTERHUB_VERSION".to_string(), "{version}".to_string());

        ImagesConfig {
            builds: vec![
                base,
                image("onbuild", "jupyterhub/jupyterhub-onbuild", Some("base"), &multi),
                image("demo", "jupyterhub/jupyterhub-demo", Some("onbuild"), &["linux/amd64"]),
                image("singleuser", "jupyterhub/singleuser", None, &multi),
            ],
            ..ImagesConfig::default()
        }
    }

    fn pr_context() -> TriggerContext {
        TriggerContext {
            event: EventKind::PullRequest,
            git_ref: "refs/pull/7/merge".to_string(),
            sha: "abc123".to_string(),
            is_tag_build: false,
            is_main_branch: false,
        }
    }

    fn run_id() -> Uuid {
        Uuid::parse_str("00000000-0000-4000-8000-000000000001").unwrap()
    }

    fn pipeline(
        context: TriggerContext,
        runner: Arc<RecordingCommandRunner>,
        tags: Arc<dyn TagResolver>,
        credentials: Option<Credentials>,
    ) -> ImagePipeline {
        ImagePipeline::new(
            config(),
            context,
            PathBuf::from("/src"),
            run_id(),
            ContainerEngine::new("docker", runner),
            tags,
            credentials,
            Arc::new(InMemoryLogBuffer::new()),
        )
    }

    fn credentials() -> Option<Credentials> {
        Some(Credentials {
            username: "bot".to_string(),
            password: Secret::new("hunter2"),
        })
    }

    fn status<'a>(report: &'a PipelineReport, step: &str) -> &'a StepStatus {
        &report.step(step).unwrap().status
    }

    fn builds(runner: &RecordingCommandRunner) -> Vec<String> {
        runner
            .commands()
            .into_iter()
            .filter(|c| c.starts_with("docker buildx build"))
            .collect()
    }

    #[tokio::test]
    async fn test_pull_request_uses_local_registry() {
        let runner = Arc::new(RecordingCommandRunner::new());
        let report = pipeline(
            pr_context(),
            runner.clone(),
            Arc::new(StaticTagResolver::default()),
            None,
        )
        .run()
        .await;

        assert!(report.succeeded(), "{:?}", report.first_failure());
        assert_eq!(
            report.registry,
            Some(RegistryTarget::Local {
                endpoint: "localhost:5000".to_string()
            })
        );
        assert!(matches!(status(&report, "registry-login"), StepStatus::Skipped { .. }));

        let commands = runner.commands();
        let id = run_id().simple().to_string();
        assert_eq!(
            commands[0],
            format!("docker run -d --rm -p 5000:5000 --name slipway-registry-{} registry:2", id)
        );
        assert_eq!(commands[1], "docker run --privileged --rm tonistiigi/binfmt --install all");
        assert_eq!(
            commands[2],
            format!("docker buildx create --use --name slipway-{} --driver-opt network=host", id)
        );

        let builds = builds(&runner);
        assert_eq!(builds.len(), 4);
        assert!(builds[0].contains("--tag localhost:5000/jupyterhub/jupyterhub:noref"));
        assert!(builds[0].contains("--build-arg JUPYTERHUB_VERSION=git:abc123"));
        assert!(builds[1].contains("--build-arg BASE_IMAGE=localhost:5000/jupyterhub/jupyterhub:noref"));
        assert!(builds[2].contains("--platform linux/amd64 "));
        assert!(builds[2].contains(
            "--build-arg BASE_IMAGE=localhost:5000/jupyterhub/jupyterhub-onbuild:noref"
        ));

        let n = commands.len();
        assert_eq!(commands[n - 2], format!("docker buildx rm slipway-{}", id));
        assert_eq!(commands[n - 1], format!("docker stop slipway-registry-{}", id));
    }

    #[tokio::test]
    async fn test_tag_build_pushes_release_tags() {
        let runner = Arc::new(RecordingCommandRunner::new());
        let report = pipeline(
            tag_context("4.1.0"),
            runner.clone(),
            Arc::new(StaticTagResolver::new(vec!["4.0.2".to_string()])),
            credentials(),
        )
        .run()
        .await;

        assert!(report.succeeded(), "{:?}", report.first_failure());
        assert_eq!(report.registry, Some(RegistryTarget::Public));
        assert!(matches!(status(&report, "registry"), StepStatus::Skipped { .. }));

        let commands = runner.commands();
        assert!(commands.contains(&"docker login -u bot --password-stdin".to_string()));
        assert!(!commands.iter().any(|c| c.contains("hunter2")));
        assert!(!commands.iter().any(|c| c.contains("network=host")));
        assert!(!commands.iter().any(|c| c.starts_with("docker stop")));

        let builds = builds(&runner);
        assert!(builds[0].contains(
            "--tag jupyterhub/jupyterhub:4.1.0 --tag jupyterhub/jupyterhub:4.1 \
             --tag jupyterhub/jupyterhub:4 --tag jupyterhub/jupyterhub:latest"
        ));
        assert!(builds[0].contains("--build-arg JUPYTERHUB_VERSION=4.1.0"));
        assert!(builds[1].contains("--build-arg BASE_IMAGE=jupyterhub/jupyterhub:4.1.0"));
    }

    #[tokio::test]
    async fn test_public_registry_requires_credentials() {
        let runner = Arc::new(RecordingCommandRunner::new());
        let report = pipeline(
            tag_context("4.1.0"),
            runner.clone(),
            Arc::new(StaticTagResolver::default()),
            None,
        )
        .run()
        .await;

        let failure = report.first_failure().unwrap();
        assert_eq!(failure.name, "registry-login");
        assert!(matches!(
            failure.status,
            StepStatus::Failed { kind: FailureKind::RegistrySetup, .. }
        ));
        assert!(builds(&runner).is_empty());
        // Builder created earlier is still removed
        assert!(runner.commands().last().unwrap().starts_with("docker buildx rm"));
    }

    #[tokio::test]
    async fn test_failed_image_blocks_dependents_only() {
        let runner = Arc::new(
            RecordingCommandRunner::new().fail_on("/src/onbuild", "exec format error on linux/arm64"),
        );
        let report = pipeline(
            pr_context(),
            runner.clone(),
            Arc::new(StaticTagResolver::default()),
            None,
        )
        .run()
        .await;

        assert!(!report.succeeded());
        assert!(matches!(status(&report, "image:base"), StepStatus::Succeeded));
        assert!(matches!(
            status(&report, "image:onbuild"),
            StepStatus::Failed { kind: FailureKind::ImageBuild, .. }
        ));
        assert!(matches!(
            status(&report, "image:demo"),
            StepStatus::Failed { kind: FailureKind::Blocked, .. }
        ));
        assert!(matches!(status(&report, "image:singleuser"), StepStatus::Succeeded));

        let builds = builds(&runner);
        assert_eq!(builds.len(), 3);
        assert!(!builds.iter().any(|b| b.ends_with("/src/demo")));
        // Teardown still runs
        assert!(runner.commands().iter().any(|c| c.starts_with("docker stop")));
    }

    #[tokio::test]
    async fn test_tag_failure_blocks_dependents() {
        let runner = Arc::new(RecordingCommandRunner::new());
        let report = pipeline(
            pr_context(),
            runner.clone(),
            Arc::new(FailingTagResolver),
            None,
        )
        .run()
        .await;

        assert!(matches!(
            status(&report, "image:base"),
            StepStatus::Failed { kind: FailureKind::TagCalculation, .. }
        ));
        assert!(matches!(
            status(&report, "image:onbuild"),
            StepStatus::Failed { kind: FailureKind::Blocked, .. }
        ));
        assert!(matches!(
            status(&report, "image:demo"),
            StepStatus::Failed { kind: FailureKind::Blocked, .. }
        ));
        assert!(builds(&runner).is_empty());
    }

    #[tokio::test]
    async fn test_registry_failure_skips_builds() {
        let runner = Arc::new(RecordingCommandRunner::new().fail_on("registry:2", "port is already allocated"));
        let report = pipeline(
            pr_context(),
            runner.clone(),
            Arc::new(StaticTagResolver::default()),
            None,
        )
        .run()
        .await;

        assert_eq!(report.steps.len(), 1);
        assert_eq!(report.first_failure().unwrap().name, "registry");
        assert_eq!(runner.commands().len(), 1);
    }

    #[tokio::test]
    async fn test_teardown_errors_are_warnings() {
        let runner = Arc::new(RecordingCommandRunner::new().fail_on("buildx rm", "no such builder"));
        let report = pipeline(
            pr_context(),
            runner.clone(),
            Arc::new(StaticTagResolver::default()),
            None,
        )
        .run()
        .await;

        assert!(report.succeeded());
        assert!(
            report
                .logs
                .iter()
                .any(|l| l.level == LogLevel::Warning && l.message.contains("no such builder"))
        );
        assert!(runner.commands().iter().any(|c| c.starts_with("docker stop")));
    }
}
