//! Release pipelines
//!
//! A pipeline is an ordered list of named steps. Each step records exactly
//! one `StepOutcome`; the first failure aborts the remaining steps of that
//! pipeline (image builds excepted, see `image`).

mod image;
mod package;
mod source;

pub use image::ImagePipeline;
pub use package::PackagePipeline;
pub use source::SourceCheckout;

use chrono::{DateTime, Utc};
use slipway_core::domain::log::LogLevel;
use slipway_core::domain::registry::RegistryTarget;
use slipway_core::domain::report::{
    FailureKind, PipelineKind, PipelineReport, StepOutcome, StepStatus,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::service::LogBufferService;

/// Start time of a step
pub(crate) struct StepTimer {
    started_at: DateTime<Utc>,
    instant: Instant,
}

impl StepTimer {
    pub(crate) fn start() -> Self {
        Self {
            started_at: Utc::now(),
            instant: Instant::now(),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.instant.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Report under construction for one pipeline run
pub(crate) struct PipelineRun {
    report: PipelineReport,
    logs: Arc<dyn LogBufferService>,
}

impl PipelineRun {
    pub(crate) fn new(pipeline: PipelineKind, logs: Arc<dyn LogBufferService>) -> Self {
        Self {
            report: PipelineReport::new(pipeline),
            logs,
        }
    }

    pub(crate) fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.logs.log(level, message.into());
    }

    pub(crate) fn set_registry(&mut self, registry: RegistryTarget) {
        self.report.registry = Some(registry);
    }

    /// Runs one step and records its outcome; `None` means it failed
    pub(crate) async fn step<T, F>(&mut self, name: &str, kind: FailureKind, work: F) -> Option<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        let timer = StepTimer::start();
        self.log(LogLevel::Info, format!("Step {} started", name));

        match work.await {
            Ok(value) => {
                self.succeed(name, timer);
                Some(value)
            }
            Err(e) => {
                self.fail(name, timer, kind, &e);
                None
            }
        }
    }

    pub(crate) fn succeed(&mut self, name: &str, timer: StepTimer) {
        self.log(
            LogLevel::Info,
            format!("Step {} succeeded in {}ms", name, timer.elapsed_ms()),
        );
        self.push(name, timer, StepStatus::Succeeded);
    }

    pub(crate) fn fail(
        &mut self,
        name: &str,
        timer: StepTimer,
        kind: FailureKind,
        error: &anyhow::Error,
    ) {
        let message = format!("{:#}", error);
        self.log(
            LogLevel::Error,
            format!("Step {} failed ({}): {}", name, kind, message),
        );
        self.push(name, timer, StepStatus::Failed { kind, message });
    }

    /// Records a failure for a step that never started
    pub(crate) fn fail_now(&mut self, name: &str, kind: FailureKind, message: impl Into<String>) {
        let message = message.into();
        self.log(
            LogLevel::Error,
            format!("Step {} failed ({}): {}", name, kind, message),
        );
        self.push(name, StepTimer::start(), StepStatus::Failed { kind, message });
    }

    pub(crate) fn skip(&mut self, name: &str, reason: impl Into<String>) {
        let reason = reason.into();
        self.log(LogLevel::Info, format!("Step {} skipped: {}", name, reason));
        self.push(name, StepTimer::start(), StepStatus::Skipped { reason });
    }

    fn push(&mut self, name: &str, timer: StepTimer, status: StepStatus) {
        self.report.steps.push(StepOutcome {
            name: name.to_string(),
            status,
            started_at: timer.started_at,
            duration_ms: timer.elapsed_ms(),
        });
    }

    /// Closes the run, moving buffered log lines into the report
    pub(crate) fn finish(mut self) -> PipelineReport {
        self.report.logs = self.logs.drain();
        self.report
    }
}
