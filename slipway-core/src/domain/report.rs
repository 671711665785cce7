//! Run reports
//!
//! Every executed step leaves a `StepOutcome`; pipelines aggregate them into
//! a `PipelineReport` and the orchestrator into a `RunReport`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::log::LogEntry;
use super::registry::RegistryTarget;
use super::trigger::TriggerDecision;

/// Failure taxonomy for pipeline steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Checkout,
    /// Runtime or build tooling could not be installed
    Toolchain,
    /// Build tool failed or produced no artifacts
    Build,
    /// A verification script exited non-zero
    Verification,
    /// Source archive did not install in the minimal container
    Isolation,
    ArtifactUpload,
    Publish,
    RegistrySetup,
    TagCalculation,
    ImageBuild,
    /// An upstream image failed, so this one was not attempted
    Blocked,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureKind::Checkout => "checkout",
            FailureKind::Toolchain => "toolchain",
            FailureKind::Build => "build",
            FailureKind::Verification => "verification",
            FailureKind::Isolation => "isolation",
            FailureKind::ArtifactUpload => "artifact upload",
            FailureKind::Publish => "publish",
            FailureKind::RegistrySetup => "registry setup",
            FailureKind::TagCalculation => "tag calculation",
            FailureKind::ImageBuild => "image build",
            FailureKind::Blocked => "blocked",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Skipped { reason: String },
    Failed { kind: FailureKind, message: String },
}

/// Result of one pipeline step
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub name: String,
    #[serde(flatten)]
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl StepOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, StepStatus::Failed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineKind {
    /// Checkout of the triggering commit, shared by the other pipelines
    Source,
    Package,
    Images,
}

impl std::fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineKind::Source => write!(f, "source"),
            PipelineKind::Package => write!(f, "package"),
            PipelineKind::Images => write!(f, "images"),
        }
    }
}

/// Outcome of one pipeline
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub pipeline: PipelineKind,
    pub steps: Vec<StepOutcome>,
    /// Registry used by the image pipeline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<RegistryTarget>,
    pub logs: Vec<LogEntry>,
}

impl PipelineReport {
    pub fn new(pipeline: PipelineKind) -> Self {
        Self {
            pipeline,
            steps: Vec::new(),
            registry: None,
            logs: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> bool {
        !self.steps.iter().any(StepOutcome::is_failure)
    }

    /// First failing step, which identifies where the pipeline broke
    pub fn first_failure(&self) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.is_failure())
    }

    pub fn step(&self, name: &str) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.name == name)
    }
}

/// Outcome of a whole orchestrator run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub decision: TriggerDecision,
    /// Absent when the trigger skipped the run
    pub source: Option<PipelineReport>,
    pub package: Option<PipelineReport>,
    pub images: Option<PipelineReport>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.pipelines().all(PipelineReport::succeeded)
    }

    pub fn pipelines(&self) -> impl Iterator<Item = &PipelineReport> {
        self.source
            .iter()
            .chain(self.package.iter())
            .chain(self.images.iter())
    }

    /// Process exit code: 0 on success or skip, 1 on any failed step
    pub fn exit_code(&self) -> i32 {
        if self.succeeded() { 0 } else { 1 }
    }
}
