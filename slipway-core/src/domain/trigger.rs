//! Trigger evaluation
//!
//! Decides from the invoking event whether a release run happens at all and,
//! when it does, computes the immutable `TriggerContext` every later step reads.

use serde::{Deserialize, Serialize};

use crate::filter::PathFilter;

const TAG_PREFIX: &str = "refs/tags/";
const BRANCH_PREFIX: &str = "refs/heads/";

/// Kind of event that invoked the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PullRequest,
    Push,
    WorkflowDispatch,
}

impl EventKind {
    /// Parses a CI event name (`pull_request`, `push`, `workflow_dispatch`)
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "pull_request" | "pull_request_target" => Some(EventKind::PullRequest),
            "push" => Some(EventKind::Push),
            "workflow_dispatch" => Some(EventKind::WorkflowDispatch),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::PullRequest => write!(f, "pull_request"),
            EventKind::Push => write!(f, "push"),
            EventKind::WorkflowDispatch => write!(f, "workflow_dispatch"),
        }
    }
}

/// Raw event metadata handed to the evaluator
#[derive(Debug, Clone)]
pub struct TriggerEvent {
    pub kind: EventKind,
    /// Fully qualified ref (`refs/tags/1.2.3`, `refs/heads/main`, `refs/pull/7/merge`)
    pub git_ref: String,
    pub sha: String,
    /// Paths changed by the event, relative to the repository root
    pub changed_files: Vec<String>,
}

/// Rules that gate a run
#[derive(Debug, Clone, Serialize)]
pub struct TriggerRules {
    pub main_branch: String,
    pub paths_ignore: PathFilter,
    pub branches_ignore: PathFilter,
    /// Path of the release declaration; changes to it always trigger a run
    pub definition_path: String,
}

impl Default for TriggerRules {
    fn default() -> Self {
        Self {
            main_branch: "main".to_string(),
            paths_ignore: PathFilter::default(),
            branches_ignore: PathFilter::default(),
            definition_path: "release.lua".to_string(),
        }
    }
}

/// Why a run was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Every changed file matched the ignored path set
    OnlyIgnoredPaths,
    /// The pushed branch is on the denylist
    IgnoredBranch { branch: String },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::OnlyIgnoredPaths => write!(f, "only ignored paths changed"),
            SkipReason::IgnoredBranch { branch } => write!(f, "branch '{}' is ignored", branch),
        }
    }
}

/// Outcome of trigger evaluation
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum TriggerDecision {
    Run(TriggerContext),
    Skip(SkipReason),
}

/// Kind of ref the run was triggered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefType {
    Tag,
    Branch,
    Other,
}

/// Why the pipeline is running
///
/// Computed once at pipeline start and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerContext {
    pub event: EventKind,
    pub git_ref: String,
    pub sha: String,
    pub is_tag_build: bool,
    pub is_main_branch: bool,
}

impl TriggerContext {
    /// Builds the context for an event without applying any filter
    pub fn from_event(event: &TriggerEvent, main_branch: &str) -> Self {
        let is_tag_build = event.git_ref.starts_with(TAG_PREFIX);
        let is_main_branch =
            branch_name(&event.git_ref).is_some_and(|branch| branch == main_branch);

        Self {
            event: event.kind,
            git_ref: event.git_ref.clone(),
            sha: event.sha.clone(),
            is_tag_build,
            is_main_branch,
        }
    }

    pub fn ref_type(&self) -> RefType {
        if self.is_tag_build {
            RefType::Tag
        } else if self.git_ref.starts_with(BRANCH_PREFIX) {
            RefType::Branch
        } else {
            RefType::Other
        }
    }

    /// Short ref name: tag name, branch name, or the ref itself
    pub fn ref_name(&self) -> &str {
        self.git_ref
            .strip_prefix(TAG_PREFIX)
            .or_else(|| self.git_ref.strip_prefix(BRANCH_PREFIX))
            .unwrap_or(&self.git_ref)
    }

    /// Version string handed to image builds: the tag name or `git:<sha>`
    pub fn version_string(&self) -> String {
        match self.ref_type() {
            RefType::Tag => self.ref_name().to_string(),
            _ => format!("git:{}", self.sha),
        }
    }
}

/// Returns the branch name of a `refs/heads/` ref
pub fn branch_name(git_ref: &str) -> Option<&str> {
    git_ref.strip_prefix(BRANCH_PREFIX)
}

/// Evaluates an event against the trigger rules
///
/// - manual dispatch always runs
/// - tag pushes always run; path and branch filters do not apply to tags
/// - branch pushes on a denylisted branch are skipped
/// - runs whose changed files are all ignored are skipped, unless the
///   release declaration itself changed
pub fn evaluate(event: &TriggerEvent, rules: &TriggerRules) -> TriggerDecision {
    let context = TriggerContext::from_event(event, &rules.main_branch);

    match event.kind {
        EventKind::WorkflowDispatch => return TriggerDecision::Run(context),
        EventKind::Push if context.is_tag_build => return TriggerDecision::Run(context),
        EventKind::Push => {
            if let Some(branch) = branch_name(&event.git_ref) {
                if rules.branches_ignore.is_excluded(branch) {
                    return TriggerDecision::Skip(SkipReason::IgnoredBranch {
                        branch: branch.to_string(),
                    });
                }
            }
        }
        EventKind::PullRequest => {}
    }

    let definition_changed = event
        .changed_files
        .iter()
        .any(|path| path.strip_prefix("./").unwrap_or(path) == rules.definition_path);

    if !definition_changed && rules.paths_ignore.excludes_all(&event.changed_files) {
        return TriggerDecision::Skip(SkipReason::OnlyIgnoredPaths);
    }

    TriggerDecision::Run(context)
}
