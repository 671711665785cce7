//! Registry target resolution
//!
//! Untrusted builds (pull requests, feature branches) push to a local
//! ephemeral registry that only exists for the duration of the run. Tag and
//! main-branch builds push to the public registry.

use serde::{Deserialize, Serialize};

use super::trigger::TriggerContext;

/// Where container images are pushed for a run
///
/// Resolved once per image pipeline run and shared by every image build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RegistryTarget {
    /// Default registry of the container engine, no host prefix
    Public,
    /// Side-service registry reachable only from this run (e.g. `localhost:5000`)
    Local { endpoint: String },
}

impl RegistryTarget {
    /// Picks the public registry for tag and main-branch builds, the local one otherwise
    pub fn resolve(context: &TriggerContext, local_endpoint: &str) -> Self {
        if context.is_tag_build || context.is_main_branch {
            RegistryTarget::Public
        } else {
            RegistryTarget::Local {
                endpoint: local_endpoint.to_string(),
            }
        }
    }

    /// Prefix injected in front of every image name
    pub fn prefix(&self) -> String {
        match self {
            RegistryTarget::Public => String::new(),
            RegistryTarget::Local { endpoint } => format!("{}/", endpoint.trim_end_matches('/')),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, RegistryTarget::Local { .. })
    }
}

impl std::fmt::Display for RegistryTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryTarget::Public => write!(f, "public registry"),
            RegistryTarget::Local { endpoint } => write!(f, "local registry at {}", endpoint),
        }
    }
}
