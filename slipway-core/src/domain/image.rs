//! Container image declarations and tag sets

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::trigger::TriggerContext;

/// Upstream image whose first tag is passed as a build argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseImageRef {
    /// Name of an image declared earlier in the same release
    pub image: String,
    /// Build argument receiving the upstream tag (e.g. `BASE_IMAGE`)
    pub arg: String,
}

/// One container image to build and push
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSpec {
    /// Short unique name used for dependencies and reporting
    pub name: String,
    /// Repository without registry host or tag (e.g. `jupyterhub/jupyterhub`)
    pub repository: String,
    /// Build context directory, relative to the workdir
    pub context: String,
    /// Target platforms; a per-image allowlist
    pub platforms: Vec<String>,
    pub base: Option<BaseImageRef>,
    /// Extra build arguments; values may contain `{version}` and `{sha}`
    pub build_args: BTreeMap<String, String>,
}

impl ImageSpec {
    /// Tag prefix for this image under a registry prefix (`<registry><repository>:`)
    pub fn tag_prefix(&self, registry_prefix: &str) -> String {
        format!("{}{}:", registry_prefix, self.repository)
    }

    /// Expands placeholders in the declared build arguments
    pub fn expand_build_args(&self, context: &TriggerContext) -> BTreeMap<String, String> {
        let version = context.version_string();
        self.build_args
            .iter()
            .map(|(key, value)| {
                let expanded = value
                    .replace("{version}", &version)
                    .replace("{sha}", &context.sha);
                (key.clone(), expanded)
            })
            .collect()
    }
}

/// Fully qualified tags for one image, never empty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawImageTagSet")]
pub struct ImageTagSet {
    tags: Vec<String>,
    /// True when no version tag could be derived and the default was used
    pub defaulted: bool,
}

#[derive(Deserialize)]
struct RawImageTagSet {
    tags: Vec<String>,
    #[serde(default)]
    defaulted: bool,
}

impl TryFrom<RawImageTagSet> for ImageTagSet {
    type Error = String;

    fn try_from(raw: RawImageTagSet) -> Result<Self, Self::Error> {
        if raw.tags.is_empty() {
            return Err("an image tag set needs at least one tag".to_string());
        }
        if raw.tags.iter().any(|t| t.trim().is_empty()) {
            return Err("image tags cannot be blank".to_string());
        }
        Ok(Self {
            tags: raw.tags,
            defaulted: raw.defaulted,
        })
    }
}

impl ImageTagSet {
    /// Builds a tag set, substituting `default_tag` when `tags` is empty
    pub fn new(tags: Vec<String>, default_tag: &str) -> Self {
        if tags.is_empty() {
            Self {
                tags: vec![default_tag.to_string()],
                defaulted: true,
            }
        } else {
            Self {
                tags,
                defaulted: false,
            }
        }
    }

    /// First tag; downstream images build on top of it
    pub fn first(&self) -> &str {
        // `new` guarantees at least one element
        &self.tags[0]
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}
