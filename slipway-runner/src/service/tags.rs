//! Tag resolution for image builds
//!
//! Wraps `slipway_core::tags::calculate_tags` with a source of known
//! repository tags. The GitHub resolver fetches the tag list at most once
//! per run and shares it between every image.

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use slipway_client::GithubClient;
use slipway_core::domain::image::ImageTagSet;
use slipway_core::tags::calculate_tags;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Inputs of one tag calculation
#[derive(Debug, Clone)]
pub struct TagRequest {
    pub git_ref: String,
    /// Prepended to every tag, e.g. `localhost:5000/jupyterhub/jupyterhub:`
    pub prefix: String,
    /// Full tag used when no tag applies
    pub default_tag: String,
    /// Branches whose name becomes a tag
    pub branch_pattern: String,
}

impl TagRequest {
    fn compile_pattern(&self) -> Result<Regex> {
        Regex::new(&self.branch_pattern)
            .with_context(|| format!("Invalid branch pattern '{}'", self.branch_pattern))
    }

    fn is_tag_ref(&self) -> bool {
        self.git_ref.starts_with("refs/tags/")
    }
}

/// Computes the tags an image is pushed under
#[async_trait]
pub trait TagResolver: Send + Sync {
    /// Returns a non-empty tag set; the default tag is used when nothing applies
    async fn resolve_tags(&self, request: &TagRequest) -> Result<ImageTagSet>;
}

/// Resolver that compares against the repository's tags on GitHub
///
/// Without a token nothing is computed and every image gets the default tag.
pub struct GithubTagResolver {
    client: GithubClient,
    repository: Option<String>,
    known: OnceCell<Vec<String>>,
}

impl GithubTagResolver {
    pub fn new(client: GithubClient, repository: Option<String>) -> Self {
        Self {
            client,
            repository,
            known: OnceCell::new(),
        }
    }

    async fn known_tags(&self) -> Result<&[String]> {
        let tags = self
            .known
            .get_or_try_init(|| async {
                let repository = self
                    .repository
                    .as_deref()
                    .context("GITHUB_REPOSITORY is not set; cannot list existing tags")?;
                let tags = self
                    .client
                    .list_tags(repository)
                    .await
                    .with_context(|| format!("Failed to list tags of {}", repository))?;
                info!("Found {} existing tags in {}", tags.len(), repository);
                Ok::<_, anyhow::Error>(tags)
            })
            .await?;
        Ok(tags.as_slice())
    }
}

#[async_trait]
impl TagResolver for GithubTagResolver {
    async fn resolve_tags(&self, request: &TagRequest) -> Result<ImageTagSet> {
        if !self.client.has_token() {
            debug!("No GitHub token, using default tag {}", request.default_tag);
            return Ok(ImageTagSet::new(Vec::new(), &request.default_tag));
        }

        let pattern = request.compile_pattern()?;
        // Branch tags never depend on existing releases
        let known: &[String] = if request.is_tag_ref() {
            self.known_tags().await?
        } else {
            &[]
        };

        let tags = calculate_tags(&request.git_ref, &request.prefix, known, &pattern);
        Ok(ImageTagSet::new(tags, &request.default_tag))
    }
}

/// Resolver over a fixed list of known tags
#[derive(Debug, Clone, Default)]
pub struct StaticTagResolver {
    known: Vec<String>,
}

impl StaticTagResolver {
    pub fn new(known: Vec<String>) -> Self {
        Self { known }
    }
}

#[async_trait]
impl TagResolver for StaticTagResolver {
    async fn resolve_tags(&self, request: &TagRequest) -> Result<ImageTagSet> {
        let pattern = request.compile_pattern()?;
        let tags = calculate_tags(&request.git_ref, &request.prefix, &self.known, &pattern);
        Ok(ImageTagSet::new(tags, &request.default_tag))
    }
}
