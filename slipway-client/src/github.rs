//! GitHub tags listing
//!
//! The image tag calculator needs the repository's existing release tags to
//! decide whether a new tag may take over the floating `X.Y`, `X` and
//! `latest` tags.

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ClientError, Result};

const DEFAULT_PAGE_SIZE: usize = 100;
const MAX_PAGES: u32 = 50;

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

/// HTTP client for the GitHub REST API
#[derive(Clone)]
pub struct GithubClient {
    api_url: String,
    token: Option<String>,
    page_size: usize,
    client: Client,
}

impl std::fmt::Debug for GithubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubClient")
            .field("api_url", &self.api_url)
            .field("token", &self.token.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

impl GithubClient {
    /// Create a client for an API root (e.g. `https://api.github.com`)
    pub fn new(api_url: impl Into<String>, token: Option<String>) -> Self {
        let api_url = api_url.into();
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            page_size: DEFAULT_PAGE_SIZE,
            client: Client::new(),
        }
    }

    /// Overrides the page size used for listings
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, DEFAULT_PAGE_SIZE);
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Lists every tag name of `repository` (`owner/name`) in API order
    pub async fn list_tags(&self, repository: &str) -> Result<Vec<String>> {
        if repository.split('/').filter(|p| !p.is_empty()).count() != 2 {
            return Err(ClientError::InvalidRequest(format!(
                "repository must be 'owner/name', got '{}'",
                repository
            )));
        }

        let url = format!("{}/repos/{}/tags", self.api_url, repository);
        let mut tags = Vec::new();

        for page in 1..=MAX_PAGES {
            let mut request = self
                .client
                .get(&url)
                .query(&[
                    ("per_page", self.page_size.to_string()),
                    ("page", page.to_string()),
                ])
                .header("Accept", "application/vnd.github+json")
                .header(
                    "User-Agent",
                    concat!("slipway/", env!("CARGO_PKG_VERSION")),
                );
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }

            let response = request.send().await?;
            let entries: Vec<TagEntry> = handle_response(response).await?;
            let count = entries.len();
            tags.extend(entries.into_iter().map(|e| e.name));

            if count < self.page_size {
                break;
            }
        }

        debug!("Fetched {} tags for {}", tags.len(), repository);
        Ok(tags)
    }
}

async fn handle_response<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();

    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(match status.as_u16() {
            401 | 403 => ClientError::Unauthorized(error_text),
            code => ClientError::api_error(code, error_text),
        });
    }

    response
        .json()
        .await
        .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
}
