//! Package index upload
//!
//! Uploads distribution files through the legacy upload API
//! (`:action=file_upload`), which PyPI and most private indexes implement.

use reqwest::Client;
use reqwest::multipart::{Form, Part};
use slipway_core::domain::artifact::BuildArtifact;
use tracing::{debug, info};

use crate::digest::sha256_hex;
use crate::error::{ClientError, Result};

/// Result of a successful upload call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded,
    /// The index already had this exact file; nothing was changed
    AlreadyExists,
}

/// HTTP client for a package index upload endpoint
#[derive(Debug, Clone)]
pub struct PackageIndexClient {
    url: String,
    client: Client,
}

impl PackageIndexClient {
    /// Create a client for an upload endpoint (e.g. `https://upload.pypi.org/legacy/`)
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(url, Client::new())
    }

    /// Create a client with a custom HTTP client
    pub fn with_client(url: impl Into<String>, client: Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Uploads one distribution file
    ///
    /// A response saying the file already exists is reported as
    /// `UploadOutcome::AlreadyExists`, so publishing the same version twice
    /// succeeds both times.
    pub async fn upload(
        &self,
        artifact: &BuildArtifact,
        username: &str,
        password: &str,
    ) -> Result<UploadOutcome> {
        let file_name = artifact.file_name();
        let bytes = tokio::fs::read(&artifact.path)
            .await
            .map_err(|source| ClientError::ReadFailed {
                path: artifact.path.clone(),
                source,
            })?;
        let digest = sha256_hex(&bytes);
        debug!("Uploading {} ({} bytes, sha256={})", file_name, bytes.len(), digest);

        let content = Part::bytes(bytes)
            .file_name(file_name.clone())
            .mime_str("application/octet-stream")?;

        let form = Form::new()
            .text(":action", "file_upload")
            .text("protocol_version", "1")
            .text("metadata_version", "2.1")
            .text("name", artifact.name.clone())
            .text("version", artifact.version.clone())
            .text("filetype", artifact.kind.filetype())
            .text("pyversion", artifact.kind.pyversion().to_string())
            .text("sha256_digest", digest)
            .part("content", content);

        let response = self
            .client
            .post(&self.url)
            .basic_auth(username, Some(password))
            .multipart(form)
            .send()
            .await?;

        match check_upload_response(response, &file_name).await {
            Ok(()) => {
                info!("Uploaded {} to {}", file_name, self.url);
                Ok(UploadOutcome::Uploaded)
            }
            Err(ClientError::AlreadyExists(file)) => {
                info!("{} already exists on {}, skipping", file, self.url);
                Ok(UploadOutcome::AlreadyExists)
            }
            Err(e) => Err(e),
        }
    }
}

async fn check_upload_response(response: reqwest::Response, file_name: &str) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    if is_already_exists(status.as_u16(), &text) {
        return Err(ClientError::AlreadyExists(file_name.to_string()));
    }

    match status.as_u16() {
        401 | 403 => Err(ClientError::Unauthorized(format!(
            "index rejected the credentials for {}",
            file_name
        ))),
        code => Err(ClientError::api_error(code, text.trim())),
    }
}

/// Recognises the "file already exists" answers of common index servers
fn is_already_exists(status: u16, body: &str) -> bool {
    if status == 409 {
        return true;
    }
    let body = body.to_ascii_lowercase();
    match status {
        // PyPI, pypiserver, Nexus, Artifactory and GitLab phrasings
        400 => [
            "already exist",
            "updating asset",
            "cannot be updated",
            "already been taken",
        ]
        .iter()
        .any(|needle| body.contains(needle)),
        403 => body.contains("overwrite artifact"),
        _ => false,
    }
}
