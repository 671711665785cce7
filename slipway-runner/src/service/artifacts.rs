//! Artifact retention
//!
//! The package pipeline keeps what it built, whether or not it publishes it.
//! The filesystem store copies the files into `<root>/<name>-<sha>/` next to
//! a `manifest.json` listing digests and the retention period.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slipway_client::file_sha256;
use std::path::{Path, PathBuf};
use tracing::info;

const MANIFEST_FILE: &str = "manifest.json";

/// Files to retain under one named bundle
#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    pub name: String,
    /// Commit the files were built from
    pub sha: String,
    pub retention_days: u32,
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestFile {
    pub file_name: String,
    pub size: u64,
    pub sha256: String,
}

/// Description of a stored bundle, written as `manifest.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub name: String,
    pub sha: String,
    pub retention_days: u32,
    pub created_at: DateTime<Utc>,
    pub files: Vec<ManifestFile>,
}

/// Where a bundle ended up
#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub location: PathBuf,
    pub manifest: ArtifactManifest,
}

/// Retains build outputs after a run
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Stores a bundle, replacing any bundle with the same name and commit
    async fn upload(&self, bundle: &ArtifactBundle) -> Result<StoredArtifact>;
}

/// Artifact store backed by a local directory
#[derive(Debug, Clone)]
pub struct FilesystemArtifactStore {
    root: PathBuf,
}

impl FilesystemArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bundle_dir(&self, bundle: &ArtifactBundle) -> PathBuf {
        let short_sha: String = bundle.sha.chars().take(12).collect();
        if short_sha.is_empty() {
            self.root.join(&bundle.name)
        } else {
            self.root.join(format!("{}-{}", bundle.name, short_sha))
        }
    }
}

#[async_trait]
impl ArtifactStore for FilesystemArtifactStore {
    async fn upload(&self, bundle: &ArtifactBundle) -> Result<StoredArtifact> {
        if bundle.files.is_empty() {
            anyhow::bail!("artifact bundle '{}' has no files", bundle.name);
        }

        let location = self.bundle_dir(bundle);
        if tokio::fs::try_exists(&location).await.unwrap_or(false) {
            tokio::fs::remove_dir_all(&location)
                .await
                .with_context(|| format!("Failed to replace {}", location.display()))?;
        }
        tokio::fs::create_dir_all(&location)
            .await
            .with_context(|| format!("Failed to create {}", location.display()))?;

        let mut files = Vec::with_capacity(bundle.files.len());
        for source in &bundle.files {
            let file_name = source
                .file_name()
                .and_then(|n| n.to_str())
                .with_context(|| format!("Invalid artifact path {}", source.display()))?
                .to_string();

            let size = tokio::fs::copy(source, location.join(&file_name))
                .await
                .with_context(|| format!("Failed to copy {}", source.display()))?;
            let sha256 = hash_file(source).await?;

            files.push(ManifestFile {
                file_name,
                size,
                sha256,
            });
        }

        let manifest = ArtifactManifest {
            name: bundle.name.clone(),
            sha: bundle.sha.clone(),
            retention_days: bundle.retention_days,
            created_at: Utc::now(),
            files,
        };
        let json = serde_json::to_string_pretty(&manifest)?;
        tokio::fs::write(location.join(MANIFEST_FILE), json)
            .await
            .context("Failed to write artifact manifest")?;

        info!(
            "Stored {} file(s) as '{}' in {}",
            manifest.files.len(),
            manifest.name,
            location.display()
        );
        Ok(StoredArtifact { location, manifest })
    }
}

/// SHA-256 of `path`, computed on the blocking pool
async fn hash_file(path: &Path) -> Result<String> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || file_sha256(&owned))
        .await
        .context("Hashing task did not complete")?
        .with_context(|| format!("Failed to hash {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use slipway_client::sha256_hex;

    fn bundle(dir: &Path, files: &[(&str, &[u8])]) -> ArtifactBundle {
        let files = files
            .iter()
            .map(|(name, content)| {
                let path = dir.join(name);
                std::fs::write(&path, content).unwrap();
                path
            })
            .collect();

        ArtifactBundle {
            name: "jupyterhub".to_string(),
            sha: "0123456789abcdef0123".to_string(),
            retention_days: 7,
            files,
        }
    }

    #[tokio::test]
    async fn test_upload_copies_files_and_writes_manifest() {
        let dist = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let store = FilesystemArtifactStore::new(root.path());

        let stored = store
            .upload(&bundle(
                dist.path(),
                &[
                    ("jupyterhub-4.1.0.tar.gz", b"sdist"),
                    ("jupyterhub-4.1.0-py3-none-any.whl", b"wheel"),
                ],
            ))
            .await
            .unwrap();

        assert_eq!(stored.location, root.path().join("jupyterhub-0123456789ab"));
        assert!(stored.location.join("jupyterhub-4.1.0.tar.gz").exists());
        assert!(stored.location.join("jupyterhub-4.1.0-py3-none-any.whl").exists());

        let raw = std::fs::read_to_string(stored.location.join("manifest.json")).unwrap();
        let manifest: ArtifactManifest = serde_json::from_str(&raw).unwrap();
        assert_eq!(manifest.retention_days, 7);
        assert_eq!(manifest.files.len(), 2);
        assert_eq!(manifest.files[0].sha256, sha256_hex(b"sdist"));
        assert_eq!(manifest.files[0].size, 5);
    }

    #[tokio::test]
    async fn test_upload_replaces_previous_bundle() {
        let dist = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let store = FilesystemArtifactStore::new(root.path());

        let first = store
            .upload(&bundle(dist.path(), &[("old-1.0.tar.gz", b"old")]))
            .await
            .unwrap();
        let second = store
            .upload(&bundle(dist.path(), &[("new-1.0.tar.gz", b"new")]))
            .await
            .unwrap();

        assert_eq!(first.location, second.location);
        assert!(!second.location.join("old-1.0.tar.gz").exists());
        assert!(second.location.join("new-1.0.tar.gz").exists());
    }

    #[tokio::test]
    async fn test_upload_rejects_empty_bundle() {
        let root = tempfile::tempdir().unwrap();
        let store = FilesystemArtifactStore::new(root.path());
        let err = store
            .upload(&ArtifactBundle {
                name: "empty".to_string(),
                sha: String::new(),
                retention_days: 1,
                files: Vec::new(),
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no files"));
    }

    #[tokio::test]
    async fn test_upload_missing_file() {
        let root = tempfile::tempdir().unwrap();
        let store = FilesystemArtifactStore::new(root.path());
        let result = store
            .upload(&ArtifactBundle {
                name: "pkg".to_string(),
                sha: "abc".to_string(),
                retention_days: 1,
                files: vec![PathBuf::from("/nonexistent/pkg-1.0.tar.gz")],
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_hash_file_off_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jupyterhub-4.1.0.tar.gz");
        std::fs::write(&path, b"sdist").unwrap();

        assert_eq!(hash_file(&path).await.unwrap(), sha256_hex(b"sdist"));

        let err = hash_file(&dir.path().join("missing.whl")).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to hash"));
    }
}
