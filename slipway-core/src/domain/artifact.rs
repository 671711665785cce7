//! Package build artifacts

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Distribution format of a package file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Source archive (`.tar.gz` or `.zip`)
    Sdist,
    /// Binary package (`.whl`) with its compatibility tags
    Wheel {
        python_tag: String,
        abi_tag: String,
        platform_tag: String,
    },
}

impl ArtifactKind {
    /// Index `filetype` form field value
    pub fn filetype(&self) -> &'static str {
        match self {
            ArtifactKind::Sdist => "sdist",
            ArtifactKind::Wheel { .. } => "bdist_wheel",
        }
    }

    /// Index `pyversion` form field value
    pub fn pyversion(&self) -> &str {
        match self {
            ArtifactKind::Sdist => "source",
            ArtifactKind::Wheel { python_tag, .. } => python_tag,
        }
    }
}

/// A single distributable file produced by the build step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildArtifact {
    pub path: PathBuf,
    pub kind: ArtifactKind,
    /// Distribution name as spelled in the file name
    pub name: String,
    pub version: String,
}

impl BuildArtifact {
    /// Classifies a file by its name, returning `None` for unknown formats
    pub fn classify(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?;
        let lower = file_name.to_ascii_lowercase();

        if lower.ends_with(".whl") {
            let stem = &file_name[..file_name.len() - ".whl".len()];
            let parts: Vec<&str> = stem.split('-').collect();
            // name-version[-build]-python-abi-platform
            if parts.len() < 5 || parts.len() > 6 {
                return None;
            }
            let n = parts.len();
            return Some(Self {
                path: path.to_path_buf(),
                kind: ArtifactKind::Wheel {
                    python_tag: parts[n - 3].to_string(),
                    abi_tag: parts[n - 2].to_string(),
                    platform_tag: parts[n - 1].to_string(),
                },
                name: parts[0].to_string(),
                version: parts[1].to_string(),
            });
        }

        let stem = if lower.ends_with(".tar.gz") {
            &file_name[..file_name.len() - ".tar.gz".len()]
        } else if lower.ends_with(".zip") {
            &file_name[..file_name.len() - ".zip".len()]
        } else {
            return None;
        };

        let (name, version) = stem.rsplit_once('-')?;
        if name.is_empty() || version.is_empty() {
            return None;
        }

        Some(Self {
            path: path.to_path_buf(),
            kind: ArtifactKind::Sdist,
            name: name.to_string(),
            version: version.to_string(),
        })
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn is_sdist(&self) -> bool {
        self.kind == ArtifactKind::Sdist
    }
}

/// Ordered set of build outputs: source archives first, then binary packages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildArtifactSet {
    artifacts: Vec<BuildArtifact>,
}

impl BuildArtifactSet {
    /// Classifies every path, dropping files that are not package artifacts
    pub fn from_paths<I: IntoIterator<Item = PathBuf>>(paths: I) -> Self {
        let mut artifacts: Vec<BuildArtifact> = paths
            .into_iter()
            .filter_map(|p| BuildArtifact::classify(&p))
            .collect();

        artifacts.sort_by(|a, b| {
            (!a.is_sdist(), a.file_name()).cmp(&(!b.is_sdist(), b.file_name()))
        });

        Self { artifacts }
    }

    /// First source archive
    pub fn sdist(&self) -> Option<&BuildArtifact> {
        self.artifacts.iter().find(|a| a.is_sdist())
    }

    /// First binary package
    pub fn wheel(&self) -> Option<&BuildArtifact> {
        self.artifacts.iter().find(|a| !a.is_sdist())
    }

    pub fn iter(&self) -> impl Iterator<Item = &BuildArtifact> {
        self.artifacts.iter()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_sdist() {
        let artifact = BuildArtifact::classify(Path::new("dist/jupyterhub-4.1.0.tar.gz")).unwrap();
        assert_eq!(artifact.kind, ArtifactKind::Sdist);
        assert_eq!(artifact.name, "jupyterhub");
        assert_eq!(artifact.version, "4.1.0");
        assert_eq!(artifact.kind.filetype(), "sdist");
        assert_eq!(artifact.kind.pyversion(), "source");
    }

    #[test]
    fn test_classify_sdist_with_dashes_in_name() {
        let artifact = BuildArtifact::classify(Path::new("my-package-0.2.0.zip")).unwrap();
        assert_eq!(artifact.name, "my-package");
        assert_eq!(artifact.version, "0.2.0");
    }

    #[test]
    fn test_classify_wheel() {
        let artifact =
            BuildArtifact::classify(Path::new("dist/jupyterhub-4.1.0-py3-none-any.whl")).unwrap();
        assert_eq!(artifact.name, "jupyterhub");
        assert_eq!(artifact.version, "4.1.0");
        assert_eq!(
            artifact.kind,
            ArtifactKind::Wheel {
                python_tag: "py3".to_string(),
                abi_tag: "none".to_string(),
                platform_tag: "any".to_string(),
            }
        );
        assert_eq!(artifact.kind.filetype(), "bdist_wheel");
        assert_eq!(artifact.kind.pyversion(), "py3");
    }

    #[test]
    fn test_classify_wheel_with_build_tag() {
        let artifact =
            BuildArtifact::classify(Path::new("pkg-1.0-1-cp311-cp311-manylinux_2_17_x86_64.whl"))
                .unwrap();
        assert_eq!(artifact.version, "1.0");
        assert_eq!(artifact.kind.pyversion(), "cp311");
    }

    #[test]
    fn test_classify_unknown() {
        assert!(BuildArtifact::classify(Path::new("dist/notes.txt")).is_none());
        assert!(BuildArtifact::classify(Path::new("dist/broken.whl")).is_none());
        assert!(BuildArtifact::classify(Path::new("nodash.tar.gz")).is_none());
    }

    #[test]
    fn test_set_orders_sdist_first() {
        let set = BuildArtifactSet::from_paths(vec![
            PathBuf::from("dist/jupyterhub-4.1.0-py3-none-any.whl"),
            PathBuf::from("dist/readme.txt"),
            PathBuf::from("dist/jupyterhub-4.1.0.tar.gz"),
        ]);
        assert_eq!(set.len(), 2);
        let names: Vec<String> = set.iter().map(|a| a.file_name()).collect();
        assert_eq!(
            names,
            vec!["jupyterhub-4.1.0.tar.gz", "jupyterhub-4.1.0-py3-none-any.whl"]
        );
        assert!(set.sdist().is_some());
        assert!(set.wheel().is_some());
    }

    #[test]
    fn test_empty_set() {
        let set = BuildArtifactSet::from_paths(Vec::new());
        assert!(set.is_empty());
        assert!(set.sdist().is_none());
    }
}
