//! Runner configuration
//!
//! Paths, the container engine and the secrets a release needs, read from
//! environment variables with defaults suitable for a CI checkout.

use std::path::PathBuf;

/// A credential that must never appear in logs
///
/// `Debug` and `Display` both print `[redacted]`; the value is only reachable
/// through `expose()`.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([redacted])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[redacted]")
    }
}

/// Username and password pair for the package index or the container registry
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: Secret,
}

/// Secrets consumed by a release run
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    /// Package index credentials (`PYPI_USERNAME`, `PYPI_PASSWORD`)
    pub index: Option<Credentials>,
    /// Public registry credentials (`DOCKER_USERNAME`, `DOCKER_PASSWORD`)
    pub registry: Option<Credentials>,
    /// Token for listing existing tags (`GITHUB_TOKEN`)
    pub github_token: Option<Secret>,
}

impl Secrets {
    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Self {
        let index = lookup("PYPI_PASSWORD").map(|password| Credentials {
            username: lookup("PYPI_USERNAME").unwrap_or_else(|| "__token__".to_string()),
            password: Secret::new(password),
        });

        let registry = match (lookup("DOCKER_USERNAME"), lookup("DOCKER_PASSWORD")) {
            (Some(username), Some(password)) => Some(Credentials {
                username,
                password: Secret::new(password),
            }),
            _ => None,
        };

        Self {
            index,
            registry,
            github_token: lookup("GITHUB_TOKEN").map(Secret::new),
        }
    }
}

/// Runner configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Repository checkout the release runs in
    pub workdir: PathBuf,

    /// Release declaration, relative to the workdir
    pub declaration: PathBuf,

    /// Root directory of the retained artifact bundles
    pub artifact_dir: PathBuf,

    /// Container engine CLI (`docker` or `podman`)
    pub container_engine: String,

    /// GitHub REST API root
    pub github_api_url: String,

    /// `owner/name` of the repository whose tags drive floating image tags
    pub github_repository: Option<String>,

    pub secrets: Secrets,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Environment variables (all optional):
    /// - SLIPWAY_WORKDIR (default: .)
    /// - SLIPWAY_DECLARATION (default: release.lua)
    /// - SLIPWAY_ARTIFACT_DIR (default: .slipway/artifacts)
    /// - SLIPWAY_CONTAINER_ENGINE (default: docker)
    /// - GITHUB_API_URL (default: https://api.github.com)
    /// - GITHUB_REPOSITORY
    /// - PYPI_USERNAME (default: __token__), PYPI_PASSWORD
    /// - DOCKER_USERNAME, DOCKER_PASSWORD
    /// - GITHUB_TOKEN
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Self::from_lookup(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Builds configuration from an arbitrary variable source
    ///
    /// Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            workdir: lookup("SLIPWAY_WORKDIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.workdir),
            declaration: lookup("SLIPWAY_DECLARATION")
                .map(PathBuf::from)
                .unwrap_or(defaults.declaration),
            artifact_dir: lookup("SLIPWAY_ARTIFACT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.artifact_dir),
            container_engine: lookup("SLIPWAY_CONTAINER_ENGINE")
                .unwrap_or(defaults.container_engine),
            github_api_url: lookup("GITHUB_API_URL").unwrap_or(defaults.github_api_url),
            github_repository: lookup("GITHUB_REPOSITORY"),
            secrets: Secrets::from_lookup(&lookup),
        }
    }

    /// Absolute or workdir-relative path of the artifact root
    pub fn artifact_root(&self) -> PathBuf {
        if self.artifact_dir.is_absolute() {
            self.artifact_dir.clone()
        } else {
            self.workdir.join(&self.artifact_dir)
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.container_engine.trim().is_empty() {
            anyhow::bail!("container_engine cannot be empty");
        }

        if self.declaration.as_os_str().is_empty() {
            anyhow::bail!("declaration path cannot be empty");
        }

        if !self.github_api_url.starts_with("http://") && !self.github_api_url.starts_with("https://")
        {
            anyhow::bail!("github_api_url must start with http:// or https://");
        }

        if let Some(repository) = &self.github_repository {
            if repository.split('/').filter(|p| !p.is_empty()).count() != 2 {
                anyhow::bail!("GITHUB_REPOSITORY must be 'owner/name', got '{}'", repository);
            }
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from("."),
            declaration: PathBuf::from("release.lua"),
            artifact_dir: PathBuf::from(".slipway/artifacts"),
            container_engine: "docker".to_string(),
            github_api_url: "https://api.github.com".to_string(),
            github_repository: None,
            secrets: Secrets::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.container_engine, "docker");
        assert_eq!(config.declaration, PathBuf::from("release.lua"));
        assert_eq!(config.artifact_root(), PathBuf::from("./.slipway/artifacts"));
        assert!(config.secrets.index.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup() {
        let config = Config::from_lookup(lookup(&[
            ("SLIPWAY_WORKDIR", "/src/hub"),
            ("SLIPWAY_CONTAINER_ENGINE", "podman"),
            ("SLIPWAY_ARTIFACT_DIR", "/tmp/artifacts"),
            ("GITHUB_REPOSITORY", "jupyterhub/jupyterhub"),
            ("PYPI_PASSWORD", "pypi-token"),
            ("DOCKER_USERNAME", "bot"),
            ("DOCKER_PASSWORD", "hunter2"),
            ("GITHUB_TOKEN", "ghs_abc"),
        ]));

        assert_eq!(config.workdir, PathBuf::from("/src/hub"));
        assert_eq!(config.container_engine, "podman");
        assert_eq!(config.artifact_root(), PathBuf::from("/tmp/artifacts"));
        assert_eq!(config.github_repository.as_deref(), Some("jupyterhub/jupyterhub"));

        let index = config.secrets.index.as_ref().unwrap();
        assert_eq!(index.username, "__token__");
        assert_eq!(index.password.expose(), "pypi-token");

        let registry = config.secrets.registry.as_ref().unwrap();
        assert_eq!(registry.username, "bot");
        assert_eq!(config.secrets.github_token.as_ref().unwrap().expose(), "ghs_abc");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_values_are_unset() {
        let config = Config::from_lookup(lookup(&[("GITHUB_TOKEN", ""), ("PYPI_PASSWORD", " ")]));
        assert!(config.secrets.github_token.is_none());
        assert!(config.secrets.index.is_none());
    }

    #[test]
    fn test_registry_needs_both_values() {
        let config = Config::from_lookup(lookup(&[("DOCKER_USERNAME", "bot")]));
        assert!(config.secrets.registry.is_none());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.container_engine = String::new();
        assert!(config.validate().is_err());
        config.container_engine = "docker".to_string();

        config.github_api_url = "api.github.com".to_string();
        assert!(config.validate().is_err());
        config.github_api_url = "https://api.github.com".to_string();

        config.github_repository = Some("jupyterhub".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_secrets_are_redacted() {
        let config = Config::from_lookup(lookup(&[
            ("PYPI_PASSWORD", "pypi-token"),
            ("DOCKER_USERNAME", "bot"),
            ("DOCKER_PASSWORD", "hunter2"),
            ("GITHUB_TOKEN", "ghs_abc"),
        ]));
        let debug = format!("{:?}", config);
        assert!(!debug.contains("pypi-token"));
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("ghs_abc"));
        assert_eq!(Secret::new("x").to_string(), "[redacted]");
    }
}
