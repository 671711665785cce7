//! Release declaration
//!
//! Structure produced by the declaration parser and consumed by the runner.
//! Defaults mirror a Python package with a Node-built frontend, published to
//! PyPI, plus a family of container images.

use serde::Serialize;

use super::image::ImageSpec;
use super::trigger::TriggerRules;

/// A non-empty argument vector (program followed by its arguments)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandLine(Vec<String>);

impl CommandLine {
    /// Returns `None` for an empty argument vector
    pub fn new(argv: Vec<String>) -> Option<Self> {
        if argv.is_empty() || argv[0].trim().is_empty() {
            None
        } else {
            Some(Self(argv))
        }
    }

    /// Convenience constructor for literal command lines
    pub fn of(program: &str, args: &[&str]) -> Self {
        Self(
            std::iter::once(program)
                .chain(args.iter().copied())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn program(&self) -> &str {
        &self.0[0]
    }

    pub fn args(&self) -> &[String] {
        &self.0[1..]
    }

    /// Returns a copy with one more trailing argument
    pub fn with_arg(&self, arg: impl Into<String>) -> Self {
        let mut argv = self.0.clone();
        argv.push(arg.into());
        Self(argv)
    }
}

impl std::fmt::Display for CommandLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}

/// Runtimes that must be present and commands that install the build tooling
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolchainConfig {
    pub runtimes: Vec<String>,
    pub install: Vec<CommandLine>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            runtimes: vec!["python3".to_string(), "node".to_string()],
            install: vec![CommandLine::of(
                "python3",
                &["-m", "pip", "install", "--upgrade", "pip", "build"],
            )],
        }
    }
}

/// Disposable-container install check for the source archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IsolationConfig {
    /// Minimal image lacking the secondary toolchain
    pub image: String,
    /// Install command; the mounted sdist path is appended
    pub install: CommandLine,
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            image: "python:3.9-slim-bullseye".to_string(),
            install: CommandLine::of("pip", &["install"]),
        }
    }
}

/// Retained build-artifact bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactConfig {
    /// Bundle name; the commit SHA is appended
    pub name: String,
    pub retention_days: u32,
}

/// Package index endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexConfig {
    /// Legacy upload endpoint
    pub url: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            url: "https://upload.pypi.org/legacy/".to_string(),
        }
    }
}

/// Package pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageConfig {
    pub toolchain: ToolchainConfig,
    pub build: CommandLine,
    /// Directory the build writes into, relative to the workdir
    pub output_dir: String,
    /// Source-archive verifier; the sdist path is appended
    pub verify_sdist: CommandLine,
    /// Binary-package install command; the wheel path is appended
    pub install_wheel: CommandLine,
    /// Installed-data verifier, inspects the current environment
    pub verify_installed: CommandLine,
    pub isolation: IsolationConfig,
    pub artifact: ArtifactConfig,
    pub index: IndexConfig,
}

impl PackageConfig {
    /// Default package pipeline for a project
    pub fn for_project(name: &str) -> Self {
        Self {
            toolchain: ToolchainConfig::default(),
            build: CommandLine::of("python3", &["-m", "build", "--sdist", "--wheel", "."]),
            output_dir: "dist".to_string(),
            verify_sdist: CommandLine::of("./ci/check_sdist.py", &[]),
            install_wheel: CommandLine::of("python3", &["-m", "pip", "install"]),
            verify_installed: CommandLine::of("./ci/check_installed_data.py", &[]),
            isolation: IsolationConfig::default(),
            artifact: ArtifactConfig {
                name: name.to_string(),
                retention_days: 7,
            },
            index: IndexConfig::default(),
        }
    }
}

/// Local side-service registry used for untrusted builds
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalRegistryConfig {
    pub image: String,
    pub port: u16,
}

impl LocalRegistryConfig {
    pub fn endpoint(&self) -> String {
        format!("localhost:{}", self.port)
    }
}

impl Default for LocalRegistryConfig {
    fn default() -> Self {
        Self {
            image: "registry:2".to_string(),
            port: 5000,
        }
    }
}

/// Image pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImagesConfig {
    /// Sentinel tag used when no version tag can be derived
    pub default_tag: String,
    /// Branches whose name becomes an image tag
    pub branch_pattern: String,
    pub local_registry: LocalRegistryConfig,
    /// Images in build order; a base image is always declared before its dependents
    pub builds: Vec<ImageSpec>,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            default_tag: "noref".to_string(),
            branch_pattern: "^main$".to_string(),
            local_registry: LocalRegistryConfig::default(),
            builds: Vec::new(),
        }
    }
}

/// Complete release declaration
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseDeclaration {
    pub name: String,
    pub trigger: TriggerRules,
    pub package: Option<PackageConfig>,
    pub images: Option<ImagesConfig>,
}

impl ReleaseDeclaration {
    /// Looks up a declared image by name
    pub fn image(&self, name: &str) -> Option<&ImageSpec> {
        self.images
            .as_ref()
            .and_then(|images| images.builds.iter().find(|b| b.name == name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_rejects_empty() {
        assert!(CommandLine::new(vec![]).is_none());
        assert!(CommandLine::new(vec![" ".to_string()]).is_none());
    }

    #[test]
    fn test_literal_command_line_always_has_program() {
        let cmd = CommandLine::of("./ci/check_sdist.py", &[]);
        assert_eq!(cmd.program(), "./ci/check_sdist.py");
        assert!(cmd.args().is_empty());
    }

    #[test]
    fn test_command_line_parts() {
        let cmd = CommandLine::of("python3", &["-m", "build"]);
        assert_eq!(cmd.program(), "python3");
        assert_eq!(cmd.args(), &["-m".to_string(), "build".to_string()]);
        assert_eq!(cmd.to_string(), "python3 -m build");

        let extended = cmd.with_arg("dist/pkg.tar.gz");
        assert_eq!(extended.args().len(), 3);
        assert_eq!(cmd.args().len(), 2);
    }

    #[test]
    fn test_package_defaults() {
        let config = PackageConfig::for_project("jupyterhub");
        assert_eq!(config.output_dir, "dist");
        assert_eq!(config.artifact.name, "jupyterhub");
        assert_eq!(config.index.url, "https://upload.pypi.org/legacy/");
        assert_eq!(config.toolchain.runtimes, vec!["python3", "node"]);
    }

    #[test]
    fn test_local_registry_endpoint() {
        assert_eq!(LocalRegistryConfig::default().endpoint(), "localhost:5000");
    }
}
