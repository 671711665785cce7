//! Configuration module
//!
//! Global flags override the environment-derived runner configuration.

use anyhow::Result;
use clap::Args;
use slipway_runner::Config;
use std::path::PathBuf;

/// Flags shared by every command
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Repository checkout to release from
    #[arg(long, global = true, env = "SLIPWAY_WORKDIR")]
    pub workdir: Option<PathBuf>,

    /// Release declaration, relative to the workdir
    #[arg(long, global = true, env = "SLIPWAY_DECLARATION")]
    pub declaration: Option<PathBuf>,

    /// Container engine CLI (docker or podman)
    #[arg(long, global = true, env = "SLIPWAY_CONTAINER_ENGINE")]
    pub container_engine: Option<String>,

    /// Directory retaining build artifacts
    #[arg(long, global = true, env = "SLIPWAY_ARTIFACT_DIR")]
    pub artifact_dir: Option<PathBuf>,
}

impl GlobalArgs {
    /// Loads the runner configuration from the environment, then applies the flags
    pub fn load_config(&self) -> Result<Config> {
        let config = self.apply(Config::from_env()?);
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, mut config: Config) -> Config {
        if let Some(workdir) = &self.workdir {
            config.workdir = workdir.clone();
        }
        if let Some(declaration) = &self.declaration {
            config.declaration = declaration.clone();
        }
        if let Some(engine) = &self.container_engine {
            config.container_engine = engine.clone();
        }
        if let Some(artifact_dir) = &self.artifact_dir {
            config.artifact_dir = artifact_dir.clone();
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let args = GlobalArgs {
            workdir: Some(PathBuf::from("/src/hub")),
            container_engine: Some("podman".to_string()),
            ..GlobalArgs::default()
        };
        let config = args.apply(Config::default());

        assert_eq!(config.workdir, PathBuf::from("/src/hub"));
        assert_eq!(config.container_engine, "podman");
        assert_eq!(config.declaration, PathBuf::from("release.lua"));
    }

    #[test]
    fn test_load_config_validates_flags() {
        let args = GlobalArgs {
            container_engine: Some(" ".to_string()),
            ..GlobalArgs::default()
        };
        let err = args.load_config().unwrap_err();
        assert!(err.to_string().contains("container_engine"));
    }

    #[test]
    fn test_no_flags_keep_config() {
        let config = GlobalArgs::default().apply(Config::default());
        assert_eq!(config.workdir, PathBuf::from("."));
        assert_eq!(config.artifact_dir, PathBuf::from(".slipway/artifacts"));
    }
}
