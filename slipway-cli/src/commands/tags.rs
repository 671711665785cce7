//! Tags command handler

use anyhow::Result;
use clap::Args;
use colored::*;
use slipway_client::GithubClient;
use slipway_runner::service::{GithubTagResolver, StaticTagResolver, TagRequest, TagResolver};

use crate::config::GlobalArgs;

#[derive(Args, Debug)]
pub struct TagsArgs {
    /// Full git ref, e.g. refs/tags/4.1.0
    #[arg(long = "ref", env = "GITHUB_REF")]
    pub git_ref: String,

    /// Image repository, e.g. jupyterhub/jupyterhub
    #[arg(long)]
    pub repository: String,

    /// Registry host prefix, e.g. localhost:5000
    #[arg(long, default_value = "")]
    pub registry: String,

    /// Tag used when no version or branch tag applies
    #[arg(long, default_value = "noref")]
    pub default_tag: String,

    /// Branches whose name becomes a tag
    #[arg(long, default_value = "^main$")]
    pub branch_pattern: String,

    /// Existing release tag (repeatable); skips the GitHub lookup
    #[arg(long)]
    pub known: Vec<String>,
}

impl TagsArgs {
    fn request(&self) -> TagRequest {
        let prefix = format!("{}{}:", registry_prefix(&self.registry), self.repository);
        TagRequest {
            git_ref: self.git_ref.clone(),
            default_tag: format!("{}{}", prefix, self.default_tag),
            prefix,
            branch_pattern: self.branch_pattern.clone(),
        }
    }
}

/// Normalises a registry host into a tag prefix ending in `/`
fn registry_prefix(registry: &str) -> String {
    let registry = registry.trim().trim_end_matches('/');
    if registry.is_empty() {
        String::new()
    } else {
        format!("{}/", registry)
    }
}

pub async fn handle_tags_command(args: TagsArgs, globals: &GlobalArgs) -> Result<()> {
    let resolver: Box<dyn TagResolver> = if args.known.is_empty() {
        let config = globals.load_config()?;
        let client = GithubClient::new(
            &config.github_api_url,
            config
                .secrets
                .github_token
                .as_ref()
                .map(|token| token.expose().to_string()),
        );
        if !client.has_token() {
            eprintln!(
                "{}",
                "⚠ GITHUB_TOKEN is not set; only the default tag is produced".yellow()
            );
        }
        Box::new(GithubTagResolver::new(client, config.github_repository))
    } else {
        Box::new(StaticTagResolver::new(args.known.clone()))
    };

    let tags = resolver.resolve_tags(&args.request()).await?;
    for tag in tags.tags() {
        println!("{}", tag);
    }
    if tags.defaulted {
        eprintln!("{}", "(no version or branch tag applies; default used)".dimmed());
    }

    Ok(())
}
