//! Trigger command handler
//!
//! Evaluates an event against the declaration without running anything.

use anyhow::Result;
use colored::*;
use slipway_core::domain::registry::RegistryTarget;
use slipway_core::domain::release::LocalRegistryConfig;
use slipway_core::domain::trigger::{TriggerDecision, evaluate};
use slipway_lua::{ProcessEnv, load_declaration};

use super::EventArgs;
use crate::config::GlobalArgs;

pub async fn handle_trigger_command(args: EventArgs, globals: &GlobalArgs) -> Result<()> {
    let config = globals.load_config()?;
    let declaration = load_declaration(&config.workdir, &config.declaration, ProcessEnv)?;
    let event = args.to_event(&config.workdir).await?;

    println!("{} {} {}", "Event:".bold(), event.kind, event.git_ref);
    if !event.changed_files.is_empty() {
        println!("  {} changed file(s)", event.changed_files.len());
    }

    match evaluate(&event, &declaration.trigger) {
        TriggerDecision::Skip(reason) => {
            println!("{} {}", "Decision:".bold(), "skip".yellow());
            println!("  Reason: {}", reason);
        }
        TriggerDecision::Run(context) => {
            println!("{} {}", "Decision:".bold(), "run".green());
            println!("  Ref:       {} ({:?})", context.ref_name().cyan(), context.ref_type());
            println!("  SHA:       {}", context.sha.dimmed());
            println!("  Tag build: {}", context.is_tag_build);
            println!("  Main:      {}", context.is_main_branch);
            println!("  Version:   {}", context.version_string());

            let endpoint = declaration
                .images
                .as_ref()
                .map(|images| images.local_registry.endpoint())
                .unwrap_or_else(|| LocalRegistryConfig::default().endpoint());
            println!(
                "  Registry:  {}",
                RegistryTarget::resolve(&context, &endpoint)
            );
        }
    }

    Ok(())
}
