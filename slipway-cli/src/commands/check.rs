//! Check command handler
//!
//! Parses the declaration and prints what a run would do.

use anyhow::Result;
use colored::*;
use slipway_lua::{ProcessEnv, ReleaseDeclaration, load_declaration};
use slipway_runner::container::ContainerEngine;
use slipway_runner::process::SystemCommandRunner;
use std::sync::Arc;

use crate::config::GlobalArgs;

pub async fn handle_check_command(globals: &GlobalArgs) -> Result<()> {
    let config = globals.load_config()?;
    let declaration = load_declaration(&config.workdir, &config.declaration, ProcessEnv)?;

    println!(
        "{} {}",
        "✓".green(),
        format!("{} is valid", config.declaration.display()).bold()
    );
    print_declaration(&declaration);

    let engine = ContainerEngine::new(
        &config.container_engine,
        Arc::new(SystemCommandRunner::new()),
    );
    println!("\n{}", "Container engine:".bold());
    match engine.check_available().await {
        Ok(version) => println!("  {} {}", engine.program().cyan(), version.dimmed()),
        Err(e) => println!("  {} {:#}", "✗".yellow(), e),
    }
    Ok(())
}

fn print_declaration(declaration: &ReleaseDeclaration) {
    println!("  Name:          {}", declaration.name.cyan());

    let trigger = &declaration.trigger;
    println!("\n{}", "Trigger:".bold());
    println!("  Main branch:   {}", trigger.main_branch);
    println!(
        "  Paths ignored: {}",
        trigger.paths_ignore.patterns().collect::<Vec<_>>().join(", ")
    );
    println!(
        "  Branches ignored: {}",
        trigger.branches_ignore.patterns().collect::<Vec<_>>().join(", ")
    );

    if let Some(package) = &declaration.package {
        println!("\n{}", "Package:".bold());
        println!("  Runtimes:      {}", package.toolchain.runtimes.join(", "));
        println!("  Build:         {}", package.build);
        println!("  Output:        {}", package.output_dir);
        println!("  Isolation:     {}", package.isolation.image);
        println!(
            "  Artifact:      {} ({} days)",
            package.artifact.name, package.artifact.retention_days
        );
        println!("  Index:         {}", package.index.url);
    }

    if let Some(images) = &declaration.images {
        println!("\n{}", "Images:".bold());
        println!("  Default tag:   {}", images.default_tag);
        println!("  Branch tags:   {}", images.branch_pattern);
        println!("  Local registry: {}", images.local_registry.endpoint());
        for image in &images.builds {
            let base = image
                .base
                .as_ref()
                .map(|b| format!(" <- {}", b.image))
                .unwrap_or_default();
            println!(
                "  {} {}{} [{}]",
                "▸".cyan(),
                image.name,
                base.dimmed(),
                image.platforms.join(", ")
            );
            println!("      {} in {}", image.repository, image.context.dimmed());
        }
    }
}
