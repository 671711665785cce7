//! Init command handler
//!
//! Writes a starter `release.lua` plus `.luarc.json` and LuaLS stubs for
//! the declaration modules.

use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use slipway_lua::{DECLARATION_TEMPLATE, MapVars, declaration_modules};
use std::fs;
use std::path::{Path, PathBuf};

const STUBS_DIR: &str = ".slipway/stubs";

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Output directory for generated files
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,

    /// Overwrite an existing release.lua
    #[arg(long)]
    pub force: bool,
}

pub fn handle_init_command(args: InitArgs) -> Result<()> {
    fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;

    generate_declaration(&args.output, args.force)?;
    generate_luarc_json(&args.output)?;
    generate_stub_files(&args.output)?;

    println!("{}", "✓ Release declaration initialised!".green().bold());
    println!();
    println!("{}", "Next steps:".bold());
    println!("  1. Edit release.lua for your project");
    println!("  2. Validate it with {}", "slipway check".cyan());
    println!(
        "  3. Dry-run the trigger with {}",
        "slipway trigger --event push --ref refs/heads/main".cyan()
    );

    Ok(())
}

fn generate_declaration(output_path: &Path, force: bool) -> Result<()> {
    let path = output_path.join("release.lua");
    if path.exists() && !force {
        println!(
            "  {} release.lua {}",
            "Kept".yellow(),
            "(exists, use --force to overwrite)".dimmed()
        );
        return Ok(());
    }

    fs::write(&path, DECLARATION_TEMPLATE)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("  {} release.lua", "Created".green());
    Ok(())
}

/// Generate .luarc.json for Lua LSP configuration
fn generate_luarc_json(output_path: &Path) -> Result<()> {
    let luarc_path = output_path.join(".luarc.json");

    let luarc = serde_json::json!({
        "$schema": "https://raw.githubusercontent.com/sumneko/vscode-lua/master/setting/schema.json",
        "runtime": { "version": "Lua 5.4" },
        "diagnostics": { "globals": ["release", "env"] },
        "workspace": { "library": [STUBS_DIR], "checkThirdParty": false },
        "completion": { "callSnippet": "Both" }
    });

    fs::write(&luarc_path, serde_json::to_string_pretty(&luarc)? + "\n")
        .with_context(|| format!("Failed to write .luarc.json to {:?}", luarc_path))?;

    println!("  {} .luarc.json", "Created".green());
    Ok(())
}

/// Generate stub files from the modules the sandbox registers
fn generate_stub_files(output_path: &Path) -> Result<()> {
    let stubs_dir = output_path.join(STUBS_DIR);
    fs::create_dir_all(&stubs_dir)
        .with_context(|| format!("Failed to create stubs directory at {:?}", stubs_dir))?;

    for (id, stubs) in declaration_modules(MapVars::default()).stub_files() {
        let stub_path = stubs_dir.join(format!("{}.lua", id));
        fs::write(&stub_path, stubs)
            .with_context(|| format!("Failed to write stub file {:?}", stub_path))?;

        println!("  {} {}.lua", "Created".green(), id);
    }

    println!(
        "  {} in {}",
        "Stubs ready".green(),
        stubs_dir.display().to_string().cyan()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_all_files() {
        let dir = tempfile::tempdir().unwrap();
        handle_init_command(InitArgs {
            output: dir.path().to_path_buf(),
            force: false,
        })
        .unwrap();

        let declaration = fs::read_to_string(dir.path().join("release.lua")).unwrap();
        assert_eq!(declaration, DECLARATION_TEMPLATE);
        assert!(dir.path().join(".slipway/stubs/release.lua").exists());
        assert!(dir.path().join(".slipway/stubs/env.lua").exists());

        let luarc: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join(".luarc.json")).unwrap())
                .unwrap();
        assert_eq!(luarc["diagnostics"]["globals"][0], "release");
        assert_eq!(luarc["workspace"]["library"][0], ".slipway/stubs");
    }

    #[test]
    fn test_init_keeps_existing_declaration() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("release.lua"), "-- mine").unwrap();

        handle_init_command(InitArgs {
            output: dir.path().to_path_buf(),
            force: false,
        })
        .unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("release.lua")).unwrap(),
            "-- mine"
        );

        handle_init_command(InitArgs {
            output: dir.path().to_path_buf(),
            force: true,
        })
        .unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("release.lua")).unwrap(),
            DECLARATION_TEMPLATE
        );
    }
}
