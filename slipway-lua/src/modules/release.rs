//! The `release` module
//!
//! Syntactic helpers for writing declarations. `define` and `image` hand
//! their table back unchanged; they exist for readability and editor
//! completion. `command` packs its arguments into an argv array.

use crate::module::DeclarationModule;
use mlua::prelude::*;

pub struct ReleaseModule;

impl DeclarationModule for ReleaseModule {
    fn id(&self) -> &'static str {
        "release"
    }

    fn register(&self, lua: &Lua) -> LuaResult<()> {
        let release = lua.create_table()?;

        release.set(
            "define",
            lua.create_function(|_, definition: LuaTable| Ok(definition))?,
        )?;

        release.set(
            "image",
            lua.create_function(|_, image: LuaTable| Ok(image))?,
        )?;

        release.set(
            "command",
            lua.create_function(|lua, argv: LuaVariadic<String>| {
                if argv.is_empty() {
                    return Err(LuaError::RuntimeError(
                        "release.command requires a program".to_string(),
                    ));
                }
                lua.create_sequence_from(argv.iter().cloned())
            })?,
        )?;

        lua.globals().set(self.id(), release)?;
        Ok(())
    }

    fn stubs(&self) -> String {
        r#"---@meta

---Release declaration helpers
---@class release
release = {}

---@class release.Trigger
---@field main_branch? string Branch whose pushes publish to the public registry
---@field paths_ignore? string[] Glob patterns; runs touching only these paths are skipped
---@field branches_ignore? string[] Glob patterns for branches whose pushes never run

---@class release.Isolation
---@field image? string Minimal image the source archive must install in
---@field install? string[] Install command; the archive path is appended

---@class release.Package
---@field runtimes? string[] Runtimes that must answer `--version`
---@field toolchain? string[][] Commands that install the build tooling
---@field build? string[] Build command
---@field output_dir? string Directory the build writes into
---@field verify_sdist? string[] Source archive verifier; the archive path is appended
---@field install_wheel? string[] Install command; the wheel path is appended
---@field verify_installed? string[] Installed-data verifier
---@field isolation? release.Isolation
---@field artifact? { name?: string, retention_days?: integer }
---@field index? { url?: string }

---@class release.Base
---@field image string Name of an image declared earlier
---@field arg? string Build argument receiving its first tag (default BASE_IMAGE)

---@class release.Image
---@field name string Unique image name
---@field repository string Repository without registry host or tag
---@field context? string Build context directory
---@field platforms string[] Target platforms
---@field base? release.Base
---@field build_args? table<string, string> `{version}` and `{sha}` are expanded

---@class release.Images
---@field default_tag? string Tag used when no version tag applies
---@field branch_pattern? string Regex selecting branches that become tags
---@field local_registry? { image?: string, port?: integer }
---@field builds release.Image[]

---@class release.Definition
---@field name string
---@field trigger? release.Trigger
---@field package? release.Package
---@field images? release.Images

---Declare the release
---@param definition release.Definition
---@return release.Definition
function release.define(definition) end

---Declare one container image
---@param image release.Image
---@return release.Image
function release.image(image) end

---Build an argument vector
---@param program string
---@param ... string
---@return string[]
---
---@usage
---build = release.command("python3", "-m", "build", "--sdist", "--wheel", ".")
function release.command(program, ...) end
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lua() -> Lua {
        let lua = Lua::new();
        ReleaseModule.register(&lua).unwrap();
        lua
    }

    #[test]
    fn test_define_returns_table() {
        let name: String = lua()
            .load(r#"return release.define({ name = "hub" }).name"#)
            .eval()
            .unwrap();
        assert_eq!(name, "hub");
    }

    #[test]
    fn test_image_returns_table() {
        let repository: String = lua()
            .load(r#"return release.image({ repository = "org/img" }).repository"#)
            .eval()
            .unwrap();
        assert_eq!(repository, "org/img");
    }

    #[test]
    fn test_command_builds_argv() {
        let argv: Vec<String> = lua()
            .load(r#"return release.command("pip", "install", ".")"#)
            .eval()
            .unwrap();
        assert_eq!(argv, vec!["pip", "install", "."]);
    }

    #[test]
    fn test_command_requires_program() {
        let result: LuaResult<Vec<String>> = lua().load("return release.command()").eval();
        assert!(result.is_err());
    }
}
