//! Lua sandbox creation
//!
//! Declarations are evaluated in a restricted interpreter: no filesystem,
//! network or process access, and no way to load external code. Modules are
//! installed through a `ModuleRegistry`.

use mlua::{Lua, LuaOptions, Result as LuaResult, StdLib};

use crate::module::ModuleRegistry;
use crate::modules::{EnvModule, ReleaseModule, VarProvider};

/// Interpreter with the restricted standard library and no modules
///
/// Only `table`, `string`, `math` and `coroutine` are loaded; `io`, `os`,
/// `package` and `debug` are not, and `require`, `dofile` and `loadfile` are
/// removed.
fn restricted_lua() -> LuaResult<Lua> {
    let lua = unsafe {
        Lua::unsafe_new_with(
            StdLib::TABLE | StdLib::STRING | StdLib::MATH | StdLib::COROUTINE,
            LuaOptions::default(),
        )
    };

    lua.globals().set("require", mlua::Nil)?;
    lua.globals().set("dofile", mlua::Nil)?;
    lua.globals().set("loadfile", mlua::Nil)?;

    Ok(lua)
}

/// Registry with every module a declaration can use
pub fn declaration_modules<V: VarProvider + 'static>(provider: V) -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    registry.register(ReleaseModule);
    registry.register(EnvModule::new(provider));
    registry
}

/// Creates a sandbox with `release` and an `env` module backed by `provider`
pub fn create_declaration_sandbox<V: VarProvider + 'static>(provider: V) -> LuaResult<Lua> {
    let lua = restricted_lua()?;
    declaration_modules(provider).register_all(&lua)?;
    Ok(lua)
}
