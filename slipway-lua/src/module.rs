use mlua::prelude::*;

/// A Lua module exposed to release declarations.
///
/// Each module owns one global table named after its `id()` and ships the
/// LuaLS annotations editors use to complete it.
///
/// # Example
///
/// ```rust
/// use slipway_lua::module::DeclarationModule;
/// use mlua::prelude::*;
///
/// struct VersionModule;
///
/// impl DeclarationModule for VersionModule {
///     fn id(&self) -> &'static str {
///         "version"
///     }
///
///     fn register(&self, lua: &Lua) -> LuaResult<()> {
///         let table = lua.create_table()?;
///         table.set("current", "1.0.0")?;
///         lua.globals().set(self.id(), table)?;
///         Ok(())
///     }
///
///     fn stubs(&self) -> String {
///         "---@meta\n---@class version\nversion = {}\n".to_string()
///     }
/// }
/// ```
pub trait DeclarationModule: Send + Sync {
    /// Global name of the module inside the sandbox.
    ///
    /// Must be a valid Lua identifier and unique within a registry.
    fn id(&self) -> &'static str;

    /// Installs the module table into `lua`'s globals.
    fn register(&self, lua: &Lua) -> LuaResult<()>;

    /// LuaLS stub file content, starting with `---@meta`.
    fn stubs(&self) -> String;
}

/// Ordered set of modules installed into a declaration sandbox
pub struct ModuleRegistry {
    modules: Vec<Box<dyn DeclarationModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
        }
    }

    /// Registers a module
    ///
    /// # Panics
    /// Panics if a module with the same ID is already registered
    pub fn register<M: DeclarationModule + 'static>(&mut self, module: M) {
        let id = module.id();
        if self.modules.iter().any(|m| m.id() == id) {
            panic!("Module with id '{}' is already registered", id);
        }
        self.modules.push(Box::new(module));
    }

    /// Installs every module, stopping at the first failure
    pub fn register_all(&self, lua: &Lua) -> LuaResult<()> {
        for module in &self.modules {
            module.register(lua)?;
        }
        Ok(())
    }

    /// Stub files keyed by module id, for writing one `<id>.lua` per module
    pub fn stub_files(&self) -> Vec<(&'static str, String)> {
        self.modules.iter().map(|m| (m.id(), m.stubs())).collect()
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
