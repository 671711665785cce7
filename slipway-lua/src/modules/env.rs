//! Environment variable access for release declarations
//!
//! Declarations read environment variables through a `VarProvider`, so the
//! CLI can expose the process environment while tests use a fixed map.

use crate::module::DeclarationModule;
use mlua::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

/// Source of environment variables
pub trait VarProvider: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;
}

/// Reads the process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl VarProvider for ProcessEnv {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Fixed set of variables
#[derive(Debug, Clone, Default)]
pub struct MapVars {
    vars: HashMap<String, String>,
}

impl MapVars {
    pub fn new<K: Into<String>, V: Into<String>>(vars: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl VarProvider for MapVars {
    fn get(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

/// The `env` module
pub struct EnvModule<V: VarProvider> {
    provider: Arc<V>,
}

impl<V: VarProvider> EnvModule<V> {
    pub fn new(provider: V) -> Self {
        Self {
            provider: Arc::new(provider),
        }
    }
}

impl<V: VarProvider + 'static> DeclarationModule for EnvModule<V> {
    fn id(&self) -> &'static str {
        "env"
    }

    fn register(&self, lua: &Lua) -> LuaResult<()> {
        let env_table = lua.create_table()?;

        // env.get(name, default?)
        {
            let provider = self.provider.clone();
            env_table.set(
                "get",
                lua.create_function(move |_, (name, default): (String, Option<String>)| {
                    Ok(provider.get(&name).or(default))
                })?,
            )?;
        }

        // env.require(name)
        {
            let provider = self.provider.clone();
            env_table.set(
                "require",
                lua.create_function(move |_, name: String| {
                    provider.get(&name).ok_or_else(|| {
                        LuaError::RuntimeError(format!(
                            "Required environment variable '{}' is not set",
                            name
                        ))
                    })
                })?,
            )?;
        }

        // env.has(name)
        {
            let provider = self.provider.clone();
            env_table.set(
                "has",
                lua.create_function(move |_, name: String| Ok(provider.get(&name).is_some()))?,
            )?;
        }

        lua.globals().set(self.id(), env_table)?;
        Ok(())
    }

    fn stubs(&self) -> String {
        r#"---@meta

---Environment variable access for release declarations
---@class env
env = {}

---Get an environment variable with an optional default value
---@param name string The name of the environment variable
---@param default? string Value returned when the variable is not set
---@return string? value
---
---@usage
---local port = tonumber(env.get("REGISTRY_PORT", "5000"))
function env.get(name, default) end

---Get a required environment variable, failing the declaration if it is not set
---@param name string The name of the environment variable
---@return string value
function env.require(name) end

---Check whether an environment variable is set
---@param name string The name of the environment variable
---@return boolean exists
function env.has(name) end
"#
        .to_string()
    }
}
