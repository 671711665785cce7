//! Slipway release declarations
//!
//! Release declarations are Lua files evaluated in a restricted sandbox.
//! This crate provides:
//! - the module trait and registry used to populate the sandbox
//! - the `release` and `env` modules
//! - the declaration parser and its validation
//! - LuaLS stubs and a starter template for `slipway init`

pub mod module;
pub mod modules;
pub mod parser;
pub mod sandbox;
pub mod template;

pub use module::{DeclarationModule, ModuleRegistry};
pub use modules::{EnvModule, MapVars, ProcessEnv, ReleaseModule, VarProvider};
pub use parser::{load_declaration, parse_declaration, parse_declaration_with};
pub use sandbox::{create_declaration_sandbox, declaration_modules};
pub use template::DECLARATION_TEMPLATE;

pub use slipway_core::domain::release::ReleaseDeclaration;
