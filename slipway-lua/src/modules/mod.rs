//! Modules available to release declarations
//!
//! `release` is always installed; `env` is backed by whichever
//! `VarProvider` the caller supplies.

pub mod env;
pub mod release;

pub use env::{EnvModule, MapVars, ProcessEnv, VarProvider};
pub use release::ReleaseModule;
