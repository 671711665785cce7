//! Core domain types
//!
//! These types are transient, pipeline-scoped values. They are shared between
//! the declaration parser (which produces a `ReleaseDeclaration`), the runner
//! (which executes it) and the CLI (which prints the resulting reports).

pub mod artifact;
pub mod image;
pub mod log;
pub mod registry;
pub mod release;
pub mod report;
pub mod trigger;
