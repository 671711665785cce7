//! Slipway release runner
//!
//! Executes a release declaration: evaluates the trigger, then runs the
//! package pipeline and the image pipeline against the container engine,
//! the artifact store, the package index and the tag source.

pub mod config;
pub mod container;
pub mod orchestrator;
pub mod pipeline;
pub mod process;
pub mod service;

#[cfg(test)]
mod testing;

pub use config::{Config, Credentials, Secret, Secrets};
pub use orchestrator::{PipelineSelection, ReleaseOrchestrator, Services};
