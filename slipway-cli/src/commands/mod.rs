//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod check;
mod event;
mod init;
mod run;
mod tags;
mod trigger;

pub use event::EventArgs;
pub use init::InitArgs;
pub use run::RunArgs;
pub use tags::TagsArgs;

use anyhow::Result;
use clap::Subcommand;
use std::process::ExitCode;

use crate::config::GlobalArgs;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate the trigger and run the release pipelines
    Run(RunArgs),
    /// Show whether an event would run, and against which registry
    Trigger(EventArgs),
    /// Compute the tags an image would be pushed under
    Tags(TagsArgs),
    /// Parse and validate the release declaration
    Check,
    /// Write a starter declaration and Lua development files
    Init(InitArgs),
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module. Only `run` can
/// exit non-zero without an error: when a pipeline step failed.
pub async fn handle_command(command: Commands, globals: &GlobalArgs) -> Result<ExitCode> {
    match command {
        Commands::Run(args) => run::handle_run_command(args, globals).await,
        Commands::Trigger(args) => trigger::handle_trigger_command(args, globals)
            .await
            .map(|_| ExitCode::SUCCESS),
        Commands::Tags(args) => tags::handle_tags_command(args, globals)
            .await
            .map(|_| ExitCode::SUCCESS),
        Commands::Check => check::handle_check_command(globals)
            .await
            .map(|_| ExitCode::SUCCESS),
        Commands::Init(args) => init::handle_init_command(args).map(|_| ExitCode::SUCCESS),
    }
}
