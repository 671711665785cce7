//! Run command handler
//!
//! Runs the release and prints the per-step report.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use colored::*;
use slipway_core::domain::log::{LogEntry, LogLevel};
use slipway_core::domain::report::{PipelineReport, RunReport, StepOutcome, StepStatus};
use slipway_core::domain::trigger::TriggerDecision;
use slipway_runner::{PipelineSelection, ReleaseOrchestrator};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

use super::EventArgs;
use crate::config::GlobalArgs;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Only {
    Package,
    Images,
}

impl From<Only> for PipelineSelection {
    fn from(only: Only) -> Self {
        match only {
            Only::Package => PipelineSelection::Package,
            Only::Images => PipelineSelection::Images,
        }
    }
}

fn selection(only: Option<Only>) -> PipelineSelection {
    only.map_or(PipelineSelection::All, PipelineSelection::from)
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub event: EventArgs,

    /// Run a single pipeline
    #[arg(long, value_enum)]
    pub only: Option<Only>,

    /// Write the JSON run report to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Also print the pipeline log lines
    #[arg(short, long)]
    pub verbose: bool,
}

pub async fn handle_run_command(args: RunArgs, globals: &GlobalArgs) -> Result<ExitCode> {
    let config = globals.load_config()?;
    let event = args.event.to_event(&config.workdir).await?;
    let orchestrator = ReleaseOrchestrator::from_config(config)?;
    info!(
        "Loaded release {} ({} changed file(s))",
        orchestrator.declaration().name,
        event.changed_files.len()
    );

    let report = orchestrator.run(&event, selection(args.only)).await;
    print_report(&report, args.verbose);

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        println!("  {} {}", "Report written to".dimmed(), path.display());
    }

    Ok(ExitCode::from(u8::try_from(report.exit_code()).unwrap_or(1)))
}

/// Print a run report
pub fn print_report(report: &RunReport, verbose: bool) {
    println!(
        "{} {}",
        "Release run".bold(),
        report.run_id.to_string().dimmed()
    );

    if let TriggerDecision::Skip(reason) = &report.decision {
        println!("  {} {}", "Skipped:".yellow(), reason);
        return;
    }

    for pipeline in report.pipelines() {
        print_pipeline(pipeline, verbose);
    }

    println!();
    if report.succeeded() {
        println!("{}", "✓ Release run succeeded".green().bold());
    } else {
        println!("{}", "✗ Release run failed".red().bold());
    }
}

fn print_pipeline(pipeline: &PipelineReport, verbose: bool) {
    println!();
    let title = format!("{} pipeline", pipeline.pipeline);
    match &pipeline.registry {
        Some(registry) => println!("{} ({})", title.bold(), registry),
        None => println!("{}", title.bold()),
    }

    for step in &pipeline.steps {
        print_step(step);
    }

    if verbose && !pipeline.logs.is_empty() {
        println!("{}", "─".repeat(80).dimmed());
        for log in &pipeline.logs {
            print_log_entry(log);
        }
        println!("{}", "─".repeat(80).dimmed());
    }
}

fn print_step(step: &StepOutcome) {
    let duration = format!("{}ms", step.duration_ms).dimmed();
    match &step.status {
        StepStatus::Succeeded => println!("  {} {} {}", "✓".green(), step.name, duration),
        StepStatus::Skipped { reason } => println!(
            "  {} {} {}",
            "-".dimmed(),
            step.name,
            format!("({})", reason).dimmed()
        ),
        StepStatus::Failed { kind, message } => {
            println!(
                "  {} {} {} {}",
                "✗".red(),
                step.name,
                format!("[{}]", kind).red(),
                duration
            );
            for line in message.lines() {
                println!("      {}", line.red());
            }
        }
    }
}

/// Print a log entry
fn print_log_entry(log: &LogEntry) {
    let level_str = log.level.to_string().to_uppercase();
    let level_colored = match log.level {
        LogLevel::Debug => level_str.dimmed(),
        LogLevel::Info => level_str.cyan(),
        LogLevel::Warning => level_str.yellow(),
        LogLevel::Error => level_str.red(),
    };

    println!(
        "{} [{}] {}",
        log.timestamp.format("%H:%M:%S").to_string().dimmed(),
        level_colored,
        log.message
    );
}
