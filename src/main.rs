//! Task Runner binary
//!
//! Loads the configuration, starts one worker per `[[tasks]]` entry with a
//! built-in handler and runs until Ctrl+C.

mod builtin;
mod cli;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use taskrunner::config::{init_config, RunnerConfig};
use taskrunner::error::{Error, Result};
use taskrunner::logging;
use taskrunner::version;
use taskrunner::{Counter, HttpTaskClient, TaskRunner};

use crate::cli::{Cli, Commands, ConfigSubcommand};

/// How often per task type status is logged while running
const STATUS_INTERVAL: Duration = Duration::from_secs(60);

fn main() {
    // Parse CLI arguments first (before logging, so we know verbosity)
    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Version => {
            print!("{}", version::build_info());
            Ok(())
        }
        Commands::Config { subcommand } => handle_config_command(subcommand),
        Commands::Run { ref config } => run(config.as_deref(), cli.verbose, cli.quiet),
    };

    if let Err(e) = outcome {
        eprint!("{}", e.format_for_terminal());
        std::process::exit(e.exit_code());
    }
}

/// Load configuration, start the workers and block until shutdown
fn run(config_path: Option<&str>, verbose: u8, quiet: bool) -> Result<()> {
    let config = RunnerConfig::load(config_path)?;
    validate_handlers(&config)?;

    // The guards must be kept alive for the lifetime of the program
    let _log_guards = logging::init_logging(&config.logging, verbose, quiet)?;

    let build = version::build_info();
    info!(
        version = %build.full_version(),
        target = %build.target,
        profile = %build.profile,
        "Starting task runner"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(num_cpus::get().clamp(2, 8))
        .thread_name("taskrunner")
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create async runtime: {}", e)))?;

    runtime.block_on(run_async(config))
}

async fn run_async(config: RunnerConfig) -> Result<()> {
    let client = HttpTaskClient::new(config.client_config())?;
    let runner = TaskRunner::new(Arc::new(client), config.runner_options());

    info!(
        worker_id = %runner.worker_id(),
        server_url = %config.server.url,
        task_types = config.tasks.len(),
        "Configuration loaded"
    );

    if config.tasks.is_empty() {
        warn!("No [[tasks]] configured; nothing will be polled");
    }

    for entry in &config.tasks {
        let handler = builtin::lookup(&entry.handler)
            .ok_or_else(|| unknown_handler(&entry.task_type, &entry.handler))?;

        runner.start_worker_with_settings(
            &entry.task_type,
            handler,
            entry.capacity,
            config.worker_settings(entry),
        )?;
    }

    let shutdown_signal = tokio::signal::ctrl_c();
    tokio::pin!(shutdown_signal);

    let mut status_timer = tokio::time::interval(STATUS_INTERVAL);
    status_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    status_timer.tick().await;

    loop {
        tokio::select! {
            result = &mut shutdown_signal => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl+C, shutting down");
                }
                info!("Shutdown signal received");
                break;
            }
            _ = status_timer.tick() => log_status(&runner),
        }
    }

    runner.shutdown_all();
    info!("Waiting for in-flight tasks to finish");
    runner.wait_all().await;
    log_status(&runner);
    info!("Task runner stopped");

    Ok(())
}

fn log_status(runner: &TaskRunner) {
    let metrics = runner.metrics();
    for task_type in runner.task_types() {
        let Some(status) = runner.status(&task_type) else {
            continue;
        };
        info!(
            task_type = %task_type,
            state = %status.loop_state,
            capacity = status.capacity,
            busy = status.busy,
            paused = status.paused,
            polls = metrics.counter(Counter::Polls, &task_type),
            received = metrics.counter(Counter::TasksReceived, &task_type),
            failed = metrics.counter(Counter::ExecutionErrors, &task_type),
            update_failures = metrics.counter(Counter::UpdateFailures, &task_type),
            "Worker status"
        );
    }
}

/// Every configured handler must name a built-in
fn validate_handlers(config: &RunnerConfig) -> Result<()> {
    for entry in &config.tasks {
        if builtin::lookup(&entry.handler).is_none() {
            return Err(unknown_handler(&entry.task_type, &entry.handler));
        }
    }
    Ok(())
}

fn unknown_handler(task_type: &str, handler: &str) -> Error {
    Error::config_field_invalid(
        "tasks.handler",
        format!(
            "unknown handler '{}' for task type '{}'. Available: {}",
            handler,
            task_type,
            builtin::NAMES.join(", ")
        ),
    )
}

/// Handle configuration subcommands
fn handle_config_command(subcommand: ConfigSubcommand) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show { config } => {
            let cfg = RunnerConfig::load(config.as_deref())?;
            println!("{}", toml::to_string_pretty(&cfg)?);
        }
        ConfigSubcommand::Init { path, force } => {
            let written = init_config(path.as_deref(), force)?;
            println!("Configuration written to {}", written.display());
        }
        ConfigSubcommand::Validate { config } => {
            let cfg = RunnerConfig::load(config.as_deref())?;
            validate_handlers(&cfg)?;
            println!("Configuration is valid.");
        }
    }

    Ok(())
}
