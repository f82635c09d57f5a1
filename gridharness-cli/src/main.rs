//! gridharness -- compose-backed browser test harness.

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, warn};

use gridharness_cli::cli::{Cli, Commands};
use gridharness_cli::commands::{self, run::Workflow};
use gridharness_cli::error::CliError;
use gridharness_cli::output::OutputWriter;
use gridharness_core::config::{GeneralConfig, HarnessConfig};
use gridharness_orchestrator::logging::init_tracing;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => exit_code(code),
        Err(e) => {
            use colored::Colorize;
            eprintln!("{} {e}", "error:".red().bold());
            exit_code(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<i32, CliError> {
    let writer = OutputWriter::new(cli.output);
    let config_path = cli.config.as_deref();
    let config = commands::load_config(config_path).await;

    let general = config
        .as_ref()
        .map(|c| c.general.clone())
        .unwrap_or_else(|_| GeneralConfig::default());
    if let Err(e) = init_tracing(&general, cli.log_level.as_deref()) {
        eprintln!("warning: {e:#}");
    }
    debug!(source = %commands::config_source(config_path), "configuration resolved");

    match cli.command {
        // reports load failures itself
        Commands::Config(args) => {
            commands::config::execute(args, config_path, &writer).await?;
            Ok(0)
        }
        command => dispatch(command, &config?, config_path, &writer).await,
    }
}

async fn dispatch(
    command: Commands,
    config: &HarnessConfig,
    config_path: Option<&Path>,
    writer: &OutputWriter,
) -> Result<i32, CliError> {
    match command {
        Commands::RunTests(args) => commands::run::execute(Workflow::Tests(args), config, writer).await,
        Commands::RunGridTests(args) => {
            commands::run::execute(Workflow::GridTests(args), config, writer).await
        }
        Commands::RunLoadTest(args) => {
            commands::run::execute(Workflow::LoadTest(args), config, writer).await
        }
        Commands::GridMonitor(args) => {
            commands::grid::execute(args, config, writer).await?;
            Ok(0)
        }
        Commands::Perf(args) => {
            commands::perf::execute(args, writer).await?;
            Ok(0)
        }
        Commands::Doctor => {
            commands::doctor::execute(config, commands::config_source(config_path), writer).await?;
            Ok(0)
        }
        Commands::Config(args) => {
            commands::config::execute(args, config_path, writer).await?;
            Ok(0)
        }
    }
}

/// Exit codes outside 0..=255 are truncated by the OS; clamp instead.
fn exit_code(code: i32) -> ExitCode {
    match u8::try_from(code) {
        Ok(code) => ExitCode::from(code),
        Err(_) => {
            warn!(code, "exit code out of range, reporting 1");
            ExitCode::FAILURE
        }
    }
}
