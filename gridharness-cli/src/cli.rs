//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use gridharness_core::types::DistributionMode;

/// Default configuration file, used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "gridharness.toml";

/// gridharness -- bring up a compose environment, gate on health,
/// run the browser suite, always tear down.
///
/// Use `gridharness <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "gridharness", version, about, long_about = None)]
pub struct Cli {
    /// Path to the gridharness.toml configuration file
    /// (default: gridharness.toml, optional).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the standalone-browser suite (profile `test`).
    RunTests(RunArgs),

    /// Run the parallel suite against the Selenium Grid (profile `grid`).
    RunGridTests(RunArgs),

    /// Run a time-boxed load test against the Selenium Grid.
    RunLoadTest(LoadTestArgs),

    /// Query the Selenium Grid status endpoint.
    GridMonitor(GridMonitorArgs),

    /// Analyze execution logs and performance reports written by the test suite.
    Perf(PerfArgs),

    /// Manage configuration.
    Config(ConfigArgs),

    /// Read-only environment diagnostics.
    Doctor,
}

// ---- run-tests / run-grid-tests ----

/// Runner overrides shared by the test workflows.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Test selector (file, class or method pattern).
    #[arg(long)]
    pub selector: Option<String>,

    /// Number of parallel workers.
    #[arg(short = 'n', long = "parallel")]
    pub parallel: Option<usize>,

    /// Distribution mode (by-file, by-test).
    #[arg(long = "dist")]
    pub distribution: Option<DistributionMode>,

    /// HTML report path.
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Extra arguments passed verbatim to the runner (after `--`).
    #[arg(last = true)]
    pub extra: Vec<String>,
}

// ---- run-load-test ----

/// `run-load-test [parallel_count] [duration_seconds] [test_selector]`
#[derive(Args, Debug)]
pub struct LoadTestArgs {
    /// Number of parallel workers (default: runner.load_concurrency, 20).
    pub parallel_count: Option<usize>,

    /// Wall-clock budget in seconds (default: runner.load_duration_secs, 300).
    pub duration_seconds: Option<u64>,

    /// Test selector (default: runner.grid_selector).
    pub test_selector: Option<String>,

    /// HTML report path.
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Extra arguments passed verbatim to the runner (after `--`).
    #[arg(last = true)]
    pub extra: Vec<String>,
}

// ---- grid-monitor ----

#[derive(Args, Debug)]
pub struct GridMonitorArgs {
    #[command(subcommand)]
    pub action: GridAction,
}

#[derive(Subcommand, Debug)]
pub enum GridAction {
    /// One-shot reachability and summary.
    Status,
    /// Per-node table.
    Nodes,
    /// Redraw the status every interval until interrupted.
    Monitor {
        /// Poll interval in seconds (default: grid.monitor_interval_secs, 5).
        #[arg(long)]
        interval: Option<u64>,
    },
}

// ---- perf ----

#[derive(Args, Debug)]
pub struct PerfArgs {
    #[command(subcommand)]
    pub action: PerfAction,
}

#[derive(Subcommand, Debug)]
pub enum PerfAction {
    /// Summarize `execution_*.json` files, falling back to
    /// `performance_report_*.json` files when DIR has none.
    Analyze {
        /// Directory containing execution logs.
        #[arg(default_value = "performance_logs")]
        dir: PathBuf,

        /// Directory searched for `performance_report_*.json` in the fallback.
        #[arg(long, default_value = ".")]
        reports_dir: PathBuf,

        /// Also write `parallel_analysis_<ts>.json` and `parallel_report_<ts>.txt` into DIR,
        /// or `performance_report.html` into the reports directory in the fallback.
        #[arg(long)]
        save: bool,
    },
    /// Per-action statistics from `performance_report_*.json` files.
    Trends {
        /// Directory containing performance reports.
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Write an HTML report to this path.
        #[arg(long)]
        html: Option<PathBuf>,
    },
}

// ---- config ----

/// Manage gridharness configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, environment, app, grid, runner, report).
        #[arg(long)]
        section: Option<String>,
    },
}
