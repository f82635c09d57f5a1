//! `gridharness doctor` command handler
//!
//! Read-only: queries the compose runtime, the application and the grid
//! once each. Nothing is installed, started or written.

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use gridharness_core::config::HarnessConfig;
use gridharness_environment::probe::MAX_REQUEST_TIMEOUT;
use gridharness_environment::{ComposeRuntime, DockerCompose, GridClient, HealthProber};

use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `doctor` command. Always exits 0.
pub async fn execute(
    config: &HarnessConfig,
    source: String,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let runtime = DockerCompose::from_config(&config.environment);
    let report = DoctorReport {
        config_source: source,
        checks: run_checks(config, &runtime, &HealthProber::new()).await,
    };
    writer.render(&report)
}

/// Run every check once, in a fixed order.
pub async fn run_checks<R: ComposeRuntime>(
    config: &HarnessConfig,
    runtime: &R,
    prober: &HealthProber,
) -> Vec<DoctorCheck> {
    vec![
        check_runtime(runtime).await,
        check_program("test runner", &config.runner.command[..]),
        check_program("timeout", std::slice::from_ref(&config.runner.timeout_program)),
        check_app(&config.app.url, prober).await,
        check_grid(&GridClient::from_config(&config.grid)).await,
        check_report_dir(Path::new(&config.runner.report_dir)),
    ]
}

async fn check_runtime<R: ComposeRuntime>(runtime: &R) -> DoctorCheck {
    match runtime.version().await {
        Ok(version) => DoctorCheck::ok("compose runtime", version),
        Err(e) => DoctorCheck::fail("compose runtime", e.to_string()),
    }
}

fn check_program(name: &str, command: &[String]) -> DoctorCheck {
    let Some(program) = command.first().filter(|p| !p.is_empty()) else {
        return DoctorCheck::warn(name, "not configured");
    };
    match find_program(program) {
        Some(path) => DoctorCheck::ok(name, path.display().to_string()),
        None => DoctorCheck::fail(name, format!("'{program}' not found on PATH")),
    }
}

fn find_program(program: &str) -> Option<std::path::PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|p| p.is_file())
}

async fn check_app(url: &str, prober: &HealthProber) -> DoctorCheck {
    if prober.probe_once(url, MAX_REQUEST_TIMEOUT).await {
        DoctorCheck::ok("application", format!("{url} is responding"))
    } else {
        // started by the run workflows
        DoctorCheck::warn("application", format!("{url} is not responding"))
    }
}

async fn check_grid(client: &GridClient) -> DoctorCheck {
    match client.fetch_status().await {
        Ok(status) if status.is_ready() => DoctorCheck::ok(
            "selenium grid",
            format!("ready, {} node(s)", status.node_count()),
        ),
        Ok(status) => DoctorCheck::warn(
            "selenium grid",
            status.message().unwrap_or("reachable but not ready").to_owned(),
        ),
        Err(e) => {
            debug!(error = %e, "grid not reachable");
            DoctorCheck::warn("selenium grid", e.to_string())
        }
    }
}

fn check_report_dir(dir: &Path) -> DoctorCheck {
    if dir.is_dir() {
        DoctorCheck::ok("report directory", dir.display().to_string())
    } else {
        DoctorCheck::warn(
            "report directory",
            format!("{} does not exist yet, it will be created on the first run", dir.display()),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorCheck {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

impl DoctorCheck {
    fn new(name: &str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_owned(),
            status,
            detail: detail.into(),
        }
    }

    fn ok(name: &str, detail: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Ok, detail)
    }

    fn warn(name: &str, detail: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Warn, detail)
    }

    fn fail(name: &str, detail: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Fail, detail)
    }
}

#[derive(Debug, Serialize)]
pub struct DoctorReport {
    pub config_source: String,
    pub checks: Vec<DoctorCheck>,
}

impl Render for DoctorReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "gridharness doctor (config: {})", self.config_source.bold())?;
        writeln!(w)?;
        for check in &self.checks {
            let mark = match check.status {
                CheckStatus::Ok => "✓".green().bold(),
                CheckStatus::Warn => "!".yellow().bold(),
                CheckStatus::Fail => "✗".red().bold(),
            };
            writeln!(w, "  {mark} {:<18} {}", check.name, check.detail)?;
        }

        let failures = self
            .checks
            .iter()
            .filter(|c| c.status == CheckStatus::Fail)
            .count();
        writeln!(w)?;
        if failures == 0 {
            writeln!(w, "{}", "No blocking problems found.".green())?;
        } else {
            writeln!(w, "{}", format!("{failures} blocking problem(s) found.").red())?;
        }
        Ok(())
    }
}
