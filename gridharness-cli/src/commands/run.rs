//! `gridharness run-tests | run-grid-tests | run-load-test` handlers
//!
//! Builds a [`RunPlan`], drives it through the [`Orchestrator`] and prints
//! a localized verdict banner. The returned code is the runner's own exit
//! code, or 130 when interrupted.

use std::io::Write;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use gridharness_core::config::HarnessConfig;
use gridharness_core::error::HarnessError;
use gridharness_environment::DockerCompose;
use gridharness_orchestrator::{Orchestrator, PlanOverrides, RunOutcome, RunPlan};
use gridharness_runner::ProcessDriver;

use crate::cli::{LoadTestArgs, RunArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// One of the three test workflows.
#[derive(Debug)]
pub enum Workflow {
    Tests(RunArgs),
    GridTests(RunArgs),
    LoadTest(LoadTestArgs),
}

impl Workflow {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tests(_) => "run-tests",
            Self::GridTests(_) => "run-grid-tests",
            Self::LoadTest(_) => "run-load-test",
        }
    }

    /// Resolve CLI arguments against configuration.
    pub fn plan(self, config: &HarnessConfig) -> Result<RunPlan, HarnessError> {
        match self {
            Self::Tests(args) => RunPlan::run_tests(config, args.into()),
            Self::GridTests(args) => RunPlan::grid_tests(config, args.into()),
            Self::LoadTest(args) => {
                let duration = args.duration_seconds;
                let overrides = PlanOverrides {
                    selector: args.test_selector,
                    report: args.report,
                    concurrency: args.parallel_count,
                    distribution: None,
                    extra_args: args.extra,
                };
                RunPlan::load_test(config, overrides, duration)
            }
        }
    }
}

impl From<RunArgs> for PlanOverrides {
    fn from(args: RunArgs) -> Self {
        Self {
            selector: args.selector,
            report: args.report,
            concurrency: args.parallel,
            distribution: args.distribution,
            extra_args: args.extra,
        }
    }
}

/// Execute a test workflow and return the process exit code.
///
/// # Errors
///
/// Configuration, environment start, health gate and runner launch
/// failures. The environment has already been torn down when any of
/// these is returned.
pub async fn execute(
    workflow: Workflow,
    config: &HarnessConfig,
    writer: &OutputWriter,
) -> Result<i32, CliError> {
    let name = workflow.name();
    let plan = workflow.plan(config)?;

    info!(
        workflow = name,
        profile = %plan.profile,
        selector = %plan.spec.selector,
        workers = plan.spec.concurrency.get(),
        distribution = %plan.spec.distribution,
        "starting workflow"
    );

    let runtime = Arc::new(DockerCompose::from_config(&config.environment));
    let driver = ProcessDriver::new(config.runner.clone());
    let orchestrator = Orchestrator::new(config, runtime, driver);

    let outcome = orchestrator.run(&plan).await?;

    let report = RunReport::new(
        name,
        &plan,
        &outcome,
        Language::from_code(&config.report.language),
    );
    let stdout = std::io::stdout();
    Ok(print_report(&report, writer, &mut stdout.lock()))
}

/// Print the verdict and return the runner's exit code.
///
/// A closed or failing stdout is logged, never turned into an exit code
/// of its own.
pub fn print_report(report: &RunReport, writer: &OutputWriter, out: &mut dyn Write) -> i32 {
    let printed = writer
        .render_to(report, out)
        .and_then(|()| out.flush().map_err(CliError::from));
    if let Err(e) = printed {
        warn!(error = %e, exit_code = report.exit_code, "cannot print run summary");
    }
    report.exit_code
}

/// Banner language (`report.language`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Language {
    #[default]
    En,
    Ja,
}

impl Language {
    /// Unknown codes fall back to English.
    pub fn from_code(code: &str) -> Self {
        match code.to_lowercase().as_str() {
            "ja" => Self::Ja,
            _ => Self::En,
        }
    }

    fn passed(self) -> &'static str {
        match self {
            Self::En => "All tests passed",
            Self::Ja => "すべてのテストが成功しました",
        }
    }

    fn failed(self) -> &'static str {
        match self {
            Self::En => "Tests failed",
            Self::Ja => "テストが失敗しました",
        }
    }

    fn interrupted(self) -> &'static str {
        match self {
            Self::En => "Interrupted",
            Self::Ja => "中断されました",
        }
    }

    fn labels(self) -> Labels {
        match self {
            Self::En => Labels {
                workflow: "Workflow",
                exit_code: "Exit code",
                duration: "Duration",
                report: "Report",
                missing: "(not generated)",
            },
            Self::Ja => Labels {
                workflow: "ワークフロー",
                exit_code: "終了コード",
                duration: "実行時間",
                report: "レポート",
                missing: "(生成されませんでした)",
            },
        }
    }
}

struct Labels {
    workflow: &'static str,
    exit_code: &'static str,
    duration: &'static str,
    report: &'static str,
    missing: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    Failed,
    Interrupted,
}

/// Final banner for one workflow run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub workflow: &'static str,
    pub profile: String,
    pub verdict: Verdict,
    pub exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    pub report_path: String,
    pub report_exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<&'static str>,
    #[serde(skip)]
    pub language: Language,
}

impl RunReport {
    pub fn new(
        workflow: &'static str,
        plan: &RunPlan,
        outcome: &RunOutcome,
        language: Language,
    ) -> Self {
        let report_path = plan.spec.report_path.display().to_string();
        match outcome {
            RunOutcome::Completed(result) => Self {
                workflow,
                profile: plan.profile.to_string(),
                verdict: if result.passed() {
                    Verdict::Passed
                } else {
                    Verdict::Failed
                },
                exit_code: result.exit_code,
                run_id: Some(result.run_id.to_string()),
                duration_secs: Some(result.duration.as_secs_f64()),
                report_path,
                report_exists: result.report_exists,
                signal: None,
                language,
            },
            RunOutcome::Interrupted { signal } => Self {
                workflow,
                profile: plan.profile.to_string(),
                verdict: Verdict::Interrupted,
                exit_code: outcome.exit_code(),
                run_id: None,
                duration_secs: None,
                report_path,
                report_exists: plan.spec.report_path.is_file(),
                signal: Some(signal),
                language,
            },
        }
    }
}

impl Render for RunReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let rule = "=".repeat(60);
        let labels = self.language.labels();
        let headline = match self.verdict {
            Verdict::Passed => format!("✓ {}", self.language.passed()).green().bold(),
            Verdict::Failed => format!("✗ {}", self.language.failed()).red().bold(),
            Verdict::Interrupted => {
                let signal = self.signal.unwrap_or("signal");
                format!("! {} ({signal})", self.language.interrupted())
                    .yellow()
                    .bold()
            }
        };

        writeln!(w)?;
        writeln!(w, "{rule}")?;
        writeln!(w, " {headline}")?;
        writeln!(w, "{rule}")?;
        writeln!(
            w,
            "  {}: {} (profile: {})",
            labels.workflow, self.workflow, self.profile
        )?;
        writeln!(w, "  {}: {}", labels.exit_code, self.exit_code)?;
        if let Some(secs) = self.duration_secs {
            writeln!(w, "  {}: {secs:.1}s", labels.duration)?;
        }
        if self.report_exists {
            writeln!(w, "  {}: {}", labels.report, self.report_path)?;
        } else {
            writeln!(
                w,
                "  {}: {} {}",
                labels.report,
                self.report_path,
                labels.missing.dimmed()
            )?;
        }
        Ok(())
    }
}
