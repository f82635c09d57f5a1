//! `gridharness perf` command handler

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use gridharness_core::error::HarnessError;
use gridharness_runner::perf::{SavedAnalysis, analyze_dir};
use gridharness_runner::trends::{HTML_REPORT_NAME, analyze_reports_dir};
use gridharness_runner::{PerfAnalysis, TrendAnalysis};

use crate::cli::{PerfAction, PerfArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `perf` command.
pub async fn execute(args: PerfArgs, writer: &OutputWriter) -> Result<(), CliError> {
    let report = match args.action {
        PerfAction::Analyze {
            dir,
            reports_dir,
            save,
        } => analyze(&dir, &reports_dir, save).await?,
        PerfAction::Trends { dir, html } => trends(&dir, html.as_deref()).await?,
    };
    writer.render(&report)
}

/// Analyze the execution logs in `dir`, optionally saving the results next
/// to them. Without execution logs, falls back to the performance reports in
/// `reports_dir`; `save` then writes the HTML report there.
///
/// Finding nothing in either place is not an error.
pub async fn analyze(dir: &Path, reports_dir: &Path, save: bool) -> Result<PerfReport, CliError> {
    info!(dir = %dir.display(), "analyzing execution logs");

    // a missing log directory just means the parallel suite never ran
    let logs = if tokio::fs::try_exists(dir).await.unwrap_or(false) {
        analyze_dir(dir).await.map_err(HarnessError::from)?
    } else {
        debug!(dir = %dir.display(), "no execution log directory");
        None
    };

    let Some(analysis) = logs else {
        info!(dir = %reports_dir.display(), "no execution logs, using performance reports");
        let html = save.then(|| reports_dir.join(HTML_REPORT_NAME));
        return match trends(reports_dir, html.as_deref()).await? {
            PerfReport::Empty { mut searched } => {
                searched.insert(0, format!("{}/execution_*.json", dir.display()));
                Ok(PerfReport::Empty { searched })
            }
            report => Ok(report),
        };
    };

    let saved = if save {
        Some(analysis.save(dir).await.map_err(HarnessError::from)?)
    } else {
        None
    };

    Ok(PerfReport::Analysis(Box::new(AnalysisReport { analysis, saved })))
}

/// Per-action statistics from the performance reports in `dir`, with an
/// optional HTML report written to `html`.
pub async fn trends(dir: &Path, html: Option<&Path>) -> Result<PerfReport, CliError> {
    let Some(analysis) = analyze_reports_dir(dir).await.map_err(HarnessError::from)? else {
        return Ok(PerfReport::Empty {
            searched: vec![format!("{}/performance_report_*.json", dir.display())],
        });
    };

    let html_path = match html {
        Some(path) => Some(analysis.save_html(path).await.map_err(HarnessError::from)?),
        None => None,
    };

    Ok(PerfReport::Trends(Box::new(TrendReport {
        analysis,
        html_path,
    })))
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum PerfReport {
    Empty { searched: Vec<String> },
    Analysis(Box<AnalysisReport>),
    Trends(Box<TrendReport>),
}

#[derive(Debug, Serialize)]
pub struct AnalysisReport {
    #[serde(flatten)]
    pub analysis: PerfAnalysis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved: Option<SavedAnalysis>,
}

#[derive(Debug, Serialize)]
pub struct TrendReport {
    #[serde(flatten)]
    pub analysis: TrendAnalysis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_path: Option<PathBuf>,
}

impl Render for PerfReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        match self {
            Self::Empty { searched } => {
                writeln!(w, "{} nothing to analyze", "No data:".yellow().bold())?;
                for pattern in searched {
                    writeln!(w, "  no files matching {pattern}")?;
                }
                writeln!(w, "Run the test suite first.")?;
            }
            Self::Analysis(report) => {
                writeln!(w, "{}", report.analysis)?;
                if let Some(ref saved) = report.saved {
                    writeln!(w)?;
                    writeln!(w, "Saved analysis: {}", saved.json_path.display())?;
                    writeln!(w, "Saved report:   {}", saved.report_path.display())?;
                }
            }
            Self::Trends(report) => {
                writeln!(w, "{}", report.analysis)?;
                if let Some(ref path) = report.html_path {
                    writeln!(w)?;
                    writeln!(w, "HTML report: {}", path.display())?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_log(dir: &Path, name: &str, total: f64) {
        let log = json!({
            "test_name": "test_login",
            "task_id": name,
            "timestamp": "2024-05-01T10:00:00",
            "total_execution_time": total,
            "checkpoint_count": 1,
            "checkpoints": {
                "login_done": {"time_since_last": total, "total_elapsed": total}
            }
        });
        std::fs::write(dir.join(format!("execution_{name}.json")), log.to_string())
            .expect("should write log");
    }

    fn write_report(dir: &Path, stamp: &str, upload_secs: f64) {
        let report = json!({
            "test_session": "2024-05-01T10:00:00",
            "total_metrics": 2,
            "metrics": [
                {"action": "ログイン処理", "duration": 0.8, "status": "success"},
                {"action": "写真アップロード", "duration": upload_secs, "status": "success"}
            ]
        });
        std::fs::write(
            dir.join(format!("performance_report_{stamp}.json")),
            report.to_string(),
        )
        .expect("should write report");
    }

    fn render(report: &PerfReport) -> String {
        colored::control::set_override(false);
        let mut buffer = Vec::new();
        report
            .render_text(&mut buffer)
            .expect("text rendering should succeed");
        String::from_utf8(buffer).expect("valid UTF-8")
    }

    #[tokio::test]
    async fn test_empty_directories_are_a_notice() {
        let logs = tempfile::tempdir().expect("should create temp dir");
        let reports = tempfile::tempdir().expect("should create temp dir");
        let report = analyze(logs.path(), reports.path(), false)
            .await
            .expect("empty dirs are not an error");

        let PerfReport::Empty { ref searched } = report else {
            panic!("expected empty notice");
        };
        assert_eq!(searched.len(), 2);
        let output = render(&report);
        assert!(output.contains("No data:"));
        assert!(output.contains("execution_*.json"));
        assert!(output.contains("performance_report_*.json"));
    }

    #[tokio::test]
    async fn test_unreadable_reports_directory_is_an_error() {
        let err = analyze(
            Path::new("/nonexistent/performance_logs"),
            Path::new("/nonexistent/reports"),
            false,
        )
        .await
        .expect_err("missing reports dir should fail");
        assert_eq!(err.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_analysis_and_save() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        write_log(dir.path(), "w1", 2.0);
        write_log(dir.path(), "w2", 4.0);
        // reports are ignored while execution logs exist
        write_report(dir.path(), "20240501_100000", 6.0);

        let report = analyze(dir.path(), dir.path(), true)
            .await
            .expect("analysis should succeed");
        let PerfReport::Analysis(ref inner) = report else {
            panic!("expected analysis");
        };
        assert_eq!(inner.analysis.total_executions, 2);
        assert!((inner.analysis.overall_statistics.mean - 3.0).abs() < 1e-9);

        let saved = inner.saved.as_ref().expect("save requested");
        assert!(saved.json_path.is_file());
        assert!(saved.report_path.is_file());
        assert!(!dir.path().join(HTML_REPORT_NAME).exists());

        let output = render(&report);
        assert!(output.contains("login_done"));
        assert!(output.contains("Saved report:"));
    }

    #[tokio::test]
    async fn test_analysis_json_is_flat() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        write_log(dir.path(), "w1", 1.0);

        let report = analyze(dir.path(), dir.path(), false)
            .await
            .expect("analysis should succeed");
        let json = serde_json::to_value(&report).expect("JSON serialization should succeed");
        assert_eq!(json["total_executions"], 1);
        assert!(json.get("saved").is_none());
    }

    #[tokio::test]
    async fn test_falls_back_to_performance_reports() {
        // Given: no execution log directory, two report files
        let reports = tempfile::tempdir().expect("should create temp dir");
        write_report(reports.path(), "20240501_100000", 5.5);
        write_report(reports.path(), "20240502_100000", 6.5);

        // When
        let report = analyze(
            &reports.path().join("performance_logs"),
            reports.path(),
            true,
        )
        .await
        .expect("fallback should succeed");

        // Then: per-action statistics and the HTML report next to the reports
        let PerfReport::Trends(ref inner) = report else {
            panic!("expected per-action analysis");
        };
        assert_eq!(inner.analysis.report_count, 2);
        assert_eq!(inner.analysis.suggestions[0].action, "写真アップロード");
        assert_eq!(inner.analysis.suggestions[0].mean, 6.0);

        let html_path = inner.html_path.as_ref().expect("save requested");
        assert_eq!(html_path, &reports.path().join(HTML_REPORT_NAME));
        let html = std::fs::read_to_string(html_path).expect("HTML report written");
        assert!(html.contains("要改善"));

        let output = render(&report);
        assert!(output.contains("Slowest actions:"));
        assert!(output.contains("HTML report:"));
    }

    #[tokio::test]
    async fn test_trends_without_html() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        write_report(dir.path(), "20240501_100000", 1.0);

        let report = trends(dir.path(), None).await.expect("trends should succeed");
        let json = serde_json::to_value(&report).expect("JSON serialization should succeed");
        assert_eq!(json["report_count"], 1);
        assert_eq!(json["suggestions"][0]["rating"], "good");
        assert!(json.get("html_path").is_none());
        assert!(!dir.path().join(HTML_REPORT_NAME).exists());
    }
}
