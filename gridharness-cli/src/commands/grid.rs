//! `gridharness grid-monitor` command handler
//!
//! Query failures are reported, never fatal: every action exits 0.

use std::io::Write;
use std::time::Duration;

use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use gridharness_core::config::HarnessConfig;
use gridharness_core::types::GridStatus;
use gridharness_environment::{GridClient, NodeSummary};
use gridharness_orchestrator::signal::shutdown_signal;

use crate::cli::{GridAction, GridMonitorArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

const CLEAR_SCREEN: &str = "\x1B[2J\x1B[H";

/// Execute the `grid-monitor` command.
pub async fn execute(
    args: GridMonitorArgs,
    config: &HarnessConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let client = GridClient::from_config(&config.grid);

    match args.action {
        GridAction::Status => writer.render(&status_report(&client).await),
        GridAction::Nodes => writer.render(&nodes_report(&client).await),
        GridAction::Monitor { interval } => {
            let every = match interval {
                Some(0) => {
                    return Err(CliError::Config(
                        "--interval must be greater than 0".to_owned(),
                    ));
                }
                Some(secs) => Duration::from_secs(secs),
                None => config.grid.monitor_interval(),
            };
            execute_monitor(&client, every, writer).await
        }
    }
}

async fn execute_monitor(
    client: &GridClient,
    every: Duration,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let watcher = tokio::spawn(async move {
        let signal = shutdown_signal().await;
        info!(signal, "stopping grid monitor");
        trigger.cancel();
    });

    info!(url = %client.status_url(), interval_secs = every.as_secs(), "monitoring grid");

    let stdout = std::io::stdout();
    let result = monitor(client, every, cancel, |report| {
        let mut out = stdout.lock();
        if writer.is_text() {
            write!(out, "{CLEAR_SCREEN}")?;
        }
        writer.render_to(report, &mut out)?;
        if writer.is_text() {
            writeln!(out)?;
            writeln!(
                out,
                "Refreshing every {}s, press Ctrl-C to stop",
                every.as_secs()
            )?;
        }
        out.flush()?;
        Ok(())
    })
    .await;

    watcher.abort();
    result.map(|_| ())
}

/// Poll the grid every `every` until `cancel` fires.
///
/// Each tick is independent: nothing carries over between redraws.
/// Returns the number of reports handed to `on_report`.
pub async fn monitor<F>(
    client: &GridClient,
    every: Duration,
    cancel: CancellationToken,
    mut on_report: F,
) -> Result<u64, CliError>
where
    F: FnMut(&GridStatusReport) -> Result<(), CliError>,
{
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut redraws = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let report = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            report = status_report(client) => report,
        };
        on_report(&report)?;
        redraws += 1;
    }

    Ok(redraws)
}

/// Single `/status` query folded into a report.
pub async fn status_report(client: &GridClient) -> GridStatusReport {
    match client.fetch_status().await {
        Ok(status) => GridStatusReport::reachable(client, &status),
        Err(e) => {
            warn!(error = %e, "grid status query failed");
            GridStatusReport::unreachable(client, e.to_string())
        }
    }
}

/// Single `/status` query folded into a per-node table.
pub async fn nodes_report(client: &GridClient) -> NodesReport {
    match client.fetch_status().await {
        Ok(status) => NodesReport {
            url: client.status_url(),
            reachable: true,
            nodes: NodeSummary::from_status(&status),
            error: None,
        },
        Err(e) => {
            warn!(error = %e, "grid status query failed");
            NodesReport {
                url: client.status_url(),
                reachable: false,
                nodes: Vec::new(),
                error: Some(e.to_string()),
            }
        }
    }
}

/// Grid reachability and summary.
#[derive(Debug, Clone, Serialize)]
pub struct GridStatusReport {
    pub url: String,
    pub ui_url: String,
    pub reachable: bool,
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub nodes: usize,
    pub sessions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GridStatusReport {
    fn reachable(client: &GridClient, status: &GridStatus) -> Self {
        Self {
            url: client.status_url(),
            ui_url: client.ui_url(),
            reachable: status.reachable,
            ready: status.is_ready(),
            message: status.message().map(str::to_owned),
            nodes: status.node_count(),
            sessions: status.session_count(),
            error: None,
        }
    }

    fn unreachable(client: &GridClient, error: String) -> Self {
        Self {
            url: client.status_url(),
            ui_url: client.ui_url(),
            reachable: false,
            ready: false,
            message: None,
            nodes: 0,
            sessions: 0,
            error: Some(error),
        }
    }
}

impl Render for GridStatusReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Selenium Grid: {}", self.url.bold())?;
        if !self.reachable {
            writeln!(w, "  Status: {}", "UNREACHABLE".red().bold())?;
            if let Some(ref error) = self.error {
                writeln!(w, "  Error:  {}", error.red())?;
            }
            writeln!(w, "  Is the grid profile running? Try `gridharness run-grid-tests`.")?;
            return Ok(());
        }

        let ready = if self.ready {
            "READY".green().bold()
        } else {
            "NOT READY".yellow().bold()
        };
        writeln!(w, "  Status:   {ready}")?;
        if let Some(ref message) = self.message {
            writeln!(w, "  Message:  {message}")?;
        }
        writeln!(w, "  Nodes:    {}", self.nodes)?;
        writeln!(w, "  Sessions: {}", self.sessions)?;
        writeln!(w, "  UI:       {}", self.ui_url)?;
        Ok(())
    }
}

/// Per-node table.
#[derive(Debug, Clone, Serialize)]
pub struct NodesReport {
    pub url: String,
    pub reachable: bool,
    pub nodes: Vec<NodeSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Render for NodesReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if !self.reachable {
            writeln!(w, "Selenium Grid: {}", self.url.bold())?;
            writeln!(w, "  Status: {}", "UNREACHABLE".red().bold())?;
            if let Some(ref error) = self.error {
                writeln!(w, "  Error:  {}", error.red())?;
            }
            return Ok(());
        }

        if self.nodes.is_empty() {
            writeln!(w, "No nodes registered.")?;
            return Ok(());
        }

        writeln!(
            w,
            "{:<32} {:<8} {:<24} {:>8} {:>8}",
            "URI", "STATUS", "BROWSERS", "MAX", "ACTIVE"
        )?;
        writeln!(w, "{}", "-".repeat(84))?;
        for node in &self.nodes {
            let browsers = if node.browsers.is_empty() {
                "-".to_owned()
            } else {
                node.browsers.join(",")
            };
            writeln!(
                w,
                "{:<32} {:<8} {:<24} {:>8} {:>8}",
                node.uri, node.availability, browsers, node.max_sessions, node.active_sessions
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render<T: Render>(report: &T) -> String {
        colored::control::set_override(false);
        let mut buffer = Vec::new();
        report
            .render_text(&mut buffer)
            .expect("text rendering should succeed");
        String::from_utf8(buffer).expect("valid UTF-8")
    }

    fn status_body() -> String {
        json!({
            "value": {
                "ready": true,
                "message": "Selenium Grid ready.",
                "nodes": [{
                    "uri": "http://172.18.0.4:5555",
                    "availability": "UP",
                    "maxSessions": 2,
                    "slots": [
                        {"stereotype": {"browserName": "firefox"}, "session": {"sessionId": "s1"}},
                        {"stereotype": {"browserName": "chrome"}, "session": null}
                    ]
                }]
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_status_report_reachable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/status")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(status_body())
            .create_async()
            .await;

        let client = GridClient::new(server.url());
        let report = status_report(&client).await;

        assert!(report.reachable);
        assert!(report.ready);
        assert_eq!(report.nodes, 1);
        assert_eq!(report.sessions, 1);
        assert_eq!(report.ui_url, format!("{}/ui", server.url()));

        let output = render(&report);
        assert!(output.contains("READY"));
        assert!(output.contains("/ui"), "should point at the grid UI");
    }

    #[tokio::test]
    async fn test_status_report_unreachable_is_not_an_error() {
        // Given: nothing listens on the grid port
        let client = GridClient::new("http://127.0.0.1:1")
            .with_request_timeout(Duration::from_millis(500));

        // When
        let report = status_report(&client).await;

        // Then: a failure notice, not an Err
        assert!(!report.reachable);
        assert!(report.error.is_some());
        assert!(render(&report).contains("UNREACHABLE"));
    }

    #[tokio::test]
    async fn test_nodes_report_lists_browsers() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/status")
            .with_status(200)
            .with_body(status_body())
            .create_async()
            .await;

        let report = nodes_report(&GridClient::new(server.url())).await;
        assert_eq!(report.nodes.len(), 1);

        let output = render(&report);
        assert!(output.contains("http://172.18.0.4:5555"));
        assert!(output.contains("chrome,firefox"));
    }

    #[test]
    fn test_nodes_report_empty() {
        let report = NodesReport {
            url: "http://localhost:4444/status".to_owned(),
            reachable: true,
            nodes: Vec::new(),
            error: None,
        };
        assert!(render(&report).contains("No nodes registered."));
    }

    #[tokio::test]
    async fn test_monitor_stops_when_cancelled() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/status")
            .with_status(200)
            .with_body(status_body())
            .expect_at_least(3)
            .create_async()
            .await;

        let client = GridClient::new(server.url());
        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        let mut seen = 0;

        let redraws = monitor(&client, Duration::from_millis(10), cancel, |report| {
            assert!(report.reachable);
            seen += 1;
            if seen == 3 {
                stop.cancel();
            }
            Ok(())
        })
        .await
        .expect("monitor should stop cleanly");

        assert_eq!(redraws, 3);
    }

    #[tokio::test]
    async fn test_monitor_cancelled_before_first_tick() {
        let client = GridClient::new("http://127.0.0.1:1");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let redraws = monitor(&client, Duration::from_secs(5), cancel, |_| {
            panic!("no report expected after cancellation")
        })
        .await
        .expect("monitor should stop cleanly");

        assert_eq!(redraws, 0);
    }

    #[tokio::test]
    async fn test_monitor_propagates_sink_errors() {
        let client = GridClient::new("http://127.0.0.1:1")
            .with_request_timeout(Duration::from_millis(200));
        let result = monitor(
            &client,
            Duration::from_millis(10),
            CancellationToken::new(),
            |_| Err(CliError::Command("stdout closed".to_owned())),
        )
        .await;
        assert!(result.is_err());
    }
}
