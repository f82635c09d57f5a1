//! Run plans -- which profile to start and how to invoke the runner.
//!
//! | workflow        | profile | workers            | distribution | report                  |
//! |-----------------|---------|--------------------|--------------|-------------------------|
//! | run-tests       | test    | 1                  | by-file      | `report.html`           |
//! | run-grid-tests  | grid    | `grid_concurrency` | by-file      | `grid_report.html`      |
//! | run-load-test   | grid    | `load_concurrency` | by-test      | `load_test_report.html` |

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gridharness_core::config::HarnessConfig;
use gridharness_core::error::{ConfigError, HarnessError};
use gridharness_core::types::{DistributionMode, ServiceProfile, TestRunSpec};

const RUN_TESTS_REPORT: &str = "report.html";
const GRID_REPORT: &str = "grid_report.html";
const LOAD_TEST_REPORT: &str = "load_test_report.html";

/// Caller-supplied overrides. `None` falls back to configuration.
#[derive(Debug, Clone, Default)]
pub struct PlanOverrides {
    pub selector: Option<String>,
    pub report: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub distribution: Option<DistributionMode>,
    pub extra_args: Vec<String>,
}

/// One pipeline run: the profile to bring up and the runner invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    pub profile: ServiceProfile,
    pub spec: TestRunSpec,
}

impl RunPlan {
    /// Standalone browser suite.
    pub fn run_tests(config: &HarnessConfig, overrides: PlanOverrides) -> Result<Self, HarnessError> {
        let spec = base_spec(
            config,
            &overrides,
            &config.runner.test_selector,
            RUN_TESTS_REPORT,
            1,
            DistributionMode::ByFile,
        )?
        .with_env("SELENIUM_URL", grid_hub_without_credentials(config));
        Ok(Self {
            profile: ServiceProfile::Test,
            spec,
        })
    }

    /// Parallel suite against the grid.
    pub fn grid_tests(config: &HarnessConfig, overrides: PlanOverrides) -> Result<Self, HarnessError> {
        let spec = base_spec(
            config,
            &overrides,
            &config.runner.grid_selector,
            GRID_REPORT,
            config.runner.grid_concurrency,
            DistributionMode::ByFile,
        )?
        .with_env("SELENIUM_GRID_URL", config.grid.hub_url());
        Ok(Self {
            profile: ServiceProfile::Grid,
            spec,
        })
    }

    /// Time-boxed load test against the grid.
    ///
    /// `duration_secs` defaults to `runner.load_duration_secs`.
    pub fn load_test(
        config: &HarnessConfig,
        overrides: PlanOverrides,
        duration_secs: Option<u64>,
    ) -> Result<Self, HarnessError> {
        let duration = duration_secs.unwrap_or(config.runner.load_duration_secs);
        if duration == 0 {
            return Err(invalid("duration_seconds", "must be greater than 0"));
        }
        let spec = base_spec(
            config,
            &overrides,
            &config.runner.grid_selector,
            LOAD_TEST_REPORT,
            config.runner.load_concurrency,
            DistributionMode::ByTest,
        )?
        .with_env("SELENIUM_GRID_URL", config.grid.hub_url())
        .with_time_budget(Duration::from_secs(duration));
        Ok(Self {
            profile: ServiceProfile::Grid,
            spec,
        })
    }
}

fn base_spec(
    config: &HarnessConfig,
    overrides: &PlanOverrides,
    default_selector: &str,
    default_report: &str,
    default_concurrency: usize,
    default_distribution: DistributionMode,
) -> Result<TestRunSpec, HarnessError> {
    let concurrency = overrides.concurrency.unwrap_or(default_concurrency);
    let concurrency = NonZeroUsize::new(concurrency)
        .ok_or_else(|| invalid("parallel_count", "must be greater than 0"))?;

    let selector = overrides
        .selector
        .clone()
        .unwrap_or_else(|| default_selector.to_owned());
    let report = overrides
        .report
        .clone()
        .unwrap_or_else(|| Path::new(&config.runner.report_dir).join(default_report));

    Ok(TestRunSpec::new(selector, report)
        .with_concurrency(concurrency)
        .with_distribution(overrides.distribution.unwrap_or(default_distribution))
        .with_extra_args(overrides.extra_args.iter().cloned())
        .with_env("PHOTO_APP_URL", config.app.url.trim_end_matches('/')))
}

fn grid_hub_without_credentials(config: &HarnessConfig) -> String {
    format!("{}/wd/hub", config.grid.url.trim_end_matches('/'))
}

fn invalid(field: &str, reason: &str) -> HarnessError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
    .into()
}
