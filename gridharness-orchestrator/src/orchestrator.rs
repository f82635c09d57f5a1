//! Pipeline orchestration -- start, gate, run, release.
//!
//! The [`Orchestrator`] runs one [`RunPlan`] end to end:
//!
//! 1. Start the compose profile (stop-before-start first, when configured)
//! 2. Gate on application liveness, plus grid readiness for the grid profile
//! 3. Run the test runner and capture its raw exit code
//! 4. Release the environment (always, on every path)
//!
//! Steps 1-3 are raced against operator interruption. On interrupt the
//! in-flight step is dropped (the runner child is killed with it) and the
//! environment is still released.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use gridharness_core::config::HarnessConfig;
use gridharness_core::error::{GateError, HarnessError};
use gridharness_core::types::{HealthCheckSpec, RunResult, ServiceProfile};
use gridharness_environment::compose::ComposeRuntime;
use gridharness_environment::grid::GridClient;
use gridharness_environment::lifecycle::{Environment, LifecycleOptions};
use gridharness_environment::probe::{HealthProber, Readiness};
use gridharness_runner::driver::TestDriver;

use crate::plan::RunPlan;
use crate::signal::shutdown_signal;

/// Exit code used when the operator interrupts a run.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// How a pipeline run ended.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The runner ran to completion (with any exit code).
    Completed(RunResult),
    /// An operator signal arrived before the runner finished.
    Interrupted { signal: &'static str },
}

impl RunOutcome {
    /// Process exit code: the runner's own code, or 130 when interrupted.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Completed(result) => result.exit_code,
            Self::Interrupted { .. } => INTERRUPTED_EXIT_CODE,
        }
    }
}

/// Linear start → gate → run → release pipeline.
pub struct Orchestrator<R: ComposeRuntime, D: TestDriver> {
    runtime: Arc<R>,
    driver: D,
    prober: HealthProber,
    grid: GridClient,
    options: LifecycleOptions,
    app_gate: HealthCheckSpec,
    grid_gate: HealthCheckSpec,
}

impl<R: ComposeRuntime, D: TestDriver> Orchestrator<R, D> {
    pub fn new(config: &HarnessConfig, runtime: Arc<R>, driver: D) -> Self {
        Self {
            runtime,
            driver,
            prober: HealthProber::new(),
            grid: GridClient::from_config(&config.grid),
            options: LifecycleOptions::from_config(&config.environment),
            app_gate: config.app.health_check(),
            grid_gate: config.grid.health_check(),
        }
    }

    /// Run `plan`, interrupting on SIGINT / SIGTERM.
    pub async fn run(&self, plan: &RunPlan) -> Result<RunOutcome, HarnessError> {
        self.run_until(plan, shutdown_signal()).await
    }

    /// Run `plan`, interrupting when `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// - `HarnessError::Environment`: the profile could not be started
    /// - `HarnessError::Gate`: the application or grid never became ready
    /// - `HarnessError::Runner`: the runner could not be launched
    ///
    /// The environment has been released by the time any of these is returned.
    pub async fn run_until<S>(&self, plan: &RunPlan, shutdown: S) -> Result<RunOutcome, HarnessError>
    where
        S: Future<Output = &'static str>,
    {
        tokio::pin!(shutdown);

        let env = tokio::select! {
            acquired = Environment::acquire(self.runtime.clone(), plan.profile, self.options) => acquired?,
            signal = &mut shutdown => {
                warn!(signal, "interrupted while starting environment");
                // a partially started profile may be left behind
                if let Err(e) = self.runtime.down(plan.profile).await {
                    error!(error = %e, "teardown after interrupt failed");
                }
                return Ok(RunOutcome::Interrupted { signal });
            }
        };

        let outcome = tokio::select! {
            result = self.gate_and_run(plan) => result.map(RunOutcome::Completed),
            signal = &mut shutdown => {
                warn!(signal, "interrupted, tearing down");
                Ok(RunOutcome::Interrupted { signal })
            }
        };

        if let Err(e) = env.release().await {
            // teardown failure does not override the runner's verdict
            error!(error = %e, "environment teardown failed");
        }
        outcome
    }

    async fn gate_and_run(&self, plan: &RunPlan) -> Result<RunResult, HarnessError> {
        gate(self.prober.wait_until_ready(&self.app_gate).await, &self.app_gate)?;

        if plan.profile == ServiceProfile::Grid {
            info!(url = %self.grid.status_url(), "waiting for grid to report ready");
            gate(self.grid.wait_until_ready(&self.grid_gate).await, &self.grid_gate)?;
        }

        Ok(self.driver.run(&plan.spec).await?)
    }
}

fn gate(readiness: Readiness, spec: &HealthCheckSpec) -> Result<(), GateError> {
    if readiness.is_ready() {
        Ok(())
    } else {
        Err(GateError::Timeout {
            target: spec.target.clone(),
            waited_secs: spec.timeout.as_secs(),
        })
    }
}
