//! gridharness orchestration library.
//!
//! Wires the environment, health gate and test runner into one linear
//! pipeline. `gridharness-cli` is the only binary that drives it.

pub mod logging;
pub mod orchestrator;
pub mod plan;
pub mod signal;

pub use orchestrator::{Orchestrator, RunOutcome};
pub use plan::{PlanOverrides, RunPlan};
