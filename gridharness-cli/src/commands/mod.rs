//! Command handlers -- one module per subcommand

pub mod config;
pub mod doctor;
pub mod grid;
pub mod perf;
pub mod run;

use std::path::Path;

use gridharness_core::config::HarnessConfig;
use gridharness_core::error::HarnessError;

use crate::cli::DEFAULT_CONFIG_PATH;

/// Load the effective configuration.
///
/// An explicit `--config` path must exist. Without one, `gridharness.toml`
/// in the working directory is used when present, built-in defaults otherwise.
pub async fn load_config(path: Option<&Path>) -> Result<HarnessConfig, HarnessError> {
    match path {
        Some(path) => HarnessConfig::load(path).await,
        None => HarnessConfig::load_or_default(DEFAULT_CONFIG_PATH).await,
    }
}

/// Human-readable name of the configuration source.
pub fn config_source(path: Option<&Path>) -> String {
    match path {
        Some(path) => path.display().to_string(),
        None if Path::new(DEFAULT_CONFIG_PATH).is_file() => DEFAULT_CONFIG_PATH.to_owned(),
        None => "built-in defaults".to_owned(),
    }
}
