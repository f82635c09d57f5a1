//! CLI-specific error types and exit code mapping

use gridharness_core::error::HarnessError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from gridharness-core.
    #[error("{0}")]
    Core(#[from] HarnessError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// A runner that ran to completion never reaches this path: its own
    /// exit code is returned as-is.
    ///
    /// | Code | Meaning                                        |
    /// |------|------------------------------------------------|
    /// | 1    | Environment, health gate or runner launch error |
    /// | 2    | Configuration error                            |
    /// | 10   | IO error                                       |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Core(HarnessError::Config(_)) => 2,
            Self::Io(_) => 10,
            Self::JsonSerialize(_) | Self::Command(_) | Self::Core(_) => 1,
        }
    }
}
