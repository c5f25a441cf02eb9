//! CLI error type.

use thiserror::Error;

use pathslice::scheduler::SchedulerError;
use pathslice::ConfigError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Library(#[from] pathslice::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to write output: {0}")]
    Output(String),
}

impl From<SchedulerError> for CliError {
    fn from(e: SchedulerError) -> Self {
        CliError::Library(e.into())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Output(e.to_string())
    }
}
