//! Crate-level error type.
//!
//! Each module reports its own error enum; [`Error`] wraps them so code that
//! spans modules, like a path query ticking a search under the scheduler,
//! can propagate any of them with `?`.

use thiserror::Error;

use crate::config::ConfigError;
use crate::graph::GraphError;
use crate::logging::LoggingError;
use crate::scheduler::SchedulerError;
use crate::search::SearchError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("search error: {0}")]
    Search(#[from] SearchError),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("logging error: {0}")]
    Logging(#[from] LoggingError),
}

/// Result alias using the crate [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::RequesterId;

    fn fail_unknown() -> Result<()> {
        Err(SchedulerError::UnknownRequester(RequesterId(9)))?;
        Ok(())
    }

    #[test]
    fn test_from_module_error() {
        let err = fail_unknown().unwrap_err();
        assert!(matches!(err, Error::Scheduler(SchedulerError::UnknownRequester(_))));
        assert_eq!(err.to_string(), "scheduler error: unknown requester r9");
    }

    #[test]
    fn test_search_error_wrapped() {
        let err: Error = SearchError::NotStarted.into();
        assert!(err.to_string().starts_with("search error: "));
    }
}
