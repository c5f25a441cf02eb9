//! Search contract errors.
//!
//! Runtime outcomes (no path, stale graph) are search states, not errors.
//! These variants only report calls made in the wrong state.

use thiserror::Error;

use super::astar::SearchState;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum SearchError {
    #[error("search has not been started")]
    NotStarted,

    #[error("cannot {operation} a search that is {state}")]
    InvalidState {
        operation: &'static str,
        state: SearchState,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = SearchError::InvalidState {
            operation: "resume",
            state: SearchState::Running,
        };
        assert_eq!(err.to_string(), "cannot resume a search that is running");
        assert_eq!(
            SearchError::NotStarted.to_string(),
            "search has not been started"
        );
    }
}
