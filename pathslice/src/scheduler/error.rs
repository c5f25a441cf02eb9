//! Scheduler setup errors.
//!
//! A denied grant is not an error. These variants report contract violations
//! by the embedding code: unknown handles, duplicate registrations and
//! unbalanced start/feedback calls.

use thiserror::Error;

use super::requester::RequesterId;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchedulerError {
    #[error("task '{0}' is already registered")]
    DuplicateTask(String),

    #[error("unknown task {0}")]
    UnknownTask(String),

    #[error("unknown requester {0}")]
    UnknownRequester(RequesterId),

    #[error("task '{task}' was not started by {requester}")]
    TaskNotStarted { task: String, requester: String },

    #[error("task '{task}' is already running for {requester}")]
    TaskAlreadyRunning { task: String, requester: String },

    #[error("invalid scheduler tuning: {0}")]
    InvalidBudget(String),
}
