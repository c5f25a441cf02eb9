//! Frame time budget scheduling.
//!
//! [`TimeBudgetScheduler`] decides, request by request, whether a requester
//! may spend CPU time on a task this frame. Aperiodic tasks are budgeted in
//! time and calls; periodic tasks are gated by frequency. Requesters that are
//! denied gain priority and are visited earlier in later frames.

mod budget;
mod clock;
mod error;
mod report;
mod requester;
mod task;

pub use budget::{
    RequesterTaskStats, SchedulerConfig, TimeBudgetScheduler, DEFAULT_FRAME_BUDGET,
    DEFAULT_MAX_PRIORITY, DEFAULT_STALE_REQUESTER_AFTER,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::SchedulerError;
pub use report::{FrameReport, TaskFrameReport};
pub use requester::{RequesterId, RequesterKind};
pub use task::{
    AperiodicTaskConfig, PeriodicTaskId, TaskId, DEFAULT_PERIOD, DEFAULT_PRIORITY_BOOST,
    DEFAULT_TASK_BUDGET, DEFAULT_TASK_MAX_CALLS,
};
