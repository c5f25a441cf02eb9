//! Task identities and per-task tuning.
//!
//! Two kinds of task compete for the frame:
//!
//! - **Aperiodic** tasks are CPU-budgeted. Each frame they may consume at
//!   most their time budget and run at most `max_calls` times, and every
//!   grant is also subject to the global frame budget.
//! - **Periodic** tasks are frequency-gated. A requester may run one again
//!   once its period has elapsed since the last run; no time is accounted.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Default per-frame budget of an aperiodic task: unlimited, so only the
/// global budget applies.
pub const DEFAULT_TASK_BUDGET: Duration = Duration::MAX;

/// Default per-frame call cap of an aperiodic task: unlimited.
pub const DEFAULT_TASK_MAX_CALLS: u32 = u32::MAX;

/// Default priority added to a requester each time it is denied.
pub const DEFAULT_PRIORITY_BOOST: f32 = 1.0;

/// Default minimum interval between two runs of a periodic task.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(1);

/// Handle of a registered aperiodic task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaskId(pub(crate) usize);

impl TaskId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Handle of a registered periodic task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PeriodicTaskId(pub(crate) usize);

impl PeriodicTaskId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for PeriodicTaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "periodic#{}", self.0)
    }
}

/// Tuning of an aperiodic task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AperiodicTaskConfig {
    /// Time the task may consume per frame. Zero disables the task.
    pub budget: Duration,
    /// Grants per frame. Zero disables the task.
    pub max_calls: u32,
    /// Priority added to a requester when it is denied.
    pub priority_boost: f32,
}

impl Default for AperiodicTaskConfig {
    fn default() -> Self {
        Self {
            budget: DEFAULT_TASK_BUDGET,
            max_calls: DEFAULT_TASK_MAX_CALLS,
            priority_boost: DEFAULT_PRIORITY_BOOST,
        }
    }
}

impl AperiodicTaskConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_max_calls(mut self, max_calls: u32) -> Self {
        self.max_calls = max_calls;
        self
    }

    pub fn with_priority_boost(mut self, priority_boost: f32) -> Self {
        self.priority_boost = priority_boost;
        self
    }
}

/// Registered aperiodic task with its frame-scoped counters.
#[derive(Debug, Clone)]
pub(crate) struct AperiodicTask {
    pub name: String,
    pub config: AperiodicTaskConfig,
    pub frame_time: Duration,
    pub frame_calls: u32,
    pub frame_grants: u32,
    pub frame_denials: u32,
    /// Denied for the rest of the frame by `forbid_task`.
    pub forbidden: bool,
    /// Start of an in-flight grant made without a requester.
    pub global_start: Option<Duration>,
    pub total_time: Duration,
    pub total_calls: u64,
}

impl AperiodicTask {
    pub fn new(name: String) -> Self {
        Self {
            name,
            config: AperiodicTaskConfig::default(),
            frame_time: Duration::ZERO,
            frame_calls: 0,
            frame_grants: 0,
            frame_denials: 0,
            forbidden: false,
            global_start: None,
            total_time: Duration::ZERO,
            total_calls: 0,
        }
    }

    pub fn reset_frame(&mut self) {
        self.frame_time = Duration::ZERO;
        self.frame_calls = 0;
        self.frame_grants = 0;
        self.frame_denials = 0;
        self.forbidden = false;
    }

    /// Per-task part of the grant decision.
    pub fn has_capacity(&self) -> bool {
        !self.forbidden
            && self.frame_time < self.config.budget
            && self.frame_calls < self.config.max_calls
    }

    pub fn remaining(&self) -> Duration {
        self.config.budget.saturating_sub(self.frame_time)
    }

    pub fn account(&mut self, elapsed: Duration) {
        self.frame_time = self.frame_time.saturating_add(elapsed);
        self.frame_calls = self.frame_calls.saturating_add(1);
        self.total_time = self.total_time.saturating_add(elapsed);
        self.total_calls += 1;
    }
}

/// Registered periodic task.
#[derive(Debug, Clone)]
pub(crate) struct PeriodicTask {
    pub name: String,
    pub period: Duration,
}

impl PeriodicTask {
    pub fn new(name: String) -> Self {
        Self {
            name,
            period: DEFAULT_PERIOD,
        }
    }
}
