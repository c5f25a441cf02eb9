//! Per-frame scheduler reports.

use std::time::Duration;

use serde::Serialize;

/// Frame accounting for one aperiodic task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskFrameReport {
    pub name: String,
    pub time_ms: f64,
    pub budget_ms: Option<f64>,
    pub calls: u32,
    pub grants: u32,
    pub denials: u32,
    pub forbidden: bool,
}

/// Summary returned by `TimeBudgetScheduler::end_frame`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    pub frame: u64,
    pub budget_ms: f64,
    /// Debt carried into this frame from earlier overruns.
    pub debt_in_ms: f64,
    pub consumed_ms: f64,
    /// Consumption beyond what was available this frame.
    pub overrun_ms: f64,
    /// Debt carried into the next frame.
    pub debt_out_ms: f64,
    pub no_more_time: bool,
    pub tasks: Vec<TaskFrameReport>,
}

impl FrameReport {
    pub fn task(&self, name: &str) -> Option<&TaskFrameReport> {
        self.tasks.iter().find(|t| t.name == name)
    }

    pub fn total_grants(&self) -> u32 {
        self.tasks.iter().map(|t| t.grants).sum()
    }

    pub fn total_denials(&self) -> u32 {
        self.tasks.iter().map(|t| t.denials).sum()
    }
}

pub(crate) fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Budget in milliseconds, `None` when unlimited.
pub(crate) fn budget_millis(d: Duration) -> Option<f64> {
    (d != Duration::MAX).then(|| millis(d))
}
