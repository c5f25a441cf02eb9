//! Scheduling requesters.
//!
//! A requester is anything that asks the scheduler for time: a single agent
//! ([`RequesterKind::Bot`]) or a group acting as one ([`RequesterKind::Team`]).
//! Both follow the same protocol.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Identity of a requester. Ids are handed out in increasing order, so
/// comparing ids compares registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RequesterId(pub u32);

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RequesterKind {
    #[default]
    Bot,
    Team,
}

impl RequesterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequesterKind::Bot => "bot",
            RequesterKind::Team => "team",
        }
    }
}

impl fmt::Display for RequesterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-requester state for one aperiodic task.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct RequesterTaskState {
    /// Priority accumulated from denials since the last grant.
    pub priority: f32,
    /// Last `keep_alive` for this task.
    pub last_request: Option<Duration>,
    /// Start of the in-flight grant, if running.
    pub started_at: Option<Duration>,
    pub grants: u64,
    pub denials: u64,
}

/// Scheduler-side record of a requester.
#[derive(Debug, Clone)]
pub(crate) struct Requester {
    pub kind: RequesterKind,
    /// Multiplies every priority boost.
    pub priority_factor: f32,
    /// Absolute priority captured at the start of the frame, used for ordering.
    pub frame_priority: f32,
    pub tasks: Vec<RequesterTaskState>,
    pub periodic_last_use: Vec<Option<Duration>>,
    /// Last time the requester asked for anything.
    pub last_seen: Duration,
}

impl Requester {
    pub fn new(kind: RequesterKind, aperiodic: usize, periodic: usize, now: Duration) -> Self {
        Self {
            kind,
            priority_factor: 1.0,
            frame_priority: 0.0,
            tasks: vec![RequesterTaskState::default(); aperiodic],
            periodic_last_use: vec![None; periodic],
            last_seen: now,
        }
    }

    /// Sum of per-task priorities.
    pub fn absolute_priority(&self) -> f32 {
        self.tasks.iter().map(|t| t.priority).sum()
    }

    pub fn is_running_any(&self) -> bool {
        self.tasks.iter().any(|t| t.started_at.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_priority_sums_tasks() {
        let mut requester = Requester::new(RequesterKind::Bot, 3, 0, Duration::ZERO);
        requester.tasks[0].priority = 1.5;
        requester.tasks[2].priority = 2.0;
        assert_eq!(requester.absolute_priority(), 3.5);
    }

    #[test]
    fn test_running_any() {
        let mut requester = Requester::new(RequesterKind::Team, 2, 1, Duration::ZERO);
        assert!(!requester.is_running_any());
        requester.tasks[1].started_at = Some(Duration::from_millis(1));
        assert!(requester.is_running_any());
    }

    #[test]
    fn test_display() {
        assert_eq!(RequesterId(12).to_string(), "r12");
        assert_eq!(RequesterKind::Team.to_string(), "team");
    }
}
