//! Frame time budget shared by every requester.
//!
//! # Frame lifecycle
//!
//! ```text
//! begin_frame(dt) ──▶ request_* / process_feedback ... ──▶ end_frame() ──▶ FrameReport
//! ```
//!
//! `begin_frame` clears every frame-scoped counter, snapshots requester
//! priorities and fixes the order in which requesters should be visited.
//!
//! # Aperiodic grant protocol
//!
//! [`request_aperiodic`](TimeBudgetScheduler::request_aperiodic) bundles the
//! granular steps:
//!
//! 1. `keep_alive` stamps the request time (liveness only)
//! 2. `grant` = global time left AND task time < budget AND calls < max
//! 3. granted: `reset_priority` then `start_task`
//! 4. denied: `increase_priority` by the task's boost
//!
//! The caller does the work and then calls `process_feedback`, which charges
//! the elapsed time to the task and to the frame.
//!
//! Denied requesters gain priority and are visited earlier next frame, so a
//! requester denied every frame eventually reaches the front.
//!
//! # Overrun
//!
//! A frame that consumes more than its budget carries the excess into the
//! next frame as debt, capped at one budget. The budget therefore holds on
//! average rather than per frame.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use super::clock::Clock;
use super::error::SchedulerError;
use super::report::{budget_millis, millis, FrameReport, TaskFrameReport};
use super::requester::{Requester, RequesterId, RequesterKind, RequesterTaskState};
use super::task::{AperiodicTask, AperiodicTaskConfig, PeriodicTask, PeriodicTaskId, TaskId};

// =============================================================================
// Configuration
// =============================================================================

/// Default global time budget per frame.
pub const DEFAULT_FRAME_BUDGET: Duration = Duration::from_millis(5);

/// Default ceiling for a requester's per-task priority.
pub const DEFAULT_MAX_PRIORITY: f32 = 1.0e6;

/// Default idle time after which a requester is reported as stale.
pub const DEFAULT_STALE_REQUESTER_AFTER: Duration = Duration::from_secs(30);

/// Global scheduler settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    /// Time all aperiodic tasks together may consume per frame.
    pub frame_budget: Duration,
    /// Priorities saturate at this value.
    pub max_priority: f32,
    /// Idle time after which `collect_stale_requesters` reports a requester.
    pub stale_requester_after: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            frame_budget: DEFAULT_FRAME_BUDGET,
            max_priority: DEFAULT_MAX_PRIORITY,
            stale_requester_after: DEFAULT_STALE_REQUESTER_AFTER,
        }
    }
}

impl SchedulerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frame_budget(mut self, frame_budget: Duration) -> Self {
        self.frame_budget = frame_budget;
        self
    }

    pub fn with_max_priority(mut self, max_priority: f32) -> Self {
        self.max_priority = max_priority;
        self
    }

    pub fn with_stale_requester_after(mut self, after: Duration) -> Self {
        self.stale_requester_after = after;
        self
    }

    pub fn validate(&self) -> Result<(), SchedulerError> {
        if !self.max_priority.is_finite() || self.max_priority <= 0.0 {
            return Err(SchedulerError::InvalidBudget(format!(
                "max priority must be positive, got {}",
                self.max_priority
            )));
        }
        Ok(())
    }
}

/// Grant and denial counts of one requester for one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct RequesterTaskStats {
    pub grants: u64,
    pub denials: u64,
}

const GLOBAL_REQUESTER: &str = "global";

// =============================================================================
// Scheduler
// =============================================================================

/// Allocates the frame's CPU time among competing requesters.
pub struct TimeBudgetScheduler {
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,

    tasks: Vec<AperiodicTask>,
    periodic: Vec<PeriodicTask>,

    requesters: BTreeMap<RequesterId, Requester>,
    next_requester: u32,

    frame_index: u64,
    frame_delta: Duration,
    frame_consumed: Duration,
    /// Overrun carried into the current frame.
    debt: Duration,
    no_more_time: bool,

    /// Visiting order fixed at `begin_frame`.
    frame_order: Vec<RequesterId>,
    /// Requester moved to the front of the next frame's order.
    priority_requester: Option<RequesterId>,
}

impl TimeBudgetScheduler {
    pub fn new(config: SchedulerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            tasks: Vec::new(),
            periodic: Vec::new(),
            requesters: BTreeMap::new(),
            next_requester: 0,
            frame_index: 0,
            frame_delta: Duration::ZERO,
            frame_consumed: Duration::ZERO,
            debt: Duration::ZERO,
            no_more_time: config.frame_budget.is_zero(),
            frame_order: Vec::new(),
            priority_requester: None,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Current clock reading.
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    pub fn set_frame_budget(&mut self, budget: Duration) {
        self.config.frame_budget = budget;
        self.update_no_more_time();
    }

    // -------------------------------------------------------------------------
    // Task registration and tuning
    // -------------------------------------------------------------------------

    /// Registers a CPU-budgeted task.
    pub fn register_aperiodic_task(&mut self, name: &str) -> Result<TaskId, SchedulerError> {
        self.check_unique(name)?;
        let id = TaskId(self.tasks.len());
        self.tasks.push(AperiodicTask::new(name.to_string()));
        for requester in self.requesters.values_mut() {
            requester.tasks.push(RequesterTaskState::default());
        }
        info!(task = name, id = %id, "Aperiodic task registered");
        Ok(id)
    }

    /// Registers a frequency-gated task.
    pub fn register_periodic_task(&mut self, name: &str) -> Result<PeriodicTaskId, SchedulerError> {
        self.check_unique(name)?;
        let id = PeriodicTaskId(self.periodic.len());
        self.periodic.push(PeriodicTask::new(name.to_string()));
        for requester in self.requesters.values_mut() {
            requester.periodic_last_use.push(None);
        }
        info!(task = name, id = %id, "Periodic task registered");
        Ok(id)
    }

    fn check_unique(&self, name: &str) -> Result<(), SchedulerError> {
        if self.task_by_name(name).is_some() || self.periodic_task_by_name(name).is_some() {
            return Err(SchedulerError::DuplicateTask(name.to_string()));
        }
        Ok(())
    }

    /// Applies a full tuning to an aperiodic task.
    pub fn configure_task(
        &mut self,
        task: TaskId,
        config: AperiodicTaskConfig,
    ) -> Result<(), SchedulerError> {
        validate_boost(config.priority_boost)?;
        let entry = self.task_mut(task)?;
        entry.config = config;
        debug!(
            task = %entry.name,
            budget_ms = ?budget_millis(config.budget),
            max_calls = config.max_calls,
            priority_boost = config.priority_boost,
            "Task configured"
        );
        Ok(())
    }

    /// Sets the per-frame time budget. Zero disables the task.
    pub fn set_task_budget(&mut self, task: TaskId, budget: Duration) -> Result<(), SchedulerError> {
        self.task_mut(task)?.config.budget = budget;
        Ok(())
    }

    /// Sets the per-frame call cap. Zero disables the task.
    pub fn set_task_max_calls(&mut self, task: TaskId, max_calls: u32) -> Result<(), SchedulerError> {
        self.task_mut(task)?.config.max_calls = max_calls;
        Ok(())
    }

    pub fn set_task_priority_boost(&mut self, task: TaskId, boost: f32) -> Result<(), SchedulerError> {
        validate_boost(boost)?;
        self.task_mut(task)?.config.priority_boost = boost;
        Ok(())
    }

    pub fn task_config(&self, task: TaskId) -> Result<AperiodicTaskConfig, SchedulerError> {
        Ok(self.task_ref(task)?.config)
    }

    /// Sets the minimum interval between two runs of a periodic task.
    pub fn set_periodicity(&mut self, task: PeriodicTaskId, period: Duration) -> Result<(), SchedulerError> {
        self.periodic_mut(task)?.period = period;
        Ok(())
    }

    pub fn periodicity(&self, task: PeriodicTaskId) -> Result<Duration, SchedulerError> {
        Ok(self.periodic_ref(task)?.period)
    }

    pub fn task_by_name(&self, name: &str) -> Option<TaskId> {
        self.tasks.iter().position(|t| t.name == name).map(TaskId)
    }

    pub fn periodic_task_by_name(&self, name: &str) -> Option<PeriodicTaskId> {
        self.periodic
            .iter()
            .position(|t| t.name == name)
            .map(PeriodicTaskId)
    }

    pub fn task_name(&self, task: TaskId) -> Option<&str> {
        self.tasks.get(task.0).map(|t| t.name.as_str())
    }

    pub fn periodic_task_name(&self, task: PeriodicTaskId) -> Option<&str> {
        self.periodic.get(task.0).map(|t| t.name.as_str())
    }

    pub fn task_ids(&self) -> impl Iterator<Item = TaskId> {
        (0..self.tasks.len()).map(TaskId)
    }

    // -------------------------------------------------------------------------
    // Requesters
    // -------------------------------------------------------------------------

    /// Adds a requester with neutral priority and returns its id.
    ///
    /// The requester joins the visiting order at the next `begin_frame`.
    pub fn add_requester(&mut self, kind: RequesterKind) -> RequesterId {
        let id = RequesterId(self.next_requester);
        self.next_requester += 1;
        let requester = Requester::new(kind, self.tasks.len(), self.periodic.len(), self.now());
        self.requesters.insert(id, requester);
        info!(requester = %id, kind = %kind, "Requester added");
        id
    }

    pub fn remove_requester(&mut self, id: RequesterId) -> Result<(), SchedulerError> {
        let requester = self
            .requesters
            .remove(&id)
            .ok_or(SchedulerError::UnknownRequester(id))?;
        if requester.is_running_any() {
            warn!(requester = %id, "Requester removed while a task was running");
        }
        self.frame_order.retain(|&r| r != id);
        if self.priority_requester == Some(id) {
            self.priority_requester = None;
        }
        info!(requester = %id, kind = %requester.kind, "Requester removed");
        Ok(())
    }

    pub fn requester_count(&self) -> usize {
        self.requesters.len()
    }

    pub fn requester_ids(&self) -> impl Iterator<Item = RequesterId> + '_ {
        self.requesters.keys().copied()
    }

    pub fn requester_kind(&self, id: RequesterId) -> Result<RequesterKind, SchedulerError> {
        Ok(self.requester_ref(id)?.kind)
    }

    /// Multiplies every future priority boost of `id`.
    pub fn set_priority_factor(&mut self, id: RequesterId, factor: f32) -> Result<(), SchedulerError> {
        if !factor.is_finite() || factor < 0.0 {
            return Err(SchedulerError::InvalidBudget(format!(
                "priority factor must be finite and non-negative, got {}",
                factor
            )));
        }
        self.requester_mut(id)?.priority_factor = factor;
        Ok(())
    }

    /// Absolute priority: the sum of the requester's per-task priorities.
    pub fn priority(&self, id: RequesterId) -> Result<f32, SchedulerError> {
        Ok(self.requester_ref(id)?.absolute_priority())
    }

    pub fn task_priority(&self, task: TaskId, id: RequesterId) -> Result<f32, SchedulerError> {
        Ok(self.requester_task(task, id)?.priority)
    }

    pub fn is_running(&self, task: TaskId, id: RequesterId) -> Result<bool, SchedulerError> {
        Ok(self.requester_task(task, id)?.started_at.is_some())
    }

    pub fn requester_stats(
        &self,
        task: TaskId,
        id: RequesterId,
    ) -> Result<RequesterTaskStats, SchedulerError> {
        let state = self.requester_task(task, id)?;
        Ok(RequesterTaskStats {
            grants: state.grants,
            denials: state.denials,
        })
    }

    /// Requesters in the order they should be visited this frame: descending
    /// absolute priority at frame start, ties by registration order.
    pub fn requesters_by_priority(&self) -> &[RequesterId] {
        &self.frame_order
    }

    /// Puts `id` first in the next frame's visiting order, once.
    pub fn set_priority_requester(&mut self, id: RequesterId) -> Result<(), SchedulerError> {
        self.requester_ref(id)?;
        self.priority_requester = Some(id);
        Ok(())
    }

    /// Requesters that have not asked for anything for longer than `max_idle`.
    pub fn collect_stale_requesters(&self, max_idle: Duration) -> Vec<RequesterId> {
        let now = self.now();
        self.requesters
            .iter()
            .filter(|(_, r)| now.saturating_sub(r.last_seen) > max_idle)
            .map(|(&id, _)| id)
            .collect()
    }

    // -------------------------------------------------------------------------
    // Frame lifecycle
    // -------------------------------------------------------------------------

    /// Starts a frame: resets frame counters and fixes the visiting order.
    pub fn begin_frame(&mut self, delta: Duration) {
        self.frame_index += 1;
        self.frame_delta = delta;
        self.frame_consumed = Duration::ZERO;
        for task in &mut self.tasks {
            task.reset_frame();
        }
        self.update_no_more_time();

        let mut order: Vec<(RequesterId, f32)> = self
            .requesters
            .iter_mut()
            .map(|(&id, r)| {
                r.frame_priority = r.absolute_priority();
                (id, r.frame_priority)
            })
            .collect();
        // Stable sort over ascending ids keeps registration order among ties.
        order.sort_by(|a, b| b.1.total_cmp(&a.1));
        self.frame_order = order.into_iter().map(|(id, _)| id).collect();

        if let Some(front) = self.priority_requester.take() {
            if let Some(pos) = self.frame_order.iter().position(|&r| r == front) {
                self.frame_order.remove(pos);
                self.frame_order.insert(0, front);
            }
        }

        trace!(
            frame = self.frame_index,
            delta_ms = format!("{:.3}", millis(delta)),
            debt_ms = format!("{:.3}", millis(self.debt)),
            no_more_time = self.no_more_time,
            requesters = self.frame_order.len(),
            "Frame started"
        );
    }

    /// Ends the frame, carries any overrun forward and reports the frame.
    pub fn end_frame(&mut self) -> FrameReport {
        let budget = self.config.frame_budget;
        let available = budget.saturating_sub(self.debt);
        let overrun = self.frame_consumed.saturating_sub(available);
        let debt_out = overrun.min(budget);

        for (id, requester) in &self.requesters {
            for (index, state) in requester.tasks.iter().enumerate() {
                if state.started_at.is_some() {
                    warn!(
                        requester = %id,
                        task = %self.tasks[index].name,
                        "Task still running at end of frame"
                    );
                }
            }
        }
        for task in &self.tasks {
            if task.global_start.is_some() {
                warn!(task = %task.name, "Global task still running at end of frame");
            }
        }

        let report = FrameReport {
            frame: self.frame_index,
            budget_ms: millis(budget),
            debt_in_ms: millis(self.debt),
            consumed_ms: millis(self.frame_consumed),
            overrun_ms: millis(overrun),
            debt_out_ms: millis(debt_out),
            no_more_time: self.no_more_time,
            tasks: self
                .tasks
                .iter()
                .map(|t| TaskFrameReport {
                    name: t.name.clone(),
                    time_ms: millis(t.frame_time),
                    budget_ms: budget_millis(t.config.budget),
                    calls: t.frame_calls,
                    grants: t.frame_grants,
                    denials: t.frame_denials,
                    forbidden: t.forbidden,
                })
                .collect(),
        };

        if !overrun.is_zero() {
            debug!(
                frame = self.frame_index,
                overrun_ms = format!("{:.3}", millis(overrun)),
                debt_ms = format!("{:.3}", millis(debt_out)),
                "Frame over budget"
            );
        }

        self.debt = debt_out;
        report
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Delta passed to the last `begin_frame`.
    pub fn frame_delta(&self) -> Duration {
        self.frame_delta
    }

    /// Overrun carried into the current frame.
    pub fn debt(&self) -> Duration {
        self.debt
    }

    /// Time charged to aperiodic tasks so far this frame.
    pub fn frame_time_consumed(&self) -> Duration {
        self.frame_consumed
    }

    /// True once the frame budget is used up.
    pub fn no_more_time(&self) -> bool {
        self.no_more_time
    }

    /// Recomputes [`no_more_time`](Self::no_more_time) from the time consumed.
    pub fn update_no_more_time(&mut self) {
        self.no_more_time =
            self.frame_consumed.saturating_add(self.debt) >= self.config.frame_budget;
    }

    /// Time `task` may still use this frame, limited by both budgets.
    pub fn available_time(&self, task: TaskId) -> Result<Duration, SchedulerError> {
        let task = self.task_ref(task)?;
        if self.no_more_time || !task.has_capacity() {
            return Ok(Duration::ZERO);
        }
        let global = self
            .config
            .frame_budget
            .saturating_sub(self.debt)
            .saturating_sub(self.frame_consumed);
        Ok(global.min(task.remaining()))
    }

    pub fn frame_time_for_task(&self, task: TaskId) -> Result<Duration, SchedulerError> {
        Ok(self.task_ref(task)?.frame_time)
    }

    pub fn frame_calls_for_task(&self, task: TaskId) -> Result<u32, SchedulerError> {
        Ok(self.task_ref(task)?.frame_calls)
    }

    /// Denies `task` to everyone for the rest of the frame.
    pub fn forbid_task(&mut self, task: TaskId) -> Result<(), SchedulerError> {
        let entry = self.task_mut(task)?;
        if !entry.forbidden {
            entry.forbidden = true;
            debug!(task = %entry.name, "Task forbidden for the rest of the frame");
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Aperiodic protocol
    // -------------------------------------------------------------------------

    /// Full grant protocol for one requester. Returns true if the requester
    /// may run `task` now; it must then call
    /// [`process_feedback`](Self::process_feedback).
    pub fn request_aperiodic(&mut self, task: TaskId, id: RequesterId) -> Result<bool, SchedulerError> {
        if self.requester_task(task, id)?.started_at.is_some() {
            return Err(self.already_running(task, id.to_string()));
        }

        self.keep_alive(task, id)?;

        if self.grant(task, id)? {
            self.reset_priority(task, id)?;
            self.start_task(task, id)?;
            self.requester_task_mut(task, id)?.grants += 1;
            let entry = self.task_mut(task)?;
            entry.frame_grants += 1;
            trace!(requester = %id, task = %entry.name, "Aperiodic task granted");
            Ok(true)
        } else {
            let priority = self.increase_priority(task, id)?;
            self.requester_task_mut(task, id)?.denials += 1;
            let entry = self.task_mut(task)?;
            entry.frame_denials += 1;
            debug!(
                requester = %id,
                task = %entry.name,
                priority = format!("{:.1}", priority),
                "Aperiodic task denied"
            );
            Ok(false)
        }
    }

    /// Grant protocol without a requester: no priority, no keep-alive.
    /// A grant must be closed with
    /// [`process_feedback_global`](Self::process_feedback_global).
    pub fn request_aperiodic_global(&mut self, task: TaskId) -> Result<bool, SchedulerError> {
        let now = self.now();
        let no_more_time = self.no_more_time;
        if self.task_ref(task)?.global_start.is_some() {
            return Err(self.already_running(task, GLOBAL_REQUESTER.to_string()));
        }

        let entry = self.task_mut(task)?;
        if !no_more_time && entry.has_capacity() {
            entry.global_start = Some(now);
            entry.frame_grants += 1;
            Ok(true)
        } else {
            entry.frame_denials += 1;
            Ok(false)
        }
    }

    /// Charges the time since the global grant to `task`.
    pub fn process_feedback_global(&mut self, task: TaskId) -> Result<Duration, SchedulerError> {
        let now = self.now();
        let entry = self.task_mut(task)?;
        let Some(started) = entry.global_start.take() else {
            return Err(SchedulerError::TaskNotStarted {
                task: entry.name.clone(),
                requester: GLOBAL_REQUESTER.to_string(),
            });
        };
        let elapsed = now.saturating_sub(started);
        entry.account(elapsed);
        self.charge_frame(elapsed);
        Ok(elapsed)
    }

    /// Stamps the time of the requester's latest request.
    pub fn keep_alive(&mut self, task: TaskId, id: RequesterId) -> Result<(), SchedulerError> {
        let now = self.now();
        self.requester_task_mut(task, id)?.last_request = Some(now);
        self.requester_mut(id)?.last_seen = now;
        Ok(())
    }

    /// Pure grant decision; changes nothing.
    pub fn grant(&self, task: TaskId, id: RequesterId) -> Result<bool, SchedulerError> {
        self.requester_ref(id)?;
        Ok(!self.no_more_time && self.task_ref(task)?.has_capacity())
    }

    /// Returns the requester's priority for `task` to the neutral baseline.
    pub fn reset_priority(&mut self, task: TaskId, id: RequesterId) -> Result<(), SchedulerError> {
        self.requester_task_mut(task, id)?.priority = 0.0;
        Ok(())
    }

    /// Records the start of a granted slice.
    pub fn start_task(&mut self, task: TaskId, id: RequesterId) -> Result<(), SchedulerError> {
        let now = self.now();
        if self.requester_task(task, id)?.started_at.is_some() {
            return Err(self.already_running(task, id.to_string()));
        }
        self.requester_task_mut(task, id)?.started_at = Some(now);
        Ok(())
    }

    /// Adds the task's boost, scaled by the requester's priority factor.
    pub fn increase_priority(&mut self, task: TaskId, id: RequesterId) -> Result<f32, SchedulerError> {
        let boost = self.task_ref(task)?.config.priority_boost;
        let factor = self.requester_ref(id)?.priority_factor;
        self.add_priority(task, id, boost * factor)
    }

    /// Adds `amount` directly, bypassing boost and factor.
    pub fn increase_instant_priority(
        &mut self,
        task: TaskId,
        id: RequesterId,
        amount: f32,
    ) -> Result<f32, SchedulerError> {
        self.add_priority(task, id, amount)
    }

    fn add_priority(&mut self, task: TaskId, id: RequesterId, amount: f32) -> Result<f32, SchedulerError> {
        let max = self.config.max_priority;
        let state = self.requester_task_mut(task, id)?;
        let before = state.priority;
        let after = (before + amount).min(max).max(0.0);
        state.priority = after;

        if after >= max && before < max {
            warn!(
                requester = %id,
                task = %task,
                max_priority = max,
                "Requester priority saturated"
            );
        }
        Ok(after)
    }

    /// Ends a granted slice and charges its elapsed time.
    pub fn process_feedback(&mut self, task: TaskId, id: RequesterId) -> Result<Duration, SchedulerError> {
        let now = self.now();
        let Some(started) = self.requester_task_mut(task, id)?.started_at.take() else {
            return Err(SchedulerError::TaskNotStarted {
                task: self.task_ref(task)?.name.clone(),
                requester: id.to_string(),
            });
        };
        let elapsed = now.saturating_sub(started);
        self.task_mut(task)?.account(elapsed);
        self.charge_frame(elapsed);
        trace!(
            requester = %id,
            task = %task,
            elapsed_us = elapsed.as_micros() as u64,
            "Task feedback"
        );
        Ok(elapsed)
    }

    fn charge_frame(&mut self, elapsed: Duration) {
        self.frame_consumed = self.frame_consumed.saturating_add(elapsed);
        self.update_no_more_time();
    }

    // -------------------------------------------------------------------------
    // Periodic protocol
    // -------------------------------------------------------------------------

    /// Returns true if the period has elapsed since the requester last ran
    /// `task`, and records this run. The first request is always granted.
    pub fn request_periodic(&mut self, task: PeriodicTaskId, id: RequesterId) -> Result<bool, SchedulerError> {
        let period = self.periodic_ref(task)?.period;
        let now = self.now();
        let requester = self.requester_mut(id)?;
        requester.last_seen = now;

        let slot = requester
            .periodic_last_use
            .get_mut(task.0)
            .ok_or_else(|| SchedulerError::UnknownTask(task.to_string()))?;
        let due = slot.map_or(true, |last| now.saturating_sub(last) >= period);
        if due {
            *slot = Some(now);
        }
        Ok(due)
    }

    /// Marks `task` as just run by the requester.
    pub fn record_periodic_use(&mut self, task: PeriodicTaskId, id: RequesterId) -> Result<(), SchedulerError> {
        self.periodic_ref(task)?;
        let now = self.now();
        let requester = self.requester_mut(id)?;
        if let Some(slot) = requester.periodic_last_use.get_mut(task.0) {
            *slot = Some(now);
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Lookups
    // -------------------------------------------------------------------------

    fn task_ref(&self, task: TaskId) -> Result<&AperiodicTask, SchedulerError> {
        self.tasks
            .get(task.0)
            .ok_or_else(|| SchedulerError::UnknownTask(task.to_string()))
    }

    fn task_mut(&mut self, task: TaskId) -> Result<&mut AperiodicTask, SchedulerError> {
        self.tasks
            .get_mut(task.0)
            .ok_or_else(|| SchedulerError::UnknownTask(task.to_string()))
    }

    fn periodic_ref(&self, task: PeriodicTaskId) -> Result<&PeriodicTask, SchedulerError> {
        self.periodic
            .get(task.0)
            .ok_or_else(|| SchedulerError::UnknownTask(task.to_string()))
    }

    fn periodic_mut(&mut self, task: PeriodicTaskId) -> Result<&mut PeriodicTask, SchedulerError> {
        self.periodic
            .get_mut(task.0)
            .ok_or_else(|| SchedulerError::UnknownTask(task.to_string()))
    }

    fn requester_ref(&self, id: RequesterId) -> Result<&Requester, SchedulerError> {
        self.requesters
            .get(&id)
            .ok_or(SchedulerError::UnknownRequester(id))
    }

    fn requester_mut(&mut self, id: RequesterId) -> Result<&mut Requester, SchedulerError> {
        self.requesters
            .get_mut(&id)
            .ok_or(SchedulerError::UnknownRequester(id))
    }

    fn requester_task(&self, task: TaskId, id: RequesterId) -> Result<&RequesterTaskState, SchedulerError> {
        self.task_ref(task)?;
        self.requester_ref(id)?
            .tasks
            .get(task.0)
            .ok_or_else(|| SchedulerError::UnknownTask(task.to_string()))
    }

    fn requester_task_mut(
        &mut self,
        task: TaskId,
        id: RequesterId,
    ) -> Result<&mut RequesterTaskState, SchedulerError> {
        self.task_ref(task)?;
        self.requester_mut(id)?
            .tasks
            .get_mut(task.0)
            .ok_or_else(|| SchedulerError::UnknownTask(task.to_string()))
    }

    fn already_running(&self, task: TaskId, requester: String) -> SchedulerError {
        SchedulerError::TaskAlreadyRunning {
            task: self
                .task_name(task)
                .map_or_else(|| task.to_string(), str::to_string),
            requester,
        }
    }
}

fn validate_boost(boost: f32) -> Result<(), SchedulerError> {
    if !boost.is_finite() || boost < 0.0 {
        return Err(SchedulerError::InvalidBudget(format!(
            "priority boost must be finite and non-negative, got {}",
            boost
        )));
    }
    Ok(())
}

impl std::fmt::Debug for TimeBudgetScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeBudgetScheduler")
            .field("config", &self.config)
            .field("tasks", &self.tasks.len())
            .field("periodic", &self.periodic.len())
            .field("requesters", &self.requesters.len())
            .field("frame_index", &self.frame_index)
            .field("no_more_time", &self.no_more_time)
            .finish()
    }
}
