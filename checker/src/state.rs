//! Scheduler state for one pipeline run
//!
//! Holds the only mutable shared state of a run (rotation counters and the
//! in-flight count). The scheduler loop is its single writer; checks report
//! outcomes back to the loop instead of touching it.

use std::collections::VecDeque;
use std::time::Duration;

use shared::{Identifier, NormalizedTarget};
use tokio::time::Instant;

use crate::core::InstanceRotator;
use crate::types::{CheckResult, CheckState, Outcome};

/// An identifier waiting for (another) lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub position: usize,
    pub identifier: Identifier,
    pub target: NormalizedTarget,
    /// Attempts already dispatched
    pub attempts: u32,
    /// Earliest start for the next attempt, set by backoff
    pub not_before: Option<Instant>,
    pub rate_limited: bool,
}

impl Job {
    pub fn new(position: usize, identifier: Identifier, target: NormalizedTarget) -> Self {
        Self {
            position,
            identifier,
            target,
            attempts: 0,
            not_before: None,
            rate_limited: false,
        }
    }

    /// Result for a job that reached a terminal outcome
    pub fn finish(self, instance: String, outcome: &Outcome) -> CheckResult {
        let state = outcome.state();
        self.into_result(instance, state, outcome.error_message())
    }

    /// Result for a job that ended without a confirmed/absent answer
    pub fn fail(self, instance: String, state: CheckState, message: String) -> CheckResult {
        self.into_result(instance, state, Some(message))
    }

    /// Result for a job never dispatched because the run stopped early
    pub fn not_checked(self, reason: &str) -> CheckResult {
        let message = format!("not checked: run stopped early: {reason}");
        self.into_result(String::new(), CheckState::FatalFailure, Some(message))
    }

    fn into_result(self, instance: String, state: CheckState, error: Option<String>) -> CheckResult {
        CheckResult {
            position: self.position,
            identifier: self.identifier,
            target: self.target,
            state,
            exists: state == CheckState::Confirmed,
            source_instance: instance,
            error,
            rate_limited: self.rate_limited,
            attempts: self.attempts,
        }
    }
}

pub struct PipelineState {
    queue: VecDeque<Job>,
    pub rotator: InstanceRotator,
    in_flight: usize,
    peak_in_flight: usize,
    last_start: Option<Instant>,
    completed: Vec<CheckResult>,
    halted: Option<String>,
}

impl PipelineState {
    pub fn new(rotator: InstanceRotator) -> Self {
        Self {
            queue: VecDeque::new(),
            rotator,
            in_flight: 0,
            peak_in_flight: 0,
            last_start: None,
            completed: Vec::new(),
            halted: None,
        }
    }

    pub fn enqueue(&mut self, job: Job) {
        self.queue.push_back(job);
    }

    /// Retries go ahead of fresh work
    pub fn requeue(&mut self, job: Job) {
        self.queue.push_front(job);
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Next job to dispatch, if the ceiling allows and intake is open.
    /// Counts it as in flight.
    pub fn next_job(&mut self, max_in_flight: usize) -> Option<Job> {
        if self.halted.is_some() || self.in_flight >= max_in_flight {
            return None;
        }
        let job = self.queue.pop_front()?;
        self.in_flight += 1;
        self.peak_in_flight = self.peak_in_flight.max(self.in_flight);
        Some(job)
    }

    /// A dispatched check reported back
    pub fn finish_one(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight
    }

    /// Earliest start for the job at the head of the queue: no earlier than
    /// `spacing` after the previous start, nor before its backoff deadline.
    /// `None` when the queue is empty or intake has stopped.
    pub fn ready_at(&self, spacing: Duration) -> Option<Instant> {
        if self.halted.is_some() {
            return None;
        }
        let job = self.queue.front()?;
        let mut start = Instant::now();
        if let Some(last) = self.last_start {
            start = start.max(last.checked_add(spacing).unwrap_or(last));
        }
        if let Some(deadline) = job.not_before {
            start = start.max(deadline);
        }
        Some(start)
    }

    /// A request went out at `at`
    pub fn mark_started(&mut self, at: Instant) {
        self.last_start = Some(at);
    }

    pub fn record(&mut self, result: CheckResult) {
        self.completed.push(result);
    }

    pub fn completed(&self) -> &[CheckResult] {
        &self.completed
    }

    /// Stop intake; the first reason wins
    pub fn halt(&mut self, reason: String) {
        if self.halted.is_none() {
            self.halted = Some(reason);
        }
    }

    pub fn halted(&self) -> Option<&str> {
        self.halted.as_deref()
    }

    /// Jobs never dispatched because intake stopped
    pub fn drain_queue(&mut self) -> Vec<Job> {
        self.queue.drain(..).collect()
    }

    pub fn into_parts(self) -> (Vec<CheckResult>, Option<String>) {
        (self.completed, self.halted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::RotationStrategy;

    fn state() -> PipelineState {
        PipelineState::new(InstanceRotator::new(&RotationStrategy::single("https://a.example")).unwrap())
    }

    fn job(position: usize, name: &str) -> Job {
        Job::new(position, Identifier::new(name).unwrap(), NormalizedTarget::new(name))
    }

    #[test]
    fn test_ceiling_limits_dispatch() {
        let mut state = state();
        for i in 0..5 {
            state.enqueue(job(i, &format!("user{i}")));
        }

        assert!(state.next_job(2).is_some());
        assert!(state.next_job(2).is_some());
        assert!(state.next_job(2).is_none());
        assert_eq!(state.in_flight(), 2);

        state.finish_one();
        assert_eq!(state.next_job(2).map(|j| j.position), Some(2));
        assert_eq!(state.peak_in_flight(), 2);
    }

    #[test]
    fn test_requeued_jobs_go_first() {
        let mut state = state();
        state.enqueue(job(0, "alice"));
        state.enqueue(job(1, "bob"));

        let first = state.next_job(10).unwrap();
        state.finish_one();
        state.requeue(first);

        assert_eq!(state.next_job(10).map(|j| j.position), Some(0));
    }

    #[test]
    fn test_halt_stops_intake_and_drains() {
        let mut state = state();
        state.enqueue(job(0, "alice"));
        state.enqueue(job(1, "bob"));

        state.halt("bad directive".to_string());
        state.halt("second reason".to_string());

        assert!(state.next_job(10).is_none());
        assert_eq!(state.halted(), Some("bad directive"));
        assert_eq!(state.drain_queue().len(), 2);
        assert_eq!(state.queued(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_at_spaces_requests() {
        let mut state = state();
        let spacing = Duration::from_millis(100);
        state.enqueue(job(0, "alice"));
        state.enqueue(job(1, "bob"));

        let first = state.ready_at(spacing).unwrap();
        assert_eq!(first, Instant::now());
        state.next_job(10).unwrap();
        state.mark_started(first);

        assert_eq!(state.ready_at(spacing), Some(first + spacing));

        let mut retry = job(2, "carol");
        retry.not_before = Some(Instant::now() + Duration::from_secs(2));
        let deadline = retry.not_before;
        state.requeue(retry);
        assert_eq!(state.ready_at(spacing), deadline);

        state.halt("stop".to_string());
        assert_eq!(state.ready_at(spacing), None);
    }

    #[test]
    fn test_not_checked_is_terminal() {
        let result = job(3, "dave").not_checked("bad directive");

        assert_eq!(result.state, CheckState::FatalFailure);
        assert!(result.state.is_terminal());
        assert!(!result.exists);
        assert_eq!(result.position, 3);
        assert_eq!(result.error.as_deref(), Some("not checked: run stopped early: bad directive"));
    }
}
