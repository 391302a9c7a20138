//! Existence checker: one lookup per attempt, classified, with bounded retries

use std::time::Duration;

use rand::Rng;
use shared::{stage_debug, stage_warn, Identifier, NormalizedTarget, Stage};

use crate::core::{classify, RetryPolicy, Step};
use crate::traits::LookupClient;
use crate::types::{CheckResult, CheckState, Outcome};

pub struct ExistenceChecker<L: LookupClient> {
    client: L,
    retry: RetryPolicy,
    jitter: Duration,
}

impl<L: LookupClient> ExistenceChecker<L> {
    pub fn new(client: L, retry: RetryPolicy) -> Self {
        Self { client, retry, jitter: Duration::ZERO }
    }

    /// Random 0..=jitter delay before every request
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Single lookup of `target` on `instance`, classified
    pub async fn attempt(&self, target: &NormalizedTarget, instance: &str) -> Outcome {
        if !self.jitter.is_zero() {
            let millis = rand::thread_rng().gen_range(0..=self.jitter.as_millis() as u64);
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }

        let reply = self.client.lookup(instance, target).await;
        let outcome = classify(&reply);
        stage_debug!(Stage::Checker, account = %target, instance, "lookup outcome {:?}", outcome);
        outcome
    }

    /// Check one target against a single instance, retrying in place.
    ///
    /// `position` is the identifier's submission index, carried into the
    /// result so it can be aggregated with others. The scheduler uses
    /// [`attempt`](Self::attempt) instead so it can rotate instances between
    /// retries; this is for callers without a scheduler.
    pub async fn check(
        &self,
        position: usize,
        identifier: &Identifier,
        target: &NormalizedTarget,
        instance: &str,
    ) -> CheckResult {
        let mut attempts = 0;
        let mut rate_limited = false;

        loop {
            attempts += 1;
            let outcome = self.attempt(target, instance).await;
            if matches!(outcome, Outcome::RateLimited { .. }) {
                rate_limited = true;
            }

            let (state, error) = match self.retry.next_step(&outcome, attempts) {
                Step::Finish => (outcome.state(), outcome.error_message()),
                Step::Retry { delay, .. } => {
                    stage_warn!(
                        Stage::Checker,
                        "⏳ {} (attempt {}), retrying {} in {}ms",
                        outcome.error_message().unwrap_or_default(),
                        attempts,
                        target,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                Step::GiveUp { reason } => (CheckState::TransientFailure, Some(reason)),
                Step::Halt { reason } => (CheckState::FatalFailure, Some(reason)),
            };

            return CheckResult {
                position,
                identifier: identifier.clone(),
                target: target.clone(),
                state,
                exists: state == CheckState::Confirmed,
                source_instance: instance.to_string(),
                error,
                rate_limited,
                attempts,
            };
        }
    }
}
