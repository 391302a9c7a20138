//! Bounded retry decisions for classified outcomes

use std::time::Duration;

use crate::types::Outcome;

/// What to do with an identifier after an attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Terminal outcome, record it
    Finish,
    /// Try again after `delay`; `rotate` asks the scheduler to move off the instance
    Retry { delay: Duration, rotate: bool },
    /// Retryable failure but the attempt budget is spent
    GiveUp { reason: String },
    /// Stop intake for the whole run
    Halt { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per identifier, including the first
    pub max_attempts: u32,
    /// Wait after a 429 that carried no directive
    pub rate_limit_backoff: Duration,
    /// Wait after a transport failure
    pub network_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            rate_limit_backoff: Duration::from_millis(100),
            network_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Decide the next step given the outcome of attempt number `attempt` (1-based)
    pub fn next_step(&self, outcome: &Outcome, attempt: u32) -> Step {
        let (delay, rotate) = match outcome {
            Outcome::Confirmed | Outcome::Absent | Outcome::Unclassified { .. } => return Step::Finish,
            Outcome::Malformed { reason } => return Step::Halt { reason: reason.clone() },
            Outcome::RateLimited { wait } => (wait.unwrap_or(self.rate_limit_backoff), true),
            Outcome::Transient { .. } => (self.network_backoff, false),
        };

        if attempt >= self.max_attempts {
            let last = outcome.error_message().unwrap_or_default();
            return Step::GiveUp {
                reason: format!("gave up after {attempt} attempts: {last}"),
            };
        }

        Step::Retry { delay, rotate }
    }
}
