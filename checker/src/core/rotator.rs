//! Round-robin instance rotation with a per-instance check quota

use shared::RotationStrategy;

use crate::error::{CheckerError, CheckerResult};

/// Owns the rotation counters. Only the scheduler loop mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRotator {
    instances: Vec<String>,
    quota: u32,
    current: usize,
    used: u32,
    rotations: u64,
}

impl InstanceRotator {
    pub fn new(strategy: &RotationStrategy) -> CheckerResult<Self> {
        let instances = strategy.instances();
        if instances.is_empty() {
            return Err(CheckerError::config("rotation needs at least one instance"));
        }
        if strategy.quota() == 0 {
            return Err(CheckerError::config("per-instance quota must be greater than zero"));
        }

        Ok(Self {
            instances,
            quota: strategy.quota(),
            current: 0,
            used: 0,
            rotations: 0,
        })
    }

    pub fn current(&self) -> &str {
        &self.instances[self.current]
    }

    /// Instance for the next check, advancing once the current one has used its quota
    pub fn assign(&mut self) -> String {
        if self.used >= self.quota {
            self.advance();
        }
        self.used += 1;
        self.current().to_string()
    }

    /// Rotate away from `instance` after it rate-limited us.
    ///
    /// Ignored when the scheduler already moved past it, so several checks
    /// rate-limited by the same instance rotate only once.
    pub fn report_rate_limited(&mut self, instance: &str) -> bool {
        if self.current() != instance {
            return false;
        }
        self.advance();
        true
    }

    /// Checks assigned to the current instance since it became current
    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn rotations(&self) -> u64 {
        self.rotations
    }

    fn advance(&mut self) {
        self.current = (self.current + 1) % self.instances.len();
        self.used = 0;
        self.rotations += 1;
    }
}
