//! Test fixtures for pipeline tests
//!
//! `ScriptedClient` stands in for the lookup services: per-target scripts,
//! per-instance rate limiting and artificial latency, while recording every
//! call and the peak number of concurrent lookups.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use checker::{CheckerConfig, LookupClient, LookupFailure, LookupReply};
use shared::{NormalizedTarget, RotationStrategy};
use tokio::time::Instant;

pub type Reply = Result<LookupReply, LookupFailure>;

/// Standard test data and configuration
pub struct TestFixtures;

impl TestFixtures {
    pub const INSTANCE_A: &'static str = "https://a.lookup.example";
    pub const INSTANCE_B: &'static str = "https://b.lookup.example";

    /// Config with a single fake instance and no spacing
    pub fn config() -> CheckerConfig {
        CheckerConfig {
            rotation: Some(RotationStrategy::single(Self::INSTANCE_A)),
            request_spacing_ms: 0,
            ..CheckerConfig::default()
        }
    }

    /// Config rotating across both fake instances
    pub fn rotating_config(quota: u32) -> CheckerConfig {
        CheckerConfig {
            rotation: Some(RotationStrategy::round_robin(
                vec![Self::INSTANCE_A.to_string(), Self::INSTANCE_B.to_string()],
                quota,
            )),
            ..Self::config()
        }
    }

    pub fn inputs(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    /// Targets in M2B direction for a plain local name
    pub fn bluesky(name: &str) -> String {
        format!("{name}.ap.brid.gy")
    }
}

/// One recorded lookup
#[derive(Debug, Clone)]
pub struct Call {
    pub instance: String,
    pub target: String,
    pub started: Instant,
}

#[derive(Default)]
struct Inner {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    absent: Mutex<HashSet<String>>,
    limited_instances: Mutex<HashSet<String>>,
    latency: Mutex<HashMap<String, Duration>>,
    default_latency: Mutex<Duration>,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

/// Scripted lookup client; clones share state so a test can keep one for inspection
#[derive(Clone, Default)]
pub struct ScriptedClient {
    inner: Arc<Inner>,
}

impl ScriptedClient {
    /// Every target exists unless configured otherwise
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue replies for `target`; once used up the default behavior applies
    pub fn script(self, target: &str, replies: Vec<Reply>) -> Self {
        self.inner.scripts.lock().unwrap().insert(target.to_string(), replies.into());
        self
    }

    pub fn absent(self, targets: &[&str]) -> Self {
        self.inner.absent.lock().unwrap().extend(targets.iter().map(|t| t.to_string()));
        self
    }

    /// `instance` answers every lookup with 429 and no directive
    pub fn rate_limit_instance(self, instance: &str) -> Self {
        self.inner.limited_instances.lock().unwrap().insert(instance.to_string());
        self
    }

    pub fn latency(self, target: &str, latency: Duration) -> Self {
        self.inner.latency.lock().unwrap().insert(target.to_string(), latency);
        self
    }

    pub fn default_latency(self, latency: Duration) -> Self {
        *self.inner.default_latency.lock().unwrap() = latency;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, target: &str) -> usize {
        self.calls().iter().filter(|c| c.target == target).count()
    }

    pub fn calls_to(&self, instance: &str) -> usize {
        self.calls().iter().filter(|c| c.instance == instance).count()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }

    fn reply_for(&self, instance: &str, target: &str) -> Reply {
        if self.inner.limited_instances.lock().unwrap().contains(instance) {
            return Ok(LookupReply::rate_limited(None));
        }
        if let Some(reply) = self
            .inner
            .scripts
            .lock()
            .unwrap()
            .get_mut(target)
            .and_then(|queue| queue.pop_front())
        {
            return reply;
        }
        if self.inner.absent.lock().unwrap().contains(target) {
            return Ok(LookupReply::with_status(400));
        }
        Ok(LookupReply::found())
    }
}

#[async_trait]
impl LookupClient for ScriptedClient {
    async fn lookup(&self, instance: &str, target: &NormalizedTarget) -> Result<LookupReply, LookupFailure> {
        self.inner.calls.lock().unwrap().push(Call {
            instance: instance.to_string(),
            target: target.as_str().to_string(),
            started: Instant::now(),
        });

        let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak.fetch_max(now, Ordering::SeqCst);

        let latency = self
            .inner
            .latency
            .lock()
            .unwrap()
            .get(target.as_str())
            .copied()
            .unwrap_or(*self.inner.default_latency.lock().unwrap());
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.reply_for(instance, target.as_str())
    }
}
