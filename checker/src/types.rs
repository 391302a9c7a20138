//! Checker-specific data types

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared::{Identifier, NormalizedTarget};
use thiserror::Error;

use crate::error::{CheckerError, CheckerResult};

/// Placeholder substituted with the normalized target in link templates
pub const TARGET_PLACEHOLDER: &str = "{target}";

/// HTTP reply from one lookup, reduced to what classification needs
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LookupReply {
    pub status: u16,
    /// Raw `retry-after` header value
    pub retry_after: Option<String>,
    /// Raw `ratelimit-reset` header value (Unix epoch seconds)
    pub ratelimit_reset: Option<String>,
    /// Body parsed and carried the field the endpoint promises
    pub payload_ok: bool,
}

impl LookupReply {
    pub fn found() -> Self {
        Self { status: 200, payload_ok: true, ..Default::default() }
    }

    pub fn with_status(status: u16) -> Self {
        Self { status, ..Default::default() }
    }

    pub fn rate_limited(retry_after: Option<&str>) -> Self {
        Self {
            status: 429,
            retry_after: retry_after.map(str::to_string),
            ..Default::default()
        }
    }
}

/// Lookup that never produced an HTTP status
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupFailure {
    /// Connection refused/reset, timeout, truncated body
    #[error("transport error: {0}")]
    Transport(String),

    #[error("{0}")]
    Other(String),
}

/// Lifecycle of one identifier inside the checker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckState {
    Pending,
    InFlight,
    Confirmed,
    Absent,
    TransientFailure,
    FatalFailure,
}

impl CheckState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CheckState::Pending | CheckState::InFlight | CheckState::TransientFailure)
    }
}

/// Classified result of a single lookup attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Confirmed,
    Absent,
    /// Server asked us to slow down; `wait` is its suggestion if it gave one
    RateLimited { wait: Option<Duration> },
    Transient { reason: String },
    /// Rate-limit directive we cannot interpret; stops the run
    Malformed { reason: String },
    /// Anything else; reported as absent but logged
    Unclassified { reason: String },
}

impl Outcome {
    pub fn state(&self) -> CheckState {
        match self {
            Outcome::Confirmed => CheckState::Confirmed,
            Outcome::Absent | Outcome::Unclassified { .. } => CheckState::Absent,
            Outcome::RateLimited { .. } | Outcome::Transient { .. } => CheckState::TransientFailure,
            Outcome::Malformed { .. } => CheckState::FatalFailure,
        }
    }

    /// Error text to record for this outcome, if any
    pub fn error_message(&self) -> Option<String> {
        match self {
            Outcome::Confirmed | Outcome::Absent => None,
            Outcome::RateLimited { .. } => Some("rate limited".to_string()),
            Outcome::Transient { reason }
            | Outcome::Malformed { reason }
            | Outcome::Unclassified { reason } => Some(reason.clone()),
        }
    }
}

/// Final word on one identifier; a retry supersedes the previous attempt's result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Position in the submitted input, used to restore order
    pub position: usize,
    pub identifier: Identifier,
    pub target: NormalizedTarget,
    pub state: CheckState,
    pub exists: bool,
    pub source_instance: String,
    pub error: Option<String>,
    pub rate_limited: bool,
    pub attempts: u32,
}

/// Confirmed account paired with its profile link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub identifier: NormalizedTarget,
    pub link: String,
}

/// Identifier that failed unexpectedly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub identifier: Identifier,
    pub message: String,
}

pub type ResultSet = Vec<ResultEntry>;
pub type ErrorLog = Vec<ErrorEntry>;

/// Targets recorded by a previous run, used only for membership tests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownSet {
    targets: HashSet<NormalizedTarget>,
}

impl KnownSet {
    pub fn new(targets: HashSet<NormalizedTarget>) -> Self {
        Self { targets }
    }

    pub fn contains(&self, target: &NormalizedTarget) -> bool {
        self.targets.contains(target)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Output-domain template such as `https://bsky.app/profile/{target}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTemplate(String);

impl LinkTemplate {
    pub fn new(template: impl Into<String>) -> CheckerResult<Self> {
        let template = template.into();
        if !template.contains(TARGET_PLACEHOLDER) {
            return Err(CheckerError::config(format!(
                "link template {template:?} must contain {TARGET_PLACEHOLDER}"
            )));
        }
        Ok(Self(template))
    }

    pub fn render(&self, target: &NormalizedTarget) -> String {
        self.0.replace(TARGET_PLACEHOLDER, target.as_str())
    }
}

/// Admission control for outbound lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulePolicy {
    /// Ceiling on checks in flight at once
    pub max_in_flight: usize,
    /// Minimum gap between two request starts
    pub request_spacing: Duration,
    /// Upper bound of the random delay added before each request
    pub jitter: Duration,
}

impl SchedulePolicy {
    /// One request at a time with a fixed gap between them
    pub fn serialized(request_spacing: Duration) -> Self {
        Self { max_in_flight: 1, request_spacing, jitter: Duration::ZERO }
    }

    /// Up to `max_in_flight` concurrent requests, no enforced gap
    pub fn bounded(max_in_flight: usize) -> Self {
        Self { max_in_flight, request_spacing: Duration::ZERO, jitter: Duration::ZERO }
    }

    pub fn with_spacing(mut self, request_spacing: Duration) -> Self {
        self.request_spacing = request_spacing;
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }
}

impl Default for SchedulePolicy {
    fn default() -> Self {
        Self::bounded(10).with_spacing(Duration::from_millis(100))
    }
}

/// Counters reported at the end of a run.
///
/// `confirmed + absent + errored == submitted - excluded - known - duplicates`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub submitted: usize,
    /// Bridge artifacts and blank entries, never checked
    pub excluded: usize,
    pub known: usize,
    pub duplicates: usize,
    pub confirmed: usize,
    pub absent: usize,
    pub errored: usize,
    pub rate_limited_events: usize,
}

impl RunSummary {
    pub fn checked(&self) -> usize {
        self.confirmed + self.absent + self.errored
    }
}

/// Everything a run hands back to the caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub results: ResultSet,
    pub errors: ErrorLog,
    pub summary: RunSummary,
    /// Set when a malformed rate-limit directive stopped intake early
    pub fatal: Option<String>,
}
