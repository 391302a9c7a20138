//! Outcome classification for lookup replies

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::types::{LookupFailure, LookupReply, Outcome};

/// Classify one lookup against the current wall clock
pub fn classify(result: &Result<LookupReply, LookupFailure>) -> Outcome {
    classify_at(result, Utc::now())
}

/// Classify one lookup; `now` anchors date-based retry directives
pub fn classify_at(result: &Result<LookupReply, LookupFailure>, now: DateTime<Utc>) -> Outcome {
    let reply = match result {
        Ok(reply) => reply,
        Err(LookupFailure::Transport(reason)) => {
            return Outcome::Transient { reason: reason.clone() };
        }
        Err(LookupFailure::Other(reason)) => {
            return Outcome::Unclassified { reason: reason.clone() };
        }
    };

    match reply.status {
        200 if reply.payload_ok => Outcome::Confirmed,
        200 => Outcome::Unclassified {
            reason: "HTTP 200 with malformed profile payload".to_string(),
        },
        400 | 404 => Outcome::Absent,
        429 => match parse_retry_directive(reply, now) {
            Ok(wait) => Outcome::RateLimited { wait },
            Err(reason) => Outcome::Malformed { reason },
        },
        status => Outcome::Unclassified {
            reason: format!("unexpected HTTP status {status}"),
        },
    }
}

/// Longest server-suggested wait we accept; anything beyond is treated as malformed
pub const MAX_RETRY_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// Server-suggested wait from `retry-after` or, failing that, `ratelimit-reset`.
///
/// `Ok(None)` when the server gave no directive at all; `Err` when it gave one
/// we cannot read or one longer than [`MAX_RETRY_WAIT`].
pub fn parse_retry_directive(reply: &LookupReply, now: DateTime<Utc>) -> Result<Option<Duration>, String> {
    if let Some(raw) = reply.retry_after.as_deref() {
        let value = raw.trim();
        if let Ok(seconds) = value.parse::<u64>() {
            return within_limit(Duration::from_secs(seconds), "retry-after", raw);
        }
        if let Ok(date) = DateTime::parse_from_rfc2822(value) {
            return within_limit(until(date.with_timezone(&Utc), now), "retry-after", raw);
        }
        return Err(format!("unparseable retry-after directive: {raw:?}"));
    }

    if let Some(raw) = reply.ratelimit_reset.as_deref() {
        let reset = raw
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|epoch| DateTime::<Utc>::from_timestamp(epoch, 0))
            .ok_or_else(|| format!("unparseable ratelimit-reset directive: {raw:?}"))?;
        return within_limit(until(reset, now), "ratelimit-reset", raw);
    }

    Ok(None)
}

fn within_limit(wait: Duration, header: &str, raw: &str) -> Result<Option<Duration>, String> {
    if wait > MAX_RETRY_WAIT {
        return Err(format!("out-of-range {header} directive: {raw:?}"));
    }
    Ok(Some(wait))
}

fn until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (deadline - now).to_std().unwrap_or(Duration::ZERO)
}
