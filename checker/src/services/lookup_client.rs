//! HTTP lookup client for the two bridge lookup endpoints

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use shared::{Direction, NormalizedTarget};
use url::Url;

use crate::error::CheckerResult;
use crate::traits::LookupClient;
use crate::types::{LookupFailure, LookupReply};

/// Which public endpoint a lookup goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupEndpoint {
    /// `app.bsky.actor.getProfile`, answers with a profile carrying `did`
    BlueskyProfile,
    /// Mastodon `accounts/lookup`, answers with an account carrying `id`
    MastodonAccount,
}

impl LookupEndpoint {
    pub fn for_direction(direction: Direction) -> Self {
        match direction {
            Direction::MastodonToBluesky => LookupEndpoint::BlueskyProfile,
            Direction::BlueskyToMastodon => LookupEndpoint::MastodonAccount,
        }
    }

    fn path(&self) -> &'static str {
        match self {
            LookupEndpoint::BlueskyProfile => "/xrpc/app.bsky.actor.getProfile",
            LookupEndpoint::MastodonAccount => "/api/v1/accounts/lookup",
        }
    }

    fn query_key(&self) -> &'static str {
        match self {
            LookupEndpoint::BlueskyProfile => "actor",
            LookupEndpoint::MastodonAccount => "acct",
        }
    }

    fn payload_key(&self) -> &'static str {
        match self {
            LookupEndpoint::BlueskyProfile => "did",
            LookupEndpoint::MastodonAccount => "id",
        }
    }

    /// Full lookup URL for `target` on `instance`
    pub fn url(&self, instance: &str, target: &NormalizedTarget) -> Result<Url, LookupFailure> {
        let mut url = Url::parse(instance)
            .and_then(|base| base.join(self.path()))
            .map_err(|e| LookupFailure::Other(format!("invalid instance URL {instance:?}: {e}")))?;
        url.query_pairs_mut().append_pair(self.query_key(), target.as_str());
        Ok(url)
    }

    /// Whether a 200 body is the profile/account object we expect
    pub fn payload_ok(&self, body: &str) -> bool {
        serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|json| json.get(self.payload_key()).and_then(|v| v.as_str()).map(|v| !v.is_empty()))
            .unwrap_or(false)
    }
}

/// Real lookup client backed by reqwest
#[derive(Clone)]
pub struct RealLookupClient {
    client: reqwest::Client,
    endpoint: LookupEndpoint,
}

impl RealLookupClient {
    /// Create new lookup client
    pub fn new(endpoint: LookupEndpoint, timeout: Duration) -> CheckerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("bridge-check/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> LookupEndpoint {
        self.endpoint
    }
}

#[async_trait]
impl LookupClient for RealLookupClient {
    async fn lookup(&self, instance: &str, target: &NormalizedTarget) -> Result<LookupReply, LookupFailure> {
        let url = self.endpoint.url(instance, target)?;

        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| transport_or_other(&e))?;

        let status = response.status().as_u16();
        let (retry_after, ratelimit_reset) = rate_limit_headers(response.headers());

        let payload_ok = if status == 200 {
            let body = response.text().await.map_err(|e| transport_or_other(&e))?;
            self.endpoint.payload_ok(&body)
        } else {
            false
        };

        Ok(LookupReply {
            status,
            retry_after,
            ratelimit_reset,
            payload_ok,
        })
    }
}

fn rate_limit_headers(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    let read = |name: &str| {
        headers
            .get(name)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
    };
    (read("retry-after"), read("ratelimit-reset"))
}

/// Network-level failures are retryable; everything else is not
fn transport_or_other(error: &reqwest::Error) -> LookupFailure {
    if error.is_connect() || error.is_timeout() || error.is_request() || error.is_body() {
        LookupFailure::Transport(error.to_string())
    } else {
        LookupFailure::Other(error.to_string())
    }
}
