//! Checker trait definitions for dependency injection

use async_trait::async_trait;
use shared::NormalizedTarget;

use crate::types::{LookupFailure, LookupReply};

/// One HTTP GET against a lookup service
#[mockall::automock]
#[async_trait]
pub trait LookupClient: Send + Sync {
    /// Look `target` up on `instance` (a base URL such as `https://public.api.bsky.app`)
    async fn lookup(&self, instance: &str, target: &NormalizedTarget) -> Result<LookupReply, LookupFailure>;
}
