//! Identifier normalization into lookup query form

use std::collections::HashSet;

use shared::{Direction, NormalizedTarget};

use crate::types::KnownSet;

/// Suffix Bridgy Fed gives Mastodon accounts on Bluesky
pub const AP_BRIDGE_SUFFIX: &str = ".ap.brid.gy";

/// Suffix Bridgy Fed gives Bluesky accounts on Mastodon
pub const BSKY_BRIDGE_SUFFIX: &str = "@bsky.brid.gy";

/// Pure, total rewrite of a raw account address for one direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalizer {
    direction: Direction,
}

impl Normalizer {
    pub fn new(direction: Direction) -> Self {
        Self { direction }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Never fails; malformed input yields a target the lookup will reject.
    /// Idempotent: normalizing a normalized value returns it unchanged.
    pub fn normalize(&self, raw: &str) -> NormalizedTarget {
        match self.direction {
            Direction::MastodonToBluesky => NormalizedTarget::new(to_bluesky_handle(raw)),
            Direction::BlueskyToMastodon => NormalizedTarget::new(to_mastodon_account(raw)),
        }
    }

    /// Build a membership set from previously recorded entries, raw or normalized
    pub fn known_set<I, S>(&self, entries: I) -> KnownSet
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let targets: HashSet<NormalizedTarget> = entries
            .into_iter()
            .filter(|entry| !entry.as_ref().trim().is_empty())
            .map(|entry| self.normalize(entry.as_ref()))
            .collect();
        KnownSet::new(targets)
    }
}

fn canonical(raw: &str) -> String {
    raw.trim().trim_start_matches('@').to_lowercase()
}

fn join_on_separator(value: &str) -> String {
    value
        .split('@')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

/// `user_name@instance.social` -> `user-name.instance.social.ap.brid.gy`
fn to_bluesky_handle(raw: &str) -> String {
    // Bluesky handles only allow letters, digits, dots and hyphens
    let escaped: String = canonical(raw)
        .chars()
        .map(|c| if c == '_' || c == '~' { '-' } else { c })
        .collect();

    let handle = join_on_separator(&escaped);
    if handle.ends_with(AP_BRIDGE_SUFFIX) {
        handle
    } else {
        format!("{handle}{AP_BRIDGE_SUFFIX}")
    }
}

/// `alice.bsky.social` -> `alice.bsky.social@bsky.brid.gy`
fn to_mastodon_account(raw: &str) -> String {
    // Suffix first: stripping the leading '@' of a bare "@bsky.brid.gy" would break idempotence
    let lowered = raw.trim().to_lowercase();
    let handle = lowered.strip_suffix(BSKY_BRIDGE_SUFFIX).unwrap_or(&lowered);
    format!("{}{BSKY_BRIDGE_SUFFIX}", join_on_separator(handle.trim_start_matches('@')))
}
