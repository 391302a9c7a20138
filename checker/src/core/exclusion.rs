//! Bridge-artifact exclusion, evaluated before normalization and any lookup

use shared::Direction;

/// Mastodon-side addresses that are themselves bridges or mirrors
const MASTODON_EXCLUDED: &[&str] = &["@bsky.brid.gy", "@threads.net", "@bird.makeup"];

/// Bluesky-side handles that are already bridged Fediverse accounts
const BLUESKY_EXCLUDED: &[&str] = &[".ap.brid.gy", ".brid.gy"];

/// Fixed set of domain suffixes never forwarded to the checker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionFilter {
    suffixes: Vec<String>,
}

impl ExclusionFilter {
    pub fn for_direction(direction: Direction) -> Self {
        let builtin = match direction {
            Direction::MastodonToBluesky => MASTODON_EXCLUDED,
            Direction::BlueskyToMastodon => BLUESKY_EXCLUDED,
        };
        Self {
            suffixes: builtin.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Add configured suffixes on top of the built-in ones
    pub fn with_extra<S: AsRef<str>>(mut self, extra: &[S]) -> Self {
        for suffix in extra {
            let suffix = suffix.as_ref().trim().to_lowercase();
            if !suffix.is_empty() && !self.suffixes.contains(&suffix) {
                self.suffixes.push(suffix);
            }
        }
        self
    }

    pub fn is_excluded(&self, raw: &str) -> bool {
        let candidate = raw.trim().to_lowercase();
        self.suffixes.iter().any(|suffix| candidate.ends_with(suffix.as_str()))
    }

    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }
}
