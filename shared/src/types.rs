//! Core types used throughout the checker

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{SharedError, SharedResult};

/// Default number of checks sent to one instance before rotating away from it
pub const DEFAULT_INSTANCE_QUOTA: u32 = 299;

/// Account address on the source network, trimmed and non-empty
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    pub fn new(raw: &str) -> SharedResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SharedError::InvalidIdentifier { input: raw.to_string() });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Identifier {
    type Error = SharedError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Identifier::new(&value)
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.0
    }
}

/// Identifier rewritten into the query form a lookup endpoint expects.
///
/// Produced by the normalizer; holding one does not imply the account exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedTarget(String);

impl NormalizedTarget {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which way identifiers are being converted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    /// Mastodon accounts looked up as bridged Bluesky profiles
    #[default]
    MastodonToBluesky,
    /// Bluesky handles looked up as bridged Mastodon accounts
    BlueskyToMastodon,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::MastodonToBluesky => "mastodon-to-bluesky",
            Direction::BlueskyToMastodon => "bluesky-to-mastodon",
        }
    }

    /// Lookup service used when no instance list is configured
    pub fn default_instance(&self) -> &'static str {
        match self {
            Direction::MastodonToBluesky => "https://public.api.bsky.app",
            Direction::BlueskyToMastodon => "https://mastodon.social",
        }
    }

    /// Profile link template used when none is configured
    pub fn default_link_template(&self) -> &'static str {
        match self {
            Direction::MastodonToBluesky => "https://bsky.app/profile/{target}",
            Direction::BlueskyToMastodon => "https://mastodon.social/@{target}",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mastodon-to-bluesky" | "masto-to-bsky" | "m2b" => Ok(Direction::MastodonToBluesky),
            "bluesky-to-mastodon" | "bsky-to-masto" | "b2m" => Ok(Direction::BlueskyToMastodon),
            _ => Err(SharedError::UnknownDirection { input: s.to_string() }),
        }
    }
}

/// How lookups are spread across backend instances
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RotationStrategy {
    /// Every check goes to one instance
    Single { instance: String },
    /// Advance to the next instance after `quota` checks, wrapping around
    RoundRobin { instances: Vec<String>, quota: u32 },
}

impl RotationStrategy {
    pub fn single(instance: impl Into<String>) -> Self {
        Self::Single { instance: instance.into() }
    }

    pub fn round_robin(instances: Vec<String>, quota: u32) -> Self {
        Self::RoundRobin { instances, quota }
    }

    /// Ordered instance list this strategy rotates through
    pub fn instances(&self) -> Vec<String> {
        match self {
            RotationStrategy::Single { instance } => vec![instance.clone()],
            RotationStrategy::RoundRobin { instances, .. } => instances.clone(),
        }
    }

    /// Checks allowed against one instance before rotating
    pub fn quota(&self) -> u32 {
        match self {
            RotationStrategy::Single { .. } => u32::MAX,
            RotationStrategy::RoundRobin { quota, .. } => *quota,
        }
    }

    /// Build a strategy from a kind name and a comma separated instance list
    pub fn parse(kind: &str, instances: &str, quota: Option<u32>) -> SharedResult<Self> {
        let instances: Vec<String> = instances
            .split(',')
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .collect();

        match kind.trim().to_lowercase().as_str() {
            "single" => match instances.as_slice() {
                [instance] => Ok(Self::single(instance.clone())),
                _ => Err(SharedError::InvalidConfig {
                    field: "instances".to_string(),
                    value: format!("single strategy needs exactly one instance, got {}", instances.len()),
                }),
            },
            "roundrobin" | "round-robin" | "round_robin" => {
                if instances.is_empty() {
                    return Err(SharedError::InvalidConfig {
                        field: "instances".to_string(),
                        value: "roundrobin strategy needs at least one instance".to_string(),
                    });
                }
                Ok(Self::round_robin(instances, quota.unwrap_or(DEFAULT_INSTANCE_QUOTA)))
            }
            _ => Err(SharedError::UnknownStrategy { input: kind.to_string() }),
        }
    }
}

/// Pipeline stage an event belongs to, used to tag progress logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Intake,
    Scheduler,
    Checker,
    Aggregator,
    Output,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Intake => write!(f, "intake"),
            Stage::Scheduler => write!(f, "scheduler"),
            Stage::Checker => write!(f, "checker"),
            Stage::Aggregator => write!(f, "aggregator"),
            Stage::Output => write!(f, "output"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_trims_and_rejects_empty() {
        let id = Identifier::new("  alice@mastodon.social \n").unwrap();
        assert_eq!(id.as_str(), "alice@mastodon.social");

        assert!(Identifier::new("   ").is_err());
        assert!(Identifier::new("").is_err());
    }

    #[test]
    fn test_direction_parsing() {
        assert_eq!("m2b".parse::<Direction>().unwrap(), Direction::MastodonToBluesky);
        assert_eq!("Bluesky-To-Mastodon".parse::<Direction>().unwrap(), Direction::BlueskyToMastodon);
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn test_rotation_strategy_parse() {
        let strategy = RotationStrategy::parse("roundrobin", "https://a.example/, https://b.example", None).unwrap();
        assert_eq!(
            strategy,
            RotationStrategy::round_robin(
                vec!["https://a.example".to_string(), "https://b.example".to_string()],
                DEFAULT_INSTANCE_QUOTA
            )
        );

        let single = RotationStrategy::parse("single", "https://a.example", Some(5)).unwrap();
        assert_eq!(single.instances(), vec!["https://a.example".to_string()]);
        assert_eq!(single.quota(), u32::MAX);

        assert!(RotationStrategy::parse("single", "https://a.example,https://b.example", None).is_err());
        assert!(RotationStrategy::parse("roundrobin", " , ", None).is_err());
        assert!(RotationStrategy::parse("weighted", "https://a.example", None).is_err());
    }
}
