//! Checker configuration
//!
//! Layers, lowest to highest: defaults, optional JSON file, `CHECKER_*`
//! environment variables, command line flags (applied by the binary).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared::{Direction, RotationStrategy, SharedError};

use crate::core::classify::MAX_RETRY_WAIT;
use crate::core::RetryPolicy;
use crate::error::{CheckerError, CheckerResult};
use crate::types::{LinkTemplate, SchedulePolicy};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    pub direction: Direction,
    /// Instances to query; `None` means the direction's default instance
    pub rotation: Option<RotationStrategy>,
    /// Profile link template; `None` means the direction's default
    pub link_template: Option<String>,
    pub max_in_flight: usize,
    pub request_spacing_ms: u64,
    pub jitter_ms: u64,
    pub max_attempts: u32,
    pub rate_limit_backoff_ms: u64,
    pub network_backoff_ms: u64,
    pub request_timeout_ms: u64,
    pub exclude_suffixes: Vec<String>,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            direction: Direction::default(),
            rotation: None,
            link_template: None,
            max_in_flight: 10,
            request_spacing_ms: 100,
            jitter_ms: 0,
            max_attempts: 5,
            rate_limit_backoff_ms: 100,
            network_backoff_ms: 1000,
            request_timeout_ms: 10_000,
            exclude_suffixes: Vec::new(),
        }
    }
}

impl CheckerConfig {
    /// Load a JSON config file; missing fields keep their defaults
    pub async fn from_file(path: &Path) -> CheckerResult<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|_| CheckerError::FileError {
            operation: "read_config".to_string(),
            path: path.display().to_string(),
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Overlay `CHECKER_*` variables from the process environment
    pub fn apply_env(&mut self) -> CheckerResult<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay `CHECKER_*` variables read through `lookup`
    pub fn apply_env_from<F>(&mut self, lookup: F) -> CheckerResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(direction) = lookup("CHECKER_DIRECTION") {
            self.direction = direction.parse()?;
        }
        if let Some(template) = lookup("CHECKER_LINK_TEMPLATE") {
            self.link_template = Some(template);
        }
        if let Some(value) = lookup("CHECKER_CONCURRENCY") {
            self.max_in_flight = parse_number("CHECKER_CONCURRENCY", &value)?;
        }
        if let Some(value) = lookup("CHECKER_SPACING_MS") {
            self.request_spacing_ms = parse_number("CHECKER_SPACING_MS", &value)?;
        }
        if let Some(value) = lookup("CHECKER_JITTER_MS") {
            self.jitter_ms = parse_number("CHECKER_JITTER_MS", &value)?;
        }
        if let Some(value) = lookup("CHECKER_MAX_ATTEMPTS") {
            self.max_attempts = parse_number("CHECKER_MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = lookup("CHECKER_RATE_LIMIT_BACKOFF_MS") {
            self.rate_limit_backoff_ms = parse_number("CHECKER_RATE_LIMIT_BACKOFF_MS", &value)?;
        }
        if let Some(value) = lookup("CHECKER_NETWORK_BACKOFF_MS") {
            self.network_backoff_ms = parse_number("CHECKER_NETWORK_BACKOFF_MS", &value)?;
        }
        if let Some(value) = lookup("CHECKER_TIMEOUT_MS") {
            self.request_timeout_ms = parse_number("CHECKER_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = lookup("CHECKER_EXCLUDE") {
            self.exclude_suffixes = value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        let kind = lookup("CHECKER_ROTATION");
        let instances = lookup("CHECKER_INSTANCES");
        if kind.is_some() || instances.is_some() {
            let quota = lookup("CHECKER_QUOTA")
                .map(|value| parse_number("CHECKER_QUOTA", &value))
                .transpose()?;
            self.rotation = Some(RotationStrategy::parse(
                kind.as_deref().unwrap_or("roundrobin"),
                instances.as_deref().unwrap_or(""),
                quota,
            )?);
        }

        Ok(())
    }

    pub fn rotation_strategy(&self) -> RotationStrategy {
        self.rotation
            .clone()
            .unwrap_or_else(|| RotationStrategy::single(self.direction.default_instance()))
    }

    pub fn link_template(&self) -> CheckerResult<LinkTemplate> {
        LinkTemplate::new(
            self.link_template
                .clone()
                .unwrap_or_else(|| self.direction.default_link_template().to_string()),
        )
    }

    pub fn schedule_policy(&self) -> SchedulePolicy {
        SchedulePolicy::bounded(self.max_in_flight)
            .with_spacing(Duration::from_millis(self.request_spacing_ms))
            .with_jitter(Duration::from_millis(self.jitter_ms))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            rate_limit_backoff: Duration::from_millis(self.rate_limit_backoff_ms),
            network_backoff: Duration::from_millis(self.network_backoff_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self) -> CheckerResult<()> {
        if self.max_in_flight == 0 {
            return Err(CheckerError::config("max_in_flight must be at least 1"));
        }
        if self.max_attempts == 0 {
            return Err(CheckerError::config("max_attempts must be at least 1"));
        }
        if self.request_timeout_ms == 0 {
            return Err(CheckerError::config("request_timeout_ms must be greater than zero"));
        }
        let retry = self.retry_policy();
        if retry.rate_limit_backoff > MAX_RETRY_WAIT || retry.network_backoff > MAX_RETRY_WAIT {
            return Err(CheckerError::config(format!(
                "backoffs must not exceed {}s",
                MAX_RETRY_WAIT.as_secs()
            )));
        }

        let rotation = self.rotation_strategy();
        if rotation.instances().iter().any(|i| url::Url::parse(i).is_err()) {
            return Err(CheckerError::config(format!(
                "every instance must be an absolute URL, got {:?}",
                rotation.instances()
            )));
        }
        crate::core::InstanceRotator::new(&rotation)?;

        self.link_template()?;
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, SharedError> {
    value.trim().parse().map_err(|_| SharedError::InvalidConfig {
        field: field.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = CheckerConfig::default();
        config.validate().unwrap();

        assert_eq!(config.schedule_policy().max_in_flight, 10);
        assert_eq!(config.retry_policy().rate_limit_backoff, Duration::from_millis(100));
        assert_eq!(config.retry_policy().network_backoff, Duration::from_secs(1));
        assert_eq!(config.rotation_strategy(), RotationStrategy::single("https://public.api.bsky.app"));
    }

    #[test]
    fn test_env_overlay() {
        let mut config = CheckerConfig::default();
        config
            .apply_env_from(env(&[
                ("CHECKER_DIRECTION", "bluesky-to-mastodon"),
                ("CHECKER_CONCURRENCY", "3"),
                ("CHECKER_INSTANCES", "https://a.example,https://b.example"),
                ("CHECKER_QUOTA", "50"),
                ("CHECKER_EXCLUDE", "@spam.example, @bots.example"),
            ]))
            .unwrap();

        assert_eq!(config.direction, Direction::BlueskyToMastodon);
        assert_eq!(config.max_in_flight, 3);
        assert_eq!(
            config.rotation,
            Some(RotationStrategy::round_robin(
                vec!["https://a.example".to_string(), "https://b.example".to_string()],
                50
            ))
        );
        assert_eq!(config.exclude_suffixes, vec!["@spam.example", "@bots.example"]);
        assert_eq!(
            config.link_template().unwrap().render(&shared::NormalizedTarget::new("x@bsky.brid.gy")),
            "https://mastodon.social/@x@bsky.brid.gy"
        );
    }

    #[test]
    fn test_env_rejects_bad_numbers() {
        let mut config = CheckerConfig::default();
        let err = config.apply_env_from(env(&[("CHECKER_CONCURRENCY", "lots")])).unwrap_err();
        assert!(err.to_string().contains("CHECKER_CONCURRENCY"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = CheckerConfig { max_in_flight: 0, ..CheckerConfig::default() };
        assert!(config.validate().is_err());

        let config = CheckerConfig { link_template: Some("https://bsky.app/".into()), ..CheckerConfig::default() };
        assert!(config.validate().is_err());

        let config = CheckerConfig {
            rotation: Some(RotationStrategy::single("not a url")),
            ..CheckerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = CheckerConfig { network_backoff_ms: u64::MAX, ..CheckerConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_config_partial_fields() {
        let config: CheckerConfig = serde_json::from_str(
            r#"{
                "direction": "bluesky-to-mastodon",
                "rotation": { "type": "round_robin", "instances": ["https://a.example"], "quota": 299 },
                "max_in_flight": 4
            }"#,
        )
        .unwrap();

        assert_eq!(config.direction, Direction::BlueskyToMastodon);
        assert_eq!(config.max_in_flight, 4);
        assert_eq!(config.max_attempts, 5);
        config.validate().unwrap();
    }
}
