//! Assessment configuration from environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;
use walksafe_core::{CombineRule, DEFAULT_CELL_COUNT};
use walksafe_directions::{DirectionsConfig, DEFAULT_GMAPS_URL};
use walksafe_opendata::{
    AssessmentOptions, CollectorConfig, DeadlinePolicy, OpenDataConfig, RetryPolicy,
    DEFAULT_OPENDATA_URL,
};

#[derive(Debug, Clone)]
pub struct Config {
    pub opendata_url: String,
    pub lights_layer: u32,
    pub sidewalks_layer: u32,
    pub traffic_layer: u32,
    pub gmaps_url: String,
    pub gmaps_api_key: String,
    pub cell_count: usize,
    pub request_timeout: Duration,
    /// Zero disables the collection deadline.
    pub collect_deadline: Duration,
    pub deadline_policy: DeadlinePolicy,
    pub query_retries: u32,
    pub retry_backoff: Duration,
    pub combine_rule: CombineRule,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset or unparsable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            opendata_url: lookup("WALKSAFE_OPENDATA_URL")
                .unwrap_or_else(|| DEFAULT_OPENDATA_URL.to_string()),
            lights_layer: parse_or(&lookup, "WALKSAFE_LIGHTS_LAYER", 19),
            sidewalks_layer: parse_or(&lookup, "WALKSAFE_SIDEWALKS_LAYER", 4),
            traffic_layer: parse_or(&lookup, "WALKSAFE_TRAFFIC_LAYER", 21),
            gmaps_url: lookup("WALKSAFE_GMAPS_URL").unwrap_or_else(|| DEFAULT_GMAPS_URL.to_string()),
            gmaps_api_key: lookup("WALKSAFE_GMAPS_API_KEY").unwrap_or_default(),
            cell_count: parse_or(&lookup, "WALKSAFE_CELL_COUNT", DEFAULT_CELL_COUNT),
            request_timeout: Duration::from_secs(parse_or(&lookup, "WALKSAFE_REQUEST_TIMEOUT_S", 10)),
            collect_deadline: Duration::from_secs(parse_or(
                &lookup,
                "WALKSAFE_COLLECT_DEADLINE_S",
                60,
            )),
            deadline_policy: parse_or(&lookup, "WALKSAFE_DEADLINE_POLICY", DeadlinePolicy::Fail),
            query_retries: parse_or(&lookup, "WALKSAFE_QUERY_RETRIES", 2),
            retry_backoff: Duration::from_millis(parse_or(&lookup, "WALKSAFE_RETRY_BACKOFF_MS", 250)),
            combine_rule: parse_or(&lookup, "WALKSAFE_BOX_RULE", CombineRule::Envelope),
        }
    }

    pub fn opendata(&self) -> OpenDataConfig {
        OpenDataConfig {
            base_url: self.opendata_url.clone(),
            lights_layer: self.lights_layer,
            sidewalks_layer: self.sidewalks_layer,
            traffic_layer: self.traffic_layer,
            request_timeout: self.request_timeout,
        }
    }

    pub fn directions(&self) -> DirectionsConfig {
        DirectionsConfig {
            base_url: self.gmaps_url.clone(),
            api_key: self.gmaps_api_key.clone(),
            request_timeout: self.request_timeout,
        }
    }

    pub fn collector(&self) -> CollectorConfig {
        CollectorConfig {
            deadline: (!self.collect_deadline.is_zero()).then_some(self.collect_deadline),
            deadline_policy: self.deadline_policy,
            retry: RetryPolicy::new(
                self.query_retries,
                self.retry_backoff,
                self.retry_backoff.saturating_mul(16),
            ),
        }
    }

    pub fn assessment(&self) -> AssessmentOptions {
        AssessmentOptions {
            cell_count: self.cell_count,
            combine_rule: self.combine_rule,
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::default();
        assert_eq!(config.opendata_url, DEFAULT_OPENDATA_URL);
        assert_eq!(config.lights_layer, 19);
        assert_eq!(config.sidewalks_layer, 4);
        assert_eq!(config.traffic_layer, 21);
        assert_eq!(config.cell_count, 25);
        assert_eq!(config.deadline_policy, DeadlinePolicy::Fail);
        assert_eq!(config.combine_rule, CombineRule::Envelope);
        assert!(config.gmaps_api_key.is_empty());
        assert_eq!(config.collector().deadline, Some(Duration::from_secs(60)));
        assert_eq!(config.collector().retry.retries, 2);
    }

    #[test]
    fn reads_overrides() {
        let config = config(&[
            ("WALKSAFE_CELL_COUNT", "16"),
            ("WALKSAFE_DEADLINE_POLICY", "partial"),
            ("WALKSAFE_BOX_RULE", "legacy"),
            ("WALKSAFE_LIGHTS_LAYER", " 7 "),
            ("WALKSAFE_GMAPS_API_KEY", "secret"),
            ("WALKSAFE_QUERY_RETRIES", "0"),
        ]);
        assert_eq!(config.cell_count, 16);
        assert_eq!(config.deadline_policy, DeadlinePolicy::Partial);
        assert_eq!(config.combine_rule, CombineRule::LegacyNorthWest);
        assert_eq!(config.opendata().lights_layer, 7);
        assert_eq!(config.directions().api_key, "secret");
        assert_eq!(config.collector().retry.retries, 0);
        assert_eq!(config.assessment().cell_count, 16);
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let config = config(&[
            ("WALKSAFE_CELL_COUNT", "many"),
            ("WALKSAFE_DEADLINE_POLICY", "eventually"),
            ("WALKSAFE_REQUEST_TIMEOUT_S", "-3"),
        ]);
        assert_eq!(config.cell_count, 25);
        assert_eq!(config.deadline_policy, DeadlinePolicy::Fail);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn zero_deadline_disables_it() {
        let config = config(&[("WALKSAFE_COLLECT_DEADLINE_S", "0")]);
        assert_eq!(config.collector().deadline, None);
    }
}
