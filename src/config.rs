//! Engine configuration.
//!
//! Defaults are overridden first by an optional config file (format picked
//! from its extension), then by `CAMPAIGN_PULSE__*` environment variables,
//! e.g. `CAMPAIGN_PULSE__SCORING__TARGET_ROAS=5.5` or
//! `CAMPAIGN_PULSE__PLATFORMS=Facebook,Google`.

use std::path::Path;
use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::score::ScoringConfig;

pub const ENV_PREFIX: &str = "CAMPAIGN_PULSE";

/// Keys whose environment values are comma-separated lists.
const LIST_KEYS: [&str; 2] = ["platforms", "scoring.monthly_revenue_targets"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scoring: ScoringConfig,
    /// Per-call budget for the metric source, in seconds.
    pub query_timeout_secs: u64,
    /// Platforms that get their own dashboard section.
    pub platforms: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringConfig::default(),
            query_timeout_secs: 30,
            platforms: vec!["Facebook".to_string(), "Google".to_string()],
        }
    }
}

impl EngineConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        Self::layer(builder, environment())
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    fn layer(
        builder: ConfigBuilder<DefaultState>,
        env: Environment,
    ) -> Result<Self, ConfigError> {
        builder.add_source(env).build()?.try_deserialize()
    }
}

fn environment() -> Environment {
    LIST_KEYS.into_iter().fold(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .list_separator(","),
        |env, key| env.with_list_parse_key(key),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        environment().source(Some(map))
    }

    fn json(raw: &str) -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(raw, FileFormat::Json))
    }

    #[test]
    fn no_sources_gives_defaults() {
        let config = EngineConfig::layer(Config::builder(), env(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = EngineConfig::layer(
            json(r#"{"scoring": {"target_roas": 5.0, "trend_bands": {"stable_pct": 3.0}}}"#),
            env(&[]),
        )
        .unwrap();
        assert_eq!(config.scoring.target_roas, 5.0);
        assert_eq!(config.scoring.trend_bands.stable_pct, 3.0);
        assert_eq!(config.scoring.trend_bands.volatile_pct, 25.0);
        assert_eq!(config.scoring.benchmark_roas, 4.0);
        assert_eq!(config.query_timeout_secs, 30);
        assert_eq!(config.scoring.health_bands.excellent, 80);
    }

    #[test]
    fn env_overrides_apply() {
        let config = EngineConfig::layer(
            json(r#"{"query_timeout_secs": 10, "scoring": {"target_roas": 5.0}}"#),
            env(&[
                ("CAMPAIGN_PULSE__QUERY_TIMEOUT_SECS", "5"),
                ("CAMPAIGN_PULSE__SCORING__TARGET_ROAS", "7.5"),
                ("CAMPAIGN_PULSE__PLATFORMS", "Facebook,Google,Email"),
                ("CAMPAIGN_PULSE__SCORING__MONTHLY_REVENUE_TARGETS", "1000,2000"),
            ]),
        )
        .unwrap();
        assert_eq!(config.query_timeout(), Duration::from_secs(5));
        assert_eq!(config.scoring.target_roas, 7.5);
        assert_eq!(config.platforms, vec!["Facebook", "Google", "Email"]);
        assert_eq!(config.scoring.monthly_revenue_targets, vec![1000.0, 2000.0]);
    }

    #[test]
    fn unprefixed_env_is_ignored() {
        let config =
            EngineConfig::layer(Config::builder(), env(&[("QUERY_TIMEOUT_SECS", "5")])).unwrap();
        assert_eq!(config.query_timeout_secs, 30);
    }

    #[test]
    fn bad_env_value_is_rejected() {
        let result = EngineConfig::layer(
            Config::builder(),
            env(&[("CAMPAIGN_PULSE__SCORING__TARGET_ROAS", "lots")]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(EngineConfig::load(Some(Path::new("/nonexistent/campaign-pulse.json"))).is_err());
    }
}
