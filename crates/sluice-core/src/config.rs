//! Engine configuration.
//!
//! [`SluiceConfig`] carries defaults for every field and can be layered from
//! an optional file (TOML, JSON or YAML, by extension) and `SLUICE__*`
//! environment variables, e.g. `SLUICE__GAUGE__TOKENLESS_PRODUCTION=50`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_REWARD_TOKENS, SCALE, TOKENLESS_PRODUCTION, WEEK, YEAR};
use crate::error::ConfigError;

/// Working-balance and reward-token parameters for a gauge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaugeConfig {
    /// Percentage of raw balance credited without voting power.
    pub tokenless_production: u64,
    /// Maximum number of secondary reward tokens registered at once.
    pub max_reward_tokens: usize,
    /// Linear period used when a token is registered without one.
    pub default_reward_period: u64,
}

impl Default for GaugeConfig {
    fn default() -> Self {
        Self {
            tokenless_production: TOKENLESS_PRODUCTION as u64,
            max_reward_tokens: MAX_REWARD_TOKENS,
            default_reward_period: WEEK,
        }
    }
}

impl GaugeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tokenless_production > 100 {
            return Err(ConfigError::Invalid(format!(
                "tokenless_production {} exceeds 100",
                self.tokenless_production
            )));
        }
        if self.max_reward_tokens == 0 {
            return Err(ConfigError::Invalid("max_reward_tokens must be positive".into()));
        }
        Ok(())
    }
}

/// Parameters of the [`HalvingSchedule`](crate::schedule::HalvingSchedule).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InflationConfig {
    /// Mint rate (base units per second) during the first epoch.
    pub initial_rate: u64,
    /// Timestamp at which minting starts.
    pub start_time: u64,
    /// Length of one epoch in seconds.
    pub epoch_length: u64,
    /// Rate divisor applied at each boundary, scaled by `SCALE` (2·SCALE halves).
    pub reduction_coefficient: u64,
}

impl Default for InflationConfig {
    fn default() -> Self {
        Self {
            initial_rate: 8_000_000_000_000_000_000,
            start_time: 0,
            epoch_length: YEAR,
            reduction_coefficient: (2 * SCALE) as u64,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SluiceConfig {
    pub gauge: GaugeConfig,
    pub inflation: InflationConfig,
    /// Log level filter string (e.g. "info", "sluice_gauge=debug").
    pub log_level: String,
    /// "text" or "json".
    pub log_format: String,
}

impl Default for SluiceConfig {
    fn default() -> Self {
        Self {
            gauge: GaugeConfig::default(),
            inflation: InflationConfig::default(),
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

impl SluiceConfig {
    /// Load defaults, then `path` (if given), then `SLUICE__*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("SLUICE")
                .prefix_separator("__")
                .separator("__"),
        );

        let cfg: SluiceConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        cfg.gauge.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let cfg = SluiceConfig::default();
        assert_eq!(cfg.gauge.tokenless_production, 40);
        assert_eq!(cfg.gauge.max_reward_tokens, 8);
        assert_eq!(cfg.gauge.default_reward_period, WEEK);
        assert_eq!(cfg.inflation.reduction_coefficient as u128, 2 * SCALE);
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn load_without_file_yields_defaults() {
        let cfg = SluiceConfig::load(None).unwrap();
        assert_eq!(cfg.gauge, GaugeConfig::default());
    }

    #[test]
    fn load_toml_overrides_fields() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "log_level = \"debug\"\n[gauge]\ntokenless_production = 50\n[inflation]\nepoch_length = 86400"
        )
        .unwrap();

        let cfg = SluiceConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.gauge.tokenless_production, 50);
        assert_eq!(cfg.gauge.max_reward_tokens, 8);
        assert_eq!(cfg.inflation.epoch_length, 86_400);
    }

    #[test]
    fn load_rejects_invalid_gauge_config() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[gauge]\ntokenless_production = 120").unwrap();
        let err = SluiceConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn load_missing_file_fails() {
        let err = SluiceConfig::load(Some(Path::new("/nonexistent/sluice.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn validate_zero_reward_tokens() {
        let cfg = GaugeConfig {
            max_reward_tokens: 0,
            ..GaugeConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
