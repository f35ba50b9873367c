//! Configuration Loader
//!
//! Loads and validates configuration from TOML files. Every threshold
//! the pipeline, state machine, evaluator, and scorer use is a tunable
//! here - nothing is hardcoded at the call sites. Missing sections and
//! fields fall back to the documented defaults so an empty file is a
//! valid config.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::alert::AlertPolicy;
use crate::domain::filter::FilterConfig;
use crate::domain::outcome::OutcomeConfig;
use crate::domain::wallet_score::ScorerConfig;

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub filters: FiltersSection,
    #[serde(default)]
    pub correlation: CorrelationSection,
    #[serde(default)]
    pub outcome: OutcomeSection,
    #[serde(default)]
    pub scoring: ScoringSection,
    #[serde(default)]
    pub persistence: PersistenceSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Filter pipeline thresholds (`[filters]`)
#[derive(Debug, Clone, Deserialize)]
pub struct FiltersSection {
    /// Minimum pool liquidity in USD
    #[serde(default = "default_min_liquidity_usd")]
    pub min_liquidity_usd: f64,

    /// Minimum purchase value in USD - below this is dust/airdrop
    #[serde(default = "default_min_buy_value_usd")]
    pub min_buy_value_usd: f64,

    /// Minimum 24h volume in USD
    #[serde(default = "default_min_volume_24h_usd")]
    pub min_volume_24h_usd: f64,

    /// Minimum 24h trade count (buys + sells)
    #[serde(default = "default_min_trade_count_24h")]
    pub min_trade_count_24h: u64,

    /// Maximum market cap in USD - larger tokens carry no signal
    #[serde(default = "default_max_market_cap_usd")]
    pub max_market_cap_usd: f64,
}

/// Correlation window and alert decision tuning (`[correlation]`)
#[derive(Debug, Clone, Deserialize)]
pub struct CorrelationSection {
    /// Accumulation window lifetime in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Distinct wallets required for an alert
    #[serde(default = "default_base_threshold")]
    pub base_threshold: u32,

    /// Extra wallets required while a token is under fake-alert escalation
    #[serde(default = "default_blackout_extra_threshold")]
    pub blackout_extra_threshold: u32,

    /// Unconditional threshold increase applied to every token
    #[serde(default)]
    pub global_threshold_boost: u32,

    /// Suppression period after a confirmed alert (seconds)
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Window for the one-shot bullish re-alert (seconds)
    #[serde(default = "default_bullish_window_secs")]
    pub bullish_window_secs: u64,

    /// How long a fake-alert escalation lasts (seconds)
    #[serde(default = "default_escalation_secs")]
    pub escalation_secs: u64,

    /// Cluster weight of a soft-blackout wallet (active wallets weigh 1.0)
    #[serde(default = "default_soft_blackout_weight")]
    pub soft_blackout_weight: f64,

    /// Revalidation fetch attempts at threshold crossing
    #[serde(default = "default_revalidation_retries")]
    pub revalidation_retries: u32,

    /// Backoff between revalidation attempts (milliseconds)
    #[serde(default = "default_revalidation_backoff_ms")]
    pub revalidation_backoff_ms: u64,
}

/// Outcome evaluation thresholds (`[outcome]`)
#[derive(Debug, Clone, Deserialize)]
pub struct OutcomeSection {
    /// Market cap change for the short-list classification (+20% = 0.20)
    #[serde(default = "default_short_list_threshold")]
    pub short_list_threshold: f64,

    /// Market cap change for the contracts-check classification
    #[serde(default = "default_contracts_check_threshold")]
    pub contracts_check_threshold: f64,

    /// Change ceiling under which an alert counts as no upside
    #[serde(default = "default_trash_ceiling")]
    pub trash_ceiling: f64,

    /// Market cap floor below which a token is considered dead
    #[serde(default = "default_dead_token_mcap_usd")]
    pub dead_token_mcap_usd: f64,

    /// Fetch attempts per checkpoint before marking it missed
    #[serde(default = "default_check_retries")]
    pub check_retries: u32,

    /// Backoff between checkpoint fetch attempts (milliseconds)
    #[serde(default = "default_check_backoff_ms")]
    pub check_backoff_ms: u64,
}

/// Wallet scoring policy (`[scoring]`)
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringSection {
    /// Trash ratio at which a wallet enters soft blackout
    #[serde(default = "default_trash_warn_threshold")]
    pub trash_warn_threshold: f64,

    /// Trash ratio at which a wallet is permanently removed
    #[serde(default = "default_trash_remove_threshold")]
    pub trash_remove_threshold: f64,

    /// Minimum outcome samples before either threshold applies
    #[serde(default = "default_min_samples")]
    pub min_samples: u32,
}

/// Snapshot persistence (`[persistence]`)
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceSection {
    /// Data directory for the state snapshot
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl PersistenceSection {
    /// Data dir with environment variable override and `~` expansion.
    /// Checks SENTINEL_DATA_DIR first, falls back to the config value.
    pub fn resolved_data_dir(&self) -> PathBuf {
        let raw = std::env::var("SENTINEL_DATA_DIR")
            .unwrap_or_else(|_| self.data_dir.to_string_lossy().to_string());
        PathBuf::from(shellexpand::tilde(&raw).to_string())
    }
}

/// Logging configuration (`[logging]`)
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_min_liquidity_usd() -> f64 {
    5_000.0
}
fn default_min_buy_value_usd() -> f64 {
    5.0
}
fn default_min_volume_24h_usd() -> f64 {
    10_000.0
}
fn default_min_trade_count_24h() -> u64 {
    15
}
fn default_max_market_cap_usd() -> f64 {
    700_000.0
}
fn default_window_secs() -> u64 {
    20
}
fn default_base_threshold() -> u32 {
    3
}
fn default_blackout_extra_threshold() -> u32 {
    1
}
fn default_cooldown_secs() -> u64 {
    300 // 5 minutes
}
fn default_bullish_window_secs() -> u64 {
    1800 // 30 minutes
}
fn default_escalation_secs() -> u64 {
    3600
}
fn default_soft_blackout_weight() -> f64 {
    0.5
}
fn default_revalidation_retries() -> u32 {
    3
}
fn default_revalidation_backoff_ms() -> u64 {
    500
}
fn default_short_list_threshold() -> f64 {
    0.20
}
fn default_contracts_check_threshold() -> f64 {
    0.50
}
fn default_trash_ceiling() -> f64 {
    0.05
}
fn default_dead_token_mcap_usd() -> f64 {
    20_000.0
}
fn default_check_retries() -> u32 {
    3
}
fn default_check_backoff_ms() -> u64 {
    1_000
}
fn default_trash_warn_threshold() -> f64 {
    0.70
}
fn default_trash_remove_threshold() -> f64 {
    0.90
}
fn default_min_samples() -> u32 {
    5
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for FiltersSection {
    fn default() -> Self {
        Self {
            min_liquidity_usd: default_min_liquidity_usd(),
            min_buy_value_usd: default_min_buy_value_usd(),
            min_volume_24h_usd: default_min_volume_24h_usd(),
            min_trade_count_24h: default_min_trade_count_24h(),
            max_market_cap_usd: default_max_market_cap_usd(),
        }
    }
}

impl Default for CorrelationSection {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            base_threshold: default_base_threshold(),
            blackout_extra_threshold: default_blackout_extra_threshold(),
            global_threshold_boost: 0,
            cooldown_secs: default_cooldown_secs(),
            bullish_window_secs: default_bullish_window_secs(),
            escalation_secs: default_escalation_secs(),
            soft_blackout_weight: default_soft_blackout_weight(),
            revalidation_retries: default_revalidation_retries(),
            revalidation_backoff_ms: default_revalidation_backoff_ms(),
        }
    }
}

impl Default for OutcomeSection {
    fn default() -> Self {
        Self {
            short_list_threshold: default_short_list_threshold(),
            contracts_check_threshold: default_contracts_check_threshold(),
            trash_ceiling: default_trash_ceiling(),
            dead_token_mcap_usd: default_dead_token_mcap_usd(),
            check_retries: default_check_retries(),
            check_backoff_ms: default_check_backoff_ms(),
        }
    }
}

impl Default for ScoringSection {
    fn default() -> Self {
        Self {
            trash_warn_threshold: default_trash_warn_threshold(),
            trash_remove_threshold: default_trash_remove_threshold(),
            min_samples: default_min_samples(),
        }
    }
}

impl Default for PersistenceSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.filters.min_liquidity_usd < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "min_liquidity_usd must be >= 0, got {}",
                self.filters.min_liquidity_usd
            )));
        }

        if self.filters.max_market_cap_usd <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "max_market_cap_usd must be > 0, got {}",
                self.filters.max_market_cap_usd
            )));
        }

        if self.correlation.window_secs == 0 {
            return Err(ConfigError::ValidationError(
                "window_secs must be > 0".to_string(),
            ));
        }

        if self.correlation.base_threshold < 2 {
            return Err(ConfigError::ValidationError(format!(
                "base_threshold must be >= 2, got {}",
                self.correlation.base_threshold
            )));
        }

        if self.correlation.cooldown_secs >= self.correlation.bullish_window_secs {
            return Err(ConfigError::ValidationError(format!(
                "cooldown_secs ({}) must be < bullish_window_secs ({})",
                self.correlation.cooldown_secs, self.correlation.bullish_window_secs
            )));
        }

        if self.correlation.soft_blackout_weight <= 0.0
            || self.correlation.soft_blackout_weight > 1.0
        {
            return Err(ConfigError::ValidationError(format!(
                "soft_blackout_weight must be in (0, 1], got {}",
                self.correlation.soft_blackout_weight
            )));
        }

        if self.outcome.short_list_threshold <= 0.0 {
            return Err(ConfigError::ValidationError(
                "short_list_threshold must be > 0".to_string(),
            ));
        }

        if self.outcome.contracts_check_threshold <= self.outcome.short_list_threshold {
            return Err(ConfigError::ValidationError(format!(
                "contracts_check_threshold ({}) must be > short_list_threshold ({})",
                self.outcome.contracts_check_threshold, self.outcome.short_list_threshold
            )));
        }

        if self.outcome.trash_ceiling < 0.0
            || self.outcome.trash_ceiling >= self.outcome.short_list_threshold
        {
            return Err(ConfigError::ValidationError(format!(
                "trash_ceiling must be in [0, short_list_threshold), got {}",
                self.outcome.trash_ceiling
            )));
        }

        if self.scoring.trash_remove_threshold <= self.scoring.trash_warn_threshold {
            return Err(ConfigError::ValidationError(format!(
                "trash_remove_threshold ({}) must be > trash_warn_threshold ({})",
                self.scoring.trash_remove_threshold, self.scoring.trash_warn_threshold
            )));
        }

        if self.scoring.trash_remove_threshold > 1.0 || self.scoring.trash_warn_threshold <= 0.0 {
            return Err(ConfigError::ValidationError(
                "scoring thresholds must be in (0, 1]".to_string(),
            ));
        }

        if self.scoring.min_samples == 0 {
            return Err(ConfigError::ValidationError(
                "min_samples must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Filter pipeline view of the config
    pub fn filter_config(&self) -> FilterConfig {
        FilterConfig {
            min_liquidity_usd: self.filters.min_liquidity_usd,
            min_buy_value_usd: self.filters.min_buy_value_usd,
            min_volume_24h_usd: self.filters.min_volume_24h_usd,
            min_trade_count_24h: self.filters.min_trade_count_24h,
            max_market_cap_usd: self.filters.max_market_cap_usd,
        }
    }

    /// Alert decision view of the config
    pub fn alert_policy(&self) -> AlertPolicy {
        AlertPolicy {
            base_threshold: self.correlation.base_threshold,
            blackout_extra_threshold: self.correlation.blackout_extra_threshold,
            global_threshold_boost: self.correlation.global_threshold_boost,
            cooldown_secs: self.correlation.cooldown_secs,
            bullish_window_secs: self.correlation.bullish_window_secs,
            escalation_secs: self.correlation.escalation_secs,
        }
    }

    /// Outcome evaluation view of the config
    pub fn outcome_config(&self) -> OutcomeConfig {
        OutcomeConfig {
            short_list_threshold: self.outcome.short_list_threshold,
            contracts_check_threshold: self.outcome.contracts_check_threshold,
            trash_ceiling: self.outcome.trash_ceiling,
            dead_token_mcap_usd: self.outcome.dead_token_mcap_usd,
            check_retries: self.outcome.check_retries,
        }
    }

    /// Wallet scoring view of the config
    pub fn scorer_config(&self) -> ScorerConfig {
        ScorerConfig {
            trash_warn_threshold: self.scoring.trash_warn_threshold,
            trash_remove_threshold: self.scoring.trash_remove_threshold,
            min_samples: self.scoring.min_samples,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.filters.min_liquidity_usd, 5_000.0);
        assert_eq!(config.correlation.window_secs, 20);
        assert_eq!(config.correlation.base_threshold, 3);
        assert_eq!(config.correlation.cooldown_secs, 300);
        assert_eq!(config.outcome.short_list_threshold, 0.20);
        assert_eq!(config.scoring.min_samples, 5);
    }

    #[test]
    fn test_partial_config_overrides() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            br#"
[filters]
max_market_cap_usd = 500000.0

[correlation]
base_threshold = 4
"#,
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.filters.max_market_cap_usd, 500_000.0);
        assert_eq!(config.correlation.base_threshold, 4);
        // Untouched fields keep defaults
        assert_eq!(config.filters.min_buy_value_usd, 5.0);
        assert_eq!(config.correlation.cooldown_secs, 300);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            br#"
[correlation]
base_threshold = 1
"#,
        )
        .unwrap();

        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_cooldown_must_be_inside_bullish_window() {
        let mut config = Config::default();
        config.correlation.cooldown_secs = 2_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_outcome_threshold_ordering() {
        let mut config = Config::default();
        config.outcome.contracts_check_threshold = 0.10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_scoring_threshold_ordering() {
        let mut config = Config::default();
        config.scoring.trash_warn_threshold = 0.95;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_soft_blackout_weight_range() {
        let mut config = Config::default();
        config.correlation.soft_blackout_weight = 0.0;
        assert!(config.validate().is_err());
        config.correlation.soft_blackout_weight = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unparseable_toml_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[filters\nmin_liquidity_usd = ").unwrap();
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_config_views() {
        let config = Config::default();
        let filter = config.filter_config();
        assert_eq!(filter.max_market_cap_usd, 700_000.0);
        let policy = config.alert_policy();
        assert_eq!(policy.base_threshold, 3);
        assert_eq!(policy.cooldown_secs, 300);
        let outcome = config.outcome_config();
        assert_eq!(outcome.dead_token_mcap_usd, 20_000.0);
        let scorer = config.scorer_config();
        assert_eq!(scorer.min_samples, 5);
    }
}
