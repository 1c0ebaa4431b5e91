use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("config file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Upper bound on dividend holding periods and windows, in days
pub const MAX_DIVIDEND_DAYS: i64 = 3650;

/// Ledger settings. Every field has a default, so a config file only needs
/// to name what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Currency assumed when an import row or broker order has none
    pub default_currency: String,
    pub processor: ProcessorConfig,
    pub sync: SyncConfig,
    pub dividends: DividendConfig,
    pub csv: CsvConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            default_currency: "USD".to_string(),
            processor: ProcessorConfig::default(),
            sync: SyncConfig::default(),
            dividends: DividendConfig::default(),
            csv: CsvConfig::default(),
        }
    }
}

impl LedgerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let reader = BufReader::new(File::open(path)?);
        let config: LedgerConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_currency.trim().is_empty() {
            return Err(ConfigError::Invalid("default_currency is empty".into()));
        }
        if self.processor.max_append_retries == 0 {
            return Err(ConfigError::Invalid(
                "processor.max_append_retries must be at least 1".into(),
            ));
        }
        if self.sync.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "sync.max_attempts must be at least 1".into(),
            ));
        }
        if self.dividends.min_holding_days < 0 || self.dividends.window_days < 0 {
            return Err(ConfigError::Invalid(
                "dividend holding periods must not be negative".into(),
            ));
        }
        if self.dividends.min_holding_days > MAX_DIVIDEND_DAYS
            || self.dividends.window_days > MAX_DIVIDEND_DAYS
        {
            return Err(ConfigError::Invalid(format!(
                "dividend holding periods must not exceed {} days",
                MAX_DIVIDEND_DAYS
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Attempts at an optimistic append before giving up on a command
    pub max_append_retries: u32,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        ProcessorConfig {
            max_append_retries: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Broker fetch attempts per sync run
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            max_attempts: 3,
            initial_backoff_ms: 500,
            backoff_multiplier: 2,
        }
    }
}

impl SyncConfig {
    /// Delay before retry number `retry` (1-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = u64::from(self.backoff_multiplier).saturating_pow(retry.saturating_sub(1));
        Duration::from_millis(self.initial_backoff_ms.saturating_mul(factor))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DividendConfig {
    /// Days the position must be held inside the window to qualify
    pub min_holding_days: i64,
    /// Days either side of the dividend date forming the window
    pub window_days: i64,
}

impl Default for DividendConfig {
    fn default() -> Self {
        DividendConfig {
            min_holding_days: 61,
            window_days: 60,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvConfig {
    /// chrono format tried before the built-in date formats
    pub date_format: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: LedgerConfig =
            serde_json::from_str(r#"{ "dividends": { "min_holding_days": 91 } }"#).unwrap();
        assert_eq!(config.dividends.min_holding_days, 91);
        assert_eq!(config.dividends.window_days, 60);
        assert_eq!(config.sync.max_attempts, 3);
        assert_eq!(config.default_currency, "USD");
        config.validate().unwrap();
    }

    #[test]
    fn zero_attempts_rejected() {
        let mut config = LedgerConfig::default();
        config.sync.max_attempts = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn oversized_dividend_window_rejected() {
        let mut config = LedgerConfig::default();
        config.dividends.window_days = i64::MAX;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = LedgerConfig::default();
        config.dividends.min_holding_days = MAX_DIVIDEND_DAYS + 1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.dividends.min_holding_days = MAX_DIVIDEND_DAYS;
        config.validate().unwrap();
    }

    #[test]
    fn backoff_grows_exponentially() {
        let sync = SyncConfig {
            max_attempts: 3,
            initial_backoff_ms: 100,
            backoff_multiplier: 2,
        };
        assert_eq!(sync.backoff(1), Duration::from_millis(100));
        assert_eq!(sync.backoff(2), Duration::from_millis(200));
        assert_eq!(sync.backoff(3), Duration::from_millis(400));
    }
}
