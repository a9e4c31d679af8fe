//! Engine configuration.
//!
//! Sensible defaults, optional TOML file, `CARDBANK_*` environment
//! overrides, and validation before the config is handed to the engine.

use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::Rarity;

/// Configuration load/validation failures. These happen at startup, before
/// any request is served, so they live outside the request taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Load(String),

    #[error("failed to parse config file: {0}")]
    Parse(String),

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub pack: PackConfig,
    pub income: IncomeConfig,
    pub sweep: SweepConfig,
}

/// Reward-pack cooldown and sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackConfig {
    /// Minimum seconds between successive pack grants for one player.
    pub cooldown_secs: u64,
    /// Number of cards drawn when the caller does not specify a size.
    pub default_size: u32,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 1800,
            default_size: 5,
        }
    }
}

/// Per-hour passive income by rarity class.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IncomeConfig {
    pub common: u64,
    pub rare: u64,
    pub epic: u64,
    pub legendary: u64,
}

impl Default for IncomeConfig {
    fn default() -> Self {
        Self {
            common: 1,
            rare: 3,
            epic: 8,
            legendary: 25,
        }
    }
}

impl IncomeConfig {
    /// Coins per hour for one unit of the given rarity.
    pub fn rate(&self, rarity: Rarity) -> u64 {
        match rarity {
            Rarity::Common => self.common,
            Rarity::Rare => self.rare,
            Rarity::Epic => self.epic,
            Rarity::Legendary => self.legendary,
        }
    }
}

/// Periodic accrual sweep cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub interval_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self { interval_secs: 300 }
    }
}

/// Loads configuration: defaults, then file, then environment overrides.
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    pub fn load(&self) -> Result<EngineConfig, ConfigError> {
        let mut config = match &self.config_path {
            Some(path) => Self::load_from_file(path)?,
            None => EngineConfig::default(),
        };

        Self::apply_env_overrides(&mut config)?;
        Self::validate(&config)?;

        Ok(config)
    }

    fn load_from_file(path: &str) -> Result<EngineConfig, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Load(format!("{}: {}", path, e)))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn apply_env_overrides(config: &mut EngineConfig) -> Result<(), ConfigError> {
        if let Some(v) = Self::env_u64("CARDBANK_PACK_COOLDOWN_SECS")? {
            config.pack.cooldown_secs = v;
        }
        if let Some(v) = Self::env_u64("CARDBANK_PACK_DEFAULT_SIZE")? {
            config.pack.default_size = v as u32;
        }
        if let Some(v) = Self::env_u64("CARDBANK_SWEEP_INTERVAL_SECS")? {
            config.sweep.interval_secs = v;
        }
        Ok(())
    }

    fn env_u64(key: &'static str) -> Result<Option<u64>, ConfigError> {
        match env::var(key) {
            Ok(raw) => raw
                .parse::<u64>()
                .map(Some)
                .map_err(|_| ConfigError::Invalid {
                    field: key,
                    reason: format!("'{}' is not an unsigned integer", raw),
                }),
            Err(_) => Ok(None),
        }
    }

    fn validate(config: &EngineConfig) -> Result<(), ConfigError> {
        if config.pack.default_size == 0 {
            return Err(ConfigError::Invalid {
                field: "pack.default_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if config.sweep.interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "sweep.interval_secs",
                reason: "must be at least 1 second".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_game_balance() {
        let config = EngineConfig::default();
        assert_eq!(config.pack.cooldown_secs, 1800);
        assert_eq!(config.pack.default_size, 5);
        assert_eq!(config.income.rate(Rarity::Common), 1);
        assert_eq!(config.income.rate(Rarity::Legendary), 25);
        assert_eq!(config.sweep.interval_secs, 300);
    }

    #[test]
    fn loads_partial_toml_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[pack]\ncooldown_secs = 60\n\n[income]\nlegendary = 100\n"
        )
        .unwrap();

        let config = ConfigLoader::new().with_path(file.path()).load().unwrap();
        assert_eq!(config.pack.cooldown_secs, 60);
        assert_eq!(config.pack.default_size, 5); // untouched default
        assert_eq!(config.income.rate(Rarity::Legendary), 100);
        assert_eq!(config.income.rate(Rarity::Rare), 3);
    }

    #[test]
    fn rejects_zero_pack_size() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[pack]\ndefault_size = 0\n").unwrap();

        let err = ConfigLoader::new().with_path(file.path()).load().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field, .. } if field == "pack.default_size"));
    }

    #[test]
    fn rejects_malformed_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "pack = 'not a table'").unwrap();

        let err = ConfigLoader::new().with_path(file.path()).load().unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
