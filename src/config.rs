//! Engine configuration with validation and defaults.

use crate::errors::{HousieError, HousieResult};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Top-level engine configuration.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    pub storage: StorageConfig,
    pub game: GameConfig,
}

/// Storage layer settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the RocksDB database.
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data/housie".to_string(),
        }
    }
}

/// Game defaults and retry bounds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameConfig {
    /// Currency applied when a new game does not specify one.
    pub default_currency: String,
    /// Rake applied when a new game does not specify one, in percent.
    pub default_rake_percentage: Decimal,
    /// Random probe attempts at an uncalled number before the draw falls
    /// back to choosing uniformly from the remaining complement.
    pub draw_max_attempts: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            default_currency: "DEGEN".to_string(),
            default_rake_percentage: dec!(10.00),
            draw_max_attempts: 200,
        }
    }
}

impl EngineConfig {
    /// Validates field ranges before the engine starts.
    pub fn validate(&self) -> HousieResult<()> {
        if self.storage.data_dir.is_empty() {
            return Err(HousieError::Validation(
                "storage.data_dir must not be empty".to_string(),
            ));
        }
        if self.game.default_rake_percentage < Decimal::ZERO
            || self.game.default_rake_percentage > dec!(100)
        {
            return Err(HousieError::Validation(format!(
                "game.default_rake_percentage {} outside [0, 100]",
                self.game.default_rake_percentage
            )));
        }
        if self.game.draw_max_attempts == 0 {
            return Err(HousieError::Validation(
                "game.draw_max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn out_of_range_rake_is_rejected() {
        let mut config = EngineConfig::default();
        config.game.default_rake_percentage = dec!(101);
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_draw_bound_is_rejected() {
        let mut config = EngineConfig::default();
        config.game.draw_max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
