//! Engine wiring: opens the store, validates configuration and the static
//! pattern table once at startup, and exposes the lifecycle and ledger
//! services over a shared store handle.

use crate::config::EngineConfig;
use crate::errors::HousieResult;
use crate::ledger::PrizeLedger;
use crate::lifecycle::GameLifecycle;
use crate::patterns;
use crate::store::GameStore;
use std::sync::Arc;

pub struct HousieEngine {
    store: Arc<GameStore>,
    lifecycle: GameLifecycle,
    ledger: PrizeLedger,
}

impl HousieEngine {
    /// Builds a ready engine or fails fast on invalid config, an unopenable
    /// store, or a broken pattern table.
    pub fn open(config: EngineConfig) -> HousieResult<Self> {
        config.validate()?;
        patterns::validate_pattern_table()?;

        let store = Arc::new(GameStore::open(&config.storage.data_dir)?);
        tracing::info!(data_dir = %config.storage.data_dir, "Settlement engine ready");

        Ok(Self {
            lifecycle: GameLifecycle::new(Arc::clone(&store), config.game.clone()),
            ledger: PrizeLedger::new(Arc::clone(&store)),
            store,
        })
    }

    pub fn lifecycle(&self) -> &GameLifecycle {
        &self.lifecycle
    }

    pub fn ledger(&self) -> &PrizeLedger {
        &self.ledger
    }

    pub fn store(&self) -> Arc<GameStore> {
        Arc::clone(&self.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_validates_config_first() {
        let mut config = EngineConfig::default();
        config.storage.data_dir = String::new();
        assert!(HousieEngine::open(config).is_err());
    }

    #[test]
    fn open_succeeds_on_fresh_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = EngineConfig::default();
        config.storage.data_dir = dir.path().to_string_lossy().into_owned();
        let engine = HousieEngine::open(config).unwrap();
        assert_eq!(engine.store().tickets_sold(1), 0);
    }
}
