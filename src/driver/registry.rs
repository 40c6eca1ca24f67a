//! Engine type to driver resolution.

use super::MiningDriver;
use crate::error::{MiningError, MiningResult};
use crate::models::MinerType;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Registry statistics
#[derive(Debug, Clone)]
pub struct RegistryStats {
    pub total_drivers: usize,
    pub engines: Vec<String>,
}

/// Drivers keyed by the miner engine type they serve
#[derive(Default)]
pub struct MiningDriverRegistry {
    drivers: DashMap<MinerType, Arc<dyn MiningDriver>>,
}

impl std::fmt::Debug for MiningDriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiningDriverRegistry")
            .field("engines", &self.stats().engines)
            .finish()
    }
}

impl MiningDriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver, replacing any previous driver for the engine type
    pub fn register(&self, engine: MinerType, driver: Arc<dyn MiningDriver>) {
        info!(
            engine = %engine,
            driver = driver.description(),
            "Registered mining driver"
        );
        self.drivers.insert(engine, driver);
    }

    /// Resolve the driver for an engine type
    pub fn resolve(&self, engine: &MinerType) -> MiningResult<Arc<dyn MiningDriver>> {
        match self.drivers.get(engine) {
            Some(driver) => Ok(Arc::clone(driver.value())),
            None => {
                debug!(engine = %engine, "No mining driver registered");
                Err(MiningError::DriverUnavailable {
                    engine: engine.to_string(),
                    reason: "no driver registered for engine type".to_string(),
                })
            }
        }
    }

    pub fn contains(&self, engine: &MinerType) -> bool {
        self.drivers.contains_key(engine)
    }

    pub fn stats(&self) -> RegistryStats {
        let mut engines: Vec<String> = self
            .drivers
            .iter()
            .map(|entry| entry.key().to_string())
            .collect();
        engines.sort();
        RegistryStats {
            total_drivers: engines.len(),
            engines,
        }
    }
}
