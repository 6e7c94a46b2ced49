use crate::storage_traits::{FarmStore, HoldingsStore};
use agritoken_core::error::PlatformError;
use agritoken_core::farm::FarmRecord;
use agritoken_core::holding::Holding;
use agritoken_core::id::FarmId;
use std::sync::Mutex;

fn poisoned(what: &str) -> PlatformError {
    PlatformError::Other(format!("{} store mutex poisoned", what))
}

/// In-memory farm store. Used by tests and by callers that layer their own
/// durability; the same trait contract as the file and SQLite stores.
#[derive(Debug, Default)]
pub struct MemoryFarmStore {
    farms: Mutex<Vec<FarmRecord>>,
}

impl MemoryFarmStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FarmStore for MemoryFarmStore {
    fn load(&self, farm_id: &FarmId) -> Result<Option<FarmRecord>, PlatformError> {
        let farms = self.farms.lock().map_err(|_| poisoned("farm"))?;
        Ok(farms.iter().find(|f| &f.farm_id == farm_id).cloned())
    }

    fn save(&self, farm: &FarmRecord) -> Result<(), PlatformError> {
        let mut farms = self.farms.lock().map_err(|_| poisoned("farm"))?;
        match farms.iter_mut().find(|f| f.farm_id == farm.farm_id) {
            Some(existing) => *existing = farm.clone(),
            None => farms.push(farm.clone()),
        }
        Ok(())
    }

    fn delete(&self, farm_id: &FarmId) -> Result<bool, PlatformError> {
        let mut farms = self.farms.lock().map_err(|_| poisoned("farm"))?;
        let before = farms.len();
        farms.retain(|f| &f.farm_id != farm_id);
        Ok(farms.len() < before)
    }

    fn list(&self) -> Result<Vec<FarmRecord>, PlatformError> {
        let farms = self.farms.lock().map_err(|_| poisoned("farm"))?;
        Ok(farms.clone())
    }
}

/// In-memory holdings store, keeping global insertion order.
#[derive(Debug, Default)]
pub struct MemoryHoldingsStore {
    holdings: Mutex<Vec<Holding>>,
}

impl MemoryHoldingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HoldingsStore for MemoryHoldingsStore {
    fn load(&self, farm_id: &FarmId) -> Result<Vec<Holding>, PlatformError> {
        let holdings = self.holdings.lock().map_err(|_| poisoned("holdings"))?;
        Ok(holdings
            .iter()
            .filter(|h| &h.farm_id == farm_id)
            .cloned()
            .collect())
    }

    fn save_all(&self, farm_id: &FarmId, replacement: &[Holding]) -> Result<(), PlatformError> {
        let mut holdings = self.holdings.lock().map_err(|_| poisoned("holdings"))?;
        holdings.retain(|h| &h.farm_id != farm_id);
        holdings.extend(replacement.iter().cloned());
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<Holding>, PlatformError> {
        let holdings = self.holdings.lock().map_err(|_| poisoned("holdings"))?;
        Ok(holdings.clone())
    }
}
