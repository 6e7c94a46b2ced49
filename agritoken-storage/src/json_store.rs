//! JSON-file backed stores.
//!
//! Each store keeps its full record set in one JSON array on disk, the
//! layout the platform has always used. Loads run every raw record through
//! the record normalizer, so files written by any historical schema version
//! read cleanly; saves write the canonical schema to a temp file and rename
//! it into place, so a crash mid-write leaves the previous snapshot intact.

use crate::storage_traits::{FarmStore, HoldingsStore};
use agritoken_core::error::PlatformError;
use agritoken_core::farm::FarmRecord;
use agritoken_core::holding::Holding;
use agritoken_core::id::FarmId;
use agritoken_core::normalize::{normalize_farm, normalize_holding, RawRecord};
use log::info;
use serde::Serialize;
use serde_json::Value;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

fn poisoned(what: &str) -> PlatformError {
    PlatformError::Other(format!("{} store mutex poisoned", what))
}

/// Read a JSON array of raw records from `path`, or an empty list when the
/// file does not exist yet.
fn read_raw_records(path: &Path) -> Result<Vec<RawRecord>, PlatformError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(path)?;
    let values: Vec<Value> = serde_json::from_str(&text)?;
    let mut records = Vec::with_capacity(values.len());
    for value in values {
        match value {
            Value::Object(map) => records.push(map),
            other => {
                return Err(PlatformError::Serialization(format!(
                    "expected a JSON object in {}, got {}",
                    path.display(),
                    other
                )))
            }
        }
    }
    Ok(records)
}

/// Write `records` as pretty-printed JSON via temp-file-and-rename.
fn persist<T: Serialize>(path: &Path, records: &[T]) -> Result<(), PlatformError> {
    let json = serde_json::to_string_pretty(records)?;
    let tmp = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Farm store over one JSON file.
#[derive(Debug)]
pub struct JsonFarmStore {
    path: PathBuf,
    farms: Mutex<Vec<FarmRecord>>,
}

impl JsonFarmStore {
    /// Open (or create) the store at `path`, normalizing every stored
    /// record onto the canonical schema.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PlatformError> {
        let path = path.into();
        let raw = read_raw_records(&path)?;
        let mut farms = Vec::with_capacity(raw.len());
        for record in &raw {
            farms.push(normalize_farm(record)?);
        }
        info!("loaded {} farm records from {}", farms.len(), path.display());
        Ok(JsonFarmStore {
            path,
            farms: Mutex::new(farms),
        })
    }
}

impl FarmStore for JsonFarmStore {
    fn load(&self, farm_id: &FarmId) -> Result<Option<FarmRecord>, PlatformError> {
        let farms = self.farms.lock().map_err(|_| poisoned("farm"))?;
        Ok(farms.iter().find(|f| &f.farm_id == farm_id).cloned())
    }

    fn save(&self, farm: &FarmRecord) -> Result<(), PlatformError> {
        let mut farms = self.farms.lock().map_err(|_| poisoned("farm"))?;
        let mut next = farms.clone();
        match next.iter_mut().find(|f| f.farm_id == farm.farm_id) {
            Some(existing) => *existing = farm.clone(),
            None => next.push(farm.clone()),
        }
        persist(&self.path, &next)?;
        *farms = next;
        Ok(())
    }

    fn delete(&self, farm_id: &FarmId) -> Result<bool, PlatformError> {
        let mut farms = self.farms.lock().map_err(|_| poisoned("farm"))?;
        let mut next = farms.clone();
        let before = next.len();
        next.retain(|f| &f.farm_id != farm_id);
        if next.len() == before {
            return Ok(false);
        }
        persist(&self.path, &next)?;
        *farms = next;
        Ok(true)
    }

    fn list(&self) -> Result<Vec<FarmRecord>, PlatformError> {
        let farms = self.farms.lock().map_err(|_| poisoned("farm"))?;
        Ok(farms.clone())
    }
}

/// Holdings store over one JSON file, global insertion order preserved.
#[derive(Debug)]
pub struct JsonHoldingsStore {
    path: PathBuf,
    holdings: Mutex<Vec<Holding>>,
}

impl JsonHoldingsStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PlatformError> {
        let path = path.into();
        let raw = read_raw_records(&path)?;
        let mut holdings = Vec::with_capacity(raw.len());
        for record in &raw {
            holdings.push(normalize_holding(record)?);
        }
        info!(
            "loaded {} holding records from {}",
            holdings.len(),
            path.display()
        );
        Ok(JsonHoldingsStore {
            path,
            holdings: Mutex::new(holdings),
        })
    }
}

impl HoldingsStore for JsonHoldingsStore {
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
        let mut next: Vec<Holding> = holdings
            .iter()
            .filter(|h| &h.farm_id != farm_id)
            .cloned()
            .collect();
        next.extend(replacement.iter().cloned());
        persist(&self.path, &next)?;
        *holdings = next;
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<Holding>, PlatformError> {
        let holdings = self.holdings.lock().map_err(|_| poisoned("holdings"))?;
        Ok(holdings.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use tempfile::tempdir;

    #[test]
    fn test_farm_store_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("farms.json");

        let store = JsonFarmStore::open(&path).unwrap();
        let farm = FarmRecord::sample_for_tests("farm-1", 25_000);
        store.save(&farm).unwrap();
        drop(store);

        let reopened = JsonFarmStore::open(&path).unwrap();
        let loaded = reopened.load(&FarmId::new("farm-1")).unwrap().unwrap();
        assert_eq!(loaded, farm);
    }

    #[test]
    fn test_legacy_schema_loads_through_normalizer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("farms.json");
        fs::write(
            &path,
            r#"[{
                "id": 1,
                "Farm Name": "Langs Farm",
                "Farm Email": "langs@example.com",
                "Number of Tokens": "25000",
                "Price per Token (USD)": 12.5,
                "ASA ID": 789123456
            }]"#,
        )
        .unwrap();

        let store = JsonFarmStore::open(&path).unwrap();
        let farm = store.load(&FarmId::new("1")).unwrap().unwrap();
        assert_eq!(farm.farm_name, "Langs Farm");
        assert_eq!(farm.total_tokens, 25_000);
        assert_eq!(farm.price_per_token, Decimal::new(125, 1));
        assert!(farm.asset_ref.is_some());

        // the next save rewrites the file in canonical form
        store.save(&farm).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"farmName\""));
        assert!(!text.contains("\"Farm Name\""));
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("farms.json");
        let store = JsonFarmStore::open(&path).unwrap();
        store
            .save(&FarmRecord::sample_for_tests("farm-1", 100))
            .unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_holdings_save_all_replaces_one_farm_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("holdings.json");
        let store = JsonHoldingsStore::open(&path).unwrap();

        store
            .save_all(
                &FarmId::new("farm-1"),
                &[
                    Holding::sample_for_tests("h-1", "farm-1", 100),
                    Holding::sample_for_tests("h-2", "farm-1", 250),
                ],
            )
            .unwrap();
        store
            .save_all(
                &FarmId::new("farm-2"),
                &[Holding::sample_for_tests("h-3", "farm-2", 5)],
            )
            .unwrap();

        // shrink farm-1's set; farm-2 must be untouched
        store
            .save_all(
                &FarmId::new("farm-1"),
                &[Holding::sample_for_tests("h-1", "farm-1", 100)],
            )
            .unwrap();

        let reopened = JsonHoldingsStore::open(&path).unwrap();
        assert_eq!(reopened.load(&FarmId::new("farm-1")).unwrap().len(), 1);
        assert_eq!(reopened.load(&FarmId::new("farm-2")).unwrap().len(), 1);
    }

    #[test]
    fn test_unreadable_record_is_an_error_not_a_skip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("farms.json");
        fs::write(
            &path,
            r#"[{"Farm Name": "X", "Farm Email": "x@y.z", "Number of Tokens": "NaN", "pricePerToken": 1, "id": 7}]"#,
        )
        .unwrap();

        let err = JsonFarmStore::open(&path).unwrap_err();
        assert!(matches!(err, PlatformError::Normalization { .. }));
    }
}
