//! SQLite-backed stores.
//!
//! Records are persisted as canonical JSON documents in per-type tables,
//! with an explicit `seq` column preserving insertion order (the payout
//! tie-break order). All queries run on a shared tokio runtime through
//! `block_on`, keeping the store API synchronous like the file stores.

use crate::storage_traits::{FarmStore, HoldingsStore};
use agritoken_core::error::PlatformError;
use agritoken_core::farm::FarmRecord;
use agritoken_core::holding::Holding;
use agritoken_core::id::FarmId;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use std::sync::Arc;

/// SQL query constants to avoid repetition
mod sql {
    pub const CREATE_FARMS_TABLE: &str = r#"
        CREATE TABLE IF NOT EXISTS farms (
            farm_id TEXT PRIMARY KEY,
            seq INTEGER NOT NULL,
            record TEXT NOT NULL
        );
    "#;

    pub const CREATE_HOLDINGS_TABLE: &str = r#"
        CREATE TABLE IF NOT EXISTS holdings (
            holding_id TEXT PRIMARY KEY,
            farm_id TEXT NOT NULL,
            seq INTEGER NOT NULL,
            record TEXT NOT NULL
        );
    "#;

    pub const CREATE_HOLDINGS_FARM_INDEX: &str =
        "CREATE INDEX IF NOT EXISTS idx_holdings_farm_id ON holdings(farm_id);";

    pub const UPSERT_FARM: &str = r#"
        INSERT INTO farms (farm_id, seq, record)
        VALUES (
            ?,
            COALESCE(
                (SELECT seq FROM farms WHERE farm_id = ?),
                (SELECT COALESCE(MAX(seq), 0) + 1 FROM farms)
            ),
            ?
        )
        ON CONFLICT(farm_id) DO UPDATE SET record = excluded.record
    "#;

    pub const GET_FARM: &str = "SELECT record FROM farms WHERE farm_id = ?";
    pub const DELETE_FARM: &str = "DELETE FROM farms WHERE farm_id = ?";
    pub const LIST_FARMS: &str = "SELECT record FROM farms ORDER BY seq";

    pub const DELETE_FARM_HOLDINGS: &str = "DELETE FROM holdings WHERE farm_id = ?";
    pub const INSERT_HOLDING: &str =
        "INSERT INTO holdings (holding_id, farm_id, seq, record) VALUES (?, ?, ?, ?)";
    pub const GET_FARM_HOLDINGS: &str =
        "SELECT record FROM holdings WHERE farm_id = ? ORDER BY seq";
    pub const LIST_HOLDINGS: &str = "SELECT record FROM holdings ORDER BY farm_id, seq";
}

fn db_err(context: &str, err: sqlx::Error) -> PlatformError {
    PlatformError::Database(format!("{}: {}", context, err))
}

fn row_to_record<T: serde::de::DeserializeOwned>(row: &SqliteRow) -> Result<T, PlatformError> {
    let text: String = row.get("record");
    serde_json::from_str(&text)
        .map_err(|e| PlatformError::Serialization(format!("stored record unreadable: {}", e)))
}

/// Open both stores over one database file, creating the schema if needed.
pub fn open_sqlite_stores(
    path: &Path,
) -> Result<(SqliteFarmStore, SqliteHoldingsStore), PlatformError> {
    let rt = Arc::new(
        tokio::runtime::Runtime::new()
            .map_err(|e| PlatformError::Other(format!("failed to create runtime: {}", e)))?,
    );

    let pool = rt.block_on(async {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| db_err("failed to open database", e))
    })?;

    rt.block_on(async {
        sqlx::query(sql::CREATE_FARMS_TABLE)
            .execute(&pool)
            .await
            .map_err(|e| db_err("failed to create farms table", e))?;
        sqlx::query(sql::CREATE_HOLDINGS_TABLE)
            .execute(&pool)
            .await
            .map_err(|e| db_err("failed to create holdings table", e))?;
        sqlx::query(sql::CREATE_HOLDINGS_FARM_INDEX)
            .execute(&pool)
            .await
            .map_err(|e| db_err("failed to create holdings index", e))?;
        Ok::<(), PlatformError>(())
    })?;

    let farms = SqliteFarmStore {
        pool: pool.clone(),
        rt: rt.clone(),
    };
    let holdings = SqliteHoldingsStore { pool, rt };
    Ok((farms, holdings))
}

/// SQLite-backed farm store
pub struct SqliteFarmStore {
    pool: sqlx::SqlitePool,
    rt: Arc<tokio::runtime::Runtime>,
}

impl FarmStore for SqliteFarmStore {
    fn load(&self, farm_id: &FarmId) -> Result<Option<FarmRecord>, PlatformError> {
        self.rt.block_on(async {
            let row = sqlx::query(sql::GET_FARM)
                .bind(farm_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_err("failed to query farm", e))?;
            match row {
                Some(row) => Ok(Some(row_to_record(&row)?)),
                None => Ok(None),
            }
        })
    }

    fn save(&self, farm: &FarmRecord) -> Result<(), PlatformError> {
        let record = serde_json::to_string(farm)?;
        self.rt.block_on(async {
            sqlx::query(sql::UPSERT_FARM)
                .bind(farm.farm_id.as_str())
                .bind(farm.farm_id.as_str())
                .bind(&record)
                .execute(&self.pool)
                .await
                .map_err(|e| db_err("failed to save farm", e))?;
            Ok(())
        })
    }

    fn delete(&self, farm_id: &FarmId) -> Result<bool, PlatformError> {
        self.rt.block_on(async {
            let result = sqlx::query(sql::DELETE_FARM)
                .bind(farm_id.as_str())
                .execute(&self.pool)
                .await
                .map_err(|e| db_err("failed to delete farm", e))?;
            Ok(result.rows_affected() > 0)
        })
    }

    fn list(&self) -> Result<Vec<FarmRecord>, PlatformError> {
        self.rt.block_on(async {
            let rows = sqlx::query(sql::LIST_FARMS)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| db_err("failed to list farms", e))?;
            rows.iter().map(row_to_record).collect()
        })
    }
}

/// SQLite-backed holdings store
pub struct SqliteHoldingsStore {
    pool: sqlx::SqlitePool,
    rt: Arc<tokio::runtime::Runtime>,
}

impl HoldingsStore for SqliteHoldingsStore {
    fn load(&self, farm_id: &FarmId) -> Result<Vec<Holding>, PlatformError> {
        self.rt.block_on(async {
            let rows = sqlx::query(sql::GET_FARM_HOLDINGS)
                .bind(farm_id.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(|e| db_err("failed to query holdings", e))?;
            rows.iter().map(row_to_record).collect()
        })
    }

    fn save_all(&self, farm_id: &FarmId, replacement: &[Holding]) -> Result<(), PlatformError> {
        // serialize before touching the database so a bad record can't
        // leave a half-replaced set
        let mut records = Vec::with_capacity(replacement.len());
        for holding in replacement {
            records.push(serde_json::to_string(holding)?);
        }

        self.rt.block_on(async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| db_err("failed to begin transaction", e))?;

            sqlx::query(sql::DELETE_FARM_HOLDINGS)
                .bind(farm_id.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| db_err("failed to clear holdings", e))?;

            for (seq, (holding, record)) in replacement.iter().zip(&records).enumerate() {
                sqlx::query(sql::INSERT_HOLDING)
                    .bind(holding.holding_id.as_str())
                    .bind(farm_id.as_str())
                    .bind(seq as i64)
                    .bind(record)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| db_err("failed to insert holding", e))?;
            }

            tx.commit()
                .await
                .map_err(|e| db_err("failed to commit holdings", e))?;
            Ok(())
        })
    }

    fn load_all(&self) -> Result<Vec<Holding>, PlatformError> {
        self.rt.block_on(async {
            let rows = sqlx::query(sql::LIST_HOLDINGS)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| db_err("failed to list holdings", e))?;
            rows.iter().map(row_to_record).collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_farm_round_trip_and_order() {
        let dir = tempdir().unwrap();
        let (farms, _) = open_sqlite_stores(&dir.path().join("agritoken.db")).unwrap();

        farms
            .save(&FarmRecord::sample_for_tests("farm-2", 500))
            .unwrap();
        farms
            .save(&FarmRecord::sample_for_tests("farm-1", 1000))
            .unwrap();

        // updating farm-2 must not move it behind farm-1
        let mut updated = farms.load(&FarmId::new("farm-2")).unwrap().unwrap();
        updated.tokens_sold = 5;
        updated.tokens_available = 495;
        farms.save(&updated).unwrap();

        let listed = farms.list().unwrap();
        let ids: Vec<&str> = listed.iter().map(|f| f.farm_id.as_str()).collect();
        assert_eq!(ids, vec!["farm-2", "farm-1"]);
        assert_eq!(listed[0].tokens_sold, 5);
    }

    #[test]
    fn test_holdings_save_all_is_transactional_per_farm() {
        let dir = tempdir().unwrap();
        let (_, holdings) = open_sqlite_stores(&dir.path().join("agritoken.db")).unwrap();
        let farm = FarmId::new("farm-1");

        holdings
            .save_all(
                &farm,
                &[
                    Holding::sample_for_tests("h-1", "farm-1", 100),
                    Holding::sample_for_tests("h-2", "farm-1", 250),
                ],
            )
            .unwrap();
        holdings
            .save_all(
                &FarmId::new("farm-2"),
                &[Holding::sample_for_tests("h-3", "farm-2", 5)],
            )
            .unwrap();

        let loaded = holdings.load(&farm).unwrap();
        let ids: Vec<&str> = loaded.iter().map(|h| h.holding_id.as_str()).collect();
        assert_eq!(ids, vec!["h-1", "h-2"]);
        assert_eq!(holdings.load_all().unwrap().len(), 3);

        holdings
            .save_all(&farm, &[Holding::sample_for_tests("h-2", "farm-1", 250)])
            .unwrap();
        assert_eq!(holdings.load(&farm).unwrap().len(), 1);
        assert_eq!(holdings.load(&FarmId::new("farm-2")).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_farm_loads_none() {
        let dir = tempdir().unwrap();
        let (farms, _) = open_sqlite_stores(&dir.path().join("agritoken.db")).unwrap();
        assert!(farms.load(&FarmId::new("nope")).unwrap().is_none());
        assert!(!farms.delete(&FarmId::new("nope")).unwrap());
    }
}
