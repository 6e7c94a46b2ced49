use agritoken_core::error::PlatformError;
use agritoken_core::farm::FarmRecord;
use agritoken_core::holding::Holding;
use agritoken_core::id::FarmId;

/// Durable keyed storage for farm records.
///
/// The farm store exclusively owns `FarmRecord`; callers mutate a loaded
/// copy and `save` it back. Serialization of concurrent writers for one
/// farm is the caller's responsibility (the runtime's per-farm scope).
pub trait FarmStore: Send + Sync {
    /// Load one farm record by id.
    fn load(&self, farm_id: &FarmId) -> Result<Option<FarmRecord>, PlatformError>;

    /// Insert or replace one farm record durably.
    fn save(&self, farm: &FarmRecord) -> Result<(), PlatformError>;

    /// Remove one farm record. Returns false if it did not exist. This is
    /// the explicit terminal operation; nothing else deletes records.
    fn delete(&self, farm_id: &FarmId) -> Result<bool, PlatformError>;

    /// All farm records, in insertion order.
    fn list(&self) -> Result<Vec<FarmRecord>, PlatformError>;
}

/// Durable storage for holdings, grouped per farm.
pub trait HoldingsStore: Send + Sync {
    /// All holdings for one farm, in insertion order. The ordering is
    /// load-bearing: it is the tie-break for payout residual assignment.
    fn load(&self, farm_id: &FarmId) -> Result<Vec<Holding>, PlatformError>;

    /// Atomically replace the full holding set for one farm. Either every
    /// record in `holdings` is durable afterwards or none is.
    fn save_all(&self, farm_id: &FarmId, holdings: &[Holding]) -> Result<(), PlatformError>;

    /// All holdings across all farms, in insertion order.
    fn load_all(&self) -> Result<Vec<Holding>, PlatformError>;
}
