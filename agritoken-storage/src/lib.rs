pub mod journal;
pub mod json_store;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod storage_traits;

// Re-export the main types for convenience
pub use journal::{PayoutEventRecord, PayoutJournal};
pub use json_store::{JsonFarmStore, JsonHoldingsStore};
pub use memory::{MemoryFarmStore, MemoryHoldingsStore};
#[cfg(feature = "sqlite")]
pub use sqlite::{open_sqlite_stores, SqliteFarmStore, SqliteHoldingsStore};
pub use storage_traits::{FarmStore, HoldingsStore};
