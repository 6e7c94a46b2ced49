pub mod error;
pub mod farm;
pub mod holding;
pub mod id;
pub mod locks;
pub mod normalize;
pub mod payout;

// Re-export the main types for convenience
pub use error::PlatformError;
pub use farm::{FarmRecord, FarmStatus};
pub use holding::Holding;
pub use id::{AssetRef, FarmId, HoldingId, TxRef};
pub use locks::FarmLockRegistry;
pub use normalize::{normalize, NormalizedRecord, RawRecord};
pub use payout::{allocate, PayoutReport, PayoutShare};
