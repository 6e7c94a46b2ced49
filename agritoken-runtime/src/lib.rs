pub mod api;
pub mod asset_ledger;
pub mod holdings_ledger;
pub mod mock_ledger;
pub mod runtime;

// Re-export the main types for convenience
pub use api::{AcquisitionRequest, InvestorSummary, PayoutRequest, PayoutResponse, PlatformStats};
pub use asset_ledger::{AssetLedger, AssetLedgerError, AssetSpec};
pub use holdings_ledger::HoldingsLedger;
pub use mock_ledger::{MockAssetLedger, MockOutcome};
pub use runtime::{PlatformConfig, PlatformRuntime};
