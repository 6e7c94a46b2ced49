//! The on-chain asset ledger, as consumed by the platform.
//!
//! The platform never implements blockchain mechanics; it calls exactly two
//! operations on this boundary and treats both as fallible, possibly slow,
//! network-bound calls. Neither call may be made while holding a farm's
//! lock scope.

use agritoken_core::error::PlatformError;
use agritoken_core::farm::FarmRecord;
use agritoken_core::id::{AssetRef, TxRef};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Outcome classes for asset-ledger calls.
///
/// `Indeterminate` is the important one: the request was submitted but the
/// result never came back, so the asset or transfer may or may not exist
/// on chain. Callers must surface it distinctly and must not retry blindly
/// (`create_asset` is not idempotent).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetLedgerError {
    /// The ledger definitively refused the request
    #[error("asset ledger rejected the request: {0}")]
    Rejected(String),

    /// The ledger could not be reached; nothing was submitted
    #[error("asset ledger unavailable: {0}")]
    Unavailable(String),

    /// Submitted with unknown outcome (e.g. confirmation timeout)
    #[error("asset ledger outcome unknown: {0}")]
    Indeterminate(String),
}

impl From<AssetLedgerError> for PlatformError {
    fn from(err: AssetLedgerError) -> Self {
        match err {
            AssetLedgerError::Indeterminate(msg) => PlatformError::Indeterminate(msg),
            other => PlatformError::ExternalService(other.to_string()),
        }
    }
}

/// Parameters for minting one farm's asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSpec {
    pub asset_name: String,
    pub unit_name: String,
    pub total_supply: u64,
    /// Whole tokens only
    pub decimals: u8,
    /// Addresses with manage/reserve/freeze authority over the asset
    pub controllers: Vec<String>,
}

impl AssetSpec {
    /// Spec for a farm's token at tokenization time.
    pub fn for_farm(farm: &FarmRecord, controllers: Vec<String>) -> Self {
        AssetSpec {
            asset_name: farm.token_name.clone(),
            unit_name: farm.token_unit.clone(),
            total_supply: farm.total_tokens,
            decimals: 0,
            controllers,
        }
    }
}

/// The two operations the platform consumes.
pub trait AssetLedger: Send + Sync {
    /// Mint an asset. Not idempotent: calling twice mints two assets, so
    /// the caller records the returned reference durably before anything
    /// else and never re-invokes for the same farm.
    fn create_asset(&self, spec: &AssetSpec, timeout: Duration)
        -> Result<AssetRef, AssetLedgerError>;

    /// Move `amount` tokens of `asset` between two addresses.
    fn transfer(
        &self,
        asset: &AssetRef,
        from: &str,
        to: &str,
        amount: u64,
        timeout: Duration,
    ) -> Result<TxRef, AssetLedgerError>;
}
