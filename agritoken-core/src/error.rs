use crate::id::FarmId;
use rust_decimal::Decimal;
use std::io;
use thiserror::Error;

/// Represents all possible errors produced by the platform core, the stores
/// and the runtime. Every error is scoped to one request; none is fatal to
/// the process.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// IO errors that occur when reading/writing store files
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Database errors from the SQLite backend
    #[error("Database error: {0}")]
    Database(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Errors that occur during payout journal operations
    #[error("Journal error: {0}")]
    Journal(String),

    /// A raw stored record could not be mapped onto the canonical schema.
    /// Carries the canonical field name so schema drift is auditable.
    #[error("Normalization failed for field '{field}': {reason}")]
    Normalization { field: String, reason: String },

    /// Bad input shape or range; user-fixable
    #[error("Validation failed for '{field}': {reason}")]
    Validation { field: String, reason: String },

    /// Unknown farm or holding
    #[error("Not found: {0}")]
    NotFound(String),

    /// The farm already carries an asset reference; re-tokenization is
    /// rejected rather than risking a duplicate on-chain asset
    #[error("Farm {0} is already tokenized")]
    AlreadyTokenized(FarmId),

    /// Another request is mid-flight creating this farm's asset
    #[error("Tokenization already in progress for farm {0}")]
    TokenizationInProgress(FarmId),

    /// More tokens claimed than the farm's total supply allows
    #[error("Farm {farm_id} oversubscribed: {requested} tokens requested, {available} available")]
    Oversubscribed {
        farm_id: FarmId,
        requested: u64,
        available: u64,
    },

    /// A holding must own a positive number of tokens
    #[error("Invalid token quantity: {0}")]
    InvalidQuantity(u64),

    /// A payout amount must be strictly positive
    #[error("Invalid payout amount: {0}")]
    InvalidAmount(Decimal),

    /// A payout was requested for a farm with no holdings (or zero owned tokens)
    #[error("No holdings recorded for farm {0}")]
    NoHoldings(FarmId),

    /// A multi-holding payout batch was rejected; no holding was updated
    #[error("Payout batch rejected: {0}")]
    BatchApplyFailed(String),

    /// The asset ledger failed with a definite outcome. Retryable only when
    /// idempotency-safe; callers must check on-chain state first.
    #[error("Asset ledger error: {0}")]
    ExternalService(String),

    /// The asset ledger call timed out with the remote outcome unknown.
    /// Never coerced to success or failure; retry-or-not is the caller's
    /// decision after inspecting on-chain state.
    #[error("Asset ledger outcome unknown: {0}")]
    Indeterminate(String),

    /// Generic errors that don't fit in other categories
    #[error("Other error: {0}")]
    Other(String),

    /// Anyhow error wrapper for error context
    #[error(transparent)]
    Context(#[from] anyhow::Error),
}

impl PlatformError {
    /// True for errors the caller can fix by correcting the request
    /// (the 4xx-equivalent family).
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            PlatformError::Validation { .. }
                | PlatformError::Normalization { .. }
                | PlatformError::NotFound(_)
                | PlatformError::AlreadyTokenized(_)
                | PlatformError::Oversubscribed { .. }
                | PlatformError::InvalidQuantity(_)
                | PlatformError::InvalidAmount(_)
                | PlatformError::NoHoldings(_)
        )
    }
}

// Additional From conversions for common error types

impl From<serde_json::Error> for PlatformError {
    fn from(err: serde_json::Error) -> Self {
        PlatformError::Serialization(err.to_string())
    }
}

impl From<String> for PlatformError {
    fn from(err: String) -> Self {
        PlatformError::Other(err)
    }
}

impl From<&str> for PlatformError {
    fn from(err: &str) -> Self {
        PlatformError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_error_classification() {
        let conflict = PlatformError::AlreadyTokenized(FarmId::new("farm-1"));
        assert!(conflict.is_user_error());

        let indeterminate = PlatformError::Indeterminate("timeout".to_string());
        assert!(!indeterminate.is_user_error());

        let io = PlatformError::Io(io::Error::new(io::ErrorKind::Other, "disk"));
        assert!(!io.is_user_error());
    }

    #[test]
    fn test_normalization_error_names_field() {
        let err = PlatformError::Normalization {
            field: "totalTokens".to_string(),
            reason: "not a number".to_string(),
        };
        assert!(err.to_string().contains("totalTokens"));
    }
}
