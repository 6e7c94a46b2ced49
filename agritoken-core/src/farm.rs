use crate::error::PlatformError;
use crate::id::{AssetRef, FarmId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a farm sits in its tokenization lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FarmStatus {
    /// Submitted, no on-chain asset yet
    Pending,
    /// An asset reference has been attached
    Tokenized,
    /// Open for acquisitions and payouts
    Active,
    /// Terminal; no further mutation besides deletion
    Closed,
}

impl fmt::Display for FarmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FarmStatus::Pending => "Pending",
            FarmStatus::Tokenized => "Tokenized",
            FarmStatus::Active => "Active",
            FarmStatus::Closed => "Closed",
        };
        write!(f, "{}", s)
    }
}

impl FarmStatus {
    /// Parse a status label, tolerating the lowercase labels and the
    /// `harvested` state used by earlier deployments.
    pub fn parse(label: &str) -> Option<FarmStatus> {
        match label.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(FarmStatus::Pending),
            "tokenized" => Some(FarmStatus::Tokenized),
            "active" => Some(FarmStatus::Active),
            "closed" | "harvested" => Some(FarmStatus::Closed),
            _ => None,
        }
    }
}

/// Canonical record for one registered farm.
///
/// The farm store exclusively owns records of this type; holdings reference
/// a farm by `farm_id` only, never by embedded copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmRecord {
    pub farm_id: FarmId,
    pub farm_name: String,
    pub farmer_name: String,
    pub farmer_email: String,
    /// Controller address for the farm's on-chain asset
    pub wallet_address: String,
    pub farm_location: String,
    pub crop_type: String,
    pub farm_size_acres: Decimal,
    /// Total token supply; fixed at registration
    pub total_tokens: u64,
    pub tokens_sold: u64,
    /// Invariant: `total_tokens - tokens_sold`
    pub tokens_available: u64,
    pub price_per_token: Decimal,
    pub token_name: String,
    pub token_unit: String,
    pub harvest_date: Option<String>,
    pub insurance_enabled: bool,
    pub insurance_type: String,
    /// None until tokenization succeeds
    pub asset_ref: Option<AssetRef>,
    pub status: FarmStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tokenized_at: Option<DateTime<Utc>>,
}

impl FarmRecord {
    /// Check the record's field-level invariants, reporting the first
    /// violated field.
    pub fn validate(&self) -> Result<(), PlatformError> {
        if self.farm_id.is_empty() {
            return Err(PlatformError::Validation {
                field: "farmId".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.farm_name.trim().is_empty() {
            return Err(PlatformError::Validation {
                field: "farmName".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if !self.farmer_email.contains('@') {
            return Err(PlatformError::Validation {
                field: "farmerEmail".to_string(),
                reason: "not a valid email address".to_string(),
            });
        }
        if !self.wallet_address.is_empty() && self.wallet_address.len() != 58 {
            return Err(PlatformError::Validation {
                field: "walletAddress".to_string(),
                reason: "wallet addresses are 58 characters".to_string(),
            });
        }
        if self.total_tokens == 0 {
            return Err(PlatformError::Validation {
                field: "totalTokens".to_string(),
                reason: "token supply must be positive".to_string(),
            });
        }
        if self.tokens_sold > self.total_tokens {
            return Err(PlatformError::Validation {
                field: "tokensSold".to_string(),
                reason: "cannot exceed total supply".to_string(),
            });
        }
        if self.tokens_available != self.total_tokens - self.tokens_sold {
            return Err(PlatformError::Validation {
                field: "tokensAvailable".to_string(),
                reason: "must equal totalTokens - tokensSold".to_string(),
            });
        }
        if self.price_per_token < Decimal::ZERO {
            return Err(PlatformError::Validation {
                field: "pricePerToken".to_string(),
                reason: "must not be negative".to_string(),
            });
        }
        Ok(())
    }

    /// Attach the on-chain asset created for this farm. Rejects a second
    /// attachment: duplicate asset creation cannot be undone here.
    pub fn attach_asset(
        &mut self,
        asset_ref: AssetRef,
        now: DateTime<Utc>,
    ) -> Result<(), PlatformError> {
        if self.asset_ref.is_some() {
            return Err(PlatformError::AlreadyTokenized(self.farm_id.clone()));
        }
        self.asset_ref = Some(asset_ref);
        self.status = FarmStatus::Tokenized;
        self.tokenized_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Record a completed acquisition of `tokens`, keeping the
    /// sold/available split consistent.
    pub fn record_sale(&mut self, tokens: u64, now: DateTime<Utc>) -> Result<(), PlatformError> {
        if tokens == 0 {
            return Err(PlatformError::InvalidQuantity(tokens));
        }
        if tokens > self.tokens_available {
            return Err(PlatformError::Oversubscribed {
                farm_id: self.farm_id.clone(),
                requested: tokens,
                available: self.tokens_available,
            });
        }
        self.tokens_sold += tokens;
        self.tokens_available -= tokens;
        self.updated_at = now;
        Ok(())
    }

    /// Full market value of the farm's token supply at the listed price.
    pub fn market_value(&self) -> Decimal {
        Decimal::from(self.total_tokens) * self.price_per_token
    }

    /// Build a valid record with placeholder descriptive fields - exposed
    /// for testing in other crates.
    pub fn sample_for_tests(farm_id: impl Into<FarmId>, total_tokens: u64) -> Self {
        let now = Utc::now();
        FarmRecord {
            farm_id: farm_id.into(),
            farm_name: "Green Valley Maize".to_string(),
            farmer_name: "A. Wanjiru".to_string(),
            farmer_email: "farmer@greenvalley.example".to_string(),
            wallet_address: String::new(),
            farm_location: "Nakuru, Kenya".to_string(),
            crop_type: "Maize".to_string(),
            farm_size_acres: Decimal::from(250),
            total_tokens,
            tokens_sold: 0,
            tokens_available: total_tokens,
            price_per_token: Decimal::new(125, 1),
            token_name: "Green Valley Token".to_string(),
            token_unit: "GVMMAI".to_string(),
            harvest_date: None,
            insurance_enabled: false,
            insurance_type: "Parametric Weather-Based".to_string(),
            asset_ref: None,
            status: FarmStatus::Pending,
            created_at: now,
            updated_at: now,
            tokenized_at: None,
        }
    }
}
