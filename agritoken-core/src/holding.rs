use crate::error::PlatformError;
use crate::id::{FarmId, HoldingId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One investor's recorded ownership of tokens in one farm.
///
/// The holdings ledger exclusively owns records of this type. Money fields
/// use decimal arithmetic throughout; token counts are whole numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub holding_id: HoldingId,
    pub investor_email: String,
    pub farm_id: FarmId,
    /// Invariant: strictly positive
    pub tokens_owned: u64,
    /// Sum paid to acquire the position
    pub cost_basis: Decimal,
    /// Current mark; refreshed against the farm's latest token price
    pub est_value: Decimal,
    /// Cash actually returned to the investor (payouts to date)
    pub realized_pnl: Decimal,
    /// Monotonically non-decreasing across payout events
    pub total_payouts_received: Decimal,
    pub last_payout_at: Option<DateTime<Utc>>,
    pub acquired_at: DateTime<Utc>,
}

impl Holding {
    /// Create a holding for a fresh acquisition at the farm's listed price.
    pub fn new(
        investor_email: impl Into<String>,
        farm_id: FarmId,
        tokens_owned: u64,
        price_per_token: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Self, PlatformError> {
        if tokens_owned == 0 {
            return Err(PlatformError::InvalidQuantity(tokens_owned));
        }
        let cost_basis = Decimal::from(tokens_owned) * price_per_token;
        Ok(Holding {
            holding_id: HoldingId::generate(),
            investor_email: investor_email.into(),
            farm_id,
            tokens_owned,
            cost_basis,
            est_value: cost_basis,
            realized_pnl: Decimal::ZERO,
            total_payouts_received: Decimal::ZERO,
            last_payout_at: None,
            acquired_at: now,
        })
    }

    /// Record this holding's share of a payout event. Cash returned counts
    /// toward realized P&L.
    pub fn apply_payout(&mut self, amount: Decimal, timestamp: DateTime<Utc>) {
        self.total_payouts_received += amount;
        self.realized_pnl += amount;
        self.last_payout_at = Some(timestamp);
    }

    /// Re-mark the position against a new per-token price.
    pub fn mark_to(&mut self, price_per_token: Decimal) {
        self.est_value = Decimal::from(self.tokens_owned) * price_per_token;
    }

    /// Mark gain or loss against cost basis, excluding payouts.
    pub fn unrealized_pnl(&self) -> Decimal {
        self.est_value - self.cost_basis
    }

    /// Build a holding with fixed ids and prices - exposed for testing in
    /// other crates.
    pub fn sample_for_tests(
        holding_id: impl Into<HoldingId>,
        farm_id: impl Into<FarmId>,
        tokens_owned: u64,
    ) -> Self {
        let cost_basis = Decimal::from(tokens_owned) * Decimal::new(125, 1);
        Holding {
            holding_id: holding_id.into(),
            investor_email: "investor@example.com".to_string(),
            farm_id: farm_id.into(),
            tokens_owned,
            cost_basis,
            est_value: cost_basis,
            realized_pnl: Decimal::ZERO,
            total_payouts_received: Decimal::ZERO,
            last_payout_at: None,
            acquired_at: Utc::now(),
        }
    }
}
