//! Proportional payout allocation.
//!
//! Pure computation: given a farm's holdings snapshot and a cash amount,
//! produce the exact per-holding split. All arithmetic is decimal; rounding
//! is "half away from zero" at fixed precision, and the rounded shares are
//! forced to conserve the rounded total by assigning any residual cents to
//! the largest holder (first by insertion order on ties).

use crate::error::PlatformError;
use crate::holding::Holding;
use crate::id::{FarmId, HoldingId};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Decimal places kept for the per-token rate.
pub const PAYOUT_PER_TOKEN_DP: u32 = 4;
/// Decimal places kept for money amounts.
pub const AMOUNT_DP: u32 = 2;

/// Round half away from zero at `dp` places.
pub fn round_half_away(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// One holding's slice of a payout event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutShare {
    pub holding_id: HoldingId,
    pub investor_email: String,
    pub tokens_owned: u64,
    pub amount: Decimal,
}

/// The full accounting breakdown of one payout event. Reproducible from the
/// same holdings snapshot; the caller is responsible for moving funds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutReport {
    pub farm_id: FarmId,
    pub payout_per_token: Decimal,
    pub total_tokens: u64,
    pub total_amount: Decimal,
    pub payout_date: DateTime<Utc>,
    pub description: String,
    /// Ledger insertion order; drives deterministic residual assignment
    pub per_holding: Vec<PayoutShare>,
}

/// Split `total_amount` across `holdings` in proportion to tokens owned.
///
/// `holdings` must be in ledger insertion order. The sum of the returned
/// amounts equals `total_amount` rounded to cents, exactly.
pub fn allocate(
    farm_id: &FarmId,
    holdings: &[Holding],
    total_amount: Decimal,
    payout_date: DateTime<Utc>,
    description: &str,
) -> Result<PayoutReport, PlatformError> {
    if total_amount <= Decimal::ZERO {
        return Err(PlatformError::InvalidAmount(total_amount));
    }

    let total_tokens: u64 = holdings.iter().map(|h| h.tokens_owned).sum();
    if holdings.is_empty() || total_tokens == 0 {
        return Err(PlatformError::NoHoldings(farm_id.clone()));
    }

    let payout_per_token = round_half_away(
        total_amount / Decimal::from(total_tokens),
        PAYOUT_PER_TOKEN_DP,
    );

    let mut per_holding: Vec<PayoutShare> = holdings
        .iter()
        .map(|h| PayoutShare {
            holding_id: h.holding_id.clone(),
            investor_email: h.investor_email.clone(),
            tokens_owned: h.tokens_owned,
            amount: round_half_away(Decimal::from(h.tokens_owned) * payout_per_token, AMOUNT_DP),
        })
        .collect();

    // Conservation: rounded shares must sum to the rounded total. Any
    // residual goes to the largest holder; the strict `>` keeps the first
    // of equally-sized holders, matching insertion order.
    let target = round_half_away(total_amount, AMOUNT_DP);
    let distributed: Decimal = per_holding.iter().map(|s| s.amount).sum();
    let residual = target - distributed;
    if !residual.is_zero() {
        let mut largest = 0;
        for (i, share) in per_holding.iter().enumerate() {
            if share.tokens_owned > per_holding[largest].tokens_owned {
                largest = i;
            }
        }
        per_holding[largest].amount += residual;
    }

    Ok(PayoutReport {
        farm_id: farm_id.clone(),
        payout_per_token,
        total_tokens,
        total_amount: target,
        payout_date,
        description: description.to_string(),
        per_holding,
    })
}
