//! JSON-compatible request/response shapes for the platform's operations.

use agritoken_core::id::FarmId;
use agritoken_core::payout::{PayoutReport, PayoutShare};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A payout simulation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutRequest {
    pub farm_id: FarmId,
    pub payout_amount: Decimal,
    pub payout_date: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
}

/// The distribution computed for one payout request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutResponse {
    pub farm_id: FarmId,
    pub payout_per_token: Decimal,
    pub total_tokens: u64,
    pub per_holding: Vec<PayoutShare>,
}

impl From<PayoutReport> for PayoutResponse {
    fn from(report: PayoutReport) -> Self {
        PayoutResponse {
            farm_id: report.farm_id,
            payout_per_token: report.payout_per_token,
            total_tokens: report.total_tokens,
            per_holding: report.per_holding,
        }
    }
}

/// A request to acquire tokens in a tokenized farm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcquisitionRequest {
    pub farm_id: FarmId,
    pub investor_email: String,
    pub tokens: u64,
    /// Address currently holding the farm's tokens
    pub from_address: String,
    /// The investor's address
    pub to_address: String,
}

/// Aggregate view of one investor's positions across all farms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestorSummary {
    pub investor_email: String,
    pub holdings_count: usize,
    pub total_invested: Decimal,
    pub portfolio_value: Decimal,
    pub unrealized_pnl: Decimal,
    pub total_payouts_received: Decimal,
}

/// Platform-wide aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStats {
    pub total_farms: usize,
    pub tokenized_farms: usize,
    pub pending_farms: usize,
    pub total_tokens: u64,
    pub total_value_usd: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payout_request_wire_shape() {
        let request: PayoutRequest = serde_json::from_value(json!({
            "farmId": "farm-1",
            "payoutAmount": "1000.00",
            "payoutDate": "2024-08-15T00:00:00Z",
            "description": "harvest distribution"
        }))
        .unwrap();
        assert_eq!(request.farm_id, FarmId::new("farm-1"));
        assert_eq!(request.payout_amount, Decimal::from(1000));
    }

    #[test]
    fn test_payout_response_uses_camel_case_keys() {
        let response = PayoutResponse {
            farm_id: FarmId::new("farm-1"),
            payout_per_token: Decimal::ONE,
            total_tokens: 1000,
            per_holding: Vec::new(),
        };
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("payoutPerToken").is_some());
        assert!(value.get("totalTokens").is_some());
        assert!(value.get("perHolding").is_some());
    }
}
