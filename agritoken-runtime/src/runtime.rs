//! Platform runtime: farm registration and CRUD, tokenization, token
//! acquisition, payout simulation and valuation refresh.
//!
//! Concurrency model: every operation that touches a farm's stored state
//! runs inside that farm's lock scope; operations on different farms run in
//! parallel. Asset-ledger calls can block for seconds, so the scope is
//! released before the call and re-acquired for the commit. An in-flight
//! guard (tokenization) or a supply reservation (acquisition) keeps the
//! gap race-free. Nothing is committed locally until the external outcome
//! is known; an unknown outcome surfaces as `Indeterminate` and commits
//! nothing.

use crate::api::{AcquisitionRequest, InvestorSummary, PayoutRequest, PayoutResponse, PlatformStats};
use crate::asset_ledger::{AssetLedger, AssetSpec};
use crate::holdings_ledger::HoldingsLedger;
use agritoken_core::error::PlatformError;
use agritoken_core::farm::FarmRecord;
use agritoken_core::holding::Holding;
use agritoken_core::id::{AssetRef, FarmId};
use agritoken_core::locks::FarmLockRegistry;
use agritoken_core::normalize::{canonical_farm_key, normalize_farm, RawRecord};
use agritoken_core::payout::allocate;
use agritoken_storage::storage_traits::FarmStore;
use chrono::Utc;
use log::{error, info, warn};
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Canonical fields an update request may not override; these are owned by
/// the platform's own flows.
const PROTECTED_UPDATE_FIELDS: &[&str] = &[
    "farmId",
    "assetRef",
    "tokensSold",
    "tokensAvailable",
    "createdAt",
    "tokenizedAt",
];

/// Per-call settings the runtime applies to asset-ledger calls.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Upper bound on one asset-ledger round-trip
    pub ledger_timeout: Duration,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        PlatformConfig {
            ledger_timeout: Duration::from_secs(30),
        }
    }
}

pub struct PlatformRuntime {
    farms: Arc<dyn FarmStore>,
    holdings: HoldingsLedger,
    assets: Arc<dyn AssetLedger>,
    locks: FarmLockRegistry,
    /// Farms whose asset creation is mid-flight on the chain
    in_flight: Mutex<HashSet<FarmId>>,
    /// Tokens promised to acquisitions awaiting their transfer result
    reserved: Mutex<HashMap<FarmId, u64>>,
    config: PlatformConfig,
}

fn lock_scope(scope: &Arc<Mutex<()>>) -> Result<MutexGuard<'_, ()>, PlatformError> {
    scope
        .lock()
        .map_err(|e| PlatformError::Other(format!("farm scope poisoned: {}", e)))
}

impl PlatformRuntime {
    pub fn new(
        farms: Arc<dyn FarmStore>,
        holdings: HoldingsLedger,
        assets: Arc<dyn AssetLedger>,
        config: PlatformConfig,
    ) -> Self {
        PlatformRuntime {
            farms,
            holdings,
            assets,
            locks: FarmLockRegistry::new(),
            in_flight: Mutex::new(HashSet::new()),
            reserved: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// The holdings ledger behind this runtime.
    pub fn holdings(&self) -> &HoldingsLedger {
        &self.holdings
    }

    // ---- farm CRUD ----

    /// Register a new farm from an untyped submission. The platform assigns
    /// the id and timestamps; the submission is normalized and validated
    /// before anything is persisted.
    pub fn register_farm(&self, mut raw: RawRecord) -> Result<FarmRecord, PlatformError> {
        let now = Utc::now();
        raw.insert(
            "farmId".to_string(),
            Value::String(FarmId::generate().to_string()),
        );
        raw.insert("createdAt".to_string(), Value::String(now.to_rfc3339()));
        raw.insert("updatedAt".to_string(), Value::String(now.to_rfc3339()));

        let farm = normalize_farm(&raw)?;
        farm.validate()?;
        self.farms.save(&farm)?;
        info!("registered farm {} ({})", farm.farm_id, farm.farm_name);
        Ok(farm)
    }

    pub fn get_farm(&self, farm_id: &FarmId) -> Result<FarmRecord, PlatformError> {
        self.farms
            .load(farm_id)?
            .ok_or_else(|| PlatformError::NotFound(format!("farm {}", farm_id)))
    }

    pub fn list_farms(&self) -> Result<Vec<FarmRecord>, PlatformError> {
        self.farms.list()
    }

    /// Apply an untyped field update to a farm. Platform-owned fields
    /// (id, asset reference, sold/available counters, timestamps) cannot
    /// be overridden.
    pub fn update_farm(
        &self,
        farm_id: &FarmId,
        updates: RawRecord,
    ) -> Result<FarmRecord, PlatformError> {
        let scope = self.locks.scope(farm_id)?;
        let _guard = lock_scope(&scope)?;

        let existing = self.get_farm(farm_id)?;
        let mut raw = match serde_json::to_value(&existing)? {
            Value::Object(map) => map,
            _ => return Err(PlatformError::Serialization("farm record is not an object".into())),
        };
        for (key, value) in updates {
            // resolve any accepted spelling onto the canonical key, so the
            // overlay wins against the record's existing canonical value
            let canonical = match canonical_farm_key(&key) {
                Some(canonical) => canonical,
                None => {
                    warn!("update for farm {} ignores unknown key '{}'", farm_id, key);
                    continue;
                }
            };
            if PROTECTED_UPDATE_FIELDS.contains(&canonical) {
                warn!(
                    "update for farm {} ignores protected field '{}'",
                    farm_id, canonical
                );
                continue;
            }
            raw.insert(canonical.to_string(), value);
        }
        raw.insert(
            "updatedAt".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );

        let updated = normalize_farm(&raw)?;
        updated.validate()?;
        self.farms.save(&updated)?;
        Ok(updated)
    }

    /// Remove a farm record. Explicit and terminal; nothing else deletes.
    pub fn delete_farm(&self, farm_id: &FarmId) -> Result<(), PlatformError> {
        let scope = self.locks.scope(farm_id)?;
        let _guard = lock_scope(&scope)?;
        if !self.farms.delete(farm_id)? {
            return Err(PlatformError::NotFound(format!("farm {}", farm_id)));
        }
        info!("deleted farm {}", farm_id);
        Ok(())
    }

    // ---- tokenization ----

    /// Mint the on-chain asset for a farm and record its reference.
    ///
    /// Asset creation is not idempotent, so the farm is marked in-flight
    /// before the lock is released for the chain round-trip; a concurrent
    /// second call fails fast instead of minting a duplicate. On success
    /// the reference is saved durably before returning.
    pub fn tokenize_farm(
        &self,
        farm_id: &FarmId,
        controllers: Vec<String>,
    ) -> Result<AssetRef, PlatformError> {
        let scope = self.locks.scope(farm_id)?;

        let spec = {
            let _guard = lock_scope(&scope)?;
            let farm = self.get_farm(farm_id)?;
            if farm.asset_ref.is_some() {
                return Err(PlatformError::AlreadyTokenized(farm_id.clone()));
            }
            let mut in_flight = self
                .in_flight
                .lock()
                .map_err(|e| PlatformError::Other(format!("in-flight set poisoned: {}", e)))?;
            if !in_flight.insert(farm_id.clone()) {
                return Err(PlatformError::TokenizationInProgress(farm_id.clone()));
            }
            AssetSpec::for_farm(&farm, controllers)
        };

        // chain round-trip with no farm scope held
        let created = self.assets.create_asset(&spec, self.config.ledger_timeout);

        let result = match created {
            Ok(asset_ref) => {
                let commit = (|| {
                    let _guard = lock_scope(&scope)?;
                    let mut farm = self.get_farm(farm_id)?;
                    farm.attach_asset(asset_ref.clone(), Utc::now())?;
                    self.farms.save(&farm)?;
                    Ok(asset_ref)
                })();
                if let Err(e) = &commit {
                    // the asset exists on chain but the record write failed;
                    // operators need the reference to repair by hand
                    error!(
                        "asset created for farm {} but the record update failed: {}",
                        farm_id, e
                    );
                }
                commit
            }
            Err(e) => Err(PlatformError::from(e)),
        };

        self.clear_in_flight(farm_id);
        if let Ok(asset_ref) = &result {
            info!("farm {} tokenized as {}", farm_id, asset_ref);
        }
        result
    }

    fn clear_in_flight(&self, farm_id: &FarmId) {
        if let Ok(mut in_flight) = self.in_flight.lock() {
            in_flight.remove(farm_id);
        }
    }

    // ---- acquisition ----

    /// Buy tokens in a tokenized farm: validate, reserve supply, move the
    /// tokens on chain, then record the holding. A failed transfer records
    /// nothing; an indeterminate one records nothing and says so.
    pub fn acquire(&self, request: &AcquisitionRequest) -> Result<Holding, PlatformError> {
        if request.tokens == 0 {
            return Err(PlatformError::InvalidQuantity(request.tokens));
        }
        if !request.investor_email.contains('@') {
            return Err(PlatformError::Validation {
                field: "investorEmail".to_string(),
                reason: "not a valid email address".to_string(),
            });
        }
        if request.from_address.trim().is_empty() || request.to_address.trim().is_empty() {
            return Err(PlatformError::Validation {
                field: "toAddress".to_string(),
                reason: "transfer addresses must not be empty".to_string(),
            });
        }
        if request.from_address == request.to_address {
            return Err(PlatformError::Validation {
                field: "toAddress".to_string(),
                reason: "sender and recipient must differ".to_string(),
            });
        }

        let scope = self.locks.scope(&request.farm_id)?;

        let (asset_ref, price) = {
            let _guard = lock_scope(&scope)?;
            let farm = self.get_farm(&request.farm_id)?;
            let asset_ref = farm.asset_ref.clone().ok_or_else(|| PlatformError::Validation {
                field: "farmId".to_string(),
                reason: "farm is not tokenized".to_string(),
            })?;

            let mut reserved = self
                .reserved
                .lock()
                .map_err(|e| PlatformError::Other(format!("reservations poisoned: {}", e)))?;
            let pending = reserved.get(&request.farm_id).copied().unwrap_or(0);
            let available = farm.tokens_available.saturating_sub(pending);
            if request.tokens > available {
                return Err(PlatformError::Oversubscribed {
                    farm_id: request.farm_id.clone(),
                    requested: request.tokens,
                    available,
                });
            }
            *reserved.entry(request.farm_id.clone()).or_insert(0) += request.tokens;
            (asset_ref, farm.price_per_token)
        };

        // chain round-trip with no farm scope held
        let transferred = self.assets.transfer(
            &asset_ref,
            &request.from_address,
            &request.to_address,
            request.tokens,
            self.config.ledger_timeout,
        );

        let result = match transferred {
            Ok(tx_ref) => (|| {
                let _guard = lock_scope(&scope)?;
                let mut farm = self.get_farm(&request.farm_id)?;
                let holding = Holding::new(
                    request.investor_email.clone(),
                    request.farm_id.clone(),
                    request.tokens,
                    price,
                    Utc::now(),
                )?;
                self.holdings.append(&farm, holding.clone())?;
                farm.record_sale(request.tokens, Utc::now())?;
                self.farms.save(&farm)?;
                info!(
                    "investor {} acquired {} tokens of farm {} ({})",
                    request.investor_email, request.tokens, request.farm_id, tx_ref
                );
                Ok(holding)
            })(),
            Err(e) => Err(PlatformError::from(e)),
        };

        self.release_reservation(&request.farm_id, request.tokens);
        result
    }

    fn release_reservation(&self, farm_id: &FarmId, tokens: u64) {
        if let Ok(mut reserved) = self.reserved.lock() {
            if let Some(entry) = reserved.get_mut(farm_id) {
                *entry = entry.saturating_sub(tokens);
                if *entry == 0 {
                    reserved.remove(farm_id);
                }
            }
        }
    }

    // ---- payouts and valuation ----

    /// Compute and record one proportional payout event. The whole event,
    /// allocation plus every holding update, happens inside the farm's
    /// scope and applies all-or-nothing.
    pub fn simulate_payout(
        &self,
        request: &PayoutRequest,
    ) -> Result<PayoutResponse, PlatformError> {
        let scope = self.locks.scope(&request.farm_id)?;
        let _guard = lock_scope(&scope)?;

        let farm = self.get_farm(&request.farm_id)?;
        let snapshot = self.holdings.by_farm(&farm.farm_id)?;
        let report = allocate(
            &farm.farm_id,
            &snapshot,
            request.payout_amount,
            request.payout_date,
            &request.description,
        )?;

        let batch: Vec<_> = report
            .per_holding
            .iter()
            .map(|share| (share.holding_id.clone(), share.amount))
            .collect();
        self.holdings
            .apply_payout_batch(&farm.farm_id, &batch, request.payout_date)?;

        info!(
            "payout of {} across farm {}: {} per token",
            report.total_amount, farm.farm_id, report.payout_per_token
        );
        Ok(PayoutResponse::from(report))
    }

    /// Re-mark every holding of a farm against a new per-token price.
    pub fn refresh_valuations(
        &self,
        farm_id: &FarmId,
        price_per_token: Decimal,
    ) -> Result<(), PlatformError> {
        if price_per_token < Decimal::ZERO {
            return Err(PlatformError::Validation {
                field: "pricePerToken".to_string(),
                reason: "must not be negative".to_string(),
            });
        }
        let scope = self.locks.scope(farm_id)?;
        let _guard = lock_scope(&scope)?;
        self.get_farm(farm_id)?;
        self.holdings.refresh_valuation(farm_id, price_per_token)
    }

    // ---- reporting ----

    /// One investor's positions across all farms.
    pub fn investor_holdings(&self, investor_email: &str) -> Result<Vec<Holding>, PlatformError> {
        self.holdings.by_investor(investor_email)
    }

    /// Aggregate view of one investor's portfolio.
    pub fn investor_summary(&self, investor_email: &str) -> Result<InvestorSummary, PlatformError> {
        let holdings = self.holdings.by_investor(investor_email)?;
        let total_invested: Decimal = holdings.iter().map(|h| h.cost_basis).sum();
        let portfolio_value: Decimal = holdings.iter().map(|h| h.est_value).sum();
        let total_payouts_received: Decimal =
            holdings.iter().map(|h| h.total_payouts_received).sum();
        Ok(InvestorSummary {
            investor_email: investor_email.to_string(),
            holdings_count: holdings.len(),
            total_invested,
            portfolio_value,
            unrealized_pnl: portfolio_value - total_invested,
            total_payouts_received,
        })
    }

    /// Platform-wide aggregates across all farms.
    pub fn platform_stats(&self) -> Result<PlatformStats, PlatformError> {
        let farms = self.farms.list()?;
        let tokenized = farms.iter().filter(|f| f.asset_ref.is_some()).count();
        Ok(PlatformStats {
            total_farms: farms.len(),
            tokenized_farms: tokenized,
            pending_farms: farms.len() - tokenized,
            total_tokens: farms.iter().map(|f| f.total_tokens).sum(),
            total_value_usd: farms.iter().map(|f| f.market_value()).sum(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_ledger::{MockAssetLedger, MockOutcome};
    use agritoken_core::farm::FarmStatus;
    use agritoken_storage::memory::{MemoryFarmStore, MemoryHoldingsStore};
    use chrono::DateTime;
    use serde_json::json;
    use std::str::FromStr;
    use std::thread;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn runtime() -> (Arc<PlatformRuntime>, Arc<MockAssetLedger>) {
        let assets = Arc::new(MockAssetLedger::new());
        let runtime = PlatformRuntime::new(
            Arc::new(MemoryFarmStore::new()),
            HoldingsLedger::new(Arc::new(MemoryHoldingsStore::new())),
            assets.clone(),
            PlatformConfig::default(),
        );
        (Arc::new(runtime), assets)
    }

    fn submission() -> RawRecord {
        match json!({
            "Farm Name": "Green Valley Maize",
            "Farmer Name": "A. Wanjiru",
            "Farmer Email": "farmer@greenvalley.example",
            "Farm Location": "Nakuru, Kenya",
            "Crop Type": "Maize",
            "Farm Size (Acres)": 250,
            "Number of Tokens": 1000,
            "Price per Token (USD)": "12.5",
            "Token Name": "Green Valley Token",
            "Token Unit": "GVMMAI"
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn tokenized_farm(runtime: &PlatformRuntime) -> FarmRecord {
        let farm = runtime.register_farm(submission()).unwrap();
        runtime
            .tokenize_farm(&farm.farm_id, vec!["controller".to_string()])
            .unwrap();
        runtime.get_farm(&farm.farm_id).unwrap()
    }

    fn acquisition(farm_id: &FarmId, email: &str, tokens: u64) -> AcquisitionRequest {
        AcquisitionRequest {
            farm_id: farm_id.clone(),
            investor_email: email.to_string(),
            tokens,
            from_address: "farm-treasury".to_string(),
            to_address: format!("wallet-{}", email),
        }
    }

    fn payout(farm_id: &FarmId, amount: &str) -> PayoutRequest {
        PayoutRequest {
            farm_id: farm_id.clone(),
            payout_amount: dec(amount),
            payout_date: DateTime::parse_from_rfc3339("2024-08-15T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            description: "harvest distribution".to_string(),
        }
    }

    #[test]
    fn test_register_normalizes_and_persists() {
        let (runtime, _) = runtime();
        let farm = runtime.register_farm(submission()).unwrap();
        assert_eq!(farm.total_tokens, 1000);
        assert_eq!(farm.status, FarmStatus::Pending);
        assert!(farm.asset_ref.is_none());

        let listed = runtime.list_farms().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0], farm);
    }

    #[test]
    fn test_register_rejects_invalid_submission() {
        let (runtime, _) = runtime();
        let mut raw = submission();
        raw.insert("Farmer Email".to_string(), json!("not-an-email"));
        let err = runtime.register_farm(raw).unwrap_err();
        assert!(matches!(err, PlatformError::Validation { ref field, .. } if field == "farmerEmail"));
        assert!(runtime.list_farms().unwrap().is_empty());
    }

    #[test]
    fn test_update_preserves_platform_owned_fields() {
        let (runtime, _) = runtime();
        let farm = tokenized_farm(&runtime);

        let updates = match json!({
            "Farm Location": "Eldoret, Kenya",
            "assetRef": "asset-fake",
            "tokensSold": 999
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let updated = runtime.update_farm(&farm.farm_id, updates).unwrap();
        assert_eq!(updated.farm_location, "Eldoret, Kenya");
        assert_eq!(updated.asset_ref, farm.asset_ref);
        assert_eq!(updated.tokens_sold, farm.tokens_sold);
    }

    #[test]
    fn test_delete_is_terminal() {
        let (runtime, _) = runtime();
        let farm = runtime.register_farm(submission()).unwrap();
        runtime.delete_farm(&farm.farm_id).unwrap();
        assert!(matches!(
            runtime.get_farm(&farm.farm_id).unwrap_err(),
            PlatformError::NotFound(_)
        ));
        assert!(matches!(
            runtime.delete_farm(&farm.farm_id).unwrap_err(),
            PlatformError::NotFound(_)
        ));
    }

    #[test]
    fn test_tokenize_attaches_asset_once() {
        let (runtime, assets) = runtime();
        let farm = runtime.register_farm(submission()).unwrap();

        let asset_ref = runtime
            .tokenize_farm(&farm.farm_id, vec!["controller".to_string()])
            .unwrap();
        let tokenized = runtime.get_farm(&farm.farm_id).unwrap();
        assert_eq!(tokenized.asset_ref, Some(asset_ref));
        assert_eq!(tokenized.status, FarmStatus::Tokenized);
        assert!(tokenized.tokenized_at.is_some());
        assert_eq!(assets.created_count(), 1);

        let err = runtime
            .tokenize_farm(&farm.farm_id, vec!["controller".to_string()])
            .unwrap_err();
        assert!(matches!(err, PlatformError::AlreadyTokenized(_)));
        // the chain was not hit a second time
        assert_eq!(assets.created_count(), 1);
    }

    #[test]
    fn test_tokenize_indeterminate_commits_nothing() {
        let (runtime, assets) = runtime();
        let farm = runtime.register_farm(submission()).unwrap();

        assets.push_outcome(MockOutcome::Indeterminate("confirmation timeout".to_string()));
        let err = runtime
            .tokenize_farm(&farm.farm_id, vec!["controller".to_string()])
            .unwrap_err();
        assert!(matches!(err, PlatformError::Indeterminate(_)));

        let unchanged = runtime.get_farm(&farm.farm_id).unwrap();
        assert!(unchanged.asset_ref.is_none());
        assert_eq!(unchanged.status, FarmStatus::Pending);

        // the in-flight guard is released; a later retry can succeed
        runtime
            .tokenize_farm(&farm.farm_id, vec!["controller".to_string()])
            .unwrap();
        assert_eq!(assets.created_count(), 1);
    }

    #[test]
    fn test_acquire_records_holding_and_sale() {
        let (runtime, assets) = runtime();
        let farm = tokenized_farm(&runtime);

        let holding = runtime
            .acquire(&acquisition(&farm.farm_id, "investor@example.com", 300))
            .unwrap();
        assert_eq!(holding.tokens_owned, 300);
        assert_eq!(holding.cost_basis, dec("3750"));
        assert_eq!(assets.transfer_count(), 1);

        let after = runtime.get_farm(&farm.farm_id).unwrap();
        assert_eq!(after.tokens_sold, 300);
        assert_eq!(after.tokens_available, 700);
        assert_eq!(runtime.holdings().by_farm(&farm.farm_id).unwrap().len(), 1);
    }

    #[test]
    fn test_acquire_validates_before_the_chain_is_hit() {
        let (runtime, assets) = runtime();
        let farm = tokenized_farm(&runtime);

        let mut same_address = acquisition(&farm.farm_id, "investor@example.com", 10);
        same_address.to_address = same_address.from_address.clone();
        assert!(matches!(
            runtime.acquire(&same_address).unwrap_err(),
            PlatformError::Validation { .. }
        ));

        assert!(matches!(
            runtime
                .acquire(&acquisition(&farm.farm_id, "investor@example.com", 0))
                .unwrap_err(),
            PlatformError::InvalidQuantity(0)
        ));

        assert_eq!(assets.transfer_count(), 0);
    }

    #[test]
    fn test_acquire_requires_tokenized_farm() {
        let (runtime, assets) = runtime();
        let farm = runtime.register_farm(submission()).unwrap();
        let err = runtime
            .acquire(&acquisition(&farm.farm_id, "investor@example.com", 10))
            .unwrap_err();
        assert!(matches!(err, PlatformError::Validation { .. }));
        assert_eq!(assets.transfer_count(), 0);
    }

    #[test]
    fn test_failed_transfer_records_nothing() {
        let (runtime, assets) = runtime();
        let farm = tokenized_farm(&runtime);

        assets.push_outcome(MockOutcome::Fail("insufficient balance".to_string()));
        let err = runtime
            .acquire(&acquisition(&farm.farm_id, "investor@example.com", 300))
            .unwrap_err();
        assert!(matches!(err, PlatformError::ExternalService(_)));

        let after = runtime.get_farm(&farm.farm_id).unwrap();
        assert_eq!(after.tokens_sold, 0);
        assert!(runtime.holdings().by_farm(&farm.farm_id).unwrap().is_empty());

        // the reservation was released; the supply is still sellable
        runtime
            .acquire(&acquisition(&farm.farm_id, "investor@example.com", 1000))
            .unwrap();
    }

    #[test]
    fn test_acquire_beyond_supply_is_oversubscribed() {
        let (runtime, _) = runtime();
        let farm = tokenized_farm(&runtime);
        runtime
            .acquire(&acquisition(&farm.farm_id, "a@example.com", 900))
            .unwrap();
        let err = runtime
            .acquire(&acquisition(&farm.farm_id, "b@example.com", 200))
            .unwrap_err();
        assert!(matches!(
            err,
            PlatformError::Oversubscribed { available: 100, .. }
        ));
    }

    #[test]
    fn test_payout_matches_proportional_scenario() {
        let (runtime, _) = runtime();
        let farm = tokenized_farm(&runtime);
        for (email, tokens) in [
            ("a@example.com", 100u64),
            ("b@example.com", 250),
            ("c@example.com", 650),
        ] {
            runtime
                .acquire(&acquisition(&farm.farm_id, email, tokens))
                .unwrap();
        }

        let response = runtime
            .simulate_payout(&payout(&farm.farm_id, "1000.00"))
            .unwrap();
        assert_eq!(response.payout_per_token, dec("1.0000"));
        assert_eq!(response.total_tokens, 1000);
        let amounts: Vec<Decimal> = response.per_holding.iter().map(|s| s.amount).collect();
        assert_eq!(amounts, vec![dec("100.00"), dec("250.00"), dec("650.00")]);

        // running per-holding state advanced
        let holdings = runtime.holdings().by_farm(&farm.farm_id).unwrap();
        assert_eq!(holdings[2].total_payouts_received, dec("650.00"));
        assert!(holdings[2].last_payout_at.is_some());
    }

    #[test]
    fn test_payout_without_holdings_writes_nothing() {
        let (runtime, _) = runtime();
        let farm = tokenized_farm(&runtime);
        let err = runtime
            .simulate_payout(&payout(&farm.farm_id, "100.00"))
            .unwrap_err();
        assert!(matches!(err, PlatformError::NoHoldings(_)));
    }

    #[test]
    fn test_payout_for_unknown_farm() {
        let (runtime, _) = runtime();
        let err = runtime
            .simulate_payout(&payout(&FarmId::new("ghost"), "100.00"))
            .unwrap_err();
        assert!(matches!(err, PlatformError::NotFound(_)));
    }

    #[test]
    fn test_concurrent_payouts_serialize_per_farm() {
        let (runtime, _) = runtime();
        let farm = tokenized_farm(&runtime);
        for (email, tokens) in [("a@example.com", 1u64), ("b@example.com", 1), ("c@example.com", 1)]
        {
            runtime
                .acquire(&acquisition(&farm.farm_id, email, tokens))
                .unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let runtime = Arc::clone(&runtime);
            let farm_id = farm.farm_id.clone();
            handles.push(thread::spawn(move || {
                runtime.simulate_payout(&payout(&farm_id, "1.00")).unwrap();
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // 8 events of $1.00 over 3 single-token holders: each event pays
        // 0.34/0.33/0.33 with the extra cent always on the first holding
        let holdings = runtime.holdings().by_farm(&farm.farm_id).unwrap();
        let totals: Vec<Decimal> = holdings
            .iter()
            .map(|h| h.total_payouts_received)
            .collect();
        assert_eq!(totals, vec![dec("2.72"), dec("2.64"), dec("2.64")]);
        let grand: Decimal = totals.iter().copied().sum();
        assert_eq!(grand, dec("8.00"));
    }

    #[test]
    fn test_valuation_refresh_and_investor_summary() {
        let (runtime, _) = runtime();
        let farm = tokenized_farm(&runtime);
        runtime
            .acquire(&acquisition(&farm.farm_id, "investor@example.com", 400))
            .unwrap();

        runtime
            .refresh_valuations(&farm.farm_id, dec("15"))
            .unwrap();
        let summary = runtime.investor_summary("investor@example.com").unwrap();
        assert_eq!(summary.holdings_count, 1);
        assert_eq!(summary.total_invested, dec("5000"));
        assert_eq!(summary.portfolio_value, dec("6000"));
        assert_eq!(summary.unrealized_pnl, dec("1000"));
    }

    #[test]
    fn test_platform_stats() {
        let (runtime, _) = runtime();
        let tokenized = tokenized_farm(&runtime);
        runtime.register_farm(submission()).unwrap();

        let stats = runtime.platform_stats().unwrap();
        assert_eq!(stats.total_farms, 2);
        assert_eq!(stats.tokenized_farms, 1);
        assert_eq!(stats.pending_farms, 1);
        assert_eq!(stats.total_tokens, 2000);
        assert_eq!(stats.total_value_usd, dec("25000"));
        assert_eq!(tokenized.total_tokens, 1000);
    }
}
