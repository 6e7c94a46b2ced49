//! The holdings ledger: every investor position, grouped per farm.
//!
//! The ledger layers invariant enforcement (positive quantities, supply
//! caps) and atomic payout application over a plain [`HoldingsStore`]. It
//! does not serialize callers itself; the platform runtime serializes all
//! ledger access per farm through its lock scopes.

use agritoken_core::error::PlatformError;
use agritoken_core::farm::FarmRecord;
use agritoken_core::holding::Holding;
use agritoken_core::id::{FarmId, HoldingId};
use agritoken_storage::journal::{PayoutEventRecord, PayoutJournal};
use agritoken_storage::storage_traits::HoldingsStore;
use chrono::{DateTime, Utc};
use log::{error, info};
use rust_decimal::Decimal;
use std::sync::Arc;

pub struct HoldingsLedger {
    store: Arc<dyn HoldingsStore>,
    journal: Option<PayoutJournal>,
}

impl HoldingsLedger {
    pub fn new(store: Arc<dyn HoldingsStore>) -> Self {
        HoldingsLedger {
            store,
            journal: None,
        }
    }

    /// Attach a payout journal so multi-holding payout events are
    /// detectable after a crash.
    pub fn with_journal(store: Arc<dyn HoldingsStore>, journal: PayoutJournal) -> Self {
        HoldingsLedger {
            store,
            journal: Some(journal),
        }
    }

    /// Record a new holding. Rejects non-positive quantities and anything
    /// that would push the farm's summed holdings past its total supply;
    /// the ledger is unchanged on error.
    pub fn append(
        &self,
        farm: &FarmRecord,
        holding: Holding,
    ) -> Result<HoldingId, PlatformError> {
        if holding.tokens_owned == 0 {
            return Err(PlatformError::InvalidQuantity(holding.tokens_owned));
        }
        if holding.farm_id != farm.farm_id {
            return Err(PlatformError::Validation {
                field: "farmId".to_string(),
                reason: "holding does not reference this farm".to_string(),
            });
        }

        let mut holdings = self.store.load(&farm.farm_id)?;
        let owned: u64 = holdings.iter().map(|h| h.tokens_owned).sum();
        let available = farm.total_tokens.saturating_sub(owned);
        if holding.tokens_owned > available {
            return Err(PlatformError::Oversubscribed {
                farm_id: farm.farm_id.clone(),
                requested: holding.tokens_owned,
                available,
            });
        }

        let holding_id = holding.holding_id.clone();
        holdings.push(holding);
        self.store.save_all(&farm.farm_id, &holdings)?;
        info!(
            "appended holding {} ({} tokens) to farm {}",
            holding_id,
            holdings
                .last()
                .map(|h| h.tokens_owned)
                .unwrap_or_default(),
            farm.farm_id
        );
        Ok(holding_id)
    }

    /// All holdings for one farm, insertion order.
    pub fn by_farm(&self, farm_id: &FarmId) -> Result<Vec<Holding>, PlatformError> {
        self.store.load(farm_id)
    }

    /// All of one investor's holdings across farms.
    pub fn by_investor(&self, investor_email: &str) -> Result<Vec<Holding>, PlatformError> {
        Ok(self
            .store
            .load_all()?
            .into_iter()
            .filter(|h| h.investor_email == investor_email)
            .collect())
    }

    /// Apply one payout to one holding.
    pub fn apply_payout(
        &self,
        holding_id: &HoldingId,
        amount: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Result<(), PlatformError> {
        let farm_id = self
            .store
            .load_all()?
            .into_iter()
            .find(|h| &h.holding_id == holding_id)
            .map(|h| h.farm_id)
            .ok_or_else(|| PlatformError::NotFound(format!("holding {}", holding_id)))?;

        let mut holdings = self.store.load(&farm_id)?;
        for holding in holdings.iter_mut() {
            if &holding.holding_id == holding_id {
                holding.apply_payout(amount, timestamp);
            }
        }
        self.store.save_all(&farm_id, &holdings)
    }

    /// Apply one payout event to every named holding of a farm, atomically.
    ///
    /// The whole batch is validated first; if any member is unknown the
    /// batch is rejected and nothing is updated. The store replace is
    /// bracketed by journal markers when a journal is attached.
    pub fn apply_payout_batch(
        &self,
        farm_id: &FarmId,
        shares: &[(HoldingId, Decimal)],
        timestamp: DateTime<Utc>,
    ) -> Result<(), PlatformError> {
        let mut holdings = self.store.load(farm_id)?;

        for (holding_id, _) in shares {
            if !holdings.iter().any(|h| &h.holding_id == holding_id) {
                return Err(PlatformError::BatchApplyFailed(format!(
                    "holding {} not found in farm {}",
                    holding_id, farm_id
                )));
            }
        }

        let total: Decimal = shares.iter().map(|(_, amount)| *amount).sum();
        let event_id = match &self.journal {
            Some(journal) => Some(journal.begin(farm_id, total, timestamp)?),
            None => None,
        };

        for (holding_id, amount) in shares {
            for holding in holdings.iter_mut() {
                if &holding.holding_id == holding_id {
                    holding.apply_payout(*amount, timestamp);
                }
            }
        }

        if let Err(e) = self.store.save_all(farm_id, &holdings) {
            // snapshot on disk still predates the event; the open journal
            // entry correctly reports it as not-applied
            return Err(PlatformError::BatchApplyFailed(e.to_string()));
        }

        if let (Some(journal), Some(event_id)) = (&self.journal, event_id) {
            if let Err(e) = journal.commit(event_id) {
                // the payout is durable; only the marker is missing
                error!(
                    "payout event {} applied to farm {} but journal commit failed: {}",
                    event_id, farm_id, e
                );
                return Err(e);
            }
        }

        info!(
            "applied payout of {} across {} holdings of farm {}",
            total,
            shares.len(),
            farm_id
        );
        Ok(())
    }

    /// Re-mark every holding of a farm against a new per-token price.
    pub fn refresh_valuation(
        &self,
        farm_id: &FarmId,
        price_per_token: Decimal,
    ) -> Result<(), PlatformError> {
        let mut holdings = self.store.load(farm_id)?;
        for holding in holdings.iter_mut() {
            holding.mark_to(price_per_token);
        }
        self.store.save_all(farm_id, &holdings)
    }

    /// Payout events that started but never reached durability (empty when
    /// no journal is attached).
    pub fn unfinished_payouts(&self) -> Result<Vec<PayoutEventRecord>, PlatformError> {
        match &self.journal {
            Some(journal) => journal.unfinished(),
            None => Ok(Vec::new()),
        }
    }
}
