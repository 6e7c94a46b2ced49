//! Maps heterogeneous stored farm/holding records onto the canonical schema.
//!
//! Records written by earlier deployments use a mix of key names
//! (`"Farm Name"` vs `farmName`, `"ASA ID"` vs `assetRef`) and omit fields
//! that later versions added. Each canonical field resolves through an
//! ordered alias list: the first present, non-empty value wins, otherwise a
//! documented default applies. Numeric coercion is always explicit; a value
//! that cannot be parsed produces an error naming the canonical field, never
//! a silent zero.
//!
//! Normalization is pure and idempotent: a canonical record serialized back
//! to JSON normalizes to an equal record.

use crate::error::PlatformError;
use crate::farm::{FarmRecord, FarmStatus};
use crate::holding::Holding;
use crate::id::{AssetRef, FarmId, HoldingId};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// An untyped key/value record as read from a store file.
pub type RawRecord = serde_json::Map<String, Value>;

/// A raw record resolved onto one of the two canonical schemas.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedRecord {
    Farm(FarmRecord),
    Holding(Holding),
}

// Alias tables. The first entry of each list is the canonical camelCase
// key the platform writes; the rest are historical spellings still found
// in stored data.

const FARM_ID_KEYS: &[&str] = &["farmId", "id", "Farm ID"];
const FARM_NAME_KEYS: &[&str] = &["farmName", "Farm Name", "name"];
const FARMER_NAME_KEYS: &[&str] = &["farmerName", "Farmer Name"];
const FARMER_EMAIL_KEYS: &[&str] = &["farmerEmail", "Farmer Email", "Farm Email"];
const WALLET_ADDRESS_KEYS: &[&str] = &["walletAddress", "Wallet Address"];
const FARM_LOCATION_KEYS: &[&str] = &["farmLocation", "Farm Location", "location"];
const CROP_TYPE_KEYS: &[&str] = &["cropType", "Crop Type", "crop"];
const FARM_SIZE_KEYS: &[&str] = &["farmSizeAcres", "Farm Size (Acres)", "acres"];
const TOTAL_TOKENS_KEYS: &[&str] = &["totalTokens", "Number of Tokens", "tokenSupply", "Token Supply"];
const TOKENS_SOLD_KEYS: &[&str] = &["tokensSold", "Tokens Sold"];
const TOKENS_AVAILABLE_KEYS: &[&str] = &["tokensAvailable", "Tokens Available"];
const PRICE_PER_TOKEN_KEYS: &[&str] = &["pricePerToken", "Price per Token (USD)", "price"];
const TOKEN_NAME_KEYS: &[&str] = &["tokenName", "Token Name"];
const TOKEN_UNIT_KEYS: &[&str] = &["tokenUnit", "Token Unit"];
const HARVEST_DATE_KEYS: &[&str] = &["harvestDate", "Harvest Date"];
const INSURANCE_ENABLED_KEYS: &[&str] = &["insuranceEnabled", "Insurance Enabled"];
const INSURANCE_TYPE_KEYS: &[&str] = &["insuranceType", "Insurance Type"];
const ASSET_REF_KEYS: &[&str] = &["assetRef", "Asset ID", "ASA ID", "asaId"];
const STATUS_KEYS: &[&str] = &["status", "Farm Status"];
const CREATED_AT_KEYS: &[&str] = &["createdAt", "created_at"];
const UPDATED_AT_KEYS: &[&str] = &["updatedAt", "updated_at"];
const TOKENIZED_AT_KEYS: &[&str] = &["tokenizedAt", "tokenized_at"];

const HOLDING_ID_KEYS: &[&str] = &["holdingId", "id"];
// bare "id" is the holding's own id, so the farm reference resolves
// through the explicit spellings only
const HOLDING_FARM_ID_KEYS: &[&str] = &["farmId", "Farm ID"];
const INVESTOR_EMAIL_KEYS: &[&str] = &["investorEmail", "Investor Email", "investorId"];
const TOKENS_OWNED_KEYS: &[&str] = &["tokensOwned", "tokensHeld", "Tokens Owned"];
const COST_BASIS_KEYS: &[&str] = &["costBasis", "Cost Basis", "amountInvested"];
const EST_VALUE_KEYS: &[&str] = &["estValue", "Estimated Value"];
const REALIZED_PNL_KEYS: &[&str] = &["realizedPnl", "realizedPnL"];
const TOTAL_PAYOUTS_KEYS: &[&str] = &["totalPayoutsReceived", "Total Payouts Received"];
const LAST_PAYOUT_AT_KEYS: &[&str] = &["lastPayoutAt"];
const ACQUIRED_AT_KEYS: &[&str] = &["acquiredAt", "purchaseDate", "Purchase Date"];

/// Default insurance product attached to listings that predate the
/// insurance fields.
pub const DEFAULT_INSURANCE_TYPE: &str = "Parametric Weather-Based";

/// Every farm-field alias group, canonical key first.
const FARM_FIELD_ALIASES: &[&[&str]] = &[
    FARM_ID_KEYS,
    FARM_NAME_KEYS,
    FARMER_NAME_KEYS,
    FARMER_EMAIL_KEYS,
    WALLET_ADDRESS_KEYS,
    FARM_LOCATION_KEYS,
    CROP_TYPE_KEYS,
    FARM_SIZE_KEYS,
    TOTAL_TOKENS_KEYS,
    TOKENS_SOLD_KEYS,
    TOKENS_AVAILABLE_KEYS,
    PRICE_PER_TOKEN_KEYS,
    TOKEN_NAME_KEYS,
    TOKEN_UNIT_KEYS,
    HARVEST_DATE_KEYS,
    INSURANCE_ENABLED_KEYS,
    INSURANCE_TYPE_KEYS,
    ASSET_REF_KEYS,
    STATUS_KEYS,
    CREATED_AT_KEYS,
    UPDATED_AT_KEYS,
    TOKENIZED_AT_KEYS,
];

/// Map any accepted farm-field spelling onto its canonical key. Returns
/// None for keys no schema version ever used.
pub fn canonical_farm_key(key: &str) -> Option<&'static str> {
    FARM_FIELD_ALIASES
        .iter()
        .find(|group| group.contains(&key))
        .map(|group| group[0])
}

/// Resolve a raw record onto the canonical schema it matches. Holding-only
/// keys discriminate first; anything with a farm-name key is a farm.
pub fn normalize(raw: &RawRecord) -> Result<NormalizedRecord, PlatformError> {
    if first_present(raw, INVESTOR_EMAIL_KEYS).is_some()
        || first_present(raw, TOKENS_OWNED_KEYS).is_some()
    {
        Ok(NormalizedRecord::Holding(normalize_holding(raw)?))
    } else if first_present(raw, FARM_NAME_KEYS).is_some() {
        Ok(NormalizedRecord::Farm(normalize_farm(raw)?))
    } else {
        Err(bad("record", "neither a farm nor a holding record"))
    }
}

/// Map a raw farm record onto [`FarmRecord`].
pub fn normalize_farm(raw: &RawRecord) -> Result<FarmRecord, PlatformError> {
    let farm_id = FarmId::new(require_string(raw, FARM_ID_KEYS)?);
    let total_tokens = require_u64(raw, TOTAL_TOKENS_KEYS)?;
    let tokens_sold = u64_or(raw, TOKENS_SOLD_KEYS, 0)?;
    // tokensAvailable defaults to the supply not yet sold
    let tokens_available = match first_present(raw, TOKENS_AVAILABLE_KEYS) {
        Some(value) => coerce_u64(TOKENS_AVAILABLE_KEYS[0], value)?,
        None => total_tokens.saturating_sub(tokens_sold),
    };

    let asset_ref = asset_ref_field(raw)?;
    let status = match first_present(raw, STATUS_KEYS) {
        Some(value) => {
            let label = coerce_string(STATUS_KEYS[0], value)?;
            FarmStatus::parse(&label)
                .ok_or_else(|| bad(STATUS_KEYS[0], format!("unknown status '{}'", label)))?
        }
        // legacy records carry no status; an attached asset implies Tokenized
        None if asset_ref.is_some() => FarmStatus::Tokenized,
        None => FarmStatus::Pending,
    };

    let created_at = datetime_or_epoch(raw, CREATED_AT_KEYS)?;
    let updated_at = match optional_datetime(raw, UPDATED_AT_KEYS)? {
        Some(ts) => ts,
        None => created_at,
    };

    Ok(FarmRecord {
        farm_id,
        farm_name: require_string(raw, FARM_NAME_KEYS)?,
        farmer_name: string_or(raw, FARMER_NAME_KEYS, "")?,
        farmer_email: require_string(raw, FARMER_EMAIL_KEYS)?,
        wallet_address: string_or(raw, WALLET_ADDRESS_KEYS, "")?,
        farm_location: string_or(raw, FARM_LOCATION_KEYS, "")?,
        crop_type: string_or(raw, CROP_TYPE_KEYS, "")?,
        farm_size_acres: decimal_or(raw, FARM_SIZE_KEYS, Decimal::ZERO)?,
        total_tokens,
        tokens_sold,
        tokens_available,
        price_per_token: require_decimal(raw, PRICE_PER_TOKEN_KEYS)?,
        token_name: string_or(raw, TOKEN_NAME_KEYS, "")?,
        token_unit: string_or(raw, TOKEN_UNIT_KEYS, "")?,
        harvest_date: optional_string(raw, HARVEST_DATE_KEYS)?,
        insurance_enabled: bool_or(raw, INSURANCE_ENABLED_KEYS, false)?,
        insurance_type: string_or(raw, INSURANCE_TYPE_KEYS, DEFAULT_INSURANCE_TYPE)?,
        asset_ref,
        status,
        created_at,
        updated_at,
        tokenized_at: optional_datetime(raw, TOKENIZED_AT_KEYS)?,
    })
}

/// Map a raw holding record onto [`Holding`].
pub fn normalize_holding(raw: &RawRecord) -> Result<Holding, PlatformError> {
    let cost_basis = require_decimal(raw, COST_BASIS_KEYS)?;
    Ok(Holding {
        holding_id: HoldingId::new(require_string(raw, HOLDING_ID_KEYS)?),
        investor_email: require_string(raw, INVESTOR_EMAIL_KEYS)?,
        farm_id: FarmId::new(require_string(raw, HOLDING_FARM_ID_KEYS)?),
        tokens_owned: require_u64(raw, TOKENS_OWNED_KEYS)?,
        cost_basis,
        // a never-marked position is carried at cost
        est_value: decimal_or(raw, EST_VALUE_KEYS, cost_basis)?,
        realized_pnl: decimal_or(raw, REALIZED_PNL_KEYS, Decimal::ZERO)?,
        total_payouts_received: decimal_or(raw, TOTAL_PAYOUTS_KEYS, Decimal::ZERO)?,
        last_payout_at: optional_datetime(raw, LAST_PAYOUT_AT_KEYS)?,
        acquired_at: datetime_or_epoch(raw, ACQUIRED_AT_KEYS)?,
    })
}

// ---- alias resolution and coercion helpers ----

fn first_present<'a>(raw: &'a RawRecord, keys: &[&str]) -> Option<&'a Value> {
    for key in keys {
        if let Some(value) = raw.get(*key) {
            match value {
                Value::Null => continue,
                Value::String(s) if s.trim().is_empty() => continue,
                _ => return Some(value),
            }
        }
    }
    None
}

fn missing(field: &str) -> PlatformError {
    PlatformError::Normalization {
        field: field.to_string(),
        reason: "required field missing".to_string(),
    }
}

fn bad(field: &str, reason: impl Into<String>) -> PlatformError {
    PlatformError::Normalization {
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn coerce_string(field: &str, value: &Value) -> Result<String, PlatformError> {
    match value {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(bad(field, format!("expected a string, got {}", other))),
    }
}

fn coerce_u64(field: &str, value: &Value) -> Result<u64, PlatformError> {
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                return Ok(v);
            }
            // JSON written by other tooling may carry integral floats
            if let Some(f) = n.as_f64() {
                if f >= 0.0 && f.fract() == 0.0 {
                    return Ok(f as u64);
                }
            }
            Err(bad(field, format!("not a whole non-negative number: {}", n)))
        }
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| bad(field, format!("not a whole non-negative number: '{}'", s))),
        other => Err(bad(field, format!("expected a number, got {}", other))),
    }
}

fn coerce_decimal(field: &str, value: &Value) -> Result<Decimal, PlatformError> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .map_err(|_| bad(field, format!("not a decimal number: {}", n))),
        Value::String(s) => Decimal::from_str(s.trim())
            .map_err(|_| bad(field, format!("not a decimal number: '{}'", s))),
        other => Err(bad(field, format!("expected a number, got {}", other))),
    }
}

fn coerce_bool(field: &str, value: &Value) -> Result<bool, PlatformError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Ok(true),
            "false" | "no" => Ok(false),
            other => Err(bad(field, format!("not a boolean: '{}'", other))),
        },
        other => Err(bad(field, format!("expected a boolean, got {}", other))),
    }
}

fn coerce_datetime(field: &str, value: &Value) -> Result<DateTime<Utc>, PlatformError> {
    let text = coerce_string(field, value)?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(&text) {
        return Ok(ts.with_timezone(&Utc));
    }
    // bare dates from older records resolve to midnight UTC
    if let Ok(date) = NaiveDate::parse_from_str(&text, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&midnight));
        }
    }
    Err(bad(field, format!("not a timestamp: '{}'", text)))
}

fn require_string(raw: &RawRecord, keys: &[&str]) -> Result<String, PlatformError> {
    first_present(raw, keys)
        .ok_or_else(|| missing(keys[0]))
        .and_then(|value| coerce_string(keys[0], value))
}

fn string_or(raw: &RawRecord, keys: &[&str], default: &str) -> Result<String, PlatformError> {
    match first_present(raw, keys) {
        Some(value) => coerce_string(keys[0], value),
        None => Ok(default.to_string()),
    }
}

fn optional_string(raw: &RawRecord, keys: &[&str]) -> Result<Option<String>, PlatformError> {
    match first_present(raw, keys) {
        Some(value) => Ok(Some(coerce_string(keys[0], value)?)),
        None => Ok(None),
    }
}

fn require_u64(raw: &RawRecord, keys: &[&str]) -> Result<u64, PlatformError> {
    first_present(raw, keys)
        .ok_or_else(|| missing(keys[0]))
        .and_then(|value| coerce_u64(keys[0], value))
}

fn u64_or(raw: &RawRecord, keys: &[&str], default: u64) -> Result<u64, PlatformError> {
    match first_present(raw, keys) {
        Some(value) => coerce_u64(keys[0], value),
        None => Ok(default),
    }
}

fn require_decimal(raw: &RawRecord, keys: &[&str]) -> Result<Decimal, PlatformError> {
    first_present(raw, keys)
        .ok_or_else(|| missing(keys[0]))
        .and_then(|value| coerce_decimal(keys[0], value))
}

fn decimal_or(raw: &RawRecord, keys: &[&str], default: Decimal) -> Result<Decimal, PlatformError> {
    match first_present(raw, keys) {
        Some(value) => coerce_decimal(keys[0], value),
        None => Ok(default),
    }
}

fn bool_or(raw: &RawRecord, keys: &[&str], default: bool) -> Result<bool, PlatformError> {
    match first_present(raw, keys) {
        Some(value) => coerce_bool(keys[0], value),
        None => Ok(default),
    }
}

fn optional_datetime(
    raw: &RawRecord,
    keys: &[&str],
) -> Result<Option<DateTime<Utc>>, PlatformError> {
    match first_present(raw, keys) {
        Some(value) => Ok(Some(coerce_datetime(keys[0], value)?)),
        None => Ok(None),
    }
}

fn datetime_or_epoch(raw: &RawRecord, keys: &[&str]) -> Result<DateTime<Utc>, PlatformError> {
    match optional_datetime(raw, keys)? {
        Some(ts) => Ok(ts),
        None => Ok(epoch()),
    }
}

/// Timestamp default for records written before timestamps were recorded.
fn epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(0, 0).single().unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Asset references need one extra rule: very old records used the numeric
/// placeholder `0` to mean "not tokenized yet".
fn asset_ref_field(raw: &RawRecord) -> Result<Option<AssetRef>, PlatformError> {
    match first_present(raw, ASSET_REF_KEYS) {
        Some(value) => {
            let text = coerce_string(ASSET_REF_KEYS[0], value)?;
            if text == "0" {
                Ok(None)
            } else {
                Ok(Some(AssetRef::new(text)))
            }
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawRecord {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be a JSON object"),
        }
    }

    #[test]
    fn test_legacy_farm_record_resolves_aliases() {
        let legacy = raw(json!({
            "id": 1,
            "Farm Name": "Sunridge Coffee",
            "Farm Email": "owner@sunridge.example",
            "Number of Tokens": "12000",
            "Tokens Sold": 9600,
            "Price per Token (USD)": 25.0,
            "ASA ID": 456789123,
            "Crop Type": "Coffee",
            "Farm Location": "Huila, Colombia"
        }));

        let farm = normalize_farm(&legacy).unwrap();
        assert_eq!(farm.farm_id, FarmId::new("1"));
        assert_eq!(farm.farm_name, "Sunridge Coffee");
        assert_eq!(farm.farmer_email, "owner@sunridge.example");
        assert_eq!(farm.total_tokens, 12_000);
        assert_eq!(farm.tokens_sold, 9_600);
        // default: supply not yet sold
        assert_eq!(farm.tokens_available, 2_400);
        assert_eq!(farm.price_per_token, Decimal::from(25));
        assert_eq!(farm.asset_ref, Some(AssetRef::new("456789123")));
        // asset attached implies Tokenized when no status is stored
        assert_eq!(farm.status, FarmStatus::Tokenized);
        assert_eq!(farm.insurance_type, DEFAULT_INSURANCE_TYPE);
        assert!(!farm.insurance_enabled);
    }

    #[test]
    fn test_zero_asset_id_placeholder_means_untokenized() {
        let legacy = raw(json!({
            "farmId": "farm-3",
            "farmName": "Riverbend Rice",
            "farmerEmail": "owner@riverbend.example",
            "totalTokens": 500,
            "pricePerToken": "2.50",
            "Asset ID": 0
        }));

        let farm = normalize_farm(&legacy).unwrap();
        assert_eq!(farm.asset_ref, None);
        assert_eq!(farm.status, FarmStatus::Pending);
    }

    #[test]
    fn test_coercion_failure_names_canonical_field() {
        let legacy = raw(json!({
            "id": 7,
            "Farm Name": "Bad Farm",
            "Farmer Email": "x@y.example",
            "Number of Tokens": "lots",
            "pricePerToken": 1
        }));

        let err = normalize_farm(&legacy).unwrap_err();
        match err {
            PlatformError::Normalization { field, .. } => assert_eq!(field, "totalTokens"),
            other => panic!("expected normalization error, got {}", other),
        }
    }

    #[test]
    fn test_missing_required_field_is_an_error_not_a_default() {
        let legacy = raw(json!({
            "farmId": "farm-9",
            "farmName": "No Price Farm",
            "farmerEmail": "x@y.example",
            "totalTokens": 100
        }));

        let err = normalize_farm(&legacy).unwrap_err();
        match err {
            PlatformError::Normalization { field, .. } => assert_eq!(field, "pricePerToken"),
            other => panic!("expected normalization error, got {}", other),
        }
    }

    #[test]
    fn test_farm_normalization_is_idempotent() {
        let farm = FarmRecord::sample_for_tests("farm-1", 25_000);
        let first = normalize_farm(&raw(serde_json::to_value(&farm).unwrap())).unwrap();
        let second = normalize_farm(&raw(serde_json::to_value(&first).unwrap())).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, farm);
    }

    #[test]
    fn test_legacy_holding_record_resolves_aliases() {
        let legacy = raw(json!({
            "id": "holding-1",
            "Investor Email": "investor@example.com",
            "farmId": "farm-1",
            "tokensHeld": 1250,
            "Cost Basis": 15625,
            "purchaseDate": "2024-04-01"
        }));

        let holding = normalize_holding(&legacy).unwrap();
        assert_eq!(holding.holding_id, HoldingId::new("holding-1"));
        assert_eq!(holding.tokens_owned, 1250);
        assert_eq!(holding.cost_basis, Decimal::from(15_625));
        // defaults for fields that postdate the record
        assert_eq!(holding.est_value, holding.cost_basis);
        assert_eq!(holding.realized_pnl, Decimal::ZERO);
        assert_eq!(holding.total_payouts_received, Decimal::ZERO);
        assert!(holding.last_payout_at.is_none());
        assert_eq!(
            holding.acquired_at,
            Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_holding_normalization_is_idempotent() {
        let holding = Holding::sample_for_tests("holding-1", "farm-1", 480);
        let first = normalize_holding(&raw(serde_json::to_value(&holding).unwrap())).unwrap();
        let second = normalize_holding(&raw(serde_json::to_value(&first).unwrap())).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, holding);
    }

    #[test]
    fn test_canonical_farm_key_resolves_aliases() {
        assert_eq!(canonical_farm_key("ASA ID"), Some("assetRef"));
        assert_eq!(canonical_farm_key("Farm Email"), Some("farmerEmail"));
        assert_eq!(canonical_farm_key("farmName"), Some("farmName"));
        assert_eq!(canonical_farm_key("unknown key"), None);
    }

    #[test]
    fn test_discriminator_routes_by_key_family() {
        let farm = raw(serde_json::to_value(FarmRecord::sample_for_tests("f", 10)).unwrap());
        assert!(matches!(
            normalize(&farm).unwrap(),
            NormalizedRecord::Farm(_)
        ));

        let holding =
            raw(serde_json::to_value(Holding::sample_for_tests("h", "f", 10)).unwrap());
        assert!(matches!(
            normalize(&holding).unwrap(),
            NormalizedRecord::Holding(_)
        ));

        let junk = raw(json!({"unrelated": true}));
        assert!(normalize(&junk).is_err());
    }
}
