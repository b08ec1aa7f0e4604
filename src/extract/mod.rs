//! Quote extraction from loosely-specified pricing API payloads.
//!
//! The pricing endpoint has no contractual response shape: the price may
//! sit under a top-level `data` object, under `latestIndexPrice.index`,
//! under `prevIndexPrice.index`, or under an arbitrarily-named numeric
//! field. Extraction is an ordered list of named, pure strategies
//! evaluated first-match-wins; a new payload shape is handled by
//! appending a strategy, not by editing nested conditionals.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::debug;

use crate::types::{AssetClass, AssetQuote, MonitorError};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Field names probed in priority order by the known-fields strategy.
const KNOWN_PRICE_FIELDS: &[&str] = &[
    "price",
    "Price",
    "lastPrice",
    "LastPrice",
    "value",
    "Value",
    "currentPrice",
    "CurrentPrice",
];

/// The blind numeric scan only accepts values above this, so that id and
/// status-code sized fields never pass as prices.
const NUMERIC_SCAN_FLOOR: f64 = 1000.0;

/// Daily-change values with magnitude below this are fractions-of-one
/// and get multiplied by 100 to express a percent.
const CHANGE_FRACTION_CUTOFF: f64 = 10.0;

/// Maximum characters of raw payload carried in a `NoPriceFound` error.
const PAYLOAD_DUMP_LIMIT: usize = 512;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// A single extraction attempt: pure, returns the price or nothing.
type Strategy = (&'static str, fn(&Value) -> Option<f64>);

/// Full strategy list for object payloads, in strict priority order.
const OBJECT_STRATEGIES: &[Strategy] = &[
    ("latest_index", latest_index),
    ("prev_index", prev_index),
    ("known_fields", known_fields),
    ("numeric_scan", numeric_scan),
];

/// List payloads are probed through their first element, skipping the
/// live-index strategy (list responses never carry it).
const LIST_STRATEGIES: &[Strategy] = &[
    ("prev_index", prev_index),
    ("known_fields", known_fields),
    ("numeric_scan", numeric_scan),
];

/// Zero is never a legitimate asset price.
fn non_zero(x: f64) -> Option<f64> {
    (x != 0.0).then_some(x)
}

/// `latestIndexPrice.index` — the authoritative live index value.
fn latest_index(payload: &Value) -> Option<f64> {
    payload
        .get("latestIndexPrice")?
        .get("index")?
        .as_f64()
        .and_then(non_zero)
}

/// `prevIndexPrice.index` — previous session's index, used when the live
/// one is absent or zero.
fn prev_index(payload: &Value) -> Option<f64> {
    payload
        .get("prevIndexPrice")?
        .get("index")?
        .as_f64()
        .and_then(non_zero)
}

/// Known price-field names at the top level, in priority order.
fn known_fields(payload: &Value) -> Option<f64> {
    let obj = payload.as_object()?;
    KNOWN_PRICE_FIELDS
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_f64).and_then(non_zero))
}

/// Last resort: any top-level numeric field above the magnitude floor.
/// Fields whose name contains `id` or `code` are excluded.
fn numeric_scan(payload: &Value) -> Option<f64> {
    let obj = payload.as_object()?;
    obj.iter().find_map(|(name, value)| {
        let lowered = name.to_lowercase();
        if lowered.contains("id") || lowered.contains("code") {
            return None;
        }
        value.as_f64().filter(|x| *x > NUMERIC_SCAN_FLOOR)
    })
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Extract a raw minor-unit price (and daily change, when present) from
/// an untyped API response.
///
/// Exhausting every strategy is a recoverable `NoPriceFound`; the
/// orchestrator resolves it into the cache fallback.
pub fn extract(raw: &Value, asset: AssetClass) -> Result<AssetQuote, MonitorError> {
    let working = working_payload(raw);

    let (strategies, target): (&[Strategy], &Value) = match working.as_array() {
        Some(items) => (LIST_STRATEGIES, items.first().unwrap_or(&Value::Null)),
        None => (OBJECT_STRATEGIES, working),
    };

    for (name, attempt) in strategies {
        if let Some(price) = attempt(target) {
            debug!(asset = %asset, strategy = name, price, "Price extracted");
            let raw_price =
                Decimal::from_f64(price).ok_or_else(|| MonitorError::NoPriceFound {
                    asset,
                    payload: truncated_dump(raw),
                })?;
            return Ok(AssetQuote {
                asset,
                raw_price,
                daily_change_percent: daily_change(target),
            });
        }
    }

    Err(MonitorError::NoPriceFound {
        asset,
        payload: truncated_dump(raw),
    })
}

/// Resolve the object the strategies operate on: descend into a
/// top-level `data` sub-object when present, else use the payload as-is.
fn working_payload(raw: &Value) -> &Value {
    match raw.get("data") {
        Some(data) if data.is_object() || data.is_array() => data,
        _ => raw,
    }
}

/// Daily change from `latestIndexPrice.value`. Magnitudes below 10 are
/// fractions-of-one and become percents; larger values already are.
fn daily_change(payload: &Value) -> Option<Decimal> {
    let value = payload.get("latestIndexPrice")?.get("value")?.as_f64()?;
    let percent = if value.abs() < CHANGE_FRACTION_CUTOFF {
        value * 100.0
    } else {
        value
    };
    // 4 dp is plenty for a change figure and shakes off float noise.
    Decimal::from_f64(percent).map(|d| d.round_dp(4))
}

/// Compact payload dump for diagnostics, truncated on a char boundary.
fn truncated_dump(raw: &Value) -> String {
    let dump = raw.to_string();
    if dump.chars().count() <= PAYLOAD_DUMP_LIMIT {
        return dump;
    }
    let mut truncated: String = dump.chars().take(PAYLOAD_DUMP_LIMIT).collect();
    truncated.push_str("…");
    truncated
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
