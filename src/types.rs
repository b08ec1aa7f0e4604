//! Shared types for the METALWATCH agent.
//!
//! These types form the data model used across all modules.
//! Everything except positions and the persisted snapshot/history is
//! created and discarded within a single run.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Asset classes
// ---------------------------------------------------------------------------

/// A tracked precious-metal asset class.
///
/// Purity factors and sanity floors are compile-time constants of the
/// class, never derived at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Gold,
    Silver,
}

impl AssetClass {
    /// All tracked asset classes, in fetch order.
    pub const ALL: [AssetClass; 2] = [AssetClass::Gold, AssetClass::Silver];

    /// Purity/grade multiplier converting the reference-grade index into
    /// the tradable-plan equivalent (24k → 18k for gold).
    pub fn purity_factor(&self) -> Decimal {
        match self {
            AssetClass::Gold => dec!(0.75),
            AssetClass::Silver => Decimal::ONE,
        }
    }

    /// Minimum plausible display price. Anything below this is a
    /// unit-conversion mistake, not a market move.
    pub fn sanity_floor(&self) -> Decimal {
        match self {
            AssetClass::Gold => dec!(100000),
            AssetClass::Silver => dec!(1000),
        }
    }

    /// Lowercase identifier used in logs, cache keys, and output.
    pub fn label(&self) -> &'static str {
        match self {
            AssetClass::Gold => "gold",
            AssetClass::Silver => "silver",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Quotes and normalized prices
// ---------------------------------------------------------------------------

/// A raw quote extracted from the pricing API.
///
/// `raw_price` is in the smallest currency unit (rial). Produced fresh
/// each run and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetQuote {
    pub asset: AssetClass,
    pub raw_price: Decimal,
    /// Daily change, already expressed as a percent (1.5 = +1.5%).
    pub daily_change_percent: Option<Decimal>,
}

/// A quote after unit and purity normalization (display currency, toman).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedPrice {
    pub asset: AssetClass,
    pub display_price: Decimal,
    pub purity_factor: Decimal,
}

/// Price direction derived from the daily change figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Neutral,
}

impl Trend {
    /// Changes within ±0.05% are treated as flat.
    pub fn from_change(change_percent: Option<Decimal>) -> Self {
        match change_percent {
            Some(c) if c > dec!(0.05) => Trend::Up,
            Some(c) if c < dec!(-0.05) => Trend::Down,
            _ => Trend::Neutral,
        }
    }
}

/// One asset's fully-resolved figures inside a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetSnapshot {
    pub asset: AssetClass,
    pub raw_price: Decimal,
    pub display_price: Decimal,
    pub purity_factor: Decimal,
    pub daily_change_percent: Option<Decimal>,
    pub trend: Trend,
}

impl AssetSnapshot {
    pub fn from_parts(quote: &AssetQuote, normalized: &NormalizedPrice) -> Self {
        Self {
            asset: quote.asset,
            raw_price: quote.raw_price,
            display_price: normalized.display_price,
            purity_factor: normalized.purity_factor,
            daily_change_percent: quote.daily_change_percent,
            trend: Trend::from_change(quote.daily_change_percent),
        }
    }
}

// ---------------------------------------------------------------------------
// Portfolio
// ---------------------------------------------------------------------------

/// A held position, supplied by configuration. Read-only to the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioPosition {
    pub quantity: Decimal,
    pub average_buy_price: Decimal,
}

impl PortfolioPosition {
    /// A zero position yields no metrics at all.
    pub fn is_empty(&self) -> bool {
        self.quantity.is_zero() || self.average_buy_price.is_zero()
    }
}

/// Valuation of a single position at the current price.
/// All monetary fields are rounded to 2 decimal places at the valuator
/// boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioMetrics {
    pub current_value: Decimal,
    pub fee_amount: Decimal,
    pub net_profit: Decimal,
    pub profit_percent: Decimal,
    pub break_even_price: Decimal,
}

/// Per-asset metrics entry within the aggregate summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetMetrics {
    pub asset: AssetClass,
    #[serde(flatten)]
    pub metrics: PortfolioMetrics,
}

/// Aggregate portfolio valuation across all configured positions.
///
/// The aggregate percent is computed over aggregate invested cost, not
/// as the mean of per-asset percents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub total_value: Decimal,
    pub total_invested: Decimal,
    pub net_profit: Decimal,
    pub profit_percent: Decimal,
    pub details: Vec<AssetMetrics>,
}

impl PortfolioSummary {
    pub fn metrics_for(&self, asset: AssetClass) -> Option<&PortfolioMetrics> {
        self.details
            .iter()
            .find(|d| d.asset == asset)
            .map(|d| &d.metrics)
    }
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// The condition an alert fired on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    PriceHigh,
    PriceLow,
    ProfitTarget,
    LossLimit,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlertKind::PriceHigh => "price_high",
            AlertKind::PriceLow => "price_low",
            AlertKind::ProfitTarget => "profit_target",
            AlertKind::LossLimit => "loss_limit",
        };
        f.write_str(s)
    }
}

/// A fired alert. Ephemeral: generated and delivered within one run,
/// never re-delivered from storage. There is no "already alerted"
/// suppression across runs — a condition that stays crossed re-fires on
/// every run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    pub id: Uuid,
    pub kind: AlertKind,
    pub asset: Option<AssetClass>,
    pub message: String,
    pub fired_at: DateTime<Utc>,
}

impl AlertEvent {
    pub fn new(kind: AlertKind, asset: Option<AssetClass>, message: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            asset,
            message,
            fired_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Where a snapshot's data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    Live,
    Cached,
}

impl fmt::Display for SnapshotSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotSource::Live => f.write_str("live"),
            SnapshotSource::Cached => f.write_str("cached"),
        }
    }
}

/// One complete, timestamped result of a pipeline run. The single unit
/// of persistence and output; its serialization is the output document,
/// with no extra hidden fields (`portfolio: null` marks "not
/// configured").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    pub source: SnapshotSource,
    pub assets: Vec<AssetSnapshot>,
    pub portfolio: Option<PortfolioSummary>,
    pub alerts: Vec<AlertEvent>,
}

impl Snapshot {
    pub fn price_of(&self, asset: AssetClass) -> Option<Decimal> {
        self.assets
            .iter()
            .find(|a| a.asset == asset)
            .map(|a| a.display_price)
    }

    /// Re-stamp a stored snapshot for serving as a fallback. The prices
    /// are display-only; alerts belong to the run that fired them and
    /// are cleared so a cached run never re-reports them.
    pub fn into_cached(mut self) -> Self {
        self.source = SnapshotSource::Cached;
        self.alerts.clear();
        self
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// One asset's key price within a history entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPrice {
    pub asset: AssetClass,
    pub display_price: Decimal,
}

/// Key figures of one run, appended to the bounded history ring.
/// Only live-sourced runs append.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub taken_at: DateTime<Utc>,
    pub prices: Vec<HistoryPrice>,
    pub portfolio_value: Option<Decimal>,
    pub net_profit: Option<Decimal>,
}

impl HistoryEntry {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            taken_at: snapshot.taken_at,
            prices: snapshot
                .assets
                .iter()
                .map(|a| HistoryPrice {
                    asset: a.asset,
                    display_price: a.display_price,
                })
                .collect(),
            portfolio_value: snapshot.portfolio.as_ref().map(|p| p.total_value),
            net_profit: snapshot.portfolio.as_ref().map(|p| p.net_profit),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for METALWATCH.
///
/// Everything except `NoDataAvailable` is recoverable: asset-level
/// failures resolve into the live-vs-cache decision at the orchestrator,
/// and persistence failures are logged without aborting the run.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("price feed failure for {asset}: {message}")]
    FetchFailure { asset: AssetClass, message: String },

    #[error("no usable price found for {asset}; payload: {payload}")]
    NoPriceFound { asset: AssetClass, payload: String },

    #[error("price {price} for {asset} is below the sanity floor {floor}")]
    InvalidPriceRange {
        asset: AssetClass,
        price: Decimal,
        floor: Decimal,
    },

    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("no live data and no cached snapshot available")]
    NoDataAvailable,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
