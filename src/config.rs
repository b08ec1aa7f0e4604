//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (the Telegram credentials) are referenced by env-var name in
//! the config and resolved at runtime via `std::env::var`. The core
//! components never read the environment themselves; they receive plain
//! injected values built from this object at process start.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fs;

use crate::types::AssetClass;

/// Low band applied when an asset has no explicit `low_band`: 95% of the
/// high band. This preserves the single-threshold legacy behavior while
/// enabling two-sided bands.
pub const DEFAULT_LOW_BAND_RATIO: Decimal = dec!(0.95);

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub monitor: MonitorConfig,
    pub feed: FeedConfig,
    pub assets: AssetsConfig,
    #[serde(default)]
    pub portfolio: PortfolioConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    pub name: String,
    /// Path of the JSON output artifact written after each successful run.
    #[serde(default = "default_output_file")]
    pub output_file: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    /// Pricing API base URL; the per-asset plan segment is appended.
    pub base_url: String,
    /// Bound on every feed request. A timeout is a fetch failure.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssetsConfig {
    pub gold: AssetConfig,
    pub silver: AssetConfig,
}

impl AssetsConfig {
    pub fn for_asset(&self, asset: AssetClass) -> &AssetConfig {
        match asset {
            AssetClass::Gold => &self.gold,
            AssetClass::Silver => &self.silver,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssetConfig {
    /// API plan path segment, e.g. "Gold".
    pub plan: String,
    /// Display-currency price at or above which `price_high` fires.
    pub high_band: Decimal,
    /// Display-currency price at or below which `price_low` fires.
    /// Defaults to `DEFAULT_LOW_BAND_RATIO` × `high_band` when unset.
    #[serde(default)]
    pub low_band: Option<Decimal>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PortfolioConfig {
    /// Sell-side fee in percent (1.0 = 1%).
    #[serde(default = "default_fee_rate_pct")]
    pub fee_rate_pct: Decimal,
    /// Aggregate profit percent at or above which `profit_target` fires.
    #[serde(default)]
    pub profit_target_pct: Option<Decimal>,
    /// Aggregate loss percent (positive number) at or beyond which
    /// `loss_limit` fires. The profit check short-circuits this one.
    #[serde(default)]
    pub loss_limit_pct: Option<Decimal>,
    #[serde(default)]
    pub gold: Option<PositionConfig>,
    #[serde(default)]
    pub silver: Option<PositionConfig>,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            fee_rate_pct: default_fee_rate_pct(),
            profit_target_pct: None,
            loss_limit_pct: None,
            gold: None,
            silver: None,
        }
    }
}

impl PortfolioConfig {
    /// Fee rate as a fraction (0.01 for 1%).
    pub fn fee_rate(&self) -> Decimal {
        self.fee_rate_pct / dec!(100)
    }

    pub fn position_for(&self, asset: AssetClass) -> Option<&PositionConfig> {
        match asset {
            AssetClass::Gold => self.gold.as_ref(),
            AssetClass::Silver => self.silver.as_ref(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PositionConfig {
    pub quantity: Decimal,
    pub average_buy_price: Decimal,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Backing file of the key-value cache.
    #[serde(default = "default_cache_path")]
    pub path: String,
    /// Maximum retained history entries; oldest are evicted first.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
            history_capacity: default_history_capacity(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AlertsConfig {
    pub telegram_bot_token_env: Option<String>,
    pub telegram_chat_id_env: Option<String>,
}

fn default_output_file() -> String {
    "market_data.json".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_fee_rate_pct() -> Decimal {
    dec!(1.0)
}

fn default_cache_path() -> String {
    "metalwatch_cache.json".to_string()
}

fn default_history_capacity() -> usize {
    60
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
