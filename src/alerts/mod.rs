//! Threshold evaluation — price bands and portfolio targets.
//!
//! Pure level-crossing against the current values only: no hysteresis
//! and no cross-run "already fired" memory, so a price parked at or
//! above a band fires on every run until it moves back below. The
//! orchestrator only invokes this for live-sourced data; cached runs
//! never evaluate alerts.

use rust_decimal::Decimal;
use tracing::debug;

use crate::config::DEFAULT_LOW_BAND_RATIO;
use crate::types::{AlertEvent, AlertKind, AssetClass, NormalizedPrice, PortfolioSummary};

// ---------------------------------------------------------------------------
// Bands
// ---------------------------------------------------------------------------

/// Two-sided price band for one asset.
#[derive(Debug, Clone, PartialEq)]
pub struct Bands {
    /// Fires `price_high` at or above this.
    pub high: Decimal,
    /// Fires `price_low` at or below this.
    pub low: Decimal,
}

impl Bands {
    /// Resolve a configured band pair, applying the documented default
    /// (`DEFAULT_LOW_BAND_RATIO` × high) when no explicit low is set.
    pub fn resolve(high: Decimal, low: Option<Decimal>) -> Self {
        Self {
            high,
            low: low.unwrap_or(high * DEFAULT_LOW_BAND_RATIO),
        }
    }
}

/// Portfolio-level bands. The profit check short-circuits the loss
/// check: at most one of the two fires per run.
#[derive(Debug, Clone, Default)]
pub struct PortfolioBands {
    pub profit_target_pct: Option<Decimal>,
    /// Positive number; fires once aggregate profit percent reaches its
    /// negation.
    pub loss_limit_pct: Option<Decimal>,
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

/// Decides which alert conditions fire for the current run.
pub struct ThresholdEvaluator {
    bands: Vec<(AssetClass, Bands)>,
    portfolio_bands: PortfolioBands,
}

impl ThresholdEvaluator {
    pub fn new(bands: Vec<(AssetClass, Bands)>, portfolio_bands: PortfolioBands) -> Self {
        Self {
            bands,
            portfolio_bands,
        }
    }

    /// Evaluate every configured band against the current values.
    /// Exact equality with a band counts as crossed.
    pub fn evaluate(
        &self,
        prices: &[NormalizedPrice],
        portfolio: Option<&PortfolioSummary>,
    ) -> Vec<AlertEvent> {
        let mut alerts = Vec::new();

        for (asset, bands) in &self.bands {
            let Some(price) = prices.iter().find(|p| p.asset == *asset) else {
                continue;
            };
            if let Some(alert) = Self::evaluate_asset(*asset, price.display_price, bands, portfolio)
            {
                alerts.push(alert);
            }
        }

        if let Some(summary) = portfolio {
            if let Some(alert) = self.evaluate_portfolio(summary) {
                alerts.push(alert);
            }
        }

        alerts
    }

    fn evaluate_asset(
        asset: AssetClass,
        price: Decimal,
        bands: &Bands,
        portfolio: Option<&PortfolioSummary>,
    ) -> Option<AlertEvent> {
        let position_note = portfolio
            .and_then(|p| p.metrics_for(asset))
            .map(|m| format!(" Position profit: {}%.", m.profit_percent))
            .unwrap_or_default();

        if price >= bands.high {
            let message = format!(
                "{asset} price alert: {price} crossed the high band at {}.{position_note}",
                bands.high
            );
            return Some(AlertEvent::new(AlertKind::PriceHigh, Some(asset), message));
        }

        if price <= bands.low {
            let message = format!(
                "{asset} price alert: {price} fell to the low band at {}.{position_note}",
                bands.low
            );
            return Some(AlertEvent::new(AlertKind::PriceLow, Some(asset), message));
        }

        debug!(asset = %asset, price = %price, high = %bands.high, low = %bands.low, "Within bands");
        None
    }

    fn evaluate_portfolio(&self, summary: &PortfolioSummary) -> Option<AlertEvent> {
        if let Some(target) = self.portfolio_bands.profit_target_pct {
            if summary.profit_percent >= target {
                let message = format!(
                    "Portfolio profit target reached: net profit {} ({}%) at or above {target}%.",
                    summary.net_profit, summary.profit_percent
                );
                return Some(AlertEvent::new(AlertKind::ProfitTarget, None, message));
            }
        }

        if let Some(limit) = self.portfolio_bands.loss_limit_pct {
            if summary.profit_percent <= -limit {
                let message = format!(
                    "Portfolio loss limit breached: net profit {} ({}%) at or below -{limit}%.",
                    summary.net_profit, summary.profit_percent
                );
                return Some(AlertEvent::new(AlertKind::LossLimit, None, message));
            }
        }

        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AssetMetrics, PortfolioMetrics};
    use rust_decimal_macros::dec;

    fn price(asset: AssetClass, display_price: Decimal) -> NormalizedPrice {
        NormalizedPrice {
            asset,
            display_price,
            purity_factor: asset.purity_factor(),
        }
    }

    fn evaluator(high: Decimal, low: Option<Decimal>) -> ThresholdEvaluator {
        ThresholdEvaluator::new(
            vec![(AssetClass::Gold, Bands::resolve(high, low))],
            PortfolioBands::default(),
        )
    }

    fn summary(profit_percent: Decimal) -> PortfolioSummary {
        PortfolioSummary {
            total_value: dec!(15000000),
            total_invested: dec!(14000000),
            net_profit: profit_percent / dec!(100) * dec!(14000000),
            profit_percent,
            details: vec![AssetMetrics {
                asset: AssetClass::Gold,
                metrics: PortfolioMetrics {
                    current_value: dec!(15000000),
                    fee_amount: dec!(150000),
                    net_profit: dec!(850000),
                    profit_percent: dec!(6.07),
                    break_even_price: dec!(1414141.41),
                },
            }],
        }
    }

    #[test]
    fn test_exact_high_band_fires() {
        let ev = evaluator(dec!(1500000), None);
        let alerts = ev.evaluate(&[price(AssetClass::Gold, dec!(1500000))], None);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::PriceHigh);
        assert_eq!(alerts[0].asset, Some(AssetClass::Gold));
    }

    #[test]
    fn test_one_unit_below_high_band_silent() {
        let ev = evaluator(dec!(1500000), Some(dec!(1000000)));
        let alerts = ev.evaluate(&[price(AssetClass::Gold, dec!(1499999))], None);
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_default_low_band_is_95_percent_of_high() {
        let bands = Bands::resolve(dec!(1500000), None);
        assert_eq!(bands.low, dec!(1425000));

        let ev = evaluator(dec!(1500000), None);
        // Exactly at the defaulted low band.
        let alerts = ev.evaluate(&[price(AssetClass::Gold, dec!(1425000))], None);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::PriceLow);
    }

    #[test]
    fn test_explicit_low_band_overrides_default() {
        let bands = Bands::resolve(dec!(1500000), Some(dec!(1200000)));
        assert_eq!(bands.low, dec!(1200000));

        let ev = evaluator(dec!(1500000), Some(dec!(1200000)));
        // Would have fired under the 95% default, but not with the
        // explicit low.
        let alerts = ev.evaluate(&[price(AssetClass::Gold, dec!(1425000))], None);
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_message_carries_price_and_band() {
        let ev = evaluator(dec!(1500000), None);
        let alerts = ev.evaluate(&[price(AssetClass::Gold, dec!(1520000))], None);
        assert!(alerts[0].message.contains("1520000"));
        assert!(alerts[0].message.contains("1500000"));
    }

    #[test]
    fn test_message_includes_position_profit_when_available() {
        let ev = evaluator(dec!(1500000), None);
        let s = summary(dec!(6.07));
        let alerts = ev.evaluate(&[price(AssetClass::Gold, dec!(1520000))], Some(&s));
        assert!(alerts
            .iter()
            .any(|a| a.kind == AlertKind::PriceHigh && a.message.contains("6.07%")));
    }

    #[test]
    fn test_profit_target_fires() {
        let ev = ThresholdEvaluator::new(
            Vec::new(),
            PortfolioBands {
                profit_target_pct: Some(dec!(5)),
                loss_limit_pct: Some(dec!(5)),
            },
        );
        let alerts = ev.evaluate(&[], Some(&summary(dec!(6.07))));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::ProfitTarget);
        assert_eq!(alerts[0].asset, None);
    }

    #[test]
    fn test_loss_limit_fires() {
        let ev = ThresholdEvaluator::new(
            Vec::new(),
            PortfolioBands {
                profit_target_pct: Some(dec!(5)),
                loss_limit_pct: Some(dec!(5)),
            },
        );
        let alerts = ev.evaluate(&[], Some(&summary(dec!(-7.5))));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::LossLimit);
    }

    #[test]
    fn test_profit_and_loss_mutually_exclusive() {
        // A degenerate configuration where both conditions hold: the
        // profit check wins and the loss check never runs.
        let ev = ThresholdEvaluator::new(
            Vec::new(),
            PortfolioBands {
                profit_target_pct: Some(dec!(-10)),
                loss_limit_pct: Some(dec!(-10)),
            },
        );
        let alerts = ev.evaluate(&[], Some(&summary(dec!(-5))));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::ProfitTarget);
    }

    #[test]
    fn test_no_portfolio_no_portfolio_alerts() {
        let ev = ThresholdEvaluator::new(
            Vec::new(),
            PortfolioBands {
                profit_target_pct: Some(dec!(0)),
                loss_limit_pct: Some(dec!(0)),
            },
        );
        assert!(ev.evaluate(&[], None).is_empty());
    }

    #[test]
    fn test_unpriced_asset_skipped() {
        let ev = evaluator(dec!(1500000), None);
        let alerts = ev.evaluate(&[price(AssetClass::Silver, dec!(25000))], None);
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_both_assets_can_fire_in_one_run() {
        let ev = ThresholdEvaluator::new(
            vec![
                (AssetClass::Gold, Bands::resolve(dec!(1500000), None)),
                (AssetClass::Silver, Bands::resolve(dec!(20000), None)),
            ],
            PortfolioBands::default(),
        );
        let alerts = ev.evaluate(
            &[
                price(AssetClass::Gold, dec!(1600000)),
                price(AssetClass::Silver, dec!(18000)),
            ],
            None,
        );
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].kind, AlertKind::PriceHigh);
        assert_eq!(alerts[1].kind, AlertKind::PriceLow);
    }
}
