//! Portfolio valuation — fees, net profit, and break-even.
//!
//! Values each held position at the current display price, deducting the
//! sell-side fee, and aggregates across assets. Rounding to 2 decimal
//! places happens once at the component boundary; the aggregate percent
//! is computed over aggregate invested cost from unrounded figures.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::types::{
    AssetClass, AssetMetrics, NormalizedPrice, PortfolioMetrics, PortfolioPosition,
    PortfolioSummary,
};

/// Value a single position at the current price.
///
/// Returns `None` for an empty position (zero quantity or zero average
/// cost) — there is no degenerate zero-valued metrics object.
pub fn value_position(
    position: &PortfolioPosition,
    display_price: Decimal,
    fee_rate: Decimal,
) -> Option<PortfolioMetrics> {
    value_unrounded(position, display_price, fee_rate).map(round_metrics)
}

/// Aggregate all configured positions into a portfolio summary.
///
/// Positions without a matching price, and empty positions, are skipped
/// from both the value and invested sums so the aggregate percent stays
/// consistent with its own numerator and denominator. Returns `None`
/// when nothing is valuable — the snapshot then carries no portfolio
/// block at all.
pub fn summarize(
    positions: &[(AssetClass, PortfolioPosition)],
    prices: &[NormalizedPrice],
    fee_rate: Decimal,
) -> Option<PortfolioSummary> {
    let mut total_value = Decimal::ZERO;
    let mut total_invested = Decimal::ZERO;
    let mut net_profit = Decimal::ZERO;
    let mut details = Vec::new();

    for (asset, position) in positions {
        let Some(price) = prices.iter().find(|p| p.asset == *asset) else {
            continue;
        };
        let Some(metrics) = value_unrounded(position, price.display_price, fee_rate) else {
            continue;
        };

        total_value += metrics.current_value;
        total_invested += position.average_buy_price * position.quantity;
        net_profit += metrics.net_profit;
        details.push(AssetMetrics {
            asset: *asset,
            metrics: round_metrics(metrics),
        });
    }

    if details.is_empty() {
        return None;
    }

    let profit_percent = if total_invested.is_zero() {
        Decimal::ZERO
    } else {
        net_profit / total_invested * dec!(100)
    };

    Some(PortfolioSummary {
        total_value: total_value.round_dp(2),
        total_invested: total_invested.round_dp(2),
        net_profit: net_profit.round_dp(2),
        profit_percent: profit_percent.round_dp(2),
        details,
    })
}

/// Core formulas, unrounded. Aggregation sums these before any rounding.
fn value_unrounded(
    position: &PortfolioPosition,
    display_price: Decimal,
    fee_rate: Decimal,
) -> Option<PortfolioMetrics> {
    if position.is_empty() {
        return None;
    }

    let current_value = display_price * position.quantity;
    let fee_amount = current_value * fee_rate;
    let invested = position.average_buy_price * position.quantity;
    let net_profit = current_value - fee_amount - invested;
    let profit_percent = if invested.is_zero() {
        Decimal::ZERO
    } else {
        net_profit / invested * dec!(100)
    };
    let break_even_price = invested / (position.quantity * (Decimal::ONE - fee_rate));

    Some(PortfolioMetrics {
        current_value,
        fee_amount,
        net_profit,
        profit_percent,
        break_even_price,
    })
}

fn round_metrics(m: PortfolioMetrics) -> PortfolioMetrics {
    PortfolioMetrics {
        current_value: m.current_value.round_dp(2),
        fee_amount: m.fee_amount.round_dp(2),
        net_profit: m.net_profit.round_dp(2),
        profit_percent: m.profit_percent.round_dp(2),
        break_even_price: m.break_even_price.round_dp(2),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
