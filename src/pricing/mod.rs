//! Unit and purity normalization.
//!
//! Converts a raw minor-unit (rial) price into the display currency
//! (toman) and applies the asset's purity factor. Pure arithmetic over
//! compile-time constants; a result under the asset's sanity floor is
//! rejected so a unit-conversion mistake never propagates as a valid
//! price.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::types::{AssetQuote, MonitorError, NormalizedPrice};

/// Minor unit → display currency ("divide by 10" in this domain).
const MINOR_UNIT_DIVISOR: Decimal = dec!(10);

/// Normalize an extracted quote into a display price.
pub fn normalize(quote: &AssetQuote) -> Result<NormalizedPrice, MonitorError> {
    let purity_factor = quote.asset.purity_factor();
    let display_price = quote.raw_price / MINOR_UNIT_DIVISOR * purity_factor;

    let floor = quote.asset.sanity_floor();
    if display_price < floor {
        return Err(MonitorError::InvalidPriceRange {
            asset: quote.asset,
            price: display_price,
            floor,
        });
    }

    Ok(NormalizedPrice {
        asset: quote.asset,
        display_price,
        purity_factor,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
