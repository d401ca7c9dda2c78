use crate::error::{BotError, Result};
use crate::exchange::Exchange;
use crate::models::SizingPolicy;

/// Quantities are rounded to a fixed 4 decimal places. Exchange lot-size
/// and min-notional filters are NOT consulted; a quantity below the pair's
/// minimum surfaces as an order rejection.
const QUANTITY_DECIMALS: i32 = 4;

/// An executable order size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizedOrder {
    pub quantity: f64,
    pub quote_spend: f64,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Convert the active sizing policy into an order quantity at `price`.
///
/// FixedQuote spends the configured quote amount; PercentOfBalance spends
/// that share of the free quote balance (one balance lookup).
pub async fn resolve_quantity<E: Exchange + ?Sized>(
    policy: &SizingPolicy,
    price: f64,
    quote_asset: &str,
    exchange: &E,
) -> Result<SizedOrder> {
    policy.validate()?;

    if !price.is_finite() || price <= 0.0 {
        return Err(BotError::MarketDataUnavailable(format!(
            "unusable price {}",
            price
        )));
    }

    let quote_spend = match policy {
        SizingPolicy::FixedQuote(amount) => *amount,
        SizingPolicy::PercentOfBalance(percent) => {
            let free = exchange.free_balance(quote_asset).await?;
            free * percent / 100.0
        }
    };

    Ok(SizedOrder {
        quantity: round_to(quote_spend / price, QUANTITY_DECIMALS),
        quote_spend,
    })
}
