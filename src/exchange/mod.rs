// Exchange capability: market data, balances, order placement
pub mod binance;
#[cfg(test)]
pub mod mock;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Candle, Side};

pub use binance::BinanceClient;

/// Realized entry fill reported by the exchange
#[derive(Debug, Clone)]
pub struct MarketFill {
    pub order_id: String,
    pub fill_price: f64,
}

/// Parameters for the protective one-cancels-other exit order
#[derive(Debug, Clone)]
pub struct BracketOrder {
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    /// Take-profit limit price
    pub limit_price: f64,
    /// Stop-loss trigger price
    pub stop_trigger_price: f64,
    /// Stop-loss limit price once triggered
    pub stop_limit_price: f64,
}

/// Exchange operations the trading core depends on.
///
/// The decision loop and executors only see this trait; tests script it.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Last traded price for a symbol
    async fn price(&self, symbol: &str) -> Result<f64>;

    /// Most recent `limit` candles for a symbol, oldest first
    async fn recent_candles(&self, symbol: &str, interval: &str, limit: u32)
        -> Result<Vec<Candle>>;

    /// Free (unlocked) balance of an asset
    async fn free_balance(&self, asset: &str) -> Result<f64>;

    /// Submit a market order and report the realized fill
    async fn place_market_order(&self, symbol: &str, side: Side, quantity: f64)
        -> Result<MarketFill>;

    /// Submit the take-profit/stop-loss exit pair; returns the order-list id
    async fn place_bracket_order(&self, order: &BracketOrder) -> Result<String>;
}
