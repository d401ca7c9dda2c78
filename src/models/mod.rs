use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BotError;

/// OHLCV candlestick data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Order side
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The exit order for a position is placed on the opposite side.
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Wire format for the exchange API.
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trading signal; `Hold` means no tradable signal this cycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

/// Whether the decision loop trades autonomously or only alerts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradingMode {
    Manual,
    Auto,
}

impl TradingMode {
    pub fn toggled(self) -> TradingMode {
        match self {
            TradingMode::Manual => TradingMode::Auto,
            TradingMode::Auto => TradingMode::Manual,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TradingMode::Manual => "manual",
            TradingMode::Auto => "auto",
        }
    }
}

impl FromStr for TradingMode {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(TradingMode::Manual),
            "auto" => Ok(TradingMode::Auto),
            other => Err(BotError::InputParse(format!("unknown mode '{}'", other))),
        }
    }
}

impl fmt::Display for TradingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which kind of sizing value the user is being asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizingKind {
    FixedQuote,
    PercentOfBalance,
}

/// Rule converting a trade intent into an order quantity
///
/// Persisted in the `kind:value` form (`usdt:10`, `percent:5`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizingPolicy {
    /// Spend a fixed amount of the quote currency
    FixedQuote(f64),
    /// Spend a percentage of the free quote balance
    PercentOfBalance(f64),
}

impl SizingPolicy {
    pub fn from_kind(kind: SizingKind, value: f64) -> SizingPolicy {
        match kind {
            SizingKind::FixedQuote => SizingPolicy::FixedQuote(value),
            SizingKind::PercentOfBalance => SizingPolicy::PercentOfBalance(value),
        }
    }

    /// Amount/percent must be a positive finite number.
    pub fn validate(&self) -> Result<(), BotError> {
        let value = match self {
            SizingPolicy::FixedQuote(v) | SizingPolicy::PercentOfBalance(v) => *v,
        };
        if !value.is_finite() || value <= 0.0 {
            return Err(BotError::InvalidSizingPolicy(format!(
                "value must be a positive number, got {}",
                value
            )));
        }
        Ok(())
    }
}

impl FromStr for SizingPolicy {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, value) = s
            .split_once(':')
            .ok_or_else(|| BotError::InputParse(format!("malformed sizing '{}'", s)))?;
        let value: f64 = value
            .parse()
            .map_err(|_| BotError::InputParse(format!("malformed sizing value '{}'", s)))?;
        let policy = match kind {
            "usdt" => SizingPolicy::FixedQuote(value),
            "percent" => SizingPolicy::PercentOfBalance(value),
            other => {
                return Err(BotError::InputParse(format!(
                    "unknown sizing kind '{}'",
                    other
                )))
            }
        };
        policy.validate()?;
        Ok(policy)
    }
}

impl fmt::Display for SizingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizingPolicy::FixedQuote(v) => write!(f, "usdt:{}", v),
            SizingPolicy::PercentOfBalance(v) => write!(f, "percent:{}", v),
        }
    }
}

/// Outstanding request for free-text input in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingInput {
    SizingValue(SizingKind),
    Pair,
}

/// Oscillator classification against the fixed 30/70 display bands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OscillatorState {
    Oversold,
    Overbought,
    Neutral,
}

/// Trend direction from the MACD line vs its signal line
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TrendState {
    Bullish,
    Bearish,
}

/// Price position relative to the Bollinger bands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VolatilityState {
    NearUpper,
    NearLower,
    Middle,
}

/// Scalar signal values derived from one candle series
///
/// Recomputed from scratch every cycle; carries no state between cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub price: f64,
    pub rsi: f64,
    pub oscillator: OscillatorState,
    pub trend: TrendState,
    pub volatility: VolatilityState,
}

/// Result of a completed entry + bracket placement
#[derive(Debug, Clone)]
pub struct BracketOrderResult {
    pub side: Side,
    pub quantity: f64,
    pub entry_fill_price: f64,
    pub take_profit_price: f64,
    pub stop_loss_price: f64,
}

/// Uppercase/trim a user-entered pair symbol and check its syntax.
///
/// Only a syntactic check: the symbol is not validated against the exchange's
/// instrument list. An unknown pair surfaces on the first market-data fetch.
pub fn normalize_pair(input: &str) -> Result<String, BotError> {
    let symbol = input.trim().to_uppercase();
    let valid = (5..=20).contains(&symbol.len())
        && symbol.chars().all(|c| c.is_ascii_alphanumeric());
    if !valid {
        return Err(BotError::InvalidSymbol(symbol));
    }
    Ok(symbol)
}
