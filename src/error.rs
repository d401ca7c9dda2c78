use crate::models::Side;
use thiserror::Error;

/// Failure taxonomy for the trading core.
///
/// Cycle-level errors (`InsufficientHistory`, `MarketDataUnavailable`) are
/// isolated to one decision cycle. User-input errors (`InvalidSizingPolicy`,
/// `InputParse`, `InvalidSymbol`) are reported back to the conversation and
/// leave prior settings untouched. Order errors distinguish a clean rejection
/// from an entry that filled without its protective exit.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("insufficient history: {have} candles, need {need}")]
    InsufficientHistory { have: usize, need: usize },

    #[error("market data unavailable: {0}")]
    MarketDataUnavailable(String),

    #[error("invalid sizing policy: {0}")]
    InvalidSizingPolicy(String),

    #[error("balance lookup failed: {0}")]
    BalanceUnavailable(String),

    #[error("order rejected: {0}")]
    OrderRejected(String),

    /// Entry order filled but the protective bracket could not be placed.
    /// The position is live and unprotected until the user intervenes.
    #[error(
        "PARTIAL EXECUTION: {side} {quantity} filled @ {fill_price} but the \
         take-profit/stop-loss bracket failed: {reason}"
    )]
    PartialExecution {
        side: Side,
        quantity: f64,
        fill_price: f64,
        reason: String,
    },

    #[error("could not parse input: {0}")]
    InputParse(String),

    #[error("invalid pair symbol: {0}")]
    InvalidSymbol(String),

    #[error("settings store error: {0}")]
    Settings(#[from] sqlx::Error),

    #[error("notification failed: {0}")]
    Notification(String),
}

pub type Result<T> = std::result::Result<T, BotError>;
