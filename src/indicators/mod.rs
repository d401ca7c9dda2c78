// Technical indicator calculations
pub mod bollinger;
pub mod macd;
pub mod moving_average;
pub mod rsi;

pub use bollinger::{calculate_bollinger, BollingerBands};
pub use macd::{calculate_macd, MacdOutput};
pub use moving_average::{calculate_ema, calculate_sma, ema_series};
pub use rsi::calculate_rsi;
