use crate::error::{BotError, Result};
use crate::indicators::{calculate_bollinger, calculate_macd, calculate_rsi};
use crate::models::{
    Candle, IndicatorSnapshot, OscillatorState, Signal, TrendState, VolatilityState,
};

/// Fixed display bands for the oscillator label. Independent of the
/// configurable buy/sell decision thresholds; the two must not be conflated.
const RSI_OVERSOLD_BAND: f64 = 30.0;
const RSI_OVERBOUGHT_BAND: f64 = 70.0;

/// Configuration for signal generation
#[derive(Debug, Clone)]
pub struct SignalConfig {
    pub rsi_period: usize,
    /// Buy when RSI is strictly below this
    pub rsi_buy: f64,
    /// Sell when RSI is strictly above this
    pub rsi_sell: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bb_period: usize,
    pub bb_std_dev: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            rsi_buy: 30.0,
            rsi_sell: 70.0,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bb_period: 20,
            bb_std_dev: 2.0,
        }
    }
}

impl SignalConfig {
    /// Minimum candle count across all sub-indicators.
    pub fn min_candles_required(&self) -> usize {
        let rsi_needs = self.rsi_period + 1;
        let macd_needs = self.macd_slow + self.macd_signal - 1;
        let bb_needs = self.bb_period;
        rsi_needs.max(macd_needs).max(bb_needs)
    }
}

/// Derive an indicator snapshot from a candle series.
///
/// Pure function of the series; fails with `InsufficientHistory` when the
/// series is shorter than the longest sub-indicator window.
pub fn compute_snapshot(candles: &[Candle], config: &SignalConfig) -> Result<IndicatorSnapshot> {
    let need = config.min_candles_required();
    if candles.len() < need {
        return Err(BotError::InsufficientHistory {
            have: candles.len(),
            need,
        });
    }

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let price = *closes.last().expect("non-empty by the length check");

    // The length check above guarantees every sub-indicator has its window
    let rsi = calculate_rsi(&closes, config.rsi_period).ok_or(BotError::InsufficientHistory {
        have: candles.len(),
        need,
    })?;
    let macd = calculate_macd(&closes, config.macd_fast, config.macd_slow, config.macd_signal)
        .ok_or(BotError::InsufficientHistory {
            have: candles.len(),
            need,
        })?;
    let bands = calculate_bollinger(&closes, config.bb_period, config.bb_std_dev).ok_or(
        BotError::InsufficientHistory {
            have: candles.len(),
            need,
        },
    )?;

    let oscillator = if rsi < RSI_OVERSOLD_BAND {
        OscillatorState::Oversold
    } else if rsi > RSI_OVERBOUGHT_BAND {
        OscillatorState::Overbought
    } else {
        OscillatorState::Neutral
    };

    let trend = if macd.macd > macd.signal {
        TrendState::Bullish
    } else {
        TrendState::Bearish
    };

    let volatility = if price >= bands.upper {
        VolatilityState::NearUpper
    } else if price <= bands.lower {
        VolatilityState::NearLower
    } else {
        VolatilityState::Middle
    };

    Ok(IndicatorSnapshot {
        price,
        rsi,
        oscillator,
        trend,
        volatility,
    })
}

/// Map a snapshot to a trade decision.
///
/// Only the oscillator gates the decision; trend and volatility are
/// advisory, shown to the user but never traded on. Strict inequalities:
/// RSI exactly at a threshold is Hold.
pub fn evaluate(snapshot: &IndicatorSnapshot, config: &SignalConfig) -> Signal {
    if snapshot.rsi < config.rsi_buy {
        Signal::Buy
    } else if snapshot.rsi > config.rsi_sell {
        Signal::Sell
    } else {
        Signal::Hold
    }
}
