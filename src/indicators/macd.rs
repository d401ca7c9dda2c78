use super::moving_average::ema_series;

/// MACD line and its signal line at the latest candle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdOutput {
    pub macd: f64,
    pub signal: f64,
}

/// Calculate Moving Average Convergence/Divergence
///
/// MACD line = EMA(fast) - EMA(slow) of the closes; signal line = EMA of the
/// MACD series over `signal_period`. Returns `None` until the series is long
/// enough for the signal line to exist (`slow + signal_period - 1` values).
pub fn calculate_macd(
    prices: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Option<MacdOutput> {
    if fast == 0 || slow <= fast || signal_period == 0 {
        return None;
    }
    if prices.len() < slow + signal_period - 1 {
        return None;
    }

    let fast_ema = ema_series(prices, fast);
    let slow_ema = ema_series(prices, slow);

    // MACD series exists wherever the slow EMA does
    let macd_line: Vec<f64> = fast_ema
        .iter()
        .zip(slow_ema.iter())
        .filter_map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    let signal = *ema_series(&macd_line, signal_period).last()?;
    let signal = signal?;
    let macd = *macd_line.last()?;

    Some(MacdOutput { macd, signal })
}
