use super::moving_average::calculate_sma;

/// Bollinger band levels at the latest candle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Calculate Bollinger Bands: SMA(period) +/- k standard deviations
///
/// The deviation is computed over the same trailing window as the middle
/// band (population variance, the conventional choice for bands).
pub fn calculate_bollinger(prices: &[f64], period: usize, k: f64) -> Option<BollingerBands> {
    if period < 2 || prices.len() < period {
        return None;
    }

    let middle = calculate_sma(prices, period)?;

    let window = &prices[prices.len() - period..];
    let variance =
        window.iter().map(|p| (p - middle).powi(2)).sum::<f64>() / period as f64;
    let std_dev = variance.sqrt();

    Some(BollingerBands {
        upper: middle + k * std_dev,
        middle,
        lower: middle - k * std_dev,
    })
}
