use anyhow::{Context, Result};
use serde::Deserialize;

use crate::strategy::SignalConfig;

/// Bot configuration, loaded from a yaml file with `SIGNALBOT_`-prefixed
/// environment overrides. API credentials stay out of the file and come
/// from the environment (see `main.rs`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Initial tracked pair; the persisted setting overrides it once set
    pub pair: String,
    /// Take-profit distance from the entry fill, in percent
    pub tp_percent: f64,
    /// Stop-loss distance from the entry fill, in percent
    pub sl_percent: f64,
    /// Buy when RSI is strictly below this
    pub rsi_buy: f64,
    /// Sell when RSI is strictly above this
    pub rsi_sell: f64,
    /// Decision loop interval
    pub poll_seconds: u64,
    /// Candle timeframe requested from the exchange
    pub candle_interval: String,
    /// Candle window size fetched each cycle
    pub candle_limit: u32,
    /// Quote asset for balance lookups and sizing
    pub quote_asset: String,
    /// Chat that receives decision-loop alerts; unset means log-only
    pub alert_chat_id: Option<i64>,
    /// Path of the sqlite settings database
    pub settings_db: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pair: "XRPUSDT".to_string(),
            tp_percent: 3.0,
            sl_percent: 2.0,
            rsi_buy: 30.0,
            rsi_sell: 70.0,
            poll_seconds: 60,
            candle_interval: "1m".to_string(),
            candle_limit: 100,
            quote_asset: "USDT".to_string(),
            alert_chat_id: None,
            settings_db: "settings.db".to_string(),
        }
    }
}

impl Config {
    /// Load from `path`, then apply environment overrides. A missing file
    /// falls back to defaults so the bot can run on env alone.
    pub fn load(path: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("SIGNALBOT").try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        config
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// The decision thresholds for the signal evaluator. Indicator periods
    /// stay at their standard defaults; only the RSI thresholds are
    /// user-tunable, matching the reference behavior.
    pub fn signal_config(&self) -> SignalConfig {
        SignalConfig {
            rsi_buy: self.rsi_buy,
            rsi_sell: self.rsi_sell,
            ..SignalConfig::default()
        }
    }
}
