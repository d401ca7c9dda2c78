use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::config::Config;
use crate::error::{BotError, Result};
use crate::exchange::Exchange;
use crate::execution::{execute_bracket, resolve_quantity};
use crate::models::{BracketOrderResult, IndicatorSnapshot, Side, Signal, TradingMode};
use crate::notifier::{Button, Notifier};
use crate::settings::SettingsStore;
use crate::strategy::{compute_snapshot, evaluate, SignalConfig};

/// What one decision cycle did, for logging and tests
#[derive(Debug)]
pub enum CycleOutcome {
    /// No tradable signal this cycle
    NoSignal,
    /// Auto mode executed a bracket trade
    AutoExecuted(BracketOrderResult),
    /// Manual mode raised an alert and took no action
    Alerted(Signal),
}

/// The decision loop: fetch, evaluate, act or alert, sleep.
pub struct TradeEngine<E, N> {
    exchange: Arc<E>,
    notifier: N,
    settings: SettingsStore,
    config: Config,
    signal_config: SignalConfig,
}

impl<E: Exchange, N: Notifier> TradeEngine<E, N> {
    pub fn new(exchange: Arc<E>, notifier: N, settings: SettingsStore, config: Config) -> Self {
        let signal_config = config.signal_config();
        Self {
            exchange,
            notifier,
            settings,
            config,
            signal_config,
        }
    }

    /// Run cycles forever at the configured interval.
    ///
    /// A failed cycle is reported and isolated; the next tick always runs.
    pub async fn run(&self) {
        let mut ticker = interval(Duration::from_secs(self.config.poll_seconds));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            "Decision loop starting (every {}s)",
            self.config.poll_seconds
        );

        loop {
            ticker.tick().await;

            match self.run_cycle().await {
                Ok(outcome) => tracing::debug!("Cycle outcome: {:?}", outcome),
                Err(e) => tracing::warn!("Cycle failed, will retry next tick: {}", e),
            }
        }
    }

    /// One fetch -> evaluate -> act/alert pass.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let pair = self.settings.tracked_pair(&self.config.pair).await?;
        let mode = self.settings.trading_mode().await?;

        let candles = self
            .exchange
            .recent_candles(&pair, &self.config.candle_interval, self.config.candle_limit)
            .await?;

        let snapshot = compute_snapshot(&candles, &self.signal_config)?;
        let signal = evaluate(&snapshot, &self.signal_config);

        tracing::info!(
            pair = %pair,
            price = snapshot.price,
            rsi = snapshot.rsi,
            oscillator = ?snapshot.oscillator,
            trend = ?snapshot.trend,
            volatility = ?snapshot.volatility,
            signal = ?signal,
            mode = %mode,
            "Cycle evaluated"
        );

        let side = match signal {
            Signal::Buy => Side::Buy,
            Signal::Sell => Side::Sell,
            Signal::Hold => return Ok(CycleOutcome::NoSignal),
        };

        match mode {
            TradingMode::Auto => self.auto_execute(&pair, side, &snapshot).await,
            TradingMode::Manual => {
                self.alert(&pair, side, &snapshot).await;
                Ok(CycleOutcome::Alerted(signal))
            }
        }
    }

    async fn auto_execute(
        &self,
        pair: &str,
        side: Side,
        snapshot: &IndicatorSnapshot,
    ) -> Result<CycleOutcome> {
        let policy = self.settings.sizing_policy().await?;
        let sized = resolve_quantity(
            &policy,
            snapshot.price,
            &self.config.quote_asset,
            self.exchange.as_ref(),
        )
        .await?;

        let result = match execute_bracket(
            self.exchange.as_ref(),
            pair,
            side,
            sized.quantity,
            self.config.tp_percent,
            self.config.sl_percent,
        )
        .await
        {
            Ok(result) => result,
            Err(e @ BotError::PartialExecution { .. }) => {
                // The position is live without protection. This must reach
                // the user, not just the log.
                self.notifier
                    .notify(&format!("🚨 {}\nPlace a protective order manually NOW.", e))
                    .await;
                return Err(e);
            }
            Err(e) => {
                self.notifier
                    .notify(&format!("❌ Auto {} {} failed: {}", side, pair, e))
                    .await;
                return Err(e);
            }
        };

        self.notifier
            .notify(&format!(
                "🤖 AUTO {} {} {} @ {:.2} (~${:.2})\nTP: {:.2} / SL: {:.2}",
                side,
                result.quantity,
                pair,
                result.entry_fill_price,
                sized.quote_spend,
                result.take_profit_price,
                result.stop_loss_price
            ))
            .await;

        Ok(CycleOutcome::AutoExecuted(result))
    }

    /// Manual-mode alert with actionable buttons; no trading action taken.
    async fn alert(&self, pair: &str, side: Side, snapshot: &IndicatorSnapshot) {
        let text = format!(
            "📢 {} signal on {}\nPrice: {:.4}\nRSI: {:.2} ({:?})\nTrend: {:?} | Bands: {:?}",
            side, pair, snapshot.price, snapshot.rsi, snapshot.oscillator, snapshot.trend,
            snapshot.volatility
        );
        let buttons = vec![vec![
            Button::new("✅ BUY", format!("buy|{}", pair)),
            Button::new("❌ SELL", format!("sell|{}", pair)),
            Button::new("🙈 Dismiss", "dismiss"),
        ]];

        self.notifier.notify_with_buttons(&text, buttons).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::mock::{BracketScript, MockExchange, OrderScript};
    use crate::models::Candle;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    /// Records every notification instead of delivering it
    #[derive(Default)]
    struct RecordingNotifier {
        messages: Mutex<Vec<(String, bool)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, text: &str) {
            self.messages.lock().unwrap().push((text.to_string(), false));
        }

        async fn notify_with_buttons(&self, text: &str, _buttons: Vec<Vec<Button>>) {
            self.messages.lock().unwrap().push((text.to_string(), true));
        }
    }

    fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                timestamp: Utc::now() - chrono::Duration::minutes((closes.len() - i) as i64),
                open: close,
                high: close * 1.01,
                low: close * 0.99,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    /// Steady downtrend: RSI pinned at 0, a clear Buy signal
    fn oversold_series() -> Vec<Candle> {
        let closes: Vec<f64> = (0..60).map(|i| 200.0 - i as f64).collect();
        candles_from_closes(&closes)
    }

    /// Gentle oscillation: RSI mid-range, no signal
    fn sideways_series() -> Vec<Candle> {
        let closes: Vec<f64> = (0..60)
            .map(|i| 100.0 + (i as f64 * 0.9).sin())
            .collect();
        candles_from_closes(&closes)
    }

    async fn engine(
        exchange: Arc<MockExchange>,
        mode: TradingMode,
    ) -> TradeEngine<MockExchange, Arc<RecordingNotifier>> {
        let settings = SettingsStore::open_in_memory().await.unwrap();
        settings.set_trading_mode(mode).await.unwrap();
        TradeEngine::new(
            exchange,
            Arc::new(RecordingNotifier::default()),
            settings,
            Config::default(),
        )
    }

    #[tokio::test]
    async fn test_auto_cycle_executes_bracket() {
        let exchange = Arc::new(MockExchange::default());
        exchange.push_candles(Ok(oversold_series()));
        exchange.script_order(OrderScript::Fill { price: 141.0 });

        let engine = engine(exchange.clone(), TradingMode::Auto).await;
        let outcome = engine.run_cycle().await.unwrap();

        assert!(matches!(outcome, CycleOutcome::AutoExecuted(_)));
        assert_eq!(exchange.market_orders.lock().unwrap().len(), 1);
        assert_eq!(exchange.bracket_orders.lock().unwrap().len(), 1);

        let messages = engine.notifier.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].0.contains("AUTO BUY"));
    }

    #[tokio::test]
    async fn test_manual_cycle_alerts_without_trading() {
        let exchange = Arc::new(MockExchange::default());
        exchange.push_candles(Ok(oversold_series()));

        let engine = engine(exchange.clone(), TradingMode::Manual).await;
        let outcome = engine.run_cycle().await.unwrap();

        assert!(matches!(outcome, CycleOutcome::Alerted(Signal::Buy)));
        assert!(exchange.market_orders.lock().unwrap().is_empty());

        let messages = engine.notifier.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        let (text, has_buttons) = &messages[0];
        assert!(text.contains("BUY signal"));
        assert!(*has_buttons);
    }

    #[tokio::test]
    async fn test_no_signal_cycle_is_silent() {
        let exchange = Arc::new(MockExchange::default());
        exchange.push_candles(Ok(sideways_series()));

        let engine = engine(exchange.clone(), TradingMode::Auto).await;
        let outcome = engine.run_cycle().await.unwrap();

        assert!(matches!(outcome, CycleOutcome::NoSignal));
        assert!(exchange.market_orders.lock().unwrap().is_empty());
        assert!(engine.notifier.messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_does_not_poison_next_cycle() {
        let exchange = Arc::new(MockExchange::default());
        exchange.push_candles(Err(BotError::MarketDataUnavailable("timeout".into())));
        exchange.push_candles(Ok(oversold_series()));

        let engine = engine(exchange.clone(), TradingMode::Manual).await;

        // Cycle N fails...
        let err = engine.run_cycle().await.unwrap_err();
        assert!(matches!(err, BotError::MarketDataUnavailable(_)));

        // ...and cycle N+1 proceeds normally
        let outcome = engine.run_cycle().await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Alerted(Signal::Buy)));
    }

    #[tokio::test]
    async fn test_insufficient_history_skips_cycle() {
        let exchange = Arc::new(MockExchange::default());
        exchange.push_candles(Ok(candles_from_closes(&[100.0, 101.0, 102.0])));

        let engine = engine(exchange, TradingMode::Auto).await;
        let err = engine.run_cycle().await.unwrap_err();
        assert!(matches!(err, BotError::InsufficientHistory { .. }));
    }

    #[tokio::test]
    async fn test_auto_partial_execution_notifies_urgently() {
        let exchange = Arc::new(MockExchange::default());
        exchange.push_candles(Ok(oversold_series()));
        exchange.script_order(OrderScript::Fill { price: 141.0 });
        exchange.script_bracket(BracketScript::Fail("oco down".into()));

        let engine = engine(exchange, TradingMode::Auto).await;
        let err = engine.run_cycle().await.unwrap_err();
        assert!(matches!(err, BotError::PartialExecution { .. }));

        let messages = engine.notifier.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].0.contains("PARTIAL EXECUTION"));
    }

    #[tokio::test]
    async fn test_mode_flip_applies_from_next_cycle() {
        let exchange = Arc::new(MockExchange::default());
        exchange.push_candles(Ok(oversold_series()));
        exchange.push_candles(Ok(oversold_series()));
        exchange.script_order(OrderScript::Fill { price: 141.0 });

        let engine = engine(exchange.clone(), TradingMode::Manual).await;
        let outcome = engine.run_cycle().await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Alerted(_)));

        engine
            .settings
            .set_trading_mode(TradingMode::Auto)
            .await
            .unwrap();
        let outcome = engine.run_cycle().await.unwrap();
        assert!(matches!(outcome, CycleOutcome::AutoExecuted(_)));
    }
}
