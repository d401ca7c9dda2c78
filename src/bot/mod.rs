use std::sync::{Arc, Mutex};

use crate::config::Config;
use crate::error::BotError;
use crate::exchange::Exchange;
use crate::execution::{execute_bracket, resolve_quantity};
use crate::models::{Side, SizingKind, SizingPolicy, PendingInput};
use crate::notifier::Button;
use crate::router::InputRouter;
use crate::settings::SettingsStore;

/// An already-parsed user action; the chat transport produces these
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Start,
    Menu,
    Price { symbol: String },
    Buy { symbol: String },
    Sell { symbol: String },
    ChangePair,
    SizingMenu,
    ChooseSizing(SizingKind),
    ToggleMode,
    Dismiss,
}

impl Intent {
    /// Parse inline-button callback data (`buy|BTCUSDT`, `change_pair`, ...)
    pub fn parse_callback(data: &str) -> Option<Intent> {
        let (action, arg) = match data.split_once('|') {
            Some((action, arg)) => (action, Some(arg)),
            None => (data, None),
        };

        match (action, arg) {
            ("buy", Some(symbol)) => Some(Intent::Buy {
                symbol: symbol.to_string(),
            }),
            ("sell", Some(symbol)) => Some(Intent::Sell {
                symbol: symbol.to_string(),
            }),
            ("price", Some(symbol)) => Some(Intent::Price {
                symbol: symbol.to_string(),
            }),
            ("change_pair", None) => Some(Intent::ChangePair),
            ("trade_mode_menu", None) => Some(Intent::SizingMenu),
            ("mode", Some("percent")) => Some(Intent::ChooseSizing(SizingKind::PercentOfBalance)),
            ("mode", Some("usdt")) => Some(Intent::ChooseSizing(SizingKind::FixedQuote)),
            ("toggle_mode", None) => Some(Intent::ToggleMode),
            ("dismiss", None) => Some(Intent::Dismiss),
            _ => None,
        }
    }

    /// Parse a slash command
    pub fn parse_command(text: &str) -> Option<Intent> {
        match text.trim() {
            "/start" => Some(Intent::Start),
            "/menu" => Some(Intent::Menu),
            _ => None,
        }
    }
}

/// Human-readable result of an intent, with optional action buttons
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub buttons: Option<Vec<Vec<Button>>>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            buttons: None,
        }
    }

    pub fn with_buttons(text: impl Into<String>, buttons: Vec<Vec<Button>>) -> Self {
        Self {
            text: text.into(),
            buttons: Some(buttons),
        }
    }
}

/// Dispatches parsed intents and routed free text against the trading core.
///
/// Errors during a user-triggered action are reported back to that
/// conversation as reply text; nothing here is allowed to take the process
/// down.
pub struct BotHandler<E> {
    exchange: Arc<E>,
    settings: SettingsStore,
    router: Mutex<InputRouter>,
    config: Config,
}

impl<E: Exchange> BotHandler<E> {
    pub fn new(exchange: Arc<E>, settings: SettingsStore, config: Config) -> Self {
        Self {
            exchange,
            settings,
            router: Mutex::new(InputRouter::new()),
            config,
        }
    }

    pub async fn handle_intent(&self, chat_id: i64, intent: Intent) -> Reply {
        match intent {
            Intent::Start => Reply::text("🤖 Trading bot ready!\nUse /menu for controls."),
            Intent::Menu => self.main_menu().await,
            Intent::Price { symbol } => match self.exchange.price(&symbol).await {
                Ok(price) => Reply::text(format!("💰 {}\nCurrent price: {}", symbol, price)),
                Err(e) => Reply::text(format!("❌ Could not fetch {}: {}", symbol, e)),
            },
            Intent::Buy { symbol } => self.manual_trade(Side::Buy, &symbol).await,
            Intent::Sell { symbol } => self.manual_trade(Side::Sell, &symbol).await,
            Intent::ChangePair => {
                self.router.lock().unwrap().expect_pair(chat_id);
                Reply::text("🔄 Send the new pair, e.g. BTCUSDT")
            }
            Intent::SizingMenu => Reply::with_buttons(
                "⚙ Choose trade sizing:",
                vec![vec![
                    Button::new("📊 Percent of balance", "mode|percent"),
                    Button::new("💵 Fixed USDT amount", "mode|usdt"),
                ]],
            ),
            Intent::ChooseSizing(kind) => {
                self.router
                    .lock()
                    .unwrap()
                    .expect_sizing_value(chat_id, kind);
                let prompt = match kind {
                    SizingKind::PercentOfBalance => {
                        "Send a number: what % of the balance per trade? E.g. 5 for 5%"
                    }
                    SizingKind::FixedQuote => {
                        "Send a number: how much USDT per trade? E.g. 15 for $15"
                    }
                };
                Reply::text(prompt)
            }
            Intent::ToggleMode => match self.settings.trading_mode().await {
                Ok(mode) => {
                    let next = mode.toggled();
                    match self.settings.set_trading_mode(next).await {
                        Ok(()) => Reply::text(format!("✅ Trading mode is now {}", next)),
                        Err(e) => Reply::text(format!("❌ Could not switch mode: {}", e)),
                    }
                }
                Err(e) => Reply::text(format!("❌ Could not read mode: {}", e)),
            },
            Intent::Dismiss => Reply::text("👌 Dismissed."),
        }
    }

    /// Route a free-text message through the pending-input state machine.
    ///
    /// Returns `None` when nothing was awaited (plain chatter is ignored).
    /// The pending state is consumed whether or not the text parses.
    pub async fn handle_text(&self, chat_id: i64, text: &str) -> Option<Reply> {
        let pending = self.router.lock().unwrap().take(chat_id)?;

        Some(match pending {
            PendingInput::SizingValue(kind) => self.apply_sizing_value(kind, text).await,
            PendingInput::Pair => self.apply_pair(text).await,
        })
    }

    async fn main_menu(&self) -> Reply {
        let pair = self
            .settings
            .tracked_pair(&self.config.pair)
            .await
            .unwrap_or_else(|_| self.config.pair.clone());
        let mode = self
            .settings
            .trading_mode()
            .await
            .unwrap_or(crate::models::TradingMode::Manual);
        let sizing = self
            .settings
            .sizing_policy()
            .await
            .unwrap_or(SizingPolicy::FixedQuote(10.0));

        let text = format!(
            "📍 Main menu\nActive pair: {}\nMode: {}\nSizing: {}",
            pair, mode, sizing
        );
        let buttons = vec![
            vec![
                Button::new("✅ BUY", format!("buy|{}", pair)),
                Button::new("❌ SELL", format!("sell|{}", pair)),
            ],
            vec![
                Button::new("📊 Price", format!("price|{}", pair)),
                Button::new("🔄 Change pair", "change_pair"),
            ],
            vec![
                Button::new("⚙ Trade sizing", "trade_mode_menu"),
                Button::new("🔁 Toggle mode", "toggle_mode"),
            ],
        ];
        Reply::with_buttons(text, buttons)
    }

    async fn manual_trade(&self, side: Side, symbol: &str) -> Reply {
        let policy = match self.settings.sizing_policy().await {
            Ok(policy) => policy,
            Err(e) => return Reply::text(format!("❌ Could not read sizing: {}", e)),
        };

        let price = match self.exchange.price(symbol).await {
            Ok(price) => price,
            Err(e) => return Reply::text(format!("❌ Could not fetch {}: {}", symbol, e)),
        };

        let sized = match resolve_quantity(
            &policy,
            price,
            &self.config.quote_asset,
            self.exchange.as_ref(),
        )
        .await
        {
            Ok(sized) => sized,
            Err(e) => return Reply::text(format!("❌ Could not size the trade: {}", e)),
        };

        match execute_bracket(
            self.exchange.as_ref(),
            symbol,
            side,
            sized.quantity,
            self.config.tp_percent,
            self.config.sl_percent,
        )
        .await
        {
            Ok(result) => Reply::text(format!(
                "✅ {} {} {} (~${:.2})\nEntry: {:.2}\nTP: {:.2} / SL: {:.2}\nSizing: {}",
                side,
                result.quantity,
                symbol,
                sized.quote_spend,
                result.entry_fill_price,
                result.take_profit_price,
                result.stop_loss_price,
                policy
            )),
            Err(e @ BotError::PartialExecution { .. }) => Reply::text(format!(
                "🚨 {}\nPlace a protective order manually NOW.",
                e
            )),
            Err(e) => Reply::text(format!("❌ {} {} failed: {}", side, symbol, e)),
        }
    }

    async fn apply_sizing_value(&self, kind: SizingKind, text: &str) -> Reply {
        let value: f64 = match text.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                return Reply::text(
                    "❌ Invalid input, send a plain number. Reopen the sizing menu to retry.",
                )
            }
        };

        let policy = SizingPolicy::from_kind(kind, value);
        match self.settings.set_sizing_policy(policy).await {
            Ok(()) => match kind {
                SizingKind::PercentOfBalance => {
                    Reply::text(format!("✅ Sizing set to {}% of balance per trade", value))
                }
                SizingKind::FixedQuote => {
                    Reply::text(format!("✅ Sizing set to ${} per trade", value))
                }
            },
            Err(e) => Reply::text(format!("❌ Sizing not changed: {}", e)),
        }
    }

    async fn apply_pair(&self, text: &str) -> Reply {
        match self.settings.set_tracked_pair(text).await {
            Ok(symbol) => Reply::text(format!("✅ Pair changed to {}", symbol)),
            Err(e) => Reply::text(format!("❌ Pair not changed: {}", e)),
        }
    }
}
