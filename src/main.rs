use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::time::Duration;

use signalbot::bot::{BotHandler, Intent, Reply};
use signalbot::exchange::{BinanceClient, Exchange};
use signalbot::notifier::{to_keyboard, TelegramNotifier};
use signalbot::settings::SettingsStore;
use signalbot::telegram::{TelegramClient, Update};
use signalbot::trader::TradeEngine;
use signalbot::Config;

/// Long-poll timeout for getUpdates
const POLL_TIMEOUT_SECS: u64 = 30;

#[derive(Parser, Debug)]
#[command(name = "signalbot", about = "Telegram-driven Binance signal bot")]
struct Args {
    /// Path to the configuration file
    #[arg(long, default_value = "config.yaml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let args = Args::parse();
    let config = Config::load(&args.config)?;

    tracing::info!("🚀 signalbot starting");

    let api_key = std::env::var("BINANCE_API_KEY").context("BINANCE_API_KEY not set")?;
    let api_secret = std::env::var("BINANCE_API_SECRET").context("BINANCE_API_SECRET not set")?;
    let telegram_token = std::env::var("TELEGRAM_TOKEN").context("TELEGRAM_TOKEN not set")?;

    let settings = SettingsStore::open(&config.settings_db).await?;
    let exchange = Arc::new(BinanceClient::new(api_key, api_secret));
    let telegram = TelegramClient::new(&telegram_token);

    let notifier = config
        .alert_chat_id
        .map(|chat_id| TelegramNotifier::new(telegram.clone(), chat_id));
    if notifier.is_none() {
        tracing::warn!("alert_chat_id not configured; decision-loop alerts go to the log only");
    }

    tracing::info!("📊 Configuration:");
    tracing::info!("  Pair: {}", config.pair);
    tracing::info!("  TP/SL: {}% / {}%", config.tp_percent, config.sl_percent);
    tracing::info!("  RSI thresholds: buy <{} sell >{}", config.rsi_buy, config.rsi_sell);
    tracing::info!(
        "  Cycle: every {}s over {} {} candles",
        config.poll_seconds,
        config.candle_limit,
        config.candle_interval
    );

    let engine = TradeEngine::new(
        exchange.clone(),
        notifier,
        settings.clone(),
        config.clone(),
    );
    let trader_task = tokio::spawn(async move {
        engine.run().await;
    });

    let handler = Arc::new(BotHandler::new(exchange, settings, config));
    let chat_task = {
        let telegram = telegram.clone();
        tokio::spawn(async move {
            chat_loop(telegram, handler).await;
        })
    };

    tracing::info!("✅ Decision loop and chat loop running. Press Ctrl+C to stop");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        result = trader_task => {
            tracing::error!("Decision loop exited: {:?}", result);
        }
        result = chat_task => {
            tracing::error!("Chat loop exited: {:?}", result);
        }
    }

    tracing::info!("👋 signalbot stopped");
    Ok(())
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signalbot=info".into()),
        )
        .init();
}

/// Long-poll Telegram and route each update to the bot handler.
///
/// Transport glue only: updates are parsed into intents here, and handler
/// replies are rendered back out; every decision lives in the handler.
async fn chat_loop<E: Exchange>(telegram: TelegramClient, handler: Arc<BotHandler<E>>) {
    tracing::info!("💬 Chat loop starting...");
    let mut offset = 0i64;

    loop {
        match telegram.get_updates(offset, POLL_TIMEOUT_SECS).await {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    dispatch_update(&telegram, handler.as_ref(), update).await;
                }
            }
            Err(e) => {
                tracing::warn!("getUpdates failed: {}. Backing off", e);
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }
}

async fn dispatch_update<E: Exchange>(
    telegram: &TelegramClient,
    handler: &BotHandler<E>,
    update: Update,
) {
    if let Some(message) = update.message {
        let chat_id = message.chat.id;
        if let Some(text) = message.text {
            let reply = match Intent::parse_command(&text) {
                Some(intent) => Some(handler.handle_intent(chat_id, intent).await),
                None => handler.handle_text(chat_id, &text).await,
            };
            if let Some(reply) = reply {
                send_reply(telegram, chat_id, reply).await;
            }
        }
    } else if let Some(query) = update.callback_query {
        if let Err(e) = telegram.answer_callback_query(&query.id).await {
            tracing::debug!("answerCallbackQuery failed: {}", e);
        }

        let chat_id = query.message.as_ref().map(|m| m.chat.id);
        if let (Some(chat_id), Some(data)) = (chat_id, query.data) {
            match Intent::parse_callback(&data) {
                Some(intent) => {
                    let reply = handler.handle_intent(chat_id, intent).await;
                    send_reply(telegram, chat_id, reply).await;
                }
                None => tracing::warn!("Unrecognized callback data '{}'", data),
            }
        }
    }
}

async fn send_reply(telegram: &TelegramClient, chat_id: i64, reply: Reply) {
    let keyboard = reply.buttons.map(to_keyboard);
    if let Err(e) = telegram
        .send_message(chat_id, &reply.text, keyboard.as_ref())
        .await
    {
        tracing::warn!("Failed to send reply: {}", e);
    }
}
