use async_trait::async_trait;

use crate::telegram::{InlineKeyboardButton, InlineKeyboardMarkup, TelegramClient};

/// A labeled action button attached to an outbound notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: String,
}

impl Button {
    pub fn new(label: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: action.into(),
        }
    }
}

/// Render button rows as a Telegram inline keyboard
pub fn to_keyboard(buttons: Vec<Vec<Button>>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: buttons
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|b| InlineKeyboardButton::new(b.label, b.action))
                    .collect()
            })
            .collect(),
    }
}

/// Outbound notification capability.
///
/// Delivery failures are non-fatal by contract: implementations log and
/// swallow them, so a notification outage can never stall a trading cycle.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, text: &str);

    /// Notification with actionable buttons, one row per inner vec
    async fn notify_with_buttons(&self, text: &str, buttons: Vec<Vec<Button>>);
}

/// Sends notifications to a fixed Telegram chat
pub struct TelegramNotifier {
    client: TelegramClient,
    chat_id: i64,
}

impl TelegramNotifier {
    pub fn new(client: TelegramClient, chat_id: i64) -> Self {
        Self { client, chat_id }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, text: &str) {
        if let Err(e) = self.client.send_message(self.chat_id, text, None).await {
            tracing::warn!("Failed to deliver notification: {}", e);
        }
    }

    async fn notify_with_buttons(&self, text: &str, buttons: Vec<Vec<Button>>) {
        let keyboard = to_keyboard(buttons);

        if let Err(e) = self
            .client
            .send_message(self.chat_id, text, Some(&keyboard))
            .await
        {
            tracing::warn!("Failed to deliver notification: {}", e);
        }
    }
}

#[async_trait]
impl<N: Notifier + ?Sized> Notifier for std::sync::Arc<N> {
    async fn notify(&self, text: &str) {
        self.as_ref().notify(text).await;
    }

    async fn notify_with_buttons(&self, text: &str, buttons: Vec<Vec<Button>>) {
        self.as_ref().notify_with_buttons(text, buttons).await;
    }
}

/// `None` drops notifications after logging them; lets a deployment without
/// a configured alert chat keep trading.
#[async_trait]
impl<N: Notifier> Notifier for Option<N> {
    async fn notify(&self, text: &str) {
        match self {
            Some(inner) => inner.notify(text).await,
            None => tracing::info!("(no alert chat configured) {}", text),
        }
    }

    async fn notify_with_buttons(&self, text: &str, buttons: Vec<Vec<Button>>) {
        match self {
            Some(inner) => inner.notify_with_buttons(text, buttons).await,
            None => tracing::info!("(no alert chat configured) {}", text),
        }
    }
}
