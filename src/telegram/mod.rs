use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{BotError, Result};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Incoming update from long polling
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineKeyboardButton {
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: callback_data.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

/// Minimal Telegram Bot API client: long polling plus message delivery
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(token: &str) -> Self {
        Self::with_base_url(format!("{}/bot{}", TELEGRAM_API_BASE, token))
    }

    /// Point at a different host (mock server in tests)
    pub fn with_base_url(base_url: String) -> Self {
        let client = Client::builder()
            // Above the long-poll timeout so idle polls don't error out
            .timeout(std::time::Duration::from_secs(70))
            .build()
            .expect("Failed to build HTTP client");

        Self { client, base_url }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, method);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| BotError::Notification(e.to_string()))?;

        let api: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| BotError::Notification(e.to_string()))?;

        if !api.ok {
            return Err(BotError::Notification(
                api.description.unwrap_or_else(|| "telegram call failed".to_string()),
            ));
        }
        api.result
            .ok_or_else(|| BotError::Notification("telegram response had no result".to_string()))
    }

    /// Long-poll for updates after `offset`
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            json!({ "offset": offset, "timeout": timeout_secs }),
        )
        .await
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<()> {
        let mut body = json!({ "chat_id": chat_id, "text": text });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = serde_json::to_value(keyboard)
                .map_err(|e| BotError::Notification(e.to_string()))?;
        }

        let _: Message = self.call("sendMessage", body).await?;
        Ok(())
    }

    /// Stop the client-side loading spinner on a pressed button
    pub async fn answer_callback_query(&self, callback_id: &str) -> Result<()> {
        let _: bool = self
            .call("answerCallbackQuery", json!({ "callback_query_id": callback_id }))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_deserialization() {
        let raw = r#"{
            "update_id": 10,
            "message": {"message_id": 1, "chat": {"id": 42}, "text": "/menu"}
        }"#;
        let update: Update = serde_json::from_str(raw).unwrap();
        assert_eq!(update.update_id, 10);
        let message = update.message.unwrap();
        assert_eq!(message.chat.id, 42);
        assert_eq!(message.text.as_deref(), Some("/menu"));
        assert!(update.callback_query.is_none());
    }

    #[test]
    fn test_callback_query_deserialization() {
        let raw = r#"{
            "update_id": 11,
            "callback_query": {
                "id": "abc",
                "data": "buy|BTCUSDT",
                "message": {"message_id": 2, "chat": {"id": 42}}
            }
        }"#;
        let update: Update = serde_json::from_str(raw).unwrap();
        let query = update.callback_query.unwrap();
        assert_eq!(query.data.as_deref(), Some("buy|BTCUSDT"));
        assert_eq!(query.message.unwrap().chat.id, 42);
    }

    #[test]
    fn test_keyboard_serialization_shape() {
        let keyboard = InlineKeyboardMarkup {
            inline_keyboard: vec![vec![InlineKeyboardButton::new("✅ BUY", "buy|BTCUSDT")]],
        };
        let value = serde_json::to_value(&keyboard).unwrap();
        assert_eq!(
            value["inline_keyboard"][0][0]["callback_data"],
            "buy|BTCUSDT"
        );
    }

    #[tokio::test]
    async fn test_send_message_against_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/sendMessage")
            .with_body(
                r#"{"ok":true,"result":{"message_id":5,"chat":{"id":42},"text":"hi"}}"#,
            )
            .create_async()
            .await;

        let client = TelegramClient::with_base_url(server.url());
        client.send_message(42, "hi", None).await.unwrap();
    }

    #[tokio::test]
    async fn test_api_error_surfaces_description() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/sendMessage")
            .with_body(r#"{"ok":false,"description":"Bad Request: chat not found"}"#)
            .create_async()
            .await;

        let client = TelegramClient::with_base_url(server.url());
        let err = client.send_message(42, "hi", None).await.unwrap_err();
        assert!(err.to_string().contains("chat not found"));
    }
}
