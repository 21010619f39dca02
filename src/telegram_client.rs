use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::errors::AppError;
use crate::notifier::{DeliveryError, ListingMessage, Messenger};

/// Envelope every Bot API method answers with.
#[derive(Debug, Deserialize)]
struct BotApiResponse {
    ok: bool,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    description: Option<String>,
}

/// Client for the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl TelegramClient {
    /// Creates a new `TelegramClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The Bot API base URL (`https://api.telegram.org`).
    /// * `token` - The bot token.
    pub fn new(base_url: String, token: String) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create Telegram client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    /// Sends a photo with a caption and one inline link button.
    ///
    /// # Arguments
    ///
    /// * `chat_id` - The recipient chat.
    /// * `message` - Photo, caption and button.
    ///
    /// # Returns
    ///
    /// * `Result<(), DeliveryError>` - Ok, or the Bot API error code and description.
    pub async fn send_photo(
        &self,
        chat_id: &str,
        message: &ListingMessage,
    ) -> Result<(), DeliveryError> {
        let body = json!({
            "chat_id": chat_id,
            "photo": message.photo_url,
            "caption": message.caption,
            "reply_markup": {
                "inline_keyboard": [
                    [{ "text": message.button_text, "url": message.button_url }]
                ]
            }
        });

        let response = self
            .client
            .post(self.method_url("sendPhoto"))
            .json(&body)
            .send()
            .await
            .map_err(|e| DeliveryError {
                code: None,
                message: format!("Telegram request failed: {}", e),
            })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        match serde_json::from_str::<BotApiResponse>(&text) {
            Ok(reply) if reply.ok => {
                tracing::debug!("✓ Photo sent to chat {}", chat_id);
                Ok(())
            }
            Ok(reply) => Err(DeliveryError {
                code: reply.error_code.or(Some(i64::from(status.as_u16()))),
                message: reply
                    .description
                    .unwrap_or_else(|| "Unknown error".to_string()),
            }),
            Err(_) if status.is_success() => {
                tracing::warn!("Unexpected Telegram response for chat {}: {}", chat_id, text);
                Ok(())
            }
            Err(_) => Err(DeliveryError {
                code: Some(i64::from(status.as_u16())),
                message: text,
            }),
        }
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_listing(
        &self,
        recipient_id: &str,
        message: &ListingMessage,
    ) -> Result<(), DeliveryError> {
        self.send_photo(recipient_id, message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_creation() {
        let client = TelegramClient::new(
            "https://api.telegram.org".to_string(),
            "123:abc".to_string(),
        );
        assert!(client.is_ok());
    }

    #[test]
    fn test_method_url() {
        let client =
            TelegramClient::new("https://api.telegram.org".to_string(), "123:abc".to_string())
                .unwrap();
        assert_eq!(
            client.method_url("sendPhoto"),
            "https://api.telegram.org/bot123:abc/sendPhoto"
        );
    }
}
