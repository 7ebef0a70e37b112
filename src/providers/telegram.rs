use crate::core::config::TelegramConfig;
use crate::core::delivery::Delivery;
use crate::core::settings::UserId;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: UserId,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct BotApiResponse {
    ok: bool,
    description: Option<String>,
}

/// Sends notifications through the Telegram Bot API `sendMessage` method.
///
/// One request per message; callers decide what to do with failures.
pub struct TelegramDelivery {
    endpoint: String,
    client: reqwest::Client,
}

impl TelegramDelivery {
    pub fn new(config: &TelegramConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            endpoint: format!(
                "{}/bot{}/sendMessage",
                config.base_url.trim_end_matches('/'),
                config.bot_token
            ),
            client,
        }
    }
}

#[async_trait]
impl Delivery for TelegramDelivery {
    async fn send_text(&self, user_id: UserId, text: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&SendMessageRequest {
                chat_id: user_id,
                text,
            })
            .send()
            .await
            .with_context(|| format!("Failed to send message to user {user_id}"))?;

        let status = response.status();
        let body: BotApiResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to parse sendMessage response ({status})"))?;

        if !body.ok {
            return Err(anyhow!(
                "sendMessage rejected for user {}: {}",
                user_id,
                body.description.unwrap_or_else(|| status.to_string())
            ));
        }
        debug!("Delivered message to user {}", user_id);
        Ok(())
    }
}

/// Prints notifications to stdout; used when no bot token is configured.
#[derive(Debug, Default)]
pub struct ConsoleDelivery;

#[async_trait]
impl Delivery for ConsoleDelivery {
    async fn send_text(&self, user_id: UserId, text: &str) -> Result<()> {
        println!("[to {user_id}]\n{text}\n");
        Ok(())
    }
}
