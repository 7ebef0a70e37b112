//! Outbound message channel.

use crate::core::settings::UserId;
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Delivery: Send + Sync {
    async fn send_text(&self, user_id: UserId, text: &str) -> Result<()>;
}
