//! Messaging channel integrations.
//!
//! `Messenger` delivers text to a recipient; `UpdateSource` yields inbound
//! chat messages for the command front end. Telegram implements both.

pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::Recipient;

/// How the channel should interpret message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Markup {
    Plain,
    /// Links written as `[label](url)`.
    Markdown,
}

/// Outbound delivery. Best effort, no retries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, recipient: &Recipient, text: &str, markup: Markup) -> Result<()>;
}

/// One inbound update. Updates without a chat or text are still returned so
/// the poller can advance its offset past them.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub update_id: i64,
    pub chat_id: Option<i64>,
    pub text: Option<String>,
}

/// Inbound long-poll source.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Wait for updates with id >= `offset`.
    async fn poll(&self, offset: Option<i64>) -> Result<Vec<InboundMessage>>;
}
