//! Telegram Bot API integration.
//!
//! API docs: https://core.telegram.org/bots/api
//! Base URL: https://api.telegram.org/bot<token>/<method>
//! Auth: the bot token is part of the URL, so request errors are stripped
//! of their URL before they are logged or returned.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{InboundMessage, Markup, Messenger, UpdateSource};
use crate::types::Recipient;

pub const DEFAULT_BASE_URL: &str = "https://api.telegram.org";

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

/// Envelope every Bot API method returns.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Serialize)]
struct SendMessageBody<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    disable_web_page_preview: bool,
}

#[derive(Debug, Serialize)]
struct GetUpdatesBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct TelegramClient {
    http: Client,
    token: SecretString,
    base_url: String,
    poll_timeout_secs: u64,
}

impl TelegramClient {
    /// `request_timeout` bounds ordinary calls; long polls get
    /// `poll_timeout_secs` on top of it.
    pub fn new(
        token: SecretString,
        request_timeout: Duration,
        poll_timeout_secs: u64,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(request_timeout + Duration::from_secs(poll_timeout_secs))
            .user_agent("VOLSCAN/0.1.0")
            .build()
            .context("Failed to build HTTP client for Telegram")?;

        Ok(Self {
            http,
            token,
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_timeout_secs,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token.expose_secret(), method)
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let resp = self
            .http
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| e.without_url())
            .with_context(|| format!("Telegram {method} request failed"))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| e.without_url())
            .with_context(|| format!("Failed to read Telegram {method} response"))?;

        Self::parse_response(method, status.as_u16(), &text)
    }

    fn parse_response<T: DeserializeOwned>(method: &str, status: u16, body: &str) -> Result<T> {
        let parsed: ApiResponse<T> = serde_json::from_str(body)
            .with_context(|| format!("Malformed Telegram {method} response (HTTP {status})"))?;

        if !parsed.ok {
            anyhow::bail!(
                "Telegram {method} error (HTTP {status}): {}",
                parsed.description.unwrap_or_else(|| "no description".into())
            );
        }

        parsed
            .result
            .with_context(|| format!("Telegram {method} response has no result"))
    }

    fn to_inbound(update: Update) -> InboundMessage {
        let (chat_id, text) = match update.message {
            Some(m) => (Some(m.chat.id), m.text),
            None => (None, None),
        };
        InboundMessage {
            update_id: update.update_id,
            chat_id,
            text,
        }
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send(&self, recipient: &Recipient, text: &str, markup: Markup) -> Result<()> {
        let body = SendMessageBody {
            chat_id: recipient.as_str(),
            text,
            parse_mode: match markup {
                Markup::Markdown => Some("Markdown"),
                Markup::Plain => None,
            },
            disable_web_page_preview: true,
        };

        let _: serde_json::Value = self.call("sendMessage", &body).await?;
        debug!(recipient = %recipient, chars = text.len(), "Message sent");
        Ok(())
    }
}

#[async_trait]
impl UpdateSource for TelegramClient {
    async fn poll(&self, offset: Option<i64>) -> Result<Vec<InboundMessage>> {
        let body = GetUpdatesBody {
            offset,
            timeout: self.poll_timeout_secs,
            allowed_updates: ["message"],
        };

        let updates: Vec<Update> = self.call("getUpdates", &body).await?;
        Ok(updates.into_iter().map(Self::to_inbound).collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
