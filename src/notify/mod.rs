//! Outbound notification channel.
//!
//! Fire-and-forget delivery of fired alerts. Failures are logged by the
//! orchestrator, never raised — a broken channel must not fail a run.
//! Credentials are referenced by env-var name in the configuration and
//! resolved once at wiring time; when they are absent the channel is
//! disabled with a warning instead of erroring.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Abstraction over the alert delivery channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one message. Best-effort.
    async fn send(&self, message: &str) -> Result<()>;

    /// Channel name for logging and identification.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Telegram
// ---------------------------------------------------------------------------

/// Telegram Bot API channel.
pub struct TelegramNotifier {
    http: Client,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build Telegram HTTP client")?;
        Ok(Self {
            http,
            bot_token,
            chat_id,
        })
    }

    /// Resolve credentials from the env-var names referenced in config.
    /// Returns `None` (channel disabled) when either is missing.
    pub fn from_env_names(
        token_env: Option<&str>,
        chat_id_env: Option<&str>,
        timeout: Duration,
    ) -> Result<Option<Self>> {
        let token = token_env.and_then(|name| std::env::var(name).ok());
        let chat_id = chat_id_env.and_then(|name| std::env::var(name).ok());

        match (token, chat_id) {
            (Some(token), Some(chat_id)) if !token.is_empty() && !chat_id.is_empty() => {
                Ok(Some(Self::new(token, chat_id, timeout)?))
            }
            _ => {
                warn!("Telegram credentials not configured — notifications disabled");
                Ok(None)
            }
        }
    }

    fn api_url(&self) -> String {
        format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token)
    }

    fn payload(chat_id: &str, message: &str) -> Value {
        json!({
            "chat_id": chat_id,
            "text": message,
            "parse_mode": "Markdown",
            "disable_web_page_preview": true,
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        let resp = self
            .http
            .post(self.api_url())
            .json(&Self::payload(&self.chat_id, message))
            .send()
            .await
            .context("Telegram request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Telegram API error {status}: {body}");
        }

        debug!(chars = message.len(), "Alert delivered to Telegram");
        Ok(())
    }

    fn name(&self) -> &str {
        "telegram"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
