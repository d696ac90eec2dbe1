//! Telegram notifier, one `sendMessage` call per summary.
//!
//! The bot token is resolved lazily from the invocation's credential
//! provider and only ever appears in the request path, never in logs.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use super::{DeliveryReceipt, Notifier};
use crate::config::{CredentialRef, TelegramConfig};
use crate::error::ChannelError;
use crate::secrets::CredentialProvider;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Subjects are cut to this many chars before formatting.
const MAX_SUBJECT_CHARS: usize = 512;

const CHANNEL_NAME: &str = "telegram";

/// Telegram Bot API notifier.
pub struct TelegramNotifier {
    api_base: String,
    credential: CredentialRef,
    timeout: Duration,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            credential: config.credential.clone(),
            timeout: config.timeout,
            client,
        }
    }

    fn api_url(&self, token: &SecretString, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, token.expose_secret())
    }

    async fn send_message(
        &self,
        token: &SecretString,
        chat_id: &str,
        text: &str,
    ) -> Result<DeliveryReceipt, ChannelError> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML"
        });

        let resp = self
            .client
            .post(self.api_url(token, "sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        let payload: serde_json::Value = resp.json().await.unwrap_or(serde_json::Value::Null);

        if !status.is_success() {
            let description = payload
                .get("description")
                .and_then(|d| d.as_str())
                .unwrap_or("no description");
            return Err(ChannelError::SendFailed {
                name: CHANNEL_NAME.into(),
                reason: format!("sendMessage returned {status}: {description}"),
            });
        }

        let message_id = payload
            .get("result")
            .and_then(|r| r.get("message_id"))
            .and_then(|id| id.as_i64());

        Ok(DeliveryReceipt {
            chat_id: chat_id.to_string(),
            message_id,
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> ChannelError {
        if e.is_timeout() {
            ChannelError::Timeout {
                name: CHANNEL_NAME.into(),
                timeout: self.timeout,
            }
        } else {
            // The URL carries the bot token.
            ChannelError::SendFailed {
                name: CHANNEL_NAME.into(),
                reason: e.without_url().to_string(),
            }
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        CHANNEL_NAME
    }

    async fn notify(
        &self,
        credentials: &CredentialProvider,
        recipient_id: &str,
        subject: &str,
        summary: &str,
    ) -> Result<DeliveryReceipt, ChannelError> {
        let token = credentials.get_credential(&self.credential).await?;
        let text = format_message(subject, summary);

        let receipt = tokio::time::timeout(self.timeout, self.send_message(&token, recipient_id, &text))
            .await
            .map_err(|_| ChannelError::Timeout {
                name: CHANNEL_NAME.into(),
                timeout: self.timeout,
            })??;

        info!(chat_id = %recipient_id, message_id = ?receipt.message_id, "Summary sent to Telegram");
        Ok(receipt)
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// `<b>subject</b>`, a blank line, then the summary; HTML-escaped and
/// capped at Telegram's message length.
pub fn format_message(subject: &str, summary: &str) -> String {
    let subject: String = subject.chars().take(MAX_SUBJECT_CHARS).collect();
    let head = format!("<b>{}</b>\n\n", escape_html(&subject));
    let budget = TELEGRAM_MAX_MESSAGE_LENGTH.saturating_sub(head.chars().count());
    format!("{head}{}", escape_within(summary, budget))
}

/// Escape the three characters Telegram's HTML mode treats specially.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        push_escaped(&mut out, ch);
    }
    out
}

fn push_escaped(out: &mut String, ch: char) {
    match ch {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        _ => out.push(ch),
    }
}

/// Escape `text`, cutting it (with a trailing ellipsis) so the escaped
/// result fits in `budget` chars without splitting an entity.
fn escape_within(text: &str, budget: usize) -> String {
    let escaped = escape_html(text);
    if escaped.chars().count() <= budget {
        return escaped;
    }

    let limit = budget.saturating_sub(1);
    let mut out = String::new();
    let mut used = 0;
    let mut piece = String::new();
    for ch in text.chars() {
        piece.clear();
        push_escaped(&mut piece, ch);
        let len = piece.chars().count();
        if used + len > limit {
            break;
        }
        out.push_str(&piece);
        used += len;
    }
    out.push('…');
    out
}

// ── Tests ───────────────────────────────────────────────────────────
