//! Telegram channel: long-polls the Bot API for updates.
//!
//! Plain `reqwest` client against the Bot HTTP API: `getUpdates` long
//! polling for messages, shared contacts and inline button presses, and
//! `sendMessage` with reply/inline keyboards for output.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use crate::channels::{
    Channel, ChatUser, InboundEvent, InboundPayload, Keyboard, MessageSink, MessageStream,
    OutgoingMessage,
};
use crate::error::ChannelError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Long-poll timeout passed to getUpdates, in seconds.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Telegram channel, connected to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString) -> Self {
        Self {
            bot_token,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{method}",
            self.bot_token.expose_secret()
        )
    }

    async fn call(&self, method: &str, body: &Value) -> Result<Value, ChannelError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::Http(e.to_string()))?;

        let status = resp.status();
        let data: Value = resp
            .json()
            .await
            .map_err(|e| ChannelError::Http(e.to_string()))?;

        if !status.is_success() || data.get("ok").and_then(Value::as_bool) != Some(true) {
            let description = data
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("no description");
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("{method} returned {status}: {description}"),
            });
        }
        Ok(data)
    }

    /// Send a single chunk (≤4096 chars), HTML first with plain-text fallback.
    async fn send_chunk(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<&Value>,
    ) -> Result<(), ChannelError> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
        });
        if let Some(markup) = reply_markup {
            body["reply_markup"] = markup.clone();
        }

        let html_err = match self.call("sendMessage", &body).await {
            Ok(_) => return Ok(()),
            Err(e) => e,
        };

        tracing::warn!(
            chat_id,
            error = %html_err,
            "Telegram sendMessage with HTML failed; retrying without parse_mode"
        );

        if let Some(obj) = body.as_object_mut() {
            obj.remove("parse_mode");
        }
        self.call("sendMessage", &body)
            .await
            .map(|_| ())
            .map_err(|plain_err| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("sendMessage failed (html: {html_err}, plain: {plain_err})"),
            })
    }
}

#[async_trait]
impl MessageSink for TelegramChannel {
    async fn send(&self, chat_id: i64, message: OutgoingMessage) -> Result<(), ChannelError> {
        let chunks = split_message(&message.text, TELEGRAM_MAX_MESSAGE_LENGTH);
        let markup = message.keyboard.as_ref().map(keyboard_markup);
        let last = chunks.len().saturating_sub(1);

        // The keyboard rides on the last chunk.
        for (i, chunk) in chunks.iter().enumerate() {
            let chunk_markup = if i == last { markup.as_ref() } else { None };
            self.send_chunk(chat_id, chunk, chunk_markup).await?;
        }
        Ok(())
    }
}

// ── Channel trait implementation ────────────────────────────────────

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        // Stale updates from before a restart are dropped.
        if let Err(e) = self
            .call("deleteWebhook", &json!({ "drop_pending_updates": true }))
            .await
        {
            tracing::warn!(error = %e, "Telegram deleteWebhook failed");
        }

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let url = self.api_url("getUpdates");
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for messages...");

            loop {
                let body = json!({
                    "offset": offset,
                    "timeout": POLL_TIMEOUT_SECS,
                    "allowed_updates": ["message", "callback_query"]
                });

                let resp = match client.post(&url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let data: Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let Some(results) = data.get("result").and_then(Value::as_array) else {
                    tracing::warn!(response = %data, "Telegram getUpdates returned no result");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    continue;
                };

                for update in results {
                    if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                        offset = uid + 1;
                    }

                    let Some(event) = parse_update(update) else {
                        continue;
                    };

                    if tx.send(event).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<(), ChannelError> {
        let mut body = json!({ "callback_query_id": callback_id });
        if !text.is_empty() {
            body["text"] = Value::String(text.to_string());
        }
        self.call("answerCallbackQuery", &body).await.map(|_| ())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let data = self
            .call("getMe", &json!({}))
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        let username = data
            .pointer("/result/username")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let id = data.pointer("/result/id").and_then(Value::as_i64);
        tracing::info!(bot = %format!("@{username}"), id = ?id, "Telegram bot identity");
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn parse_user(from: &Value) -> Option<ChatUser> {
    let id = from.get("id").and_then(Value::as_i64)?;
    let first = from.get("first_name").and_then(Value::as_str).unwrap_or("");
    let last = from.get("last_name").and_then(Value::as_str).unwrap_or("");
    let username = from.get("username").and_then(Value::as_str);

    let full_name = format!("{first} {last}").trim().to_string();
    let display_name = if full_name.is_empty() {
        username.unwrap_or("unknown").to_string()
    } else {
        full_name
    };

    let user = ChatUser::new(id, display_name);
    Some(match username {
        Some(u) => user.with_username(u),
        None => user,
    })
}

/// Convert one `getUpdates` entry into an inbound event.
///
/// Returns `None` for updates the bot does not handle (stickers, edits, ...).
pub fn parse_update(update: &Value) -> Option<InboundEvent> {
    if let Some(query) = update.get("callback_query") {
        let user = parse_user(query.get("from")?)?;
        let id = query.get("id").and_then(Value::as_str)?.to_string();
        let data = query
            .get("data")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let chat_id = query
            .pointer("/message/chat/id")
            .and_then(Value::as_i64)
            .unwrap_or(user.id);
        return Some(InboundEvent {
            channel: "telegram".into(),
            chat_id,
            user,
            payload: InboundPayload::Callback { id, data },
        });
    }

    let message = update.get("message")?;
    let user = parse_user(message.get("from")?)?;
    let chat_id = message
        .pointer("/chat/id")
        .and_then(Value::as_i64)
        .unwrap_or(user.id);

    let payload = if let Some(text) = message.get("text").and_then(Value::as_str) {
        InboundPayload::Text(text.to_string())
    } else {
        let phone = message
            .pointer("/contact/phone_number")
            .and_then(Value::as_str)?;
        InboundPayload::Contact {
            phone: phone.to_string(),
        }
    };

    Some(InboundEvent {
        channel: "telegram".into(),
        chat_id,
        user,
        payload,
    })
}

/// Bot API `reply_markup` for a keyboard.
pub fn keyboard_markup(keyboard: &Keyboard) -> Value {
    match keyboard {
        Keyboard::Reply { rows, one_time } => {
            let rows: Vec<Vec<Value>> = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|b| {
                            if b.request_contact {
                                json!({ "text": b.text, "request_contact": true })
                            } else {
                                json!({ "text": b.text })
                            }
                        })
                        .collect()
                })
                .collect();
            json!({
                "keyboard": rows,
                "resize_keyboard": true,
                "one_time_keyboard": one_time,
            })
        }
        Keyboard::Inline(rows) => {
            let rows: Vec<Vec<Value>> = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|b| json!({ "text": b.text, "callback_data": b.callback_data }))
                        .collect()
                })
                .collect();
            json!({ "inline_keyboard": rows })
        }
        Keyboard::Remove => json!({ "remove_keyboard": true }),
    }
}

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts on a char boundary.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut cut = max_len;
        while !remaining.is_char_boundary(cut) {
            cut -= 1;
        }

        // Find a good split point
        let chunk = &remaining[..cut];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(cut);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { cut } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────
