//! CLI channel: stdin/stdout REPL for local runs.
//!
//! Every line is a message from a single local user. Two prefixes simulate
//! non-text input: `contact: <phone>` shares a contact and
//! `callback: <data>` presses an inline button.

use std::sync::LazyLock;

use async_trait::async_trait;
use futures::stream;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channels::{
    Channel, ChatUser, InboundEvent, InboundPayload, Keyboard, MessageSink, MessageStream,
    OutgoingMessage,
};
use crate::error::ChannelError;

/// User id of the local console user.
pub const LOCAL_USER_ID: i64 = 1;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</?[a-zA-Z][^>]*>").unwrap());

/// A simple CLI channel that reads from stdin and writes to stdout.
pub struct CliChannel;

impl CliChannel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn one console line into an event from the local user.
pub fn parse_line(line: &str, seq: u64) -> InboundEvent {
    let user = ChatUser::new(LOCAL_USER_ID, "Local User").with_username("local");
    let payload = if let Some(phone) = line.strip_prefix("contact:") {
        InboundPayload::Contact {
            phone: phone.trim().to_string(),
        }
    } else if let Some(data) = line.strip_prefix("callback:") {
        InboundPayload::Callback {
            id: format!("cli-{seq}"),
            data: data.trim().to_string(),
        }
    } else {
        InboundPayload::Text(line.to_string())
    };
    InboundEvent {
        channel: "cli".into(),
        chat_id: LOCAL_USER_ID,
        user,
        payload,
    }
}

/// Render an outgoing message as plain console text.
pub fn render(message: &OutgoingMessage) -> String {
    let text = TAG_RE
        .replace_all(&message.text, "")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");

    let buttons: Vec<String> = match &message.keyboard {
        Some(Keyboard::Reply { rows, .. }) => rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|b| format!("[{}]", b.text))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect(),
        Some(Keyboard::Inline(rows)) => rows
            .iter()
            .flatten()
            .map(|b| format!("[{}] (callback: {})", b.text, b.callback_data))
            .collect(),
        Some(Keyboard::Remove) | None => Vec::new(),
    };

    if buttons.is_empty() {
        text
    } else {
        format!("{text}\n\n{}", buttons.join("\n"))
    }
}

#[async_trait]
impl MessageSink for CliChannel {
    async fn send(&self, chat_id: i64, message: OutgoingMessage) -> Result<(), ChannelError> {
        if chat_id == LOCAL_USER_ID {
            println!("\n{}\n", render(&message));
        } else {
            println!("\n[to {chat_id}]\n{}\n", render(&message));
        }
        eprint!("> ");
        Ok(())
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();
            let mut seq = 0u64;

            // Print prompt
            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            eprint!("> ");
                            continue;
                        }
                        seq += 1;
                        if tx.send(parse_line(&line, seq)).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn answer_callback(&self, _callback_id: &str, text: &str) -> Result<(), ChannelError> {
        if !text.is_empty() {
            eprintln!("ℹ️  {text}");
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
