//! Gateway-agnostic message types and channel traits.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::ChannelError;
use crate::session::UserId;

/// The sender of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatUser {
    pub id: UserId,
    pub display_name: String,
    pub username: Option<String>,
}

impl ChatUser {
    pub fn new(id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            username: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// `@username`, or a placeholder when the user has none.
    pub fn handle(&self) -> String {
        self.username
            .as_deref()
            .map(|u| format!("@{u}"))
            .unwrap_or_else(|| "not set".to_string())
    }
}

/// What the user sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundPayload {
    /// Plain text, including keyboard button presses.
    Text(String),
    /// A shared contact card.
    Contact { phone: String },
    /// An inline button press.
    Callback { id: String, data: String },
}

/// A message delivered by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub channel: String,
    /// Chat to reply into.
    pub chat_id: i64,
    pub user: ChatUser,
    pub payload: InboundPayload,
}

impl InboundEvent {
    pub fn text(channel: &str, chat_id: i64, user: ChatUser, text: impl Into<String>) -> Self {
        Self {
            channel: channel.to_string(),
            chat_id,
            user,
            payload: InboundPayload::Text(text.into()),
        }
    }
}

/// A button on a reply keyboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyButton {
    pub text: String,
    /// Ask the client to share the user's phone number.
    pub request_contact: bool,
}

impl KeyButton {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            request_contact: false,
        }
    }

    pub fn contact(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            request_contact: true,
        }
    }
}

/// A button attached to a message that sends callback data back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

/// Keyboard sent along with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    Reply {
        rows: Vec<Vec<KeyButton>>,
        one_time: bool,
    },
    Inline(Vec<Vec<InlineButton>>),
    Remove,
}

impl Keyboard {
    /// Persistent reply keyboard from rows of labels.
    pub fn reply(rows: &[&[&str]]) -> Self {
        Self::Reply {
            rows: rows
                .iter()
                .map(|row| row.iter().map(|t| KeyButton::text(*t)).collect())
                .collect(),
            one_time: false,
        }
    }

    pub fn one_time(self) -> Self {
        match self {
            Self::Reply { rows, .. } => Self::Reply {
                rows,
                one_time: true,
            },
            other => other,
        }
    }
}

/// An outbound message. Text is Telegram-flavoured HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// Escape user-provided text for HTML message bodies.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Stream of inbound events.
pub type MessageStream = Pin<Box<dyn Stream<Item = InboundEvent> + Send>>;

/// Outbound side of a gateway.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Deliver one message to a chat.
    async fn send(&self, chat_id: i64, message: OutgoingMessage) -> Result<(), ChannelError>;
}

/// A messaging gateway: inbound stream plus outbound delivery.
#[async_trait]
pub trait Channel: MessageSink {
    fn name(&self) -> &str;

    /// Start receiving messages.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Acknowledge an inline button press, optionally with a toast text.
    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<(), ChannelError>;

    async fn health_check(&self) -> Result<(), ChannelError>;

    async fn shutdown(&self) -> Result<(), ChannelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_html_handles_markup_chars() {
        assert_eq!(escape_html("<b>Tom & Jerry</b>"), "&lt;b&gt;Tom &amp; Jerry&lt;/b&gt;");
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn chat_user_handle() {
        let user = ChatUser::new(1, "Ivan");
        assert_eq!(user.handle(), "not set");
        assert_eq!(user.with_username("ivan_k").handle(), "@ivan_k");
    }

    #[test]
    fn one_time_only_applies_to_reply_keyboards() {
        let kb = Keyboard::reply(&[&["A", "B"], &["C"]]).one_time();
        match kb {
            Keyboard::Reply { rows, one_time } => {
                assert!(one_time);
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0][1].text, "B");
            }
            other => panic!("unexpected keyboard {other:?}"),
        }
        assert_eq!(Keyboard::Remove.one_time(), Keyboard::Remove);
    }
}
