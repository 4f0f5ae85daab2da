//! Classifies inbound payloads into dialog inputs.

use crate::channels::InboundPayload;
use crate::menu::{BTN_LEAVE_REQUEST, command};

/// Back navigation button shown on every form step.
pub const BTN_BACK: &str = "🔙 Back";
/// Cancel button shown on every form step.
pub const BTN_CANCEL: &str = "❌ Cancel";
/// Contact-sharing button on the phone step.
pub const BTN_SHARE_PHONE: &str = "📱 Share my phone number";

/// One user action as seen by the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogInput {
    /// (Re)start the form from the first step.
    Start,
    /// Go back one step.
    Back,
    /// Abandon the form.
    Cancel,
    /// A typed answer or a keyboard selection.
    Text(String),
    /// A shared contact card.
    Contact { phone: String },
}

impl DialogInput {
    /// Interpret a payload. Inline button presses are not form input.
    pub fn from_payload(payload: &InboundPayload) -> Option<Self> {
        match payload {
            InboundPayload::Text(text) => Some(Self::from_text(text)),
            InboundPayload::Contact { phone } => Some(Self::Contact {
                phone: phone.clone(),
            }),
            InboundPayload::Callback { .. } => None,
        }
    }

    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        match (trimmed, command(trimmed)) {
            (BTN_CANCEL, _) | (_, Some("cancel")) => Self::Cancel,
            (BTN_BACK, _) | (_, Some("back")) => Self::Back,
            (BTN_LEAVE_REQUEST, _) | (_, Some("request")) => Self::Start,
            _ => Self::Text(text.to_string()),
        }
    }
}
