//! Best-effort delivery of events to every operator.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use super::roster::OperatorRoster;
use crate::channels::{ChatUser, InlineButton, Keyboard, MessageSink, OutgoingMessage, escape_html};
use crate::leads::{Lead, OperatorId};

/// Callback-data prefix of the "take lead" button.
pub const CLAIM_PREFIX: &str = "claim:";

/// Callback data that claims `lead_id`.
pub fn claim_callback(lead_id: u64) -> String {
    format!("{CLAIM_PREFIX}{lead_id}")
}

/// Parse claim callback data back into a lead id.
pub fn parse_claim_callback(data: &str) -> Option<u64> {
    data.strip_prefix(CLAIM_PREFIX)?.trim().parse().ok()
}

/// Something operators should hear about.
#[derive(Debug, Clone)]
pub enum NotificationEvent {
    /// A user opened the bot with /start.
    NewUser { user: ChatUser },
    /// A completed form was stored.
    NewLead { lead: Lead },
    /// A free-text message that looks like a request.
    CustomerMessage { user: ChatUser, text: String },
}

impl NotificationEvent {
    fn kind(&self) -> &'static str {
        match self {
            Self::NewUser { .. } => "new_user",
            Self::NewLead { .. } => "new_lead",
            Self::CustomerMessage { .. } => "customer_message",
        }
    }

    /// Operator-facing message for this event.
    pub fn render(&self) -> OutgoingMessage {
        match self {
            Self::NewUser { user } => OutgoingMessage::text(format!(
                "👤 <b>New user:</b>\n\nID: {}\nName: {}\nUsername: {}",
                user.id,
                escape_html(&user.display_name),
                escape_html(&user.handle()),
            )),
            Self::NewLead { lead } => {
                let username = lead
                    .username
                    .as_deref()
                    .map(|u| format!("@{u}"))
                    .unwrap_or_else(|| "not set".to_string());
                let text = format!(
                    "🔥 <b>New lead #{}</b>\n\n\
                     <b>Name:</b> {}\n\
                     <b>Phone:</b> {}\n\
                     <b>Service:</b> {}\n\
                     <b>Business:</b> {}\n\
                     <b>Budget:</b> {}\n\
                     <b>Contact via:</b> {}\n\n\
                     User ID: {} ({})\n\
                     Received: {}",
                    lead.id,
                    escape_html(&lead.name),
                    escape_html(&lead.phone),
                    escape_html(&lead.service),
                    escape_html(&lead.business),
                    escape_html(&lead.budget),
                    escape_html(&lead.contact_preference),
                    lead.user_id,
                    escape_html(&username),
                    lead.created_at.format("%Y-%m-%d %H:%M UTC"),
                );
                OutgoingMessage::text(text).with_keyboard(Keyboard::Inline(vec![vec![
                    InlineButton {
                        text: format!("✋ Take lead #{}", lead.id),
                        callback_data: claim_callback(lead.id),
                    },
                ]]))
            }
            Self::CustomerMessage { user, text } => OutgoingMessage::text(format!(
                "📥 <b>New message from a customer:</b>\n\nID: {}\nName: {}\nUsername: {}\nText: {}",
                user.id,
                escape_html(&user.display_name),
                escape_html(&user.handle()),
                escape_html(text),
            )),
        }
    }
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub delivered: usize,
    /// Operators the message could not reach, with the reason.
    pub failed: Vec<(OperatorId, String)>,
}

/// Sends events to every roster operator independently.
pub struct Notifier {
    sink: Arc<dyn MessageSink>,
    roster: Arc<OperatorRoster>,
}

impl Notifier {
    pub fn new(sink: Arc<dyn MessageSink>, roster: Arc<OperatorRoster>) -> Self {
        Self { sink, roster }
    }

    pub fn roster(&self) -> &OperatorRoster {
        &self.roster
    }

    /// Deliver `event` to every operator.
    ///
    /// One attempt per operator, all in flight at once. A failed delivery is
    /// logged and counted; it never affects the other operators or the
    /// caller.
    pub async fn notify_operators(&self, event: &NotificationEvent) -> FanOutReport {
        if self.roster.is_empty() {
            debug!(event = event.kind(), "No operators configured; skipping fan-out");
            return FanOutReport::default();
        }

        let message = event.render();
        let deliveries = self.roster.iter().map(|operator| {
            let message = message.clone();
            async move { (operator, self.sink.send(operator, message).await) }
        });

        let mut report = FanOutReport::default();
        for (operator, result) in join_all(deliveries).await {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(operator, event = event.kind(), error = %e, "Operator notification failed");
                    report.failed.push((operator, e.to_string()));
                }
            }
        }

        info!(
            event = event.kind(),
            delivered = report.delivered,
            failed = report.failed.len(),
            "Operators notified"
        );
        report
    }
}
