//! LeadBot: routes gateway events to the form, the menu, and lead claims.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use super::dispatcher::{EventHandler, UserQueues};
use crate::channels::{
    Channel, ChatUser, InboundEvent, InboundPayload, MessageSink, OutgoingMessage, escape_html,
};
use crate::dialog::{DialogController, DialogInput, DialogOutcome};
use crate::error::{ChannelError, ClaimError};
use crate::leads::{ClaimService, Lead, LeadStore};
use crate::menu::{MenuCommand, MenuRouter};
use crate::notify::{Notifier, OperatorRoster, parse_claim_callback};
use crate::session::SessionStore;

/// How long shutdown waits for in-flight events, including fan-out.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Shared services the bot is built from.
pub struct BotDeps {
    pub sessions: Arc<dyn SessionStore>,
    pub leads: Arc<dyn LeadStore>,
    pub roster: Arc<OperatorRoster>,
    pub manager_username: String,
}

pub struct LeadBot {
    channel: Arc<dyn Channel>,
    sink: Arc<dyn MessageSink>,
    dialog: DialogController,
    menu: MenuRouter,
    claims: ClaimService,
}

impl LeadBot {
    pub fn new<C: Channel + 'static>(channel: Arc<C>, deps: BotDeps) -> Self {
        let sink: Arc<dyn MessageSink> = channel.clone();
        let notifier = Arc::new(Notifier::new(Arc::clone(&sink), Arc::clone(&deps.roster)));
        Self {
            channel,
            dialog: DialogController::new(deps.sessions, Arc::clone(&deps.leads), Arc::clone(&notifier)),
            menu: MenuRouter::new(notifier, deps.manager_username),
            claims: ClaimService::new(deps.leads, deps.roster),
            sink,
        }
    }

    /// Consume the gateway until it ends or Ctrl+C, finish events already
    /// queued, then shut the gateway down.
    pub async fn run(self: Arc<Self>) -> Result<(), ChannelError> {
        let mut stream = self.channel.start().await?;
        let queues = UserQueues::new(Arc::clone(&self) as Arc<dyn EventHandler>);

        tracing::info!(channel = self.channel.name(), "Lead bot ready and listening");

        loop {
            tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break;
                }
                event = stream.next() => match event {
                    Some(event) => queues.dispatch(event),
                    None => {
                        tracing::info!("Inbound stream ended, shutting down...");
                        break;
                    }
                }
            }
        }

        queues.drain(SHUTDOWN_GRACE).await;
        self.channel.shutdown().await
    }

    /// Handle one inbound event and send the replies it produces.
    pub async fn handle_event(&self, event: InboundEvent) {
        tracing::debug!(
            user_id = event.user.id,
            channel = %event.channel,
            "Inbound event"
        );

        if let InboundPayload::Callback { id, data } = &event.payload {
            self.handle_callback(&event.user, event.chat_id, id, data).await;
            return;
        }

        if let Some(reply) = self.reply_for(&event.user, &event.payload).await {
            self.send(event.chat_id, reply).await;
        }
    }

    async fn reply_for(&self, user: &ChatUser, payload: &InboundPayload) -> Option<OutgoingMessage> {
        let text = match payload {
            InboundPayload::Text(text) => Some(text.as_str()),
            _ => None,
        };
        let menu_command = text.map(MenuCommand::classify);

        // /start always returns to the main menu.
        if menu_command == Some(MenuCommand::Start) {
            self.dialog.abandon(user.id).await;
            return Some(self.menu.route(user, text?).await.reply);
        }

        let input = DialogInput::from_payload(payload)?;
        if input == DialogInput::Start {
            return self.dialog.start_form(user.id).await.into_reply();
        }

        if self.dialog.is_in_form(user.id).await {
            if menu_command.is_some_and(|c| c.is_informational()) {
                return Some(self.menu.route(user, text?).await.reply);
            }
            match self.dialog.handle(user, input).await {
                DialogOutcome::NotInForm => {}
                outcome => return outcome.into_reply(),
            }
        }

        match text {
            Some(text) => Some(self.menu.route(user, text).await.reply),
            None => Some(self.menu.fallback()),
        }
    }

    async fn handle_callback(&self, operator: &ChatUser, chat_id: i64, callback_id: &str, data: &str) {
        let toast = match parse_claim_callback(data) {
            Some(lead_id) => self.claim(operator, chat_id, lead_id).await,
            None => {
                tracing::warn!(operator = operator.id, data, "Unknown callback data");
                String::new()
            }
        };

        if let Err(e) = self.channel.answer_callback(callback_id, &toast).await {
            tracing::warn!(operator = operator.id, error = %e, "Failed to answer callback");
        }
    }

    /// Claim a lead for `operator`; returns the toast text for the button press.
    async fn claim(&self, operator: &ChatUser, chat_id: i64, lead_id: u64) -> String {
        match self.claims.claim(lead_id, operator.id).await {
            Ok(lead) => {
                self.send(lead.user_id, customer_claimed_message(&lead)).await;
                self.send(chat_id, operator_claimed_message(&lead)).await;
                format!("Lead #{lead_id} is yours")
            }
            Err(ClaimError::AlreadyClaimed { claimed_by, .. }) if claimed_by == operator.id => {
                format!("You already took lead #{lead_id}")
            }
            Err(ClaimError::AlreadyClaimed { .. }) => {
                format!("Lead #{lead_id} was already taken by another manager")
            }
            Err(ClaimError::NotAuthorized { .. }) => {
                tracing::warn!(operator = operator.id, lead_id, "Claim by non-operator rejected");
                "You are not allowed to take leads".to_string()
            }
            Err(ClaimError::NotFound { .. }) => format!("Lead #{lead_id} not found"),
            Err(ClaimError::Store(e)) => {
                tracing::error!(lead_id, error = %e, "Failed to claim lead");
                "Could not take the lead, please try again".to_string()
            }
        }
    }

    async fn send(&self, chat_id: i64, message: OutgoingMessage) {
        if let Err(e) = self.sink.send(chat_id, message).await {
            tracing::error!(chat_id, error = %e, "Failed to send reply");
        }
    }
}

#[async_trait]
impl EventHandler for LeadBot {
    async fn handle(&self, event: InboundEvent) {
        self.handle_event(event).await;
    }
}

fn customer_claimed_message(lead: &Lead) -> OutgoingMessage {
    OutgoingMessage::text(format!(
        "👋 Your request #{} is now with a manager. They will contact you via {} shortly.",
        lead.id,
        escape_html(&lead.contact_preference)
    ))
}

fn operator_claimed_message(lead: &Lead) -> OutgoingMessage {
    let username = lead
        .username
        .as_deref()
        .map(|u| format!("@{u}"))
        .unwrap_or_else(|| "not set".to_string());
    OutgoingMessage::text(format!(
        "✅ <b>You took lead #{}</b>\n\n\
         <b>Name:</b> {}\n\
         <b>Phone:</b> {}\n\
         <b>Contact via:</b> {}\n\
         <b>Username:</b> {}",
        lead.id,
        escape_html(&lead.name),
        escape_html(&lead.phone),
        escape_html(&lead.contact_preference),
        escape_html(&username),
    ))
}
