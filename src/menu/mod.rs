//! Menu routing for users who are not filling in the form.
//!
//! The router answers commands and menu buttons with static content, tells
//! operators about new users, and forwards free text that looks like a
//! request. It never reads or writes sessions or leads.

pub mod content;

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, info};

pub use content::{
    BTN_ABOUT, BTN_CONTACTS, BTN_LEAVE_REQUEST, BTN_PRICES, BTN_SERVICES, main_keyboard,
};

use crate::channels::{ChatUser, OutgoingMessage};
use crate::dialog::{BTN_BACK, BTN_CANCEL};
use crate::notify::{FanOutReport, NotificationEvent, Notifier};

/// Free text that operators should see.
static REQUEST_KEYWORDS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(request|need|interested|help|cost|price|заявк|нужн|интересу|помощ|помоч|стоимост|цен)",
    )
    .unwrap()
});

/// Name of a `/command`, without the leading slash, any `@botname` suffix,
/// or arguments.
pub fn command(text: &str) -> Option<&str> {
    let word = text.trim().strip_prefix('/')?.split_whitespace().next()?;
    let name = word.split('@').next().unwrap_or(word);
    (!name.is_empty()).then_some(name)
}

/// What a menu message asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuCommand {
    Start,
    Help,
    About,
    Services,
    Prices,
    Contacts,
    /// Cancel or Back with no form in progress.
    Cancel,
    /// Free text matching the request keywords.
    Keyword,
    /// Anything else.
    Other,
}

impl MenuCommand {
    pub fn classify(text: &str) -> Self {
        let trimmed = text.trim();
        if let Some(name) = command(trimmed) {
            return match name.to_lowercase().as_str() {
                "start" => Self::Start,
                "help" => Self::Help,
                "price" | "prices" => Self::Prices,
                "contact" | "contacts" => Self::Contacts,
                "cancel" => Self::Cancel,
                _ => Self::Other,
            };
        }
        match trimmed {
            BTN_ABOUT => Self::About,
            BTN_SERVICES => Self::Services,
            BTN_PRICES => Self::Prices,
            BTN_CONTACTS => Self::Contacts,
            BTN_CANCEL | BTN_BACK => Self::Cancel,
            _ if REQUEST_KEYWORDS_RE.is_match(trimmed) => Self::Keyword,
            _ => Self::Other,
        }
    }

    /// Reference commands and menu buttons, answered even while a form is
    /// in progress.
    pub fn is_informational(&self) -> bool {
        matches!(
            self,
            Self::Help | Self::About | Self::Services | Self::Prices | Self::Contacts
        )
    }
}

/// The router's answer to one message.
#[derive(Debug, Clone)]
pub struct MenuResponse {
    pub command: MenuCommand,
    pub reply: OutgoingMessage,
    /// Set when operators were notified.
    pub report: Option<FanOutReport>,
}

pub struct MenuRouter {
    notifier: Arc<Notifier>,
    manager_username: String,
}

impl MenuRouter {
    pub fn new(notifier: Arc<Notifier>, manager_username: impl Into<String>) -> Self {
        Self {
            notifier,
            manager_username: manager_username.into(),
        }
    }

    /// Answer one text message from `user`.
    pub async fn route(&self, user: &ChatUser, text: &str) -> MenuResponse {
        let command = MenuCommand::classify(text);
        debug!(user_id = user.id, ?command, "Menu message");

        let mut report = None;
        let reply = match command {
            MenuCommand::Start => {
                info!(user_id = user.id, "New user");
                report = Some(
                    self.notifier
                        .notify_operators(&NotificationEvent::NewUser { user: user.clone() })
                        .await,
                );
                content::welcome()
            }
            MenuCommand::Help => content::help(),
            MenuCommand::About => content::about(),
            MenuCommand::Services => content::services(),
            MenuCommand::Prices => content::prices(),
            MenuCommand::Contacts => content::contacts(&self.manager_username),
            MenuCommand::Cancel => content::no_active_request(),
            MenuCommand::Keyword => {
                info!(user_id = user.id, "Forwarding customer message to operators");
                report = Some(
                    self.notifier
                        .notify_operators(&NotificationEvent::CustomerMessage {
                            user: user.clone(),
                            text: text.trim().to_string(),
                        })
                        .await,
                );
                content::message_received(&self.manager_username)
            }
            MenuCommand::Other => content::fallback(),
        };

        MenuResponse {
            command,
            reply,
            report,
        }
    }

    /// Reply for input the menu cannot interpret (e.g. a shared contact).
    pub fn fallback(&self) -> OutgoingMessage {
        content::fallback()
    }
}
