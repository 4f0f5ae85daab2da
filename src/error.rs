//! Error types for the lead-intake bot.

use crate::session::FormStep;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Lead persistence errors.
///
/// Any of these means the lead was not created.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Lead file {path} is corrupt: {reason}")]
    Corrupt { path: String, reason: String },
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send message on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(String),
}

/// User input rejected by a form step.
///
/// The `Display` text is what the user sees as the corrective prompt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("❌ The name must be at least 2 characters long. Please try again:")]
    NameTooShort,

    #[error(
        "❌ Please enter a valid phone number: digits and spaces only, optionally starting with + (for example, +79991234567):"
    )]
    InvalidPhone,

    #[error("❌ Please choose a service from the list or type your own:")]
    EmptyService,

    #[error("❌ Please describe your business in more detail (at least 10 characters):")]
    BusinessTooShort,

    #[error("❌ Please choose a budget range from the list or type your own:")]
    EmptyBudget,

    #[error("❌ Please tell us how you would like to be contacted (Telegram, WhatsApp, phone call):")]
    EmptyContactPreference,

    #[error("❌ Please type your answer as text.")]
    UnexpectedContact,
}

/// Session-level invariant violations. Fatal for the affected session only.
#[derive(Debug, thiserror::Error)]
pub enum DialogError {
    #[error("Session for user {user_id} at step {step} is missing field {field}")]
    IncompleteDraft {
        user_id: i64,
        step: FormStep,
        field: &'static str,
    },
}

/// Lead claim errors.
#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    #[error("Operator {operator_id} is not on the roster")]
    NotAuthorized { operator_id: i64 },

    #[error("Lead {lead_id} not found")]
    NotFound { lead_id: u64 },

    #[error("Lead {lead_id} already claimed by {claimed_by}")]
    AlreadyClaimed { lead_id: u64, claimed_by: i64 },

    #[error("Lead store error: {0}")]
    Store(#[from] StoreError),
}
