//! Lead data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::UserId;

/// Identifier of a staff operator (their Telegram user id).
pub type OperatorId = i64;

/// Status of a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    /// Submitted, nobody has taken it yet.
    New,
    /// An operator has taken ownership.
    Claimed,
}

impl LeadStatus {
    /// Status only moves forward: New → Claimed.
    pub fn can_transition_to(&self, target: LeadStatus) -> bool {
        matches!((self, target), (LeadStatus::New, LeadStatus::Claimed))
    }
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Claimed => write!(f, "claimed"),
        }
    }
}

/// The values captured by a completed form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadFields {
    pub user_id: UserId,
    pub username: Option<String>,
    pub name: String,
    pub phone: String,
    pub service: String,
    pub business: String,
    pub budget: String,
    pub contact_preference: String,
}

/// A persisted lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: u64,
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub name: String,
    pub phone: String,
    pub service: String,
    pub business: String,
    pub budget: String,
    pub contact_preference: String,
    pub status: LeadStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<OperatorId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Lead {
    /// Build a new lead from form fields.
    pub fn new(id: u64, fields: LeadFields) -> Self {
        Self {
            id,
            user_id: fields.user_id,
            username: fields.username,
            name: fields.name,
            phone: fields.phone,
            service: fields.service,
            business: fields.business,
            budget: fields.budget,
            contact_preference: fields.contact_preference,
            status: LeadStatus::New,
            claimed_by: None,
            claimed_at: None,
            created_at: Utc::now(),
        }
    }
}
