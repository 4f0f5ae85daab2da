//! Form steps and per-user session state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::DialogError;

/// Stable identifier of a chat user (the Telegram user id).
pub type UserId = i64;

/// The steps of the lead form.
///
/// Progresses linearly: Name → Phone → Service → Business → Budget →
/// ContactPreference. A user without a session is not in the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormStep {
    Name,
    Phone,
    Service,
    Business,
    Budget,
    ContactPreference,
}

impl FormStep {
    /// All steps in form order.
    pub const ALL: [FormStep; 6] = [
        FormStep::Name,
        FormStep::Phone,
        FormStep::Service,
        FormStep::Business,
        FormStep::Budget,
        FormStep::ContactPreference,
    ];

    /// The first step of the form.
    pub const FIRST: FormStep = FormStep::Name;

    /// Next step, or `None` when this step finalizes the form.
    pub fn next(&self) -> Option<FormStep> {
        use FormStep::*;
        match self {
            Name => Some(Phone),
            Phone => Some(Service),
            Service => Some(Business),
            Business => Some(Budget),
            Budget => Some(ContactPreference),
            ContactPreference => None,
        }
    }

    /// Previous step, or `None` on the first step.
    pub fn previous(&self) -> Option<FormStep> {
        use FormStep::*;
        match self {
            Name => None,
            Phone => Some(Name),
            Service => Some(Phone),
            Business => Some(Service),
            Budget => Some(Business),
            ContactPreference => Some(Budget),
        }
    }

    /// 1-based position, as shown in "Step N of 6".
    pub fn number(&self) -> usize {
        Self::ALL
            .iter()
            .position(|s| s == self)
            .map(|i| i + 1)
            .unwrap_or(0)
    }

    /// Name of the lead field this step collects.
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Phone => "phone",
            Self::Service => "service",
            Self::Business => "business",
            Self::Budget => "budget",
            Self::ContactPreference => "contact_preference",
        }
    }

    /// Steps strictly before this one.
    pub fn preceding(&self) -> &'static [FormStep] {
        &Self::ALL[..self.number() - 1]
    }
}

impl std::fmt::Display for FormStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.field_name())
    }
}

/// Field values collected so far, one per completed step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    fields: HashMap<FormStep, String>,
}

impl Draft {
    pub fn get(&self, step: FormStep) -> Option<&str> {
        self.fields.get(&step).map(String::as_str)
    }

    /// Store (or overwrite) the value collected at `step`.
    pub fn set(&mut self, step: FormStep, value: impl Into<String>) {
        self.fields.insert(step, value.into());
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// First step before `step` whose field has not been collected.
    pub fn first_missing_before(&self, step: FormStep) -> Option<FormStep> {
        step.preceding()
            .iter()
            .copied()
            .find(|s| !self.fields.contains_key(s))
    }
}

/// Form progress of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    pub user_id: UserId,
    /// Step currently awaiting input.
    pub step: FormStep,
    pub draft: Draft,
}

impl UserSession {
    /// A fresh session at the first step with an empty draft.
    pub fn start(user_id: UserId) -> Self {
        Self {
            user_id,
            step: FormStep::FIRST,
            draft: Draft::default(),
        }
    }

    /// Record the value for the current step and move forward.
    ///
    /// Returns the new step, or `None` if the current step is terminal (the
    /// value is still recorded).
    pub fn advance(&mut self, value: impl Into<String>) -> Option<FormStep> {
        self.draft.set(self.step, value);
        let next = self.step.next()?;
        self.step = next;
        Some(next)
    }

    /// Move back one step without touching the draft. Returns `None` on the
    /// first step.
    pub fn retreat(&mut self) -> Option<FormStep> {
        let previous = self.step.previous()?;
        self.step = previous;
        Some(previous)
    }

    /// Check that every field before the current step is present.
    pub fn check_invariant(&self) -> Result<(), DialogError> {
        match self.draft.first_missing_before(self.step) {
            Some(missing) => Err(DialogError::IncompleteDraft {
                user_id: self.user_id,
                step: self.step,
                field: missing.field_name(),
            }),
            None => Ok(()),
        }
    }
}
