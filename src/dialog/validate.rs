//! Per-step input validation.

use std::sync::LazyLock;

use regex::Regex;

use super::input::DialogInput;
use crate::error::ValidationError;
use crate::session::FormStep;

/// Minimum name length, in characters.
pub const MIN_NAME_CHARS: usize = 2;
/// Minimum business description length, in characters.
pub const MIN_BUSINESS_CHARS: usize = 10;

/// Digits and spaces with an optional leading `+`, at least one digit.
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9 ]*[0-9][0-9 ]*$").unwrap());

/// Validate an answer for `step`, returning the value to store.
///
/// Answers are stored exactly as sent. Lengths count characters of the raw
/// text, and a whitespace-only answer never passes. Only the phone step
/// accepts a shared contact.
pub fn validate(step: FormStep, input: &DialogInput) -> Result<String, ValidationError> {
    let text = match input {
        DialogInput::Contact { phone } if step == FormStep::Phone => {
            return Ok(phone.clone());
        }
        DialogInput::Contact { .. } => return Err(ValidationError::UnexpectedContact),
        DialogInput::Text(text) => text.as_str(),
        // Navigation never reaches validation.
        DialogInput::Start | DialogInput::Back | DialogInput::Cancel => "",
    };

    let blank = text.trim().is_empty();
    let chars = text.chars().count();
    match step {
        FormStep::Name if blank || chars < MIN_NAME_CHARS => Err(ValidationError::NameTooShort),
        FormStep::Phone if !PHONE_RE.is_match(text) => Err(ValidationError::InvalidPhone),
        FormStep::Service if blank => Err(ValidationError::EmptyService),
        FormStep::Business if blank || chars < MIN_BUSINESS_CHARS => {
            Err(ValidationError::BusinessTooShort)
        }
        FormStep::Budget if blank => Err(ValidationError::EmptyBudget),
        FormStep::ContactPreference if blank => Err(ValidationError::EmptyContactPreference),
        _ => Ok(text.to_string()),
    }
}
