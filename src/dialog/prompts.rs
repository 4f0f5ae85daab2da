//! User-facing texts and keyboards of the form.

use super::input::{BTN_BACK, BTN_CANCEL, BTN_SHARE_PHONE};
use crate::channels::{KeyButton, Keyboard, OutgoingMessage, escape_html};
use crate::error::ValidationError;
use crate::leads::Lead;
use crate::menu;
use crate::session::FormStep;

/// Service options offered on the service step.
pub const SERVICE_OPTIONS: [&str; 4] = [
    "📱 SMM",
    "🛍 Marketplaces",
    "📊 Advertising setup",
    "🚀 Full-service promotion",
];

/// Budget brackets offered on the budget step.
pub const BUDGET_OPTIONS: [&str; 4] = ["up to 50k", "50k-100k", "100k-200k", "200k+"];

/// Contact channel suggestions on the last step.
pub const CONTACT_OPTIONS: [&str; 3] = ["Telegram", "Phone call", "WhatsApp"];

fn nav_row() -> Vec<KeyButton> {
    vec![KeyButton::text(BTN_BACK), KeyButton::text(BTN_CANCEL)]
}

fn options_keyboard(options: &[&str], per_row: usize) -> Keyboard {
    let mut rows: Vec<Vec<KeyButton>> = options
        .chunks(per_row)
        .map(|chunk| chunk.iter().map(|o| KeyButton::text(*o)).collect())
        .collect();
    rows.push(nav_row());
    Keyboard::Reply {
        rows,
        one_time: false,
    }
}

/// Keyboard shown while waiting for `step`.
pub fn step_keyboard(step: FormStep) -> Keyboard {
    match step {
        FormStep::Name | FormStep::Business => Keyboard::Reply {
            rows: vec![nav_row()],
            one_time: false,
        },
        FormStep::Phone => Keyboard::Reply {
            rows: vec![vec![KeyButton::contact(BTN_SHARE_PHONE)], nav_row()],
            one_time: false,
        },
        FormStep::Service => options_keyboard(&SERVICE_OPTIONS, 2),
        FormStep::Budget => options_keyboard(&BUDGET_OPTIONS, 2),
        FormStep::ContactPreference => options_keyboard(&CONTACT_OPTIONS, 3),
    }
}

fn question(step: FormStep) -> &'static str {
    match step {
        FormStep::Name => "What is your name?",
        FormStep::Phone => {
            "Your phone number?\n\nType it or press the button below to share your contact."
        }
        FormStep::Service => "Which service are you interested in?",
        FormStep::Business => {
            "Tell us briefly about your business.\n\nWhat do you sell, where, and to whom?"
        }
        FormStep::Budget => "What monthly budget do you have in mind?",
        FormStep::ContactPreference => "How should we contact you?",
    }
}

/// The question for `step` with its progress header and keyboard.
pub fn step_prompt(step: FormStep) -> OutgoingMessage {
    OutgoingMessage::text(format!(
        "<b>Step {} of {}</b>\n\n{}",
        step.number(),
        FormStep::ALL.len(),
        question(step)
    ))
    .with_keyboard(step_keyboard(step))
}

/// Reply when the form is (re)started.
pub fn form_started() -> OutgoingMessage {
    let mut message = step_prompt(FormStep::FIRST);
    message.text = format!(
        "📝 <b>Let's put together your request.</b>\n\nIt takes six short questions.\n\n{}",
        message.text
    );
    message
}

/// Reply after `step` was accepted and the form moved on to `next`.
pub fn step_accepted(step: FormStep, next: FormStep) -> OutgoingMessage {
    let mut message = step_prompt(next);
    message.text = format!("✅ Saved your {}.\n\n{}", label(step), message.text);
    message
}

/// Corrective reply for a rejected answer; the keyboard stays the same.
pub fn rejected(step: FormStep, error: &ValidationError) -> OutgoingMessage {
    OutgoingMessage::text(error.to_string()).with_keyboard(step_keyboard(step))
}

pub fn cancelled() -> OutgoingMessage {
    OutgoingMessage::text("❌ Request cancelled. Nothing was saved.\n\nYou can start again any time.")
        .with_keyboard(menu::main_keyboard())
}

/// Reply when Back is pressed on the first step.
pub fn left_form() -> OutgoingMessage {
    OutgoingMessage::text("🏠 Back to the main menu.").with_keyboard(menu::main_keyboard())
}

/// Reply when the session turned out to be inconsistent and was dropped.
pub fn session_reset() -> OutgoingMessage {
    OutgoingMessage::text(
        "😕 Something went wrong with your request and it was reset.\n\nPlease start again from the menu.",
    )
    .with_keyboard(menu::main_keyboard())
}

/// Reply when the lead could not be saved; the user may just resend.
pub fn submit_failed() -> OutgoingMessage {
    OutgoingMessage::text(
        "⚠️ We could not save your request right now.\n\nPlease send your answer again in a moment.",
    )
    .with_keyboard(step_keyboard(FormStep::ContactPreference))
}

/// Confirmation with a summary of the stored lead.
pub fn submitted(lead: &Lead) -> OutgoingMessage {
    OutgoingMessage::text(format!(
        "🎉 <b>Thank you, your request #{} has been received!</b>\n\n\
         <b>Name:</b> {}\n\
         <b>Phone:</b> {}\n\
         <b>Service:</b> {}\n\
         <b>Business:</b> {}\n\
         <b>Budget:</b> {}\n\
         <b>Contact via:</b> {}\n\n\
         A manager will get in touch with you shortly.",
        lead.id,
        escape_html(&lead.name),
        escape_html(&lead.phone),
        escape_html(&lead.service),
        escape_html(&lead.business),
        escape_html(&lead.budget),
        escape_html(&lead.contact_preference),
    ))
    .with_keyboard(menu::main_keyboard())
}

fn label(step: FormStep) -> &'static str {
    match step {
        FormStep::Name => "name",
        FormStep::Phone => "phone number",
        FormStep::Service => "service choice",
        FormStep::Business => "business description",
        FormStep::Budget => "budget",
        FormStep::ContactPreference => "contact preference",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(keyboard: &Keyboard) -> Vec<Vec<String>> {
        match keyboard {
            Keyboard::Reply { rows, .. } => rows
                .iter()
                .map(|r| r.iter().map(|b| b.text.clone()).collect())
                .collect(),
            other => panic!("expected reply keyboard, got {other:?}"),
        }
    }

    #[test]
    fn every_step_prompt_shows_progress_and_navigation() {
        for step in FormStep::ALL {
            let msg = step_prompt(step);
            assert!(msg.text.contains(&format!("Step {} of 6", step.number())));
            let rows = labels(msg.keyboard.as_ref().unwrap());
            assert_eq!(rows.last().unwrap(), &vec![BTN_BACK.to_string(), BTN_CANCEL.to_string()]);
        }
    }

    #[test]
    fn phone_step_requests_contact() {
        match step_keyboard(FormStep::Phone) {
            Keyboard::Reply { rows, .. } => {
                assert!(rows[0][0].request_contact);
                assert_eq!(rows[0][0].text, BTN_SHARE_PHONE);
            }
            other => panic!("unexpected keyboard {other:?}"),
        }
    }

    #[test]
    fn budget_step_offers_brackets() {
        let rows = labels(&step_keyboard(FormStep::Budget));
        let flat: Vec<String> = rows.concat();
        for option in BUDGET_OPTIONS {
            assert!(flat.contains(&option.to_string()));
        }
    }

    #[test]
    fn rejection_keeps_step_keyboard() {
        let msg = rejected(FormStep::Name, &ValidationError::NameTooShort);
        assert!(msg.text.contains(&ValidationError::NameTooShort.to_string()));
        assert_eq!(msg.keyboard, Some(step_keyboard(FormStep::Name)));
    }
}
