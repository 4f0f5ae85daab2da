//! The guided lead form.

pub mod controller;
pub mod input;
pub mod prompts;
pub mod validate;

pub use controller::{DialogController, DialogOutcome};
pub use input::{BTN_BACK, BTN_CANCEL, BTN_SHARE_PHONE, DialogInput};
pub use validate::validate;
