//! Lead intake bot: a chat menu plus a guided six-step request form whose
//! results are stored as leads and fanned out to operators.

pub mod bot;
pub mod channels;
pub mod config;
pub mod dialog;
pub mod error;
pub mod health;
pub mod leads;
pub mod menu;
pub mod notify;
pub mod session;
