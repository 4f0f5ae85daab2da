//! Bot runtime: per-user dispatch and event routing.

pub mod dispatcher;
pub mod runtime;

pub use dispatcher::{EventHandler, UserQueues};
pub use runtime::{BotDeps, LeadBot};
