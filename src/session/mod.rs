//! Per-user form sessions.

pub mod model;
pub mod store;

pub use model::{Draft, FormStep, UserId, UserSession};
pub use store::{InMemorySessionStore, SessionStore};
