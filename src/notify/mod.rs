//! Operator notifications.

pub mod fanout;
pub mod roster;

pub use fanout::{
    CLAIM_PREFIX, FanOutReport, NotificationEvent, Notifier, claim_callback, parse_claim_callback,
};
pub use roster::OperatorRoster;
