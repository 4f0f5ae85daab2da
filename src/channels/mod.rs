//! Channel abstraction for message I/O.

pub mod channel;
pub mod cli;
pub mod recording;
pub mod telegram;

pub use channel::*;
pub use cli::CliChannel;
pub use recording::RecordingSink;
pub use telegram::TelegramChannel;
