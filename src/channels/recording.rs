//! In-memory gateway that records outbound messages and callback answers.
//!
//! Used by tests in place of a live gateway. `start` replays the events
//! queued with `push_inbound` and then ends. Individual chats can be marked
//! unreachable to exercise delivery failures.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use futures::stream;

use crate::channels::{Channel, InboundEvent, MessageSink, MessageStream, OutgoingMessage};
use crate::error::ChannelError;

#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(i64, OutgoingMessage)>>,
    unreachable: Mutex<HashSet<i64>>,
    answered: Mutex<Vec<(String, String)>>,
    inbound: Mutex<Vec<InboundEvent>>,
    send_delay: Mutex<Option<Duration>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make deliveries to `chat_id` fail.
    pub fn fail_for(&self, chat_id: i64) {
        self.unreachable
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(chat_id);
    }

    /// Everything delivered so far, in order.
    pub fn sent(&self) -> Vec<(i64, OutgoingMessage)> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Messages delivered to one chat.
    pub fn sent_to(&self, chat_id: i64) -> Vec<OutgoingMessage> {
        self.sent()
            .into_iter()
            .filter(|(id, _)| *id == chat_id)
            .map(|(_, m)| m)
            .collect()
    }

    /// Callback answers as (callback id, toast text).
    pub fn answered(&self) -> Vec<(String, String)> {
        self.answered.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Queue an event for the stream returned by `start`.
    pub fn push_inbound(&self, event: InboundEvent) {
        self.inbound
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }

    /// Make every delivery take `delay`.
    pub fn delay_sends(&self, delay: Duration) {
        *self.send_delay.lock().unwrap_or_else(|e| e.into_inner()) = Some(delay);
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn send(&self, chat_id: i64, message: OutgoingMessage) -> Result<(), ChannelError> {
        let delay = *self.send_delay.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let unreachable = self
            .unreachable
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&chat_id);
        if unreachable {
            return Err(ChannelError::SendFailed {
                name: "recording".into(),
                reason: format!("chat {chat_id} unreachable"),
            });
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((chat_id, message));
        Ok(())
    }
}

#[async_trait]
impl Channel for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let events = std::mem::take(&mut *self.inbound.lock().unwrap_or_else(|e| e.into_inner()));
        Ok(Box::pin(stream::iter(events)))
    }

    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<(), ChannelError> {
        self.answered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((callback_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
