//! Broadcast event publisher
//!
//! Publishing hands the event to a bounded broadcast channel and returns; the
//! core never waits for subscribers and publishing cannot fail. Slow
//! subscribers observe `Lagged` on their receiver rather than slowing
//! producers down.

use super::types::{OrchestrationEvent, PublishedEvent};
use crate::error::OrchestrationError;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event, returning its publish id
    pub fn publish(&self, event: OrchestrationEvent) -> Uuid {
        let envelope = PublishedEvent::new(event);
        let publish_id = envelope.publish_id;
        let name = envelope.name.clone();

        // send only fails when nobody is subscribed
        let delivered = self.sender.send(envelope).unwrap_or(0);
        debug!(event = %name, publish_id = %publish_id, subscribers = delivered, "📣 Published event");
        publish_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(crate::constants::system::DEFAULT_EVENT_CHANNEL_CAPACITY)
    }
}

/// Serialize an envelope for an external bus transport
pub fn to_payload(event: &PublishedEvent) -> Result<Value, PublishError> {
    Ok(serde_json::to_value(event)?)
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<PublishError> for OrchestrationError {
    fn from(error: PublishError) -> Self {
        match error {
            PublishError::Serialization(err) => OrchestrationError::SerializationError(err.to_string()),
        }
    }
}
