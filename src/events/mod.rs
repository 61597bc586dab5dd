//! # Event Publishing
//!
//! Typed lifecycle events and the broadcast publisher that carries them to
//! in-process subscribers and bus adapters.

pub mod publisher;
pub mod types;

pub use publisher::{to_payload, EventPublisher, PublishError};
pub use types::{OrchestrationEvent, PublishedEvent};
