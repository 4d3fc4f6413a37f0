//! Message-broker abstraction for the distributed indexing pipeline
//!
//! The broker delivers per-entity event batches with at-least-once
//! semantics. A failed batch is requeued by the consumer until its attempt
//! budget is spent, then dead-lettered.

pub mod channel;
pub mod error;
pub mod events;
pub mod nats;
pub mod traits;

pub use channel::ChannelBroker;
pub use error::{MessagingError, MessagingResult};
pub use events::EventBatch;
pub use nats::NatsBroker;
pub use traits::MessageBroker;
