pub mod error;
pub mod frame;
pub mod message;
pub mod queue;
pub mod registry;
pub mod shutdown;
pub mod subscriber;

pub use error::BrokerError;
pub use message::{Message, MessageId, PrioritizedMessage};
pub use registry::{Broker, BrokerConfig, PublishOutcome};
