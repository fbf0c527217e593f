//! Subscriber side of the broker.
//!
//! Provides the [`MessageSubscriber`] capability implemented by queue
//! consumers and the bundled [`LoggingSubscriber`].

#[allow(clippy::module_inception)]
pub mod subscriber;

pub use subscriber::{LoggingSubscriber, MessageSubscriber};
