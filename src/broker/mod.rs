//! # Broker Module
//!
//! Network-facing side of the broker.
//!
//! - `engine`: the TCP server that accepts ingestion connections, frames and
//!   decodes their bytes and publishes the resulting messages into the core
//!   [`Broker`](crate::core::Broker).

pub mod engine;

pub use self::engine::{Server, ServerError};
