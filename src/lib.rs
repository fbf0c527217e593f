//! fanout – a minimal in-process message broker fed over TCP.
//!
//! Clients send newline-delimited JSON messages; each message is routed by
//! its `Id` to every subscription queue registered for that id.
//!
//! This crate exports
//!  * `core`    – framing, message codec, bounded queues, the broker registry
//!  * `broker`  – TCP ingestion server and per-connection pipeline
//!  * `config`  – TOML-driven runtime configuration
//!  * `logging` – `tracing` subscriber setup

// ───────────────────────────────────────────────────────────
// Public modules
// ───────────────────────────────────────────────────────────
pub mod broker;
pub mod config;
pub mod core;
pub mod logging;

// ───────────────────────────────────────────────────────────
// Re-exports
// ───────────────────────────────────────────────────────────
pub use broker::{Server, ServerError};
pub use config::{load_config, Config, ConfigError};
pub use crate::core::{Broker, BrokerConfig, BrokerError, Message, MessageId, PrioritizedMessage, PublishOutcome};
