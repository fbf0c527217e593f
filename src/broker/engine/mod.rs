//! Server engine for the ingestion endpoint.
//!
//! `server` owns the accept loop and subscriber bootstrap; `connection`
//! turns one socket into publish calls.

pub mod connection;
pub mod server;

pub use connection::{Connection, ConnectionError, ConnectionLimits, ConnectionStats};
pub use server::{Server, ServerError};
