use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BrokerError {
    #[error("queue capacity must be positive")]
    InvalidCapacity,

    #[error("subscriber '{0}' declares no message ids")]
    NoSubscriberIds(String),

    #[error("publish cancelled by shutdown")]
    Cancelled,
}
