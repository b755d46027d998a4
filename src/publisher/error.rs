//! Error definitions for the publisher

use thiserror::Error;

/// Failure to establish the connection at startup
///
/// Always fatal, the publish loop is never entered.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The credential string could not be parsed or lacks a required part
    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),

    /// The broker answered the connect request with a refusal
    #[error("Connection refused by broker: {0}")]
    Refused(String),

    /// Network or protocol failure before the session was acknowledged
    #[error("Failed to reach endpoint: {0}")]
    Network(String),
}

/// Failure of a single send
#[derive(Debug, Error)]
pub enum TransportError {
    /// The client could not enqueue the publish request
    #[error("Failed to publish message: {0}")]
    Publish(String),

    /// The link broke while the message was in flight
    #[error("Connection lost while sending: {0}")]
    ConnectionLost(String),

    /// The background driver is gone, nothing can be delivered anymore
    #[error("Connection driver stopped")]
    DriverStopped,
}

/// Everything that can end the publish loop abnormally
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}
