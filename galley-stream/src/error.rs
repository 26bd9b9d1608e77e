//! Error types for the galley-stream crate.

/// Adapter-level connect/send failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The connection attempt failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// An outbound message could not be delivered.
    #[error("send failed: {0}")]
    Send(String),

    /// The transport is not connected.
    #[error("transport is not connected")]
    NotConnected,
}

/// A wire message that does not fit the envelope contract.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EnvelopeError {
    /// The target path is not `/{id}/erd/{code}` or `/{id}/cache`.
    #[error("malformed uri: {0:?}")]
    Uri(String),

    /// Unrecognized request method.
    #[error("unknown method: {0:?}")]
    Method(String),

    /// The property payload could not be parsed.
    #[error("malformed payload: {0}")]
    Payload(String),
}

/// How a correlated request can fail to complete.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RequestError {
    /// No matching response arrived within the deadline.
    #[error("no response within the deadline")]
    Timeout,

    /// The transport failed underneath the request.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The engine shut down before the request completed.
    #[error("request cancelled by shutdown")]
    Cancelled,
}
