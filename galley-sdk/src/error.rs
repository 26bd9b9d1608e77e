//! Client-level error type.

use galley_erd::{DecodeError, EncodeError};
use galley_state::ApplianceId;
use galley_stream::{RequestError, TransportError};

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors surfaced by the [`Client`](crate::Client).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The client has no live connection.
    #[error("client is not connected")]
    NotConnected,

    /// `connect` was called while a connection is already up.
    #[error("client is already connected")]
    AlreadyConnected,

    /// The operation addressed an identifier this session has never
    /// seen. A failed lookup never creates a placeholder appliance.
    #[error("appliance {0} is not registered")]
    UnknownAppliance(ApplianceId),

    /// The supplied value is outside the property's legal domain. The
    /// request was never sent.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// A response confirmation could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Adapter-level connect/send failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The correlated request failed (timeout, transport loss, or
    /// shutdown).
    #[error(transparent)]
    Request(#[from] RequestError),

    /// Invalid client configuration.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}
