//! The abstract transport contract.
//!
//! Two structurally different wire protocols carry the same envelope:
//! a chat-style messaging protocol and a subscription-capable socket
//! protocol. Each adapter implements this one trait; the client depends
//! only on the trait.

use async_trait::async_trait;
use tokio::sync::mpsc;

use galley_state::ApplianceId;

use crate::envelope::Envelope;
use crate::error::TransportError;

/// Opaque transport-credential bundle.
///
/// Produced by the external credential provider (the OAuth/token
/// exchange lives outside this engine) and passed through to
/// [`Transport::connect`] unmodified.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Account identifier at the vendor service.
    pub user_id: String,
    /// Transport endpoint: the chat server's domain, or the socket URL.
    pub endpoint: String,
    /// Bearer secret for the session.
    pub secret: String,
}

impl Credentials {
    pub fn new(
        user_id: impl Into<String>,
        endpoint: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            endpoint: endpoint.into(),
            secret: secret.into(),
        }
    }
}

/// What an adapter surfaces upward.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A decoded protocol message.
    Inbound(Envelope),

    /// A device-level availability signal (chat presence, or the socket
    /// API's appliance list).
    Availability { appliance: ApplianceId, online: bool },

    /// The connection is gone. Terminal for this connection attempt;
    /// reconnection is the client's decision.
    Closed { reason: String },
}

/// One transport adapter.
///
/// `connect` must finish whatever the wire needs before pushes are
/// guaranteed (the socket protocol's subscribe handshake happens inside
/// `connect`), so the engine may treat a returned `Ok` as "connected and
/// subscribed".
#[async_trait]
pub trait Transport: Send + 'static {
    /// Establish the connection using an externally supplied credential
    /// bundle.
    async fn connect(&mut self, credentials: &Credentials) -> Result<(), TransportError>;

    /// Take the inbound event stream.
    ///
    /// # Panics
    ///
    /// Panics if called more than once per connection, or before
    /// `connect`.
    fn incoming(&mut self) -> mpsc::Receiver<TransportEvent>;

    /// Encode and send one envelope.
    async fn send(&mut self, envelope: Envelope) -> Result<(), TransportError>;

    /// Tear the connection down.
    async fn disconnect(&mut self);
}
