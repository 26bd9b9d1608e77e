//! Message plumbing for galley-sdk.
//!
//! Everything between the state layer and the wire: the pseudo-HTTP
//! [`Envelope`], the request/response [`correlation`] table, the
//! [`Transport`] contract, and the two concrete adapters — the
//! chat-style messaging protocol and the subscription-capable socket
//! protocol. Both adapters map their native frame shapes onto the same
//! envelope, so the layers above never know which wire delivered a
//! message.
//!
//! The wire itself (sockets, TLS, framing) is injected through the
//! [`wire::Dial`] seam; connection-level machinery is an external
//! collaborator, not part of this engine.

pub mod chat;
pub mod correlation;
pub mod envelope;
pub mod error;
pub mod socket;
pub mod transport;
pub mod wire;

pub use chat::ChatTransport;
pub use correlation::{Completion, PendingHandle, PendingTable};
pub use envelope::{Envelope, Method, Resource};
pub use error::{EnvelopeError, RequestError, TransportError};
pub use socket::SocketTransport;
pub use transport::{Credentials, Transport, TransportEvent};
pub use wire::{Dial, Frame, StaticDial, Wire};
