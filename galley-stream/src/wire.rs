//! The injected wire seam.
//!
//! The low-level connection machinery (sockets, TLS, protocol framing)
//! lives outside this engine. What the adapters get is a [`Wire`]: a
//! duplex pipe of text frames, one frame per wire message. Production
//! embedders dial a real connection and hand its framed halves over;
//! tests use [`Wire::pair`] for an in-memory loopback.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::transport::Credentials;

/// One text frame on the underlying message-oriented transport.
pub type Frame = String;

/// A duplex, message-oriented pipe to one established connection.
#[derive(Debug)]
pub struct Wire {
    tx: mpsc::Sender<Frame>,
    rx: mpsc::Receiver<Frame>,
}

impl Wire {
    pub fn new(tx: mpsc::Sender<Frame>, rx: mpsc::Receiver<Frame>) -> Self {
        Self { tx, rx }
    }

    /// Two wires cross-connected in memory: frames sent on one side
    /// arrive on the other.
    pub fn pair(capacity: usize) -> (Wire, Wire) {
        let (near_tx, far_rx) = mpsc::channel(capacity);
        let (far_tx, near_rx) = mpsc::channel(capacity);
        (Wire::new(near_tx, near_rx), Wire::new(far_tx, far_rx))
    }

    pub async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| TransportError::Send("wire closed".to_string()))
    }

    /// Next inbound frame, or `None` once the peer is gone.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    /// Split into independently owned send/receive halves.
    pub fn split(self) -> (mpsc::Sender<Frame>, mpsc::Receiver<Frame>) {
        (self.tx, self.rx)
    }
}

/// Dials the wire-level connection for a transport adapter.
#[async_trait]
pub trait Dial: Send + 'static {
    async fn dial(&mut self, credentials: &Credentials) -> Result<Wire, TransportError>;
}

/// A dialer that yields one pre-established wire, then refuses.
///
/// Useful when the embedder (or a test) already owns the connection.
#[derive(Debug)]
pub struct StaticDial {
    wire: Option<Wire>,
}

impl StaticDial {
    pub fn new(wire: Wire) -> Self {
        Self { wire: Some(wire) }
    }
}

#[async_trait]
impl Dial for StaticDial {
    async fn dial(&mut self, _credentials: &Credentials) -> Result<Wire, TransportError> {
        self.wire
            .take()
            .ok_or_else(|| TransportError::Connect("wire already consumed".to_string()))
    }
}
