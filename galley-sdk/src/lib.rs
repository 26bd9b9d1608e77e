//! Client-side protocol engine for networked kitchen appliances.
//!
//! Appliances expose a table of ERD properties over pseudo-HTTP messages
//! carried on two different transports: a chat-style messaging protocol
//! and a subscription-capable socket protocol. This crate ties the
//! engine together: the property codec, the per-appliance state cache,
//! request/response correlation, the transport adapters, and typed event
//! dispatch.
//!
//! # Architecture
//!
//! ```text
//! wire frames → Transport adapter → Envelope → Correlation → Registry
//!                                                  ↓            ↓
//!                                              pending      Codec + Cache
//!                                              requests         ↓
//!                                                            Event bus
//! ```
//!
//! One ingestion task per client processes inbound messages in arrival
//! order, which guarantees a single canonical view of every appliance no
//! matter which transport delivered an update.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use galley_sdk::{Client, ClientConfig, Credentials, EventFilter, SocketTransport};
//!
//! // Credentials come from the external login flow.
//! let credentials = Credentials::new(user_id, endpoint, secret);
//!
//! let mut client = Client::new(ClientConfig::default())?;
//! let mut events = client.subscribe(EventFilter::all());
//! client.connect(SocketTransport::new(dialer), &credentials).await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         galley_sdk::Event::ApplianceStateChanged { appliance, changed } => {
//!             println!("{}: {} properties changed", appliance.id(), changed.len());
//!         }
//!         _ => {}
//!     }
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod logging;

pub use client::{Client, ConnectionState};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use logging::{init_logging, init_logging_from_env, LoggingError, LoggingMode};

// Codec layer
pub use galley_erd::{
    ApplianceType, Catalog, Codec, DecodeError, EncodeError, ErdCode, ErdType, ErdValue,
    MeasurementUnits, OvenConfiguration, OvenCookMode, OvenCookSetting, OvenState,
};

// State layer
pub use galley_state::{
    Appliance, ApplianceId, Event, EventFilter, EventKind, EventStream, UpdateOutcome,
};

// Stream layer
pub use galley_stream::{
    ChatTransport, Completion, Credentials, Dial, Envelope, Method, RequestError, Resource,
    SocketTransport, StaticDial, Transport, TransportError, TransportEvent, Wire,
};

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::client::{Client, ConnectionState};
    pub use crate::config::ClientConfig;
    pub use crate::error::{ClientError, Result};
    pub use galley_erd::{Codec, ErdCode, ErdValue};
    pub use galley_state::{Appliance, ApplianceId, Event, EventFilter, EventKind};
    pub use galley_stream::{ChatTransport, Credentials, SocketTransport, Transport};
}
