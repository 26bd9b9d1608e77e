//! The client coordinator.
//!
//! A [`Client`] owns one transport adapter, the appliance registry and
//! the event bus, and drives the single ingestion loop that keeps the
//! state cache canonical. Outbound operations can be issued from any
//! task; each suspends on its own pending-request handle, never on the
//! ingestion loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use galley_erd::{Codec, ErdCode, ErdValue};
use galley_state::{
    Appliance, ApplianceId, Event, EventBus, EventFilter, EventStream, Registry,
};
use galley_stream::{
    Completion, Credentials, Envelope, PendingTable, RequestError, Transport, TransportError,
    TransportEvent,
};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

/// Connection lifecycle of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Disconnected,
}

type SharedTransport = Arc<Mutex<Box<dyn Transport>>>;

struct Shared {
    config: ClientConfig,
    codec: Codec,
    registry: Registry,
    bus: EventBus,
    pending: PendingTable,
    state: RwLock<ConnectionState>,
}

/// Top-level coordinator for one appliance-protocol session.
///
/// The client is transport-agnostic: hand [`connect`](Client::connect)
/// any [`Transport`] implementation. Lifecycle is explicit — the client
/// owns its ingestion task and tears it down in
/// [`shutdown`](Client::shutdown); there is no ambient runtime state.
pub struct Client {
    shared: Arc<Shared>,
    transport: Option<SharedTransport>,
    ingest: Option<JoinHandle<()>>,
}

impl Client {
    /// Build an idle client. Fails only on invalid configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_codec(config, Codec::builtin()))
    }

    /// Build an idle client over a custom codec/catalog.
    pub fn with_codec(config: ClientConfig, codec: Codec) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                codec,
                registry: Registry::new(),
                bus: EventBus::new(),
                pending: PendingTable::new(),
                state: RwLock::new(ConnectionState::Idle),
            }),
            transport: None,
            ingest: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.read()
    }

    pub fn codec(&self) -> &Codec {
        &self.shared.codec
    }

    /// Subscribe to engine events.
    pub fn subscribe(&self, filter: EventFilter) -> EventStream {
        self.shared.bus.subscribe(filter)
    }

    /// Look up a registered appliance.
    pub fn appliance(&self, id: &ApplianceId) -> Option<Arc<Appliance>> {
        self.shared.registry.get(id)
    }

    /// Snapshot of every registered appliance.
    pub fn appliances(&self) -> Vec<Arc<Appliance>> {
        self.shared.registry.all()
    }

    /// Connect through the given transport using externally supplied
    /// credentials, then start the ingestion loop.
    ///
    /// Emits [`Event::Connected`] once the adapter reports that its
    /// subscription handshake is complete.
    pub async fn connect<T: Transport>(
        &mut self,
        transport: T,
        credentials: &Credentials,
    ) -> Result<()> {
        {
            let mut state = self.shared.state.write();
            match *state {
                ConnectionState::Connecting | ConnectionState::Connected => {
                    return Err(ClientError::AlreadyConnected)
                }
                _ => *state = ConnectionState::Connecting,
            }
        }

        let mut transport: Box<dyn Transport> = Box::new(transport);
        if let Err(err) = transport.connect(credentials).await {
            *self.shared.state.write() = ConnectionState::Disconnected;
            return Err(err.into());
        }
        let incoming = transport.incoming();
        let transport: SharedTransport = Arc::new(Mutex::new(transport));

        *self.shared.state.write() = ConnectionState::Connected;
        self.shared.bus.publish(Event::Connected);

        let shared = Arc::clone(&self.shared);
        let ingest_transport = Arc::clone(&transport);
        self.ingest = Some(tokio::spawn(async move {
            ingest_loop(shared, ingest_transport, incoming).await;
        }));
        self.transport = Some(transport);
        Ok(())
    }

    /// Explicitly register a known appliance ahead of any inbound
    /// traffic, e.g. from a stored peer list. Emits
    /// [`Event::ApplianceAdded`] and, when connected, requests its
    /// cache.
    pub async fn add_appliance(&self, id: &ApplianceId) -> Arc<Appliance> {
        let (appliance, created) = self.shared.registry.get_or_insert(id);
        if created {
            self.shared.bus.publish(Event::ApplianceAdded {
                appliance: Arc::clone(&appliance),
            });
            if self.state() == ConnectionState::Connected && self.shared.config.refresh_on_add {
                if let Some(transport) = &self.transport {
                    request_refresh(&self.shared, transport, id).await;
                }
            }
        }
        appliance
    }

    /// Ask an appliance to report fresh property state.
    ///
    /// With a code, one property is requested; without, the full cache.
    /// Resolves once the matching response is processed, with the
    /// response payload and the subset that changed the cache.
    pub async fn request_property_update(
        &self,
        id: &ApplianceId,
        code: Option<ErdCode>,
    ) -> Result<Completion> {
        self.ensure_connected()?;
        let appliance = self
            .shared
            .registry
            .get(id)
            .ok_or_else(|| ClientError::UnknownAppliance(id.clone()))?;

        let (corr, handle) = self
            .shared
            .pending
            .register(self.shared.config.request_timeout);
        let envelope = match code {
            Some(code) => Envelope::get_erd(appliance.id().clone(), code, corr.clone()),
            None => Envelope::get_cache(appliance.id().clone(), corr.clone()),
        };
        self.send(envelope).await?;
        self.await_completion(corr, handle).await
    }

    /// Encode and send a new property value, resolving with the decoded
    /// set-confirmation.
    ///
    /// Encoding happens before anything touches the wire: an illegal
    /// value fails synchronously and no request is sent.
    pub async fn set_property_value(
        &self,
        id: &ApplianceId,
        code: ErdCode,
        value: &ErdValue,
    ) -> Result<ErdValue> {
        self.ensure_connected()?;
        let appliance = self
            .shared
            .registry
            .get(id)
            .ok_or_else(|| ClientError::UnknownAppliance(id.clone()))?;

        let raw = self.shared.codec.encode(code, value)?;

        let (corr, handle) = self
            .shared
            .pending
            .register(self.shared.config.request_timeout);
        let envelope = Envelope::post(appliance.id().clone(), code, raw.clone(), corr.clone());
        self.send(envelope).await?;
        let completion = self.await_completion(corr, handle).await?;

        // Conventionally the response echoes the key/value that was set.
        let echoed = completion.payload.get(&code).unwrap_or(&raw);
        match self.shared.codec.decode(code, echoed) {
            Ok(confirmed) => Ok(confirmed),
            Err(err) => {
                tracing::warn!(%code, echoed, %err, "undecodable set confirmation");
                Ok(self.shared.codec.decode(code, &raw)?)
            }
        }
    }

    /// Disconnect and stop the ingestion loop. Registered appliances and
    /// their cached state survive for inspection.
    pub async fn shutdown(&mut self) {
        if let Some(transport) = self.transport.take() {
            transport.lock().await.disconnect().await;
        }
        if let Some(ingest) = self.ingest.take() {
            let _ = ingest.await;
        }
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.state() == ConnectionState::Connected {
            Ok(())
        } else {
            Err(ClientError::NotConnected)
        }
    }

    async fn send(&self, envelope: Envelope) -> Result<()> {
        let transport = self.transport.as_ref().ok_or(ClientError::NotConnected)?;
        transport
            .lock()
            .await
            .send(envelope)
            .await
            .map_err(ClientError::from)
    }

    async fn await_completion(
        &self,
        corr: String,
        handle: galley_stream::PendingHandle,
    ) -> Result<Completion> {
        match tokio::time::timeout(self.shared.config.request_timeout, handle.wait()).await {
            Ok(result) => result.map_err(ClientError::from),
            Err(_elapsed) => {
                // Remove the entry so a late response degrades to a push.
                self.shared.pending.fail(&corr, RequestError::Timeout);
                Err(ClientError::Request(RequestError::Timeout))
            }
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state())
            .field("appliances", &self.shared.registry.len())
            .field("pending", &self.shared.pending.len())
            .finish()
    }
}

/// The single ingestion path: one inbound message at a time, in arrival
/// order. This serialization is the precondition that lets the state
/// cache run without internal write arbitration.
async fn ingest_loop(
    shared: Arc<Shared>,
    transport: SharedTransport,
    mut incoming: mpsc::Receiver<TransportEvent>,
) {
    tracing::debug!("ingestion loop started");
    while let Some(event) = incoming.recv().await {
        shared.pending.expire(Instant::now());
        match event {
            TransportEvent::Inbound(envelope) => {
                handle_envelope(&shared, &transport, envelope).await;
            }
            TransportEvent::Availability { appliance, online } => {
                let (appliance, created) = shared.registry.get_or_insert(&appliance);
                if created {
                    shared.bus.publish(Event::ApplianceAdded {
                        appliance: Arc::clone(&appliance),
                    });
                    if shared.config.refresh_on_add {
                        request_refresh(&shared, &transport, appliance.id()).await;
                    }
                }
                if appliance.set_available(online) {
                    tracing::debug!(id = %appliance.id(), online, "availability changed");
                }
            }
            TransportEvent::Closed { reason } => {
                tracing::warn!(reason, "transport closed");
                break;
            }
        }
    }

    *shared.state.write() = ConnectionState::Disconnected;
    shared
        .pending
        .fail_all(&RequestError::Transport(TransportError::NotConnected));
    shared.registry.mark_all_unavailable();
    shared.bus.publish(Event::Disconnected);
    tracing::debug!("ingestion loop stopped");
}

async fn handle_envelope(shared: &Shared, transport: &SharedTransport, envelope: Envelope) {
    let (appliance, created) = shared.registry.get_or_insert(&envelope.appliance);
    if created {
        shared.bus.publish(Event::ApplianceAdded {
            appliance: Arc::clone(&appliance),
        });
        if shared.config.refresh_on_add {
            request_refresh(shared, transport, appliance.id()).await;
        }
    }

    // Entries that fail to decode are dropped here so the cache keeps
    // the previous value; the rest of the batch still applies.
    let mut updates: HashMap<ErdCode, String> = HashMap::with_capacity(envelope.payload.len());
    for (code, raw) in &envelope.payload {
        match shared.codec.decode(*code, raw) {
            Ok(_) => {
                updates.insert(*code, raw.clone());
            }
            Err(err) => {
                tracing::warn!(id = %appliance.id(), %code, raw, %err, "dropping undecodable value");
            }
        }
    }

    let outcome = appliance.update_many(&shared.codec, &updates);

    if let Some(appliance_type) = outcome.classified {
        shared.bus.publish(Event::ApplianceClassified {
            appliance: Arc::clone(&appliance),
            appliance_type,
        });
    }
    shared.bus.publish(Event::ApplianceUpdated {
        appliance: Arc::clone(&appliance),
        changed: outcome.changed.clone(),
    });
    if !outcome.changed.is_empty() {
        shared.bus.publish(Event::ApplianceStateChanged {
            appliance: Arc::clone(&appliance),
            changed: outcome.changed.clone(),
        });
    }

    if let Some(corr) = &envelope.id {
        let completion = Completion {
            payload: envelope.payload.clone(),
            changed: outcome.changed,
        };
        if !shared.pending.resolve(corr, completion) {
            tracing::debug!(corr, "response without pending request treated as push");
        }
    }
}

/// Fire-and-forget cache refresh for a newly sighted appliance. The
/// response flows back through the ordinary push path.
async fn request_refresh(shared: &Shared, transport: &SharedTransport, id: &ApplianceId) {
    let corr = shared.pending.allocate_id();
    let envelope = Envelope::get_cache(id.clone(), corr);
    if let Err(err) = transport.lock().await.send(envelope).await {
        tracing::warn!(%id, %err, "cache refresh request failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_client_is_idle() {
        let client = Client::new(ClientConfig::default()).unwrap();
        assert_eq!(client.state(), ConnectionState::Idle);
        assert!(client.appliances().is_empty());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = ClientConfig::new().with_request_timeout(std::time::Duration::ZERO);
        assert!(matches!(
            Client::new(config),
            Err(ClientError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn operations_require_a_connection() {
        let client = Client::new(ClientConfig::default()).unwrap();
        let id = ApplianceId::new("AA");

        assert!(matches!(
            client.request_property_update(&id, None).await,
            Err(ClientError::NotConnected)
        ));
        assert!(matches!(
            client
                .set_property_value(&id, ErdCode::SABBATH_MODE, &ErdValue::Bool(Some(true)))
                .await,
            Err(ClientError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn explicit_registration_emits_added_once() {
        let client = Client::new(ClientConfig::default()).unwrap();
        let mut events = client.subscribe(EventFilter::all());
        let id = ApplianceId::new("AA");

        let first = client.add_appliance(&id).await;
        let second = client.add_appliance(&id).await;
        assert!(Arc::ptr_eq(&first, &second));

        assert!(matches!(
            events.try_recv(),
            Some(Event::ApplianceAdded { .. })
        ));
        assert!(events.try_recv().is_none());
    }
}
