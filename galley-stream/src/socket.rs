//! Subscription-socket transport adapter.
//!
//! The socket transport speaks JSON frames. After dialing, the adapter
//! issues the subscribe operation and the appliance-list request before
//! reporting connected, so pushes are guaranteed from the moment the
//! client sees `Connected`. Pushes arrive as `publish#erd` frames; API
//! responses echo the request's correlation id.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use galley_erd::ErdCode;
use galley_state::ApplianceId;

use crate::envelope::{Envelope, Method, Resource};
use crate::error::{EnvelopeError, TransportError};
use crate::transport::{Credentials, Transport, TransportEvent};
use crate::wire::{Dial, Frame};

const INCOMING_BUFFER: usize = 256;
const KIND_API: &str = "websocket#api";
const KIND_PUBLISH_ERD: &str = "publish#erd";
const KIND_SUBSCRIBE: &str = "websocket#subscribe";
const KIND_PING: &str = "websocket#ping";
const LIST_APPLIANCES_ID: &str = "List-appliances";

#[derive(Serialize)]
struct SubscribeFrame<'a> {
    kind: &'a str,
    action: &'a str,
    resources: Vec<String>,
}

#[derive(Serialize)]
struct ApiFrame<'a> {
    kind: &'a str,
    action: &'a str,
    host: &'a str,
    method: &'a str,
    path: String,
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<Value>,
}

#[derive(Serialize)]
struct PingFrame<'a> {
    kind: &'a str,
    id: &'a str,
    action: &'a str,
}

struct SocketSession {
    wire_tx: mpsc::Sender<Frame>,
    endpoint: String,
    user_id: String,
    reader: JoinHandle<()>,
    keepalive_task: Option<JoinHandle<()>>,
}

/// Transport adapter for the subscription-capable socket protocol.
pub struct SocketTransport<D> {
    dial: D,
    keepalive: Option<Duration>,
    session: Option<SocketSession>,
    incoming: Option<mpsc::Receiver<TransportEvent>>,
}

impl<D: Dial> SocketTransport<D> {
    pub fn new(dial: D) -> Self {
        Self {
            dial,
            keepalive: None,
            session: None,
            incoming: None,
        }
    }

    /// Send a keepalive ping frame at this interval while connected.
    pub fn with_keepalive(mut self, interval: Duration) -> Self {
        self.keepalive = Some(interval);
        self
    }

    fn format_frame(&self, session: &SocketSession, envelope: &Envelope) -> Result<Frame, TransportError> {
        let appliance = envelope.appliance.as_str().to_ascii_lowercase();
        let id = envelope
            .id
            .clone()
            .unwrap_or_else(|| format!("{appliance}-unsolicited"));
        let frame = match (envelope.method, envelope.resource) {
            (Method::Get, Resource::Cache) => ApiFrame {
                kind: KIND_API,
                action: "api",
                host: &session.endpoint,
                method: "GET",
                path: format!("/v1/appliance/{appliance}/erd"),
                id,
                body: None,
            },
            (Method::Get, Resource::Erd(code)) => ApiFrame {
                kind: KIND_API,
                action: "api",
                host: &session.endpoint,
                method: "GET",
                path: format!("/v1/appliance/{appliance}/erd/{}", code.to_wire()),
                id,
                body: None,
            },
            (Method::Post, Resource::Erd(code)) => {
                let value = envelope
                    .payload
                    .get(&code)
                    .cloned()
                    .unwrap_or_default();
                ApiFrame {
                    kind: KIND_API,
                    action: "api",
                    host: &session.endpoint,
                    method: "POST",
                    path: format!("/v1/appliance/{appliance}/erd/{}", code.to_wire()),
                    id,
                    body: Some(serde_json::json!({
                        "kind": "appliance#erdListEntry",
                        "userId": session.user_id,
                        "applianceId": appliance,
                        "erd": code.to_wire(),
                        "value": value,
                        "ackTimeout": 10,
                        "delay": 0,
                    })),
                }
            }
            _ => {
                return Err(TransportError::Send(format!(
                    "{} {} has no socket frame shape",
                    envelope.method,
                    envelope.uri()
                )))
            }
        };
        serde_json::to_string(&frame).map_err(|e| TransportError::Send(e.to_string()))
    }
}

#[async_trait]
impl<D: Dial> Transport for SocketTransport<D> {
    async fn connect(&mut self, credentials: &Credentials) -> Result<(), TransportError> {
        let wire = self.dial.dial(credentials).await?;
        let (wire_tx, mut wire_rx) = wire.split();
        let handshake_err =
            |_| TransportError::Connect("wire closed during handshake".to_string());

        // Subscribe before anything else so no push can be missed once
        // the engine is told it is connected.
        let subscribe = SubscribeFrame {
            kind: KIND_SUBSCRIBE,
            action: "subscribe",
            resources: vec!["/appliance/*/erd/*".to_string()],
        };
        wire_tx
            .send(serde_json::to_string(&subscribe).expect("static frame serializes"))
            .await
            .map_err(handshake_err)?;

        // Bootstrap the registry from the account's appliance list.
        let list = ApiFrame {
            kind: KIND_API,
            action: "api",
            host: &credentials.endpoint,
            method: "GET",
            path: "/v1/appliance".to_string(),
            id: LIST_APPLIANCES_ID.to_string(),
            body: None,
        };
        wire_tx
            .send(serde_json::to_string(&list).expect("static frame serializes"))
            .await
            .map_err(handshake_err)?;

        let (event_tx, event_rx) = mpsc::channel(INCOMING_BUFFER);
        let reader = tokio::spawn(async move {
            while let Some(frame) = wire_rx.recv().await {
                match parse_frame(&frame) {
                    Ok(events) => {
                        for event in events {
                            if event_tx.send(event).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(err) => {
                        tracing::info!(%err, "ignoring undecodable socket frame");
                    }
                }
            }
            let _ = event_tx
                .send(TransportEvent::Closed {
                    reason: "socket connection closed".to_string(),
                })
                .await;
        });

        let keepalive_task = self.keepalive.map(|interval| {
            let wire_tx = wire_tx.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    tracing::debug!("sending keepalive ping");
                    let ping = PingFrame {
                        kind: KIND_PING,
                        id: "keepalive-ping",
                        action: "ping",
                    };
                    let frame = serde_json::to_string(&ping).expect("static frame serializes");
                    if wire_tx.send(frame).await.is_err() {
                        return;
                    }
                }
            })
        });

        self.session = Some(SocketSession {
            wire_tx,
            endpoint: credentials.endpoint.clone(),
            user_id: credentials.user_id.clone(),
            reader,
            keepalive_task,
        });
        self.incoming = Some(event_rx);
        Ok(())
    }

    fn incoming(&mut self) -> mpsc::Receiver<TransportEvent> {
        self.incoming
            .take()
            .expect("incoming() can only be called once per connection")
    }

    async fn send(&mut self, envelope: Envelope) -> Result<(), TransportError> {
        let session = self.session.as_ref().ok_or(TransportError::NotConnected)?;
        let frame = self.format_frame(session, &envelope)?;
        tracing::trace!(uri = %envelope.uri(), "sending socket frame");
        session
            .wire_tx
            .send(frame)
            .await
            .map_err(|_| TransportError::Send("wire closed".to_string()))
    }

    async fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            session.reader.abort();
            if let Some(task) = session.keepalive_task {
                task.abort();
            }
        }
        self.incoming = None;
    }
}

fn str_field<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value.get(field).and_then(Value::as_str)
}

/// Decode one socket frame into transport events. Unknown frame kinds
/// decode to nothing; the device population is open-ended and novel
/// frames must not wedge the reader.
fn parse_frame(frame: &str) -> Result<Vec<TransportEvent>, EnvelopeError> {
    let value: Value =
        serde_json::from_str(frame).map_err(|e| EnvelopeError::Payload(e.to_string()))?;

    match str_field(&value, "kind") {
        Some(KIND_PUBLISH_ERD) => {
            let item = value
                .get("item")
                .ok_or_else(|| EnvelopeError::Payload("publish#erd without item".into()))?;
            let appliance = str_field(item, "applianceId")
                .map(ApplianceId::new)
                .ok_or_else(|| EnvelopeError::Payload("publish#erd without applianceId".into()))?;
            let code: ErdCode = str_field(item, "erd")
                .ok_or_else(|| EnvelopeError::Payload("publish#erd without erd".into()))?
                .parse()
                .map_err(|_| EnvelopeError::Payload("unparseable erd code".into()))?;
            let raw = str_field(item, "value").unwrap_or_default().to_string();

            let mut payload = BTreeMap::new();
            payload.insert(code, raw);
            Ok(vec![TransportEvent::Inbound(Envelope::publish(
                appliance,
                Resource::Erd(code),
                payload,
            ))])
        }
        Some(KIND_API) => parse_api_frame(&value),
        Some(other) => {
            tracing::debug!(kind = other, "ignoring socket frame kind");
            Ok(Vec::new())
        }
        None => Ok(Vec::new()),
    }
}

fn parse_api_frame(value: &Value) -> Result<Vec<TransportEvent>, EnvelopeError> {
    let id = str_field(value, "id").unwrap_or_default().to_string();
    let code_ok = value.get("code").and_then(Value::as_u64) == Some(200);
    let body = match value.get("body") {
        Some(body) => body,
        None => return Ok(Vec::new()),
    };

    match str_field(body, "kind") {
        Some("appliance#applianceList") => {
            let mut events = Vec::new();
            for item in body.get("items").and_then(Value::as_array).into_iter().flatten() {
                let Some(appliance) = str_field(item, "applianceId").map(ApplianceId::new) else {
                    continue;
                };
                let online = str_field(item, "online")
                    .map(|s| s.eq_ignore_ascii_case("online"))
                    .or_else(|| item.get("online").and_then(Value::as_bool))
                    .unwrap_or(false);
                events.push(TransportEvent::Availability { appliance, online });
            }
            Ok(events)
        }
        Some("appliance#erdList") if code_ok => {
            let appliance = str_field(body, "applianceId")
                .map(ApplianceId::new)
                .ok_or_else(|| EnvelopeError::Payload("erdList without applianceId".into()))?;
            let mut payload = BTreeMap::new();
            for item in body.get("items").and_then(Value::as_array).into_iter().flatten() {
                let Some(code) = str_field(item, "erd") else { continue };
                match code.parse::<ErdCode>() {
                    Ok(code) => {
                        payload.insert(
                            code,
                            str_field(item, "value").unwrap_or_default().to_string(),
                        );
                    }
                    Err(_) => {
                        tracing::warn!(code, "skipping unparseable erd code in erdList");
                    }
                }
            }
            Ok(vec![TransportEvent::Inbound(Envelope {
                method: Method::Get,
                appliance,
                resource: Resource::Cache,
                id: Some(id),
                payload,
            })])
        }
        Some("appliance#erdListEntry") if code_ok => {
            let appliance = str_field(body, "applianceId")
                .map(ApplianceId::new)
                .ok_or_else(|| EnvelopeError::Payload("erdListEntry without applianceId".into()))?;
            let code: ErdCode = str_field(body, "erd")
                .ok_or_else(|| EnvelopeError::Payload("erdListEntry without erd".into()))?
                .parse()
                .map_err(|_| EnvelopeError::Payload("unparseable erd code".into()))?;
            let mut payload = BTreeMap::new();
            payload.insert(code, str_field(body, "value").unwrap_or_default().to_string());
            Ok(vec![TransportEvent::Inbound(Envelope {
                method: Method::Post,
                appliance,
                resource: Resource::Erd(code),
                id: Some(id),
                payload,
            })])
        }
        _ => {
            if !code_ok {
                tracing::warn!(id, "socket api response without success code");
            }
            Ok(Vec::new())
        }
    }
}
