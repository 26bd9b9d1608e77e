//! Chat-protocol transport adapter.
//!
//! The chat transport wraps each pseudo-HTTP message in an XML stanza:
//! a `<message>` whose body holds `<request>`/`<response>` elements with
//! `<id>`, `<method>`, `<uri>` and `<json>` children. Appliances are
//! addressed as `{appliance}_{user}@{domain}` peers, and their presence
//! stanzas double as availability signals.

use async_trait::async_trait;
use quick_xml::events::Event as XmlEvent;
use quick_xml::Reader;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use galley_state::ApplianceId;

use crate::envelope::{Envelope, Method};
use crate::error::{EnvelopeError, TransportError};
use crate::transport::{Credentials, Transport, TransportEvent};
use crate::wire::{Dial, Frame};

const INCOMING_BUFFER: usize = 256;

struct ChatSession {
    wire_tx: mpsc::Sender<Frame>,
    self_jid: String,
    user_id: String,
    domain: String,
    reader: JoinHandle<()>,
}

/// Transport adapter for the chat-style messaging protocol.
pub struct ChatTransport<D> {
    dial: D,
    session: Option<ChatSession>,
    incoming: Option<mpsc::Receiver<TransportEvent>>,
}

impl<D: Dial> ChatTransport<D> {
    pub fn new(dial: D) -> Self {
        Self {
            dial,
            session: None,
            incoming: None,
        }
    }

    fn appliance_jid(&self, session: &ChatSession, appliance: &ApplianceId) -> String {
        format!(
            "{}_{}@{}",
            appliance.as_str().to_ascii_lowercase(),
            session.user_id,
            session.domain
        )
    }

    fn format_stanza(&self, session: &ChatSession, envelope: &Envelope) -> String {
        let to = self.appliance_jid(session, &envelope.appliance);
        let id = envelope.id.clone().unwrap_or_else(|| "0".to_string());
        let json = if envelope.payload.is_empty() {
            String::new()
        } else {
            format!("<json>{}</json>", envelope.payload_json())
        };
        format!(
            "<message type=\"chat\" from=\"{}\" to=\"{}\" id=\"{}\">\
             <body><request><id>{}</id><method>{}</method><uri>{}</uri>{}</request></body>\
             </message>",
            session.self_jid,
            to,
            id,
            id,
            envelope.method,
            envelope.uri(),
            json,
        )
    }
}

#[async_trait]
impl<D: Dial> Transport for ChatTransport<D> {
    async fn connect(&mut self, credentials: &Credentials) -> Result<(), TransportError> {
        let wire = self.dial.dial(credentials).await?;
        let (wire_tx, mut wire_rx) = wire.split();

        let user_id = credentials.user_id.clone();
        let domain = credentials.endpoint.clone();
        let self_jid = format!("{user_id}@{domain}");

        // Announce ourselves so appliances start pushing.
        wire_tx
            .send(format!("<presence from=\"{self_jid}\"/>"))
            .await
            .map_err(|_| TransportError::Connect("wire closed during handshake".to_string()))?;

        let (event_tx, event_rx) = mpsc::channel(INCOMING_BUFFER);
        let own_jid = self_jid.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = wire_rx.recv().await {
                match parse_stanza(&frame, &own_jid) {
                    Ok(Some(event)) => {
                        if event_tx.send(event).await.is_err() {
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(err) => {
                        tracing::info!(%err, "ignoring non-protocol stanza");
                    }
                }
            }
            let _ = event_tx
                .send(TransportEvent::Closed {
                    reason: "chat connection closed".to_string(),
                })
                .await;
        });

        self.session = Some(ChatSession {
            wire_tx,
            self_jid,
            user_id,
            domain,
            reader,
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
        let stanza = self.format_stanza(session, &envelope);
        tracing::trace!(uri = %envelope.uri(), "sending chat stanza");
        session
            .wire_tx
            .send(stanza)
            .await
            .map_err(|_| TransportError::Send("wire closed".to_string()))
    }

    async fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            session.reader.abort();
        }
        self.incoming = None;
    }
}

/// The local part of a peer JID names the appliance:
/// `{appliance}_{user}@{domain}`.
fn jid_appliance(jid: &str) -> Option<ApplianceId> {
    let local = jid.split('@').next()?;
    let appliance = local.split('_').next()?;
    if appliance.is_empty() {
        None
    } else {
        Some(ApplianceId::new(appliance))
    }
}

/// Decode one stanza into a transport event. Stanzas that are not part
/// of the appliance protocol yield `Ok(None)`.
fn parse_stanza(xml: &str, own_jid: &str) -> Result<Option<TransportEvent>, EnvelopeError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut root: Option<Vec<u8>> = None;
    let mut from: Option<String> = None;
    let mut presence_type: Option<String> = None;

    let mut corr_id: Option<String> = None;
    let mut method: Option<String> = None;
    let mut uri: Option<String> = None;
    let mut json: Option<String> = None;
    let mut current: Option<&'static str> = None;

    loop {
        match reader.read_event() {
            Ok(XmlEvent::Start(e)) | Ok(XmlEvent::Empty(e)) => {
                let name = e.name().as_ref().to_vec();
                if root.is_none() {
                    for attr in e.attributes().flatten() {
                        let value = attr
                            .unescape_value()
                            .map_err(|err| EnvelopeError::Payload(err.to_string()))?
                            .into_owned();
                        match attr.key.as_ref() {
                            b"from" => from = Some(value),
                            b"type" => presence_type = Some(value),
                            _ => {}
                        }
                    }
                    root = Some(name);
                } else {
                    current = match name.as_slice() {
                        b"id" => Some("id"),
                        b"method" => Some("method"),
                        b"uri" => Some("uri"),
                        b"json" => Some("json"),
                        _ => None,
                    };
                }
            }
            Ok(XmlEvent::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|err| EnvelopeError::Payload(err.to_string()))?
                    .into_owned();
                match current {
                    Some("id") => corr_id = Some(text),
                    Some("method") => method = Some(text),
                    Some("uri") => uri = Some(text),
                    Some("json") => json = Some(text),
                    _ => {}
                }
            }
            Ok(XmlEvent::End(_)) => current = None,
            Ok(XmlEvent::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(EnvelopeError::Payload(err.to_string())),
        }
    }

    match root.as_deref() {
        Some(b"presence") => {
            let from = from.ok_or_else(|| EnvelopeError::Payload("presence without from".into()))?;
            if from.split('/').next() == Some(own_jid) {
                return Ok(None);
            }
            let appliance = match jid_appliance(&from) {
                Some(id) => id,
                None => return Ok(None),
            };
            let online = presence_type.as_deref() != Some("unavailable");
            Ok(Some(TransportEvent::Availability { appliance, online }))
        }
        Some(b"message") => {
            let uri = match uri {
                Some(uri) => uri,
                // A message without a protocol body is not ours.
                None => return Ok(None),
            };
            let method: Method = method
                .ok_or_else(|| EnvelopeError::Payload("message without method".into()))?
                .parse()?;
            let (appliance, resource) = Envelope::parse_uri(&uri)?;
            let payload = match json {
                Some(json) => Envelope::parse_payload(&json)?,
                None => Default::default(),
            };
            let id = if method.expects_reply() { corr_id } else { None };
            Ok(Some(TransportEvent::Inbound(Envelope {
                method,
                appliance,
                resource,
                id,
                payload,
            })))
        }
        _ => Ok(None),
    }
}
