//! The transport-agnostic pseudo-HTTP message envelope.
//!
//! Both transports carry the same logical message: a method, a target
//! path naming an appliance and a resource, an optional correlation
//! token, and a mapping of property codes to raw hex values. Each
//! adapter maps its native frame shape onto this envelope losslessly.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use galley_erd::ErdCode;
use galley_state::ApplianceId;

use crate::error::EnvelopeError;

/// Request method. `GET`/`POST` expect a correlated reply; `PUBLISH` is
/// always an unsolicited push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Publish,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Publish => "PUBLISH",
        }
    }

    /// Whether this method expects a correlated reply.
    pub fn expects_reply(self) -> bool {
        !matches!(self, Method::Publish)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("get") {
            Ok(Method::Get)
        } else if s.eq_ignore_ascii_case("post") {
            Ok(Method::Post)
        } else if s.eq_ignore_ascii_case("publish") {
            Ok(Method::Publish)
        } else {
            Err(EnvelopeError::Method(s.to_string()))
        }
    }
}

/// The addressed resource: one property, or the whole property table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Cache,
    Erd(ErdCode),
}

/// One decoded protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub method: Method,
    pub appliance: ApplianceId,
    pub resource: Resource,
    /// Correlation token, echoed verbatim on the matching response.
    /// Absent on `PUBLISH`.
    pub id: Option<String>,
    /// Property payload; may hold zero, one, or many entries. A cache
    /// response carries the full known property table.
    pub payload: BTreeMap<ErdCode, String>,
}

impl Envelope {
    /// A full-cache refresh request.
    pub fn get_cache(appliance: ApplianceId, id: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            appliance,
            resource: Resource::Cache,
            id: Some(id.into()),
            payload: BTreeMap::new(),
        }
    }

    /// A single-property read request.
    pub fn get_erd(appliance: ApplianceId, code: ErdCode, id: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            appliance,
            resource: Resource::Erd(code),
            id: Some(id.into()),
            payload: BTreeMap::new(),
        }
    }

    /// A property write request carrying the encoded value.
    pub fn post(
        appliance: ApplianceId,
        code: ErdCode,
        raw: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        let mut payload = BTreeMap::new();
        payload.insert(code, raw.into());
        Self {
            method: Method::Post,
            appliance,
            resource: Resource::Erd(code),
            id: Some(id.into()),
            payload,
        }
    }

    /// An unsolicited push.
    pub fn publish(
        appliance: ApplianceId,
        resource: Resource,
        payload: BTreeMap<ErdCode, String>,
    ) -> Self {
        Self {
            method: Method::Publish,
            appliance,
            resource,
            id: None,
            payload,
        }
    }

    /// Render the target path: `/{id}/cache` or `/{id}/erd/{code}`.
    pub fn uri(&self) -> String {
        match self.resource {
            Resource::Cache => format!("/{}/cache", self.appliance),
            Resource::Erd(code) => format!("/{}/erd/{}", self.appliance, code.to_wire()),
        }
    }

    /// Parse a target path into its appliance and resource.
    pub fn parse_uri(uri: &str) -> Result<(ApplianceId, Resource), EnvelopeError> {
        let err = || EnvelopeError::Uri(uri.to_string());
        let mut parts = uri.strip_prefix('/').ok_or_else(err)?.split('/');

        let appliance = parts.next().filter(|s| !s.is_empty()).ok_or_else(err)?;
        let appliance = ApplianceId::new(appliance);

        match (parts.next(), parts.next(), parts.next()) {
            (Some("cache"), None, _) => Ok((appliance, Resource::Cache)),
            (Some("erd"), Some(code), None) => {
                let code = code.parse::<ErdCode>().map_err(|_| err())?;
                Ok((appliance, Resource::Erd(code)))
            }
            _ => Err(err()),
        }
    }

    /// Serialize the payload as the wire's JSON object: property code hex
    /// keys (lowercase, no `0x` prefix) to raw value hex strings.
    pub fn payload_json(&self) -> String {
        let map: BTreeMap<String, &String> = self
            .payload
            .iter()
            .map(|(code, raw)| (code.to_wire(), raw))
            .collect();
        serde_json::to_string(&map).unwrap_or_else(|_| "{}".to_string())
    }

    /// Parse a wire JSON payload object. Keys are accepted with or
    /// without the `0x` prefix; keys that do not parse as a property
    /// code are skipped with a log line rather than failing the message.
    pub fn parse_payload(json: &str) -> Result<BTreeMap<ErdCode, String>, EnvelopeError> {
        let map: BTreeMap<String, String> =
            serde_json::from_str(json).map_err(|e| EnvelopeError::Payload(e.to_string()))?;
        let mut payload = BTreeMap::new();
        for (key, value) in map {
            match key.parse::<ErdCode>() {
                Ok(code) => {
                    payload.insert(code, value);
                }
                Err(_) => {
                    tracing::warn!(key, "skipping unparseable property code in payload");
                }
            }
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn uri_round_trips() {
        let envelope = Envelope::get_cache(ApplianceId::new("D828C9FBA1B2"), "7");
        assert_eq!(envelope.uri(), "/D828C9FBA1B2/cache");
        let (appliance, resource) = Envelope::parse_uri(&envelope.uri()).unwrap();
        assert_eq!(appliance, ApplianceId::new("D828C9FBA1B2"));
        assert_eq!(resource, Resource::Cache);

        let envelope = Envelope::get_erd(
            ApplianceId::new("D828C9FBA1B2"),
            ErdCode::UPPER_OVEN_KITCHEN_TIMER,
            "8",
        );
        assert_eq!(envelope.uri(), "/D828C9FBA1B2/erd/5205");
        let (_, resource) = Envelope::parse_uri(&envelope.uri()).unwrap();
        assert_eq!(resource, Resource::Erd(ErdCode(0x5205)));
    }

    #[test]
    fn parse_uri_accepts_prefixed_codes() {
        let (_, resource) = Envelope::parse_uri("/aabb/erd/0x5205").unwrap();
        assert_eq!(resource, Resource::Erd(ErdCode(0x5205)));
    }

    #[rstest]
    #[case("")]
    #[case("/")]
    #[case("noslash")]
    #[case("/aabb")]
    #[case("/aabb/wat")]
    #[case("/aabb/erd")]
    #[case("/aabb/erd/zzzz")]
    #[case("/aabb/erd/5205/extra")]
    fn parse_uri_rejects_malformed_paths(#[case] uri: &str) {
        assert!(Envelope::parse_uri(uri).is_err());
    }

    #[test]
    fn payload_json_uses_bare_lowercase_keys() {
        let envelope = Envelope::post(
            ApplianceId::new("AA"),
            ErdCode::UPPER_OVEN_KITCHEN_TIMER,
            "002d",
            "3",
        );
        assert_eq!(envelope.payload_json(), r#"{"5205":"002d"}"#);
    }

    #[test]
    fn parse_payload_accepts_prefixed_keys() {
        let payload = Envelope::parse_payload(r#"{"0x5205":"002d"}"#).unwrap();
        assert_eq!(payload.get(&ErdCode(0x5205)).map(String::as_str), Some("002d"));
    }

    #[test]
    fn parse_payload_skips_bad_keys_without_failing() {
        let payload = Envelope::parse_payload(r#"{"not-a-code":"00","5205":"002d"}"#).unwrap();
        assert_eq!(payload.len(), 1);
        assert!(payload.contains_key(&ErdCode(0x5205)));
    }

    #[test]
    fn methods_parse_case_insensitively() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("POST".parse::<Method>().unwrap(), Method::Post);
        assert_eq!("Publish".parse::<Method>().unwrap(), Method::Publish);
        assert!("PATCH".parse::<Method>().is_err());
    }

    #[test]
    fn publish_carries_no_id() {
        let envelope = Envelope::publish(
            ApplianceId::new("AA"),
            Resource::Erd(ErdCode(0x5205)),
            BTreeMap::new(),
        );
        assert!(envelope.id.is_none());
        assert!(!envelope.method.expects_reply());
    }
}
