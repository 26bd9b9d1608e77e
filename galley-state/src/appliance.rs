//! One appliance and its property cache.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;

use galley_erd::{ApplianceType, Codec, DecodeError, ErdCode, ErdValue};

/// Stable identifier for one appliance: the device's network-derived
/// address, normalized to uppercase the way the vendor's traffic spells
/// it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ApplianceId(String);

impl ApplianceId {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApplianceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ApplianceId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Result of applying a batch of raw property updates.
#[derive(Debug, Clone, Default)]
pub struct UpdateOutcome {
    /// The subset of entries whose raw value actually changed.
    pub changed: HashMap<ErdCode, String>,
    /// Set when this batch classified a previously unclassified appliance.
    pub classified: Option<ApplianceType>,
}

#[derive(Debug, Default)]
struct ApplianceInner {
    appliance_type: Option<ApplianceType>,
    available: bool,
    properties: HashMap<ErdCode, String>,
}

/// One appliance: identifier, classification, availability, and the
/// last-known raw value of every property.
///
/// All mutation goes through [`update_one`](Appliance::update_one) /
/// [`update_many`](Appliance::update_many) and the availability setters.
/// The ingestion path is the only writer (one connection is processed
/// one message at a time, in arrival order); the lock exists so reads
/// from application threads see a consistent view, not to arbitrate
/// concurrent writers.
pub struct Appliance {
    id: ApplianceId,
    inner: RwLock<ApplianceInner>,
}

impl Appliance {
    pub fn new(id: ApplianceId) -> Self {
        Self {
            id,
            inner: RwLock::new(ApplianceInner::default()),
        }
    }

    pub fn id(&self) -> &ApplianceId {
        &self.id
    }

    pub fn is_available(&self) -> bool {
        self.inner.read().available
    }

    /// Set availability; returns whether the flag changed.
    pub fn set_available(&self, available: bool) -> bool {
        let mut inner = self.inner.write();
        let changed = inner.available != available;
        inner.available = available;
        changed
    }

    /// The classified appliance type, if the type property has been seen.
    ///
    /// Until this returns `Some`, type-specific typed accessors cannot be
    /// trusted; the appliance is "unclassified".
    pub fn appliance_type(&self) -> Option<ApplianceType> {
        self.inner.read().appliance_type
    }

    pub fn is_classified(&self) -> bool {
        self.inner.read().appliance_type.is_some()
    }

    /// Last-known raw hex value for a property.
    pub fn get_raw(&self, code: ErdCode) -> Option<String> {
        self.inner.read().properties.get(&code).cloned()
    }

    /// Decoded value for a property, if present.
    pub fn get_value(&self, codec: &Codec, code: ErdCode) -> Option<Result<ErdValue, DecodeError>> {
        let raw = self.get_raw(code)?;
        Some(codec.decode(code, &raw))
    }

    /// Snapshot of the whole property table.
    pub fn properties(&self) -> HashMap<ErdCode, String> {
        self.inner.read().properties.clone()
    }

    pub fn property_count(&self) -> usize {
        self.inner.read().properties.len()
    }

    /// Store a raw value; returns `true` iff it differs from the stored
    /// one.
    ///
    /// Change detection compares raw hex strings, not decoded values.
    /// Two spellings of the same decoded value (case, padding) therefore
    /// count as a change. This mirrors the wire protocol's own behavior
    /// and is kept deliberately.
    pub fn update_one(&self, code: ErdCode, raw: &str) -> bool {
        let mut guard = self.inner.write();
        Self::apply_one(&mut guard, code, raw)
    }

    /// Apply a batch of raw updates, returning the changed subset and
    /// any classification transition. An empty changed set is a normal
    /// no-op update.
    pub fn update_many(
        &self,
        codec: &Codec,
        updates: &HashMap<ErdCode, String>,
    ) -> UpdateOutcome {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let mut outcome = UpdateOutcome::default();

        for (&code, raw) in updates {
            if Self::apply_one(inner, code, raw) {
                outcome.changed.insert(code, raw.clone());
            }
        }

        if inner.appliance_type.is_none() && updates.contains_key(&ErdCode::APPLIANCE_TYPE) {
            if let Some(raw) = inner.properties.get(&ErdCode::APPLIANCE_TYPE) {
                match codec.decode(ErdCode::APPLIANCE_TYPE, raw) {
                    Ok(ErdValue::ApplianceType(appliance_type)) => {
                        tracing::debug!(id = %self.id, ?appliance_type, "appliance classified");
                        inner.appliance_type = Some(appliance_type);
                        outcome.classified = Some(appliance_type);
                    }
                    Ok(other) => {
                        tracing::warn!(id = %self.id, value = %other, "appliance type decoded to unexpected value");
                    }
                    Err(err) => {
                        tracing::warn!(id = %self.id, %err, "could not decode appliance type");
                    }
                }
            }
        }

        outcome
    }

    fn apply_one(inner: &mut ApplianceInner, code: ErdCode, raw: &str) -> bool {
        let changed = inner
            .properties
            .get(&code)
            .map_or(true, |current| current != raw);
        if changed {
            inner.properties.insert(code, raw.to_string());
        }
        changed
    }
}

impl fmt::Debug for Appliance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Appliance")
            .field("id", &self.id)
            .field("appliance_type", &inner.appliance_type)
            .field("available", &inner.available)
            .field("property_count", &inner.properties.len())
            .finish()
    }
}
