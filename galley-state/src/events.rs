//! Typed event distribution.
//!
//! The engine reports its lifecycle through one event sum type. Each
//! subscriber gets its own queue; publishing never waits on a consumer,
//! so a slow handler delays only itself and can never stall the ingestion
//! loop. Events of the same kind for the same appliance arrive in the
//! order they were generated.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use galley_erd::{ApplianceType, ErdCode};

use crate::appliance::Appliance;

/// Engine lifecycle and state-change notifications.
#[derive(Debug, Clone)]
pub enum Event {
    /// A message referenced an identifier not seen before. Fires before
    /// any update request goes out for the new appliance.
    ApplianceAdded { appliance: Arc<Appliance> },

    /// The appliance-type property was observed for the first time.
    ApplianceClassified {
        appliance: Arc<Appliance>,
        appliance_type: ApplianceType,
    },

    /// An inbound update was processed, whether or not anything changed.
    ApplianceUpdated {
        appliance: Arc<Appliance>,
        changed: HashMap<ErdCode, String>,
    },

    /// An inbound update changed at least one property.
    ApplianceStateChanged {
        appliance: Arc<Appliance>,
        changed: HashMap<ErdCode, String>,
    },

    /// Transport connected and subscriptions established.
    Connected,

    /// Transport connection lost or closed.
    Disconnected,
}

/// Discriminant of [`Event`], used for subscription filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ApplianceAdded,
    ApplianceClassified,
    ApplianceUpdated,
    ApplianceStateChanged,
    Connected,
    Disconnected,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ApplianceAdded { .. } => EventKind::ApplianceAdded,
            Event::ApplianceClassified { .. } => EventKind::ApplianceClassified,
            Event::ApplianceUpdated { .. } => EventKind::ApplianceUpdated,
            Event::ApplianceStateChanged { .. } => EventKind::ApplianceStateChanged,
            Event::Connected => EventKind::Connected,
            Event::Disconnected => EventKind::Disconnected,
        }
    }
}

/// Which event kinds a subscriber wants.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    kinds: Option<Vec<EventKind>>,
}

impl EventFilter {
    /// Every event kind.
    pub fn all() -> Self {
        Self { kinds: None }
    }

    /// A single event kind.
    pub fn only(kind: EventKind) -> Self {
        Self {
            kinds: Some(vec![kind]),
        }
    }

    /// An explicit set of kinds.
    pub fn kinds(kinds: impl IntoIterator<Item = EventKind>) -> Self {
        Self {
            kinds: Some(kinds.into_iter().collect()),
        }
    }

    fn matches(&self, event: &Event) -> bool {
        match &self.kinds {
            None => true,
            Some(kinds) => kinds.contains(&event.kind()),
        }
    }
}

struct Subscriber {
    filter: EventFilter,
    tx: mpsc::UnboundedSender<Event>,
}

/// Multi-consumer event distribution.
pub struct EventBus {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Register a subscriber; events matching `filter` are queued on the
    /// returned stream from this point on.
    pub fn subscribe(&self, filter: EventFilter) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(Subscriber { filter, tx });
        EventStream { rx }
    }

    /// Deliver an event to every matching subscriber without blocking.
    /// Subscribers whose stream was dropped are pruned.
    pub fn publish(&self, event: Event) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|subscriber| {
            if !subscriber.filter.matches(&event) {
                return !subscriber.tx.is_closed();
            }
            subscriber.tx.send(event.clone()).is_ok()
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Receiving half of one event subscription.
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventStream {
    /// Wait for the next matching event. Returns `None` once the bus is
    /// gone.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Non-blocking poll for a queued event.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appliance::ApplianceId;

    fn added_event(id: &str) -> Event {
        Event::ApplianceAdded {
            appliance: Arc::new(Appliance::new(ApplianceId::new(id))),
        }
    }

    #[tokio::test]
    async fn subscribers_receive_matching_events() {
        let bus = EventBus::new();
        let mut all = bus.subscribe(EventFilter::all());
        let mut connects = bus.subscribe(EventFilter::only(EventKind::Connected));

        bus.publish(added_event("AA"));
        bus.publish(Event::Connected);

        assert!(matches!(
            all.recv().await,
            Some(Event::ApplianceAdded { .. })
        ));
        assert!(matches!(all.recv().await, Some(Event::Connected)));

        // The filtered stream sees only the connect.
        assert!(matches!(connects.recv().await, Some(Event::Connected)));
        assert!(connects.try_recv().is_none());
    }

    #[tokio::test]
    async fn same_kind_events_arrive_in_order() {
        let bus = EventBus::new();
        let mut stream = bus.subscribe(EventFilter::only(EventKind::ApplianceAdded));

        for id in ["AA", "BB", "CC"] {
            bus.publish(added_event(id));
        }

        for expected in ["AA", "BB", "CC"] {
            match stream.recv().await {
                Some(Event::ApplianceAdded { appliance }) => {
                    assert_eq!(appliance.id().as_str(), expected);
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn dropped_subscribers_are_pruned() {
        let bus = EventBus::new();
        let stream = bus.subscribe(EventFilter::all());
        assert_eq!(bus.subscriber_count(), 1);

        drop(stream);
        bus.publish(Event::Connected);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn publish_does_not_block_on_a_slow_subscriber() {
        let bus = EventBus::new();
        let mut slow = bus.subscribe(EventFilter::all());
        let mut fast = bus.subscribe(EventFilter::all());

        // Nobody drains `slow`, yet publishing keeps going.
        for _ in 0..256 {
            bus.publish(Event::Connected);
        }

        assert!(matches!(fast.recv().await, Some(Event::Connected)));
        assert!(matches!(slow.recv().await, Some(Event::Connected)));
    }
}
