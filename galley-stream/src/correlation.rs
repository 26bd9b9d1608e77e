//! Request/response correlation.
//!
//! Every outbound request that expects a reply gets a monotonically
//! increasing correlation id and an entry in the pending table. An
//! inbound message resolves its entry exactly once: removal from the
//! table is the gate, so a duplicate response or a response arriving
//! after expiry finds no entry and degrades to an unsolicited push.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::oneshot;

use galley_erd::ErdCode;

use crate::error::RequestError;

/// What a resolved request hands back to its caller.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    /// The property entries the response carried.
    pub payload: BTreeMap<ErdCode, String>,
    /// The subset that actually changed the state cache.
    pub changed: HashMap<ErdCode, String>,
}

struct PendingRequest {
    tx: oneshot::Sender<Result<Completion, RequestError>>,
    deadline: Instant,
}

/// Caller's handle to one in-flight request.
///
/// Dropping the handle abandons the request; the pending entry still
/// resolves or expires internally and the result is discarded.
pub struct PendingHandle {
    rx: oneshot::Receiver<Result<Completion, RequestError>>,
}

impl PendingHandle {
    /// Wait for the request to resolve.
    pub async fn wait(self) -> Result<Completion, RequestError> {
        match self.rx.await {
            Ok(result) => result,
            // Table dropped without resolving: the engine shut down.
            Err(_) => Err(RequestError::Cancelled),
        }
    }
}

/// The table of in-flight correlated requests.
#[derive(Default)]
pub struct PendingTable {
    next_id: AtomicU64,
    entries: DashMap<String, PendingRequest>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a correlation id without tracking a reply, for requests
    /// sent on behalf of nobody (the response then flows through the
    /// push path).
    pub fn allocate_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::Relaxed).to_string()
    }

    /// Allocate an id and register a pending entry with the given
    /// time-to-live.
    pub fn register(&self, ttl: Duration) -> (String, PendingHandle) {
        let id = self.allocate_id();
        let (tx, rx) = oneshot::channel();
        self.entries.insert(
            id.clone(),
            PendingRequest {
                tx,
                deadline: Instant::now() + ttl,
            },
        );
        (id, PendingHandle { rx })
    }

    /// Resolve a pending entry with a completed response. Returns `false`
    /// when no entry matches (unknown, duplicate, or already expired id);
    /// the caller should then treat the message as an unsolicited push.
    pub fn resolve(&self, id: &str, completion: Completion) -> bool {
        match self.entries.remove(id) {
            Some((_, pending)) => {
                // The receiver may have been abandoned; that is fine.
                let _ = pending.tx.send(Ok(completion));
                true
            }
            None => false,
        }
    }

    /// Fail a pending entry. Returns `false` when no entry matches.
    pub fn fail(&self, id: &str, error: RequestError) -> bool {
        match self.entries.remove(id) {
            Some((_, pending)) => {
                let _ = pending.tx.send(Err(error));
                true
            }
            None => false,
        }
    }

    /// Fail every outstanding entry, e.g. when the connection drops.
    pub fn fail_all(&self, error: &RequestError) {
        let ids: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.fail(&id, error.clone());
        }
    }

    /// Expire entries past their deadline, failing them with a timeout.
    /// Driven lazily from the ingestion loop; returns how many expired.
    pub fn expire(&self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.deadline <= now)
            .map(|entry| entry.key().clone())
            .collect();
        let mut count = 0;
        for id in &expired {
            if self.fail(id, RequestError::Timeout) {
                tracing::debug!(id, "pending request expired");
                count += 1;
            }
        }
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for PendingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingTable")
            .field("pending", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completion_with(code: ErdCode, raw: &str) -> Completion {
        let mut payload = BTreeMap::new();
        payload.insert(code, raw.to_string());
        Completion {
            payload,
            changed: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn resolves_exactly_once() {
        let table = PendingTable::new();
        let (id, handle) = table.register(Duration::from_secs(30));
        assert_eq!(table.len(), 1);

        assert!(table.resolve(&id, completion_with(ErdCode(0x5205), "002d")));
        // Duplicate delivery is a no-op.
        assert!(!table.resolve(&id, completion_with(ErdCode(0x5205), "002d")));
        assert!(table.is_empty());

        let completion = handle.wait().await.unwrap();
        assert_eq!(
            completion.payload.get(&ErdCode(0x5205)).map(String::as_str),
            Some("002d")
        );
    }

    #[tokio::test]
    async fn ids_are_monotonically_increasing() {
        let table = PendingTable::new();
        let (a, _ha) = table.register(Duration::from_secs(1));
        let (b, _hb) = table.register(Duration::from_secs(1));
        assert!(b.parse::<u64>().unwrap() > a.parse::<u64>().unwrap());
    }

    #[tokio::test]
    async fn expiry_fails_with_timeout() {
        let table = PendingTable::new();
        let (_id, handle) = table.register(Duration::from_millis(0));

        let expired = table.expire(Instant::now() + Duration::from_millis(1));
        assert_eq!(expired, 1);
        assert!(table.is_empty());

        assert!(matches!(handle.wait().await, Err(RequestError::Timeout)));
    }

    #[tokio::test]
    async fn late_response_after_expiry_is_unmatched() {
        let table = PendingTable::new();
        let (id, handle) = table.register(Duration::from_millis(0));
        table.expire(Instant::now() + Duration::from_millis(1));

        // The response arrives after expiry: no match, caller keeps the
        // timeout it already got.
        assert!(!table.resolve(&id, Completion::default()));
        assert!(matches!(handle.wait().await, Err(RequestError::Timeout)));
    }

    #[tokio::test]
    async fn abandoned_handles_do_not_corrupt_the_table() {
        let table = PendingTable::new();
        let (id, handle) = table.register(Duration::from_secs(30));
        drop(handle);

        // Resolution still removes the entry cleanly.
        assert!(table.resolve(&id, Completion::default()));
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn fail_all_drains_the_table() {
        let table = PendingTable::new();
        let (_a, ha) = table.register(Duration::from_secs(30));
        let (_b, hb) = table.register(Duration::from_secs(30));

        table.fail_all(&RequestError::Transport(
            crate::error::TransportError::NotConnected,
        ));
        assert!(table.is_empty());
        assert!(matches!(ha.wait().await, Err(RequestError::Transport(_))));
        assert!(matches!(hb.wait().await, Err(RequestError::Transport(_))));
    }

    #[tokio::test]
    async fn unexpired_entries_survive_the_sweep() {
        let table = PendingTable::new();
        let (_id, _handle) = table.register(Duration::from_secs(30));
        assert_eq!(table.expire(Instant::now()), 0);
        assert_eq!(table.len(), 1);
    }
}
