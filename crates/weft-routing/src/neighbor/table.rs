//! The neighbor table: per-neighbor cost, addresses, and liveness timers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::time::{self, Instant};
use tracing::debug;
use weft_core::{Address, Cost, NodeId};

use super::constants::{NEIGHBOR_EXPIRATION, SEND_HELLO_INTERVAL};

const EVENT_QUEUE_DEPTH: usize = 32;
const HELLO_QUEUE_DEPTH: usize = 32;

/// Timer durations for one table.
#[derive(Debug, Clone, Copy)]
pub struct NeighborTimers {
    pub expiration: Duration,
    pub hello_interval: Duration,
}

impl Default for NeighborTimers {
    fn default() -> Self {
        Self {
            expiration: NEIGHBOR_EXPIRATION,
            hello_interval: SEND_HELLO_INTERVAL,
        }
    }
}

/// Snapshot of one table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighbor {
    pub id: NodeId,
    pub link_cost: Cost,
    pub addresses: Vec<Address>,
}

/// Liveness notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborEvent {
    Added { id: NodeId, link_cost: Cost },
    Updated { id: NodeId, link_cost: Cost },
    Removed { id: NodeId },
}

struct EntryTimers {
    expiration: watch::Sender<Instant>,
    send_hello: watch::Sender<Instant>,
}

struct Entry {
    link_cost: Cost,
    addresses: Vec<Address>,
    /// `None` for the permanent local/loopback entries.
    timers: Option<EntryTimers>,
}

#[derive(Default)]
struct TableInner {
    entries: HashMap<NodeId, Entry>,
    local: Option<NodeId>,
}

/// Shared handle to a node's neighbor table. Cheap to clone.
#[derive(Clone)]
pub struct NeighborTable {
    inner: Arc<Mutex<TableInner>>,
    events: broadcast::Sender<NeighborEvent>,
    hello_due: mpsc::Sender<NodeId>,
    timers: NeighborTimers,
}

impl NeighborTable {
    /// Create a table. The returned receiver yields a neighbor id whenever
    /// that neighbor's keepalive timer fires and a Hello should be sent.
    #[must_use]
    pub fn new(timers: NeighborTimers) -> (Self, mpsc::Receiver<NodeId>) {
        let (events, _) = broadcast::channel(EVENT_QUEUE_DEPTH);
        let (hello_due, hello_rx) = mpsc::channel(HELLO_QUEUE_DEPTH);
        let table = Self {
            inner: Arc::new(Mutex::new(TableInner::default())),
            events,
            hello_due,
            timers,
        };
        (table, hello_rx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NeighborEvent> {
        self.events.subscribe()
    }

    /// Register this node's own id. Installs permanent entries (cost zero,
    /// no timers) for the id and the loopback sentinel; both are excluded
    /// from events and the neighbor listing.
    pub async fn mark_local(&self, id: NodeId) {
        let mut inner = self.inner.lock().await;
        inner.local = Some(id);
        for key in [id, NodeId::Loopback] {
            inner.entries.insert(
                key,
                Entry { link_cost: Cost::ZERO, addresses: Vec::new(), timers: None },
            );
        }
    }

    /// Register a neighbor or refresh what is known about it.
    ///
    /// A new entry starts both timers. Its *added*/*updated* events are
    /// emitted one scheduling pass later: listeners may transmit in
    /// response, and that traffic must not overtake the reply owed to the
    /// frame that created the entry, or the peer drops it as coming from a
    /// stranger. For a known neighbor the address is merged (deduplicated)
    /// and *updated* fires only when the link cost actually changed.
    pub async fn add_or_refresh(&self, id: NodeId, link_cost: Cost, address: Address) {
        let mut inner = self.inner.lock().await;
        if id.is_loopback() || id.is_broadcast() || inner.local == Some(id) {
            return;
        }

        if let Some(entry) = inner.entries.get_mut(&id) {
            if !entry.addresses.contains(&address) {
                entry.addresses.push(address);
            }
            if entry.link_cost != link_cost {
                entry.link_cost = link_cost;
                let _ = self.events.send(NeighborEvent::Updated { id, link_cost });
            }
            return;
        }

        let timers = self.spawn_timers(id);
        inner.entries.insert(
            id,
            Entry { link_cost, addresses: vec![address], timers: Some(timers) },
        );
        drop(inner);
        debug!(%id, %link_cost, %address, "neighbor added");

        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            let _ = events.send(NeighborEvent::Added { id, link_cost });
            let _ = events.send(NeighborEvent::Updated { id, link_cost });
        });
    }

    /// Remove a neighbor and emit *removed*. Idempotent; the permanent
    /// local entries cannot be removed.
    pub async fn remove(&self, id: NodeId) -> bool {
        let mut inner = self.inner.lock().await;
        if id.is_loopback() || inner.local == Some(id) {
            return false;
        }
        let removed = inner.entries.remove(&id).is_some();
        drop(inner);
        if removed {
            debug!(%id, "neighbor removed");
            let _ = self.events.send(NeighborEvent::Removed { id });
        }
        removed
    }

    /// Retract one link address everywhere it appears. Entries left with
    /// no reachable address are removed.
    pub async fn retract_address(&self, address: Address) {
        let mut inner = self.inner.lock().await;
        let mut emptied = Vec::new();
        for (id, entry) in inner.entries.iter_mut() {
            if entry.timers.is_none() {
                continue;
            }
            entry.addresses.retain(|known| *known != address);
            if entry.addresses.is_empty() {
                emptied.push(*id);
            }
        }
        for id in &emptied {
            inner.entries.remove(id);
        }
        drop(inner);
        for id in emptied {
            debug!(%id, %address, "neighbor removed, last address retracted");
            let _ = self.events.send(NeighborEvent::Removed { id });
        }
    }

    /// Reset the expiration timer (called on any traffic received from the
    /// neighbor).
    pub async fn touch_expiration(&self, id: NodeId) {
        let deadline = Instant::now() + self.timers.expiration;
        let inner = self.inner.lock().await;
        if let Some(EntryTimers { expiration, .. }) =
            inner.entries.get(&id).and_then(|entry| entry.timers.as_ref())
        {
            let _ = expiration.send(deadline);
        }
    }

    /// Reset the keepalive timer (called whenever any frame is sent to the
    /// neighbor, a Hello included).
    pub async fn touch_send_hello(&self, id: NodeId) {
        let deadline = Instant::now() + self.timers.hello_interval;
        let inner = self.inner.lock().await;
        if let Some(EntryTimers { send_hello, .. }) =
            inner.entries.get(&id).and_then(|entry| entry.timers.as_ref())
        {
            let _ = send_hello.send(deadline);
        }
    }

    pub async fn cost(&self, id: NodeId) -> Option<Cost> {
        self.inner.lock().await.entries.get(&id).map(|entry| entry.link_cost)
    }

    pub async fn resolve_addresses(&self, id: NodeId) -> Vec<Address> {
        self.inner
            .lock()
            .await
            .entries
            .get(&id)
            .map(|entry| entry.addresses.clone())
            .unwrap_or_default()
    }

    pub async fn neighbor(&self, id: NodeId) -> Option<Neighbor> {
        self.inner.lock().await.entries.get(&id).map(|entry| Neighbor {
            id,
            link_cost: entry.link_cost,
            addresses: entry.addresses.clone(),
        })
    }

    /// Ids of all live neighbors, excluding the permanent local entries.
    pub async fn neighbors(&self) -> Vec<NodeId> {
        self.inner
            .lock()
            .await
            .entries
            .iter()
            .filter(|(_, entry)| entry.timers.is_some())
            .map(|(id, _)| *id)
            .collect()
    }

    fn spawn_timers(&self, id: NodeId) -> EntryTimers {
        let now = Instant::now();
        let (expiration_tx, expiration_rx) = watch::channel(now + self.timers.expiration);
        let (hello_tx, hello_rx) = watch::channel(now + self.timers.hello_interval);

        tokio::spawn(run_expiration(
            Arc::clone(&self.inner),
            self.events.clone(),
            id,
            expiration_rx,
        ));
        tokio::spawn(run_send_hello(
            id,
            hello_rx,
            self.hello_due.clone(),
            self.timers.hello_interval,
        ));

        EntryTimers { expiration: expiration_tx, send_hello: hello_tx }
    }
}

/// Waits for the expiration deadline, tracking resets. Fires at most once;
/// exits quietly when the entry is dropped first.
async fn run_expiration(
    inner: Arc<Mutex<TableInner>>,
    events: broadcast::Sender<NeighborEvent>,
    id: NodeId,
    mut deadline_rx: watch::Receiver<Instant>,
) {
    let mut deadline = *deadline_rx.borrow_and_update();
    loop {
        tokio::select! {
            () = time::sleep_until(deadline) => {
                let removed = inner.lock().await.entries.remove(&id).is_some();
                if removed {
                    debug!(%id, "neighbor expired");
                    let _ = events.send(NeighborEvent::Removed { id });
                }
                return;
            }
            changed = deadline_rx.changed() => match changed {
                Ok(()) => deadline = *deadline_rx.borrow_and_update(),
                Err(_) => return,
            },
        }
    }
}

/// Signals the service whenever the keepalive interval elapses without a
/// send to this neighbor.
async fn run_send_hello(
    id: NodeId,
    mut deadline_rx: watch::Receiver<Instant>,
    hello_due: mpsc::Sender<NodeId>,
    interval: Duration,
) {
    let mut deadline = *deadline_rx.borrow_and_update();
    loop {
        tokio::select! {
            () = time::sleep_until(deadline) => {
                if hello_due.send(id).await.is_err() {
                    return;
                }
                deadline = Instant::now() + interval;
            }
            changed = deadline_rx.changed() => match changed {
                Ok(()) => deadline = *deadline_rx.borrow_and_update(),
                Err(_) => return,
            },
        }
    }
}
