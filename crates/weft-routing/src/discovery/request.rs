//! In-flight discovery requests.
//!
//! All concurrent resolutions of the same target share one entry: the
//! first caller starts it (and owes the network exactly one flood), later
//! callers join and receive the same outcome. An entry waits a bounded
//! time for the first response, then a further grace window in case a
//! cheaper path answers late, and resolves with the best candidate seen.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::time;
use tracing::{debug, trace};
use weft_core::{Address, Cost, NodeId};

use super::constants::{BETTER_RESPONSE_GRACE, FIRST_RESPONSE_TIMEOUT};
use super::frame::RequestKind;

/// The outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayResolution {
    /// Next hop toward the target.
    pub gateway: NodeId,
    /// Total path cost via that gateway.
    pub cost: Cost,
    /// The target's own link addresses, when the request asked for them.
    pub addresses: Vec<Address>,
}

struct InFlight {
    best: Option<GatewayResolution>,
    first_response: Option<oneshot::Sender<()>>,
    result: broadcast::Sender<Option<GatewayResolution>>,
}

/// Awaits the shared outcome of one coalesced request.
pub struct ResultHandle(broadcast::Receiver<Option<GatewayResolution>>);

impl ResultHandle {
    /// Resolves to `None` on total timeout.
    pub async fn resolution(mut self) -> Option<GatewayResolution> {
        self.0.recv().await.ok().flatten()
    }
}

/// Whether `begin` created a new request or attached to a live one. Only a
/// `Started` caller broadcasts a request frame.
pub enum Begin {
    Started(ResultHandle),
    Joined(ResultHandle),
}

#[derive(Clone)]
pub struct RequestStore {
    inner: Arc<Mutex<HashMap<(NodeId, RequestKind), InFlight>>>,
    first_response_timeout: Duration,
    grace: Duration,
}

impl Default for RequestStore {
    fn default() -> Self {
        Self::new(FIRST_RESPONSE_TIMEOUT, BETTER_RESPONSE_GRACE)
    }
}

impl RequestStore {
    #[must_use]
    pub fn new(first_response_timeout: Duration, grace: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            first_response_timeout,
            grace,
        }
    }

    /// Start a resolution for `target`, or join the one already running.
    pub async fn begin(&self, target: NodeId, kind: RequestKind) -> Begin {
        let mut inner = self.inner.lock().await;
        if let Some(entry) = inner.get(&(target, kind)) {
            trace!(%target, ?kind, "joining in-flight discovery request");
            return Begin::Joined(ResultHandle(entry.result.subscribe()));
        }

        let (result_tx, result_rx) = broadcast::channel(1);
        let (first_tx, first_rx) = oneshot::channel();
        inner.insert(
            (target, kind),
            InFlight {
                best: None,
                first_response: Some(first_tx),
                result: result_tx,
            },
        );
        drop(inner);

        tokio::spawn(self.clone().drive(target, kind, first_rx));
        Begin::Started(ResultHandle(result_rx))
    }

    /// Offer a response candidate to whatever requests are waiting on
    /// `target`. The lowest cost wins; an address-carrying request only
    /// accepts candidates that actually carry addresses.
    pub async fn offer(&self, target: NodeId, candidate: GatewayResolution) {
        let mut inner = self.inner.lock().await;
        for kind in [RequestKind::Gateway, RequestKind::Addresses] {
            let Some(entry) = inner.get_mut(&(target, kind)) else {
                continue;
            };
            if kind == RequestKind::Addresses && candidate.addresses.is_empty() {
                continue;
            }
            let improves = entry
                .best
                .as_ref()
                .map_or(true, |best| candidate.cost < best.cost);
            if improves {
                entry.best = Some(candidate.clone());
            }
            if let Some(first) = entry.first_response.take() {
                let _ = first.send(());
            }
        }
    }

    async fn drive(self, target: NodeId, kind: RequestKind, first_rx: oneshot::Receiver<()>) {
        let first = time::timeout(self.first_response_timeout, first_rx).await;
        if matches!(first, Ok(Ok(()))) {
            // Something answered; give a cheaper path a moment to beat it.
            time::sleep(self.grace).await;
        }

        let entry = self.inner.lock().await.remove(&(target, kind));
        if let Some(entry) = entry {
            match &entry.best {
                Some(best) => {
                    debug!(%target, gateway = %best.gateway, cost = %best.cost, "discovery resolved")
                }
                None => debug!(%target, "discovery timed out"),
            }
            let _ = entry.result.send(entry.best);
        }
    }
}
