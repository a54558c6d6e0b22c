//! Learned-route cache.
//!
//! Every observed discovery frame teaches a route back toward its
//! originator; this cache keeps those routes for a bounded time and count.
//! Each entry carries a generation token: the expiry task scheduled at
//! insertion only deletes the entry if the token still matches, so a timer
//! left over from an earlier insertion can never evict a refreshed entry.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time;
use tracing::trace;
use weft_core::{Address, Cost, NodeId};

/// A cached next hop toward a destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedRoute {
    pub gateway: NodeId,
    pub cost: Cost,
    /// Link addresses of the destination, if a reply carried them.
    pub addresses: Vec<Address>,
}

struct CacheEntry {
    route: CachedRoute,
    generation: u64,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<NodeId, CacheEntry>,
    /// Keys in first-insertion order; eviction takes the front.
    order: VecDeque<NodeId>,
    next_generation: u64,
}

impl CacheInner {
    fn remove(&mut self, target: NodeId) -> bool {
        if self.entries.remove(&target).is_some() {
            self.order.retain(|key| *key != target);
            true
        } else {
            false
        }
    }
}

/// Shared handle to one node's route cache. Cheap to clone.
#[derive(Clone)]
pub struct RouteCache {
    inner: Arc<Mutex<CacheInner>>,
    ttl: Duration,
    capacity: usize,
}

impl RouteCache {
    #[must_use]
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        assert!(capacity > 0, "route cache capacity must be positive");
        Self {
            inner: Arc::new(Mutex::new(CacheInner::default())),
            ttl,
            capacity,
        }
    }

    /// Insert or refresh the route toward `target`. `addresses` replaces
    /// any previously learned addresses when present and leaves them alone
    /// when `None`.
    pub async fn insert(
        &self,
        target: NodeId,
        gateway: NodeId,
        cost: Cost,
        addresses: Option<Vec<Address>>,
    ) {
        let generation;
        {
            let mut inner = self.inner.lock().await;
            generation = inner.next_generation;
            inner.next_generation += 1;

            if let Some(entry) = inner.entries.get_mut(&target) {
                entry.route.gateway = gateway;
                entry.route.cost = cost;
                if let Some(addresses) = addresses {
                    entry.route.addresses = addresses;
                }
                entry.generation = generation;
            } else {
                inner.entries.insert(
                    target,
                    CacheEntry {
                        route: CachedRoute {
                            gateway,
                            cost,
                            addresses: addresses.unwrap_or_default(),
                        },
                        generation,
                    },
                );
                inner.order.push_back(target);
                while inner.entries.len() > self.capacity {
                    if let Some(oldest) = inner.order.front().copied() {
                        inner.remove(oldest);
                        trace!(target = %oldest, "route evicted, cache full");
                    }
                }
            }
        }

        let inner = Arc::clone(&self.inner);
        let ttl = self.ttl;
        tokio::spawn(async move {
            time::sleep(ttl).await;
            let mut inner = inner.lock().await;
            let current = inner.entries.get(&target).map(|entry| entry.generation);
            // A refresh since this timer was scheduled bumped the token;
            // in that case the deletion belongs to a newer timer.
            if current == Some(generation) {
                inner.remove(target);
                trace!(%target, "route expired");
            }
        });
    }

    pub async fn get(&self, target: NodeId) -> Option<CachedRoute> {
        self.inner
            .lock()
            .await
            .entries
            .get(&target)
            .map(|entry| entry.route.clone())
    }

    pub async fn remove(&self, target: NodeId) -> bool {
        self.inner.lock().await.remove(target)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.entries.is_empty()
    }
}
