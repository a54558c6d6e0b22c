//! Local node identity.
//!
//! A node does not know its own id until its first link address exists, so
//! identity is resolved lazily: readers await [`LocalNode::info`], writers
//! feed it from link events or force it with [`LocalNode::try_initialize`].

use tokio::sync::watch;
use tracing::debug;
use weft_core::{Address, Cost, NodeId};

/// This node's resolved identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalInfo {
    pub id: NodeId,
    pub cost: Cost,
}

/// Lazily resolved {id, cost} for the owning node. Cheap to clone.
#[derive(Debug, Clone)]
pub struct LocalNode {
    tx: watch::Sender<Option<LocalInfo>>,
}

impl Default for LocalNode {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalNode {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Resolve the identity if it is still unresolved. Returns whether this
    /// call performed the initialization.
    pub fn try_initialize(&self, id: NodeId, cost: Cost) -> bool {
        let mut initialized = false;
        self.tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(LocalInfo { id, cost });
                initialized = true;
                true
            } else {
                false
            }
        });
        if initialized {
            debug!(%id, %cost, "local node identity resolved");
        }
        initialized
    }

    /// Derive identity from the first local link address to appear.
    pub fn observe_address(&self, address: Address) {
        if !address.is_broadcast() {
            self.try_initialize(NodeId::from(address), Cost::ZERO);
        }
    }

    /// Update the advertised node cost. No-op until resolved.
    pub fn set_cost(&self, cost: Cost) {
        self.tx.send_if_modified(|current| match current {
            Some(info) if info.cost != cost => {
                info.cost = cost;
                true
            }
            _ => false,
        });
    }

    /// The identity, if already resolved.
    #[must_use]
    pub fn get(&self) -> Option<LocalInfo> {
        *self.tx.borrow()
    }

    /// Await the resolved identity.
    pub async fn info(&self) -> LocalInfo {
        let mut rx = self.tx.subscribe();
        loop {
            if let Some(info) = *rx.borrow_and_update() {
                return info;
            }
            // Cannot fail: `self` holds a sender for the lifetime of the call.
            let _ = rx.changed().await;
        }
    }

    /// Whether `id` refers to this node (its own id or the loopback
    /// sentinel). Unresolved identity matches only loopback.
    #[must_use]
    pub fn is_local_like(&self, id: NodeId) -> bool {
        if id.is_loopback() {
            return true;
        }
        matches!(self.get(), Some(info) if info.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_initialization_wins() {
        let local = LocalNode::new();
        assert!(local.get().is_none());
        assert!(local.try_initialize(NodeId::Serial(1), Cost::new(3)));
        assert!(!local.try_initialize(NodeId::Serial(2), Cost::ZERO));
        assert_eq!(
            local.get(),
            Some(LocalInfo { id: NodeId::Serial(1), cost: Cost::new(3) })
        );
    }

    #[tokio::test]
    async fn info_waits_for_resolution() {
        let local = LocalNode::new();
        let waiter = {
            let local = local.clone();
            tokio::spawn(async move { local.info().await })
        };
        local.observe_address(Address::Serial(9));
        let info = waiter.await.unwrap();
        assert_eq!(info.id, NodeId::Serial(9));
        assert_eq!(info.cost, Cost::ZERO);
    }

    #[tokio::test]
    async fn set_cost_requires_resolution() {
        let local = LocalNode::new();
        local.set_cost(Cost::new(10));
        assert!(local.get().is_none());

        local.try_initialize(NodeId::Serial(1), Cost::ZERO);
        local.set_cost(Cost::new(10));
        assert_eq!(local.get().map(|info| info.cost), Some(Cost::new(10)));
    }

    #[tokio::test]
    async fn loopback_is_always_local_like() {
        let local = LocalNode::new();
        assert!(local.is_local_like(NodeId::Loopback));
        assert!(!local.is_local_like(NodeId::Serial(1)));
        local.try_initialize(NodeId::Serial(1), Cost::ZERO);
        assert!(local.is_local_like(NodeId::Serial(1)));
    }
}
