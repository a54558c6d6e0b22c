//! The reactive router: on-demand gateway resolution over bounded floods.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::time;
use tracing::{debug, trace, warn};
use weft_core::{Cost, Decode, Encode, NodeId};
use weft_link::{LinkFrame, LinkMultiplexer, LinkSender, LinkSocket};

use crate::error::NeighborSendError;
use crate::local::LocalNode;
use crate::neighbor::table::NeighborTable;

use super::cache::RouteCache;
use super::constants::{
    BETTER_RESPONSE_GRACE, FIRST_RESPONSE_TIMEOUT, FRAME_ID_CACHE_CAPACITY,
    ROUTE_CACHE_CAPACITY, ROUTE_CACHE_TTL,
};
use super::frame::{DiscoveryCommon, DiscoveryFrame, ReplyExtra, RequestKind};
use super::frame_id::FrameIdCache;
use super::request::{Begin, GatewayResolution, RequestStore};

/// Tunables for one router instance.
#[derive(Debug, Clone, Copy)]
pub struct DiscoveryConfig {
    pub first_response_timeout: Duration,
    pub better_response_grace: Duration,
    pub route_ttl: Duration,
    pub route_capacity: usize,
    pub replay_capacity: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            first_response_timeout: FIRST_RESPONSE_TIMEOUT,
            better_response_grace: BETTER_RESPONSE_GRACE,
            route_ttl: ROUTE_CACHE_TTL,
            route_capacity: ROUTE_CACHE_CAPACITY,
            replay_capacity: FRAME_ID_CACHE_CAPACITY,
        }
    }
}

/// Resolves gateways toward nodes that are not direct neighbors.
///
/// Every discovery frame that passes through teaches a route back toward
/// its originator, whether or not this node was its target, so the cache
/// warms up passively as traffic flows.
#[derive(Clone)]
pub struct ReactiveRouter {
    table: NeighborTable,
    local: LocalNode,
    sender: LinkSender,
    mux: LinkMultiplexer,
    cache: RouteCache,
    requests: RequestStore,
    frame_ids: Arc<Mutex<FrameIdCache>>,
}

impl ReactiveRouter {
    /// Spawn the router over an opened discovery-protocol socket.
    pub fn start(
        mut socket: LinkSocket,
        mux: LinkMultiplexer,
        table: NeighborTable,
        local: LocalNode,
        config: DiscoveryConfig,
    ) -> Self {
        let receiver = socket.take_receiver();
        let router = Self {
            table,
            local,
            sender: socket.sender(),
            mux,
            cache: RouteCache::new(config.route_ttl, config.route_capacity),
            requests: RequestStore::new(
                config.first_response_timeout,
                config.better_response_grace,
            ),
            frame_ids: Arc::new(Mutex::new(FrameIdCache::new(config.replay_capacity))),
        };
        tokio::spawn(router.clone().recv_loop(receiver));
        router
    }

    /// The learned-route cache (exposed for composition and tests).
    #[must_use]
    pub fn cache(&self) -> RouteCache {
        self.cache.clone()
    }

    /// Resolve a next hop toward `target`.
    ///
    /// Immediate for this node itself and for direct neighbors; otherwise
    /// served from the cache, or by joining/starting a flood. `None` means
    /// no route was found within the timeout — a normal outcome, not an
    /// error.
    pub async fn resolve_gateway(&self, target: NodeId) -> Option<GatewayResolution> {
        self.resolve(target, RequestKind::Gateway).await
    }

    /// Like [`Self::resolve_gateway`], additionally obtaining the target's
    /// own link addresses.
    pub async fn resolve_gateway_with_addresses(
        &self,
        target: NodeId,
    ) -> Option<GatewayResolution> {
        self.resolve(target, RequestKind::Addresses).await
    }

    async fn resolve(&self, target: NodeId, kind: RequestKind) -> Option<GatewayResolution> {
        let info = self.local.info().await;

        if self.local.is_local_like(target) {
            return Some(GatewayResolution {
                gateway: NodeId::Loopback,
                cost: Cost::ZERO,
                addresses: self.mux.local_addresses().await,
            });
        }

        if let Some(cost) = self.table.cost(target).await {
            return Some(GatewayResolution {
                gateway: target,
                cost,
                addresses: self.table.resolve_addresses(target).await,
            });
        }

        if let Some(route) = self.cache.get(target).await {
            if kind == RequestKind::Gateway || !route.addresses.is_empty() {
                return Some(GatewayResolution {
                    gateway: route.gateway,
                    cost: route.cost,
                    addresses: route.addresses,
                });
            }
        }

        match self.requests.begin(target, kind).await {
            Begin::Joined(handle) => handle.resolution().await,
            Begin::Started(handle) => {
                let frame_id = {
                    let mut ids = self.frame_ids.lock().await;
                    ids.generate(&mut rand::thread_rng())
                };
                let request = DiscoveryFrame::Request {
                    common: DiscoveryCommon {
                        frame_id,
                        total_cost: Cost::ZERO,
                        source: info.id,
                        target,
                        sender: info.id,
                    },
                    kind,
                };
                debug!(%target, %frame_id, "starting gateway discovery");
                self.flood(&request, None).await;
                handle.resolution().await
            }
        }
    }

    async fn recv_loop(self, mut receiver: mpsc::Receiver<LinkFrame>) {
        while let Some(frame) = receiver.recv().await {
            tokio::spawn(self.clone().handle_frame(frame));
        }
    }

    async fn handle_frame(self, link_frame: LinkFrame) {
        let frame = match DiscoveryFrame::decode_exact(&link_frame.payload) {
            Ok(frame) => frame,
            Err(error) => {
                trace!(remote = %link_frame.remote, %error, "dropping malformed discovery frame");
                return;
            }
        };
        let info = self.local.info().await;
        let common = *frame.common();
        if common.sender == info.id {
            return;
        }

        // Only frames relayed by a live neighbor are trusted to carry a
        // usable previous hop.
        let Some(edge_cost) = self.table.cost(common.sender).await else {
            trace!(sender = %common.sender, "dropping discovery frame from non-neighbor");
            return;
        };
        if !self.frame_ids.lock().await.insert(common.frame_id) {
            trace!(frame_id = %common.frame_id, "dropping replayed discovery frame");
            return;
        }
        self.table.touch_expiration(common.sender).await;

        let targets_self = self.local.is_local_like(common.target);

        // Simulated transmission latency, as in the neighbor layer.
        time::sleep(edge_cost.saturating_add(info.cost).as_delay()).await;

        // Arrival cost: what the path has cost once the frame sits here.
        // Consumption is free; relaying also pays this node's own cost.
        let received_cost = common.total_cost.saturating_add(edge_cost);
        let relayed_cost = received_cost.saturating_add(info.cost);

        // Teach-in: any frame from `source` proves `sender` is a usable
        // next hop back toward it.
        if common.source != info.id {
            let learned = if targets_self { received_cost } else { relayed_cost };
            self.cache
                .insert(
                    common.source,
                    common.sender,
                    learned,
                    frame.extra_addresses().map(<[_]>::to_vec),
                )
                .await;
        }

        if targets_self {
            self.requests
                .offer(
                    common.source,
                    GatewayResolution {
                        gateway: common.sender,
                        cost: received_cost,
                        addresses: frame
                            .extra_addresses()
                            .map(<[_]>::to_vec)
                            .unwrap_or_default(),
                    },
                )
                .await;
            if let DiscoveryFrame::Request { kind, .. } = frame {
                self.reply(kind, common).await;
            }
            return;
        }

        let mut onward = frame;
        let fields = onward.common_mut();
        fields.total_cost = relayed_cost;
        fields.sender = info.id;

        // A cached route turns the flood into a unicast toward the
        // gateway; otherwise keep flooding, minus the arrival neighbor.
        if let Some(route) = self.cache.get(common.target).await {
            if self.table.cost(route.gateway).await.is_some()
                && self.send_to_neighbor(route.gateway, &onward).await.is_ok()
            {
                return;
            }
            // Gateway vanished since it was cached; fall back to flooding.
        }
        self.flood(&onward, Some(common.sender)).await;
    }

    async fn reply(&self, kind: RequestKind, request: DiscoveryCommon) {
        let info = self.local.info().await;
        let frame_id = {
            let mut ids = self.frame_ids.lock().await;
            ids.generate(&mut rand::thread_rng())
        };
        let extra = match kind {
            RequestKind::Gateway => ReplyExtra::None,
            RequestKind::Addresses => {
                ReplyExtra::Addresses(self.mux.local_addresses().await)
            }
        };
        let reply = DiscoveryFrame::Reply {
            common: DiscoveryCommon {
                frame_id,
                // The reply starts a fresh accumulation from this end.
                total_cost: info.cost,
                source: info.id,
                target: request.source,
                sender: info.id,
            },
            extra,
        };
        if let Err(error) = self.send_to_neighbor(request.sender, &reply).await {
            warn!(target = %request.source, %error, "failed to answer discovery request");
        }
    }

    async fn send_to_neighbor(
        &self,
        id: NodeId,
        frame: &DiscoveryFrame,
    ) -> Result<(), NeighborSendError> {
        let addresses = self.table.resolve_addresses(id).await;
        let Some(address) = addresses.first().copied() else {
            return Err(NeighborSendError::Unreachable { id });
        };
        self.sender.send(address, &frame.encode_to_vec()).await?;
        self.table.touch_send_hello(id).await;
        Ok(())
    }

    /// Unicast the frame to every live neighbor, minus `exclude` (the
    /// neighbor it arrived from, for loop suppression).
    async fn flood(&self, frame: &DiscoveryFrame, exclude: Option<NodeId>) {
        for id in self.table.neighbors().await {
            if Some(id) == exclude {
                continue;
            }
            if let Err(error) = self.send_to_neighbor(id, frame).await {
                trace!(neighbor = %id, %error, "flood leg failed");
            }
        }
    }
}
