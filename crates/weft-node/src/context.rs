//! One node's assembled stack.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{info, trace, warn};
use weft_core::{Cost, Decode, Encode, NodeId, PortId};
use weft_link::{
    LinkEvent, LinkFrame, LinkMultiplexer, LinkSender, Protocol, UdpConfig, UdpMedia,
};
use weft_routing::discovery::{DiscoveryConfig, ReactiveRouter};
use weft_routing::neighbor::{NeighborService, NeighborTable, NeighborTimers};
use weft_routing::LocalNode;
use weft_trusted::outlet::OutletError;
use weft_trusted::{DatagramOutlet, PseudoHeader, TrustedSocket};

use crate::config::{self, NodeConfig};
use crate::error::{NodeStartError, StreamError};
use crate::tunnel::TunnelFrame;

const STREAM_QUEUE_DEPTH: usize = 64;

type StreamRegistry = Arc<Mutex<HashMap<NodeId, mpsc::Sender<Vec<u8>>>>>;

/// One node: link layer, identity, neighbors, routing, and the tunnel the
/// trusted transport runs over. Everything is instance state; dropping the
/// context (and stopping its media) tears the node down.
pub struct NodeContext {
    mux: LinkMultiplexer,
    local: LocalNode,
    neighbors: NeighborService,
    router: ReactiveRouter,
    tunnel_sender: LinkSender,
    streams: StreamRegistry,
    media: Vec<UdpMedia>,
}

impl NodeContext {
    /// Assemble a node with default timers and no media. Media ports (or
    /// a test hub) attach to [`Self::mux`] afterwards; identity resolves
    /// from the first address that appears.
    pub async fn new(cost: Cost) -> NodeContext {
        Self::assemble(cost, NeighborTimers::default(), DiscoveryConfig::default()).await
    }

    /// Bring up a fully configured node: timers, identity, and UDP media
    /// per the config file.
    pub async fn start(config: &NodeConfig) -> Result<NodeContext, NodeStartError> {
        let cost = Cost::new(config.node.cost);
        let mut context = Self::assemble(
            cost,
            config.neighbor_timers(),
            config.discovery_config(),
        )
        .await;

        if let Some(address) = &config.node.address {
            let address = config::parse_address(address)?;
            context.local.try_initialize(NodeId::from(address), cost);
        }

        for entry in &config.media.udp {
            let bind = config::parse_socket_addr("media.udp.bind", &entry.bind)?;
            let mut udp = UdpConfig::new(entry.name.clone(), bind);
            if let Some(target) = &entry.broadcast_target {
                udp = udp.with_broadcast(config::parse_socket_addr_v4(
                    "media.udp.broadcast_target",
                    target,
                )?);
            }
            let mut media = UdpMedia::new(udp, context.mux.clone());
            let local = media.start().await?;
            info!(name = %entry.name, address = %local, "media port up");
            context.media.push(media);
        }

        Ok(context)
    }

    async fn assemble(
        cost: Cost,
        timers: NeighborTimers,
        discovery: DiscoveryConfig,
    ) -> NodeContext {
        let mux = LinkMultiplexer::new();
        let local = LocalNode::new();

        let neighbor_socket = mux.open(Protocol::RoutingNeighbor).await;
        let neighbors = NeighborService::start(neighbor_socket, local.clone(), timers);

        let discovery_socket = mux.open(Protocol::RoutingDiscovery).await;
        let router = ReactiveRouter::start(
            discovery_socket,
            mux.clone(),
            neighbors.table(),
            local.clone(),
            discovery,
        );

        let mut tunnel_socket = mux.open(Protocol::Tunnel).await;
        let tunnel_rx = tunnel_socket.take_receiver();
        let tunnel_sender = tunnel_socket.sender();
        let streams: StreamRegistry = Arc::default();

        tokio::spawn(Self::link_event_loop(
            mux.subscribe(),
            local.clone(),
            neighbors.table(),
            cost,
        ));
        tokio::spawn(Self::tunnel_inbound_loop(
            tunnel_rx,
            local.clone(),
            router.clone(),
            neighbors.table(),
            tunnel_sender.clone(),
            Arc::clone(&streams),
        ));

        NodeContext { mux, local, neighbors, router, tunnel_sender, streams, media: Vec::new() }
    }

    /// The node's link layer, for attaching media.
    #[must_use]
    pub fn mux(&self) -> &LinkMultiplexer {
        &self.mux
    }

    #[must_use]
    pub fn local(&self) -> LocalNode {
        self.local.clone()
    }

    #[must_use]
    pub fn neighbors(&self) -> &NeighborService {
        &self.neighbors
    }

    #[must_use]
    pub fn router(&self) -> &ReactiveRouter {
        &self.router
    }

    /// Stop all media started from configuration.
    pub async fn stop(&mut self) {
        for media in &mut self.media {
            media.stop().await;
        }
    }

    /// Actively open a trusted stream to `remote` anywhere in the mesh.
    pub async fn connect_stream(
        &self,
        remote: NodeId,
        local_port: PortId,
        remote_port: PortId,
    ) -> Result<TrustedSocket, StreamError> {
        let inbound = self.register_stream(remote).await?;
        let outlet = self.stream_outlet(remote);
        let pseudo = self.pseudo_header(remote, local_port, remote_port).await;
        match TrustedSocket::connect(outlet, inbound, pseudo).await {
            Ok(socket) => Ok(socket),
            Err(error) => {
                self.streams.lock().await.remove(&remote);
                Err(error.into())
            }
        }
    }

    /// Passively open a trusted stream: wait for `remote` to connect.
    pub async fn accept_stream(
        &self,
        remote: NodeId,
        local_port: PortId,
        remote_port: PortId,
    ) -> Result<TrustedSocket, StreamError> {
        let inbound = self.register_stream(remote).await?;
        let outlet = self.stream_outlet(remote);
        let pseudo = self.pseudo_header(remote, local_port, remote_port).await;
        match TrustedSocket::accept(outlet, inbound, pseudo).await {
            Ok(socket) => Ok(socket),
            Err(error) => {
                self.streams.lock().await.remove(&remote);
                Err(error.into())
            }
        }
    }

    async fn pseudo_header(
        &self,
        remote: NodeId,
        local_port: PortId,
        remote_port: PortId,
    ) -> PseudoHeader {
        let info = self.local.info().await;
        PseudoHeader {
            source: info.id,
            destination: remote,
            source_port: local_port,
            destination_port: remote_port,
        }
    }

    async fn register_stream(
        &self,
        remote: NodeId,
    ) -> Result<mpsc::Receiver<Vec<u8>>, StreamError> {
        let mut streams = self.streams.lock().await;
        if let Some(existing) = streams.get(&remote) {
            if !existing.is_closed() {
                return Err(StreamError::Busy { remote });
            }
        }
        let (tx, rx) = mpsc::channel(STREAM_QUEUE_DEPTH);
        streams.insert(remote, tx);
        Ok(rx)
    }

    /// Outlet feeding a per-stream outbound pump that wraps datagrams in
    /// tunnel frames and routes them toward `remote`.
    fn stream_outlet(&self, remote: NodeId) -> Arc<StreamOutlet> {
        let (tx, rx) = mpsc::channel(STREAM_QUEUE_DEPTH);
        tokio::spawn(Self::stream_outbound_loop(
            self.local.clone(),
            self.router.clone(),
            self.neighbors.table(),
            self.tunnel_sender.clone(),
            remote,
            rx,
        ));
        Arc::new(StreamOutlet { tx })
    }

    async fn stream_outbound_loop(
        local: LocalNode,
        router: ReactiveRouter,
        table: NeighborTable,
        sender: LinkSender,
        remote: NodeId,
        mut outbound: mpsc::Receiver<Vec<u8>>,
    ) {
        while let Some(payload) = outbound.recv().await {
            let info = local.info().await;
            let frame = TunnelFrame { source: info.id, destination: remote, payload };
            Self::route_onward(&router, &table, &sender, &frame).await;
        }
    }

    /// Send a tunnel frame one hop toward its destination. Failures are
    /// datagram loss; the trusted transport retransmits.
    async fn route_onward(
        router: &ReactiveRouter,
        table: &NeighborTable,
        sender: &LinkSender,
        frame: &TunnelFrame,
    ) {
        let Some(resolution) = router.resolve_gateway(frame.destination).await else {
            warn!(destination = %frame.destination, "no route for tunnel frame, dropping");
            return;
        };
        let addresses = table.resolve_addresses(resolution.gateway).await;
        let Some(address) = addresses.first().copied() else {
            warn!(gateway = %resolution.gateway, "gateway has no usable address, dropping");
            return;
        };
        if let Err(error) = sender.send(address, &frame.encode_to_vec()).await {
            warn!(%address, %error, "tunnel send failed, dropping");
        }
    }

    async fn link_event_loop(
        mut events: broadcast::Receiver<LinkEvent>,
        local: LocalNode,
        table: NeighborTable,
        cost: Cost,
    ) {
        loop {
            match events.recv().await {
                Ok(LinkEvent::AddressAdded(address)) => {
                    if !address.is_broadcast() {
                        local.try_initialize(NodeId::from(address), cost);
                    }
                }
                Ok(LinkEvent::AddressRetracted(address)) => {
                    table.retract_address(address).await;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "link event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    async fn tunnel_inbound_loop(
        mut inbound: mpsc::Receiver<LinkFrame>,
        local: LocalNode,
        router: ReactiveRouter,
        table: NeighborTable,
        sender: LinkSender,
        streams: StreamRegistry,
    ) {
        while let Some(link_frame) = inbound.recv().await {
            let frame = match TunnelFrame::decode_exact(&link_frame.payload) {
                Ok(frame) => frame,
                Err(error) => {
                    trace!(remote = %link_frame.remote, %error, "dropping malformed tunnel frame");
                    continue;
                }
            };
            if local.is_local_like(frame.destination) {
                let stream = streams.lock().await.get(&frame.source).cloned();
                match stream {
                    Some(tx) => {
                        if tx.send(frame.payload).await.is_err() {
                            streams.lock().await.remove(&frame.source);
                        }
                    }
                    None => {
                        trace!(source = %frame.source, "dropping tunnel frame with no stream")
                    }
                }
            } else {
                // Forwarding may wait on a route discovery; keep the
                // inbound pump moving.
                let router = router.clone();
                let table = table.clone();
                let sender = sender.clone();
                tokio::spawn(async move {
                    Self::route_onward(&router, &table, &sender, &frame).await;
                });
            }
        }
    }
}

/// [`DatagramOutlet`] backed by the per-stream outbound pump.
struct StreamOutlet {
    tx: mpsc::Sender<Vec<u8>>,
}

impl DatagramOutlet for StreamOutlet {
    fn send(&self, datagram: &[u8]) -> Result<(), OutletError> {
        self.tx.try_send(datagram.to_vec()).map_err(|error| match error {
            mpsc::error::TrySendError::Full(_) => OutletError::Rejected,
            mpsc::error::TrySendError::Closed(_) => OutletError::Disconnected,
        })
    }
}
