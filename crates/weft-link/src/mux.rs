//! The per-node link multiplexer.
//!
//! Media drivers attach as ports (an outbound queue plus a local address);
//! protocol layers open one socket per [`Protocol`] tag. Inbound media
//! frames are demultiplexed on their leading tag byte; anything malformed
//! or unclaimed is dropped where it arrives.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, trace};
use weft_core::{Address, AddressKind, Decode, Encode, PortId, WireReader};

use crate::error::LinkSendError;
use crate::frame::{LinkFrame, MediaFrame};
use crate::protocol::Protocol;

const SOCKET_QUEUE_DEPTH: usize = 64;
const EVENT_QUEUE_DEPTH: usize = 16;

/// Local address lifecycle notifications, used by the identity provider
/// and the neighbor table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    AddressAdded(Address),
    AddressRetracted(Address),
}

struct PortEntry {
    kind: AddressKind,
    local: Address,
    outbound: mpsc::Sender<MediaFrame>,
}

#[derive(Default)]
struct MuxInner {
    ports: HashMap<PortId, PortEntry>,
    sockets: HashMap<Protocol, mpsc::Sender<LinkFrame>>,
    next_port: u16,
}

/// Shared handle to a node's link layer. Cheap to clone.
#[derive(Clone)]
pub struct LinkMultiplexer {
    inner: Arc<Mutex<MuxInner>>,
    events: broadcast::Sender<LinkEvent>,
}

impl Default for LinkMultiplexer {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkMultiplexer {
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_QUEUE_DEPTH);
        Self {
            inner: Arc::new(Mutex::new(MuxInner::default())),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        self.events.subscribe()
    }

    /// Register a media port. The driver keeps the receiving half of
    /// `outbound` and pumps frames onto its medium.
    pub async fn attach(
        &self,
        kind: AddressKind,
        local: Address,
        outbound: mpsc::Sender<MediaFrame>,
    ) -> PortId {
        let mut inner = self.inner.lock().await;
        let port = PortId::new(inner.next_port);
        inner.next_port += 1;
        inner.ports.insert(port, PortEntry { kind, local, outbound });
        debug!(%port, %kind, address = %local, "media port attached");
        let _ = self.events.send(LinkEvent::AddressAdded(local));
        port
    }

    /// Remove a media port and retract its local address.
    pub async fn detach(&self, port: PortId) {
        let removed = self.inner.lock().await.ports.remove(&port);
        if let Some(entry) = removed {
            debug!(%port, address = %entry.local, "media port detached");
            let _ = self.events.send(LinkEvent::AddressRetracted(entry.local));
        }
    }

    /// Claim the socket for a protocol tag.
    ///
    /// Exactly one layer may own each tag; a second `open` of the same tag
    /// is a wiring bug and panics.
    pub async fn open(&self, protocol: Protocol) -> LinkSocket {
        let mut inner = self.inner.lock().await;
        if inner.sockets.contains_key(&protocol) {
            panic!("link socket for {protocol:?} already open");
        }
        let (tx, rx) = mpsc::channel(SOCKET_QUEUE_DEPTH);
        inner.sockets.insert(protocol, tx);
        LinkSocket {
            sender: LinkSender { protocol, mux: self.clone() },
            receiver: Some(rx),
        }
    }

    /// Hand an inbound media frame to whichever protocol layer claims its
    /// tag. Malformed or unclaimed frames are dropped here.
    pub async fn deliver(&self, remote: Address, bytes: &[u8]) {
        let mut reader = WireReader::new(bytes);
        let protocol = match Protocol::decode(&mut reader) {
            Ok(protocol) => protocol,
            Err(error) => {
                trace!(%remote, %error, "dropping frame with bad protocol tag");
                return;
            }
        };
        let payload = reader.read_rest().to_vec();
        let socket = self.inner.lock().await.sockets.get(&protocol).cloned();
        let Some(socket) = socket else {
            trace!(?protocol, %remote, "dropping frame for unclaimed protocol");
            return;
        };
        let frame = LinkFrame { protocol, remote, payload };
        if socket.try_send(frame).is_err() {
            trace!(?protocol, %remote, "dropping frame, socket queue full");
        }
    }

    /// Local addresses of all attached ports.
    pub async fn local_addresses(&self) -> Vec<Address> {
        self.inner
            .lock()
            .await
            .ports
            .values()
            .map(|entry| entry.local)
            .collect()
    }

    /// Address kinds this node can currently transmit on.
    pub async fn supported_kinds(&self) -> Vec<AddressKind> {
        let inner = self.inner.lock().await;
        let mut kinds = Vec::new();
        for entry in inner.ports.values() {
            if !kinds.contains(&entry.kind) {
                kinds.push(entry.kind);
            }
        }
        kinds
    }

    async fn outbound_for_kind(
        &self,
        kind: AddressKind,
        all: bool,
    ) -> Vec<mpsc::Sender<MediaFrame>> {
        let inner = self.inner.lock().await;
        let mut out = Vec::new();
        for entry in inner.ports.values() {
            if entry.kind == kind {
                out.push(entry.outbound.clone());
                if !all {
                    break;
                }
            }
        }
        out
    }
}

/// Sending half of a protocol socket. Cheap to clone; any task may send.
#[derive(Clone)]
pub struct LinkSender {
    protocol: Protocol,
    mux: LinkMultiplexer,
}

impl LinkSender {
    fn tagged(&self, payload: &[u8]) -> Vec<u8> {
        let mut bytes = self.protocol.encode_to_vec();
        bytes.extend_from_slice(payload);
        bytes
    }

    /// Best-effort unicast of one frame.
    pub async fn send(
        &self,
        destination: Address,
        payload: &[u8],
    ) -> Result<(), LinkSendError> {
        let Some(kind) = destination.kind() else {
            return Err(LinkSendError::BroadcastDestination);
        };
        let ports = self.mux.outbound_for_kind(kind, false).await;
        let Some(outbound) = ports.into_iter().next() else {
            return Err(LinkSendError::NoMedium { kind });
        };
        let frame = MediaFrame { destination, bytes: self.tagged(payload) };
        outbound
            .send(frame)
            .await
            .map_err(|_| LinkSendError::PortClosed)
    }

    /// Best-effort broadcast on every port of one medium kind.
    pub async fn broadcast(
        &self,
        kind: AddressKind,
        payload: &[u8],
    ) -> Result<(), LinkSendError> {
        let ports = self.mux.outbound_for_kind(kind, true).await;
        if ports.is_empty() {
            return Err(LinkSendError::NoMedium { kind });
        }
        let bytes = self.tagged(payload);
        let mut delivered = false;
        for outbound in ports {
            let frame = MediaFrame {
                destination: Address::Broadcast,
                bytes: bytes.clone(),
            };
            delivered |= outbound.send(frame).await.is_ok();
        }
        if delivered {
            Ok(())
        } else {
            Err(LinkSendError::PortClosed)
        }
    }
}

/// A protocol layer's endpoint on the link: a cloneable sender plus the
/// single inbound frame stream.
pub struct LinkSocket {
    sender: LinkSender,
    receiver: Option<mpsc::Receiver<LinkFrame>>,
}

impl LinkSocket {
    #[must_use]
    pub fn sender(&self) -> LinkSender {
        self.sender.clone()
    }

    /// Take the inbound stream. Single-consumer by contract; taking it
    /// twice is a wiring bug and panics.
    pub fn take_receiver(&mut self) -> mpsc::Receiver<LinkFrame> {
        match self.receiver.take() {
            Some(receiver) => receiver,
            None => panic!("link socket receiver already taken"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_by_protocol_tag() {
        let mux = LinkMultiplexer::new();
        let mut neighbor = mux.open(Protocol::RoutingNeighbor).await;
        let mut discovery = mux.open(Protocol::RoutingDiscovery).await;
        let mut neighbor_rx = neighbor.take_receiver();
        let mut discovery_rx = discovery.take_receiver();

        let remote = Address::Serial(7);
        mux.deliver(remote, &[1, 0xaa]).await;
        mux.deliver(remote, &[2, 0xbb]).await;

        let frame = neighbor_rx.recv().await.unwrap();
        assert_eq!(frame.payload, vec![0xaa]);
        assert_eq!(frame.remote, remote);
        let frame = discovery_rx.recv().await.unwrap();
        assert_eq!(frame.payload, vec![0xbb]);
    }

    #[tokio::test]
    async fn drops_unclaimed_and_malformed_frames() {
        let mux = LinkMultiplexer::new();
        // No sockets open, unknown tag: both must be absorbed silently.
        mux.deliver(Address::Serial(1), &[3, 1, 2]).await;
        mux.deliver(Address::Serial(1), &[0xee]).await;
        mux.deliver(Address::Serial(1), &[]).await;
    }

    #[tokio::test]
    #[should_panic(expected = "already open")]
    async fn double_open_panics() {
        let mux = LinkMultiplexer::new();
        let _first = mux.open(Protocol::Tunnel).await;
        let _second = mux.open(Protocol::Tunnel).await;
    }

    #[tokio::test]
    #[should_panic(expected = "receiver already taken")]
    async fn double_take_receiver_panics() {
        let mux = LinkMultiplexer::new();
        let mut socket = mux.open(Protocol::Tunnel).await;
        let _first = socket.take_receiver();
        let _second = socket.take_receiver();
    }

    #[tokio::test]
    async fn send_without_medium_is_unreachable() {
        let mux = LinkMultiplexer::new();
        let socket = mux.open(Protocol::RoutingNeighbor).await;
        let result = socket.sender().send(Address::Serial(9), &[1]).await;
        assert_eq!(
            result,
            Err(LinkSendError::NoMedium { kind: AddressKind::Serial })
        );
    }

    #[tokio::test]
    async fn send_prefixes_protocol_tag() {
        let mux = LinkMultiplexer::new();
        let socket = mux.open(Protocol::RoutingDiscovery).await;
        let (tx, mut rx) = mpsc::channel(4);
        mux.attach(AddressKind::Serial, Address::Serial(1), tx).await;

        socket.sender().send(Address::Serial(2), &[9, 9]).await.unwrap();
        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.destination, Address::Serial(2));
        assert_eq!(frame.bytes, vec![2, 9, 9]);
    }

    #[tokio::test]
    async fn detach_retracts_address() {
        let mux = LinkMultiplexer::new();
        let mut events = mux.subscribe();
        let (tx, _rx) = mpsc::channel(1);
        let port = mux.attach(AddressKind::Serial, Address::Serial(3), tx).await;
        assert_eq!(
            events.recv().await.unwrap(),
            LinkEvent::AddressAdded(Address::Serial(3))
        );
        mux.detach(port).await;
        assert_eq!(
            events.recv().await.unwrap(),
            LinkEvent::AddressRetracted(Address::Serial(3))
        );
        assert!(mux.local_addresses().await.is_empty());
    }
}
