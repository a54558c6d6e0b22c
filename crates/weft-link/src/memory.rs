//! In-memory media hub.
//!
//! Test support standing in for a real shared medium: every attached
//! multiplexer becomes a station with a link address, unicasts are routed
//! by address, and broadcasts reach every station except the origin.
//! Delivery is lossless and immediate; tests that need loss or delay
//! inject it above the link layer.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::trace;
use weft_core::{Address, PortId};

use crate::frame::MediaFrame;
use crate::mux::LinkMultiplexer;

const OUTBOUND_QUEUE_DEPTH: usize = 64;

struct Station {
    mux: LinkMultiplexer,
    port: PortId,
}

#[derive(Default)]
struct HubInner {
    stations: HashMap<Address, Station>,
}

/// A shared in-process medium connecting several nodes' link layers.
#[derive(Clone, Default)]
pub struct MemoryHub {
    inner: Arc<Mutex<HubInner>>,
}

impl MemoryHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a node's multiplexer to the hub under `address`.
    pub async fn attach(&self, mux: &LinkMultiplexer, address: Address) {
        let kind = match address.kind() {
            Some(kind) => kind,
            None => panic!("hub station address must not be broadcast"),
        };
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
        let port = mux.attach(kind, address, outbound_tx).await;
        self.inner
            .lock()
            .await
            .stations
            .insert(address, Station { mux: mux.clone(), port });

        let hub = self.clone();
        tokio::spawn(async move {
            hub.pump(address, outbound_rx).await;
        });
    }

    /// Detach a station, retracting its address from its own mux.
    pub async fn detach(&self, address: Address) {
        let station = self.inner.lock().await.stations.remove(&address);
        if let Some(station) = station {
            station.mux.detach(station.port).await;
        }
    }

    async fn pump(&self, from: Address, mut outbound: mpsc::Receiver<MediaFrame>) {
        while let Some(frame) = outbound.recv().await {
            // Snapshot targets, then deliver outside the lock.
            let targets: Vec<LinkMultiplexer> = {
                let inner = self.inner.lock().await;
                match frame.destination {
                    Address::Broadcast => inner
                        .stations
                        .iter()
                        .filter(|(address, _)| **address != from)
                        .map(|(_, station)| station.mux.clone())
                        .collect(),
                    destination => match inner.stations.get(&destination) {
                        Some(station) => vec![station.mux.clone()],
                        None => {
                            trace!(%from, %destination, "hub dropping frame for unknown station");
                            Vec::new()
                        }
                    },
                }
            };
            for mux in targets {
                mux.deliver(from, &frame.bytes).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Protocol;

    #[tokio::test]
    async fn routes_unicast_between_stations() {
        let hub = MemoryHub::new();
        let mux_a = LinkMultiplexer::new();
        let mux_b = LinkMultiplexer::new();
        hub.attach(&mux_a, Address::Serial(1)).await;
        hub.attach(&mux_b, Address::Serial(2)).await;

        let socket_a = mux_a.open(Protocol::RoutingNeighbor).await;
        let mut socket_b = mux_b.open(Protocol::RoutingNeighbor).await;
        let mut rx_b = socket_b.take_receiver();

        socket_a.sender().send(Address::Serial(2), &[7]).await.unwrap();
        let frame = rx_b.recv().await.unwrap();
        assert_eq!(frame.remote, Address::Serial(1));
        assert_eq!(frame.payload, vec![7]);
    }

    #[tokio::test]
    async fn broadcast_skips_origin() {
        let hub = MemoryHub::new();
        let muxes: Vec<LinkMultiplexer> =
            (1..=3).map(|_| LinkMultiplexer::new()).collect();
        for (index, mux) in muxes.iter().enumerate() {
            hub.attach(mux, Address::Serial(index as u8 + 1)).await;
        }

        let mut socket_a = muxes[0].open(Protocol::RoutingDiscovery).await;
        let mut socket_b = muxes[1].open(Protocol::RoutingDiscovery).await;
        let mut socket_c = muxes[2].open(Protocol::RoutingDiscovery).await;
        let mut rx_a = socket_a.take_receiver();
        let mut rx_b = socket_b.take_receiver();
        let mut rx_c = socket_c.take_receiver();

        socket_a
            .sender()
            .broadcast(weft_core::AddressKind::Serial, &[1, 2])
            .await
            .unwrap();

        assert_eq!(rx_b.recv().await.unwrap().payload, vec![1, 2]);
        assert_eq!(rx_c.recv().await.unwrap().payload, vec![1, 2]);
        // The origin must not hear its own broadcast.
        tokio::task::yield_now().await;
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn detach_removes_station() {
        let hub = MemoryHub::new();
        let mux_a = LinkMultiplexer::new();
        let mux_b = LinkMultiplexer::new();
        hub.attach(&mux_a, Address::Serial(1)).await;
        hub.attach(&mux_b, Address::Serial(2)).await;

        let socket_a = mux_a.open(Protocol::RoutingNeighbor).await;
        hub.detach(Address::Serial(2)).await;
        assert!(mux_b.local_addresses().await.is_empty());

        // Sends toward the departed station are absorbed by the hub.
        socket_a.sender().send(Address::Serial(2), &[9]).await.unwrap();
    }
}
