//! UDP media driver.
//!
//! Each datagram carries one complete link frame, so no framing or
//! reassembly is needed and there is no connection state. Receive errors
//! are treated as transient.

use std::net::{SocketAddr, SocketAddrV4};
use std::sync::Arc;

use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use weft_core::{Address, AddressKind, PortId};

use crate::frame::MediaFrame;
use crate::mux::LinkMultiplexer;

/// Size of the receive buffer for `UdpSocket::recv_from`.
pub const UDP_RECV_BUFFER: usize = 2048;

/// Depth of the outbound frame queue between the mux and the socket pump.
const OUTBOUND_QUEUE_DEPTH: usize = 64;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Configuration for a [`UdpMedia`] port.
#[derive(Debug, Clone)]
pub struct UdpConfig {
    /// Human-readable name for log lines.
    pub name: String,
    /// Local address to bind the UDP socket to (IPv4).
    pub bind: SocketAddr,
    /// Where link-level broadcasts are sent (`None` disables broadcast).
    pub broadcast_target: Option<SocketAddrV4>,
}

impl UdpConfig {
    pub fn new(name: impl Into<String>, bind: SocketAddr) -> Self {
        Self { name: name.into(), bind, broadcast_target: None }
    }

    #[must_use]
    pub fn with_broadcast(mut self, target: SocketAddrV4) -> Self {
        self.broadcast_target = Some(target);
        self
    }
}

/// A UDP port attached to a [`LinkMultiplexer`].
pub struct UdpMedia {
    config: UdpConfig,
    mux: LinkMultiplexer,
    port: Option<PortId>,
    stop_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl UdpMedia {
    pub fn new(config: UdpConfig, mux: LinkMultiplexer) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self { config, mux, port: None, stop_tx, tasks: Vec::new() }
    }

    /// Bind the socket, attach to the mux, and spawn the I/O pumps.
    /// Returns the local link address of this port.
    pub async fn start(&mut self) -> Result<Address, MediaError> {
        let socket = UdpSocket::bind(self.config.bind).await?;
        if self.config.broadcast_target.is_some() {
            socket.set_broadcast(true)?;
        }
        let local = match socket.local_addr()? {
            SocketAddr::V4(v4) => Address::Udp(*v4.ip(), v4.port()),
            SocketAddr::V6(_) => {
                return Err(MediaError::Configuration(
                    "udp media requires an IPv4 bind address".into(),
                ));
            }
        };
        debug!(name = %self.config.name, address = %local, "udp media bound");

        let socket = Arc::new(socket);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
        let port = self
            .mux
            .attach(AddressKind::Udp, local, outbound_tx)
            .await;
        self.port = Some(port);

        self.tasks.push(tokio::spawn(Self::write_loop(
            Arc::clone(&socket),
            outbound_rx,
            self.config.clone(),
        )));
        self.tasks.push(tokio::spawn(Self::read_loop(
            socket,
            self.mux.clone(),
            self.stop_tx.subscribe(),
            self.config.name.clone(),
        )));

        Ok(local)
    }

    /// Detach from the mux and stop the pumps.
    pub async fn stop(&mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(port) = self.port.take() {
            self.mux.detach(port).await;
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }

    async fn write_loop(
        socket: Arc<UdpSocket>,
        mut outbound: mpsc::Receiver<MediaFrame>,
        config: UdpConfig,
    ) {
        while let Some(frame) = outbound.recv().await {
            let target: SocketAddr = match frame.destination {
                Address::Udp(ip, port) => SocketAddrV4::new(ip, port).into(),
                Address::Broadcast => match config.broadcast_target {
                    Some(target) => target.into(),
                    None => {
                        trace!(name = %config.name, "dropping broadcast, no target configured");
                        continue;
                    }
                },
                other => {
                    trace!(name = %config.name, destination = %other, "dropping frame for foreign medium");
                    continue;
                }
            };
            if let Err(error) = socket.send_to(&frame.bytes, target).await {
                warn!(name = %config.name, %target, %error, "udp send failed");
            }
        }
    }

    async fn read_loop(
        socket: Arc<UdpSocket>,
        mux: LinkMultiplexer,
        mut stop_rx: watch::Receiver<bool>,
        name: String,
    ) {
        let mut buf = vec![0u8; UDP_RECV_BUFFER];
        loop {
            tokio::select! {
                result = socket.recv_from(&mut buf) => match result {
                    Ok((len, SocketAddr::V4(from))) => {
                        let remote = Address::Udp(*from.ip(), from.port());
                        mux.deliver(remote, &buf[..len]).await;
                    }
                    Ok((_, SocketAddr::V6(from))) => {
                        trace!(name = %name, %from, "ignoring IPv6 datagram");
                    }
                    Err(error) => {
                        // Transient by assumption; keep reading unless stopping.
                        warn!(name = %name, %error, "udp recv error");
                        if *stop_rx.borrow() {
                            break;
                        }
                    }
                },
                _ = stop_rx.changed() => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Protocol;

    #[tokio::test]
    async fn unicast_round_trip_through_muxes() {
        let mux_a = LinkMultiplexer::new();
        let mux_b = LinkMultiplexer::new();

        let mut media_a = UdpMedia::new(
            UdpConfig::new("udp-a", "127.0.0.1:0".parse().unwrap()),
            mux_a.clone(),
        );
        let mut media_b = UdpMedia::new(
            UdpConfig::new("udp-b", "127.0.0.1:0".parse().unwrap()),
            mux_b.clone(),
        );
        let addr_a = media_a.start().await.unwrap();
        let addr_b = media_b.start().await.unwrap();

        let socket_a = mux_a.open(Protocol::RoutingNeighbor).await;
        let mut socket_b = mux_b.open(Protocol::RoutingNeighbor).await;
        let mut rx_b = socket_b.take_receiver();

        socket_a.sender().send(addr_b, &[0xab, 0xcd]).await.unwrap();

        let frame = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            rx_b.recv(),
        )
        .await
        .expect("timed out waiting for datagram")
        .unwrap();
        assert_eq!(frame.payload, vec![0xab, 0xcd]);
        assert_eq!(frame.remote, addr_a);

        media_a.stop().await;
        media_b.stop().await;
    }

    #[tokio::test]
    async fn stop_retracts_local_address() {
        let mux = LinkMultiplexer::new();
        let mut media = UdpMedia::new(
            UdpConfig::new("udp-lifecycle", "127.0.0.1:0".parse().unwrap()),
            mux.clone(),
        );
        let local = media.start().await.unwrap();
        assert_eq!(mux.local_addresses().await, vec![local]);

        media.stop().await;
        assert!(mux.local_addresses().await.is_empty());
    }
}
