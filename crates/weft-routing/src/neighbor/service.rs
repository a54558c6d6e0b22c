//! The neighbor service: Hello/Goodbye handling on top of the table.

use tokio::sync::mpsc;
use tokio::time;
use tracing::{debug, trace, warn};
use weft_core::{Address, Cost, Decode, Encode, NodeId};
use weft_link::{LinkFrame, LinkSender, LinkSocket};

use crate::error::NeighborSendError;
use crate::local::LocalNode;

use super::frame::NeighborFrame;
use super::table::{NeighborTable, NeighborTimers};

/// Runs the liveness exchange for one node.
///
/// Owns the neighbor-protocol link socket: decodes inbound frames, updates
/// the table, answers Hellos, and sends keepalives when a neighbor's
/// send-hello timer runs out.
#[derive(Clone)]
pub struct NeighborService {
    table: NeighborTable,
    local: LocalNode,
    sender: LinkSender,
}

impl NeighborService {
    /// Spawn the service over an opened neighbor-protocol socket.
    pub fn start(mut socket: LinkSocket, local: LocalNode, timers: NeighborTimers) -> Self {
        let receiver = socket.take_receiver();
        let sender = socket.sender();
        let (table, hello_due) = NeighborTable::new(timers);
        let service = Self { table, local, sender };

        {
            // The local entry can only exist once identity resolves.
            let service = service.clone();
            tokio::spawn(async move {
                let info = service.local.info().await;
                service.table.mark_local(info.id).await;
            });
        }
        {
            let service = service.clone();
            tokio::spawn(service.clone().recv_loop(receiver));
            tokio::spawn(service.keepalive_loop(hello_due));
        }
        service
    }

    /// The table this service maintains.
    #[must_use]
    pub fn table(&self) -> NeighborTable {
        self.table.clone()
    }

    /// Introduce ourselves on a link. `link_cost` is the provisioned cost
    /// of that link; the peer will echo it back in its HelloAck.
    pub async fn send_hello(
        &self,
        destination: Address,
        link_cost: Cost,
    ) -> Result<(), NeighborSendError> {
        let info = self.local.info().await;
        let frame = NeighborFrame::Hello {
            sender: info.id,
            node_cost: info.cost,
            link_cost,
        };
        self.sender.send(destination, &frame.encode_to_vec()).await?;
        self.table.touch_send_hello(NodeId::from(destination)).await;
        Ok(())
    }

    /// Leave a neighbor: remove it locally and tell it we are gone. The
    /// local removal happens regardless of whether the farewell frame can
    /// be delivered.
    pub async fn send_goodbye(&self, id: NodeId) -> Result<(), NeighborSendError> {
        let addresses = self.table.resolve_addresses(id).await;
        self.table.remove(id).await;

        let Some(address) = addresses.first().copied() else {
            return Err(NeighborSendError::Unreachable { id });
        };
        let info = self.local.info().await;
        let frame = NeighborFrame::Goodbye { sender: info.id };
        self.sender.send(address, &frame.encode_to_vec()).await?;
        Ok(())
    }

    async fn recv_loop(self, mut receiver: mpsc::Receiver<LinkFrame>) {
        while let Some(frame) = receiver.recv().await {
            // Handle each frame on its own task so the per-frame simulated
            // transmission delay does not stall the socket.
            tokio::spawn(self.clone().handle_frame(frame));
        }
    }

    async fn handle_frame(self, frame: LinkFrame) {
        let decoded = match NeighborFrame::decode_exact(&frame.payload) {
            Ok(decoded) => decoded,
            Err(error) => {
                trace!(remote = %frame.remote, %error, "dropping malformed neighbor frame");
                return;
            }
        };
        let info = self.local.info().await;
        let peer = decoded.sender();
        if peer == info.id {
            return;
        }

        // Cost models transmission latency in simulation; one unit is one
        // millisecond spent "on the wire" before the frame is processed.
        let link_cost = match decoded {
            NeighborFrame::Hello { link_cost, .. }
            | NeighborFrame::HelloAck { link_cost, .. } => link_cost,
            NeighborFrame::Goodbye { .. } => {
                self.table.cost(peer).await.unwrap_or(Cost::ZERO)
            }
        };
        time::sleep(link_cost.saturating_add(info.cost).as_delay()).await;

        match decoded {
            NeighborFrame::Hello { link_cost, .. } => {
                self.table.add_or_refresh(peer, link_cost, frame.remote).await;
                self.table.touch_expiration(peer).await;

                let ack = NeighborFrame::HelloAck {
                    sender: info.id,
                    node_cost: info.cost,
                    link_cost,
                };
                match self.sender.send(frame.remote, &ack.encode_to_vec()).await {
                    Ok(()) => self.table.touch_send_hello(peer).await,
                    Err(error) => {
                        warn!(%peer, %error, "failed to answer hello");
                    }
                }
            }
            // A HelloAck is never answered; that asymmetry is what keeps
            // the exchange from ping-ponging.
            NeighborFrame::HelloAck { link_cost, .. } => {
                self.table.add_or_refresh(peer, link_cost, frame.remote).await;
                self.table.touch_expiration(peer).await;
            }
            NeighborFrame::Goodbye { .. } => {
                debug!(%peer, "goodbye received");
                self.table.remove(peer).await;
            }
        }
    }

    async fn keepalive_loop(self, mut hello_due: mpsc::Receiver<NodeId>) {
        while let Some(id) = hello_due.recv().await {
            let Some(link_cost) = self.table.cost(id).await else {
                continue;
            };
            let addresses = self.table.resolve_addresses(id).await;
            let Some(address) = addresses.first().copied() else {
                continue;
            };
            let info = self.local.info().await;
            let frame = NeighborFrame::Hello {
                sender: info.id,
                node_cost: info.cost,
                link_cost,
            };
            match self.sender.send(address, &frame.encode_to_vec()).await {
                Ok(()) => self.table.touch_send_hello(id).await,
                Err(error) => trace!(%id, %error, "keepalive send failed"),
            }
        }
    }
}
