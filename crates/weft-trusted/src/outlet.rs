//! The datagram seam under the transport.
//!
//! A socket does not care how its frames reach the peer; anything that can
//! attempt a point-to-point datagram transmission works. Inbound datagrams
//! arrive on a plain channel supplied alongside the outlet, keeping the
//! trait object-safe and synchronous — a rejected send is a normal outcome
//! the socket retries on its own schedule.

use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::mpsc;

/// Capacity of the inbound datagram channel of a memory pair.
const MEMORY_QUEUE_DEPTH: usize = 64;

/// Raw-send failures. Distinct from datagram loss: a lost datagram looks
/// like a successful send that never gets acknowledged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutletError {
    /// The medium refused the datagram; worth retrying later.
    #[error("medium refused the datagram")]
    Rejected,

    /// The far endpoint is gone for good.
    #[error("peer endpoint is gone")]
    Disconnected,
}

/// One transmission attempt toward the connected peer.
pub trait DatagramOutlet: Send + Sync + 'static {
    fn send(&self, datagram: &[u8]) -> Result<(), OutletError>;
}

#[derive(Debug, Default)]
struct FaultPlan {
    drop_next: usize,
    refuse_next: usize,
    duplicate_next: usize,
}

/// Test control over one direction of a memory pair.
#[derive(Clone)]
pub struct FaultHandle {
    plan: Arc<Mutex<FaultPlan>>,
}

impl FaultHandle {
    /// Silently lose the next `count` datagrams (send still reports success).
    pub fn drop_next(&self, count: usize) {
        self.lock().drop_next += count;
    }

    /// Refuse the next `count` sends outright.
    pub fn refuse_next(&self, count: usize) {
        self.lock().refuse_next += count;
    }

    /// Deliver the next `count` datagrams twice.
    pub fn duplicate_next(&self, count: usize) {
        self.lock().duplicate_next += count;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FaultPlan> {
        self.plan.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// In-memory outlet delivering into the paired endpoint's inbound channel,
/// with injectable loss, refusal, and duplication.
pub struct MemoryOutlet {
    tx: mpsc::Sender<Vec<u8>>,
    plan: Arc<Mutex<FaultPlan>>,
}

impl DatagramOutlet for MemoryOutlet {
    fn send(&self, datagram: &[u8]) -> Result<(), OutletError> {
        let duplicate = {
            let mut plan = self.plan.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if plan.drop_next > 0 {
                plan.drop_next -= 1;
                return Ok(());
            }
            if plan.refuse_next > 0 {
                plan.refuse_next -= 1;
                return Err(OutletError::Rejected);
            }
            let duplicate = plan.duplicate_next > 0;
            if duplicate {
                plan.duplicate_next -= 1;
            }
            duplicate
        };
        self.deliver(datagram)?;
        if duplicate {
            self.deliver(datagram)?;
        }
        Ok(())
    }
}

impl MemoryOutlet {
    fn deliver(&self, datagram: &[u8]) -> Result<(), OutletError> {
        self.tx.try_send(datagram.to_vec()).map_err(|error| match error {
            mpsc::error::TrySendError::Full(_) => OutletError::Rejected,
            mpsc::error::TrySendError::Closed(_) => OutletError::Disconnected,
        })
    }
}

/// One end of a [`memory_pair`].
pub struct MemoryPairSide {
    pub outlet: Arc<MemoryOutlet>,
    pub inbound: mpsc::Receiver<Vec<u8>>,
    pub faults: FaultHandle,
}

/// Two connected in-memory endpoints. Each side's faults shape its own
/// outgoing datagrams.
#[must_use]
pub fn memory_pair() -> (MemoryPairSide, MemoryPairSide) {
    let (a_tx, a_rx) = mpsc::channel(MEMORY_QUEUE_DEPTH);
    let (b_tx, b_rx) = mpsc::channel(MEMORY_QUEUE_DEPTH);
    let side = |tx, inbound| {
        let plan = Arc::new(Mutex::new(FaultPlan::default()));
        MemoryPairSide {
            outlet: Arc::new(MemoryOutlet { tx, plan: Arc::clone(&plan) }),
            inbound,
            faults: FaultHandle { plan },
        }
    };
    (side(b_tx, a_rx), side(a_tx, b_rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pair_delivers_in_both_directions() {
        let (a, mut b) = memory_pair();
        a.outlet.send(b"ping").unwrap();
        assert_eq!(b.inbound.recv().await, Some(b"ping".to_vec()));

        b.outlet.send(b"pong").unwrap();
        let mut a = a;
        assert_eq!(a.inbound.recv().await, Some(b"pong".to_vec()));
    }

    #[tokio::test]
    async fn faults_shape_outgoing_traffic() {
        let (a, mut b) = memory_pair();
        a.faults.drop_next(1);
        a.faults.refuse_next(1);
        a.faults.duplicate_next(1);

        a.outlet.send(b"lost").unwrap();
        assert_eq!(a.outlet.send(b"refused"), Err(OutletError::Rejected));
        a.outlet.send(b"twice").unwrap();
        a.outlet.send(b"once").unwrap();

        assert_eq!(b.inbound.recv().await, Some(b"twice".to_vec()));
        assert_eq!(b.inbound.recv().await, Some(b"twice".to_vec()));
        assert_eq!(b.inbound.recv().await, Some(b"once".to_vec()));
    }

    #[tokio::test]
    async fn dropped_receiver_disconnects_the_outlet() {
        let (a, b) = memory_pair();
        drop(b.inbound);
        assert_eq!(a.outlet.send(b"ping"), Err(OutletError::Disconnected));
    }
}
