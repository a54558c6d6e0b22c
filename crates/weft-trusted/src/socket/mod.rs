//! Async socket driver.
//!
//! One spawned task per socket owns the [`state::SocketState`] machine and
//! executes its actions: frames go out through the [`DatagramOutlet`],
//! inbound datagrams are verified against the connection's pseudo-header,
//! and deferred continuations come back through a timer channel. The
//! [`TrustedSocket`] handle talks to the task over a command channel and
//! observes its lifecycle through a watch channel.

pub mod state;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time;
use tracing::{debug, trace, warn};
use weft_core::SequenceNumber;

use crate::constants::HANDSHAKE_TIMEOUT;
use crate::error::{AcceptError, CloseError, ConnectError, SendError};
use crate::frame::{FrameBody, PseudoHeader, TrustedFrame};
use crate::outlet::DatagramOutlet;

pub use state::{DeferredAction, PendingSend, SocketAction, SocketState, SocketStatus};

const COMMAND_QUEUE_DEPTH: usize = 16;
const DELIVERY_QUEUE_DEPTH: usize = 64;

enum Command {
    Send { payload: Vec<u8>, done: oneshot::Sender<Result<(), SendError>> },
    Close { done: oneshot::Sender<Result<(), CloseError>> },
}

/// A reliable, ordered byte-frame connection to one peer endpoint.
pub struct TrustedSocket {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<SocketStatus>,
    delivery: Option<mpsc::Receiver<Vec<u8>>>,
}

impl TrustedSocket {
    /// Actively open a connection: send `Syn` and wait for the handshake
    /// to complete.
    pub async fn connect(
        outlet: Arc<dyn DatagramOutlet>,
        inbound: mpsc::Receiver<Vec<u8>>,
        pseudo: PseudoHeader,
    ) -> Result<TrustedSocket, ConnectError> {
        let socket = Self::spawn(outlet, inbound, pseudo, None);
        let mut status = socket.status.clone();
        let opened = time::timeout(HANDSHAKE_TIMEOUT, wait_for_open(&mut status)).await;
        match opened {
            Ok(true) => Ok(socket),
            _ => Err(ConnectError::Timeout),
        }
    }

    /// Passively open a connection: wait for a valid `Syn`, answer it,
    /// and complete the handshake.
    pub async fn accept(
        outlet: Arc<dyn DatagramOutlet>,
        mut inbound: mpsc::Receiver<Vec<u8>>,
        pseudo: PseudoHeader,
    ) -> Result<TrustedSocket, AcceptError> {
        let first = time::timeout(HANDSHAKE_TIMEOUT, inbound.recv())
            .await
            .map_err(|_| AcceptError::Timeout)?
            .ok_or(AcceptError::Timeout)?;
        // Inbound frames carry the peer's view of the addressing.
        let body = TrustedFrame::open(&first, &pseudo.flipped())?;
        if body != FrameBody::Syn {
            return Err(AcceptError::UnexpectedFrame { kind: body.kind_name() });
        }

        let socket = Self::spawn(outlet, inbound, pseudo, Some(body));
        let mut status = socket.status.clone();
        let opened = time::timeout(HANDSHAKE_TIMEOUT, wait_for_open(&mut status)).await;
        match opened {
            Ok(true) => Ok(socket),
            _ => Err(AcceptError::Timeout),
        }
    }

    fn spawn(
        outlet: Arc<dyn DatagramOutlet>,
        inbound: mpsc::Receiver<Vec<u8>>,
        pseudo: PseudoHeader,
        first_frame: Option<FrameBody>,
    ) -> TrustedSocket {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let (delivery_tx, delivery_rx) = mpsc::channel(DELIVERY_QUEUE_DEPTH);
        let (status_tx, status_rx) = watch::channel(SocketStatus::Opening);
        let (deferred_tx, deferred_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);

        let driver = Driver {
            state: SocketState::new(),
            outlet,
            pseudo,
            inbound,
            commands: command_rx,
            deferred_tx,
            deferred_rx,
            status: status_tx,
            delivery: delivery_tx,
            pending_sends: HashMap::new(),
            pending_close: None,
        };
        tokio::spawn(driver.run(first_frame));

        TrustedSocket {
            commands: command_tx,
            status: status_rx,
            delivery: Some(delivery_rx),
        }
    }

    /// Reliably deliver one payload; resolves once the peer acknowledged
    /// it.
    pub async fn send(&self, payload: Vec<u8>) -> Result<(), SendError> {
        let (done, outcome) = oneshot::channel();
        self.commands
            .send(Command::Send { payload, done })
            .await
            .map_err(|_| SendError::InvalidOperation)?;
        outcome.await.map_err(|_| SendError::Timeout)?
    }

    /// Begin an orderly teardown; resolves once both directions closed.
    pub async fn close(&self) -> Result<(), CloseError> {
        let (done, outcome) = oneshot::channel();
        self.commands
            .send(Command::Close { done })
            .await
            .map_err(|_| CloseError::InvalidOperation)?;
        outcome.await.map_err(|_| CloseError::Timeout)?
    }

    /// Observe the socket lifecycle.
    #[must_use]
    pub fn status(&self) -> watch::Receiver<SocketStatus> {
        self.status.clone()
    }

    /// Take the single consumer end of received payloads.
    ///
    /// # Panics
    ///
    /// Panics when called twice; the stream has exactly one consumer.
    #[must_use]
    pub fn take_receiver(&mut self) -> mpsc::Receiver<Vec<u8>> {
        match self.delivery.take() {
            Some(receiver) => receiver,
            None => panic!("delivery receiver already taken"),
        }
    }
}

async fn wait_for_open(status: &mut watch::Receiver<SocketStatus>) -> bool {
    loop {
        match *status.borrow_and_update() {
            SocketStatus::Open => return true,
            SocketStatus::Closed => return false,
            SocketStatus::Opening | SocketStatus::Closing => {}
        }
        if status.changed().await.is_err() {
            return false;
        }
    }
}

struct Driver {
    state: SocketState,
    outlet: Arc<dyn DatagramOutlet>,
    pseudo: PseudoHeader,
    inbound: mpsc::Receiver<Vec<u8>>,
    commands: mpsc::Receiver<Command>,
    deferred_tx: mpsc::Sender<DeferredAction>,
    deferred_rx: mpsc::Receiver<DeferredAction>,
    status: watch::Sender<SocketStatus>,
    delivery: mpsc::Sender<Vec<u8>>,
    pending_sends: HashMap<SequenceNumber, oneshot::Sender<Result<(), SendError>>>,
    pending_close: Option<oneshot::Sender<Result<(), CloseError>>>,
}

impl Driver {
    async fn run(mut self, first_frame: Option<FrameBody>) {
        let initial = match first_frame {
            Some(body) => self.state.handle_frame(body),
            None => self.state.connect(),
        };
        self.execute(initial).await;

        let mut commands_open = true;
        while !self.state.is_terminal() {
            tokio::select! {
                maybe = self.inbound.recv() => match maybe {
                    Some(datagram) => self.handle_datagram(&datagram).await,
                    // The medium under us is gone; no frame can ever
                    // arrive again, so retransmitting is pointless.
                    None => break,
                },
                maybe = self.commands.recv(), if commands_open => match maybe {
                    Some(command) => self.handle_command(command).await,
                    None => commands_open = false,
                },
                Some(action) = self.deferred_rx.recv() => {
                    let actions = self.state.on_deferred(action);
                    self.execute(actions).await;
                }
            }
        }
        debug!(status = %self.state.status(), "socket driver stopping");
    }

    async fn handle_datagram(&mut self, datagram: &[u8]) {
        match TrustedFrame::open(datagram, &self.pseudo.flipped()) {
            Ok(body) => {
                trace!(kind = body.kind_name(), "frame received");
                let actions = self.state.handle_frame(body);
                self.execute(actions).await;
            }
            // Corruption is repaired by retransmission, not by us.
            Err(error) => trace!(%error, "dropping unverifiable datagram"),
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Send { payload, done } => match self.state.send_data(payload) {
                Some((seq, actions)) => {
                    self.pending_sends.insert(seq, done);
                    self.execute(actions).await;
                }
                None => {
                    let _ = done.send(Err(SendError::InvalidOperation));
                }
            },
            Command::Close { done } => match self.state.close() {
                Some(actions) => {
                    self.pending_close = Some(done);
                    self.execute(actions).await;
                }
                None => {
                    let _ = done.send(Err(CloseError::InvalidOperation));
                }
            },
        }
    }

    async fn execute(&mut self, actions: Vec<SocketAction>) {
        let mut queue: VecDeque<SocketAction> = actions.into();
        while let Some(action) = queue.pop_front() {
            match action {
                SocketAction::StatusChanged(status) => {
                    debug!(%status, "socket status changed");
                    let _ = self.status.send(status);
                    if status == SocketStatus::Closed {
                        if let Some(done) = self.pending_close.take() {
                            let _ = done.send(Ok(()));
                        }
                    }
                }
                SocketAction::Deliver(payload) => {
                    let _ = self.delivery.send(payload).await;
                }
                SocketAction::Send(frame) => {
                    let bytes = TrustedFrame::seal(&frame.body, &self.pseudo);
                    let followups = match self.outlet.send(&bytes) {
                        Ok(()) => {
                            trace!(kind = frame.body.kind_name(), "frame sent");
                            self.state.on_sent(frame)
                        }
                        Err(error) => {
                            debug!(
                                kind = frame.body.kind_name(),
                                %error,
                                budget = frame.send_budget,
                                "send refused"
                            );
                            self.state.on_send_failed(frame)
                        }
                    };
                    queue.extend(followups);
                }
                SocketAction::Delay { duration, action } => {
                    let deferred = self.deferred_tx.clone();
                    tokio::spawn(async move {
                        time::sleep(duration).await;
                        let _ = deferred.send(action).await;
                    });
                }
                SocketAction::Delivered(seq) => {
                    if let Some(done) = self.pending_sends.remove(&seq) {
                        let _ = done.send(Ok(()));
                    }
                }
                SocketAction::Failed(error) => {
                    warn!(%error, "socket failed");
                    for (_, done) in self.pending_sends.drain() {
                        let _ = done.send(Err(SendError::Timeout));
                    }
                    if let Some(done) = self.pending_close.take() {
                        let _ = done.send(Err(CloseError::Timeout));
                    }
                }
            }
        }
    }
}
