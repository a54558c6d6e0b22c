//! Pure socket state machine.
//!
//! Three orthogonal concerns share one struct: the handshake exchange
//! (`Syn`/`SynAck`), the teardown exchange (`Fin`/`FinAck`, structurally
//! identical), and the single-in-flight data window (`Data`/`DataAck`).
//! Every input returns a list of [`SocketAction`]s for the driver to carry
//! out; the machine itself never touches a clock or a wire, which is what
//! makes the retry ladders testable step by step.
//!
//! Retransmission is two nested ladders. Each transmission attempt has a
//! raw-send budget: a refused send is retried after a fixed interval until
//! the budget runs out. Each ack-expecting frame additionally has an
//! ack-timeout budget: once a send attempt succeeds, an ack timer starts,
//! and expiry triggers a fresh transmission attempt (with a full raw-send
//! budget) until that budget runs out too. Exhausting either ladder for a
//! `Syn`, `Fin` or `Data` frame kills the socket; acks are repaired by the
//! peer's retransmissions instead, so their exhaustion is silent.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use weft_core::SequenceNumber;

use crate::constants::{ACK_TIMEOUT, RETRY_COUNT, RETRY_INTERVAL};
use crate::error::SocketError;
use crate::frame::FrameBody;

/// Externally observable socket lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketStatus {
    Closed,
    Opening,
    Open,
    Closing,
}

impl fmt::Display for SocketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketStatus::Closed => f.write_str("closed"),
            SocketStatus::Opening => f.write_str("opening"),
            SocketStatus::Open => f.write_str("open"),
            SocketStatus::Closing => f.write_str("closing"),
        }
    }
}

/// A frame transmission with its remaining budgets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSend {
    pub body: FrameBody,
    /// Raw-send attempts left, counting the next one.
    pub send_budget: u8,
    /// Ack-timeout retransmissions left, counting the current attempt.
    pub ack_budget: u8,
}

impl PendingSend {
    fn fresh(body: FrameBody) -> Self {
        Self { body, send_budget: RETRY_COUNT, ack_budget: RETRY_COUNT }
    }
}

/// Something the driver must do on the machine's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketAction {
    /// The external status changed; publish it.
    StatusChanged(SocketStatus),
    /// Hand a received payload to the application.
    Deliver(Vec<u8>),
    /// Attempt a frame transmission, then report back via
    /// [`SocketState::on_sent`] or [`SocketState::on_send_failed`].
    Send(PendingSend),
    /// Re-inject `action` through [`SocketState::on_deferred`] after the
    /// duration elapses.
    Delay { duration: Duration, action: DeferredAction },
    /// The in-flight data frame with this sequence number was acknowledged.
    Delivered(SequenceNumber),
    /// The socket tore itself down; fail everything still waiting on it.
    Failed(SocketError),
}

/// A time-delayed continuation. Both variants consult the machine when
/// they fire, so an ack that arrives in the meantime makes them no-ops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredAction {
    /// Retry a refused raw send.
    Retry(PendingSend),
    /// The ack window for this attempt expired.
    AckTimeout(PendingSend),
}

/// Our half of a two-way control exchange (handshake or teardown).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outgoing {
    Idle,
    Sent,
    Acked,
}

/// The peer's half, tracked through our ack back to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Incoming {
    Idle,
    Received,
    Acked,
}

#[derive(Debug, Clone, Copy)]
struct Exchange {
    outgoing: Outgoing,
    incoming: Incoming,
}

impl Exchange {
    const IDLE: Exchange = Exchange { outgoing: Outgoing::Idle, incoming: Incoming::Idle };

    fn started(&self) -> bool {
        self.outgoing != Outgoing::Idle || self.incoming != Incoming::Idle
    }

    fn complete(&self) -> bool {
        self.outgoing == Outgoing::Acked && self.incoming == Incoming::Acked
    }
}

/// The per-socket machine. See the module docs for the overall shape.
#[derive(Debug)]
pub struct SocketState {
    syn: Exchange,
    fin: Exchange,
    failed: Option<SocketError>,
    next_tx_seq: SequenceNumber,
    in_flight: Option<(SequenceNumber, Vec<u8>)>,
    queued: VecDeque<(SequenceNumber, Vec<u8>)>,
    expected_rx_seq: SequenceNumber,
    last_status: SocketStatus,
}

impl Default for SocketState {
    fn default() -> Self {
        Self::new()
    }
}

impl SocketState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            syn: Exchange::IDLE,
            fin: Exchange::IDLE,
            failed: None,
            next_tx_seq: SequenceNumber::ZERO,
            in_flight: None,
            queued: VecDeque::new(),
            expected_rx_seq: SequenceNumber::ZERO,
            last_status: SocketStatus::Closed,
        }
    }

    #[must_use]
    pub fn status(&self) -> SocketStatus {
        self.current_status()
    }

    /// Whether the socket has reached its final state (teardown complete
    /// or failure) and the driver can stop.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.failed.is_some() || self.fin.complete()
    }

    /// Begin an active open.
    pub fn connect(&mut self) -> Vec<SocketAction> {
        let mut out = Vec::new();
        if self.failed.is_none() && self.syn.outgoing == Outgoing::Idle {
            self.syn.outgoing = Outgoing::Sent;
            out.push(SocketAction::Send(PendingSend::fresh(FrameBody::Syn)));
            self.push_status(&mut out);
        }
        out
    }

    /// Begin teardown. Only valid while fully open.
    pub fn close(&mut self) -> Option<Vec<SocketAction>> {
        if self.current_status() != SocketStatus::Open {
            return None;
        }
        let mut out = Vec::new();
        self.fin.outgoing = Outgoing::Sent;
        out.push(SocketAction::Send(PendingSend::fresh(FrameBody::Fin)));
        self.push_status(&mut out);
        Some(out)
    }

    /// Queue a payload for reliable delivery. Returns the sequence number
    /// it will travel under, or `None` when the socket is not open.
    pub fn send_data(
        &mut self,
        payload: Vec<u8>,
    ) -> Option<(SequenceNumber, Vec<SocketAction>)> {
        if self.current_status() != SocketStatus::Open {
            return None;
        }
        let seq = self.next_tx_seq;
        self.next_tx_seq = seq.next();
        if self.in_flight.is_none() {
            self.in_flight = Some((seq, payload.clone()));
            let send =
                SocketAction::Send(PendingSend::fresh(FrameBody::Data { seq, payload }));
            Some((seq, vec![send]))
        } else {
            // One frame in flight at a time; the rest wait their turn.
            self.queued.push_back((seq, payload));
            Some((seq, Vec::new()))
        }
    }

    /// Feed one verified inbound frame through the machine.
    pub fn handle_frame(&mut self, body: FrameBody) -> Vec<SocketAction> {
        if self.failed.is_some() {
            return Vec::new();
        }
        match body {
            FrameBody::Syn => self.on_syn(),
            FrameBody::SynAck => self.on_syn_ack(),
            FrameBody::Fin => self.on_fin(),
            FrameBody::FinAck => self.on_fin_ack(),
            FrameBody::Data { seq, payload } => self.on_data(seq, payload),
            FrameBody::DataAck { seq } => self.on_data_ack(seq),
        }
    }

    fn on_syn(&mut self) -> Vec<SocketAction> {
        if self.fin.started() {
            return Vec::new();
        }
        let mut out = Vec::new();
        match self.syn.incoming {
            Incoming::Idle => {
                self.syn.incoming = Incoming::Received;
                out.push(SocketAction::Send(PendingSend::fresh(FrameBody::SynAck)));
                // A passive open answers with its own half of the
                // handshake immediately.
                if self.syn.outgoing == Outgoing::Idle {
                    self.syn.outgoing = Outgoing::Sent;
                    out.push(SocketAction::Send(PendingSend::fresh(FrameBody::Syn)));
                }
                self.push_status(&mut out);
            }
            // Duplicate: our ack was lost. Answer again.
            Incoming::Received | Incoming::Acked => {
                out.push(SocketAction::Send(PendingSend::fresh(FrameBody::SynAck)));
            }
        }
        out
    }

    fn on_syn_ack(&mut self) -> Vec<SocketAction> {
        let mut out = Vec::new();
        if self.syn.outgoing == Outgoing::Sent {
            self.syn.outgoing = Outgoing::Acked;
            self.push_status(&mut out);
        }
        out
    }

    fn on_fin(&mut self) -> Vec<SocketAction> {
        // Teardown presupposes an established handshake.
        if !self.syn.complete() {
            return Vec::new();
        }
        let mut out = Vec::new();
        match self.fin.incoming {
            Incoming::Idle => {
                self.fin.incoming = Incoming::Received;
                out.push(SocketAction::Send(PendingSend::fresh(FrameBody::FinAck)));
                // Mirror the close so the exchange completes without the
                // application on this side having to act.
                if self.fin.outgoing == Outgoing::Idle {
                    self.fin.outgoing = Outgoing::Sent;
                    out.push(SocketAction::Send(PendingSend::fresh(FrameBody::Fin)));
                }
                self.push_status(&mut out);
            }
            Incoming::Received | Incoming::Acked => {
                out.push(SocketAction::Send(PendingSend::fresh(FrameBody::FinAck)));
            }
        }
        out
    }

    fn on_fin_ack(&mut self) -> Vec<SocketAction> {
        let mut out = Vec::new();
        if self.fin.outgoing == Outgoing::Sent {
            self.fin.outgoing = Outgoing::Acked;
            self.push_status(&mut out);
        }
        out
    }

    fn on_data(&mut self, seq: SequenceNumber, payload: Vec<u8>) -> Vec<SocketAction> {
        if !self.syn.complete() {
            return Vec::new();
        }
        let mut out = Vec::new();
        if seq == self.expected_rx_seq {
            self.expected_rx_seq = seq.next();
            out.push(SocketAction::Deliver(payload));
            out.push(SocketAction::Send(PendingSend::fresh(FrameBody::DataAck { seq })));
        } else if seq < self.expected_rx_seq {
            // Already delivered; the peer must have missed our ack.
            out.push(SocketAction::Send(PendingSend::fresh(FrameBody::DataAck { seq })));
        }
        // A gap ahead of the expected number means an earlier frame is
        // still in retransmission. Dropping this copy is safe: the peer
        // sends one frame at a time, so it will come around again.
        out
    }

    fn on_data_ack(&mut self, seq: SequenceNumber) -> Vec<SocketAction> {
        let mut out = Vec::new();
        // Only the exact in-flight sequence number counts.
        if self.in_flight.as_ref().map(|(s, _)| *s) == Some(seq) {
            self.in_flight = None;
            out.push(SocketAction::Delivered(seq));
            if let Some((next_seq, payload)) = self.queued.pop_front() {
                self.in_flight = Some((next_seq, payload.clone()));
                out.push(SocketAction::Send(PendingSend::fresh(FrameBody::Data {
                    seq: next_seq,
                    payload,
                })));
            }
        }
        out
    }

    /// A raw send attempt succeeded.
    ///
    /// Only ack-expecting kinds start an ack timer here; the ack kinds
    /// themselves carry the raw-send budget alone and are never
    /// retransmitted on a timer. A lost ack is repaired when the peer
    /// retransmits and the duplicate gets re-acked.
    pub fn on_sent(&mut self, frame: PendingSend) -> Vec<SocketAction> {
        let mut out = Vec::new();
        match frame.body {
            // Our ack is on the wire; that completes the peer's half.
            FrameBody::SynAck => {
                self.syn.incoming = Incoming::Acked;
                self.push_status(&mut out);
            }
            FrameBody::FinAck => {
                self.fin.incoming = Incoming::Acked;
                self.push_status(&mut out);
            }
            _ => {}
        }
        if frame.body.expects_ack() {
            out.push(SocketAction::Delay {
                duration: ACK_TIMEOUT,
                action: DeferredAction::AckTimeout(frame),
            });
        }
        out
    }

    /// A raw send attempt was refused by the outlet.
    pub fn on_send_failed(&mut self, frame: PendingSend) -> Vec<SocketAction> {
        if self.failed.is_some() {
            return Vec::new();
        }
        if frame.send_budget > 1 {
            return vec![SocketAction::Delay {
                duration: RETRY_INTERVAL,
                action: DeferredAction::Retry(PendingSend {
                    send_budget: frame.send_budget - 1,
                    ..frame
                }),
            }];
        }
        if frame.body.expects_ack() {
            self.fail(frame.body.kind_name())
        } else {
            Vec::new()
        }
    }

    /// A deferred continuation fired.
    pub fn on_deferred(&mut self, action: DeferredAction) -> Vec<SocketAction> {
        if self.failed.is_some() {
            return Vec::new();
        }
        match action {
            DeferredAction::Retry(frame) => vec![SocketAction::Send(frame)],
            DeferredAction::AckTimeout(frame) => self.on_ack_timeout(frame),
        }
    }

    fn on_ack_timeout(&mut self, frame: PendingSend) -> Vec<SocketAction> {
        let outstanding = match &frame.body {
            FrameBody::Syn => self.syn.outgoing == Outgoing::Sent,
            FrameBody::Fin => self.fin.outgoing == Outgoing::Sent,
            FrameBody::Data { seq, .. } => {
                self.in_flight.as_ref().map(|(s, _)| s) == Some(seq)
            }
            _ => false,
        };
        if !outstanding {
            return Vec::new();
        }
        if frame.ack_budget > 1 {
            // Retransmit with a full raw-send budget for the new attempt.
            vec![SocketAction::Send(PendingSend {
                body: frame.body,
                send_budget: RETRY_COUNT,
                ack_budget: frame.ack_budget - 1,
            })]
        } else {
            self.fail(frame.body.kind_name())
        }
    }

    fn fail(&mut self, kind: &'static str) -> Vec<SocketAction> {
        let error = SocketError::RetriesExhausted { kind };
        self.failed = Some(error.clone());
        let mut out = vec![SocketAction::Failed(error)];
        self.push_status(&mut out);
        out
    }

    fn current_status(&self) -> SocketStatus {
        if self.failed.is_some() {
            return SocketStatus::Closed;
        }
        if self.fin.complete() {
            SocketStatus::Closed
        } else if self.fin.started() {
            SocketStatus::Closing
        } else if self.syn.complete() {
            SocketStatus::Open
        } else if self.syn.started() {
            SocketStatus::Opening
        } else {
            SocketStatus::Closed
        }
    }

    fn push_status(&mut self, out: &mut Vec<SocketAction>) {
        let status = self.current_status();
        if status != self.last_status {
            self.last_status = status;
            out.push(SocketAction::StatusChanged(status));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sent_bodies(actions: &[SocketAction]) -> Vec<&FrameBody> {
        actions
            .iter()
            .filter_map(|action| match action {
                SocketAction::Send(frame) => Some(&frame.body),
                _ => None,
            })
            .collect()
    }

    /// Run every `Send` through a perfectly reliable outlet, feeding
    /// `on_sent` results back until the action list settles. Delays are
    /// collected for the caller to fire by hand.
    fn drain_sends(state: &mut SocketState, actions: Vec<SocketAction>) -> Vec<SocketAction> {
        let mut queue: VecDeque<SocketAction> = actions.into();
        let mut rest = Vec::new();
        while let Some(action) = queue.pop_front() {
            match action {
                SocketAction::Send(frame) => queue.extend(state.on_sent(frame)),
                other => rest.push(other),
            }
        }
        rest
    }

    /// Drive two machines through a complete handshake over a lossless
    /// wire, exchanging every emitted frame.
    fn open_pair() -> (SocketState, SocketState) {
        let mut client = SocketState::new();
        let mut server = SocketState::new();
        let mut from_client: VecDeque<FrameBody> = VecDeque::new();
        let mut from_server: VecDeque<FrameBody> = VecDeque::new();

        let mut pump = |state: &mut SocketState,
                        inbox: &mut VecDeque<FrameBody>,
                        outbox: &mut VecDeque<FrameBody>| {
            while let Some(body) = inbox.pop_front() {
                let mut queue: VecDeque<SocketAction> = state.handle_frame(body).into();
                while let Some(action) = queue.pop_front() {
                    if let SocketAction::Send(frame) = action {
                        outbox.push_back(frame.body.clone());
                        queue.extend(state.on_sent(frame));
                    }
                }
            }
        };

        let mut queue: VecDeque<SocketAction> = client.connect().into();
        while let Some(action) = queue.pop_front() {
            if let SocketAction::Send(frame) = action {
                from_client.push_back(frame.body.clone());
                queue.extend(client.on_sent(frame));
            }
        }
        while !from_client.is_empty() || !from_server.is_empty() {
            pump(&mut server, &mut from_client, &mut from_server);
            pump(&mut client, &mut from_server, &mut from_client);
        }

        assert_eq!(client.status(), SocketStatus::Open);
        assert_eq!(server.status(), SocketStatus::Open);
        (client, server)
    }

    #[test]
    fn connect_sends_syn_and_reports_opening() {
        let mut state = SocketState::new();
        let actions = state.connect();
        assert_eq!(sent_bodies(&actions), vec![&FrameBody::Syn]);
        assert!(actions.contains(&SocketAction::StatusChanged(SocketStatus::Opening)));
        assert_eq!(state.status(), SocketStatus::Opening);
    }

    #[test]
    fn passive_open_answers_with_syn_ack_and_own_syn() {
        let mut state = SocketState::new();
        let actions = state.handle_frame(FrameBody::Syn);
        assert_eq!(sent_bodies(&actions), vec![&FrameBody::SynAck, &FrameBody::Syn]);
        assert_eq!(state.status(), SocketStatus::Opening);
    }

    #[test]
    fn handshake_opens_both_ends() {
        open_pair();
    }

    #[test]
    fn duplicate_syn_is_answered_again() {
        let (_, mut server) = open_pair();
        let actions = server.handle_frame(FrameBody::Syn);
        assert_eq!(sent_bodies(&actions), vec![&FrameBody::SynAck]);
        assert_eq!(server.status(), SocketStatus::Open);
    }

    #[test]
    fn data_is_delivered_in_order_and_acked() {
        let (_, mut server) = open_pair();
        let actions = server.handle_frame(FrameBody::Data {
            seq: SequenceNumber::ZERO,
            payload: b"one".to_vec(),
        });
        assert!(actions.contains(&SocketAction::Deliver(b"one".to_vec())));
        assert_eq!(
            sent_bodies(&actions),
            vec![&FrameBody::DataAck { seq: SequenceNumber::ZERO }]
        );
    }

    #[test]
    fn stale_data_is_reacked_but_not_redelivered() {
        let (_, mut server) = open_pair();
        let first = FrameBody::Data { seq: SequenceNumber::ZERO, payload: b"one".to_vec() };
        let _ = server.handle_frame(first.clone());

        let actions = server.handle_frame(first);
        assert!(!actions.iter().any(|a| matches!(a, SocketAction::Deliver(_))));
        assert_eq!(
            sent_bodies(&actions),
            vec![&FrameBody::DataAck { seq: SequenceNumber::ZERO }]
        );
    }

    #[test]
    fn future_data_is_dropped_silently() {
        let (_, mut server) = open_pair();
        let actions = server.handle_frame(FrameBody::Data {
            seq: SequenceNumber::new(3),
            payload: b"early".to_vec(),
        });
        assert!(actions.is_empty());
    }

    #[test]
    fn data_before_handshake_is_ignored() {
        let mut state = SocketState::new();
        let actions = state.handle_frame(FrameBody::Data {
            seq: SequenceNumber::ZERO,
            payload: b"rogue".to_vec(),
        });
        assert!(actions.is_empty());
    }

    #[test]
    fn only_one_data_frame_is_in_flight() {
        let (mut client, _) = open_pair();
        let (seq_a, first) = client.send_data(b"one".to_vec()).unwrap();
        assert_eq!(sent_bodies(&first).len(), 1);

        let (seq_b, second) = client.send_data(b"two".to_vec()).unwrap();
        assert!(second.is_empty(), "second payload must wait for the first ack");

        let actions = client.handle_frame(FrameBody::DataAck { seq: seq_a });
        assert!(actions.contains(&SocketAction::Delivered(seq_a)));
        assert_eq!(
            sent_bodies(&actions),
            vec![&FrameBody::Data { seq: seq_b, payload: b"two".to_vec() }]
        );
    }

    #[test]
    fn mismatched_data_ack_is_ignored() {
        let (mut client, _) = open_pair();
        let (seq, _) = client.send_data(b"one".to_vec()).unwrap();
        let actions = client.handle_frame(FrameBody::DataAck { seq: seq.next() });
        assert!(actions.is_empty());
    }

    #[test]
    fn send_requires_an_open_socket() {
        let mut state = SocketState::new();
        assert!(state.send_data(b"nope".to_vec()).is_none());
        let _ = state.connect();
        assert!(state.send_data(b"still not".to_vec()).is_none());
    }

    #[test]
    fn refused_send_schedules_a_retry_with_reduced_budget() {
        let mut state = SocketState::new();
        let mut actions = state.connect();
        let SocketAction::Send(frame) = actions.remove(0) else {
            panic!("expected a send");
        };

        let followups = state.on_send_failed(frame);
        let [SocketAction::Delay { duration, action }] = followups.as_slice() else {
            panic!("expected a single delay, got {followups:?}");
        };
        assert_eq!(*duration, RETRY_INTERVAL);
        let DeferredAction::Retry(retry) = action else {
            panic!("expected a retry");
        };
        assert_eq!(retry.send_budget, RETRY_COUNT - 1);
        assert_eq!(retry.ack_budget, RETRY_COUNT);
    }

    #[test]
    fn exhausted_raw_send_budget_fails_the_socket() {
        let mut state = SocketState::new();
        let mut actions = state.connect();
        let SocketAction::Send(mut frame) = actions.remove(0) else {
            panic!("expected a send");
        };

        frame.send_budget = 1;
        let followups = state.on_send_failed(frame);
        assert!(followups.contains(&SocketAction::Failed(SocketError::RetriesExhausted {
            kind: "syn",
        })));
        assert!(followups.contains(&SocketAction::StatusChanged(SocketStatus::Closed)));
        assert!(state.is_terminal());
    }

    #[test]
    fn exhausted_ack_send_budget_gives_up_silently() {
        let (_, mut server) = open_pair();
        let mut actions = server.handle_frame(FrameBody::Data {
            seq: SequenceNumber::ZERO,
            payload: b"one".to_vec(),
        });
        let SocketAction::Send(mut ack) = actions.remove(1) else {
            panic!("expected the ack send");
        };

        ack.send_budget = 1;
        assert!(server.on_send_failed(ack).is_empty());
        assert_eq!(server.status(), SocketStatus::Open);
    }

    #[test]
    fn sent_acks_never_start_an_ack_timer() {
        let (_, mut server) = open_pair();
        let actions = server.on_sent(PendingSend::fresh(FrameBody::DataAck {
            seq: SequenceNumber::ZERO,
        }));
        assert!(!actions.iter().any(|a| matches!(a, SocketAction::Delay { .. })));

        let actions = server.on_sent(PendingSend::fresh(FrameBody::Data {
            seq: SequenceNumber::ZERO,
            payload: b"timed".to_vec(),
        }));
        assert!(actions.iter().any(|a| matches!(
            a,
            SocketAction::Delay { action: DeferredAction::AckTimeout(_), .. }
        )));
    }

    #[test]
    fn ack_timeout_retransmits_with_fresh_raw_budget() {
        let mut state = SocketState::new();
        let actions = state.connect();
        let rest = drain_sends(&mut state, actions);
        let delay = rest
            .iter()
            .find_map(|a| match a {
                SocketAction::Delay { duration, action } => Some((duration, action.clone())),
                _ => None,
            })
            .unwrap();
        assert_eq!(*delay.0, ACK_TIMEOUT);

        let followups = state.on_deferred(delay.1);
        let [SocketAction::Send(retransmit)] = followups.as_slice() else {
            panic!("expected a retransmission, got {followups:?}");
        };
        assert_eq!(retransmit.body, FrameBody::Syn);
        assert_eq!(retransmit.send_budget, RETRY_COUNT);
        assert_eq!(retransmit.ack_budget, RETRY_COUNT - 1);
    }

    #[test]
    fn ack_timeout_after_the_ack_arrived_is_a_noop() {
        let mut state = SocketState::new();
        let actions = state.connect();
        let rest = drain_sends(&mut state, actions);
        let deferred = rest
            .iter()
            .find_map(|a| match a {
                SocketAction::Delay { action, .. } => Some(action.clone()),
                _ => None,
            })
            .unwrap();

        let _ = state.handle_frame(FrameBody::SynAck);
        assert!(state.on_deferred(deferred).is_empty());
    }

    #[test]
    fn exhausted_ack_timeout_budget_fails_the_socket() {
        let mut state = SocketState::new();
        let actions = state.connect();
        let rest = drain_sends(&mut state, actions);
        let DeferredAction::AckTimeout(mut frame) = rest
            .iter()
            .find_map(|a| match a {
                SocketAction::Delay { action, .. } => Some(action.clone()),
                _ => None,
            })
            .unwrap()
        else {
            panic!("expected an ack timeout");
        };

        frame.ack_budget = 1;
        let followups = state.on_deferred(DeferredAction::AckTimeout(frame));
        assert!(followups.contains(&SocketAction::Failed(SocketError::RetriesExhausted {
            kind: "syn",
        })));
        assert_eq!(state.status(), SocketStatus::Closed);
    }

    #[test]
    fn close_requires_an_open_socket() {
        let mut state = SocketState::new();
        assert!(state.close().is_none());
        let _ = state.connect();
        assert!(state.close().is_none());
    }

    #[test]
    fn teardown_mirrors_the_handshake() {
        let (mut client, mut server) = open_pair();

        let actions = client.close().unwrap();
        assert_eq!(sent_bodies(&actions), vec![&FrameBody::Fin]);
        assert_eq!(client.status(), SocketStatus::Closing);

        // The peer acks and mirrors the close without being asked.
        let actions = server.handle_frame(FrameBody::Fin);
        assert_eq!(sent_bodies(&actions), vec![&FrameBody::FinAck, &FrameBody::Fin]);
        assert_eq!(server.status(), SocketStatus::Closing);

        let _ = drain_sends(&mut server, actions);
        let _ = client.handle_frame(FrameBody::FinAck);
        let actions = client.handle_frame(FrameBody::Fin);
        let rest = drain_sends(&mut client, actions);
        assert!(rest.contains(&SocketAction::StatusChanged(SocketStatus::Closed)));
        assert!(client.is_terminal());

        let _ = server.handle_frame(FrameBody::FinAck);
        assert!(server.is_terminal());
    }

    #[test]
    fn fin_before_handshake_is_ignored() {
        let mut state = SocketState::new();
        assert!(state.handle_frame(FrameBody::Fin).is_empty());
        assert_eq!(state.status(), SocketStatus::Closed);
    }
}
