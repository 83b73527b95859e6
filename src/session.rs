//! The slot-scheduled stop-and-wait ARQ session engine.
//!
//! A session is tied to a [`SlotClock`] both peers agreed on during the
//! handshake. At any instant the clock says what the initiator is doing;
//! the follower swaps transmit and receive. Within its transmit slots a
//! peer chooses between sending fresh data, retransmitting its outstanding
//! packet, NACKing a silent receive slot, or tearing the session down after
//! too many consecutive silent slots.
//!
//! Sequence numbering is a 1-bit-style stop-and-wait scheme over 8-bit
//! wrapping counters: `sn` names the current transmission attempt and
//! `nesn` acknowledges the peer's last `sn` by naming the one expected
//! next. A received payload is held back and only handed to the pipe once
//! a later sequence number supersedes it, because the peer may retransmit
//! (and thereby replace) a payload the acknowledgement for which it missed.

use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::clock::{SlotClock, SlotKind};
use crate::pipe::MessagePipe;
use crate::radio::RadioPort;
use crate::types::{Payload, SequenceNumber, SessionId, MAX_PAYLOAD_LEN};
use crate::util::sleep_until;
use crate::wire::{SessionOp, SessionPacket};

/// Consecutive unanswered NACK slots tolerated before the session is
/// declared dead and torn down.
pub const TIMEOUT_LIMIT: u32 = 3;

/// Which side of the session this peer is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    /// Accepted the connection; transmits in the first slot of each period.
    Initiator,
    /// Requested the connection; receives first and swaps the clock's view.
    Follower,
}

/// The concrete action a session slot calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentAction {
    SleepUntilNextAction,
    Receive,
    TransmitNextMessage,
    RetransmitMessage,
    TransmitNack,
    TerminateSession,
    /// Terminal: the session is over and will do nothing further.
    SessionComplete,
}

/// Traffic accounting over the lifetime of one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub messages_sent: u64,
    pub retransmissions: u64,
    pub nacks_sent: u64,
    pub packets_received: u64,
    pub payloads_delivered: u64,
}

/// One half of a two-party chat session.
pub struct Session {
    id: SessionId,
    clock: SlotClock,
    role: SessionRole,
    last_recv_sn: SequenceNumber,
    last_acked_sent_sn: SequenceNumber,
    // Kept whole for retransmission.
    last_sent_packet: SessionPacket,
    // Held back until a newer sn supersedes it.
    last_recv_message: Payload,
    received_good_packet_in_last_receive_sequence: bool,
    timeout_counter: u32,
    session_complete: bool,
    stats: SessionStats,
}

impl Session {
    /// Create a session on a schedule agreed during the handshake.
    ///
    /// The fictitious initial sequence numbers differ by role; they prime
    /// the modular comparisons so that each side's first transmit slot
    /// sends fresh data once the first exchange completes.
    pub fn new(
        start_time: Instant,
        id: SessionId,
        transmit_duration: Duration,
        gap_duration: Duration,
        role: SessionRole,
    ) -> Self {
        let (last_acked_sent_sn, prior_nesn) = match role {
            SessionRole::Initiator => (SequenceNumber::MAX, SequenceNumber::MAX),
            SessionRole::Follower => (SequenceNumber::MAX.prev(), SequenceNumber::ZERO),
        };
        Self {
            id,
            clock: SlotClock::new(start_time, transmit_duration, gap_duration),
            role,
            last_recv_sn: SequenceNumber::MAX,
            last_acked_sent_sn,
            last_sent_packet: SessionPacket {
                session_id: id,
                op: SessionOp::Nack,
                length: 0,
                nesn: prior_nesn,
                sn: SequenceNumber::MAX,
                payload: [0u8; MAX_PAYLOAD_LEN],
            },
            last_recv_message: Payload::empty(),
            received_good_packet_in_last_receive_sequence: true,
            timeout_counter: 0,
            session_complete: false,
            stats: SessionStats::default(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn role(&self) -> SessionRole {
        self.role
    }

    pub fn is_complete(&self) -> bool {
        self.session_complete
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Block until the session's agreed start time.
    pub fn sleep_until_start_time(&self) {
        sleep_until(self.clock.start_time());
    }

    /// The action this session calls for right now.
    pub fn current_action(&self) -> AgentAction {
        self.action_for_slot(self.localize(self.clock.action_kind(Instant::now())))
    }

    /// Perform the action due now, sleep until the next action window
    /// opens, and return the action that window will call for.
    pub fn execute_current_action(
        &mut self,
        radio: &dyn RadioPort,
        pipe: &mut MessagePipe,
    ) -> AgentAction {
        match self.current_action() {
            AgentAction::Receive => self.receive(radio, pipe),
            AgentAction::TransmitNextMessage => self.transmit_next_message(radio, pipe),
            AgentAction::RetransmitMessage => self.retransmit_message(radio),
            AgentAction::TransmitNack => self.transmit_nack(radio),
            AgentAction::TerminateSession => self.terminate(),
            AgentAction::SleepUntilNextAction => {}
            AgentAction::SessionComplete => return AgentAction::SessionComplete,
        }
        self.sleep_through_gap_time()
    }

    /// Sleep until the next non-inactive slot boundary, pre-computing the
    /// action it will call for.
    fn sleep_through_gap_time(&self) -> AgentAction {
        let mut wake_time = self.clock.time_of_next_action(Instant::now());
        if self.localize(self.clock.action_kind(wake_time)) == SlotKind::Inactive {
            wake_time = self.clock.time_of_next_action(wake_time);
        }
        let next = self.action_for_slot(self.localize(self.clock.action_kind(wake_time)));
        // If the upcoming slot only called for more sleep we should have
        // slept past it in the first place.
        debug_assert_ne!(next, AgentAction::SleepUntilNextAction);
        sleep_until(wake_time);
        next
    }

    /// Map the initiator-perspective slot kind onto this peer's behaviour.
    fn localize(&self, kind: SlotKind) -> SlotKind {
        match self.role {
            SessionRole::Initiator => kind,
            SessionRole::Follower => match kind {
                SlotKind::Transmitting => SlotKind::Receiving,
                SlotKind::Receiving => SlotKind::Transmitting,
                SlotKind::Inactive => SlotKind::Inactive,
            },
        }
    }

    /// Decide what to do in a slot of the given localized kind, based on
    /// the ARQ state alone.
    fn action_for_slot(&self, local_kind: SlotKind) -> AgentAction {
        if self.session_complete {
            return AgentAction::SessionComplete;
        }
        match local_kind {
            SlotKind::Inactive => AgentAction::SleepUntilNextAction,
            SlotKind::Receiving => AgentAction::Receive,
            SlotKind::Transmitting => {
                // A silent receive slot means our last transmission may not
                // have arrived; NACK so the peer retransmits, up to a limit.
                if !self.received_good_packet_in_last_receive_sequence {
                    return if self.timeout_counter <= TIMEOUT_LIMIT {
                        AgentAction::TransmitNack
                    } else {
                        AgentAction::TerminateSession
                    };
                }
                if self.last_acked_sent_sn == self.last_sent_packet.sn {
                    AgentAction::TransmitNextMessage
                } else if self.last_acked_sent_sn.next() == self.last_sent_packet.sn {
                    AgentAction::RetransmitMessage
                } else {
                    panic!(
                        "ARQ state out of sync: acked {} vs outstanding {}",
                        self.last_acked_sent_sn, self.last_sent_packet.sn
                    );
                }
            }
        }
    }

    fn transmit_next_message(&mut self, radio: &dyn RadioPort, pipe: &mut MessagePipe) {
        let packet = &mut self.last_sent_packet;
        packet.session_id = self.id;
        packet.op = SessionOp::Data;
        packet.nesn = self.last_recv_sn.next();
        packet.sn = self.last_acked_sent_sn.next();
        match pipe.get_next_message_to_send() {
            Some(message) => {
                packet.length = message.len() as u8;
                packet.payload = *message.raw();
            }
            None => packet.length = 0,
        }

        trace!(
            session = %self.id,
            sn = %packet.sn,
            nesn = %packet.nesn,
            length = packet.length,
            "transmitting data packet"
        );
        if let Err(err) = radio.transmit(&self.last_sent_packet.serialize()) {
            warn!(session = %self.id, %err, "data transmit failed");
        }
        self.stats.messages_sent += 1;
    }

    fn retransmit_message(&mut self, radio: &dyn RadioPort) {
        trace!(
            session = %self.id,
            sn = %self.last_sent_packet.sn,
            nesn = %self.last_sent_packet.nesn,
            "retransmitting data packet"
        );
        if let Err(err) = radio.transmit(&self.last_sent_packet.serialize()) {
            warn!(session = %self.id, %err, "retransmit failed");
        }
        self.stats.retransmissions += 1;
    }

    fn transmit_nack(&mut self, radio: &dyn RadioPort) {
        // A NACK does not advance our sn; it re-asserts the outstanding one.
        let nack = SessionPacket {
            session_id: self.id,
            op: SessionOp::Nack,
            length: 0,
            nesn: self.last_recv_sn.next(),
            sn: self.last_sent_packet.sn,
            payload: [0u8; MAX_PAYLOAD_LEN],
        };
        trace!(session = %self.id, sn = %nack.sn, nesn = %nack.nesn, "transmitting NACK");
        if let Err(err) = radio.transmit(&nack.serialize()) {
            warn!(session = %self.id, %err, "NACK transmit failed");
        }
        self.timeout_counter += 1;
        self.stats.nacks_sent += 1;
    }

    fn receive(&mut self, radio: &dyn RadioPort, pipe: &mut MessagePipe) {
        self.received_good_packet_in_last_receive_sequence = false;
        let mut buf = vec![0u8; radio.max_message_length()];
        if let Err(err) = radio.receive(&mut buf) {
            trace!(session = %self.id, %err, "nothing received this slot");
            return;
        }
        let packet = match SessionPacket::deserialize(&buf) {
            Ok(packet) => packet,
            Err(err) => {
                trace!(session = %self.id, %err, "dropping undecodable frame");
                return;
            }
        };
        self.received_good_packet_in_last_receive_sequence = true;
        self.timeout_counter = 0;
        self.stats.packets_received += 1;
        trace!(
            session = %self.id,
            op = ?packet.op,
            sn = %packet.sn,
            nesn = %packet.nesn,
            "received packet"
        );

        if packet.nesn == self.last_sent_packet.sn.next() {
            // Our outstanding transmission is acknowledged.
            self.last_acked_sent_sn = self.last_sent_packet.sn;

            if packet.sn == self.last_recv_sn {
                // A retransmit of the sn we already hold: the new payload
                // logically replaces the held one, with no delivery.
                self.last_recv_message = packet.message();
            } else if packet.sn == self.last_recv_sn.next() {
                // The held payload is now superseded and safe to deliver.
                let delivered = std::mem::replace(&mut self.last_recv_message, packet.message());
                pipe.deposit_received_message(delivered);
                self.stats.payloads_delivered += 1;
            }
            self.last_recv_sn = packet.sn;
        } else if packet.op == SessionOp::Nack && packet.nesn == self.last_sent_packet.sn {
            // The peer missed our last transmission; the next transmit slot
            // will retransmit. A NACKed NACK lands here too and changes
            // nothing.
        } else {
            panic!(
                "protocol desync: peer sent {:?} with nesn {} against outstanding sn {}",
                packet.op, packet.nesn, self.last_sent_packet.sn
            );
        }
    }

    fn terminate(&mut self) {
        debug!(session = %self.id, stats = ?self.stats, "terminating session after repeated timeouts");
        self.session_complete = true;
    }
}
