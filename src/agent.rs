//! The protocol agent: discovery, handshake, and session execution.
//!
//! An agent cycles through a small state machine driven by an externally
//! settable [`ConnectionGoal`]: it advertises its presence, seeks
//! advertising peers, performs the connection handshake that fixes a shared
//! session start time, and then hands control to the [`Session`] engine
//! until the session ends.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use crate::pipe::MessagePipe;
use crate::radio::RadioPort;
use crate::session::{AgentAction, Session, SessionRole};
use crate::types::{DeviceAddress, SessionId};
use crate::wire::time::{local_instant_for, wire_time_after};
use crate::wire::{AdvertisingPacket, ConnectionAcceptPacket, ConnectionRequestPacket, Frame};
use crate::{Error, Result};

/// How far in the future an accepted session's start time is placed, giving
/// the accept frame time to cross the air before the first slot.
pub const HANDSHAKE_LEAD_TIME: Duration = Duration::from_millis(100);

const BASE_ADVERTISING_INTERVAL: Duration = Duration::from_millis(550);
const ADVERTISING_TRANSMISSION_DURATION: Duration = Duration::from_millis(200);
/// How long an advertiser listens for connection requests per broadcast.
const CONNECTION_REQUEST_INTERVAL: Duration = Duration::from_millis(
    (BASE_ADVERTISING_INTERVAL.as_millis() - ADVERTISING_TRANSMISSION_DURATION.as_millis()) as u64,
);
/// How long a requester waits for the connection accept.
const HANDSHAKE_RECEIVE_DURATION: Duration = Duration::from_millis(400);
const PEND_SLEEP_TIME: Duration = Duration::from_millis(100);

/// What the agent should be trying to accomplish. Set asynchronously by a
/// controller; takes effect at the next dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionGoal {
    /// Stay off the air.
    Disconnect = 0,
    /// Listen for advertising peers and connect to the first one heard.
    Seek = 1,
    /// Broadcast our presence and accept incoming connection requests.
    Advertise = 2,
    /// Alternate between advertising and seeking.
    SeekAndAdvertise = 3,
}

impl ConnectionGoal {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Seek,
            2 => Self::Advertise,
            3 => Self::SeekAndAdvertise,
            _ => Self::Disconnect,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AgentState {
    Dispatch,
    Pend,
    Advertise,
    Seek,
    HandshakeFromSeek,
    HandshakeFromAdvertise,
    ExecuteSession,
}

/// Agent construction parameters.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// This device's link-layer address.
    pub address: DeviceAddress,
    /// Length of each peer's transmission slot within a session.
    pub transmit_duration: Duration,
    /// Idle gap between transmission slots.
    pub gap_duration: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            address: DeviceAddress(0),
            transmit_duration: Duration::from_millis(800),
            gap_duration: Duration::from_millis(200),
        }
    }
}

/// Thread-safe control surface over a running agent.
#[derive(Clone)]
pub struct AgentHandle {
    goal: Arc<AtomicU8>,
    in_session: Arc<AtomicBool>,
}

impl AgentHandle {
    pub fn set_goal(&self, goal: ConnectionGoal) {
        self.goal.store(goal as u8, Ordering::Relaxed);
    }

    pub fn goal(&self) -> ConnectionGoal {
        ConnectionGoal::from_u8(self.goal.load(Ordering::Relaxed))
    }

    pub fn in_session(&self) -> bool {
        self.in_session.load(Ordering::Relaxed)
    }
}

/// A protocol agent bound to one radio.
pub struct Agent {
    address: DeviceAddress,
    transmit_duration: Duration,
    gap_duration: Duration,
    radio: Arc<dyn RadioPort>,
    pipe: MessagePipe,
    session: Option<Session>,
    state: AgentState,
    prior_state: AgentState,
    goal: Arc<AtomicU8>,
    in_session: Arc<AtomicBool>,
    advertiser_address: Option<DeviceAddress>,
    requester_address: Option<DeviceAddress>,
}

impl Agent {
    pub fn new(config: AgentConfig, radio: Arc<dyn RadioPort>, pipe: MessagePipe) -> Self {
        Self {
            address: config.address,
            transmit_duration: config.transmit_duration,
            gap_duration: config.gap_duration,
            radio,
            pipe,
            session: None,
            state: AgentState::Dispatch,
            prior_state: AgentState::Pend,
            goal: Arc::new(AtomicU8::new(ConnectionGoal::Disconnect as u8)),
            in_session: Arc::new(AtomicBool::new(false)),
            advertiser_address: None,
            requester_address: None,
        }
    }

    /// A cloneable control handle for other threads.
    pub fn handle(&self) -> AgentHandle {
        AgentHandle {
            goal: Arc::clone(&self.goal),
            in_session: Arc::clone(&self.in_session),
        }
    }

    pub fn set_goal(&self, goal: ConnectionGoal) {
        self.goal.store(goal as u8, Ordering::Relaxed);
    }

    pub fn in_session(&self) -> bool {
        self.state == AgentState::ExecuteSession
    }

    fn goal(&self) -> ConnectionGoal {
        ConnectionGoal::from_u8(self.goal.load(Ordering::Relaxed))
    }

    /// Run one step of the agent state machine.
    ///
    /// Dispatch is not an observable action of its own: a single call both
    /// picks the next state (if due) and executes it.
    pub fn execute_agent_action(&mut self) {
        if self.state == AgentState::Dispatch {
            self.dispatch_next_state();
        }
        match self.state {
            AgentState::Dispatch => unreachable!("dispatch selected the dispatch state"),
            AgentState::Pend => self.pend(),
            AgentState::Seek => self.seek(),
            AgentState::Advertise => self.advertise(),
            AgentState::HandshakeFromSeek => self.request_connection(),
            AgentState::HandshakeFromAdvertise => self.accept_connection(),
            AgentState::ExecuteSession => self.execute_session(),
        }
    }

    fn change_state(&mut self, new_state: AgentState) {
        trace!(from = ?self.state, to = ?new_state, "agent state transition");
        self.prior_state = self.state;
        self.state = new_state;
        self.in_session
            .store(new_state == AgentState::ExecuteSession, Ordering::Relaxed);
    }

    fn dispatch_next_state(&mut self) {
        let next = match self.goal() {
            ConnectionGoal::Disconnect => AgentState::Pend,
            ConnectionGoal::Seek => AgentState::Seek,
            ConnectionGoal::Advertise => AgentState::Advertise,
            ConnectionGoal::SeekAndAdvertise => {
                if self.prior_state == AgentState::Advertise {
                    AgentState::Seek
                } else {
                    AgentState::Advertise
                }
            }
        };
        self.change_state(next);
    }

    fn pend(&mut self) {
        thread::sleep(PEND_SLEEP_TIME);
        self.change_state(AgentState::Dispatch);
    }

    /// Receive one fragment and decode it as any frame variant.
    fn receive_frame(&self) -> Result<Frame> {
        let mut buf = vec![0u8; self.radio.max_message_length()];
        self.radio.receive(&mut buf)?;
        Frame::deserialize(&buf).map_err(Error::from)
    }

    fn seek(&mut self) {
        match self.receive_frame() {
            Ok(Frame::Advertising(ad)) => {
                debug!(advertiser = %ad.source_address, "heard an advertisement");
                self.advertiser_address = Some(ad.source_address);
                self.change_state(AgentState::HandshakeFromSeek);
            }
            Ok(frame) => {
                trace!(kind = ?frame.kind(), "ignoring non-advertising frame while seeking");
                self.change_state(AgentState::Dispatch);
            }
            Err(err) => {
                trace!(%err, "heard nothing while seeking");
                self.change_state(AgentState::Dispatch);
            }
        }
    }

    fn advertise(&mut self) {
        let advert = AdvertisingPacket {
            source_address: self.address,
        };
        if let Err(err) = self.radio.transmit(&advert.serialize()) {
            warn!(%err, "failed to broadcast advertisement");
            self.change_state(AgentState::Pend);
            return;
        }
        trace!(address = %self.address, "broadcast advertisement");

        let receive_begin = Instant::now();
        loop {
            if let Ok(Frame::ConnectionRequest(request)) = self.receive_frame() {
                let for_us = request.target_address == self.address;
                debug!(
                    source = %request.source_address,
                    target = %request.target_address,
                    for_us,
                    "received connection request"
                );
                if for_us {
                    self.requester_address = Some(request.source_address);
                    self.change_state(AgentState::HandshakeFromAdvertise);
                    return;
                }
            }
            if receive_begin.elapsed() >= CONNECTION_REQUEST_INTERVAL {
                break;
            }
        }
        self.change_state(AgentState::Dispatch);
    }

    fn request_connection(&mut self) {
        let target = self
            .advertiser_address
            .take()
            .expect("handshake-from-seek without an advertiser address");
        let request = ConnectionRequestPacket {
            source_address: self.address,
            target_address: target,
        };
        if let Err(err) = self.radio.transmit(&request.serialize()) {
            warn!(%err, "failed to transmit connection request");
            self.change_state(AgentState::Pend);
            return;
        }
        debug!(target = %target, "transmitted connection request");

        let receive_begin = Instant::now();
        loop {
            if let Ok(Frame::ConnectionAccept(accept)) = self.receive_frame() {
                let for_us = accept.target_address == self.address;
                debug!(
                    source = %accept.source_address,
                    session = %accept.session_id,
                    for_us,
                    "received connection accept"
                );
                if for_us {
                    let start_time = local_instant_for(accept.session_start_time);
                    let session = Session::new(
                        start_time,
                        accept.session_id,
                        self.transmit_duration,
                        self.gap_duration,
                        SessionRole::Follower,
                    );
                    info!(session = %accept.session_id, "session accepted, joining as follower");
                    self.session = Some(session);
                    self.change_state(AgentState::ExecuteSession);
                    self.session
                        .as_ref()
                        .expect("session was just created")
                        .sleep_until_start_time();
                    return;
                }
            }
            if receive_begin.elapsed() >= HANDSHAKE_RECEIVE_DURATION {
                break;
            }
        }

        debug!("connection request went unanswered");
        self.change_state(AgentState::Dispatch);
    }

    fn accept_connection(&mut self) {
        let requester = self
            .requester_address
            .take()
            .expect("handshake-from-advertise without a requester address");
        let session_id = SessionId::generate();
        let session_start_time = wire_time_after(HANDSHAKE_LEAD_TIME);
        let accept = ConnectionAcceptPacket {
            source_address: self.address,
            target_address: requester,
            session_start_time,
            session_id,
        };
        let session = Session::new(
            local_instant_for(session_start_time),
            session_id,
            self.transmit_duration,
            self.gap_duration,
            SessionRole::Initiator,
        );

        if let Err(err) = self.radio.transmit(&accept.serialize()) {
            warn!(%err, "failed to transmit connection accept");
            self.change_state(AgentState::Pend);
            return;
        }
        info!(session = %session_id, peer = %requester, "session accepted, leading as initiator");
        self.session = Some(session);
        self.change_state(AgentState::ExecuteSession);
        self.session
            .as_ref()
            .expect("session was just created")
            .sleep_until_start_time();
    }

    fn execute_session(&mut self) {
        let session = self
            .session
            .as_mut()
            .expect("executing a session that does not exist");
        let action = session.execute_current_action(self.radio.as_ref(), &mut self.pipe);
        if action == AgentAction::SessionComplete {
            self.end_session("session complete");
            return;
        }
        if self.goal() == ConnectionGoal::Disconnect {
            self.end_session("disconnect requested");
        }
    }

    fn end_session(&mut self, reason: &str) {
        if let Some(session) = self.session.take() {
            info!(session = %session.id(), stats = ?session.stats(), reason, "session ended");
        }
        self.change_state(AgentState::Pend);
    }
}
