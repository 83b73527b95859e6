//! # loralink
//!
//! A half-duplex, two-party chat link layer for narrow-band LoRa radios.
//!
//! Two peers that agree on a shared start time and slot schedule exchange
//! bounded payloads with in-order, acknowledged, best-effort delivery over
//! an unreliable medium.
//!
//! ## Architecture
//!
//! ┌─────────────────────────────────────────────────────────┐
//! │                      Application                        │
//! ├─────────────────────────────────────────────────────────┤
//! │     Message pipe (outgoing source / incoming sink)      │
//! ├─────────────────────────────────────────────────────────┤
//! │   Protocol agent (advertise / seek / handshake FSM)     │
//! ├─────────────────────────────────────────────────────────┤
//! │  Session engine (slot-clocked stop-and-wait ARQ)        │
//! ├─────────────────────────────────────────────────────────┤
//! │    Wire frames (tagged fixed-layout packet variants)    │
//! ├─────────────────────────────────────────────────────────┤
//! │        Radio port (bounded blocking TX / RX)            │
//! └─────────────────────────────────────────────────────────┘
//!
//! Each agent runs on a single OS thread: the session engine sleeps between
//! slots (spinning for sub-millisecond precision) and blocks in bounded
//! radio calls within them. The register-level radio driver and interactive
//! chat front end live outside this crate behind the [`radio::RadioPort`]
//! and [`pipe::MessagePipe`] seams.

#![warn(clippy::all, clippy::pedantic)]
// Allow stylistic lints that don't affect correctness
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_possible_truncation)] // Payload lengths fit in u8 by construction
#![allow(clippy::doc_markdown)] // ASCII diagrams in docs
#![allow(clippy::match_same_arms)] // Explicit arm per variant is clearer

pub mod agent;
pub mod clock;
pub mod config;
pub mod error;
pub mod pipe;
pub mod radio;
pub mod session;
pub mod types;
pub mod util;
pub mod wire;

pub use config::Config;
pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::agent::{Agent, AgentConfig, AgentHandle, ConnectionGoal};
    pub use crate::clock::{SlotClock, SlotKind};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::pipe::MessagePipe;
    pub use crate::radio::{LocalRadio, RadioPort};
    pub use crate::session::{AgentAction, Session, SessionRole};
    pub use crate::types::{DeviceAddress, Payload, SequenceNumber, SessionId};
    pub use crate::wire::Frame;
}
