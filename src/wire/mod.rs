//! Wire protocol for the chat link layer.
//!
//! Every frame starts with a one-byte type tag followed by the variant's
//! fields at fixed, byte-aligned offsets. Frames smaller than the radio's
//! fragment size are zero-padded by the transmitting radio.
//!
//! ## Frame formats
//!
//! ```text
//! Session (tag 0):
//! ┌─────────┬────────────────┬────────┬────────────┬──────────┬────────┬──────────────┐
//! │ Tag (1) │ Session ID (4) │ Op (1) │ Length (1) │ NESN (1) │ SN (1) │ Payload (32) │
//! └─────────┴────────────────┴────────┴────────────┴──────────┴────────┴──────────────┘
//! ConnectionRequest (tag 1):
//! ┌─────────┬────────────┬────────────┐
//! │ Tag (1) │ Source (4) │ Target (4) │
//! └─────────┴────────────┴────────────┘
//! ConnectionAccept (tag 2):
//! ┌─────────┬────────────┬────────────┬────────────────┬────────────────┐
//! │ Tag (1) │ Source (4) │ Target (4) │ Start time (8) │ Session ID (4) │
//! └─────────┴────────────┴────────────┴────────────────┴────────────────┘
//! Advertising (tag 3):
//! ┌─────────┬────────────┐
//! │ Tag (1) │ Source (4) │
//! └─────────┴────────────┘
//! ```
//!
//! Multi-byte integer fields travel in the host's native byte order, with one
//! exception: the connection-accept start time is always little-endian so the
//! two peers agree on it across architectures.

mod frame;
pub mod time;

pub use frame::{
    AdvertisingPacket, ConnectionAcceptPacket, ConnectionRequestPacket, Frame, FrameKind,
    SessionOp, SessionPacket,
};

/// Width of the leading frame type tag.
pub const FRAME_TAG_BYTES: usize = 1;

/// Wire width of the largest frame variant.
pub const MAX_FRAME_LEN: usize = SessionPacket::WIRE_LEN;
