//! Core types used throughout loralink.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum payload length of a single session data packet, in bytes.
pub const MAX_PAYLOAD_LEN: usize = 32;

/// Packet sequence number for the stop-and-wait ARQ.
///
/// All arithmetic is modulo 256. The maximum value (`0xFF`) doubles as the
/// bootstrap sentinel meaning "no packet has ever been acknowledged or
/// received" while a session primes its counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequenceNumber(pub u8);

impl SequenceNumber {
    pub const ZERO: Self = Self(0);

    /// The wrap point, used as the fictitious pre-session sequence number.
    pub const MAX: Self = Self(u8::MAX);

    pub fn new(n: u8) -> Self {
        Self(n)
    }

    /// Wrap-preserving successor.
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Wrap-preserving predecessor.
    pub fn prev(self) -> Self {
        Self(self.0.wrapping_sub(1))
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a session, agreed during the connection handshake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u32);

impl SessionId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn generate() -> Self {
        Self(rand::random::<u32>())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Link-layer address of a device, carried in discovery and handshake frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceAddress(pub u32);

impl DeviceAddress {
    pub fn new(addr: u32) -> Self {
        Self(addr)
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl From<u32> for DeviceAddress {
    fn from(addr: u32) -> Self {
        Self(addr)
    }
}

/// A bounded message payload.
///
/// Always occupies [`MAX_PAYLOAD_LEN`] bytes on the wire; shorter logical
/// messages live in the prefix with `len` carrying their actual size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payload {
    bytes: [u8; MAX_PAYLOAD_LEN],
    len: u8,
}

impl Payload {
    /// An empty payload (length zero).
    pub fn empty() -> Self {
        Self {
            bytes: [0u8; MAX_PAYLOAD_LEN],
            len: 0,
        }
    }

    /// Build a payload from a slice; `None` if the slice exceeds
    /// [`MAX_PAYLOAD_LEN`].
    pub fn from_slice(data: &[u8]) -> Option<Self> {
        if data.len() > MAX_PAYLOAD_LEN {
            return None;
        }
        let mut bytes = [0u8; MAX_PAYLOAD_LEN];
        bytes[..data.len()].copy_from_slice(data);
        Some(Self {
            bytes,
            len: data.len() as u8,
        })
    }

    /// Reassemble a payload from its wire representation. Lengths beyond
    /// capacity are clamped.
    pub fn from_raw(bytes: [u8; MAX_PAYLOAD_LEN], len: u8) -> Self {
        Self {
            bytes,
            len: len.min(MAX_PAYLOAD_LEN as u8),
        }
    }

    /// The logical message bytes (length-prefixed view).
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// The full fixed-capacity buffer, padding included.
    pub fn raw(&self) -> &[u8; MAX_PAYLOAD_LEN] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self::empty()
    }
}
