//! Frame variants and their fixed field layouts.

use byteorder::{ByteOrder, LittleEndian, NativeEndian};

use crate::error::FrameError;
use crate::types::{DeviceAddress, Payload, SequenceNumber, SessionId, MAX_PAYLOAD_LEN};

use super::FRAME_TAG_BYTES;

/// Frame variant discriminant, the first byte of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameKind {
    /// In-session data or NACK traffic.
    Session = 0,
    /// Request to open a session with an advertising peer.
    ConnectionRequest = 1,
    /// Accepts a connection request and fixes the session schedule.
    ConnectionAccept = 2,
    /// Peer discovery broadcast.
    Advertising = 3,
}

impl FrameKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Session),
            1 => Some(Self::ConnectionRequest),
            2 => Some(Self::ConnectionAccept),
            3 => Some(Self::Advertising),
            _ => None,
        }
    }

    /// Wire width of this variant, tag included.
    pub fn wire_len(self) -> usize {
        match self {
            Self::Session => SessionPacket::WIRE_LEN,
            Self::ConnectionRequest => ConnectionRequestPacket::WIRE_LEN,
            Self::ConnectionAccept => ConnectionAcceptPacket::WIRE_LEN,
            Self::Advertising => AdvertisingPacket::WIRE_LEN,
        }
    }
}

/// Session packet subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SessionOp {
    /// Nothing usable was received in the last receive slot; retransmit.
    Nack = 0,
    /// Carries a payload (possibly empty).
    Data = 1,
}

impl SessionOp {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Nack),
            1 => Some(Self::Data),
            _ => None,
        }
    }
}

/// Position of one field within a frame, in bits after the tag.
///
/// The tables below are the single source of truth for the wire layout;
/// the serialisers index through them and the `const` assertions at the
/// bottom of this file check them against each other.
#[derive(Debug, Clone, Copy)]
struct FieldSpec {
    bit_offset: usize,
    bit_len: usize,
}

impl FieldSpec {
    const fn new(bit_offset: usize, bit_len: usize) -> Self {
        Self { bit_offset, bit_len }
    }

    /// First byte of this field within the serialised frame.
    const fn byte_start(self) -> usize {
        FRAME_TAG_BYTES + self.bit_offset / 8
    }

    const fn byte_len(self) -> usize {
        self.bit_len / 8
    }

    const fn byte_end(self) -> usize {
        self.byte_start() + self.byte_len()
    }
}

mod layout {
    use super::FieldSpec;
    use crate::types::MAX_PAYLOAD_LEN;

    pub(super) const SESSION_ID: FieldSpec = FieldSpec::new(0, 32);
    pub(super) const SESSION_OP: FieldSpec = FieldSpec::new(32, 8);
    pub(super) const SESSION_LENGTH: FieldSpec = FieldSpec::new(40, 8);
    pub(super) const SESSION_NESN: FieldSpec = FieldSpec::new(48, 8);
    pub(super) const SESSION_SN: FieldSpec = FieldSpec::new(56, 8);
    pub(super) const SESSION_PAYLOAD: FieldSpec = FieldSpec::new(64, MAX_PAYLOAD_LEN * 8);
    pub(super) const SESSION: &[FieldSpec] = &[
        SESSION_ID,
        SESSION_OP,
        SESSION_LENGTH,
        SESSION_NESN,
        SESSION_SN,
        SESSION_PAYLOAD,
    ];

    pub(super) const ADVERTISING_SOURCE: FieldSpec = FieldSpec::new(0, 32);
    pub(super) const ADVERTISING: &[FieldSpec] = &[ADVERTISING_SOURCE];

    pub(super) const REQUEST_SOURCE: FieldSpec = FieldSpec::new(0, 32);
    pub(super) const REQUEST_TARGET: FieldSpec = FieldSpec::new(32, 32);
    pub(super) const REQUEST: &[FieldSpec] = &[REQUEST_SOURCE, REQUEST_TARGET];

    pub(super) const ACCEPT_SOURCE: FieldSpec = FieldSpec::new(0, 32);
    pub(super) const ACCEPT_TARGET: FieldSpec = FieldSpec::new(32, 32);
    pub(super) const ACCEPT_START_TIME: FieldSpec = FieldSpec::new(64, 64);
    pub(super) const ACCEPT_SESSION_ID: FieldSpec = FieldSpec::new(128, 32);
    pub(super) const ACCEPT: &[FieldSpec] = &[
        ACCEPT_SOURCE,
        ACCEPT_TARGET,
        ACCEPT_START_TIME,
        ACCEPT_SESSION_ID,
    ];
}

/// Wire width in bytes of a variant described by `fields`, tag included.
const fn wire_width_bytes(fields: &[FieldSpec]) -> usize {
    let mut max_end = 0;
    let mut i = 0;
    while i < fields.len() {
        let end = fields[i].bit_offset + fields[i].bit_len;
        if end > max_end {
            max_end = end;
        }
        i += 1;
    }
    FRAME_TAG_BYTES + max_end / 8
}

const fn fields_are_byte_aligned(fields: &[FieldSpec]) -> bool {
    let mut i = 0;
    while i < fields.len() {
        if fields[i].bit_offset % 8 != 0 || fields[i].bit_len % 8 != 0 {
            return false;
        }
        i += 1;
    }
    true
}

const fn fields_are_disjoint(fields: &[FieldSpec]) -> bool {
    let mut i = 0;
    while i < fields.len() {
        let mut j = 0;
        while j < fields.len() {
            if i != j {
                let a = fields[i];
                let b = fields[j];
                // Does `a` protrude onto `b` from below?
                if a.bit_offset <= b.bit_offset && a.bit_offset + a.bit_len > b.bit_offset {
                    return false;
                }
            }
            j += 1;
        }
        i += 1;
    }
    true
}

const _: () = {
    assert!(fields_are_byte_aligned(layout::SESSION));
    assert!(fields_are_byte_aligned(layout::ADVERTISING));
    assert!(fields_are_byte_aligned(layout::REQUEST));
    assert!(fields_are_byte_aligned(layout::ACCEPT));

    assert!(fields_are_disjoint(layout::SESSION));
    assert!(fields_are_disjoint(layout::ADVERTISING));
    assert!(fields_are_disjoint(layout::REQUEST));
    assert!(fields_are_disjoint(layout::ACCEPT));

    // The session frame is the widest variant, and every variant fits in a
    // single radio fragment.
    assert!(ConnectionAcceptPacket::WIRE_LEN <= SessionPacket::WIRE_LEN);
    assert!(ConnectionRequestPacket::WIRE_LEN <= SessionPacket::WIRE_LEN);
    assert!(AdvertisingPacket::WIRE_LEN <= SessionPacket::WIRE_LEN);
    assert!(SessionPacket::WIRE_LEN <= crate::radio::FRAGMENT_CAPACITY);
};

fn field(bytes: &[u8], spec: FieldSpec) -> &[u8] {
    &bytes[spec.byte_start()..spec.byte_end()]
}

fn field_mut(bytes: &mut [u8], spec: FieldSpec) -> &mut [u8] {
    &mut bytes[spec.byte_start()..spec.byte_end()]
}

/// Validate length and tag before reading a variant's fields.
fn check_frame(bytes: &[u8], kind: FrameKind, need: usize) -> Result<(), FrameError> {
    if bytes.len() < FRAME_TAG_BYTES {
        return Err(FrameError::Truncated {
            len: bytes.len(),
            need: FRAME_TAG_BYTES,
        });
    }
    if bytes[0] != kind as u8 {
        return Err(FrameError::UnexpectedKind {
            expected: kind,
            got: bytes[0],
        });
    }
    if bytes.len() < need {
        return Err(FrameError::Truncated {
            len: bytes.len(),
            need,
        });
    }
    Ok(())
}

/// In-session traffic: a data transmission or a NACK.
///
/// `payload` is always carried at full width; bytes past `length` are
/// padding with unspecified content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPacket {
    pub session_id: SessionId,
    pub op: SessionOp,
    pub length: u8,
    pub nesn: SequenceNumber,
    pub sn: SequenceNumber,
    pub payload: [u8; MAX_PAYLOAD_LEN],
}

impl SessionPacket {
    pub const WIRE_LEN: usize = wire_width_bytes(layout::SESSION);

    /// The carried message as a bounded payload.
    pub fn message(&self) -> Payload {
        Payload::from_raw(self.payload, self.length)
    }

    pub fn serialize(&self) -> [u8; Self::WIRE_LEN] {
        let mut buf = [0u8; Self::WIRE_LEN];
        buf[0] = FrameKind::Session as u8;
        NativeEndian::write_u32(field_mut(&mut buf, layout::SESSION_ID), self.session_id.0);
        field_mut(&mut buf, layout::SESSION_OP)[0] = self.op as u8;
        field_mut(&mut buf, layout::SESSION_LENGTH)[0] = self.length;
        field_mut(&mut buf, layout::SESSION_NESN)[0] = self.nesn.0;
        field_mut(&mut buf, layout::SESSION_SN)[0] = self.sn.0;
        field_mut(&mut buf, layout::SESSION_PAYLOAD).copy_from_slice(&self.payload);
        buf
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, FrameError> {
        check_frame(bytes, FrameKind::Session, Self::WIRE_LEN)?;
        let op_raw = field(bytes, layout::SESSION_OP)[0];
        let op = SessionOp::from_u8(op_raw).ok_or(FrameError::UnknownOp(op_raw))?;
        let mut payload = [0u8; MAX_PAYLOAD_LEN];
        payload.copy_from_slice(field(bytes, layout::SESSION_PAYLOAD));
        Ok(Self {
            session_id: SessionId(NativeEndian::read_u32(field(bytes, layout::SESSION_ID))),
            op,
            length: field(bytes, layout::SESSION_LENGTH)[0],
            nesn: SequenceNumber(field(bytes, layout::SESSION_NESN)[0]),
            sn: SequenceNumber(field(bytes, layout::SESSION_SN)[0]),
            payload,
        })
    }
}

/// Peer discovery broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvertisingPacket {
    pub source_address: DeviceAddress,
}

impl AdvertisingPacket {
    pub const WIRE_LEN: usize = wire_width_bytes(layout::ADVERTISING);

    pub fn serialize(&self) -> [u8; Self::WIRE_LEN] {
        let mut buf = [0u8; Self::WIRE_LEN];
        buf[0] = FrameKind::Advertising as u8;
        NativeEndian::write_u32(
            field_mut(&mut buf, layout::ADVERTISING_SOURCE),
            self.source_address.0,
        );
        buf
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, FrameError> {
        check_frame(bytes, FrameKind::Advertising, Self::WIRE_LEN)?;
        Ok(Self {
            source_address: DeviceAddress(NativeEndian::read_u32(field(
                bytes,
                layout::ADVERTISING_SOURCE,
            ))),
        })
    }
}

/// Asks an advertising peer to open a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionRequestPacket {
    pub source_address: DeviceAddress,
    pub target_address: DeviceAddress,
}

impl ConnectionRequestPacket {
    pub const WIRE_LEN: usize = wire_width_bytes(layout::REQUEST);

    pub fn serialize(&self) -> [u8; Self::WIRE_LEN] {
        let mut buf = [0u8; Self::WIRE_LEN];
        buf[0] = FrameKind::ConnectionRequest as u8;
        NativeEndian::write_u32(
            field_mut(&mut buf, layout::REQUEST_SOURCE),
            self.source_address.0,
        );
        NativeEndian::write_u32(
            field_mut(&mut buf, layout::REQUEST_TARGET),
            self.target_address.0,
        );
        buf
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, FrameError> {
        check_frame(bytes, FrameKind::ConnectionRequest, Self::WIRE_LEN)?;
        Ok(Self {
            source_address: DeviceAddress(NativeEndian::read_u32(field(
                bytes,
                layout::REQUEST_SOURCE,
            ))),
            target_address: DeviceAddress(NativeEndian::read_u32(field(
                bytes,
                layout::REQUEST_TARGET,
            ))),
        })
    }
}

/// Accepts a connection request and communicates the session schedule.
///
/// `session_start_time` is a wall-clock nanosecond count since the Unix
/// epoch; it is the one field serialised in a fixed byte order
/// (little-endian) because both peers must decode the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionAcceptPacket {
    pub source_address: DeviceAddress,
    pub target_address: DeviceAddress,
    pub session_start_time: u64,
    pub session_id: SessionId,
}

impl ConnectionAcceptPacket {
    pub const WIRE_LEN: usize = wire_width_bytes(layout::ACCEPT);

    pub fn serialize(&self) -> [u8; Self::WIRE_LEN] {
        let mut buf = [0u8; Self::WIRE_LEN];
        buf[0] = FrameKind::ConnectionAccept as u8;
        NativeEndian::write_u32(
            field_mut(&mut buf, layout::ACCEPT_SOURCE),
            self.source_address.0,
        );
        NativeEndian::write_u32(
            field_mut(&mut buf, layout::ACCEPT_TARGET),
            self.target_address.0,
        );
        LittleEndian::write_u64(
            field_mut(&mut buf, layout::ACCEPT_START_TIME),
            self.session_start_time,
        );
        NativeEndian::write_u32(
            field_mut(&mut buf, layout::ACCEPT_SESSION_ID),
            self.session_id.0,
        );
        buf
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, FrameError> {
        check_frame(bytes, FrameKind::ConnectionAccept, Self::WIRE_LEN)?;
        Ok(Self {
            source_address: DeviceAddress(NativeEndian::read_u32(field(
                bytes,
                layout::ACCEPT_SOURCE,
            ))),
            target_address: DeviceAddress(NativeEndian::read_u32(field(
                bytes,
                layout::ACCEPT_TARGET,
            ))),
            session_start_time: LittleEndian::read_u64(field(bytes, layout::ACCEPT_START_TIME)),
            session_id: SessionId(NativeEndian::read_u32(field(bytes, layout::ACCEPT_SESSION_ID))),
        })
    }
}

/// A frame of any variant, discriminated by its leading tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    Session(SessionPacket),
    ConnectionRequest(ConnectionRequestPacket),
    ConnectionAccept(ConnectionAcceptPacket),
    Advertising(AdvertisingPacket),
}

impl Frame {
    pub fn kind(&self) -> FrameKind {
        match self {
            Self::Session(_) => FrameKind::Session,
            Self::ConnectionRequest(_) => FrameKind::ConnectionRequest,
            Self::ConnectionAccept(_) => FrameKind::ConnectionAccept,
            Self::Advertising(_) => FrameKind::Advertising,
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Self::Session(p) => p.serialize().to_vec(),
            Self::ConnectionRequest(p) => p.serialize().to_vec(),
            Self::ConnectionAccept(p) => p.serialize().to_vec(),
            Self::Advertising(p) => p.serialize().to_vec(),
        }
    }

    /// Decode any frame variant from a received fragment.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < FRAME_TAG_BYTES {
            return Err(FrameError::Truncated {
                len: bytes.len(),
                need: FRAME_TAG_BYTES,
            });
        }
        match FrameKind::from_u8(bytes[0]).ok_or(FrameError::UnknownKind(bytes[0]))? {
            FrameKind::Session => SessionPacket::deserialize(bytes).map(Self::Session),
            FrameKind::ConnectionRequest => {
                ConnectionRequestPacket::deserialize(bytes).map(Self::ConnectionRequest)
            }
            FrameKind::ConnectionAccept => {
                ConnectionAcceptPacket::deserialize(bytes).map(Self::ConnectionAccept)
            }
            FrameKind::Advertising => AdvertisingPacket::deserialize(bytes).map(Self::Advertising),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_widths() {
        assert_eq!(SessionPacket::WIRE_LEN, 41);
        assert_eq!(AdvertisingPacket::WIRE_LEN, 5);
        assert_eq!(ConnectionRequestPacket::WIRE_LEN, 9);
        assert_eq!(ConnectionAcceptPacket::WIRE_LEN, 21);
    }

    fn sample_session_packet() -> SessionPacket {
        let mut payload = [0u8; MAX_PAYLOAD_LEN];
        payload[..5].copy_from_slice(b"hello");
        SessionPacket {
            session_id: SessionId(0xDEAD_BEEF),
            op: SessionOp::Data,
            length: 5,
            nesn: SequenceNumber(7),
            sn: SequenceNumber(6),
            payload,
        }
    }

    #[test]
    fn session_round_trip() {
        let packet = sample_session_packet();
        let wire = packet.serialize();
        assert_eq!(wire[0], FrameKind::Session as u8);
        let decoded = SessionPacket::deserialize(&wire).unwrap();
        assert_eq!(decoded, packet);
        assert_eq!(decoded.message().as_bytes(), b"hello");
    }

    #[test]
    fn advertising_round_trip() {
        let packet = AdvertisingPacket {
            source_address: DeviceAddress(0x1234_5678),
        };
        let decoded = AdvertisingPacket::deserialize(&packet.serialize()).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn connection_request_round_trip() {
        let packet = ConnectionRequestPacket {
            source_address: DeviceAddress(1),
            target_address: DeviceAddress(2),
        };
        let decoded = ConnectionRequestPacket::deserialize(&packet.serialize()).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn connection_accept_round_trip() {
        let packet = ConnectionAcceptPacket {
            source_address: DeviceAddress(1),
            target_address: DeviceAddress(2),
            session_start_time: 1_234_567_890_123_456_789,
            session_id: SessionId(42),
        };
        let decoded = ConnectionAcceptPacket::deserialize(&packet.serialize()).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn start_time_is_little_endian_on_wire() {
        let packet = ConnectionAcceptPacket {
            source_address: DeviceAddress(0),
            target_address: DeviceAddress(0),
            session_start_time: 0x0102_0304_0506_0708,
            session_id: SessionId(0),
        };
        let wire = packet.serialize();
        // Offset: tag + source + target.
        let start = FRAME_TAG_BYTES + 8;
        assert_eq!(
            &wire[start..start + 8],
            &0x0102_0304_0506_0708u64.to_le_bytes()
        );
    }

    #[test]
    fn wrong_tag_is_rejected() {
        let wire = sample_session_packet().serialize();
        assert_eq!(
            AdvertisingPacket::deserialize(&wire),
            Err(FrameError::UnexpectedKind {
                expected: FrameKind::Advertising,
                got: FrameKind::Session as u8,
            })
        );
        assert!(ConnectionAcceptPacket::deserialize(&wire).is_err());
    }

    #[test]
    fn truncated_frames_are_rejected() {
        let wire = sample_session_packet().serialize();
        assert_eq!(
            SessionPacket::deserialize(&wire[..SessionPacket::WIRE_LEN - 1]),
            Err(FrameError::Truncated {
                len: SessionPacket::WIRE_LEN - 1,
                need: SessionPacket::WIRE_LEN,
            })
        );
        assert_eq!(
            Frame::deserialize(&[]),
            Err(FrameError::Truncated { len: 0, need: 1 })
        );
    }

    #[test]
    fn padded_frames_decode() {
        // Radios hand back capacity-sized buffers; trailing padding must not
        // disturb decoding.
        let mut buf = vec![0u8; crate::radio::FRAGMENT_CAPACITY];
        let wire = sample_session_packet().serialize();
        buf[..wire.len()].copy_from_slice(&wire);
        let decoded = SessionPacket::deserialize(&buf).unwrap();
        assert_eq!(decoded, sample_session_packet());
    }

    #[test]
    fn zeroed_buffer_decodes_as_benign_session_packet() {
        // An all-zero fragment parses as a session NACK with zero sequence
        // numbers; the ARQ bootstrap relies on this.
        let buf = [0u8; SessionPacket::WIRE_LEN];
        let decoded = SessionPacket::deserialize(&buf).unwrap();
        assert_eq!(decoded.op, SessionOp::Nack);
        assert_eq!(decoded.sn, SequenceNumber::ZERO);
        assert_eq!(decoded.nesn, SequenceNumber::ZERO);
        assert_eq!(decoded.length, 0);
    }

    #[test]
    fn unknown_tag_and_op_are_rejected() {
        let mut buf = [0u8; SessionPacket::WIRE_LEN];
        buf[0] = 9;
        assert_eq!(Frame::deserialize(&buf), Err(FrameError::UnknownKind(9)));

        let mut wire = sample_session_packet().serialize();
        wire[FRAME_TAG_BYTES + 4] = 7; // subtype byte
        assert_eq!(
            SessionPacket::deserialize(&wire),
            Err(FrameError::UnknownOp(7))
        );
    }

    #[test]
    fn frame_union_dispatches_on_tag() {
        let session = sample_session_packet();
        match Frame::deserialize(&session.serialize()).unwrap() {
            Frame::Session(p) => assert_eq!(p, session),
            other => panic!("decoded wrong variant: {other:?}"),
        }

        let advert = AdvertisingPacket {
            source_address: DeviceAddress(77),
        };
        match Frame::deserialize(&advert.serialize()).unwrap() {
            Frame::Advertising(p) => assert_eq!(p, advert),
            other => panic!("decoded wrong variant: {other:?}"),
        }
        assert_eq!(
            Frame::Advertising(advert).serialize(),
            advert.serialize().to_vec()
        );
    }
}
