//! MAVLink v2 frame codec for the mission-upload message kinds.
//!
//! Every frame is a fixed 10-byte header, the payload, and a 2-byte checksum.
//!
//! Frame layout (little-endian):
//! ```text
//! [0]       stx            : u8  = 0xFD
//! [1]       payload_len    : u8
//! [2]       incompat_flags : u8  = 0
//! [3]       compat_flags   : u8  = 0
//! [4]       seq            : u8  (wraps at 256)
//! [5]       sys_id         : u8  = 1
//! [6]       comp_id        : u8  = 1
//! [7..10]   msg_id         : u24
//! [10..]    payload        : payload_len bytes
//! [..+2]    checksum       : u16 CRC-16/MCRF4XX of [1..10+len] + CRC-extra
//! ```

pub mod command;
pub mod crc;
pub mod messages;

pub use command::{command_id, MavCmd};
pub use crc::checksum;
pub use messages::{
    check_position, degrees_to_e7, e7_to_degrees, CommandLong, FencePoint, Message, MessageKind, MessageSpec,
    MissionCount, MissionItemInt, ParamSet, RallyPoint,
};

/// Start-of-frame marker for MAVLink v2.
pub const STX: u8 = 0xFD;

/// Size of the fixed frame header in bytes.
pub const HEADER_LEN: usize = 10;

pub const CHECKSUM_LEN: usize = 2;

/// Upper bound on any frame this codec emits.
pub const MAX_FRAME_LEN: usize = 280;

/// This ground station always presents as system 1, component 1.
pub const SYSTEM_ID: u8 = 1;
pub const COMPONENT_ID: u8 = 1;

// ── FrameHeader ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub payload_len: u8,
    pub incompat_flags: u8,
    pub compat_flags: u8,
    pub sequence: u8,
    pub system_id: u8,
    pub component_id: u8,
    pub message_id: u32,
}

/// A validated, decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub header: FrameHeader,
    pub message: Message,
    pub checksum: u16,
}

// ── ProtocolError ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolError {
    TooShort,
    BadStx(u8),
    UnsupportedFlags(u8),
    UnknownMessage(u32),
    LengthMismatch { expected: u8, actual: u8 },
    TruncatedPayload,
    BadChecksum { expected: u16, actual: u16 },
    InvalidParamValue { name: String, value: String },
    InvalidPosition { latitude: f64, longitude: f64 },
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooShort            => write!(f, "frame too short"),
            Self::BadStx(b)           => write!(f, "bad start marker 0x{b:02X}"),
            Self::UnsupportedFlags(b) => write!(f, "unsupported incompat flags 0x{b:02X}"),
            Self::UnknownMessage(id)  => write!(f, "unknown message id {id}"),
            Self::LengthMismatch { expected, actual } => {
                write!(f, "payload length {actual}, expected {expected}")
            }
            Self::TruncatedPayload    => write!(f, "payload truncated"),
            Self::BadChecksum { expected, actual } => {
                write!(f, "checksum mismatch: frame has 0x{actual:04X}, computed 0x{expected:04X}")
            }
            Self::InvalidParamValue { name, value } => {
                write!(f, "parameter {name}: value {value:?} is not a 32-bit float")
            }
            Self::InvalidPosition { latitude, longitude } => {
                write!(f, "position ({latitude}, {longitude}) is not a valid latitude/longitude")
            }
        }
    }
}

impl std::error::Error for ProtocolError {}

// ── Public API ───────────────────────────────────────────────────────────────

/// Frame `message` with sequence number `seq`.
pub fn encode_frame(seq: u8, message: &Message) -> Vec<u8> {
    let spec = message.spec();
    let payload = message.payload();
    debug_assert_eq!(payload.len(), spec.payload_len as usize);

    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len() + CHECKSUM_LEN);
    frame.push(STX);
    frame.push(payload.len() as u8);
    frame.push(0); // incompat flags
    frame.push(0); // compat flags
    frame.push(seq);
    frame.push(SYSTEM_ID);
    frame.push(COMPONENT_ID);
    frame.extend_from_slice(&spec.id.to_le_bytes()[..3]);
    frame.extend_from_slice(&payload);

    let crc = checksum(&frame[1..], spec.crc_extra);
    frame.extend_from_slice(&crc.to_le_bytes());
    frame
}

/// Decode and validate one frame.
///
/// The payload length must match the kind's spec exactly; this codec never
/// emits truncated MAVLink v2 payloads and does not accept them either.
pub fn decode_frame(buf: &[u8]) -> Result<Frame, ProtocolError> {
    if buf.len() < HEADER_LEN + CHECKSUM_LEN {
        return Err(ProtocolError::TooShort);
    }
    if buf[0] != STX {
        return Err(ProtocolError::BadStx(buf[0]));
    }

    let header = FrameHeader {
        payload_len: buf[1],
        incompat_flags: buf[2],
        compat_flags: buf[3],
        sequence: buf[4],
        system_id: buf[5],
        component_id: buf[6],
        message_id: u32::from_le_bytes([buf[7], buf[8], buf[9], 0]),
    };

    // Bit 0 is signing; signed frames carry a trailer this codec doesn't parse.
    if header.incompat_flags != 0 {
        return Err(ProtocolError::UnsupportedFlags(header.incompat_flags));
    }
    let kind = MessageKind::from_id(header.message_id)
        .ok_or(ProtocolError::UnknownMessage(header.message_id))?;
    let spec = kind.spec();
    if header.payload_len != spec.payload_len {
        return Err(ProtocolError::LengthMismatch {
            expected: spec.payload_len,
            actual: header.payload_len,
        });
    }

    let end = HEADER_LEN + header.payload_len as usize;
    if buf.len() < end + CHECKSUM_LEN {
        return Err(ProtocolError::TruncatedPayload);
    }

    let actual = u16::from_le_bytes([buf[end], buf[end + 1]]);
    let expected = checksum(&buf[1..end], spec.crc_extra);
    if actual != expected {
        return Err(ProtocolError::BadChecksum { expected, actual });
    }

    let message = Message::from_payload(kind, &buf[HEADER_LEN..end])
        .ok_or(ProtocolError::TruncatedPayload)?;
    Ok(Frame { header, message, checksum: actual })
}

/// `true` if the trailing checksum of `frame` is valid for its message kind.
pub fn verify_checksum(frame: &[u8]) -> bool {
    if frame.len() < HEADER_LEN + CHECKSUM_LEN {
        return false;
    }
    let message_id = u32::from_le_bytes([frame[7], frame[8], frame[9], 0]);
    let Some(kind) = MessageKind::from_id(message_id) else { return false };
    let end = frame.len() - CHECKSUM_LEN;
    let actual = u16::from_le_bytes([frame[end], frame[end + 1]]);
    checksum(&frame[1..end], kind.spec().crc_extra) == actual
}

// ── Tests ────────────────────────────────────────────────────────────────────
