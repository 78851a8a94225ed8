//! Message specs and payload layouts for the six kinds used by mission upload.
//!
//! Payload fields are serialized in MAVLink wire order (largest type first,
//! arrays last), which is the order the CRC-extra constants are derived
//! from. All multi-byte values are little-endian.

use mission_schema::{GeofencePoint, RallyPoint as RallyRecord, VehicleParameter, Waypoint};

use crate::command::command_id;
use crate::ProtocolError;

/// `MAV_FRAME_GLOBAL_RELATIVE_ALT`, used when a waypoint leaves its frame unset.
pub const MAV_FRAME_GLOBAL_RELATIVE_ALT: u8 = 3;

/// `MAV_PARAM_TYPE_REAL32`.
pub const MAV_PARAM_TYPE_REAL32: u8 = 9;

/// Fixed length of a `PARAM_SET` parameter name.
pub const PARAM_ID_LEN: usize = 16;

// ── MessageSpec ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    U8,
    U16,
    I16,
    I32,
    F32,
    /// Fixed-length, zero-padded byte buffer.
    Char(usize),
}

impl FieldType {
    pub const fn size(self) -> usize {
        match self {
            FieldType::U8 => 1,
            FieldType::U16 | FieldType::I16 => 2,
            FieldType::I32 | FieldType::F32 => 4,
            FieldType::Char(n) => n,
        }
    }
}

/// How a field's wire value relates to the record value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    Raw,
    /// Degrees × 1e7, rounded to the nearest integer.
    DegE7,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    pub scale: Scale,
}

const fn field(name: &'static str, ty: FieldType) -> FieldSpec {
    FieldSpec { name, ty, scale: Scale::Raw }
}

const fn deg_e7(name: &'static str) -> FieldSpec {
    FieldSpec { name, ty: FieldType::I32, scale: Scale::DegE7 }
}

/// Immutable schema for one message kind.
#[derive(Debug)]
pub struct MessageSpec {
    pub id: u32,
    pub name: &'static str,
    pub payload_len: u8,
    pub crc_extra: u8,
    /// Fields in wire order.
    pub fields: &'static [FieldSpec],
}

impl MessageSpec {
    /// Sum of all field sizes; always equals `payload_len`.
    pub fn field_bytes(&self) -> usize {
        self.fields.iter().map(|f| f.ty.size()).sum()
    }

    /// Byte offset of the named field within the payload, with its table entry.
    pub fn field_offset(&self, name: &str) -> Option<(usize, FieldSpec)> {
        let mut offset = 0;
        for f in self.fields {
            if f.name == name {
                return Some((offset, *f));
            }
            offset += f.ty.size();
        }
        None
    }
}

pub static MISSION_COUNT: MessageSpec = MessageSpec {
    id: 44,
    name: "MISSION_COUNT",
    payload_len: 4,
    crc_extra: 221,
    fields: &[
        field("count", FieldType::U16),
        field("target_system", FieldType::U8),
        field("target_component", FieldType::U8),
    ],
};

pub static MISSION_ITEM_INT: MessageSpec = MessageSpec {
    id: 73,
    name: "MISSION_ITEM_INT",
    payload_len: 37,
    crc_extra: 38,
    fields: &[
        field("param1", FieldType::F32),
        field("param2", FieldType::F32),
        field("param3", FieldType::F32),
        field("param4", FieldType::F32),
        deg_e7("x"),
        deg_e7("y"),
        field("z", FieldType::F32),
        field("seq", FieldType::U16),
        field("command", FieldType::U16),
        field("target_system", FieldType::U8),
        field("target_component", FieldType::U8),
        field("frame", FieldType::U8),
        field("current", FieldType::U8),
        field("autocontinue", FieldType::U8),
    ],
};

pub static PARAM_SET: MessageSpec = MessageSpec {
    id: 23,
    name: "PARAM_SET",
    payload_len: 23,
    crc_extra: 168,
    fields: &[
        field("param_value", FieldType::F32),
        field("target_system", FieldType::U8),
        field("target_component", FieldType::U8),
        field("param_id", FieldType::Char(PARAM_ID_LEN)),
        field("param_type", FieldType::U8),
    ],
};

pub static FENCE_POINT: MessageSpec = MessageSpec {
    id: 160,
    name: "FENCE_POINT",
    payload_len: 12,
    crc_extra: 78,
    fields: &[
        field("lat", FieldType::F32),
        field("lng", FieldType::F32),
        field("target_system", FieldType::U8),
        field("target_component", FieldType::U8),
        field("idx", FieldType::U8),
        field("count", FieldType::U8),
    ],
};

pub static RALLY_POINT: MessageSpec = MessageSpec {
    id: 175,
    name: "RALLY_POINT",
    payload_len: 19,
    crc_extra: 138,
    fields: &[
        deg_e7("lat"),
        deg_e7("lng"),
        field("alt", FieldType::I16),
        field("break_alt", FieldType::I16),
        field("land_dir", FieldType::U16),
        field("target_system", FieldType::U8),
        field("target_component", FieldType::U8),
        field("idx", FieldType::U8),
        field("count", FieldType::U8),
        field("flags", FieldType::U8),
    ],
};

pub static COMMAND_LONG: MessageSpec = MessageSpec {
    id: 76,
    name: "COMMAND_LONG",
    payload_len: 33,
    crc_extra: 152,
    fields: &[
        field("param1", FieldType::F32),
        field("param2", FieldType::F32),
        field("param3", FieldType::F32),
        field("param4", FieldType::F32),
        field("param5", FieldType::F32),
        field("param6", FieldType::F32),
        field("param7", FieldType::F32),
        field("command", FieldType::U16),
        field("target_system", FieldType::U8),
        field("target_component", FieldType::U8),
        field("confirmation", FieldType::U8),
    ],
};

// ── MessageKind ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    MissionCount,
    MissionItemInt,
    ParamSet,
    FencePoint,
    RallyPoint,
    CommandLong,
}

impl MessageKind {
    pub const ALL: [MessageKind; 6] = [
        MessageKind::MissionCount,
        MessageKind::MissionItemInt,
        MessageKind::ParamSet,
        MessageKind::FencePoint,
        MessageKind::RallyPoint,
        MessageKind::CommandLong,
    ];

    pub fn spec(self) -> &'static MessageSpec {
        match self {
            MessageKind::MissionCount   => &MISSION_COUNT,
            MessageKind::MissionItemInt => &MISSION_ITEM_INT,
            MessageKind::ParamSet       => &PARAM_SET,
            MessageKind::FencePoint     => &FENCE_POINT,
            MessageKind::RallyPoint     => &RALLY_POINT,
            MessageKind::CommandLong    => &COMMAND_LONG,
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.spec().id == id)
    }
}

// ── Scaling ──────────────────────────────────────────────────────────────────

/// Degrees → degrees × 1e7 as stored in `*_INT` messages.
pub fn degrees_to_e7(degrees: f64) -> i32 {
    (degrees * 1e7).round() as i32
}

pub fn e7_to_degrees(value: i32) -> f64 {
    f64::from(value) / 1e7
}

/// Rejects NaN, infinities and positions off the globe before they are
/// scaled, so a corrupt record never goes out as a plausible item.
pub fn check_position(latitude: f64, longitude: f64) -> Result<(), ProtocolError> {
    let on_globe = latitude.is_finite()
        && longitude.is_finite()
        && latitude.abs() <= 90.0
        && longitude.abs() <= 180.0;
    if on_globe {
        Ok(())
    } else {
        Err(ProtocolError::InvalidPosition { latitude, longitude })
    }
}

// ── Payload structs ──────────────────────────────────────────────────────────

/// Announces how many mission items follow. Targets are always 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MissionCount {
    pub count: u16,
    pub target_system: u8,
    pub target_component: u8,
}

impl MissionCount {
    pub fn new(count: u16) -> Self {
        MissionCount { count, target_system: 0, target_component: 0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MissionItemInt {
    pub param1: f32,
    pub param2: f32,
    pub param3: f32,
    pub param4: f32,
    /// Latitude, degrees × 1e7.
    pub x: i32,
    /// Longitude, degrees × 1e7.
    pub y: i32,
    pub z: f32,
    pub seq: u16,
    pub command: u16,
    pub target_system: u8,
    pub target_component: u8,
    pub frame: u8,
    pub current: u8,
    pub autocontinue: u8,
}

impl MissionItemInt {
    /// Encode a stored waypoint as mission item `seq`.
    ///
    /// Params 1-4 carry speed, acceptance radius, pass radius and yaw. Only
    /// item 0 is marked current.
    pub fn from_waypoint(seq: u16, wp: &Waypoint) -> Result<Self, ProtocolError> {
        check_position(wp.latitude, wp.longitude)?;
        let param = |v: Option<f64>| v.unwrap_or(0.0) as f32;
        Ok(MissionItemInt {
            param1: param(wp.speed),
            param2: param(wp.acceptance_radius),
            param3: param(wp.pass_radius),
            param4: param(wp.yaw),
            x: degrees_to_e7(wp.latitude),
            y: degrees_to_e7(wp.longitude),
            z: param(wp.altitude),
            seq,
            command: command_id(wp.command.as_deref()),
            target_system: 0,
            target_component: 0,
            frame: wp.frame.unwrap_or(MAV_FRAME_GLOBAL_RELATIVE_ALT),
            current: u8::from(seq == 0),
            autocontinue: wp.autocontinue.unwrap_or(1),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSet {
    pub param_value: f32,
    pub target_system: u8,
    pub target_component: u8,
    pub param_id: [u8; PARAM_ID_LEN],
    pub param_type: u8,
}

impl ParamSet {
    /// Name is truncated to 16 bytes or zero-padded.
    pub fn new(name: &str, value: f32) -> Self {
        let mut param_id = [0u8; PARAM_ID_LEN];
        let bytes = name.as_bytes();
        let n = bytes.len().min(PARAM_ID_LEN);
        param_id[..n].copy_from_slice(&bytes[..n]);
        ParamSet {
            param_value: value,
            target_system: 0,
            target_component: 0,
            param_id,
            param_type: MAV_PARAM_TYPE_REAL32,
        }
    }

    /// Parses the textual value as `f32`.
    pub fn from_parameter(param: &VehicleParameter) -> Result<Self, ProtocolError> {
        let value = param.value.trim().parse::<f32>().map_err(|_| {
            ProtocolError::InvalidParamValue {
                name: param.name.clone(),
                value: param.value.clone(),
            }
        })?;
        Ok(Self::new(&param.name, value))
    }

    /// The name up to the first NUL.
    pub fn name(&self) -> String {
        let end = self.param_id.iter().position(|&b| b == 0).unwrap_or(PARAM_ID_LEN);
        String::from_utf8_lossy(&self.param_id[..end]).into_owned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FencePoint {
    pub lat: f32,
    pub lng: f32,
    pub target_system: u8,
    pub target_component: u8,
    pub idx: u8,
    pub count: u8,
}

impl FencePoint {
    pub fn from_point(idx: u8, count: u8, point: &GeofencePoint) -> Result<Self, ProtocolError> {
        check_position(point.latitude, point.longitude)?;
        Ok(FencePoint {
            lat: point.latitude as f32,
            lng: point.longitude as f32,
            target_system: 0,
            target_component: 0,
            idx,
            count,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RallyPoint {
    /// Degrees × 1e7.
    pub lat: i32,
    /// Degrees × 1e7.
    pub lng: i32,
    pub alt: i16,
    pub break_alt: i16,
    pub land_dir: u16,
    pub target_system: u8,
    pub target_component: u8,
    pub idx: u8,
    pub count: u8,
    pub flags: u8,
}

impl RallyPoint {
    /// Unset altitude, break altitude and land direction encode as 0.
    pub fn from_point(idx: u8, count: u8, point: &RallyRecord) -> Result<Self, ProtocolError> {
        check_position(point.latitude, point.longitude)?;
        Ok(RallyPoint {
            lat: degrees_to_e7(point.latitude),
            lng: degrees_to_e7(point.longitude),
            alt: point.altitude.unwrap_or(0.0) as i16,
            break_alt: point.break_altitude.unwrap_or(0.0) as i16,
            land_dir: point.land_direction.unwrap_or(0.0) as u16,
            target_system: 0,
            target_component: 0,
            idx,
            count,
            flags: 0,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandLong {
    pub params: [f32; 7],
    pub command: u16,
    pub target_system: u8,
    pub target_component: u8,
    pub confirmation: u8,
}

impl CommandLong {
    /// First transmission: confirmation is 0.
    pub fn new(command: u16, params: [f32; 7]) -> Self {
        CommandLong { params, command, target_system: 0, target_component: 0, confirmation: 0 }
    }
}

// ── Message ──────────────────────────────────────────────────────────────────

/// One logical message, ready to be framed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    MissionCount(MissionCount),
    MissionItemInt(MissionItemInt),
    ParamSet(ParamSet),
    FencePoint(FencePoint),
    RallyPoint(RallyPoint),
    CommandLong(CommandLong),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::MissionCount(_)   => MessageKind::MissionCount,
            Message::MissionItemInt(_) => MessageKind::MissionItemInt,
            Message::ParamSet(_)       => MessageKind::ParamSet,
            Message::FencePoint(_)     => MessageKind::FencePoint,
            Message::RallyPoint(_)     => MessageKind::RallyPoint,
            Message::CommandLong(_)    => MessageKind::CommandLong,
        }
    }

    pub fn spec(&self) -> &'static MessageSpec {
        self.kind().spec()
    }

    /// Serialize the payload; its length always equals `spec().payload_len`.
    pub fn payload(&self) -> Vec<u8> {
        let mut v = Vec::with_capacity(self.spec().payload_len as usize);
        match self {
            Message::MissionCount(m) => {
                v.extend_from_slice(&m.count.to_le_bytes());
                v.push(m.target_system);
                v.push(m.target_component);
            }
            Message::MissionItemInt(m) => {
                v.extend_from_slice(&m.param1.to_le_bytes());
                v.extend_from_slice(&m.param2.to_le_bytes());
                v.extend_from_slice(&m.param3.to_le_bytes());
                v.extend_from_slice(&m.param4.to_le_bytes());
                v.extend_from_slice(&m.x.to_le_bytes());
                v.extend_from_slice(&m.y.to_le_bytes());
                v.extend_from_slice(&m.z.to_le_bytes());
                v.extend_from_slice(&m.seq.to_le_bytes());
                v.extend_from_slice(&m.command.to_le_bytes());
                v.push(m.target_system);
                v.push(m.target_component);
                v.push(m.frame);
                v.push(m.current);
                v.push(m.autocontinue);
            }
            Message::ParamSet(m) => {
                v.extend_from_slice(&m.param_value.to_le_bytes());
                v.push(m.target_system);
                v.push(m.target_component);
                v.extend_from_slice(&m.param_id);
                v.push(m.param_type);
            }
            Message::FencePoint(m) => {
                v.extend_from_slice(&m.lat.to_le_bytes());
                v.extend_from_slice(&m.lng.to_le_bytes());
                v.push(m.target_system);
                v.push(m.target_component);
                v.push(m.idx);
                v.push(m.count);
            }
            Message::RallyPoint(m) => {
                v.extend_from_slice(&m.lat.to_le_bytes());
                v.extend_from_slice(&m.lng.to_le_bytes());
                v.extend_from_slice(&m.alt.to_le_bytes());
                v.extend_from_slice(&m.break_alt.to_le_bytes());
                v.extend_from_slice(&m.land_dir.to_le_bytes());
                v.push(m.target_system);
                v.push(m.target_component);
                v.push(m.idx);
                v.push(m.count);
                v.push(m.flags);
            }
            Message::CommandLong(m) => {
                for p in &m.params {
                    v.extend_from_slice(&p.to_le_bytes());
                }
                v.extend_from_slice(&m.command.to_le_bytes());
                v.push(m.target_system);
                v.push(m.target_component);
                v.push(m.confirmation);
            }
        }
        v
    }

    /// Parse a payload of `kind`. Returns `None` if `buf` is too short.
    pub fn from_payload(kind: MessageKind, buf: &[u8]) -> Option<Self> {
        let mut r = PayloadReader { buf, pos: 0 };
        let msg = match kind {
            MessageKind::MissionCount => Message::MissionCount(MissionCount {
                count: r.u16()?,
                target_system: r.u8()?,
                target_component: r.u8()?,
            }),
            MessageKind::MissionItemInt => Message::MissionItemInt(MissionItemInt {
                param1: r.f32()?,
                param2: r.f32()?,
                param3: r.f32()?,
                param4: r.f32()?,
                x: r.i32()?,
                y: r.i32()?,
                z: r.f32()?,
                seq: r.u16()?,
                command: r.u16()?,
                target_system: r.u8()?,
                target_component: r.u8()?,
                frame: r.u8()?,
                current: r.u8()?,
                autocontinue: r.u8()?,
            }),
            MessageKind::ParamSet => Message::ParamSet(ParamSet {
                param_value: r.f32()?,
                target_system: r.u8()?,
                target_component: r.u8()?,
                param_id: r.array()?,
                param_type: r.u8()?,
            }),
            MessageKind::FencePoint => Message::FencePoint(FencePoint {
                lat: r.f32()?,
                lng: r.f32()?,
                target_system: r.u8()?,
                target_component: r.u8()?,
                idx: r.u8()?,
                count: r.u8()?,
            }),
            MessageKind::RallyPoint => Message::RallyPoint(RallyPoint {
                lat: r.i32()?,
                lng: r.i32()?,
                alt: r.i16()?,
                break_alt: r.i16()?,
                land_dir: r.u16()?,
                target_system: r.u8()?,
                target_component: r.u8()?,
                idx: r.u8()?,
                count: r.u8()?,
                flags: r.u8()?,
            }),
            MessageKind::CommandLong => Message::CommandLong(CommandLong {
                params: [r.f32()?, r.f32()?, r.f32()?, r.f32()?, r.f32()?, r.f32()?, r.f32()?],
                command: r.u16()?,
                target_system: r.u8()?,
                target_component: r.u8()?,
                confirmation: r.u8()?,
            }),
        };
        Some(msg)
    }
}

// ── Little-endian payload reader ─────────────────────────────────────────────

struct PayloadReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl PayloadReader<'_> {
    fn array<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.buf.get(self.pos..self.pos + N)?.try_into().ok()?;
        self.pos += N;
        Some(bytes)
    }

    fn u8(&mut self) -> Option<u8> {
        self.array::<1>().map(|[b]| b)
    }
    fn u16(&mut self) -> Option<u16> {
        self.array().map(u16::from_le_bytes)
    }
    fn i16(&mut self) -> Option<i16> {
        self.array().map(i16::from_le_bytes)
    }
    fn i32(&mut self) -> Option<i32> {
        self.array().map(i32::from_le_bytes)
    }
    fn f32(&mut self) -> Option<f32> {
        self.array().map(f32::from_le_bytes)
    }
}
