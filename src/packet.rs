//! Fixed-length command packet codec.
//!
//! Every exchange with the controller is one packet of `Generation::packet_len`
//! bytes, zero-padded past the payload:
//!
//! | Offset | Content                                        |
//! | ------ | ---------------------------------------------- |
//! | 0      | `0x02` header, doubling as the HID report ID   |
//! | 1      | Command code                                   |
//! | 2..    | Command payload                                |
//!
//! Color commands put the sequence id at offset 2, the big-endian 24-bit zone
//! mask at offsets 3..6 and their colors from offset 6 on. How colors are
//! packed depends on the controller generation: the 13 R3 carries full 8-bit
//! channels in 12-byte packets, older controllers pack two channels per byte
//! in 9-byte packets.

use std::fmt::{self, Display, Formatter};

use bytes::{BufMut, Bytes, BytesMut};

use crate::command::{Command, PowerState, ResetKind, Rgb, MIN_TEMPO};
use crate::zone::ZoneMask;
use crate::{Error, Result};

/// Header byte carried by every command packet.
///
/// hidapi treats the first byte of a write as the HID report ID, so packets
/// reach the controller as a `SET_REPORT` on report `0x02` without further
/// framing.
pub const PACKET_HEADER: u8 = 0x02;

/// Highest zone mask the 24-bit wire field can carry.
pub const ZONE_FIELD_MAX: u32 = 0xff_ffff;

const CODE_OFFSET: usize = 1;
const SEQUENCE_OFFSET: usize = 2;
const ZONE_OFFSET: usize = 3;
const COLOR_OFFSET: usize = 6;

/// Wire command codes.
pub mod codes {
    pub const MORPH_COLOR: u8 = 0x1;
    pub const BLINK_COLOR: u8 = 0x2;
    pub const SET_COLOR: u8 = 0x3;
    pub const LOOP_SEQUENCE: u8 = 0x4;
    pub const EXECUTE: u8 = 0x5;
    pub const GET_STATUS: u8 = 0x6;
    pub const RESET: u8 = 0x7;
    pub const SAVE_NEXT: u8 = 0x8;
    pub const SAVE: u8 = 0x9;
    pub const SET_TEMPO: u8 = 0xe;
}

/// Controller status, reported in the first byte of a read.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Status {
    /// Ready for the next command.
    Ready,
    /// Still processing, try again later.
    Busy,
    /// The last command was not understood.
    UnknownCommand,
    /// Status byte outside the documented set.
    Other(u8),
}

impl Status {
    pub fn from_byte(byte: u8) -> Status {
        match byte {
            0x10 => Status::Ready,
            0x11 => Status::Busy,
            0x12 => Status::UnknownCommand,
            other => Status::Other(other),
        }
    }

    pub const fn is_ready(self) -> bool {
        matches!(self, Status::Ready)
    }
}

/// How color channels are carried on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ColorDepth {
    /// 4-bit channels, two per byte.
    Nibble,
    /// Full 8-bit channels.
    Byte,
}

impl ColorDepth {
    /// Payload bytes of a single color.
    const fn single_len(self) -> usize {
        match self {
            ColorDepth::Nibble => 2,
            ColorDepth::Byte => 3,
        }
    }

    /// Payload bytes of a morph color pair.
    const fn pair_len(self) -> usize {
        match self {
            ColorDepth::Nibble => 3,
            ColorDepth::Byte => 6,
        }
    }

    fn put_single(self, buf: &mut BytesMut, color: Rgb) {
        match self {
            ColorDepth::Nibble => {
                buf.put_u8(to_nibble(color.r) << 4 | to_nibble(color.g));
                buf.put_u8(to_nibble(color.b) << 4);
            },
            ColorDepth::Byte => {
                buf.put_u8(color.r);
                buf.put_u8(color.g);
                buf.put_u8(color.b);
            },
        }
    }

    fn put_pair(self, buf: &mut BytesMut, start: Rgb, end: Rgb) {
        match self {
            ColorDepth::Nibble => {
                buf.put_u8(to_nibble(start.r) << 4 | to_nibble(start.g));
                buf.put_u8(to_nibble(start.b) << 4 | to_nibble(end.r));
                buf.put_u8(to_nibble(end.g) << 4 | to_nibble(end.b));
            },
            ColorDepth::Byte => {
                self.put_single(buf, start);
                self.put_single(buf, end);
            },
        }
    }

    /// Read a single color from the start of `payload`.
    ///
    /// The payload must hold at least `single_len` bytes.
    fn read_single(self, payload: &[u8]) -> Rgb {
        match self {
            ColorDepth::Nibble => Rgb {
                r: from_nibble(payload[0] >> 4),
                g: from_nibble(payload[0] & 0xf),
                b: from_nibble(payload[1] >> 4),
            },
            ColorDepth::Byte => Rgb { r: payload[0], g: payload[1], b: payload[2] },
        }
    }

    /// Read a morph color pair from the start of `payload`.
    fn read_pair(self, payload: &[u8]) -> (Rgb, Rgb) {
        match self {
            ColorDepth::Nibble => {
                let start = Rgb {
                    r: from_nibble(payload[0] >> 4),
                    g: from_nibble(payload[0] & 0xf),
                    b: from_nibble(payload[1] >> 4),
                };
                let end = Rgb {
                    r: from_nibble(payload[1] & 0xf),
                    g: from_nibble(payload[2] >> 4),
                    b: from_nibble(payload[2] & 0xf),
                };
                (start, end)
            },
            ColorDepth::Byte => (self.read_single(payload), self.read_single(&payload[3..])),
        }
    }
}

impl Display for ColorDepth {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ColorDepth::Nibble => f.write_str("4-bit"),
            ColorDepth::Byte => f.write_str("8-bit"),
        }
    }
}

/// Scale an 8-bit channel down to a nibble, truncating.
fn to_nibble(channel: u8) -> u8 {
    (u16::from(channel) * 15 / 255) as u8
}

/// Scale a nibble back up to an 8-bit channel.
fn from_nibble(nibble: u8) -> u8 {
    nibble * 17
}

/// Packet layout of one controller generation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Generation {
    packet_len: usize,
    color_depth: ColorDepth,
}

impl Generation {
    /// 12-byte packets with full 8-bit channels, as spoken by the
    /// Alienware 13 R3.
    pub const MODERN: Generation =
        Generation { packet_len: 12, color_depth: ColorDepth::Byte };

    /// 9-byte packets with nibble-packed channels, as spoken by older AlienFX
    /// controllers.
    pub const LEGACY: Generation =
        Generation { packet_len: 9, color_depth: ColorDepth::Nibble };

    /// Custom layout for controllers beyond the two known generations.
    ///
    /// The length must at least fit the largest payload, a morph color pair.
    pub fn new(packet_len: usize, color_depth: ColorDepth) -> Result<Generation> {
        if packet_len < COLOR_OFFSET + color_depth.pair_len() {
            return Err(Error::UnsupportedLayout { packet_len, color_depth });
        }
        Ok(Generation { packet_len, color_depth })
    }

    pub const fn packet_len(&self) -> usize {
        self.packet_len
    }

    pub const fn color_depth(&self) -> ColorDepth {
        self.color_depth
    }

    /// Encode a command into its wire packet.
    ///
    /// Validation happens before any bytes are produced: tempos below
    /// [`MIN_TEMPO`] and zone masks beyond the 24-bit field are rejected
    /// without a packet.
    pub fn encode(&self, command: &Command) -> Result<Bytes> {
        match *command {
            Command::SetTempo(tempo) if tempo < MIN_TEMPO => {
                return Err(Error::InvalidTempo(i64::from(tempo)));
            },
            Command::MorphColor { zones, .. }
            | Command::BlinkColor { zones, .. }
            | Command::SetColor { zones, .. }
                if zones.raw() > ZONE_FIELD_MAX =>
            {
                return Err(Error::InvalidZoneMask(zones.raw()));
            },
            _ => (),
        }

        let mut buf = BytesMut::with_capacity(self.packet_len);
        buf.put_u8(PACKET_HEADER);
        buf.put_u8(command.code());

        match *command {
            Command::MorphColor { sequence, zones, start, end } => {
                buf.put_u8(sequence);
                put_zones(&mut buf, zones);
                self.color_depth.put_pair(&mut buf, start, end);
            },
            Command::BlinkColor { sequence, zones, color }
            | Command::SetColor { sequence, zones, color } => {
                buf.put_u8(sequence);
                put_zones(&mut buf, zones);
                self.color_depth.put_single(&mut buf, color);
            },
            Command::Reset(kind) => buf.put_u8(kind.code()),
            Command::SaveNext(state) => buf.put_u8(state.code()),
            Command::SetTempo(tempo) => buf.put_u16(tempo),
            Command::LoopSequence | Command::Execute | Command::GetStatus | Command::Save => (),
        }

        buf.resize(self.packet_len, 0);
        Ok(buf.freeze())
    }

    /// Decode a wire packet back into a structured description.
    ///
    /// Unknown command codes decode into [`DecodedPacket::Unknown`] rather
    /// than an error; only a length mismatch fails.
    pub fn decode(&self, packet: &[u8]) -> Result<DecodedPacket> {
        if packet.len() != self.packet_len {
            return Err(Error::BadPacketLength {
                expected: self.packet_len,
                actual: packet.len(),
            });
        }

        let payload = &packet[COLOR_OFFSET..];
        let decoded = match packet[CODE_OFFSET] {
            codes::MORPH_COLOR => {
                let (start, end) = self.color_depth.read_pair(payload);
                DecodedPacket::MorphColor {
                    sequence: packet[SEQUENCE_OFFSET],
                    zones: read_zones(packet),
                    start,
                    end,
                }
            },
            codes::BLINK_COLOR => DecodedPacket::BlinkColor {
                sequence: packet[SEQUENCE_OFFSET],
                zones: read_zones(packet),
                color: self.color_depth.read_single(payload),
            },
            codes::SET_COLOR => DecodedPacket::SetColor {
                sequence: packet[SEQUENCE_OFFSET],
                zones: read_zones(packet),
                color: self.color_depth.read_single(payload),
            },
            codes::LOOP_SEQUENCE => DecodedPacket::LoopSequence,
            codes::EXECUTE => DecodedPacket::Execute,
            codes::GET_STATUS => DecodedPacket::GetStatus,
            codes::RESET => DecodedPacket::Reset { code: packet[SEQUENCE_OFFSET] },
            codes::SAVE_NEXT => DecodedPacket::SaveNext { state: packet[SEQUENCE_OFFSET] },
            codes::SAVE => DecodedPacket::Save,
            codes::SET_TEMPO => DecodedPacket::SetTempo {
                millis: u16::from_be_bytes([packet[2], packet[3]]),
            },
            code => DecodedPacket::Unknown { code, packet: packet.to_vec() },
        };

        Ok(decoded)
    }
}

impl Default for Generation {
    fn default() -> Generation {
        Generation::MODERN
    }
}

/// Write the 24-bit zone mask in big-endian order.
fn put_zones(buf: &mut BytesMut, zones: ZoneMask) {
    let raw = zones.raw();
    buf.put_u8((raw >> 16) as u8);
    buf.put_u8((raw >> 8) as u8);
    buf.put_u8(raw as u8);
}

fn read_zones(packet: &[u8]) -> ZoneMask {
    let raw = u32::from(packet[ZONE_OFFSET]) << 16
        | u32::from(packet[ZONE_OFFSET + 1]) << 8
        | u32::from(packet[ZONE_OFFSET + 2]);
    ZoneMask::from_raw(raw)
}

/// Structured description of a wire packet, mainly for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedPacket {
    MorphColor { sequence: u8, zones: ZoneMask, start: Rgb, end: Rgb },
    BlinkColor { sequence: u8, zones: ZoneMask, color: Rgb },
    SetColor { sequence: u8, zones: ZoneMask, color: Rgb },
    LoopSequence,
    Execute,
    GetStatus,
    Reset { code: u8 },
    SaveNext { state: u8 },
    Save,
    SetTempo { millis: u16 },
    /// Command code outside the known set, with the full packet kept for
    /// inspection.
    Unknown { code: u8, packet: Vec<u8> },
}

impl Display for DecodedPacket {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DecodedPacket::MorphColor { sequence, zones, start, end } => {
                write!(f, "MORPH_COLOR: SEQUENCE {sequence}, ZONES {zones}, {start} -> {end}")
            },
            DecodedPacket::BlinkColor { sequence, zones, color } => {
                write!(f, "BLINK_COLOR: SEQUENCE {sequence}, ZONES {zones}, {color}")
            },
            DecodedPacket::SetColor { sequence, zones, color } => {
                write!(f, "SET_COLOR: SEQUENCE {sequence}, ZONES {zones}, {color}")
            },
            DecodedPacket::LoopSequence => f.write_str("LOOP_SEQUENCE"),
            DecodedPacket::Execute => f.write_str("EXECUTE"),
            DecodedPacket::GetStatus => f.write_str("GET_STATUS"),
            DecodedPacket::Reset { code } => match ResetKind::from_code(*code) {
                Some(kind) => write!(f, "RESET: {}", kind.name()),
                None => write!(f, "RESET: UNKNOWN_RESET_CODE({code:#x})"),
            },
            DecodedPacket::SaveNext { state } => match PowerState::from_code(*state) {
                Some(state) => write!(f, "SAVE_NEXT: {}", state.name()),
                None => write!(f, "SAVE_NEXT: UNKNOWN_POWER_STATE({state:#x})"),
            },
            DecodedPacket::Save => f.write_str("SAVE"),
            DecodedPacket::SetTempo { millis } => write!(f, "SET_TEMPO: {millis} ms"),
            DecodedPacket::Unknown { code, packet } => {
                write!(f, "UNKNOWN_COMMAND {code:#04x} IN {packet:02x?}")
            },
        }
    }
}
