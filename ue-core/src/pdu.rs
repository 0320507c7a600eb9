//! RLS PDU codec (spec §4.A). Five message types share a 4-byte header
//! (`msgType:u8`, `sti:u64` big-endian); bodies are type-specific. Grounded
//! on `lib/rls/rls_pdu.hpp`'s `EMessageType`/`EPduType` tags and its
//! `Encode*`/`Decode*` free functions, translated from the original's
//! `CompoundBuffer`/`OctetView` pair into `bytes::{BytesMut, Bytes, Buf,
//! BufMut}`, which read and write big-endian integers by default the same
//! way the original's octet helpers always serialize in network order.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::CodecError;

const HEADER_LEN: usize = 1 + 8;

/// On-wire message type tag. Numeric values are load-bearing (§4.A).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Heartbeat = 4,
    HeartbeatAck = 5,
    PduTransmission = 6,
    PduTransmissionAck = 7,
}

impl MessageType {
    /// Reserved/deprecated opcodes 0-3 are valid on the wire but carry no
    /// body; the caller must ignore them without error (§4.A).
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            4 => Some(MessageType::Heartbeat),
            5 => Some(MessageType::HeartbeatAck),
            6 => Some(MessageType::PduTransmission),
            7 => Some(MessageType::PduTransmissionAck),
            _ => None,
        }
    }
}

/// `EPduType` in the original: which upper layer a `PDU_TRANSMISSION`
/// belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PduType {
    Rrc = 1,
    Data = 2,
}

impl PduType {
    fn from_byte(b: u8) -> Result<Self, CodecError> {
        match b {
            1 => Ok(PduType::Rrc),
            2 => Ok(PduType::Data),
            other => Err(CodecError::UnknownPduType(other)),
        }
    }
}

/// A simulated 3D position, carried by heartbeats only for cosmetic
/// purposes (the original's `Vector3 simPos`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Decoded RLS message body, tagged union per REDESIGN FLAGS §9 (replaces
/// the original's class hierarchy under `RlsMessage`).
#[derive(Debug, Clone, PartialEq)]
pub enum RlsMessage {
    Heartbeat { sti: u64, pos: SimPosition },
    HeartbeatAck { sti: u64, dbm: i32 },
    PduTransmission {
        sti: u64,
        pdu_type: PduType,
        pdu_id: u32,
        payload: u32,
        pdu: Bytes,
    },
    PduTransmissionAck { sti: u64, pdu_ids: Vec<u32> },
}

impl RlsMessage {
    pub fn sti(&self) -> u64 {
        match self {
            RlsMessage::Heartbeat { sti, .. }
            | RlsMessage::HeartbeatAck { sti, .. }
            | RlsMessage::PduTransmission { sti, .. }
            | RlsMessage::PduTransmissionAck { sti, .. } => *sti,
        }
    }
}

/// Peek `(msgType, sti)` from any well-formed header, reserved opcodes
/// included — this is the only part of decoding the RLS UDP layer needs
/// before it decides whether to dispatch further (§4.A: "Decoder operations
/// produce `(msgType, sti)` from any header; per-type decoders are invoked
/// only after dispatch succeeds").
pub fn decode_header(buffer: &[u8]) -> Result<(u8, u64, &[u8]), CodecError> {
    if buffer.len() < HEADER_LEN {
        return Err(CodecError::Truncated {
            need: HEADER_LEN,
            got: buffer.len(),
        });
    }
    let msg_type_byte = buffer[0];
    let mut rest = &buffer[1..HEADER_LEN];
    let sti = rest.get_u64();
    let body = &buffer[HEADER_LEN..];
    Ok((msg_type_byte, sti, body))
}

fn write_header(buf: &mut BytesMut, msg_type: MessageType, sti: u64) {
    buf.put_u8(msg_type as u8);
    buf.put_u64(sti);
}

pub fn encode_heartbeat(buf: &mut BytesMut, sti: u64, pos: SimPosition) {
    buf.clear();
    write_header(buf, MessageType::Heartbeat, sti);
    buf.put_f64(pos.x);
    buf.put_f64(pos.y);
    buf.put_f64(pos.z);
}

pub fn decode_heartbeat(sti: u64, mut body: &[u8]) -> Result<RlsMessage, CodecError> {
    if body.len() < 24 {
        return Err(CodecError::Truncated {
            need: 24,
            got: body.len(),
        });
    }
    if body.len() > 24 {
        return Err(CodecError::TrailingBytes {
            remaining: body.len() - 24,
        });
    }
    let x = body.get_f64();
    let y = body.get_f64();
    let z = body.get_f64();
    Ok(RlsMessage::Heartbeat {
        sti,
        pos: SimPosition { x, y, z },
    })
}

pub fn encode_heartbeat_ack(buf: &mut BytesMut, sti: u64, dbm: i32) {
    buf.clear();
    write_header(buf, MessageType::HeartbeatAck, sti);
    buf.put_i32(dbm);
}

pub fn decode_heartbeat_ack(sti: u64, mut body: &[u8]) -> Result<RlsMessage, CodecError> {
    if body.len() < 4 {
        return Err(CodecError::Truncated {
            need: 4,
            got: body.len(),
        });
    }
    if body.len() > 4 {
        return Err(CodecError::TrailingBytes {
            remaining: body.len() - 4,
        });
    }
    let dbm = body.get_i32();
    Ok(RlsMessage::HeartbeatAck { sti, dbm })
}

pub fn encode_pdu_transmission(
    buf: &mut BytesMut,
    sti: u64,
    pdu_type: PduType,
    pdu_id: u32,
    payload: u32,
    pdu: &[u8],
) {
    buf.clear();
    write_header(buf, MessageType::PduTransmission, sti);
    buf.put_u8(pdu_type as u8);
    buf.put_u32(pdu_id);
    buf.put_u32(payload);
    buf.put_u32(pdu.len() as u32);
    buf.put_slice(pdu);
}

pub fn decode_pdu_transmission(sti: u64, mut body: &[u8]) -> Result<RlsMessage, CodecError> {
    if body.len() < 1 + 4 + 4 + 4 {
        return Err(CodecError::Truncated {
            need: 13,
            got: body.len(),
        });
    }
    let pdu_type = PduType::from_byte(body.get_u8())?;
    let pdu_id = body.get_u32();
    let payload = body.get_u32();
    let len = body.get_u32() as usize;
    if body.remaining() < len {
        return Err(CodecError::Truncated {
            need: len,
            got: body.remaining(),
        });
    }
    if body.remaining() > len {
        return Err(CodecError::TrailingBytes {
            remaining: body.remaining() - len,
        });
    }
    let pdu = Bytes::copy_from_slice(body.chunk());
    Ok(RlsMessage::PduTransmission {
        sti,
        pdu_type,
        pdu_id,
        payload,
        pdu,
    })
}

pub fn encode_pdu_transmission_ack(buf: &mut BytesMut, sti: u64, pdu_ids: &[u32]) {
    buf.clear();
    write_header(buf, MessageType::PduTransmissionAck, sti);
    buf.put_u32(pdu_ids.len() as u32);
    for id in pdu_ids {
        buf.put_u32(*id);
    }
}

pub fn decode_pdu_transmission_ack(sti: u64, mut body: &[u8]) -> Result<RlsMessage, CodecError> {
    if body.len() < 4 {
        return Err(CodecError::Truncated {
            need: 4,
            got: body.len(),
        });
    }
    let count = body.get_u32() as usize;
    if body.remaining() < count * 4 {
        return Err(CodecError::Truncated {
            need: count * 4,
            got: body.remaining(),
        });
    }
    if body.remaining() > count * 4 {
        return Err(CodecError::TrailingBytes {
            remaining: body.remaining() - count * 4,
        });
    }
    let mut pdu_ids = Vec::with_capacity(count);
    for _ in 0..count {
        pdu_ids.push(body.get_u32());
    }
    Ok(RlsMessage::PduTransmissionAck { sti, pdu_ids })
}

/// Full decode: header dispatch followed by the matching body decoder.
/// Reserved opcodes decode to `Ok(None)` per §4.A ("must be ignored without
/// error"); anything else that fails to consume the whole datagram is a
/// decode error (§4.A "Failing to consume exactly the datagram length").
pub fn decode(buffer: &[u8]) -> Result<Option<RlsMessage>, CodecError> {
    let (msg_type_byte, sti, body) = decode_header(buffer)?;
    let msg_type = match MessageType::from_byte(msg_type_byte) {
        Some(mt) => mt,
        None => return Ok(None),
    };
    let msg = match msg_type {
        MessageType::Heartbeat => decode_heartbeat(sti, body)?,
        MessageType::HeartbeatAck => decode_heartbeat_ack(sti, body)?,
        MessageType::PduTransmission => decode_pdu_transmission(sti, body)?,
        MessageType::PduTransmissionAck => decode_pdu_transmission_ack(sti, body)?,
    };
    Ok(Some(msg))
}
