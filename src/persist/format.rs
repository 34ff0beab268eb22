//! Record file format
//!
//! Every persisted file holds exactly one tagged record.
//!
//! ## Layout
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │ Header (15 bytes)                                                    │
//! │   Magic: "WHUB" (4) | Version: u16 (2) | Kind: u8 (1)                │
//! │   BodyCRC: u32 (4) | BodyLen: u32 (4)                                │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │ Body (BodyLen bytes, bincode)                                        │
//! │   kind 1: SourceHistory                                              │
//! │   kind 2: Vec<Observation> (station projection)                      │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//! All integers little-endian.

use crate::error::{HubError, Result};
use crate::store::{Observation, SourceHistory};

/// Magic bytes identifying a weatherhub record file
pub const MAGIC: &[u8; 4] = b"WHUB";

/// Current record format version
pub const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + Kind (1) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 15;

/// Tag identifying what a record body holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordKind {
    SourceHistory = 1,
    StationProjection = 2,
}

impl RecordKind {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(RecordKind::SourceHistory),
            2 => Some(RecordKind::StationProjection),
            _ => None,
        }
    }
}

/// Wrap a body in a record header
pub fn encode_record(kind: RecordKind, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_SIZE + body.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.push(kind as u8);
    out.extend_from_slice(&crc32fast::hash(body).to_le_bytes());
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(body);
    out
}

/// Validate a record header and return its kind and body
pub fn decode_record(bytes: &[u8]) -> Result<(RecordKind, &[u8])> {
    if bytes.len() < HEADER_SIZE {
        return Err(HubError::Corruption(format!(
            "record too short: {} bytes",
            bytes.len()
        )));
    }

    if &bytes[0..4] != MAGIC {
        return Err(HubError::Corruption(format!(
            "invalid magic: expected WHUB, got {:?}",
            &bytes[0..4]
        )));
    }

    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != VERSION {
        return Err(HubError::Corruption(format!(
            "unsupported record version: {}",
            version
        )));
    }

    let kind = RecordKind::from_byte(bytes[6])
        .ok_or_else(|| HubError::Corruption(format!("unknown record kind: {}", bytes[6])))?;

    let stored_crc = u32::from_le_bytes([bytes[7], bytes[8], bytes[9], bytes[10]]);
    let len = u32::from_le_bytes([bytes[11], bytes[12], bytes[13], bytes[14]]) as usize;

    let body = &bytes[HEADER_SIZE..];
    if body.len() != len {
        return Err(HubError::Corruption(format!(
            "length mismatch: header says {}, found {}",
            len,
            body.len()
        )));
    }

    let computed_crc = crc32fast::hash(body);
    if computed_crc != stored_crc {
        return Err(HubError::Corruption(format!(
            "CRC mismatch: stored {:#010x}, computed {:#010x}",
            stored_crc, computed_crc
        )));
    }

    Ok((kind, body))
}

fn expect_kind(bytes: &[u8], expected: RecordKind) -> Result<&[u8]> {
    let (kind, body) = decode_record(bytes)?;
    if kind != expected {
        return Err(HubError::Corruption(format!(
            "expected {:?} record, found {:?}",
            expected, kind
        )));
    }
    Ok(body)
}

// =============================================================================
// Typed records
// =============================================================================

pub fn encode_history(history: &SourceHistory) -> Result<Vec<u8>> {
    let body = bincode::serialize(history)?;
    Ok(encode_record(RecordKind::SourceHistory, &body))
}

pub fn decode_history(bytes: &[u8]) -> Result<SourceHistory> {
    let body = expect_kind(bytes, RecordKind::SourceHistory)?;
    Ok(bincode::deserialize(body)?)
}

pub fn encode_projection<'a>(
    entries: impl IntoIterator<Item = &'a Observation>,
) -> Result<Vec<u8>> {
    let entries: Vec<&Observation> = entries.into_iter().collect();
    let body = bincode::serialize(&entries)?;
    Ok(encode_record(RecordKind::StationProjection, &body))
}

pub fn decode_projection(bytes: &[u8]) -> Result<Vec<Observation>> {
    let body = expect_kind(bytes, RecordKind::StationProjection)?;
    Ok(bincode::deserialize(body)?)
}
