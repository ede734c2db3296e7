//! Per-entry headers inside a pack stream.
//!
//! Every entry opens with a type-and-size varint: bits 6-4 of the first
//! byte carry the type code, the rest of the bits accumulate the inflated
//! payload size seven bits at a time. Delta entries follow the varint with
//! their base reference, either a backward distance (OFS_DELTA) or a full
//! base id (REF_DELTA). The zlib stream starts right after.

use grit_hash::{HashKind, ObjectId};
use grit_object::ObjectKind;

use crate::PackError;

/// What a pack entry stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A complete object of the given kind.
    Plain(ObjectKind),
    /// Delta against an earlier entry in the same pack, resolved to its
    /// absolute offset.
    OfsDelta { base_at: u64 },
    /// Delta against a base named by id, possibly held outside this pack.
    RefDelta { base: ObjectId },
}

/// A decoded entry header.
#[derive(Debug, Clone)]
pub struct EntryHeader {
    pub kind: EntryKind,
    /// Size of the payload once inflated.
    pub inflated_len: u64,
    /// Bytes the header occupies; the zlib stream starts right after.
    pub header_len: usize,
}

/// On-wire type code for a non-delta entry.
pub fn type_code(kind: ObjectKind) -> u8 {
    match kind {
        ObjectKind::Commit => 1,
        ObjectKind::Tree => 2,
        ObjectKind::Blob => 3,
        ObjectKind::Tag => 4,
    }
}

/// On-wire type code for an OFS_DELTA entry.
pub const OFS_DELTA_CODE: u8 = 6;

/// On-wire type code for a REF_DELTA entry.
pub const REF_DELTA_CODE: u8 = 7;

/// Decode the entry header starting `data[0]`, where `data` is the pack
/// contents from the entry onward and `entry_at` its absolute offset
/// (needed to resolve an OFS_DELTA distance).
pub fn decode(data: &[u8], entry_at: u64, hash: HashKind) -> Result<EntryHeader, PackError> {
    let corrupt = || PackError::CorruptEntry(entry_at);

    let mut pos = 0;
    let mut byte = *data.first().ok_or_else(corrupt)?;
    pos += 1;

    let code = (byte >> 4) & 0x07;
    let mut inflated_len = u64::from(byte & 0x0f);
    let mut shift = 4u32;
    while byte & 0x80 != 0 {
        byte = *data.get(pos).ok_or_else(corrupt)?;
        pos += 1;
        if shift >= u64::BITS {
            return Err(corrupt());
        }
        inflated_len |= u64::from(byte & 0x7f) << shift;
        shift += 7;
    }

    let kind = match code {
        1 => EntryKind::Plain(ObjectKind::Commit),
        2 => EntryKind::Plain(ObjectKind::Tree),
        3 => EntryKind::Plain(ObjectKind::Blob),
        4 => EntryKind::Plain(ObjectKind::Tag),
        OFS_DELTA_CODE => {
            let mut byte = *data.get(pos).ok_or_else(corrupt)?;
            pos += 1;
            let mut distance = u64::from(byte & 0x7f);
            while byte & 0x80 != 0 {
                byte = *data.get(pos).ok_or_else(corrupt)?;
                pos += 1;
                distance = (distance.checked_add(1).ok_or_else(corrupt)? << 7)
                    | u64::from(byte & 0x7f);
            }
            // The base must lie before this entry.
            let base_at = entry_at.checked_sub(distance).ok_or_else(corrupt)?;
            if distance == 0 {
                return Err(corrupt());
            }
            EntryKind::OfsDelta { base_at }
        }
        REF_DELTA_CODE => {
            let digest = data
                .get(pos..pos + hash.digest_len())
                .ok_or_else(corrupt)?;
            pos += hash.digest_len();
            let base = ObjectId::from_raw(digest, hash).map_err(|_| corrupt())?;
            EntryKind::RefDelta { base }
        }
        _ => return Err(corrupt()),
    };

    Ok(EntryHeader {
        kind,
        inflated_len,
        header_len: pos,
    })
}

/// Encode the type-and-size varint. Delta entries append their base
/// reference separately.
pub fn encode(code: u8, inflated_len: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(10);
    let mut rest = inflated_len;
    let mut byte = (code << 4) | (rest & 0x0f) as u8;
    rest >>= 4;
    while rest > 0 {
        out.push(byte | 0x80);
        byte = (rest & 0x7f) as u8;
        rest >>= 7;
    }
    out.push(byte);
    out
}

/// Encode an OFS_DELTA backward distance (big-endian 7-bit groups with a
/// +1 bias on every continuation).
pub fn encode_distance(distance: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(10);
    let mut rest = distance;
    out.push((rest & 0x7f) as u8);
    rest >>= 7;
    while rest > 0 {
        rest -= 1;
        out.push(0x80 | (rest & 0x7f) as u8);
        rest >>= 7;
    }
    out.reverse();
    out
}
