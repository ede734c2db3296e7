//! The delta payload carried by OFS_DELTA and REF_DELTA entries.
//!
//! A delta stream opens with two varint sizes (base, then target) and then
//! runs instructions until exhausted. A copy instruction (high bit set)
//! pulls a range out of the base; its low seven bits say which offset and
//! size bytes follow. An insert instruction (opcode 1-127) carries that
//! many literal bytes. Opcode 0 is reserved and rejected.

use std::collections::HashMap;

use crate::PackError;

/// Window the differ indexes the base with.
const SLICE: usize = 16;

/// Largest range one copy instruction can express (24-bit size field).
const MAX_COPY: usize = 0x00ff_ffff;

/// Decode the 7-bit little-endian varint used for the two header sizes.
/// Returns the value and the bytes consumed, or `None` if the input runs
/// out mid-number or keeps continuing past a `u64`.
pub fn read_size(data: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;
    let mut used = 0;
    loop {
        let byte = *data.get(used)?;
        let shift = 7 * used as u32;
        if shift >= u64::BITS {
            return None;
        }
        value |= u64::from(byte & 0x7f) << shift;
        used += 1;
        if byte & 0x80 == 0 {
            return Some((value, used));
        }
    }
}

/// Append the varint encoding of `value`.
pub fn write_size(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            return;
        }
    }
}

fn truncated(at: usize, what: &str) -> PackError {
    PackError::BadDelta {
        at,
        reason: format!("truncated {what}"),
    }
}

/// Gather a little-endian field whose bytes are present only where `cmd`
/// carries the matching presence bit, starting at `first_bit`.
fn packed_field(
    delta: &[u8],
    pos: &mut usize,
    cmd: u8,
    first_bit: u8,
    width: u8,
) -> Result<u64, PackError> {
    let mut value = 0u64;
    for i in 0..width {
        if cmd & (1 << (first_bit + i)) != 0 {
            let byte = *delta
                .get(*pos)
                .ok_or_else(|| truncated(*pos, "copy instruction"))?;
            *pos += 1;
            value |= u64::from(byte) << (8 * i);
        }
    }
    Ok(value)
}

/// Rebuild the target from `base` and a delta stream.
///
/// Both header sizes are enforced: the base must be exactly as long as the
/// delta claims, and the output must come out exactly as long as promised.
/// Every copy range is bounds-checked against the base.
pub fn apply(base: &[u8], delta: &[u8]) -> Result<Vec<u8>, PackError> {
    let (base_len, used) = read_size(delta).ok_or_else(|| truncated(0, "base size"))?;
    let mut pos = used;
    let (target_len, used) =
        read_size(&delta[pos..]).ok_or_else(|| truncated(pos, "target size"))?;
    pos += used;

    if base_len != base.len() as u64 {
        return Err(PackError::BadDelta {
            at: 0,
            reason: format!("base is {} bytes, delta expects {base_len}", base.len()),
        });
    }

    let mut out = Vec::with_capacity(target_len as usize);
    while pos < delta.len() {
        let at = pos;
        let cmd = delta[pos];
        pos += 1;

        if cmd & 0x80 != 0 {
            let offset = packed_field(delta, &mut pos, cmd, 0, 4)? as usize;
            let mut size = packed_field(delta, &mut pos, cmd, 4, 3)? as usize;
            if size == 0 {
                size = 0x10000;
            }
            let range = offset
                .checked_add(size)
                .and_then(|end| base.get(offset..end))
                .ok_or_else(|| PackError::BadDelta {
                    at,
                    reason: format!(
                        "copy of {size} bytes at {offset} overruns a {}-byte base",
                        base.len()
                    ),
                })?;
            out.extend_from_slice(range);
        } else if cmd != 0 {
            let len = cmd as usize;
            let literal = delta
                .get(pos..pos + len)
                .ok_or_else(|| truncated(at, "insert data"))?;
            out.extend_from_slice(literal);
            pos += len;
        } else {
            return Err(PackError::BadDelta {
                at,
                reason: "reserved opcode 0".into(),
            });
        }
    }

    if out.len() as u64 != target_len {
        return Err(PackError::BadDelta {
            at: delta.len(),
            reason: format!("output is {} bytes, delta promised {target_len}", out.len()),
        });
    }
    Ok(out)
}

/// Append one copy instruction. A size of exactly 0x10000 is stored with
/// all size bits clear, which is how the format spells that length.
pub fn encode_copy(out: &mut Vec<u8>, offset: usize, size: usize) {
    let stored = if size == 0x10000 { 0 } else { size };
    let mut cmd = 0x80u8;
    let mut tail = [0u8; 7];
    let mut n = 0;
    for i in 0..4 {
        let byte = ((offset >> (8 * i)) & 0xff) as u8;
        if byte != 0 {
            cmd |= 1 << i;
            tail[n] = byte;
            n += 1;
        }
    }
    for i in 0..3 {
        let byte = ((stored >> (8 * i)) & 0xff) as u8;
        if byte != 0 {
            cmd |= 1 << (4 + i);
            tail[n] = byte;
            n += 1;
        }
    }
    out.push(cmd);
    out.extend_from_slice(&tail[..n]);
}

/// Append one insert instruction carrying 1-127 literal bytes.
pub fn encode_insert(out: &mut Vec<u8>, data: &[u8]) {
    debug_assert!(!data.is_empty() && data.len() <= 127);
    out.push(data.len() as u8);
    out.extend_from_slice(data);
}

/// Produce a delta that rewrites `source` into `target`.
///
/// The source is indexed in fixed [`SLICE`]-byte windows; matching windows
/// in the target become copies, extended forward as far as the bytes agree,
/// and everything between matches becomes inserts.
pub fn diff(source: &[u8], target: &[u8]) -> Vec<u8> {
    let mut delta = Vec::new();
    write_size(&mut delta, source.len() as u64);
    write_size(&mut delta, target.len() as u64);

    let index = slice_index(source);
    let mut literal: Vec<u8> = Vec::new();
    let mut at = 0;

    while at < target.len() {
        if target.len() - at >= SLICE {
            if let Some(&from) = index.get(&target[at..at + SLICE]) {
                let len = common_run(source, from, target, at);
                drain_literal(&mut delta, &mut literal);
                let mut emitted = 0;
                while emitted < len {
                    let step = (len - emitted).min(MAX_COPY);
                    encode_copy(&mut delta, from + emitted, step);
                    emitted += step;
                }
                at += len;
                continue;
            }
        }
        literal.push(target[at]);
        at += 1;
        if literal.len() == 127 {
            drain_literal(&mut delta, &mut literal);
        }
    }

    drain_literal(&mut delta, &mut literal);
    delta
}

/// Map each non-overlapping source window to its first occurrence.
fn slice_index(source: &[u8]) -> HashMap<&[u8], usize> {
    let mut index = HashMap::new();
    if source.len() >= SLICE {
        for from in (0..=source.len() - SLICE).step_by(SLICE) {
            index.entry(&source[from..from + SLICE]).or_insert(from);
        }
    }
    index
}

/// Length of the agreement between `source[from..]` and `target[at..]`,
/// at least one full window.
fn common_run(source: &[u8], from: usize, target: &[u8], at: usize) -> usize {
    let cap = (source.len() - from).min(target.len() - at);
    let mut len = SLICE;
    while len < cap && source[from + len] == target[at + len] {
        len += 1;
    }
    len
}

fn drain_literal(delta: &mut Vec<u8>, literal: &mut Vec<u8>) {
    for chunk in literal.chunks(127) {
        encode_insert(delta, chunk);
    }
    literal.clear();
}
