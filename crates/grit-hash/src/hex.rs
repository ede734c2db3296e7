//! Lowercase hex codec for object ids.

use crate::HashError;

const DIGITS: &[u8; 16] = b"0123456789abcdef";

fn nibble(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Encode `raw` as a lowercase hex string.
pub fn encode(raw: &[u8]) -> String {
    let mut out = String::with_capacity(raw.len() * 2);
    for &b in raw {
        out.push(DIGITS[(b >> 4) as usize] as char);
        out.push(DIGITS[(b & 0x0f) as usize] as char);
    }
    out
}

/// Decode a hex string into `out`. `hex` must be exactly `out.len() * 2`
/// characters; case is ignored.
pub fn decode_into(hex: &[u8], out: &mut [u8]) -> Result<(), HashError> {
    if hex.len() != out.len() * 2 {
        return Err(HashError::BadHexLength {
            expected: out.len() * 2,
            found: hex.len(),
        });
    }
    for (i, slot) in out.iter_mut().enumerate() {
        let hi = nibble(hex[i * 2]).ok_or(HashError::BadHexChar {
            index: i * 2,
            byte: hex[i * 2],
        })?;
        let lo = nibble(hex[i * 2 + 1]).ok_or(HashError::BadHexChar {
            index: i * 2 + 1,
            byte: hex[i * 2 + 1],
        })?;
        *slot = (hi << 4) | lo;
    }
    Ok(())
}

/// Decode an even-length hex string to a fresh buffer.
pub fn decode(hex: &[u8]) -> Result<Vec<u8>, HashError> {
    if hex.len() % 2 != 0 {
        return Err(HashError::BadHexLength {
            expected: hex.len() + 1,
            found: hex.len(),
        });
    }
    let mut out = vec![0u8; hex.len() / 2];
    decode_into(hex, &mut out)?;
    Ok(out)
}

/// True when every byte of `s` is a hex digit.
pub fn is_hex_digits(s: &[u8]) -> bool {
    !s.is_empty() && s.iter().all(|&b| nibble(b).is_some())
}
