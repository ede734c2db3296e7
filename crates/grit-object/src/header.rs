//! The `"<type> <size>\0"` framing shared by every stored object.

use crate::{ObjectError, ObjectKind};

/// Split a raw object into kind, declared body size, and the offset the
/// body starts at.
pub fn decode(data: &[u8]) -> Result<(ObjectKind, usize, usize), ObjectError> {
    let nul = data
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| ObjectError::BadHeader("no NUL terminator".into()))?;
    let head = &data[..nul];
    let sp = head
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| ObjectError::BadHeader("no space between type and size".into()))?;

    let kind = ObjectKind::from_name(&head[..sp])?;
    let size_text = std::str::from_utf8(&head[sp + 1..])
        .map_err(|_| ObjectError::BadHeader("size is not ASCII".into()))?;
    if size_text.is_empty() || size_text.bytes().any(|b| !b.is_ascii_digit()) {
        return Err(ObjectError::BadHeader(format!("bad size {size_text:?}")));
    }
    let size = size_text
        .parse()
        .map_err(|_| ObjectError::BadHeader(format!("size overflow: {size_text}")))?;

    Ok((kind, size, nul + 1))
}

/// Encode a header for a body of `size` bytes.
pub fn encode(kind: ObjectKind, size: usize) -> Vec<u8> {
    format!("{} {size}\0", kind.name()).into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_typical() {
        let (kind, size, at) = decode(b"tree 33\0rest").unwrap();
        assert_eq!(kind, ObjectKind::Tree);
        assert_eq!(size, 33);
        assert_eq!(at, 8);
    }

    #[test]
    fn encode_decode_identity() {
        for (kind, size) in [
            (ObjectKind::Blob, 0usize),
            (ObjectKind::Commit, 1),
            (ObjectKind::Tag, 987654),
        ] {
            let hdr = encode(kind, size);
            let (k, s, at) = decode(&hdr).unwrap();
            assert_eq!((k, s), (kind, size));
            assert_eq!(at, hdr.len());
        }
    }

    #[test]
    fn decode_rejects_malformed() {
        assert!(decode(b"blob 5").is_err()); // no NUL
        assert!(decode(b"blob5\0").is_err()); // no space
        assert!(decode(b"glob 5\0").is_err()); // bad type
        assert!(decode(b"blob five\0").is_err()); // non-numeric size
        assert!(decode(b"blob -5\0").is_err()); // signed size
        assert!(decode(b"blob \0").is_err()); // empty size
    }
}
