use std::fmt;
use std::str::FromStr;

use crate::{hex, HashError, HashKind};

/// The identity of a stored object: the hash of its canonical encoding.
///
/// Carries the digest inline, tagged by algorithm. Ids order by their raw
/// digest bytes, which matches the sort order used by pack indexes and
/// fan-out directories.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectId {
    Sha1([u8; 20]),
    Sha256([u8; 32]),
}

impl ObjectId {
    pub const ZERO_SHA1: Self = Self::Sha1([0u8; 20]);
    pub const ZERO_SHA256: Self = Self::Sha256([0u8; 32]);

    /// Wrap a raw digest of the length `kind` requires.
    pub fn from_raw(raw: &[u8], kind: HashKind) -> Result<Self, HashError> {
        if raw.len() != kind.digest_len() {
            return Err(HashError::BadDigestLength {
                expected: kind.digest_len(),
                found: raw.len(),
            });
        }
        Ok(match kind {
            HashKind::Sha1 => {
                let mut d = [0u8; 20];
                d.copy_from_slice(raw);
                Self::Sha1(d)
            }
            HashKind::Sha256 => {
                let mut d = [0u8; 32];
                d.copy_from_slice(raw);
                Self::Sha256(d)
            }
        })
    }

    /// Parse a full hex id; the algorithm is implied by the length
    /// (40 chars for SHA-1, 64 for SHA-256).
    pub fn parse_hex(s: &str) -> Result<Self, HashError> {
        let kind = HashKind::by_hex_len(s.len()).ok_or(HashError::BadHexLength {
            expected: 40,
            found: s.len(),
        })?;
        match kind {
            HashKind::Sha1 => {
                let mut d = [0u8; 20];
                hex::decode_into(s.as_bytes(), &mut d)?;
                Ok(Self::Sha1(d))
            }
            HashKind::Sha256 => {
                let mut d = [0u8; 32];
                hex::decode_into(s.as_bytes(), &mut d)?;
                Ok(Self::Sha256(d))
            }
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::Sha1(d) => d,
            Self::Sha256(d) => d,
        }
    }

    pub fn kind(&self) -> HashKind {
        match self {
            Self::Sha1(_) => HashKind::Sha1,
            Self::Sha256(_) => HashKind::Sha256,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.bytes().iter().all(|&b| b == 0)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes())
    }

    /// First digest byte, the fan-out bucket this id falls into.
    pub fn lead_byte(&self) -> u8 {
        self.bytes()[0]
    }

    /// Relative path of this object in a loose store: `"ab/cdef..."`.
    pub fn fanout_path(&self) -> String {
        let h = self.to_hex();
        format!("{}/{}", &h[..2], &h[2..])
    }

    /// Whether the hex form begins with `prefix` (case-insensitive).
    pub fn has_hex_prefix(&self, prefix: &str) -> bool {
        self.to_hex().starts_with(&prefix.to_ascii_lowercase())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", &self.to_hex()[..8])
    }
}

impl FromStr for ObjectId {
    type Err = HashError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_hex(s)
    }
}
