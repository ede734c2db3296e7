use crate::ObjectId;

/// Hash algorithm an object store is keyed by.
///
/// A store uses exactly one algorithm for all of its objects; mixing
/// algorithms within one store is not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashKind {
    /// SHA-1, 20-byte digests. The interoperable default.
    #[default]
    Sha1,
    /// SHA-256, 32-byte digests.
    Sha256,
}

impl HashKind {
    /// Raw digest size in bytes.
    pub const fn digest_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
        }
    }

    /// Size of the lowercase hex form.
    pub const fn hex_len(self) -> usize {
        self.digest_len() * 2
    }

    /// The all-zero id for this algorithm.
    pub const fn zero_id(self) -> ObjectId {
        match self {
            Self::Sha1 => ObjectId::ZERO_SHA1,
            Self::Sha256 => ObjectId::ZERO_SHA256,
        }
    }

    /// Configuration name (`sha1` / `sha256`).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }

    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "sha1" => Some(Self::Sha1),
            "sha256" => Some(Self::Sha256),
            _ => None,
        }
    }

    pub fn by_digest_len(len: usize) -> Option<Self> {
        match len {
            20 => Some(Self::Sha1),
            32 => Some(Self::Sha256),
            _ => None,
        }
    }

    pub fn by_hex_len(len: usize) -> Option<Self> {
        match len {
            40 => Some(Self::Sha1),
            64 => Some(Self::Sha256),
            _ => None,
        }
    }
}

impl std::fmt::Display for HashKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
