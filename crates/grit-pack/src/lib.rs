//! Packfiles: many objects in one file, delta-compressed against each other.
//!
//! A `.pack` file is a 12-byte header (`"PACK"`, version, object count), a
//! run of entries, and a trailing checksum over everything before it. Each
//! entry is a small header followed by a zlib stream; delta entries encode
//! their body as edit instructions against a base entry. The sibling `.idx`
//! file maps sorted ids to pack offsets so single objects can be pulled out
//! without scanning.
//!
//! Packs are immutable once their trailing checksum is written. Replacing
//! one means building a new pack next to it and renaming it into place.

pub mod builder;
pub mod delta;
pub mod entry;
pub mod index;
pub mod reader;

pub use builder::{build_pack, IndexEntry, PackBuilder, SealedPack};
pub use entry::{EntryHeader, EntryKind};
pub use index::PackIndex;
pub use reader::PackFile;

use grit_hash::ObjectId;
use grit_object::ObjectKind;

/// First four bytes of every pack file.
pub const PACK_MAGIC: [u8; 4] = *b"PACK";

/// The only pack stream version written or read.
pub const PACK_VERSION: u32 = 2;

/// Magic + version + object count.
pub const PACK_HEADER_LEN: usize = 12;

/// First four bytes of a v2 pack index: `\xff` followed by `"tOc"`.
pub const IDX_MAGIC: [u8; 4] = [0xff, b't', b'O', b'c'];

/// The only index version written or read.
pub const IDX_VERSION: u32 = 2;

/// Upper bound on delta chain length. Chains this long do not occur in
/// healthy packs; hitting the bound means a base loop and is reported as
/// corruption rather than looping forever.
pub const MAX_DELTA_DEPTH: usize = 512;

/// High bit of a 32-bit index offset: the low 31 bits index the 64-bit
/// offset table instead of holding the offset itself.
pub(crate) const WIDE_OFFSET_BIT: u32 = 0x8000_0000;

/// Errors from pack and index access.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("malformed pack header: {0}")]
    BadHeader(String),

    #[error("pack stream version {0} is unsupported")]
    UnsupportedVersion(u32),

    #[error("malformed pack index: {0}")]
    BadIndex(String),

    #[error("corrupt pack entry at offset {0}")]
    CorruptEntry(u64),

    #[error("invalid delta at byte {at}: {reason}")]
    BadDelta { at: usize, reason: String },

    #[error("delta base {0} is not available")]
    MissingBase(ObjectId),

    #[error("delta chain at offset {offset} exceeds {limit} links")]
    ChainTooDeep { offset: u64, limit: usize },

    #[error("pack checksum mismatch: index records {recorded}, pack trailer holds {actual}")]
    ChecksumMismatch {
        recorded: ObjectId,
        actual: ObjectId,
    },

    #[error(transparent)]
    Hash(#[from] grit_hash::HashError),

    #[error(transparent)]
    Fs(#[from] grit_fs::FsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// An object pulled out of a pack: its kind and fully inflated body, with
/// every delta in its chain already applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawObject {
    pub kind: ObjectKind,
    pub data: Vec<u8>,
}
