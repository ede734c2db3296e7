//! Object model for the grit store.
//!
//! The four object kinds share one canonical encoding: a `"<type> <size>\0"`
//! header followed by the body. An object's id is the hash of exactly that
//! encoding; parsing and re-serializing any object reproduces it byte for
//! byte.

pub mod cache;
pub mod header;

mod blob;
mod commit;
mod ident;
mod tag;
mod tree;

pub use blob::Blob;
pub use cache::ObjectCache;
pub use commit::Commit;
pub use ident::{Ident, Time};
pub use tag::Tag;
pub use tree::{EntryMode, Tree, TreeEntry};

use bstr::BString;
use grit_hash::{HashError, HashKind, ObjectId};

/// Errors from object decoding and encoding.
#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    #[error("unknown object type {0:?}")]
    UnknownType(BString),

    #[error("malformed object header: {0}")]
    BadHeader(String),

    #[error("object body truncated: header claims {claimed} bytes, {present} present")]
    Truncated { claimed: usize, present: usize },

    #[error("malformed tree entry at byte {at}: {reason}")]
    BadTreeEntry { at: usize, reason: String },

    #[error("commit is missing its {0} header")]
    CommitFieldMissing(&'static str),

    #[error("tag is missing its {0} header")]
    TagFieldMissing(&'static str),

    #[error("malformed identity line: {0}")]
    BadIdent(String),

    #[error(transparent)]
    Hash(#[from] HashError),
}

/// One of the four storable object kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl ObjectKind {
    pub fn from_name(name: &[u8]) -> Result<Self, ObjectError> {
        match name {
            b"blob" => Ok(Self::Blob),
            b"tree" => Ok(Self::Tree),
            b"commit" => Ok(Self::Commit),
            b"tag" => Ok(Self::Tag),
            other => Err(ObjectError::UnknownType(BString::from(other))),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
            Self::Commit => "commit",
            Self::Tag => "tag",
        }
    }

    pub const fn name_bytes(self) -> &'static [u8] {
        self.name().as_bytes()
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ObjectKind {
    type Err = ObjectError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s.as_bytes())
    }
}

/// A fully parsed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    Blob(Blob),
    Tree(Tree),
    Commit(Commit),
    Tag(Tag),
}

impl Object {
    /// Decode header plus body. `hash` selects the digest width tree entries
    /// carry.
    pub fn decode(data: &[u8], hash: HashKind) -> Result<Self, ObjectError> {
        let (kind, size, body_at) = header::decode(data)?;
        let body = &data[body_at..];
        if body.len() < size {
            return Err(ObjectError::Truncated {
                claimed: size,
                present: body.len(),
            });
        }
        Self::decode_body(kind, &body[..size], hash)
    }

    /// Decode a headerless body of known kind.
    pub fn decode_body(kind: ObjectKind, body: &[u8], hash: HashKind) -> Result<Self, ObjectError> {
        Ok(match kind {
            ObjectKind::Blob => Self::Blob(Blob::from_bytes(body)),
            ObjectKind::Tree => Self::Tree(Tree::decode(body, hash)?),
            ObjectKind::Commit => Self::Commit(Commit::decode(body)?),
            ObjectKind::Tag => Self::Tag(Tag::decode(body)?),
        })
    }

    /// Canonical encoding: header followed by body.
    pub fn encode(&self) -> Vec<u8> {
        let body = self.encode_body();
        let mut out = header::encode(self.kind(), body.len());
        out.extend_from_slice(&body);
        out
    }

    /// Canonical body only.
    pub fn encode_body(&self) -> Vec<u8> {
        match self {
            Self::Blob(b) => b.contents().to_vec(),
            Self::Tree(t) => t.encode_body(),
            Self::Commit(c) => c.encode_body(),
            Self::Tag(t) => t.encode_body(),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Blob(_) => ObjectKind::Blob,
            Self::Tree(_) => ObjectKind::Tree,
            Self::Commit(_) => ObjectKind::Commit,
            Self::Tag(_) => ObjectKind::Tag,
        }
    }

    /// The id this object stores under.
    pub fn id(&self, hash: HashKind) -> Result<ObjectId, HashError> {
        grit_hash::hasher::hash_object(hash, self.kind().name(), &self.encode_body())
    }

    pub fn body_len(&self) -> usize {
        match self {
            Self::Blob(b) => b.contents().len(),
            other => other.encode_body().len(),
        }
    }
}
