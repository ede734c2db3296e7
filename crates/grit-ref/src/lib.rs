//! The reference namespace: human-visible names bound to object ids.
//!
//! A ref lives in one of two tiers. Loose refs are single files under the
//! git dir (`refs/heads/main` contains a hex id or a `ref: ` redirect);
//! packed refs share one sorted `packed-refs` file. A loose file always
//! shadows a packed entry of the same name, so updates only ever touch the
//! loose tier and packing is a separate maintenance step.
//!
//! All mutation goes through the `.lock` protocol from [`grit_fs`]; a
//! reader concurrent with any writer sees either the old value or the new
//! one.

mod loose;
mod name;
mod packed;
mod store;

pub use name::RefName;
pub use packed::{PackedEntry, PackedRefs};
pub use store::{RefStore, MAX_SYMREF_DEPTH};

use std::path::PathBuf;

use grit_hash::ObjectId;

/// Errors from reference operations.
#[derive(Debug, thiserror::Error)]
pub enum RefError {
    #[error("invalid ref name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("ref not found: {0}")]
    NotFound(String),

    #[error("{path} is locked by another process")]
    Locked { path: PathBuf },

    #[error("symbolic ref chain through {0} exceeds the depth bound")]
    CycleDetected(String),

    #[error("cannot create {name}: {occupied} is in the way")]
    DirectoryConflict { name: String, occupied: String },

    #[error("malformed ref data in {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error(transparent)]
    Fs(grit_fs::FsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Hash(#[from] grit_hash::HashError),
}

// Contention is a first-class outcome for callers racing over a ref, so the
// generic Held error becomes Locked instead of hiding inside Fs.
impl From<grit_fs::FsError> for RefError {
    fn from(e: grit_fs::FsError) -> Self {
        match e {
            grit_fs::FsError::Held { path } => RefError::Locked { path },
            other => RefError::Fs(other),
        }
    }
}

/// A reference value: either an object id or a redirect to another ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ref {
    Direct { name: RefName, oid: ObjectId },
    Symbolic { name: RefName, target: RefName },
}

impl Ref {
    pub fn name(&self) -> &RefName {
        match self {
            Ref::Direct { name, .. } => name,
            Ref::Symbolic { name, .. } => name,
        }
    }

    pub fn is_symbolic(&self) -> bool {
        matches!(self, Ref::Symbolic { .. })
    }

    /// The object id, when this ref carries one directly.
    pub fn oid(&self) -> Option<ObjectId> {
        match self {
            Ref::Direct { oid, .. } => Some(*oid),
            Ref::Symbolic { .. } => None,
        }
    }

    /// The redirect target, when this ref is symbolic.
    pub fn symbolic_target(&self) -> Option<&RefName> {
        match self {
            Ref::Symbolic { target, .. } => Some(target),
            Ref::Direct { .. } => None,
        }
    }
}
