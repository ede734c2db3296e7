//! Loose object storage.
//!
//! A loose object is one file per object: `objects/ab/cdef...` named by its
//! id, holding the zlib-compressed canonical encoding. Files are written
//! next to their final location and renamed into place, so a reader never
//! sees a partial object, and a name either exists with the right content
//! or not at all.

mod iter;
mod read;
mod write;

pub use iter::LooseIter;

use std::path::{Path, PathBuf};

use grit_hash::{HashKind, ObjectId};

/// Handle on a loose object directory.
pub struct LooseStore {
    objects_dir: PathBuf,
    hash: HashKind,
    compression: flate2::Compression,
}

impl LooseStore {
    pub fn open(objects_dir: impl AsRef<Path>, hash: HashKind) -> Self {
        Self {
            objects_dir: objects_dir.as_ref().to_path_buf(),
            hash,
            compression: flate2::Compression::default(),
        }
    }

    /// Zlib level for subsequent writes (0 = none, 9 = max).
    pub fn set_compression(&mut self, level: u32) {
        self.compression = flate2::Compression::new(level);
    }

    pub fn hash(&self) -> HashKind {
        self.hash
    }

    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    /// Where `id` lives (or would live) on disk.
    pub fn path_of(&self, id: &ObjectId) -> PathBuf {
        self.objects_dir.join(id.fanout_path())
    }
}

/// Errors from the loose store.
#[derive(Debug, thiserror::Error)]
pub enum LooseError {
    #[error("loose object {id} is corrupt: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("cannot inflate loose object {id}")]
    Inflate {
        id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("loose object at {path} hashes to {actual}, expected {expected}")]
    WrongId {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error(transparent)]
    Object(#[from] grit_object::ObjectError),

    #[error(transparent)]
    Hash(#[from] grit_hash::HashError),

    #[error(transparent)]
    Fs(#[from] grit_fs::FsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
