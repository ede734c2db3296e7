//! Filesystem primitives shared by the stores: the `.lock` protocol and
//! write-temp-then-rename.
//!
//! Both exist for the same reason: a reader racing a writer must see either
//! the old file or the new one, never a half-written state. The operating
//! system's atomic rename within one directory is the only ordering
//! guarantee relied on.

mod lock;

pub use lock::LockFile;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

/// Errors from lock acquisition and atomic writes.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("{path} is locked by another process")]
    Held { path: std::path::PathBuf },

    #[error("cannot create {path}")]
    Create {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("cannot finish writing {path}")]
    Commit {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A temp-file name unlikely to collide across processes.
fn scratch_name(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    format!("{prefix}{:08x}", u64::from(process::id()) ^ u64::from(nanos))
}

/// Write `contents` to `target` atomically: a scratch file in the target's
/// directory is filled, synced, and renamed into place.
///
/// When `keep_existing` is set, a `target` that already exists wins and the
/// write becomes a no-op. That is the behavior content-addressed files
/// want: both racers were writing the same bytes.
pub fn write_atomic(target: &Path, contents: &[u8], keep_existing: bool) -> Result<(), FsError> {
    if keep_existing && target.exists() {
        return Ok(());
    }
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let scratch = dir.join(scratch_name("tmp_"));

    let result = (|| {
        let mut file = File::create(&scratch).map_err(|source| FsError::Create {
            path: scratch.clone(),
            source,
        })?;
        file.write_all(contents)?;
        file.sync_all()?;
        drop(file);
        match fs::rename(&scratch, target) {
            Ok(()) => Ok(()),
            // Lost the rename race; the other writer's copy is equivalent.
            Err(_) if keep_existing && target.exists() => Ok(()),
            Err(source) => Err(FsError::Commit {
                path: target.to_path_buf(),
                source,
            }),
        }
    })();

    if result.is_err() {
        let _ = fs::remove_file(&scratch);
    }
    result
}
