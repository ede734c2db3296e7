use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::FsError;

const LOCK_SUFFIX: &str = ".lock";

/// Creating `<path>.lock` races against other processes: collisions usually
/// mean a writer is mid-commit and about to rename the lock away, so a few
/// immediate re-attempts absorb that window. No sleeping, no blocking.
const ACQUIRE_ATTEMPTS: u32 = 3;

/// Guard over the cross-process lock protocol for a single file.
///
/// Acquiring creates `<path>.lock` exclusively; the new contents are written
/// into the lock file, and [`commit`](LockFile::commit) publishes them by
/// renaming the lock onto the target. Dropping an uncommitted guard removes
/// the lock file, leaving the target untouched.
#[derive(Debug)]
pub struct LockFile {
    target: PathBuf,
    lock_path: PathBuf,
    file: Option<File>,
    resolved: bool,
}

impl LockFile {
    /// Take the lock for `target`, failing fast with [`FsError::Held`] if
    /// another process holds it.
    pub fn acquire(target: impl AsRef<Path>) -> Result<Self, FsError> {
        let target = target.as_ref().to_path_buf();
        let mut lock_path = target.clone().into_os_string();
        lock_path.push(LOCK_SUFFIX);
        let lock_path = PathBuf::from(lock_path);

        let mut attempt = 0;
        let file = loop {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
            {
                Ok(file) => break file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    attempt += 1;
                    if attempt >= ACQUIRE_ATTEMPTS {
                        return Err(FsError::Held {
                            path: target.clone(),
                        });
                    }
                }
                Err(source) => {
                    return Err(FsError::Create {
                        path: lock_path.clone(),
                        source,
                    })
                }
            }
        };

        Ok(Self {
            target,
            lock_path,
            file: Some(file),
            resolved: false,
        })
    }

    /// Like [`acquire`](Self::acquire), but contention yields `Ok(None)`.
    pub fn acquire_opt(target: impl AsRef<Path>) -> Result<Option<Self>, FsError> {
        match Self::acquire(target) {
            Ok(lock) => Ok(Some(lock)),
            Err(FsError::Held { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Publish the written contents: flush, fsync, rename onto the target.
    pub fn commit(mut self) -> Result<(), FsError> {
        let commit_err = |path: &Path, source: io::Error| FsError::Commit {
            path: path.to_path_buf(),
            source,
        };
        if let Some(file) = &mut self.file {
            file.flush().map_err(|e| commit_err(&self.lock_path, e))?;
            file.sync_all().map_err(|e| commit_err(&self.lock_path, e))?;
        }
        self.file.take();
        fs::rename(&self.lock_path, &self.target)
            .map_err(|e| commit_err(&self.target, e))?;
        self.resolved = true;
        Ok(())
    }

    /// Abandon the update and release the lock.
    pub fn rollback(mut self) -> Result<(), FsError> {
        self.file.take();
        self.resolved = true;
        match fs::remove_file(&self.lock_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Write for LockFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("lock already resolved"))?
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("lock already resolved"))?
            .flush()
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if !self.resolved {
            self.file.take();
            let _ = fs::remove_file(&self.lock_path);
        }
    }
}
