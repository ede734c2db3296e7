use std::fs;
use std::path::{Path, PathBuf};

use grit_hash::ObjectId;

use crate::{LooseError, LooseStore};

/// Lazy walk over every loose object id.
///
/// Fan-out directories are visited in sorted order and file names that are
/// not a full hex suffix (scratch files, stray editors' droppings) are
/// skipped, so only decodable ids come out. The walk reflects the on-disk
/// state at the time each directory is opened; writers racing the walk may
/// or may not be observed.
pub struct LooseIter {
    fanout_dirs: Vec<PathBuf>,
    next_dir: usize,
    pending: Vec<ObjectId>,
}

impl LooseIter {
    fn new(objects_dir: &Path) -> Result<Self, LooseError> {
        let mut fanout_dirs = Vec::new();
        if objects_dir.is_dir() {
            for entry in fs::read_dir(objects_dir)? {
                let entry = entry?;
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if name.len() == 2
                    && name.bytes().all(|b| b.is_ascii_hexdigit())
                    && entry.file_type()?.is_dir()
                {
                    fanout_dirs.push(entry.path());
                }
            }
        }
        fanout_dirs.sort();
        Ok(Self {
            fanout_dirs,
            next_dir: 0,
            pending: Vec::new(),
        })
    }

    /// Collect the ids of the next non-empty fan-out directory into
    /// `pending` (reversed, so `pop` yields sorted order).
    fn fill(&mut self) -> Result<bool, LooseError> {
        while self.next_dir < self.fanout_dirs.len() {
            let dir = &self.fanout_dirs[self.next_dir];
            self.next_dir += 1;
            let prefix = dir
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .unwrap_or_default();

            let mut ids = Vec::new();
            for entry in fs::read_dir(dir)? {
                let entry = entry?;
                if !entry.file_type()?.is_file() {
                    continue;
                }
                let name = entry.file_name();
                let suffix = name.to_string_lossy();
                if let Ok(id) = ObjectId::parse_hex(&format!("{prefix}{suffix}")) {
                    ids.push(id);
                }
            }
            if !ids.is_empty() {
                ids.sort();
                ids.reverse();
                self.pending = ids;
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Iterator for LooseIter {
    type Item = Result<ObjectId, LooseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(id) = self.pending.pop() {
                return Some(Ok(id));
            }
            match self.fill() {
                Ok(true) => {}
                Ok(false) => return None,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl LooseStore {
    /// Walk every stored id.
    pub fn iter(&self) -> Result<LooseIter, LooseError> {
        LooseIter::new(self.objects_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grit_hash::HashKind;
    use grit_object::ObjectKind;

    #[test]
    fn yields_each_object_once_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseStore::open(dir.path(), HashKind::Sha1);
        let mut written: Vec<ObjectId> = (0..20u8)
            .map(|n| store.write_body(ObjectKind::Blob, &[n]).unwrap())
            .collect();
        written.sort();

        let walked: Vec<ObjectId> = store.iter().unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(walked, written);
    }

    #[test]
    fn empty_store_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseStore::open(dir.path(), HashKind::Sha1);
        assert_eq!(store.iter().unwrap().count(), 0);
    }

    #[test]
    fn scratch_and_foreign_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseStore::open(dir.path(), HashKind::Sha1);
        let id = store.write_body(ObjectKind::Blob, b"real").unwrap();

        fs::write(dir.path().join("tmp_1234abcd"), b"scratch").unwrap();
        fs::create_dir_all(dir.path().join("pack")).unwrap();
        fs::write(dir.path().join("pack/keep.txt"), b"x").unwrap();
        let bucket = dir.path().join(&id.to_hex()[..2]);
        fs::write(bucket.join("not-hex-at-all"), b"junk").unwrap();

        let walked: Vec<ObjectId> = store.iter().unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(walked, vec![id]);
    }
}
