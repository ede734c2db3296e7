//! One handle over every place an object can live.
//!
//! An objects directory holds loose files and any number of packs. The
//! database reads through both tiers, always writes loose, and can fold
//! the loose tier into a new pack. Loose wins lookups: during a repack a
//! loose copy is never staler than the packed one.

mod iter;
mod lookup;
mod repack;

pub use iter::OdbIter;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use grit_hash::{HashKind, ObjectId};
use grit_loose::LooseStore;
use grit_object::cache::ObjectCache;
use grit_object::{Object, ObjectKind};
use grit_pack::PackFile;

/// Errors from database operations.
#[derive(Debug, thiserror::Error)]
pub enum OdbError {
    #[error("object {0} not found")]
    NotFound(ObjectId),

    #[error("object {id} is corrupt: {reason}")]
    Corrupt { id: ObjectId, reason: String },

    #[error(transparent)]
    Loose(#[from] grit_loose::LooseError),

    #[error(transparent)]
    Pack(#[from] grit_pack::PackError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Kind and size of an object, without its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectStat {
    pub kind: ObjectKind,
    pub size: usize,
}

/// How many parsed objects the read cache keeps.
const CACHE_CAPACITY: usize = 1024;

/// The unified object database: a loose store plus every discovered pack.
pub struct ObjectDb {
    loose: LooseStore,
    /// Discovered packs, newest first. Behind a lock so
    /// [`refresh`](ObjectDb::refresh) can swap the list under concurrent
    /// readers.
    packs: RwLock<Vec<PackFile>>,
    cache: Mutex<ObjectCache>,
    objects_dir: PathBuf,
    hash: HashKind,
}

impl ObjectDb {
    /// Open the database rooted at an objects directory.
    pub fn open(objects_dir: impl AsRef<Path>) -> Result<Self, OdbError> {
        Self::open_with(objects_dir, HashKind::Sha1)
    }

    pub fn open_with(objects_dir: impl AsRef<Path>, hash: HashKind) -> Result<Self, OdbError> {
        let objects_dir = objects_dir.as_ref().to_path_buf();
        let packs = discover_packs(&objects_dir, hash)?;
        Ok(Self {
            loose: LooseStore::open(&objects_dir, hash),
            packs: RwLock::new(packs),
            cache: Mutex::new(ObjectCache::with_capacity(CACHE_CAPACITY)),
            objects_dir,
            hash,
        })
    }

    /// Store an object. New objects always land loose.
    pub fn write(&self, object: &Object) -> Result<ObjectId, OdbError> {
        Ok(self.loose.write(object)?)
    }

    /// Store a headerless body of known kind.
    pub fn write_raw(&self, kind: ObjectKind, body: &[u8]) -> Result<ObjectId, OdbError> {
        Ok(self.loose.write_body(kind, body)?)
    }

    /// Whether any tier holds `id`. Index lookups only, nothing is
    /// decompressed.
    pub fn contains(&self, id: &ObjectId) -> bool {
        if self.loose.contains(id) {
            return true;
        }
        self.packs
            .read()
            .unwrap()
            .iter()
            .any(|pack| pack.contains(id))
    }

    /// Re-discover packs. Call after a repack, own or foreign.
    pub fn refresh(&self) -> Result<(), OdbError> {
        let fresh = discover_packs(&self.objects_dir, self.hash)?;
        *self.packs.write().unwrap() = fresh;
        Ok(())
    }

    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    pub fn hash(&self) -> HashKind {
        self.hash
    }

    pub fn loose(&self) -> &LooseStore {
        &self.loose
    }

    /// Where this database's packs live.
    pub(crate) fn pack_dir(&self) -> PathBuf {
        self.objects_dir.join("pack")
    }
}

/// Find `objects/pack/*.pack`, newest first. A pack that fails to open is
/// skipped: its objects may still be reachable loose or in another pack,
/// and an unreadable pack must not take the whole database down.
fn discover_packs(objects_dir: &Path, hash: HashKind) -> Result<Vec<PackFile>, OdbError> {
    let pack_dir = objects_dir.join("pack");
    if !pack_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut candidates: Vec<_> = std::fs::read_dir(&pack_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "pack"))
        .collect();
    candidates.sort_by(|a, b| {
        let at = a.metadata().and_then(|m| m.modified()).ok();
        let bt = b.metadata().and_then(|m| m.modified()).ok();
        bt.cmp(&at)
    });

    let mut packs = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if let Ok(pack) = PackFile::open(candidate.path(), hash) {
            packs.push(pack);
        }
    }
    Ok(packs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use grit_object::Blob;

    fn db() -> (tempfile::TempDir, ObjectDb) {
        let dir = tempfile::tempdir().unwrap();
        let db = ObjectDb::open(dir.path()).unwrap();
        (dir, db)
    }

    #[test]
    fn writes_land_loose() {
        let (_dir, db) = db();
        let id = db.write_raw(ObjectKind::Blob, b"fresh").unwrap();
        assert!(db.loose().contains(&id));
        assert!(db.contains(&id));
    }

    #[test]
    fn write_object_and_raw_agree() {
        let (_dir, db) = db();
        let object = Object::Blob(Blob::from_bytes(b"two paths".to_vec()));
        let a = db.write(&object).unwrap();
        let b = db.write_raw(ObjectKind::Blob, b"two paths").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_database_contains_nothing() {
        let (_dir, db) = db();
        let id = ObjectId::parse_hex("e69de29bb2d1d6434b8b29ae775ad8c2e48c5391").unwrap();
        assert!(!db.contains(&id));
    }

    #[test]
    fn corrupt_pack_is_skipped_at_discovery() {
        let dir = tempfile::tempdir().unwrap();
        let pack_dir = dir.path().join("pack");
        std::fs::create_dir_all(&pack_dir).unwrap();
        std::fs::write(pack_dir.join("pack-junk.pack"), b"not a pack").unwrap();

        let db = ObjectDb::open(dir.path()).unwrap();
        let id = db.write_raw(ObjectKind::Blob, b"still works").unwrap();
        assert!(db.contains(&id));
    }

    #[test]
    fn refresh_picks_up_new_packs() {
        let (_dir, db) = db();
        let body = b"to be packed".to_vec();
        let id = grit_hash::hasher::hash_object(HashKind::Sha1, "blob", &body).unwrap();

        let mut builder = grit_pack::PackBuilder::new(HashKind::Sha1);
        builder.append(ObjectKind::Blob, &body).unwrap();
        builder
            .finish()
            .unwrap()
            .install(&db.pack_dir())
            .unwrap();

        assert!(!db.contains(&id));
        db.refresh().unwrap();
        assert!(db.contains(&id));
    }
}
