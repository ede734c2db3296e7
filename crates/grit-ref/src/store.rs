use std::collections::HashSet;
use std::path::{Path, PathBuf};

use grit_hash::ObjectId;

use crate::name::RefName;
use crate::packed::PackedRefs;
use crate::{loose, Ref, RefError};

/// How many symbolic redirects a resolve will follow. Git's own limit;
/// anything deeper is treated as a cycle.
pub const MAX_SYMREF_DEPTH: usize = 10;

/// The files-backend reference store for one git dir.
///
/// Lookups consult the loose tier first and fall back to `packed-refs`;
/// a loose file always shadows a packed entry of the same name. Updates
/// only ever write the loose tier, so two stores over the same directory
/// coordinate purely through the filesystem.
pub struct RefStore {
    git_dir: PathBuf,
}

impl RefStore {
    pub fn new(git_dir: impl AsRef<Path>) -> Self {
        Self {
            git_dir: git_dir.as_ref().to_path_buf(),
        }
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Look up one ref without following redirects.
    pub fn find(&self, name: &RefName) -> Result<Option<Ref>, RefError> {
        if let Some(found) = loose::read(&self.git_dir, name)? {
            return Ok(Some(found));
        }
        Ok(PackedRefs::load(&self.git_dir)?
            .find(name)
            .map(|e| Ref::Direct {
                name: e.name.clone(),
                oid: e.oid,
            }))
    }

    /// Follow symbolic redirects until an object id or a dead end.
    ///
    /// `Ok(None)` means the chain ended at a ref that does not exist yet,
    /// the unborn-branch case. A chain longer than [`MAX_SYMREF_DEPTH`]
    /// can only be a loop and fails as one.
    pub fn resolve(&self, name: &RefName) -> Result<Option<ObjectId>, RefError> {
        let mut at = name.clone();
        for _ in 0..=MAX_SYMREF_DEPTH {
            match self.find(&at)? {
                Some(Ref::Direct { oid, .. }) => return Ok(Some(oid)),
                Some(Ref::Symbolic { target, .. }) => at = target,
                None => return Ok(None),
            }
        }
        Err(RefError::CycleDetected(name.to_string()))
    }

    /// Bind `name` directly to `oid`.
    pub fn set_direct(&self, name: &RefName, oid: &ObjectId) -> Result<(), RefError> {
        loose::write_direct(&self.git_dir, name, oid)
    }

    /// Make `name` a redirect to `target`.
    pub fn set_symbolic(&self, name: &RefName, target: &RefName) -> Result<(), RefError> {
        loose::write_symbolic(&self.git_dir, name, target)
    }

    /// Remove `name` from both tiers.
    ///
    /// The packed entry goes first: until the loose file disappears it
    /// keeps shadowing, so no reader ever sees a stale packed value
    /// resurface mid-delete.
    pub fn delete(&self, name: &RefName) -> Result<(), RefError> {
        let mut packed = PackedRefs::load(&self.git_dir)?;
        if packed.remove(name) {
            packed.store(&self.git_dir)?;
        }
        loose::remove(&self.git_dir, name)
    }

    /// All refs under `refs/` (optionally narrowed to a name prefix),
    /// sorted by name, loose shadowing packed. Root pseudo-refs like
    /// `HEAD` are never part of the enumeration.
    pub fn iter(&self, prefix: Option<&str>) -> Result<Vec<Ref>, RefError> {
        let mut refs = Vec::new();
        let mut shadowed = HashSet::new();

        for name in loose::scan(&self.git_dir, prefix)? {
            // The file can vanish between scan and read; skip it then.
            if let Some(found) = loose::read(&self.git_dir, &name)? {
                shadowed.insert(name);
                refs.push(found);
            }
        }

        for entry in PackedRefs::load(&self.git_dir)?.entries() {
            if shadowed.contains(&entry.name) {
                continue;
            }
            if let Some(p) = prefix {
                if !entry.name.as_str().starts_with(p) {
                    continue;
                }
            }
            refs.push(Ref::Direct {
                name: entry.name.clone(),
                oid: entry.oid,
            });
        }

        refs.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(refs)
    }

    /// The sorted names of every ref under `refs/`.
    pub fn names(&self) -> Result<Vec<RefName>, RefError> {
        Ok(self.iter(None)?.into_iter().map(|r| r.name().clone()).collect())
    }

    /// Migrate a loose direct ref into `packed-refs`.
    pub fn pack_ref(&self, name: &RefName) -> Result<(), RefError> {
        let oid = match loose::read(&self.git_dir, name)? {
            Some(Ref::Direct { oid, .. }) => oid,
            Some(Ref::Symbolic { .. }) => {
                return Err(RefError::Parse {
                    path: loose::file_path(&self.git_dir, name),
                    reason: "symbolic refs cannot be packed".into(),
                })
            }
            None => return Err(RefError::NotFound(name.to_string())),
        };

        let mut packed = PackedRefs::load(&self.git_dir)?;
        packed.upsert(name.clone(), oid, None);
        packed.store(&self.git_dir)?;
        loose::remove(&self.git_dir, name)
    }
}
