use std::fs;
use std::io::Write;

use flate2::write::ZlibEncoder;
use grit_hash::{hasher, ObjectId};
use grit_object::{header, Object, ObjectKind};

use crate::{LooseError, LooseStore};

impl LooseStore {
    /// Store an object, returning its id. Writing an object that already
    /// exists is a no-op; the store is content-addressed, so both copies
    /// are the same bytes.
    pub fn write(&self, object: &Object) -> Result<ObjectId, LooseError> {
        self.write_body(object.kind(), &object.encode_body())
    }

    /// Store a headerless body of known kind.
    pub fn write_body(&self, kind: ObjectKind, body: &[u8]) -> Result<ObjectId, LooseError> {
        let id = hasher::hash_object(self.hash(), kind.name(), body)?;
        if self.contains(&id) {
            return Ok(id);
        }

        let mut encoder = ZlibEncoder::new(Vec::new(), self.compression);
        encoder.write_all(&header::encode(kind, body.len()))?;
        encoder.write_all(body)?;
        let compressed = encoder.finish()?;

        let path = self.path_of(&id);
        grit_fs::write_atomic(&path, &compressed, true)?;

        // Stored objects are immutable; drop the write bit as a guard
        // against casual editing.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&path, fs::Permissions::from_mode(0o444));
        }

        Ok(id)
    }

    /// Remove a loose object. Absence is not an error; the pruning pass
    /// after a repack may race another pruner.
    pub fn remove(&self, id: &ObjectId) -> Result<(), LooseError> {
        let path = self.path_of(id);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        // Drop the fan-out directory once its last object is gone.
        if let Some(dir) = path.parent() {
            let _ = fs::remove_dir(dir);
        }
        Ok(())
    }
}
