use std::fs;
use std::io::Read;

use flate2::read::ZlibDecoder;
use grit_hash::ObjectId;
use grit_object::{header, Object, ObjectKind};

use crate::{LooseError, LooseStore};

// Decompression window for header-only reads; real headers are well under
// 32 bytes.
const HEADER_PEEK: usize = 64;

impl LooseStore {
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.path_of(id).is_file()
    }

    /// Read and parse an object. `Ok(None)` means not stored loose; damage
    /// to a present file is an error, never `None`.
    pub fn read(&self, id: &ObjectId) -> Result<Option<Object>, LooseError> {
        let raw = match self.inflate(id)? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        Ok(Some(Object::decode(&raw, self.hash())?))
    }

    /// Read the kind and size without inflating the whole file.
    pub fn read_header(&self, id: &ObjectId) -> Result<Option<(ObjectKind, usize)>, LooseError> {
        let compressed = match fs::read(self.path_of(id)) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut decoder = ZlibDecoder::new(compressed.as_slice());
        let mut buf = [0u8; HEADER_PEEK];
        let mut filled = 0;
        loop {
            let n = decoder
                .read(&mut buf[filled..])
                .map_err(|source| LooseError::Inflate {
                    id: id.to_hex(),
                    source,
                })?;
            if n == 0 {
                return Err(LooseError::Corrupt {
                    id: id.to_hex(),
                    reason: "ended before the header terminator".into(),
                });
            }
            filled += n;
            if buf[..filled].contains(&0) {
                break;
            }
            if filled == buf.len() {
                return Err(LooseError::Corrupt {
                    id: id.to_hex(),
                    reason: format!("header longer than {HEADER_PEEK} bytes"),
                });
            }
        }

        let (kind, size, _) = header::decode(&buf[..filled])?;
        Ok(Some((kind, size)))
    }

    /// Read an object and confirm its bytes still hash to `id`.
    pub fn read_verified(&self, id: &ObjectId) -> Result<Option<Object>, LooseError> {
        let raw = match self.inflate(id)? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        let actual = grit_hash::hasher::digest_of(self.hash(), &raw)?;
        if actual != *id {
            return Err(LooseError::WrongId {
                path: self.path_of(id),
                expected: id.to_hex(),
                actual: actual.to_hex(),
            });
        }
        Ok(Some(Object::decode(&raw, self.hash())?))
    }

    /// Inflate the stored file to the canonical header+body bytes.
    pub(crate) fn inflate(&self, id: &ObjectId) -> Result<Option<Vec<u8>>, LooseError> {
        let compressed = match fs::read(self.path_of(id)) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut decoder = ZlibDecoder::new(compressed.as_slice());
        let mut raw = Vec::new();
        decoder
            .read_to_end(&mut raw)
            .map_err(|source| LooseError::Inflate {
                id: id.to_hex(),
                source,
            })?;
        Ok(Some(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grit_hash::HashKind;
    use grit_object::Blob;

    fn store() -> (tempfile::TempDir, LooseStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseStore::open(dir.path(), HashKind::Sha1);
        (dir, store)
    }

    #[test]
    fn absent_object_is_none() {
        let (_dir, store) = store();
        let id = ObjectId::parse_hex("e69de29bb2d1d6434b8b29ae775ad8c2e48c5391").unwrap();
        assert!(store.read(&id).unwrap().is_none());
        assert!(store.read_header(&id).unwrap().is_none());
        assert!(!store.contains(&id));
    }

    #[test]
    fn header_read_skips_the_body() {
        let (_dir, store) = store();
        let id = store
            .write(&Object::Blob(Blob::from_bytes(vec![7u8; 100_000])))
            .unwrap();
        assert_eq!(
            store.read_header(&id).unwrap(),
            Some((ObjectKind::Blob, 100_000))
        );
    }

    #[test]
    fn garbage_file_is_an_error_not_none() {
        let (_dir, store) = store();
        let id = ObjectId::parse_hex("ce013625030ba8dba906f756967f9e9ca394464a").unwrap();
        let path = store.path_of(&id);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"not zlib at all").unwrap();
        assert!(matches!(store.read(&id), Err(LooseError::Inflate { .. })));
    }

    #[test]
    fn verified_read_catches_renamed_objects() {
        let (_dir, store) = store();
        let real = store
            .write(&Object::Blob(Blob::from_bytes(b"innocent".to_vec())))
            .unwrap();
        // File content for `real` placed under a different name.
        let fake = ObjectId::parse_hex("00ff00ff00ff00ff00ff00ff00ff00ff00ff00ff").unwrap();
        let fake_path = store.path_of(&fake);
        fs::create_dir_all(fake_path.parent().unwrap()).unwrap();
        fs::copy(store.path_of(&real), &fake_path).unwrap();

        assert!(store.read(&fake).unwrap().is_some());
        assert!(matches!(
            store.read_verified(&fake),
            Err(LooseError::WrongId { .. })
        ));
        assert!(store.read_verified(&real).unwrap().is_some());
    }
}
