//! Tiered object lookup: loose first, then packs in discovery order.

use grit_hash::ObjectId;
use grit_object::Object;
use grit_pack::RawObject;

use crate::{ObjectDb, ObjectStat, OdbError};

impl ObjectDb {
    /// Read an object from whichever tier holds it.
    pub fn read(&self, id: &ObjectId) -> Result<Option<Object>, OdbError> {
        if let Some(object) = self.loose().read(id)? {
            return Ok(Some(object));
        }
        self.read_packed(id)
    }

    /// Read an object that must exist; absence is [`OdbError::NotFound`].
    pub fn read_existing(&self, id: &ObjectId) -> Result<Object, OdbError> {
        self.read(id)?.ok_or(OdbError::NotFound(*id))
    }

    /// Read through the LRU cache. Hot objects (tree walks revisit the
    /// same subtrees constantly) skip storage entirely.
    pub fn read_cached(&self, id: &ObjectId) -> Result<Option<Object>, OdbError> {
        if let Some(object) = self.cache.lock().unwrap().get(id) {
            return Ok(Some(object.clone()));
        }
        let found = self.read(id)?;
        if let Some(object) = &found {
            self.cache.lock().unwrap().put(*id, object.clone());
        }
        Ok(found)
    }

    /// Kind and size only. Loose objects give this up without inflating
    /// the body; packed objects are resolved in full.
    pub fn read_header(&self, id: &ObjectId) -> Result<Option<ObjectStat>, OdbError> {
        if let Some((kind, size)) = self.loose().read_header(id)? {
            return Ok(Some(ObjectStat { kind, size }));
        }
        let packs = self.packs.read().unwrap();
        for pack in packs.iter() {
            if let Some(raw) = pack.read(id)? {
                return Ok(Some(ObjectStat {
                    kind: raw.kind,
                    size: raw.data.len(),
                }));
            }
        }
        Ok(None)
    }

    /// Search the packs, resolving REF_DELTA bases the owning pack lacks
    /// out of the loose store or any other pack.
    fn read_packed(&self, id: &ObjectId) -> Result<Option<Object>, OdbError> {
        let packs = self.packs.read().unwrap();
        for (here, pack) in packs.iter().enumerate() {
            let fetch_base = |base: &ObjectId| -> Option<RawObject> {
                if let Ok(Some(object)) = self.loose().read(base) {
                    return Some(RawObject {
                        kind: object.kind(),
                        data: object.encode_body(),
                    });
                }
                packs
                    .iter()
                    .enumerate()
                    .filter(|&(there, _)| there != here)
                    .find_map(|(_, other)| other.read(base).ok().flatten())
            };

            if let Some(raw) = pack.read_with_base(id, fetch_base)? {
                let object = Object::decode_body(raw.kind, &raw.data, self.hash())
                    .map_err(|e| OdbError::Corrupt {
                        id: *id,
                        reason: e.to_string(),
                    })?;
                return Ok(Some(object));
            }
        }
        Ok(None)
    }
}
