//! Enumerating every stored id exactly once.

use std::collections::HashSet;

use grit_hash::ObjectId;
use grit_loose::LooseIter;

use crate::{ObjectDb, OdbError};

/// Walks the loose tier, then every pack index, suppressing ids already
/// yielded. An object stored both loose and packed comes out once.
///
/// Pack ids are snapshotted when the iterator is created; the loose walk
/// is lazy. Completeness of the state at creation time is the contract,
/// ordering across tiers is not.
pub struct OdbIter {
    loose: LooseIter,
    packed: std::vec::IntoIter<ObjectId>,
    seen: HashSet<ObjectId>,
}

impl Iterator for OdbIter {
    type Item = Result<ObjectId, OdbError>;

    fn next(&mut self) -> Option<Self::Item> {
        for result in self.loose.by_ref() {
            match result {
                Ok(id) => {
                    if self.seen.insert(id) {
                        return Some(Ok(id));
                    }
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
        self.packed
            .by_ref()
            .find(|id| self.seen.insert(*id))
            .map(Ok)
    }
}

impl ObjectDb {
    /// Enumerate every object id held loose or packed, each exactly once.
    pub fn iter(&self) -> Result<OdbIter, OdbError> {
        let packs = self.packs.read().unwrap();
        let mut packed = Vec::new();
        for pack in packs.iter() {
            packed.extend(pack.index().entries().map(|(id, _)| id));
        }
        Ok(OdbIter {
            loose: self.loose.iter()?,
            packed: packed.into_iter(),
            seen: HashSet::new(),
        })
    }
}
