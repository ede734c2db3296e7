//! Folding the loose tier into a pack.

use grit_pack::PackBuilder;

use crate::{ObjectDb, OdbError};

impl ObjectDb {
    /// Pack every loose object into one new pack under `objects/pack/`,
    /// returning how many were packed.
    ///
    /// The pack is assembled off to the side and lands index-first via
    /// atomic renames, so readers switch from the loose copies to the pack
    /// without a window where the objects are in neither place. With
    /// `keep_loose` the loose copies stay; otherwise they are pruned after
    /// the pack is in place. Objects written by others during the repack
    /// are untouched either way.
    pub fn pack_loose(&self, keep_loose: bool) -> Result<usize, OdbError> {
        let mut ids = Vec::new();
        for id in self.loose().iter()? {
            ids.push(id?);
        }
        if ids.is_empty() {
            return Ok(0);
        }

        let mut builder = PackBuilder::new(self.hash());
        for id in &ids {
            let object = self.loose().read(id)?.ok_or(OdbError::NotFound(*id))?;
            builder.append(object.kind(), &object.encode_body())?;
        }
        builder.finish()?.install(&self.pack_dir())?;
        self.refresh()?;

        if !keep_loose {
            for id in &ids {
                self.loose().remove(id)?;
            }
        }
        Ok(ids.len())
    }
}
