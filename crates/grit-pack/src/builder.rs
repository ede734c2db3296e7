//! Building new packs and their indexes.
//!
//! The pack is assembled in memory: entries are appended after a
//! placeholder header, the object count is patched in at the end, and the
//! trailing checksum is computed over the finished bytes. Sealing yields
//! the pack and index images together so the caller can put the index in
//! place before the pack becomes visible.

use std::path::{Path, PathBuf};

use flate2::write::ZlibEncoder;
use flate2::Compression;
use grit_hash::hasher::{digest_of, hash_object};
use grit_hash::{Fanout, HashKind, ObjectId};
use grit_object::ObjectKind;
use std::io::Write;

use crate::entry;
use crate::{
    PackError, IDX_MAGIC, IDX_VERSION, PACK_HEADER_LEN, PACK_MAGIC, PACK_VERSION,
    WIDE_OFFSET_BIT,
};

/// One row of a pack index: an id, where its entry starts, and the CRC32
/// of the entry's raw bytes.
#[derive(Debug, Clone, Copy)]
pub struct IndexEntry {
    pub id: ObjectId,
    pub offset: u64,
    pub crc32: u32,
}

/// Accumulates entries for a new pack.
pub struct PackBuilder {
    hash: HashKind,
    buf: Vec<u8>,
    entries: Vec<IndexEntry>,
}

impl PackBuilder {
    pub fn new(hash: HashKind) -> Self {
        let mut buf = Vec::with_capacity(4096);
        buf.extend_from_slice(&PACK_MAGIC);
        buf.extend_from_slice(&PACK_VERSION.to_be_bytes());
        // Object count, patched when the pack is sealed.
        buf.extend_from_slice(&0u32.to_be_bytes());
        Self {
            hash,
            buf,
            entries: Vec::new(),
        }
    }

    /// Append a full object and return its id.
    pub fn append(&mut self, kind: ObjectKind, body: &[u8]) -> Result<ObjectId, PackError> {
        let id = hash_object(self.hash, kind.name(), body)?;
        let header = entry::encode(entry::type_code(kind), body.len() as u64);
        self.push_entry(id, &header, &[], body)?;
        Ok(id)
    }

    /// Append a REF_DELTA entry. `target` names the object the delta
    /// reconstructs; `base` must resolve at read time, in this pack or
    /// through the reader's base hook.
    pub fn append_ref_delta(
        &mut self,
        base: ObjectId,
        target: ObjectId,
        delta: &[u8],
    ) -> Result<(), PackError> {
        let header = entry::encode(entry::REF_DELTA_CODE, delta.len() as u64);
        self.push_entry(target, &header, base.bytes(), delta)
    }

    /// Number of entries appended so far.
    pub fn len(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push_entry(
        &mut self,
        id: ObjectId,
        header: &[u8],
        base_ref: &[u8],
        payload: &[u8],
    ) -> Result<(), PackError> {
        let offset = self.buf.len() as u64;

        let mut compressed = Vec::new();
        let mut encoder = ZlibEncoder::new(&mut compressed, Compression::default());
        encoder.write_all(payload)?;
        encoder.finish()?;

        let mut crc = crc32fast::Hasher::new();
        crc.update(header);
        crc.update(base_ref);
        crc.update(&compressed);

        self.buf.extend_from_slice(header);
        self.buf.extend_from_slice(base_ref);
        self.buf.extend_from_slice(&compressed);
        self.entries.push(IndexEntry {
            id,
            offset,
            crc32: crc.finalize(),
        });
        Ok(())
    }

    /// Patch the object count, append the trailing checksum, and encode the
    /// matching index.
    pub fn finish(mut self) -> Result<SealedPack, PackError> {
        let count = self.len().to_be_bytes();
        self.buf[8..PACK_HEADER_LEN].copy_from_slice(&count);
        let checksum = digest_of(self.hash, &self.buf)?;
        self.buf.extend_from_slice(checksum.bytes());

        let index_bytes = encode_index(&mut self.entries, &checksum)?;
        Ok(SealedPack {
            checksum,
            pack_bytes: self.buf,
            index_bytes,
        })
    }
}

/// A finished pack image with its index, ready to be written out.
pub struct SealedPack {
    checksum: ObjectId,
    pack_bytes: Vec<u8>,
    index_bytes: Vec<u8>,
}

impl SealedPack {
    pub fn checksum(&self) -> &ObjectId {
        &self.checksum
    }

    pub fn pack_bytes(&self) -> &[u8] {
        &self.pack_bytes
    }

    pub fn index_bytes(&self) -> &[u8] {
        &self.index_bytes
    }

    /// Write `pack-<checksum>.idx` and `pack-<checksum>.pack` into `dir`,
    /// each through a scratch file and rename. The index lands first so a
    /// concurrent reader never discovers a pack it cannot look ids up in.
    pub fn install(&self, dir: &Path) -> Result<(PathBuf, PathBuf), PackError> {
        let stem = format!("pack-{}", self.checksum.to_hex());
        let idx_path = dir.join(format!("{stem}.idx"));
        let pack_path = dir.join(format!("{stem}.pack"));
        grit_fs::write_atomic(&idx_path, &self.index_bytes, true)?;
        grit_fs::write_atomic(&pack_path, &self.pack_bytes, true)?;
        Ok((idx_path, pack_path))
    }
}

/// Encode a v2 index image for `entries`, sorting them by id in place.
pub fn encode_index(
    entries: &mut [IndexEntry],
    pack_checksum: &ObjectId,
) -> Result<Vec<u8>, PackError> {
    entries.sort_by(|a, b| a.id.cmp(&b.id));
    let ids: Vec<ObjectId> = entries.iter().map(|e| e.id).collect();

    let mut buf = Vec::with_capacity(8 + 1024 + entries.len() * 28 + 2 * 20);
    buf.extend_from_slice(&IDX_MAGIC);
    buf.extend_from_slice(&IDX_VERSION.to_be_bytes());
    buf.extend_from_slice(&Fanout::from_sorted(&ids).encode());

    for entry in entries.iter() {
        buf.extend_from_slice(entry.id.bytes());
    }
    for entry in entries.iter() {
        buf.extend_from_slice(&entry.crc32.to_be_bytes());
    }

    let mut wide: Vec<u64> = Vec::new();
    for entry in entries.iter() {
        if entry.offset < u64::from(WIDE_OFFSET_BIT) {
            buf.extend_from_slice(&(entry.offset as u32).to_be_bytes());
        } else {
            let slot = wide.len() as u32;
            buf.extend_from_slice(&(WIDE_OFFSET_BIT | slot).to_be_bytes());
            wide.push(entry.offset);
        }
    }
    for offset in &wide {
        buf.extend_from_slice(&offset.to_be_bytes());
    }

    buf.extend_from_slice(pack_checksum.bytes());
    let own = digest_of(pack_checksum.kind(), &buf)?;
    buf.extend_from_slice(own.bytes());
    Ok(buf)
}

/// Build `<name>.pack` and `<name>.idx` in `dir` from full objects.
/// Returns the pack path, the index path, and the pack checksum.
pub fn build_pack(
    dir: &Path,
    name: &str,
    hash: HashKind,
    objects: &[(ObjectKind, Vec<u8>)],
) -> Result<(PathBuf, PathBuf, ObjectId), PackError> {
    let mut builder = PackBuilder::new(hash);
    for (kind, body) in objects {
        builder.append(*kind, body)?;
    }
    let sealed = builder.finish()?;

    let idx_path = dir.join(format!("{name}.idx"));
    let pack_path = dir.join(format!("{name}.pack"));
    grit_fs::write_atomic(&idx_path, &sealed.index_bytes, false)?;
    grit_fs::write_atomic(&pack_path, &sealed.pack_bytes, false)?;
    Ok((pack_path, idx_path, sealed.checksum))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::PackFile;
    use crate::delta;

    #[test]
    fn sealed_pack_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut builder = PackBuilder::new(HashKind::Sha1);
        let a = builder.append(ObjectKind::Blob, b"alpha").unwrap();
        let b = builder.append(ObjectKind::Blob, b"beta").unwrap();
        assert_eq!(builder.len(), 2);

        let sealed = builder.finish().unwrap();
        let (idx_path, pack_path) = sealed.install(dir.path()).unwrap();
        assert!(idx_path.exists());
        assert!(pack_path.exists());

        let pack = PackFile::open(&pack_path, HashKind::Sha1).unwrap();
        assert_eq!(pack.read(&a).unwrap().unwrap().data, b"alpha");
        assert_eq!(pack.read(&b).unwrap().unwrap().data, b"beta");
    }

    #[test]
    fn install_names_carry_the_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let mut builder = PackBuilder::new(HashKind::Sha1);
        builder.append(ObjectKind::Blob, b"named by digest").unwrap();
        let sealed = builder.finish().unwrap();
        let hex = sealed.checksum().to_hex();
        let (idx_path, pack_path) = sealed.install(dir.path()).unwrap();
        assert_eq!(
            pack_path.file_name().unwrap().to_str().unwrap(),
            format!("pack-{hex}.pack")
        );
        assert_eq!(
            idx_path.file_name().unwrap().to_str().unwrap(),
            format!("pack-{hex}.idx")
        );
    }

    #[test]
    fn empty_pack_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let (pack_path, _, _) =
            build_pack(dir.path(), "empty", HashKind::Sha1, &[]).unwrap();
        let pack = PackFile::open(&pack_path, HashKind::Sha1).unwrap();
        assert!(pack.is_empty());
    }

    #[test]
    fn delta_entry_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let base = b"the base body for the builder delta roundtrip case".to_vec();
        let target = b"the edit body for the builder delta roundtrip case".to_vec();

        let mut builder = PackBuilder::new(HashKind::Sha1);
        let base_id = builder.append(ObjectKind::Blob, &base).unwrap();
        let target_id = hash_object(HashKind::Sha1, "blob", &target).unwrap();
        builder
            .append_ref_delta(base_id, target_id, &delta::diff(&base, &target))
            .unwrap();
        let (_, pack_path) = builder.finish().unwrap().install(dir.path()).unwrap();

        let pack = PackFile::open(&pack_path, HashKind::Sha1).unwrap();
        assert_eq!(pack.read(&target_id).unwrap().unwrap().data, target);
    }

    #[test]
    fn crc_matches_raw_entry_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let (pack_path, _, _) = build_pack(
            dir.path(),
            "crc",
            HashKind::Sha1,
            &[(ObjectKind::Blob, b"crc coverage".to_vec())],
        )
        .unwrap();

        let pack_bytes = std::fs::read(&pack_path).unwrap();
        let pack = PackFile::open(&pack_path, HashKind::Sha1).unwrap();
        let (_, offset) = pack.index().entries().next().unwrap();

        // Everything between this entry and the trailer is the raw entry.
        let end = pack_bytes.len() - HashKind::Sha1.digest_len();
        let mut crc = crc32fast::Hasher::new();
        crc.update(&pack_bytes[offset as usize..end]);
        assert_eq!(pack.index().crc_at(0), crc.finalize());
    }

    #[test]
    fn checksum_covers_the_whole_stream() {
        let mut builder = PackBuilder::new(HashKind::Sha1);
        builder.append(ObjectKind::Blob, b"checksummed").unwrap();
        let sealed = builder.finish().unwrap();

        let bytes = sealed.pack_bytes();
        let body = &bytes[..bytes.len() - 20];
        assert_eq!(
            digest_of(HashKind::Sha1, body).unwrap(),
            *sealed.checksum()
        );
        assert_eq!(&bytes[bytes.len() - 20..], sealed.checksum().bytes());
    }
}
