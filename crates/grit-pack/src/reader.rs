//! Reading objects out of a pack.

use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::bufread::ZlibDecoder;
use grit_hash::{HashKind, ObjectId};

use crate::entry::{self, EntryKind};
use crate::index::PackIndex;
use crate::{
    PackError, RawObject, MAX_DELTA_DEPTH, PACK_HEADER_LEN, PACK_MAGIC, PACK_VERSION,
};

/// A memory-mapped pack validated against its sibling `.idx`.
pub struct PackFile {
    map: memmap2::Mmap,
    index: PackIndex,
    path: PathBuf,
    hash: HashKind,
}

impl PackFile {
    /// Open `<name>.pack` and its `<name>.idx` together.
    ///
    /// The pack header, the object counts of both files, and the pack
    /// checksum recorded in the index are all cross-checked before any
    /// object is served.
    pub fn open(pack_path: impl AsRef<Path>, hash: HashKind) -> Result<Self, PackError> {
        let path = pack_path.as_ref().to_path_buf();
        let index = PackIndex::open(path.with_extension("idx"), hash)?;

        let file = std::fs::File::open(&path)?;
        let map = unsafe { memmap2::Mmap::map(&file)? };

        if map.len() < PACK_HEADER_LEN + hash.digest_len() {
            return Err(PackError::BadHeader(format!(
                "{} bytes is shorter than an empty pack",
                map.len()
            )));
        }
        if map[0..4] != PACK_MAGIC {
            return Err(PackError::BadHeader("bad PACK signature".into()));
        }
        let version = u32::from_be_bytes([map[4], map[5], map[6], map[7]]);
        if version != PACK_VERSION {
            return Err(PackError::UnsupportedVersion(version));
        }
        let count = u32::from_be_bytes([map[8], map[9], map[10], map[11]]);
        if count != index.len() {
            return Err(PackError::BadHeader(format!(
                "pack holds {count} objects, index lists {}",
                index.len()
            )));
        }

        let recorded = index.pack_checksum();
        let trailer = &map[map.len() - hash.digest_len()..];
        let actual = ObjectId::from_raw(trailer, hash)?;
        if recorded != actual {
            return Err(PackError::ChecksumMismatch { recorded, actual });
        }

        Ok(Self {
            map,
            index,
            path,
            hash,
        })
    }

    /// Read `id` out of this pack, or `None` if the index does not list it.
    pub fn read(&self, id: &ObjectId) -> Result<Option<RawObject>, PackError> {
        self.read_with_base(id, |_| None)
    }

    /// Like [`read`](Self::read), but REF_DELTA bases the index does not
    /// list are fetched through `fetch_base` (typically from the loose
    /// store or another pack).
    pub fn read_with_base(
        &self,
        id: &ObjectId,
        fetch_base: impl Fn(&ObjectId) -> Option<RawObject>,
    ) -> Result<Option<RawObject>, PackError> {
        match self.index.find(id) {
            Some(offset) => self.resolve(offset, fetch_base).map(Some),
            None => Ok(None),
        }
    }

    /// Read the entry at a known pack offset.
    pub fn read_at(&self, offset: u64) -> Result<RawObject, PackError> {
        self.resolve(offset, |_| None)
    }

    /// Walk the delta chain iteratively: collect delta payloads until a
    /// plain base turns up, then apply them innermost-last. Depth is capped
    /// by [`MAX_DELTA_DEPTH`] so a base loop in a corrupt pack terminates.
    fn resolve(
        &self,
        offset: u64,
        fetch_base: impl Fn(&ObjectId) -> Option<RawObject>,
    ) -> Result<RawObject, PackError> {
        let mut deltas: Vec<Vec<u8>> = Vec::new();
        let mut at = offset;

        loop {
            if deltas.len() >= MAX_DELTA_DEPTH {
                return Err(PackError::ChainTooDeep {
                    offset,
                    limit: MAX_DELTA_DEPTH,
                });
            }

            let tail = self
                .map
                .get(at as usize..)
                .ok_or(PackError::CorruptEntry(at))?;
            let header = entry::decode(tail, at, self.hash)?;
            let payload = inflate(&tail[header.header_len..], header.inflated_len, at)?;

            let base = match header.kind {
                EntryKind::Plain(kind) => RawObject {
                    kind,
                    data: payload,
                },
                EntryKind::OfsDelta { base_at } => {
                    deltas.push(payload);
                    at = base_at;
                    continue;
                }
                EntryKind::RefDelta { base } => {
                    deltas.push(payload);
                    if let Some(base_at) = self.index.find(&base) {
                        at = base_at;
                        continue;
                    }
                    fetch_base(&base).ok_or(PackError::MissingBase(base))?
                }
            };

            let mut data = base.data;
            for delta in deltas.iter().rev() {
                data = crate::delta::apply(&data, delta)?;
            }
            return Ok(RawObject {
                kind: base.kind,
                data,
            });
        }
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.index.contains(id)
    }

    /// Number of objects stored.
    pub fn len(&self) -> u32 {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &PackIndex {
        &self.index
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn hash(&self) -> HashKind {
        self.hash
    }
}

/// Inflate one entry's zlib stream. `hint` pre-sizes the buffer; the
/// decoder stops at the stream's own end marker.
fn inflate(compressed: &[u8], hint: u64, at: u64) -> Result<Vec<u8>, PackError> {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut out = Vec::with_capacity(hint as usize);
    decoder
        .read_to_end(&mut out)
        .map_err(|_| PackError::CorruptEntry(at))?;
    if out.len() as u64 != hint {
        return Err(PackError::CorruptEntry(at));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build_pack, PackBuilder};
    use crate::delta;
    use grit_hash::hasher::hash_object;
    use grit_object::ObjectKind;

    #[test]
    fn read_back_plain_objects() {
        let dir = tempfile::tempdir().unwrap();
        let objects = vec![
            (ObjectKind::Blob, b"first payload".to_vec()),
            (ObjectKind::Blob, b"second payload".to_vec()),
            (
                ObjectKind::Commit,
                b"tree 4b825dc642cb6eb9a060e54bf8d69288fbee4904\n\
                  author A <a@a> 0 +0000\ncommitter A <a@a> 0 +0000\n\nmsg\n"
                    .to_vec(),
            ),
        ];
        let (pack_path, _, _) =
            build_pack(dir.path(), "probe", HashKind::Sha1, &objects).unwrap();

        let pack = PackFile::open(&pack_path, HashKind::Sha1).unwrap();
        assert_eq!(pack.len(), 3);

        for (kind, body) in &objects {
            let id = hash_object(HashKind::Sha1, kind.name(), body).unwrap();
            assert!(pack.contains(&id));
            let raw = pack.read(&id).unwrap().unwrap();
            assert_eq!(raw.kind, *kind);
            assert_eq!(&raw.data, body);
        }
    }

    #[test]
    fn absent_id_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let (pack_path, _, _) = build_pack(
            dir.path(),
            "probe",
            HashKind::Sha1,
            &[(ObjectKind::Blob, b"x".to_vec())],
        )
        .unwrap();
        let pack = PackFile::open(&pack_path, HashKind::Sha1).unwrap();

        let other = ObjectId::parse_hex("0000000000000000000000000000000000000001").unwrap();
        assert!(!pack.contains(&other));
        assert!(pack.read(&other).unwrap().is_none());
    }

    #[test]
    fn ref_delta_resolves_against_in_pack_base() {
        let dir = tempfile::tempdir().unwrap();
        let base = b"Hello, this is the base body used for delta coverage!".to_vec();
        let target = b"Hello, this is the edited body used for delta coverage!".to_vec();

        let mut builder = PackBuilder::new(HashKind::Sha1);
        let base_id = builder.append(ObjectKind::Blob, &base).unwrap();
        let target_id = hash_object(HashKind::Sha1, "blob", &target).unwrap();
        builder
            .append_ref_delta(base_id, target_id, &delta::diff(&base, &target))
            .unwrap();
        let sealed = builder.finish().unwrap();
        let (_, pack_path) = sealed.install(dir.path()).unwrap();

        let pack = PackFile::open(&pack_path, HashKind::Sha1).unwrap();
        let raw = pack.read(&target_id).unwrap().unwrap();
        assert_eq!(raw.kind, ObjectKind::Blob);
        assert_eq!(raw.data, target);
    }

    #[test]
    fn ref_delta_with_external_base() {
        let dir = tempfile::tempdir().unwrap();
        let base = b"body held outside the pack, say in the loose store".to_vec();
        let target = b"body held outside the pack, now in an edited form!".to_vec();
        let base_id = hash_object(HashKind::Sha1, "blob", &base).unwrap();
        let target_id = hash_object(HashKind::Sha1, "blob", &target).unwrap();

        let mut builder = PackBuilder::new(HashKind::Sha1);
        builder
            .append_ref_delta(base_id, target_id, &delta::diff(&base, &target))
            .unwrap();
        let (_, pack_path) = builder.finish().unwrap().install(dir.path()).unwrap();

        let pack = PackFile::open(&pack_path, HashKind::Sha1).unwrap();

        // Without the resolver the base is simply missing.
        assert!(matches!(
            pack.read(&target_id),
            Err(PackError::MissingBase(id)) if id == base_id
        ));

        let raw = pack
            .read_with_base(&target_id, |id| {
                (*id == base_id).then(|| RawObject {
                    kind: ObjectKind::Blob,
                    data: base.clone(),
                })
            })
            .unwrap()
            .unwrap();
        assert_eq!(raw.data, target);
    }

    #[test]
    fn ofs_delta_resolves_by_backward_distance() {
        use crate::builder::{encode_index, IndexEntry};
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use grit_hash::hasher::digest_of;
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let base = b"offset-addressed base body, long enough to delta against";
        let target = b"offset-addressed edit body, long enough to delta against";
        let base_id = hash_object(HashKind::Sha1, "blob", base).unwrap();
        let target_id = hash_object(HashKind::Sha1, "blob", target).unwrap();

        let deflate = |payload: &[u8]| {
            let mut out = Vec::new();
            let mut enc = ZlibEncoder::new(&mut out, Compression::default());
            enc.write_all(payload).unwrap();
            enc.finish().unwrap();
            out
        };

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&crate::PACK_MAGIC);
        bytes.extend_from_slice(&crate::PACK_VERSION.to_be_bytes());
        bytes.extend_from_slice(&2u32.to_be_bytes());

        let base_at = bytes.len() as u64;
        let base_header = entry::encode(entry::type_code(ObjectKind::Blob), base.len() as u64);
        let base_z = deflate(base);
        bytes.extend_from_slice(&base_header);
        bytes.extend_from_slice(&base_z);

        let delta_at = bytes.len() as u64;
        let payload = delta::diff(base, target);
        let delta_header = entry::encode(entry::OFS_DELTA_CODE, payload.len() as u64);
        let distance = entry::encode_distance(delta_at - base_at);
        let delta_z = deflate(&payload);
        bytes.extend_from_slice(&delta_header);
        bytes.extend_from_slice(&distance);
        bytes.extend_from_slice(&delta_z);

        let checksum = digest_of(HashKind::Sha1, &bytes).unwrap();
        bytes.extend_from_slice(checksum.bytes());

        let crc_of = |parts: &[&[u8]]| {
            let mut h = crc32fast::Hasher::new();
            for part in parts {
                h.update(part);
            }
            h.finalize()
        };
        let mut rows = vec![
            IndexEntry {
                id: base_id,
                offset: base_at,
                crc32: crc_of(&[&base_header, &base_z]),
            },
            IndexEntry {
                id: target_id,
                offset: delta_at,
                crc32: crc_of(&[&delta_header, &distance, &delta_z]),
            },
        ];

        let pack_path = dir.path().join("ofs.pack");
        std::fs::write(dir.path().join("ofs.idx"), encode_index(&mut rows, &checksum).unwrap())
            .unwrap();
        std::fs::write(&pack_path, &bytes).unwrap();

        let pack = PackFile::open(&pack_path, HashKind::Sha1).unwrap();
        assert_eq!(pack.read(&base_id).unwrap().unwrap().data, base);
        let raw = pack.read(&target_id).unwrap().unwrap();
        assert_eq!(raw.kind, ObjectKind::Blob);
        assert_eq!(raw.data, target);
    }

    #[test]
    fn truncated_pack_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (pack_path, _, _) = build_pack(
            dir.path(),
            "probe",
            HashKind::Sha1,
            &[(ObjectKind::Blob, b"payload".to_vec())],
        )
        .unwrap();

        let mut bytes = std::fs::read(&pack_path).unwrap();
        bytes.truncate(10);
        std::fs::write(&pack_path, &bytes).unwrap();
        assert!(PackFile::open(&pack_path, HashKind::Sha1).is_err());
    }

    #[test]
    fn flipped_payload_byte_fails_checksum_check() {
        let dir = tempfile::tempdir().unwrap();
        let (pack_path, _, _) = build_pack(
            dir.path(),
            "probe",
            HashKind::Sha1,
            &[(ObjectKind::Blob, b"payload".to_vec())],
        )
        .unwrap();

        // Rewrite the trailer so it no longer matches what the index recorded.
        let mut bytes = std::fs::read(&pack_path).unwrap();
        let end = bytes.len();
        bytes[end - 1] ^= 0xff;
        std::fs::write(&pack_path, &bytes).unwrap();
        assert!(matches!(
            PackFile::open(&pack_path, HashKind::Sha1),
            Err(PackError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn count_disagreement_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (pack_path, _, _) = build_pack(
            dir.path(),
            "probe",
            HashKind::Sha1,
            &[(ObjectKind::Blob, b"payload".to_vec())],
        )
        .unwrap();

        let mut bytes = std::fs::read(&pack_path).unwrap();
        bytes[8..12].copy_from_slice(&9u32.to_be_bytes());
        std::fs::write(&pack_path, &bytes).unwrap();
        assert!(matches!(
            PackFile::open(&pack_path, HashKind::Sha1),
            Err(PackError::BadHeader(_)) | Err(PackError::ChecksumMismatch { .. })
        ));
    }
}
