//! Pack index (v2) lookup.
//!
//! The index is four fixed-width tables over the same sorted id list:
//!
//! ```text
//! header   \xff tOc, version 2
//! fanout   256 cumulative u32 counts by leading digest byte
//! ids      N sorted digests
//! crc32    N entry checksums
//! offsets  N u32 pack offsets; high bit set = slot in the wide table
//! wide     M u64 offsets for packs past 2 GiB
//! trailer  pack checksum, then index checksum
//! ```
//!
//! The file is memory mapped and consulted in place; a lookup touches the
//! fanout bucket for the id's first byte and binary searches inside it.

use std::path::{Path, PathBuf};

use grit_hash::{Fanout, HashKind, ObjectId, FANOUT_BYTES};
use memmap2::Mmap;

use crate::{PackError, IDX_MAGIC, IDX_VERSION, WIDE_OFFSET_BIT};

/// A memory-mapped v2 pack index.
pub struct PackIndex {
    map: Mmap,
    fanout: Fanout,
    hash: HashKind,
    path: PathBuf,
    ids_at: usize,
    crcs_at: usize,
    offsets_at: usize,
    wide_at: usize,
}

impl PackIndex {
    /// Open and validate an `.idx` file. The fanout table is checked for
    /// monotonicity and the section geometry against the file length.
    pub fn open(path: impl AsRef<Path>, hash: HashKind) -> Result<Self, PackError> {
        let path = path.as_ref().to_path_buf();
        let file = std::fs::File::open(&path)?;
        let map = unsafe { Mmap::map(&file)? };
        let digest_len = hash.digest_len();

        let head = 8 + FANOUT_BYTES;
        if map.len() < head + 2 * digest_len {
            return Err(PackError::BadIndex(format!(
                "{} bytes is shorter than an empty index",
                map.len()
            )));
        }
        if map[0..4] != IDX_MAGIC {
            return Err(PackError::BadIndex("bad signature".into()));
        }
        let version = u32::from_be_bytes([map[4], map[5], map[6], map[7]]);
        if version != IDX_VERSION {
            return Err(PackError::BadIndex(format!(
                "version {version}, only {IDX_VERSION} is supported"
            )));
        }

        let fanout = Fanout::decode(&map[8..head])
            .map_err(|e| PackError::BadIndex(e.to_string()))?;

        let n = fanout.len() as usize;
        let ids_at = head;
        let crcs_at = ids_at + n * digest_len;
        let offsets_at = crcs_at + n * 4;
        let wide_at = offsets_at + n * 4;
        if map.len() < wide_at + 2 * digest_len {
            return Err(PackError::BadIndex(format!(
                "{} bytes cannot hold {n} entries",
                map.len()
            )));
        }

        // Every wide-offset indirection must land inside the wide table, so
        // the accessors below can index without re-checking.
        let wide_count = (map.len() - wide_at - 2 * digest_len) / 8;
        for slot in 0..n {
            let at = offsets_at + slot * 4;
            let word = u32::from_be_bytes([map[at], map[at + 1], map[at + 2], map[at + 3]]);
            if word & WIDE_OFFSET_BIT != 0 && (word & !WIDE_OFFSET_BIT) as usize >= wide_count {
                return Err(PackError::BadIndex(format!(
                    "entry {slot} points at wide offset {} but the table holds {wide_count}",
                    word & !WIDE_OFFSET_BIT
                )));
            }
        }

        Ok(Self {
            map,
            fanout,
            hash,
            path,
            ids_at,
            crcs_at,
            offsets_at,
            wide_at,
        })
    }

    /// Number of objects indexed.
    pub fn len(&self) -> u32 {
        self.fanout.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fanout.is_empty()
    }

    pub fn hash(&self) -> HashKind {
        self.hash
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pack offset of `id`, if this pack holds it.
    pub fn find(&self, id: &ObjectId) -> Option<u64> {
        let target = id.bytes();
        let bucket = self.fanout.bucket(id.lead_byte());
        let mut lo = bucket.start;
        let mut hi = bucket.end;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.digest_at(mid).cmp(target) {
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
                std::cmp::Ordering::Equal => return Some(self.offset_at(mid as u32)),
            }
        }
        None
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.find(id).is_some()
    }

    /// All ids whose digest starts with `prefix`, with their offsets.
    pub fn find_prefix(&self, prefix: &[u8]) -> Vec<(ObjectId, u64)> {
        let Some(&lead) = prefix.first() else {
            return Vec::new();
        };
        self.fanout
            .bucket(lead)
            .filter(|&slot| self.digest_at(slot).starts_with(prefix))
            .map(|slot| (self.id_at(slot as u32), self.offset_at(slot as u32)))
            .collect()
    }

    /// The id in sorted position `slot`.
    pub fn id_at(&self, slot: u32) -> ObjectId {
        ObjectId::from_raw(self.digest_at(slot as usize), self.hash)
            .expect("index geometry guarantees digest width")
    }

    /// Pack offset of sorted position `slot`, following the wide-offset
    /// indirection where the high bit is set.
    pub fn offset_at(&self, slot: u32) -> u64 {
        let small = self.read_u32(self.offsets_at + slot as usize * 4);
        if small & WIDE_OFFSET_BIT == 0 {
            return u64::from(small);
        }
        let wide_slot = (small & !WIDE_OFFSET_BIT) as usize;
        let at = self.wide_at + wide_slot * 8;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.map[at..at + 8]);
        u64::from_be_bytes(raw)
    }

    /// CRC32 of the raw pack entry in sorted position `slot`.
    pub fn crc_at(&self, slot: u32) -> u32 {
        self.read_u32(self.crcs_at + slot as usize * 4)
    }

    /// Checksum of the pack this index describes, from the trailer.
    pub fn pack_checksum(&self) -> ObjectId {
        let digest_len = self.hash.digest_len();
        let at = self.map.len() - 2 * digest_len;
        ObjectId::from_raw(&self.map[at..at + digest_len], self.hash)
            .expect("trailer length checked at open")
    }

    /// Checksum of the index file itself, from the trailer.
    pub fn own_checksum(&self) -> ObjectId {
        let digest_len = self.hash.digest_len();
        let at = self.map.len() - digest_len;
        ObjectId::from_raw(&self.map[at..], self.hash)
            .expect("trailer length checked at open")
    }

    /// All `(id, offset)` pairs in sorted id order.
    pub fn entries(&self) -> Entries<'_> {
        Entries {
            index: self,
            slot: 0,
        }
    }

    fn digest_at(&self, slot: usize) -> &[u8] {
        let digest_len = self.hash.digest_len();
        let at = self.ids_at + slot * digest_len;
        &self.map[at..at + digest_len]
    }

    fn read_u32(&self, at: usize) -> u32 {
        u32::from_be_bytes([
            self.map[at],
            self.map[at + 1],
            self.map[at + 2],
            self.map[at + 3],
        ])
    }
}

/// Iterator over `(id, offset)` pairs in sorted id order.
pub struct Entries<'a> {
    index: &'a PackIndex,
    slot: u32,
}

impl Iterator for Entries<'_> {
    type Item = (ObjectId, u64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.slot >= self.index.len() {
            return None;
        }
        let slot = self.slot;
        self.slot += 1;
        Some((self.index.id_at(slot), self.index.offset_at(slot)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.index.len() - self.slot) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Entries<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{encode_index, IndexEntry};

    fn stub_id(lead: u8, tail: u8) -> ObjectId {
        let mut digest = [0u8; 20];
        digest[0] = lead;
        digest[19] = tail;
        ObjectId::from_raw(&digest, HashKind::Sha1).unwrap()
    }

    fn write_index(dir: &Path, entries: &[(ObjectId, u64, u32)]) -> PathBuf {
        let mut entries: Vec<IndexEntry> = entries
            .iter()
            .map(|&(id, offset, crc32)| IndexEntry { id, offset, crc32 })
            .collect();
        let bytes = encode_index(&mut entries, &ObjectId::ZERO_SHA1).unwrap();
        let path = dir.join("probe.idx");
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn find_present_and_absent() {
        let dir = tempfile::tempdir().unwrap();
        let id = stub_id(0xab, 0x01);
        let path = write_index(dir.path(), &[(id, 12, 0xdead_beef)]);

        let index = PackIndex::open(&path, HashKind::Sha1).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.find(&id), Some(12));
        assert!(index.contains(&id));
        assert_eq!(index.find(&stub_id(0xab, 0x02)), None);
        assert_eq!(index.find(&stub_id(0xac, 0x01)), None);
    }

    #[test]
    fn entries_come_back_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_index(
            dir.path(),
            &[
                (stub_id(0xff, 1), 100, 0),
                (stub_id(0x00, 1), 200, 0),
                (stub_id(0x55, 1), 300, 0),
            ],
        );

        let index = PackIndex::open(&path, HashKind::Sha1).unwrap();
        let ids: Vec<ObjectId> = index.entries().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![stub_id(0x00, 1), stub_id(0x55, 1), stub_id(0xff, 1)]);
        assert_eq!(index.entries().len(), 3);
        for (id, offset) in index.entries() {
            assert_eq!(index.find(&id), Some(offset));
        }
    }

    #[test]
    fn crc_values_survive() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_index(
            dir.path(),
            &[
                (stub_id(0x10, 1), 100, 0xaaaa_bbbb),
                (stub_id(0x20, 1), 200, 0xcccc_dddd),
            ],
        );
        let index = PackIndex::open(&path, HashKind::Sha1).unwrap();
        assert_eq!(index.crc_at(0), 0xaaaa_bbbb);
        assert_eq!(index.crc_at(1), 0xcccc_dddd);
    }

    #[test]
    fn wide_offsets_spill_into_the_64_bit_table() {
        let dir = tempfile::tempdir().unwrap();
        let far: u64 = 5 * 1024 * 1024 * 1024;
        let near = stub_id(0x01, 1);
        let deep = stub_id(0x42, 1);
        let path = write_index(dir.path(), &[(near, 300, 0), (deep, far, 0)]);

        let index = PackIndex::open(&path, HashKind::Sha1).unwrap();
        assert_eq!(index.find(&near), Some(300));
        assert_eq!(index.find(&deep), Some(far));
    }

    #[test]
    fn prefix_search_filters_the_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_index(
            dir.path(),
            &[
                (stub_id(0xab, 1), 100, 0),
                (stub_id(0xab, 2), 200, 0),
                (stub_id(0xac, 1), 300, 0),
            ],
        );
        let index = PackIndex::open(&path, HashKind::Sha1).unwrap();
        assert_eq!(index.find_prefix(&[0xab]).len(), 2);
        assert_eq!(index.find_prefix(&[0xac]).len(), 1);
        assert!(index.find_prefix(&[]).is_empty());
    }

    #[test]
    fn empty_index_answers_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_index(dir.path(), &[]);
        let index = PackIndex::open(&path, HashKind::Sha1).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.find(&stub_id(0, 0)), None);
        assert_eq!(index.entries().count(), 0);
    }

    #[test]
    fn bad_signature_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_index(dir.path(), &[]);
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[0] = b'X';
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(
            PackIndex::open(&path, HashKind::Sha1),
            Err(PackError::BadIndex(_))
        ));
    }

    #[test]
    fn short_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stub.idx");
        std::fs::write(&path, b"\xfftOc").unwrap();
        assert!(matches!(
            PackIndex::open(&path, HashKind::Sha1),
            Err(PackError::BadIndex(_))
        ));
    }

    #[test]
    fn wide_offset_slot_past_the_table_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_index(dir.path(), &[(stub_id(0x01, 1), 10, 0)]);
        let mut bytes = std::fs::read(&path).unwrap();
        // Point the single entry's offset word at a wide slot that does not
        // exist (high bit set, huge slot number).
        let offsets_at = 8 + FANOUT_BYTES + 20 + 4;
        bytes[offsets_at..offsets_at + 4].copy_from_slice(&0xffff_ffffu32.to_be_bytes());
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(
            PackIndex::open(&path, HashKind::Sha1),
            Err(PackError::BadIndex(_))
        ));
    }

    #[test]
    fn decreasing_fanout_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_index(dir.path(), &[(stub_id(0x01, 1), 10, 0)]);
        let mut bytes = std::fs::read(&path).unwrap();
        // Bump bucket 0 above bucket 1's cumulative count.
        bytes[8..12].copy_from_slice(&9u32.to_be_bytes());
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(
            PackIndex::open(&path, HashKind::Sha1),
            Err(PackError::BadIndex(_))
        ));
    }
}
