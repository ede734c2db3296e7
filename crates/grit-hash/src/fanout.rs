//! The 256-bucket fan-out table used by pack indexes.

use crate::{HashError, ObjectId};

/// Cumulative counts of objects per leading digest byte.
///
/// `table[b]` holds the number of objects whose first byte is `<= b`, so the
/// ids with leading byte `b` occupy `table[b-1]..table[b]` of the sorted id
/// list.
#[derive(Debug, Clone)]
pub struct Fanout {
    counts: [u32; 256],
}

/// Serialized size: 256 big-endian u32 values.
pub const FANOUT_BYTES: usize = 1024;

impl Fanout {
    /// Build from ids already sorted by digest bytes. Order is assumed,
    /// not checked.
    pub fn from_sorted(ids: &[ObjectId]) -> Self {
        let mut counts = [0u32; 256];
        for id in ids {
            counts[id.lead_byte() as usize] += 1;
        }
        for b in 1..256 {
            counts[b] += counts[b - 1];
        }
        Self { counts }
    }

    /// Positions in the sorted id list covered by leading byte `lead`.
    pub fn bucket(&self, lead: u8) -> std::ops::Range<usize> {
        let hi = self.counts[lead as usize] as usize;
        let lo = match lead.checked_sub(1) {
            Some(prev) => self.counts[prev as usize] as usize,
            None => 0,
        };
        lo..hi
    }

    pub fn len(&self) -> u32 {
        self.counts[255]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode from the on-disk form, checking monotonicity.
    pub fn decode(data: &[u8]) -> Result<Self, HashError> {
        if data.len() < FANOUT_BYTES {
            return Err(HashError::BadDigestLength {
                expected: FANOUT_BYTES,
                found: data.len(),
            });
        }
        let mut counts = [0u32; 256];
        for (b, slot) in counts.iter_mut().enumerate() {
            let at = b * 4;
            *slot = u32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]);
        }
        for b in 1..256 {
            if counts[b] < counts[b - 1] {
                return Err(HashError::FanoutNotMonotonic { bucket: b });
            }
        }
        Ok(Self { counts })
    }

    /// Encode to the on-disk form.
    pub fn encode(&self) -> [u8; FANOUT_BYTES] {
        let mut out = [0u8; FANOUT_BYTES];
        for (b, count) in self.counts.iter().enumerate() {
            out[b * 4..b * 4 + 4].copy_from_slice(&count.to_be_bytes());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HashKind;

    fn id_with_lead(lead: u8) -> ObjectId {
        let mut d = [0u8; 20];
        d[0] = lead;
        d[19] = lead.wrapping_mul(7);
        ObjectId::from_raw(&d, HashKind::Sha1).unwrap()
    }

    #[test]
    fn buckets_partition_the_list() {
        let mut ids = vec![
            id_with_lead(0x03),
            id_with_lead(0x03),
            id_with_lead(0x10),
            id_with_lead(0xfe),
        ];
        ids.sort();
        let f = Fanout::from_sorted(&ids);
        assert_eq!(f.len(), 4);
        assert_eq!(f.bucket(0x03), 0..2);
        assert_eq!(f.bucket(0x04), 2..2);
        assert_eq!(f.bucket(0x10), 2..3);
        assert_eq!(f.bucket(0xfe), 3..4);
        assert_eq!(f.bucket(0xff), 4..4);
    }

    #[test]
    fn empty_fanout() {
        let f = Fanout::from_sorted(&[]);
        assert!(f.is_empty());
        assert!(f.bucket(0x00).is_empty());
        assert!(f.bucket(0xff).is_empty());
    }

    #[test]
    fn wire_roundtrip() {
        let ids: Vec<ObjectId> = (0..=255u8).map(id_with_lead).collect();
        let f = Fanout::from_sorted(&ids);
        let decoded = Fanout::decode(&f.encode()).unwrap();
        assert_eq!(decoded.len(), f.len());
        for b in 0..=255u8 {
            assert_eq!(decoded.bucket(b), f.bucket(b));
        }
    }

    #[test]
    fn decode_rejects_short_input() {
        assert!(Fanout::decode(&[0u8; 16]).is_err());
    }

    #[test]
    fn decode_rejects_decreasing_counts() {
        let mut raw = [0u8; FANOUT_BYTES];
        raw[0..4].copy_from_slice(&5u32.to_be_bytes());
        raw[4..8].copy_from_slice(&2u32.to_be_bytes());
        assert!(matches!(
            Fanout::decode(&raw),
            Err(HashError::FanoutNotMonotonic { bucket: 1 })
        ));
    }
}
