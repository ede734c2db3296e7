//! Streaming digest computation over object payloads.

use digest::Digest;

use crate::{HashError, HashKind, ObjectId};

/// Incremental hasher producing an [`ObjectId`].
///
/// SHA-1 runs in collision-detecting mode; a digest over colliding input is
/// reported as [`HashError::CollisionDetected`] instead of being returned.
pub struct Hasher {
    state: State,
}

enum State {
    // Boxed: the collision-detecting state is large.
    Sha1(Box<sha1_checked::Sha1>),
    Sha256(sha2::Sha256),
}

impl Hasher {
    pub fn new(kind: HashKind) -> Self {
        let state = match kind {
            HashKind::Sha1 => State::Sha1(Box::new(sha1_checked::Sha1::new())),
            HashKind::Sha256 => State::Sha256(sha2::Sha256::new()),
        };
        Self { state }
    }

    pub fn update(&mut self, data: &[u8]) {
        match &mut self.state {
            State::Sha1(h) => h.update(data),
            State::Sha256(h) => h.update(data),
        }
    }

    pub fn finish(self) -> Result<ObjectId, HashError> {
        match self.state {
            State::Sha1(h) => {
                let out = h.try_finalize();
                if out.has_collision() {
                    return Err(HashError::CollisionDetected);
                }
                let mut d = [0u8; 20];
                d.copy_from_slice(out.hash().as_slice());
                Ok(ObjectId::Sha1(d))
            }
            State::Sha256(h) => {
                let mut d = [0u8; 32];
                d.copy_from_slice(&h.finalize());
                Ok(ObjectId::Sha256(d))
            }
        }
    }
}

impl std::io::Write for Hasher {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Hash an arbitrary byte string.
pub fn digest_of(kind: HashKind, data: &[u8]) -> Result<ObjectId, HashError> {
    let mut h = Hasher::new(kind);
    h.update(data);
    h.finish()
}

/// Hash a store object: the digest covers `"<type> <len>\0"` followed by
/// the uncompressed content.
pub fn hash_object(kind: HashKind, type_name: &str, content: &[u8]) -> Result<ObjectId, HashError> {
    let mut h = Hasher::new(kind);
    h.update(type_name.as_bytes());
    h.update(b" ");
    h.update(content.len().to_string().as_bytes());
    h.update(b"\0");
    h.update(content);
    h.finish()
}
