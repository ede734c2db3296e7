/// Errors from hash and object-id handling.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("bad hex digit {byte:#04x} at offset {index}")]
    BadHexChar { index: usize, byte: u8 },

    #[error("bad hex length {found}, expected {expected}")]
    BadHexLength { expected: usize, found: usize },

    #[error("bad digest length {found}, expected {expected} bytes")]
    BadDigestLength { expected: usize, found: usize },

    #[error("fan-out table is not monotonic at bucket {bucket}")]
    FanoutNotMonotonic { bucket: usize },

    #[error("refusing to hash: SHA-1 collision attack detected")]
    CollisionDetected,
}
