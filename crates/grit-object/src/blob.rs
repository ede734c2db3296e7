/// Raw file contents. The store does not interpret a blob's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Blob {
    contents: Vec<u8>,
}

impl Blob {
    pub fn from_bytes(contents: impl Into<Vec<u8>>) -> Self {
        Self {
            contents: contents.into(),
        }
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    pub fn into_contents(self) -> Vec<u8> {
        self.contents
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}
