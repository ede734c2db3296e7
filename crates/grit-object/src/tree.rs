use std::cmp::Ordering;

use bstr::{BStr, BString, ByteSlice};
use grit_hash::{HashKind, ObjectId};

use crate::ObjectError;

/// The mode field of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryMode {
    /// `100644`
    File,
    /// `100755`
    ExecutableFile,
    /// `120000`
    Symlink,
    /// `160000`, a submodule pointer
    Commit,
    /// `40000`
    Directory,
    /// Anything else, preserved so unusual history re-encodes unchanged.
    Other(u32),
}

impl EntryMode {
    pub fn decode(octal: &[u8]) -> Result<Self, ObjectError> {
        if octal.is_empty() {
            return Err(ObjectError::BadTreeEntry {
                at: 0,
                reason: "empty mode".into(),
            });
        }
        let mut value: u32 = 0;
        for &b in octal {
            if !(b'0'..=b'7').contains(&b) {
                return Err(ObjectError::BadTreeEntry {
                    at: 0,
                    reason: format!("non-octal mode byte {b:#04x}"),
                });
            }
            value = value
                .checked_mul(8)
                .and_then(|v| v.checked_add(u32::from(b - b'0')))
                .ok_or_else(|| ObjectError::BadTreeEntry {
                    at: 0,
                    reason: "mode overflows u32".into(),
                })?;
        }
        Ok(Self::from_value(value))
    }

    pub fn from_value(value: u32) -> Self {
        match value {
            0o100644 => Self::File,
            0o100755 => Self::ExecutableFile,
            0o120000 => Self::Symlink,
            0o160000 => Self::Commit,
            0o040000 => Self::Directory,
            other => Self::Other(other),
        }
    }

    pub fn value(self) -> u32 {
        match self {
            Self::File => 0o100644,
            Self::ExecutableFile => 0o100755,
            Self::Symlink => 0o120000,
            Self::Commit => 0o160000,
            Self::Directory => 0o040000,
            Self::Other(v) => v,
        }
    }

    /// Octal wire form, no leading zero (so directories encode as `40000`).
    pub fn encode(self) -> String {
        format!("{:o}", self.value())
    }

    pub fn is_directory(self) -> bool {
        matches!(self, Self::Directory)
    }

    pub fn is_file(self) -> bool {
        matches!(self, Self::File | Self::ExecutableFile)
    }
}

/// One name in a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub mode: EntryMode,
    pub name: BString,
    pub id: ObjectId,
}

impl TreeEntry {
    /// The canonical order of tree entries: byte order, except a directory
    /// compares as its name with a trailing `/`. This keeps `sub` (a tree)
    /// after `sub.c` yet before `sub0`.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        let a = &self.name;
        let b = &other.name;
        let shared = a.len().min(b.len());
        match a[..shared].cmp(&b[..shared]) {
            Ordering::Equal => {}
            unequal => return unequal,
        }
        let next = |name: &BString, dir: bool| -> u8 {
            if name.len() > shared {
                name[shared]
            } else if dir {
                b'/'
            } else {
                0
            }
        };
        next(a, self.mode.is_directory()).cmp(&next(b, other.mode.is_directory()))
    }
}

impl PartialOrd for TreeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TreeEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical_cmp(other)
    }
}

/// A directory listing: names mapped to ids, in canonical order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tree {
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the binary body: repeated `<mode> <name>\0<digest>` records.
    /// `hash` fixes the digest width.
    pub fn decode(body: &[u8], hash: HashKind) -> Result<Self, ObjectError> {
        let digest_len = hash.digest_len();
        let mut entries = Vec::new();
        let mut at = 0;

        while at < body.len() {
            let sp = body[at..]
                .find_byte(b' ')
                .ok_or_else(|| ObjectError::BadTreeEntry {
                    at,
                    reason: "mode not terminated by space".into(),
                })?
                + at;
            let mode = EntryMode::decode(&body[at..sp]).map_err(|_| ObjectError::BadTreeEntry {
                at,
                reason: "unparseable mode".into(),
            })?;

            let name_at = sp + 1;
            let nul = body[name_at..]
                .find_byte(0)
                .ok_or_else(|| ObjectError::BadTreeEntry {
                    at: name_at,
                    reason: "name not NUL-terminated".into(),
                })?
                + name_at;
            if nul == name_at {
                return Err(ObjectError::BadTreeEntry {
                    at: name_at,
                    reason: "empty entry name".into(),
                });
            }

            let digest_at = nul + 1;
            let digest_end = digest_at + digest_len;
            if digest_end > body.len() {
                return Err(ObjectError::BadTreeEntry {
                    at: digest_at,
                    reason: "entry id truncated".into(),
                });
            }

            entries.push(TreeEntry {
                mode,
                name: BString::from(&body[name_at..nul]),
                id: ObjectId::from_raw(&body[digest_at..digest_end], hash)?,
            });
            at = digest_end;
        }

        Ok(Self { entries })
    }

    /// Encode the binary body, emitting entries in canonical order.
    pub fn encode_body(&self) -> Vec<u8> {
        let mut ordered: Vec<&TreeEntry> = self.entries.iter().collect();
        ordered.sort_by(|a, b| a.canonical_cmp(b));

        let mut out = Vec::new();
        for entry in ordered {
            out.extend_from_slice(entry.mode.encode().as_bytes());
            out.push(b' ');
            out.extend_from_slice(&entry.name);
            out.push(0);
            out.extend_from_slice(entry.id.bytes());
        }
        out
    }

    pub fn sort(&mut self) {
        self.entries.sort();
    }

    pub fn entry(&self, name: &BStr) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name.as_bstr() == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
