//! The `packed-refs` file: many refs, one sorted text file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use bstr::ByteSlice;
use grit_fs::LockFile;
use grit_hash::ObjectId;

use crate::name::RefName;
use crate::RefError;

/// The header written at the top of every file this crate produces. The
/// `sorted` trait is what licenses binary search on re-read.
const HEADER: &[u8] = b"# pack-refs with: peeled fully-peeled sorted \n";

/// One packed ref. `peeled` carries the target of an annotated tag so
/// readers can skip loading the tag object.
#[derive(Debug, Clone)]
pub struct PackedEntry {
    pub name: RefName,
    pub oid: ObjectId,
    pub peeled: Option<ObjectId>,
}

/// In-memory image of a `packed-refs` file.
///
/// Lines are `<hex> <name>`, optionally followed by `^<hex>` carrying the
/// peeled id of the entry above. A `# pack-refs with:` comment names the
/// traits the writer guaranteed; files without the `sorted` trait fall back
/// to linear lookup.
#[derive(Debug, Clone)]
pub struct PackedRefs {
    entries: Vec<PackedEntry>,
    sorted: bool,
}

impl PackedRefs {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            sorted: true,
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self, RefError> {
        parse_at(Path::new("packed-refs"), data)
    }

    /// Read the git dir's `packed-refs`, or an empty set if there is none.
    pub fn load(git_dir: &Path) -> Result<Self, RefError> {
        let path = file_path(git_dir);
        match fs::read(&path) {
            Ok(data) => parse_at(&path, &data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::empty()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn find(&self, name: &RefName) -> Option<&PackedEntry> {
        if self.sorted {
            self.entries
                .binary_search_by(|e| e.name.cmp(name))
                .ok()
                .map(|i| &self.entries[i])
        } else {
            self.entries.iter().find(|e| &e.name == name)
        }
    }

    /// Insert or replace an entry, keeping the set sorted.
    pub fn upsert(&mut self, name: RefName, oid: ObjectId, peeled: Option<ObjectId>) {
        let entry = PackedEntry { name, oid, peeled };
        match self
            .entries
            .binary_search_by(|e| e.name.cmp(&entry.name))
        {
            Ok(i) if self.sorted => self.entries[i] = entry,
            Err(i) if self.sorted => self.entries.insert(i, entry),
            _ => {
                // Unsorted input file; restore the invariant now.
                self.entries.retain(|e| e.name != entry.name);
                self.entries.push(entry);
                self.entries.sort_by(|a, b| a.name.cmp(&b.name));
                self.sorted = true;
            }
        }
    }

    /// Drop an entry. Returns whether it was present.
    pub fn remove(&mut self, name: &RefName) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| &e.name != name);
        self.entries.len() != before
    }

    /// Rewrite the git dir's `packed-refs` under lock.
    pub fn store(&self, git_dir: &Path) -> Result<(), RefError> {
        let mut lock = LockFile::acquire(file_path(git_dir))?;
        lock.write_all(HEADER)?;
        let mut ordered: Vec<&PackedEntry> = self.entries.iter().collect();
        ordered.sort_by(|a, b| a.name.cmp(&b.name));
        for entry in ordered {
            writeln!(lock, "{} {}", entry.oid.to_hex(), entry.name)?;
            if let Some(peeled) = &entry.peeled {
                writeln!(lock, "^{}", peeled.to_hex())?;
            }
        }
        lock.commit()?;
        Ok(())
    }

    pub fn entries(&self) -> &[PackedEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn file_path(git_dir: &Path) -> PathBuf {
    git_dir.join("packed-refs")
}

fn parse_at(path: &Path, data: &[u8]) -> Result<PackedRefs, RefError> {
    let malformed = |reason: &str| RefError::Parse {
        path: path.to_path_buf(),
        reason: reason.into(),
    };

    let mut entries = Vec::new();
    let mut sorted = false;

    for line in data.lines() {
        if line.is_empty() {
            continue;
        }
        if line[0] == b'#' {
            sorted |= line.find(b"sorted").is_some();
            continue;
        }
        if line[0] == b'^' {
            let hex = std::str::from_utf8(line[1..].trim())
                .map_err(|_| malformed("peeled line is not hex"))?;
            let entry: &mut PackedEntry = entries
                .last_mut()
                .ok_or_else(|| malformed("peeled line with no entry above it"))?;
            entry.peeled = Some(ObjectId::parse_hex(hex)?);
            continue;
        }

        let space = line
            .find_byte(b' ')
            .ok_or_else(|| malformed("entry line has no separator"))?;
        let hex = std::str::from_utf8(&line[..space])
            .map_err(|_| malformed("entry id is not hex"))?;
        let name = std::str::from_utf8(line[space + 1..].trim())
            .map_err(|_| malformed("entry name is not UTF-8"))?;
        entries.push(PackedEntry {
            name: RefName::new(name)?,
            oid: ObjectId::parse_hex(hex)?,
            peeled: None,
        });
    }

    Ok(PackedRefs { entries, sorted })
}
