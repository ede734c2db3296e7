//! The loose ref tier: one file per ref under the git dir.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use bstr::ByteSlice;
use grit_fs::LockFile;
use grit_hash::ObjectId;

use crate::name::RefName;
use crate::{Ref, RefError};

/// Where the loose file for `name` lives. Pseudo-refs sit directly in the
/// git dir; everything else is its own path under `refs/`.
pub(crate) fn file_path(git_dir: &Path, name: &RefName) -> PathBuf {
    git_dir.join(name.as_str())
}

fn parse_error(path: &Path, reason: impl Into<String>) -> RefError {
    RefError::Parse {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Read and decode one loose ref file. `Ok(None)` when the file is absent.
pub(crate) fn read(git_dir: &Path, name: &RefName) -> Result<Option<Ref>, RefError> {
    let path = file_path(git_dir, name);
    let raw = match fs::read(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        // A name that is only a directory of deeper refs has no value of
        // its own; treat it as absent.
        Err(_) if path.is_dir() => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let line = raw.trim();

    if let Some(rest) = line.strip_prefix(b"ref: ") {
        let target = std::str::from_utf8(rest.trim())
            .map_err(|_| parse_error(&path, "symbolic target is not UTF-8"))?;
        Ok(Some(Ref::Symbolic {
            name: name.clone(),
            target: RefName::new(target)?,
        }))
    } else {
        let hex = std::str::from_utf8(line)
            .map_err(|_| parse_error(&path, "object id is not hex"))?;
        Ok(Some(Ref::Direct {
            name: name.clone(),
            oid: ObjectId::parse_hex(hex)?,
        }))
    }
}

/// Bind `name` to `oid`, creating or replacing the loose file under lock.
pub(crate) fn write_direct(git_dir: &Path, name: &RefName, oid: &ObjectId) -> Result<(), RefError> {
    write_contents(git_dir, name, format!("{}\n", oid.to_hex()).as_bytes())
}

/// Point `name` at another ref, creating or replacing the loose file.
pub(crate) fn write_symbolic(
    git_dir: &Path,
    name: &RefName,
    target: &RefName,
) -> Result<(), RefError> {
    write_contents(git_dir, name, format!("ref: {target}\n").as_bytes())
}

fn write_contents(git_dir: &Path, name: &RefName, contents: &[u8]) -> Result<(), RefError> {
    let path = file_path(git_dir, name);
    reject_path_conflicts(git_dir, name, &path)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut lock = LockFile::acquire(&path)?;
    lock.write_all(contents)?;
    lock.commit()?;
    Ok(())
}

/// Remove the loose file and any directories left empty above it.
///
/// The rename-based lock protocol means readers either still see the full
/// old file or none at all; the directory pruning afterwards is best-effort.
pub(crate) fn remove(git_dir: &Path, name: &RefName) -> Result<(), RefError> {
    let path = file_path(git_dir, name);
    match fs::remove_file(&path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    }

    let stop = git_dir.join("refs");
    let mut dir = path.parent().map(Path::to_path_buf);
    while let Some(d) = dir {
        if d == stop || d == *git_dir || fs::remove_dir(&d).is_err() {
            break;
        }
        dir = d.parent().map(Path::to_path_buf);
    }
    Ok(())
}

/// A ref file and a ref directory cannot share a path: `refs/heads/a`
/// blocks `refs/heads/a/b` and vice versa.
fn reject_path_conflicts(git_dir: &Path, name: &RefName, path: &Path) -> Result<(), RefError> {
    let conflict = |occupied: &Path| RefError::DirectoryConflict {
        name: name.to_string(),
        occupied: occupied
            .strip_prefix(git_dir)
            .unwrap_or(occupied)
            .display()
            .to_string(),
    };

    if path.is_dir() {
        return Err(conflict(path));
    }
    let mut walk = git_dir.to_path_buf();
    for component in name.as_str().split('/') {
        walk.push(component);
        if walk == *path {
            break;
        }
        if walk.is_file() {
            return Err(conflict(&walk));
        }
    }
    Ok(())
}

/// All loose refs under `refs/`, sorted by name. Pseudo-refs at the git-dir
/// root are addressed individually and never enumerated.
pub(crate) fn scan(git_dir: &Path, prefix: Option<&str>) -> Result<Vec<RefName>, RefError> {
    let root = git_dir.join("refs");
    let mut found = Vec::new();
    if root.is_dir() {
        walk_dir(git_dir, &root, prefix, &mut found)?;
    }
    found.sort();
    Ok(found)
}

fn walk_dir(
    git_dir: &Path,
    dir: &Path,
    prefix: Option<&str>,
    found: &mut Vec<RefName>,
) -> Result<(), RefError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            walk_dir(git_dir, &path, prefix, found)?;
            continue;
        }
        let Ok(rel) = path.strip_prefix(git_dir) else {
            continue;
        };
        let Some(text) = rel.to_str() else { continue };
        if text.ends_with(".lock") {
            continue;
        }
        if let Some(p) = prefix {
            if !text.starts_with(p) {
                continue;
            }
        }
        // Stray files with invalid names are ignored, not fatal.
        if let Ok(name) = RefName::new(text) {
            found.push(name);
        }
    }
    Ok(())
}
