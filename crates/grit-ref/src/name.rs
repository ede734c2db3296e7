use std::fmt;

use bstr::{BStr, BString, ByteSlice};

use crate::RefError;

/// Bytes that may not appear anywhere in a ref name.
const REJECTED_BYTES: &[u8] = b" ~^:?*[\\";

/// Names valid at the git-dir root without a `refs/` prefix.
const ROOT_PSEUDO_REFS: &[&str] = &[
    "HEAD",
    "ORIG_HEAD",
    "FETCH_HEAD",
    "MERGE_HEAD",
    "CHERRY_PICK_HEAD",
    "REVERT_HEAD",
    "BISECT_HEAD",
    "REBASE_HEAD",
];

/// A reference name that passed `git-check-ref-format` validation.
///
/// Construction is the only gate; once a `RefName` exists the rest of the
/// crate treats it as safe to embed in paths and file formats. Ordering is
/// byte order over the full name, the order `packed-refs` files are sorted
/// in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RefName(BString);

impl RefName {
    pub fn new(name: impl Into<BString>) -> Result<Self, RefError> {
        let name = name.into();
        check_format(&name)?;
        Ok(Self(name))
    }

    /// The name without its category prefix: `main` for `refs/heads/main`,
    /// `origin/main` for `refs/remotes/origin/main`. Names outside the three
    /// standard categories come back whole.
    pub fn shorthand(&self) -> &BStr {
        let full = self.0.as_bstr();
        for prefix in [b"refs/heads/".as_slice(), b"refs/tags/", b"refs/remotes/"] {
            if let Some(rest) = full.strip_prefix(prefix) {
                return rest.as_bstr();
            }
        }
        full
    }

    pub fn is_branch(&self) -> bool {
        self.0.starts_with(b"refs/heads/")
    }

    pub fn is_tag(&self) -> bool {
        self.0.starts_with(b"refs/tags/")
    }

    /// True for `HEAD` and the other single-component names that live at
    /// the git-dir root rather than under `refs/`.
    pub fn is_pseudo(&self) -> bool {
        ROOT_PSEUDO_REFS.iter().any(|p| self.0 == p.as_bytes())
    }

    pub fn as_bstr(&self) -> &BStr {
        self.0.as_bstr()
    }

    /// Validated names are ASCII, so this never actually falls back.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("<non-utf8 ref>")
    }
}

impl AsRef<BStr> for RefName {
    fn as_ref(&self) -> &BStr {
        self.0.as_bstr()
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn bad(name: &[u8], reason: impl Into<String>) -> RefError {
    RefError::InvalidName {
        name: String::from_utf8_lossy(name).into_owned(),
        reason: reason.into(),
    }
}

/// Enforce the `git-check-ref-format` rules.
fn check_format(name: &[u8]) -> Result<(), RefError> {
    if name.is_empty() {
        return Err(bad(name, "empty"));
    }
    if name == b"@" {
        return Err(bad(name, "the single character '@' is reserved"));
    }

    let mut previous = 0u8;
    for &b in name.iter() {
        if b == 0 || b < 0x20 || b == 0x7f {
            return Err(bad(name, "control byte"));
        }
        if REJECTED_BYTES.contains(&b) {
            return Err(bad(name, format!("character {:?} not allowed", b as char)));
        }
        if previous == b'@' && b == b'{' {
            return Err(bad(name, "contains '@{'"));
        }
        if previous == b'.' && b == b'.' {
            return Err(bad(name, "contains '..'"));
        }
        previous = b;
    }
    if previous == b'.' {
        return Err(bad(name, "ends with '.'"));
    }

    // An empty component covers leading '/', trailing '/', and '//' at once.
    for component in name.split_str(b"/") {
        if component.is_empty() {
            return Err(bad(name, "empty path component"));
        }
        if component.starts_with(b".") {
            return Err(bad(name, "component starts with '.'"));
        }
        if component.ends_with(b".lock") {
            return Err(bad(name, "component ends with '.lock'"));
        }
    }

    Ok(())
}
