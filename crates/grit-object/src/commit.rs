use bstr::{BStr, BString, ByteSlice};
use grit_hash::ObjectId;

use crate::{Ident, ObjectError};

/// A commit: a tree snapshot plus its ancestry and authorship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub tree: ObjectId,
    pub parents: Vec<ObjectId>,
    pub author: Ident,
    pub committer: Ident,
    /// `encoding` header, when the message is not UTF-8.
    pub encoding: Option<BString>,
    /// Detached signature over the commit, when present.
    pub signature: Option<BString>,
    /// Headers this implementation does not interpret, kept in order so the
    /// commit re-encodes to the bytes it hashed as.
    pub extra_headers: Vec<(BString, BString)>,
    pub message: BString,
}

/// One logical header line with continuation lines folded in, plus the
/// offset the next line starts at.
fn take_header(data: &[u8], start: usize) -> (BString, BString, usize) {
    let line_end = data[start..]
        .find_byte(b'\n')
        .map(|p| p + start)
        .unwrap_or(data.len());
    let line = &data[start..line_end];
    let (key, mut value) = match line.find_byte(b' ') {
        Some(sp) => (BString::from(&line[..sp]), Vec::from(&line[sp + 1..])),
        None => (BString::from(line), Vec::new()),
    };

    // Continuation lines open with a single space.
    let mut next = line_end + 1;
    while next < data.len() && data[next] == b' ' {
        let cont_end = data[next..]
            .find_byte(b'\n')
            .map(|p| p + next)
            .unwrap_or(data.len());
        value.push(b'\n');
        value.extend_from_slice(&data[next + 1..cont_end]);
        next = cont_end + 1;
    }
    (key, BString::from(value), next)
}

/// Append a header, splitting a multi-line value back into continuations.
fn put_header(out: &mut Vec<u8>, key: &[u8], value: &[u8]) {
    out.extend_from_slice(key);
    out.push(b' ');
    for (i, line) in value.split(|&b| b == b'\n').enumerate() {
        if i > 0 {
            out.extend_from_slice(b"\n ");
        }
        out.extend_from_slice(line);
    }
    out.push(b'\n');
}

fn id_from_hex_value(value: &BStr, what: &'static str) -> Result<ObjectId, ObjectError> {
    let hex = std::str::from_utf8(value)
        .map_err(|_| ObjectError::BadHeader(format!("non-UTF-8 {what} id")))?;
    Ok(ObjectId::parse_hex(hex)?)
}

impl Commit {
    /// Decode a commit body (no object header).
    pub fn decode(body: &[u8]) -> Result<Self, ObjectError> {
        let mut tree = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;
        let mut encoding = None;
        let mut signature = None;
        let mut extra_headers = Vec::new();

        let mut at = 0;
        while at < body.len() && body[at] != b'\n' {
            let (key, value, next) = take_header(body, at);
            match key.as_slice() {
                b"tree" => tree = Some(id_from_hex_value(value.as_ref(), "tree")?),
                b"parent" => parents.push(id_from_hex_value(value.as_ref(), "parent")?),
                b"author" => author = Some(Ident::decode(value.as_ref())?),
                b"committer" => committer = Some(Ident::decode(value.as_ref())?),
                b"encoding" => encoding = Some(value),
                b"gpgsig" | b"gpgsig-sha256" => signature = Some(value),
                _ => extra_headers.push((key, value)),
            }
            at = next;
        }
        // Step over the blank separator when one exists.
        let message = if at < body.len() {
            BString::from(&body[at + 1..])
        } else {
            BString::default()
        };

        Ok(Self {
            tree: tree.ok_or(ObjectError::CommitFieldMissing("tree"))?,
            parents,
            author: author.ok_or(ObjectError::CommitFieldMissing("author"))?,
            committer: committer.ok_or(ObjectError::CommitFieldMissing("committer"))?,
            encoding,
            signature,
            extra_headers,
            message,
        })
    }

    /// Encode the commit body in canonical header order.
    pub fn encode_body(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_header(&mut out, b"tree", self.tree.to_hex().as_bytes());
        for parent in &self.parents {
            put_header(&mut out, b"parent", parent.to_hex().as_bytes());
        }
        put_header(&mut out, b"author", &self.author.encode());
        put_header(&mut out, b"committer", &self.committer.encode());
        if let Some(encoding) = &self.encoding {
            put_header(&mut out, b"encoding", encoding);
        }
        if let Some(signature) = &self.signature {
            put_header(&mut out, b"gpgsig", signature);
        }
        for (key, value) in &self.extra_headers {
            put_header(&mut out, key, value);
        }
        out.push(b'\n');
        out.extend_from_slice(&self.message);
        out
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// First line of the message.
    pub fn summary(&self) -> &BStr {
        match self.message.find_byte(b'\n') {
            Some(end) => self.message[..end].as_bstr(),
            None => self.message.as_bstr(),
        }
    }
}
