use bstr::{BString, ByteSlice};
use grit_hash::ObjectId;

use crate::{Ident, ObjectError, ObjectKind};

/// An annotated tag: a named, messaged pointer at another object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub target: ObjectId,
    pub target_kind: ObjectKind,
    pub name: BString,
    /// Ancient tags predate the `tagger` header.
    pub tagger: Option<Ident>,
    pub message: BString,
    /// An armored signature trailing the message, when the tag is signed.
    pub signature: Option<BString>,
}

const SIG_OPENERS: [&[u8]; 2] = [
    b"-----BEGIN PGP SIGNATURE-----",
    b"-----BEGIN SSH SIGNATURE-----",
];

impl Tag {
    /// Decode a tag body (no object header).
    pub fn decode(body: &[u8]) -> Result<Self, ObjectError> {
        let mut target = None;
        let mut target_kind = None;
        let mut name = None;
        let mut tagger = None;

        let mut at = 0;
        while at < body.len() && body[at] != b'\n' {
            let line_end = body[at..]
                .find_byte(b'\n')
                .map(|p| p + at)
                .unwrap_or(body.len());
            let line = &body[at..line_end];
            if let Some(sp) = line.find_byte(b' ') {
                let (key, value) = (&line[..sp], &line[sp + 1..]);
                match key {
                    b"object" => {
                        let hex = std::str::from_utf8(value)
                            .map_err(|_| ObjectError::BadHeader("non-UTF-8 object id".into()))?;
                        target = Some(ObjectId::parse_hex(hex)?);
                    }
                    b"type" => target_kind = Some(ObjectKind::from_name(value)?),
                    b"tag" => name = Some(BString::from(value)),
                    b"tagger" => tagger = Some(Ident::decode(value.as_bstr())?),
                    // Unknown tag headers are skipped.
                    _ => {}
                }
            }
            at = line_end + 1;
        }
        if at < body.len() {
            at += 1; // the blank separator
        }

        // A trailing armored block is split out of the message.
        let tail = &body[at..];
        let (message, signature) = match SIG_OPENERS
            .iter()
            .find_map(|opener| tail.find(opener))
        {
            Some(sig_at) => (
                BString::from(&tail[..sig_at]),
                Some(BString::from(&tail[sig_at..])),
            ),
            None => (BString::from(tail), None),
        };

        Ok(Self {
            target: target.ok_or(ObjectError::TagFieldMissing("object"))?,
            target_kind: target_kind.ok_or(ObjectError::TagFieldMissing("type"))?,
            name: name.ok_or(ObjectError::TagFieldMissing("tag"))?,
            tagger,
            message,
            signature,
        })
    }

    /// Encode the tag body in canonical order.
    pub fn encode_body(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"object ");
        out.extend_from_slice(self.target.to_hex().as_bytes());
        out.extend_from_slice(b"\ntype ");
        out.extend_from_slice(self.target_kind.name_bytes());
        out.extend_from_slice(b"\ntag ");
        out.extend_from_slice(&self.name);
        out.push(b'\n');
        if let Some(tagger) = &self.tagger {
            out.extend_from_slice(b"tagger ");
            out.extend_from_slice(&tagger.encode());
            out.push(b'\n');
        }
        out.push(b'\n');
        out.extend_from_slice(&self.message);
        if let Some(signature) = &self.signature {
            out.extend_from_slice(signature);
        }
        out
    }
}
