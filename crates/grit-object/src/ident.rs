//! Identity lines of the form `Name <email> <seconds> <±hhmm>`.

use bstr::{BStr, BString, ByteSlice, ByteVec};
use chrono::{Local, Offset};

use crate::ObjectError;

/// A moment in time as commits record it: epoch seconds plus the author's
/// UTC offset in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Time {
    pub seconds: i64,
    pub offset_minutes: i32,
}

impl Time {
    pub fn new(seconds: i64, offset_minutes: i32) -> Self {
        Self {
            seconds,
            offset_minutes,
        }
    }

    /// The current wall-clock time in the local zone.
    pub fn now() -> Self {
        let now = Local::now();
        Self {
            seconds: now.timestamp(),
            offset_minutes: now.offset().fix().local_minus_utc() / 60,
        }
    }

    /// Parse `"<seconds> <±hhmm>"`.
    fn parse(text: &str) -> Result<Self, ObjectError> {
        let mut fields = text.split_ascii_whitespace();
        let seconds = fields
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ObjectError::BadIdent(format!("bad timestamp in {text:?}")))?;
        let offset_minutes = match fields.next() {
            Some(zone) => parse_zone(zone)
                .ok_or_else(|| ObjectError::BadIdent(format!("bad zone in {text:?}")))?,
            None => 0,
        };
        Ok(Self {
            seconds,
            offset_minutes,
        })
    }

    /// Format the `±hhmm` zone suffix.
    fn zone_suffix(&self) -> String {
        let sign = if self.offset_minutes < 0 { '-' } else { '+' };
        let abs = self.offset_minutes.unsigned_abs();
        format!("{sign}{:02}{:02}", abs / 60, abs % 60)
    }
}

fn parse_zone(zone: &str) -> Option<i32> {
    let bytes = zone.as_bytes();
    if bytes.len() != 5 {
        return None;
    }
    let sign = match bytes[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let digits = std::str::from_utf8(&bytes[1..]).ok()?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    Some(sign * (hours * 60 + minutes))
}

/// Who and when: the author/committer/tagger identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: BString,
    pub email: BString,
    pub time: Time,
}

impl Ident {
    pub fn new(name: impl Into<BString>, email: impl Into<BString>, time: Time) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            time,
        }
    }

    /// Parse the value portion of an `author`/`committer`/`tagger` line.
    pub fn decode(line: &BStr) -> Result<Self, ObjectError> {
        let bytes = line.as_bytes();
        let close = bytes
            .iter()
            .rposition(|&b| b == b'>')
            .ok_or_else(|| ObjectError::BadIdent("no '>' delimiter".into()))?;
        let open = bytes[..close]
            .iter()
            .rposition(|&b| b == b'<')
            .ok_or_else(|| ObjectError::BadIdent("no '<' delimiter".into()))?;

        let name = bytes[..open].trim();
        let email = &bytes[open + 1..close];
        let when = std::str::from_utf8(bytes[close + 1..].trim())
            .map_err(|_| ObjectError::BadIdent("non-UTF-8 timestamp".into()))?;

        Ok(Self {
            name: BString::from(name),
            email: BString::from(email),
            time: Time::parse(when)?,
        })
    }

    /// Canonical wire form.
    pub fn encode(&self) -> BString {
        let mut out = BString::from(Vec::new());
        out.push_str(&self.name);
        out.push_str(b" <");
        out.push_str(&self.email);
        out.push_str(b"> ");
        out.push_str(self.time.seconds.to_string());
        out.push_str(b" ");
        out.push_str(self.time.zone_suffix());
        out
    }
}
