//! Shared layout fragments.
//!
//! Every record opens with the same 11-byte header: two-byte kind, one-byte
//! data category, eight-byte creation date. Race-scoped records follow with
//! the 16-byte race key (meeting date, venue, meeting number, day number,
//! race number), whose concatenated ASCII form is the [`RaceId`].

use crate::fieldspec::{DateFormat, FieldEncoding, FieldMap, FieldSpec, RecordError, field};
use crate::ids::{RaceId, RunnerId};
use crate::text;

pub const KIND: FieldSpec = field("kind", 0, 2, FieldEncoding::TextRaw);
pub const DATA_CATEGORY: FieldSpec = field("data_category", 2, 1, FieldEncoding::Code);
pub const CREATED: FieldSpec = field("created", 3, 8, FieldEncoding::Date(DateFormat::Ymd));

/// First byte after the common header.
pub const HEADER_END: usize = 11;

pub const MEETING_DATE: FieldSpec = field("meeting_date", 11, 8, FieldEncoding::Date(DateFormat::Ymd));
pub const VENUE: FieldSpec = field("venue", 19, 2, FieldEncoding::Code);
pub const MEETING: FieldSpec = field("meeting", 21, 2, FieldEncoding::Integer);
pub const DAY: FieldSpec = field("day", 23, 2, FieldEncoding::Integer);
pub const RACE_NUMBER: FieldSpec = field("race_number", 25, 2, FieldEncoding::Integer);

/// First byte after the race key.
pub const RACE_KEY_END: usize = 27;

/// Extract the 16-character race key at bytes 11..27 as a validated
/// [`RaceId`]. Blank is a missing required field; malformed is invalid.
pub fn race_id(bytes: &[u8]) -> Result<RaceId, RecordError> {
    if bytes.len() < RACE_KEY_END {
        return Err(RecordError::TooShort {
            expected: RACE_KEY_END,
            actual: bytes.len(),
        });
    }
    let raw = text::decode(&bytes[HEADER_END..RACE_KEY_END]);
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RecordError::MissingField { name: "race_key" });
    }
    RaceId::try_from(trimmed).map_err(|reason| RecordError::InvalidField {
        name: "race_key",
        value: trimmed.to_owned(),
        reason,
    })
}

/// Read a required 10-digit runner id out of a parsed field.
pub fn require_runner_id(map: &FieldMap, name: &'static str) -> Result<RunnerId, RecordError> {
    let raw = map.require_text(name)?;
    RunnerId::try_from(raw.as_str()).map_err(|reason| RecordError::InvalidField {
        name,
        value: raw,
        reason,
    })
}

/// Read an optional runner id; blank yields `None`, malformed is an error.
pub fn optional_runner_id(
    map: &FieldMap,
    name: &'static str,
) -> Result<Option<RunnerId>, RecordError> {
    match map.text(name) {
        None => Ok(None),
        Some(raw) => RunnerId::try_from(raw)
            .map(Some)
            .map_err(|reason| RecordError::InvalidField {
                name,
                value: raw.to_owned(),
                reason,
            }),
    }
}

/// Parse `count` fixed-size blocks starting at `base`. The block spec table
/// uses offsets relative to the block start. Blocks for which `f` returns
/// `None` (e.g. blank filler slots) are skipped.
pub fn parse_blocks<T>(
    bytes: &[u8],
    base: usize,
    block_len: usize,
    count: usize,
    specs: &[FieldSpec],
    f: impl Fn(&FieldMap) -> Result<Option<T>, RecordError>,
) -> Result<Vec<T>, RecordError> {
    let end = base + block_len * count;
    if end > bytes.len() {
        return Err(RecordError::TooShort {
            expected: end,
            actual: bytes.len(),
        });
    }
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let start = base + i * block_len;
        let map = crate::fieldspec::parse_fields(&bytes[start..start + block_len], specs)?;
        if let Some(item) = f(&map)? {
            out.push(item);
        }
    }
    Ok(out)
}
