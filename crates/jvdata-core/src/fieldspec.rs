//! Field-specification DSL and the fixed-length parse engine.
//!
//! Every record parser in [`crate::records`] is driven by a static table of
//! [`FieldSpec`] rows. A row names a field, fixes its byte window, and picks
//! one of the encodings below. [`parse_fields`] applies a table to a raw
//! buffer and produces a [`FieldMap`].
//!
//! Numeric and date fields distinguish *blank* (space-filled upstream, the
//! feed's way of saying "not reported") from *malformed*: blank decodes to
//! [`FieldValue::Missing`], malformed is a hard [`RecordError::InvalidField`].

use crate::text;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::HashMap;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Spec rows
// ---------------------------------------------------------------------------

/// Date/time layouts used by the feed. All parsing is invariant-culture:
/// the format strings below go straight to chrono, never through a locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    /// `yyyyMMdd`
    Ymd,
    /// `yyyyMMddHHmm`
    YmdHm,
    /// `yyyyMMddHHmmss`
    YmdHms,
    /// `HHmm` (time of day only)
    Hm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldEncoding {
    /// Shift-JIS decode, width-normalise, trim.
    Text,
    /// Shift-JIS decode, trim. No normalisation.
    TextRaw,
    /// Base-10 signed integer. Blank is missing.
    Integer,
    /// Integer divided by `10^precision`. Blank is missing.
    Decimal(u32),
    /// Date/time in the given layout. Blank or all-zeros is missing.
    Date(DateFormat),
    /// `"1"` is true, anything else false.
    Flag,
    /// Raw trimmed string kept for a later code-table lookup.
    Code,
    /// Raw byte slice.
    Bytes,
}

/// One field row: name, byte window, encoding.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub offset: usize,
    pub length: usize,
    pub encoding: FieldEncoding,
}

/// Row constructor, so layout tables read as one line per field.
pub const fn field(
    name: &'static str,
    offset: usize,
    length: usize,
    encoding: FieldEncoding,
) -> FieldSpec {
    FieldSpec {
        name,
        offset,
        length,
        encoding,
    }
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// A decoded field value. `Missing` is a distinct case so consumers that
/// care can tell "blank upstream" apart from zero.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Decimal(f64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    Flag(bool),
    Code(String),
    Bytes(Vec<u8>),
    Missing,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("record too short: need {expected} bytes, have {actual}")]
    TooShort { expected: usize, actual: usize },
    #[error("field '{name}' has invalid value '{value}': {reason}")]
    InvalidField {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
    #[error("required field '{name}' is blank")]
    MissingField { name: &'static str },
    #[error("unknown record kind '{kind}'")]
    UnknownKind { kind: String },
}

// ---------------------------------------------------------------------------
// Parse engine
// ---------------------------------------------------------------------------

/// Apply a spec table to a raw buffer.
///
/// Fails with [`RecordError::TooShort`] if any row's window runs past the end
/// of the buffer, and with [`RecordError::InvalidField`] on a non-blank value
/// that does not parse under its encoding.
pub fn parse_fields(bytes: &[u8], specs: &[FieldSpec]) -> Result<FieldMap, RecordError> {
    let mut values = HashMap::with_capacity(specs.len());
    for spec in specs {
        let end = spec.offset + spec.length;
        if end > bytes.len() {
            return Err(RecordError::TooShort {
                expected: end,
                actual: bytes.len(),
            });
        }
        let value = decode_field(spec, &bytes[spec.offset..end])?;
        values.insert(spec.name, value);
    }
    Ok(FieldMap { values })
}

fn decode_field(spec: &FieldSpec, slice: &[u8]) -> Result<FieldValue, RecordError> {
    match spec.encoding {
        FieldEncoding::Text => Ok(FieldValue::Text(
            text::normalize(&text::decode(slice)).trim().to_owned(),
        )),
        FieldEncoding::TextRaw => Ok(FieldValue::Text(text::decode(slice).trim().to_owned())),
        FieldEncoding::Integer => parse_integer(spec, slice).map(|v| match v {
            Some(n) => FieldValue::Integer(n),
            None => FieldValue::Missing,
        }),
        FieldEncoding::Decimal(precision) => parse_integer(spec, slice).map(|v| match v {
            Some(n) => FieldValue::Decimal(n as f64 / 10f64.powi(precision as i32)),
            None => FieldValue::Missing,
        }),
        FieldEncoding::Date(format) => parse_date(spec, slice, format),
        FieldEncoding::Flag => {
            let s = text::decode(slice);
            Ok(FieldValue::Flag(s.trim() == "1"))
        }
        FieldEncoding::Code => Ok(FieldValue::Code(text::decode(slice).trim().to_owned())),
        FieldEncoding::Bytes => Ok(FieldValue::Bytes(slice.to_vec())),
    }
}

fn parse_integer(spec: &FieldSpec, slice: &[u8]) -> Result<Option<i64>, RecordError> {
    let s = text::decode(slice);
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    s.parse::<i64>()
        .map(Some)
        .map_err(|_| RecordError::InvalidField {
            name: spec.name,
            value: s.to_owned(),
            reason: "not a base-10 integer",
        })
}

fn parse_date(spec: &FieldSpec, slice: &[u8], format: DateFormat) -> Result<FieldValue, RecordError> {
    let s = text::decode(slice);
    let s = s.trim();
    if s.is_empty() || s.bytes().all(|b| b == b'0') {
        return Ok(FieldValue::Missing);
    }
    let invalid = |reason| RecordError::InvalidField {
        name: spec.name,
        value: s.to_owned(),
        reason,
    };
    match format {
        DateFormat::Ymd => NaiveDate::parse_from_str(s, "%Y%m%d")
            .map(FieldValue::Date)
            .map_err(|_| invalid("not a yyyyMMdd date")),
        DateFormat::YmdHm => NaiveDateTime::parse_from_str(s, "%Y%m%d%H%M")
            .map(FieldValue::DateTime)
            .map_err(|_| invalid("not a yyyyMMddHHmm timestamp")),
        DateFormat::YmdHms => NaiveDateTime::parse_from_str(s, "%Y%m%d%H%M%S")
            .map(FieldValue::DateTime)
            .map_err(|_| invalid("not a yyyyMMddHHmmss timestamp")),
        DateFormat::Hm => NaiveTime::parse_from_str(s, "%H%M")
            .map(FieldValue::Time)
            .map_err(|_| invalid("not an HHmm time")),
    }
}

// ---------------------------------------------------------------------------
// FieldMap
// ---------------------------------------------------------------------------

/// The decoded fields of one record, keyed by spec name.
///
/// Two access shapes: the `Option`-collapsing getters (`text`, `integer`, ...)
/// fold `Missing` into `None`, while [`FieldMap::rich`] keeps `Missing`
/// distinct for consumers where zero and "not reported" differ.
#[derive(Debug, Clone)]
pub struct FieldMap {
    values: HashMap<&'static str, FieldValue>,
}

impl FieldMap {
    /// The rich shape: `Missing` stays a distinct case.
    pub fn rich(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(FieldValue::Text(s)) | Some(FieldValue::Code(s)) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(FieldValue::Integer(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn decimal(&self, name: &str) -> Option<f64> {
        match self.values.get(name) {
            Some(FieldValue::Decimal(d)) => Some(*d),
            _ => None,
        }
    }

    pub fn date(&self, name: &str) -> Option<NaiveDate> {
        match self.values.get(name) {
            Some(FieldValue::Date(d)) => Some(*d),
            _ => None,
        }
    }

    pub fn date_time(&self, name: &str) -> Option<NaiveDateTime> {
        match self.values.get(name) {
            Some(FieldValue::DateTime(t)) => Some(*t),
            _ => None,
        }
    }

    pub fn time(&self, name: &str) -> Option<NaiveTime> {
        match self.values.get(name) {
            Some(FieldValue::Time(t)) => Some(*t),
            _ => None,
        }
    }

    pub fn flag(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(FieldValue::Flag(true)))
    }

    pub fn bytes(&self, name: &str) -> Option<&[u8]> {
        match self.values.get(name) {
            Some(FieldValue::Bytes(b)) => Some(b.as_slice()),
            _ => None,
        }
    }

    /// Whether the field decoded to `Missing` (blank upstream).
    pub fn is_missing(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(FieldValue::Missing))
    }

    /// Fetch a required text field; blank is a [`RecordError::MissingField`].
    pub fn require_text(&self, name: &'static str) -> Result<String, RecordError> {
        self.text(name)
            .map(str::to_owned)
            .ok_or(RecordError::MissingField { name })
    }

    /// Fetch a required integer field; blank is a [`RecordError::MissingField`].
    pub fn require_integer(&self, name: &'static str) -> Result<i64, RecordError> {
        self.integer(name).ok_or(RecordError::MissingField { name })
    }
}
