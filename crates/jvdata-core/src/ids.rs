//! Strong identifiers for races and runners.
//!
//! Both types validate on construction and are immutable afterwards. The
//! `new_unchecked` constructors exist for the record parsers, which have
//! already proven the invariants against the raw bytes; application code
//! should always go through `TryFrom`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// RaceId
// ---------------------------------------------------------------------------

/// A race key: 8-16 alphanumeric characters, the first 8 of which form a
/// valid Gregorian `yyyyMMdd` date.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RaceId(String);

impl RaceId {
    /// Construct without validation. Callers must have proven the format
    /// already (the record parsers validate against the raw bytes first).
    pub fn new_unchecked(value: String) -> RaceId {
        RaceId(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The meeting date encoded in the first 8 characters.
    pub fn date(&self) -> NaiveDate {
        // Validated at construction; the fallback is unreachable for any
        // value built through `TryFrom`.
        NaiveDate::parse_from_str(&self.0[..8], "%Y%m%d")
            .unwrap_or_else(|_| NaiveDate::from_ymd_opt(1970, 1, 1).unwrap())
    }
}

impl TryFrom<&str> for RaceId {
    type Error = &'static str;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let value = value.trim();
        if value.is_empty() {
            return Err("Empty race id");
        }
        if !(8..=16).contains(&value.len()) {
            return Err("Race id must be 8-16 characters");
        }
        if !value.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err("Race id must be alphanumeric");
        }
        if NaiveDate::parse_from_str(&value[..8], "%Y%m%d").is_err() {
            return Err("Race id must start with a valid yyyyMMdd date");
        }
        Ok(RaceId(value.to_owned()))
    }
}

impl fmt::Display for RaceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// RunnerId
// ---------------------------------------------------------------------------

/// A runner (racehorse) registration number: exactly 10 digits.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunnerId(String);

impl RunnerId {
    /// Construct without validation; see [`RaceId::new_unchecked`].
    pub fn new_unchecked(value: String) -> RunnerId {
        RunnerId(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Birth year encoded in the first 4 digits of the registration number.
    pub fn birth_year(&self) -> u16 {
        self.0[..4].parse().unwrap_or(0)
    }
}

impl TryFrom<&str> for RunnerId {
    type Error = &'static str;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let value = value.trim();
        if value.is_empty() {
            return Err("Empty runner id");
        }
        if value.len() != 10 {
            return Err("Runner id must be exactly 10 digits");
        }
        if !value.chars().all(|c| c.is_ascii_digit()) {
            return Err("Runner id must be numeric");
        }
        Ok(RunnerId(value.to_owned()))
    }
}

impl fmt::Display for RunnerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
