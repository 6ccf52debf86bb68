//! Real-time watch events.
//!
//! The native layer announces data updates by pushing a raw key string at
//! the registered callback. A key opens with the 4-character real-time
//! dataspec (`0B11` weights, `0B12` payoffs, `0B16` change notices) followed
//! by the meeting date, venue, and race number; `0B16` keys carry the
//! two-character record type of the change next, and any key may end with a
//! 10-digit participant registration and free-form extra data.
//!
//! [`WatchEventKind::dataspec`] returns the code a consumer would use to
//! re-request the full record behind the event.

use crate::codes::Venue;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// What a watch event announces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatchEventKind {
    PayoffConfirmed,
    HorseWeight,
    JockeyChange,
    WeatherChange,
    CourseChange,
    AvoidedRace,
    StartTimeChange,
    /// A dataspec or change type this build does not know. Carries the raw
    /// discriminator so consumers can still route it.
    Unknown(String),
}

impl WatchEventKind {
    /// The real-time dataspec to re-request the record behind the event.
    pub fn dataspec(&self) -> Option<&'static str> {
        match self {
            WatchEventKind::PayoffConfirmed => Some("0B12"),
            WatchEventKind::HorseWeight => Some("0B11"),
            WatchEventKind::JockeyChange
            | WatchEventKind::WeatherChange
            | WatchEventKind::CourseChange
            | WatchEventKind::AvoidedRace
            | WatchEventKind::StartTimeChange => Some("0B16"),
            WatchEventKind::Unknown(_) => None,
        }
    }
}

/// A parsed watch event. `timestamp` is the arrival time stamped by the
/// event pump, not part of the key itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub raw_key: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub meeting_date: Option<NaiveDate>,
    pub venue: Option<Venue>,
    pub race_number: Option<u8>,
    pub record_type: Option<String>,
    pub participant: Option<String>,
    pub extra: Option<String>,
}

impl WatchEvent {
    /// Parse a raw callback key.
    ///
    /// An unknown dataspec prefix is not an error: it produces
    /// [`WatchEventKind::Unknown`] with no decoded fields. Malformed bodies
    /// under a known prefix are errors.
    pub fn try_parse(raw: &str) -> Result<WatchEvent, &'static str> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err("Empty watch key");
        }
        if raw.len() < 4 {
            return Err("Watch key too short");
        }
        let (prefix, body) = raw.split_at(4);
        if !matches!(prefix, "0B11" | "0B12" | "0B16") {
            return Ok(WatchEvent {
                kind: WatchEventKind::Unknown(prefix.to_owned()),
                raw_key: raw.to_owned(),
                timestamp: None,
                meeting_date: None,
                venue: None,
                race_number: None,
                record_type: None,
                participant: None,
                extra: None,
            });
        }
        if body.len() < 12 {
            return Err("Watch key body too short");
        }
        let meeting_date = NaiveDate::parse_from_str(&body[..8], "%Y%m%d")
            .map_err(|_| "Watch key has an invalid meeting date")?;
        let venue = Venue::from_code(&body[8..10]);
        let race_number = match body[10..12].trim() {
            "" => None,
            digits => Some(
                digits
                    .parse::<u8>()
                    .map_err(|_| "Watch key has an invalid race number")?,
            ),
        };
        let mut rest = &body[12..];

        let (kind, record_type) = match prefix {
            "0B11" => (WatchEventKind::HorseWeight, None),
            "0B12" => (WatchEventKind::PayoffConfirmed, None),
            _ => {
                if rest.len() < 2 {
                    return Err("Change notice key is missing its record type");
                }
                let (rt, tail) = rest.split_at(2);
                rest = tail;
                let kind = match rt {
                    "JC" => WatchEventKind::JockeyChange,
                    "WE" => WatchEventKind::WeatherChange,
                    "CC" => WatchEventKind::CourseChange,
                    "AV" => WatchEventKind::AvoidedRace,
                    "TC" => WatchEventKind::StartTimeChange,
                    other => WatchEventKind::Unknown(format!("0B16:{other}")),
                };
                (kind, Some(rt.to_owned()))
            }
        };

        let participant = if rest.len() >= 10 && rest[..10].bytes().all(|b| b.is_ascii_digit()) {
            let (p, tail) = rest.split_at(10);
            rest = tail;
            Some(p.to_owned())
        } else {
            None
        };
        let extra = if rest.is_empty() {
            None
        } else {
            Some(rest.to_owned())
        };

        Ok(WatchEvent {
            kind,
            raw_key: raw.to_owned(),
            timestamp: None,
            meeting_date: Some(meeting_date),
            venue,
            race_number,
            record_type,
            participant,
            extra,
        })
    }
}
