//! Venue-level reference records: course info (`CS`), course records (`RC`),
//! and the meeting schedule (`YS`).

use super::layout;
use crate::codes::{DayOfWeek, TrackSurface, Venue};
use crate::fieldspec::{
    DateFormat, FieldEncoding::*, FieldSpec, RecordError, field, parse_fields,
};
use crate::ids::RunnerId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CS -- course info
// ---------------------------------------------------------------------------

const CS_SPECS: &[FieldSpec] = &[
    layout::CREATED,
    field("venue", 11, 2, Code),
    field("surface", 13, 1, Code),
    field("distance", 14, 4, Integer),
    field("circumference", 18, 5, Integer),
    field("description", 23, 120, Text),
];

pub const CS_LEN: usize = 143;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseInfo {
    pub venue: Option<Venue>,
    pub venue_code: String,
    pub surface: Option<TrackSurface>,
    pub distance_meters: i64,
    pub circumference_meters: Option<i64>,
    pub description: Option<String>,
}

/// Required: venue, distance.
pub fn parse_cs(bytes: &[u8]) -> Result<CourseInfo, RecordError> {
    let map = parse_fields(bytes, CS_SPECS)?;
    let venue_code = map.require_text("venue")?;
    Ok(CourseInfo {
        venue: Venue::from_code(&venue_code),
        venue_code,
        surface: map.text("surface").and_then(TrackSurface::from_code),
        distance_meters: map.require_integer("distance")?,
        circumference_meters: map.integer("circumference"),
        description: map.text("description").map(str::to_owned),
    })
}

// ---------------------------------------------------------------------------
// RC -- course record
// ---------------------------------------------------------------------------

const RC_SPECS: &[FieldSpec] = &[
    layout::CREATED,
    field("record_type", 11, 1, Code),
    field("venue", 12, 2, Code),
    field("surface", 14, 1, Code),
    field("distance", 15, 4, Integer),
    field("record_time", 19, 4, Decimal(1)),
    field("set_date", 23, 8, Date(DateFormat::Ymd)),
    field("horse_id", 31, 10, TextRaw),
    field("horse_name", 41, 36, Text),
];

pub const RC_LEN: usize = 77;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseRecord {
    pub record_type: Option<String>,
    pub venue: Option<Venue>,
    pub venue_code: String,
    pub surface: Option<TrackSurface>,
    pub distance_meters: i64,
    pub record_time_seconds: Option<f64>,
    pub set_date: Option<NaiveDate>,
    pub holder: Option<RunnerId>,
    pub holder_name: Option<String>,
}

/// Required: venue, distance.
pub fn parse_rc(bytes: &[u8]) -> Result<CourseRecord, RecordError> {
    let map = parse_fields(bytes, RC_SPECS)?;
    let venue_code = map.require_text("venue")?;
    Ok(CourseRecord {
        record_type: map.text("record_type").map(str::to_owned),
        venue: Venue::from_code(&venue_code),
        venue_code,
        surface: map.text("surface").and_then(TrackSurface::from_code),
        distance_meters: map.require_integer("distance")?,
        record_time_seconds: map.decimal("record_time"),
        set_date: map.date("set_date"),
        holder: layout::optional_runner_id(&map, "horse_id")?,
        holder_name: map.text("horse_name").map(str::to_owned),
    })
}

// ---------------------------------------------------------------------------
// YS -- meeting schedule
// ---------------------------------------------------------------------------

const YS_SPECS: &[FieldSpec] = &[
    layout::CREATED,
    field("meeting_date", 11, 8, Date(DateFormat::Ymd)),
    field("venue", 19, 2, Code),
    field("meeting", 21, 2, Integer),
    field("day", 23, 2, Integer),
    field("weekday", 25, 1, Code),
    field("race_count", 26, 2, Integer),
];

pub const YS_LEN: usize = 28;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub meeting_date: NaiveDate,
    pub venue: Option<Venue>,
    pub venue_code: String,
    pub meeting: Option<i64>,
    pub day: Option<i64>,
    pub weekday: Option<DayOfWeek>,
    pub race_count: Option<i64>,
}

/// Required: meeting date, venue.
pub fn parse_ys(bytes: &[u8]) -> Result<Schedule, RecordError> {
    let map = parse_fields(bytes, YS_SPECS)?;
    let venue_code = map.require_text("venue")?;
    Ok(Schedule {
        meeting_date: map
            .date("meeting_date")
            .ok_or(RecordError::MissingField {
                name: "meeting_date",
            })?,
        venue: Venue::from_code(&venue_code),
        venue_code,
        meeting: map.integer("meeting"),
        day: map.integer("day"),
        weekday: map.text("weekday").and_then(DayOfWeek::from_code),
        race_count: map.integer("race_count"),
    })
}
