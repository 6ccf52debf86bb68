//! Race detail (`RA`) and special registration (`TK`) records.

use super::layout;
use crate::codes::{DayOfWeek, Grade, RaceCondition, TrackCondition, TrackSurface};
use crate::fieldspec::{
    DateFormat, FieldEncoding::*, FieldSpec, RecordError, field, parse_fields,
};
use crate::ids::{RaceId, RunnerId};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RA -- race detail
// ---------------------------------------------------------------------------

const RA_SPECS: &[FieldSpec] = &[
    layout::DATA_CATEGORY,
    layout::CREATED,
    layout::MEETING_DATE,
    layout::VENUE,
    layout::MEETING,
    layout::DAY,
    layout::RACE_NUMBER,
    field("weekday", 27, 1, Code),
    field("race_name", 28, 60, Text),
    field("race_name_short", 88, 20, Text),
    field("grade", 108, 1, Code),
    field("condition", 109, 1, Code),
    field("surface", 110, 1, Code),
    field("distance", 111, 4, Integer),
    field("start_time", 115, 4, Date(DateFormat::Hm)),
    field("entry_count", 119, 2, Integer),
    field("weather", 121, 1, Code),
    field("track_condition", 122, 1, Code),
    field("winning_time", 123, 4, Decimal(1)),
];

/// Total record length for `RA`.
pub const RA_LEN: usize = 127;

/// One race card entry: identity, conditions, and (once run) the result
/// summary fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Race {
    pub id: RaceId,
    pub created: Option<NaiveDate>,
    pub weekday: Option<DayOfWeek>,
    pub name: String,
    pub short_name: Option<String>,
    pub grade: Option<Grade>,
    pub condition: Option<RaceCondition>,
    pub surface: Option<TrackSurface>,
    pub distance_meters: Option<i64>,
    pub start_time: Option<NaiveTime>,
    pub entry_count: Option<i64>,
    pub weather_code: Option<String>,
    pub track_condition: Option<TrackCondition>,
    /// Winning time in seconds; absent until the race has been run.
    pub winning_time_seconds: Option<f64>,
}

/// Required: race key, race name.
pub fn parse_ra(bytes: &[u8]) -> Result<Race, RecordError> {
    let id = layout::race_id(bytes)?;
    let map = parse_fields(bytes, RA_SPECS)?;
    Ok(Race {
        id,
        created: map.date("created"),
        weekday: map.text("weekday").and_then(DayOfWeek::from_code),
        name: map.require_text("race_name")?,
        short_name: map.text("race_name_short").map(str::to_owned),
        grade: map.text("grade").and_then(Grade::from_code),
        condition: map.text("condition").and_then(RaceCondition::from_code),
        surface: map.text("surface").and_then(TrackSurface::from_code),
        distance_meters: map.integer("distance"),
        start_time: map.time("start_time"),
        entry_count: map.integer("entry_count"),
        weather_code: map.text("weather").map(str::to_owned),
        track_condition: map
            .text("track_condition")
            .and_then(TrackCondition::from_code),
        winning_time_seconds: map.decimal("winning_time"),
    })
}

// ---------------------------------------------------------------------------
// TK -- special registration
// ---------------------------------------------------------------------------

const TK_SPECS: &[FieldSpec] = &[
    layout::CREATED,
    layout::MEETING_DATE,
    layout::VENUE,
    layout::RACE_NUMBER,
    field("race_name", 27, 60, Text),
    field("registered_count", 87, 3, Integer),
];

const TK_BLOCK_BASE: usize = 90;
const TK_BLOCK_LEN: usize = 51;

const TK_BLOCK_SPECS: &[FieldSpec] = &[
    field("horse_id", 0, 10, TextRaw),
    field("horse_name", 10, 36, Text),
    field("trainer_code", 46, 5, Code),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialRegistrationEntry {
    pub horse: RunnerId,
    pub horse_name: String,
    pub trainer_code: Option<String>,
}

/// Pre-entry list for a graded or special race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialRegistration {
    pub race: RaceId,
    pub race_name: String,
    pub entries: Vec<SpecialRegistrationEntry>,
}

/// Required: race key, race name. Blank filler slots in the entry area are
/// skipped rather than rejected.
pub fn parse_tk(bytes: &[u8]) -> Result<SpecialRegistration, RecordError> {
    let race = layout::race_id(bytes)?;
    let map = parse_fields(bytes, TK_SPECS)?;
    let race_name = map.require_text("race_name")?;
    let count = map.integer("registered_count").unwrap_or(0).max(0) as usize;
    let entries = layout::parse_blocks(
        bytes,
        TK_BLOCK_BASE,
        TK_BLOCK_LEN,
        count,
        TK_BLOCK_SPECS,
        |block| {
            let Some(horse) = layout::optional_runner_id(block, "horse_id")? else {
                return Ok(None);
            };
            Ok(Some(SpecialRegistrationEntry {
                horse,
                horse_name: block.require_text("horse_name")?,
                trainer_code: block.text("trainer_code").map(str::to_owned),
            }))
        },
    )?;
    Ok(SpecialRegistration {
        race,
        race_name,
        entries,
    })
}
