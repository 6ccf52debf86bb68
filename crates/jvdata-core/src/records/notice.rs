//! Change and condition notices published around a race: weather/track
//! (`WE`), horse weights (`WH`), scratches (`AV`), jockey changes (`JC`),
//! start-time changes (`TC`), course changes (`CC`), and exclusion
//! information (`JG`).

use super::layout;
use crate::codes::{TrackCondition, TrackSurface, Venue};
use crate::fieldspec::{
    DateFormat, FieldEncoding::*, FieldSpec, RecordError, field, parse_fields,
};
use crate::ids::{RaceId, RunnerId};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// WE -- weather and track condition
// ---------------------------------------------------------------------------

// WE is venue-scoped: the key stops at the day number, no race number.
const WE_SPECS: &[FieldSpec] = &[
    layout::CREATED,
    layout::MEETING_DATE,
    layout::VENUE,
    field("announced_at", 25, 12, Date(DateFormat::YmdHm)),
    field("weather", 37, 1, Code),
    field("turf_condition", 38, 1, Code),
    field("dirt_condition", 39, 1, Code),
];

pub const WE_LEN: usize = 40;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherCondition {
    pub meeting_date: NaiveDate,
    pub venue: Option<Venue>,
    pub venue_code: String,
    pub announced_at: Option<NaiveDateTime>,
    pub weather_code: Option<String>,
    pub turf_condition: Option<TrackCondition>,
    pub dirt_condition: Option<TrackCondition>,
}

/// Required: meeting date, venue.
pub fn parse_we(bytes: &[u8]) -> Result<WeatherCondition, RecordError> {
    let map = parse_fields(bytes, WE_SPECS)?;
    let venue_code = map.require_text("venue")?;
    Ok(WeatherCondition {
        meeting_date: map.date("meeting_date").ok_or(RecordError::MissingField {
            name: "meeting_date",
        })?,
        venue: Venue::from_code(&venue_code),
        venue_code,
        announced_at: map.date_time("announced_at"),
        weather_code: map.text("weather").map(str::to_owned),
        turf_condition: map.text("turf_condition").and_then(TrackCondition::from_code),
        dirt_condition: map.text("dirt_condition").and_then(TrackCondition::from_code),
    })
}

// ---------------------------------------------------------------------------
// WH -- horse weights
// ---------------------------------------------------------------------------

const WH_SPECS: &[FieldSpec] = &[
    layout::CREATED,
    field("announced_at", 27, 12, Date(DateFormat::YmdHm)),
    field("entry_count", 39, 2, Integer),
];

const WH_BLOCK_BASE: usize = 41;
const WH_BLOCK_LEN: usize = 18;

const WH_BLOCK_SPECS: &[FieldSpec] = &[
    field("horse_number", 0, 2, Integer),
    field("horse_id", 2, 10, TextRaw),
    field("weight", 12, 3, Integer),
    field("weight_diff", 15, 3, Integer),
];

/// One announced weight. `weight` is `None` for a runner whose weight could
/// not be measured (blank upstream), which is distinct from zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorseWeightEntry {
    pub horse_number: i64,
    pub horse: Option<RunnerId>,
    pub weight_kg: Option<i64>,
    pub weight_diff_kg: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorseWeights {
    pub race: RaceId,
    pub announced_at: Option<NaiveDateTime>,
    pub entries: Vec<HorseWeightEntry>,
}

/// Required: race key.
pub fn parse_wh(bytes: &[u8]) -> Result<HorseWeights, RecordError> {
    let race = layout::race_id(bytes)?;
    let map = parse_fields(bytes, WH_SPECS)?;
    let count = map.integer("entry_count").unwrap_or(0).max(0) as usize;
    let entries = layout::parse_blocks(
        bytes,
        WH_BLOCK_BASE,
        WH_BLOCK_LEN,
        count,
        WH_BLOCK_SPECS,
        |block| {
            let Some(horse_number) = block.integer("horse_number") else {
                return Ok(None);
            };
            Ok(Some(HorseWeightEntry {
                horse_number,
                horse: layout::optional_runner_id(block, "horse_id")?,
                weight_kg: block.integer("weight"),
                weight_diff_kg: block.integer("weight_diff"),
            }))
        },
    )?;
    Ok(HorseWeights {
        race,
        announced_at: map.date_time("announced_at"),
        entries,
    })
}

// ---------------------------------------------------------------------------
// AV -- scratch / exclusion
// ---------------------------------------------------------------------------

const AV_SPECS: &[FieldSpec] = &[
    layout::CREATED,
    field("announced_at", 27, 12, Date(DateFormat::YmdHm)),
    field("horse_number", 39, 2, Integer),
    field("horse_id", 41, 10, TextRaw),
    field("horse_name", 51, 36, Text),
    field("reason", 87, 1, Code),
];

pub const AV_LEN: usize = 88;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvoidedRunner {
    pub race: RaceId,
    pub announced_at: Option<NaiveDateTime>,
    pub horse_number: Option<i64>,
    pub horse: RunnerId,
    pub horse_name: Option<String>,
    /// `1` scratched before the start, `2` excluded by the stewards.
    pub reason_code: Option<String>,
}

/// Required: race key, horse id.
pub fn parse_av(bytes: &[u8]) -> Result<AvoidedRunner, RecordError> {
    let race = layout::race_id(bytes)?;
    let map = parse_fields(bytes, AV_SPECS)?;
    Ok(AvoidedRunner {
        race,
        announced_at: map.date_time("announced_at"),
        horse_number: map.integer("horse_number"),
        horse: layout::require_runner_id(&map, "horse_id")?,
        horse_name: map.text("horse_name").map(str::to_owned),
        reason_code: map.text("reason").map(str::to_owned),
    })
}

// ---------------------------------------------------------------------------
// JC -- jockey change
// ---------------------------------------------------------------------------

const JC_SPECS: &[FieldSpec] = &[
    layout::CREATED,
    field("announced_at", 27, 12, Date(DateFormat::YmdHm)),
    field("horse_number", 39, 2, Integer),
    field("horse_name", 41, 36, Text),
    field("new_jockey_code", 77, 5, Code),
    field("new_jockey_name", 82, 34, Text),
    field("old_jockey_code", 116, 5, Code),
    field("old_jockey_name", 121, 34, Text),
];

pub const JC_LEN: usize = 155;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JockeyChange {
    pub race: RaceId,
    pub announced_at: Option<NaiveDateTime>,
    pub horse_number: i64,
    pub horse_name: Option<String>,
    pub new_jockey_code: Option<String>,
    pub new_jockey_name: Option<String>,
    pub old_jockey_code: Option<String>,
    pub old_jockey_name: Option<String>,
}

/// Required: race key, horse number.
pub fn parse_jc(bytes: &[u8]) -> Result<JockeyChange, RecordError> {
    let race = layout::race_id(bytes)?;
    let map = parse_fields(bytes, JC_SPECS)?;
    Ok(JockeyChange {
        race,
        announced_at: map.date_time("announced_at"),
        horse_number: map.require_integer("horse_number")?,
        horse_name: map.text("horse_name").map(str::to_owned),
        new_jockey_code: map.text("new_jockey_code").map(str::to_owned),
        new_jockey_name: map.text("new_jockey_name").map(str::to_owned),
        old_jockey_code: map.text("old_jockey_code").map(str::to_owned),
        old_jockey_name: map.text("old_jockey_name").map(str::to_owned),
    })
}

// ---------------------------------------------------------------------------
// TC -- start-time change
// ---------------------------------------------------------------------------

const TC_SPECS: &[FieldSpec] = &[
    layout::CREATED,
    field("announced_at", 27, 12, Date(DateFormat::YmdHm)),
    field("new_start_time", 39, 4, Date(DateFormat::Hm)),
    field("old_start_time", 43, 4, Date(DateFormat::Hm)),
];

pub const TC_LEN: usize = 47;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartTimeChange {
    pub race: RaceId,
    pub announced_at: Option<NaiveDateTime>,
    pub new_start_time: NaiveTime,
    pub old_start_time: Option<NaiveTime>,
}

/// Required: race key, new start time.
pub fn parse_tc(bytes: &[u8]) -> Result<StartTimeChange, RecordError> {
    let race = layout::race_id(bytes)?;
    let map = parse_fields(bytes, TC_SPECS)?;
    Ok(StartTimeChange {
        race,
        announced_at: map.date_time("announced_at"),
        new_start_time: map.time("new_start_time").ok_or(RecordError::MissingField {
            name: "new_start_time",
        })?,
        old_start_time: map.time("old_start_time"),
    })
}

// ---------------------------------------------------------------------------
// CC -- course change
// ---------------------------------------------------------------------------

const CC_SPECS: &[FieldSpec] = &[
    layout::CREATED,
    field("announced_at", 27, 12, Date(DateFormat::YmdHm)),
    field("new_surface", 39, 1, Code),
    field("new_distance", 40, 4, Integer),
    field("old_surface", 44, 1, Code),
    field("old_distance", 45, 4, Integer),
    field("reason", 49, 1, Code),
];

pub const CC_LEN: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseChange {
    pub race: RaceId,
    pub announced_at: Option<NaiveDateTime>,
    pub new_surface: Option<TrackSurface>,
    pub new_distance_meters: i64,
    pub old_surface: Option<TrackSurface>,
    pub old_distance_meters: Option<i64>,
    pub reason_code: Option<String>,
}

/// Required: race key, new distance.
pub fn parse_cc(bytes: &[u8]) -> Result<CourseChange, RecordError> {
    let race = layout::race_id(bytes)?;
    let map = parse_fields(bytes, CC_SPECS)?;
    Ok(CourseChange {
        race,
        announced_at: map.date_time("announced_at"),
        new_surface: map.text("new_surface").and_then(TrackSurface::from_code),
        new_distance_meters: map.require_integer("new_distance")?,
        old_surface: map.text("old_surface").and_then(TrackSurface::from_code),
        old_distance_meters: map.integer("old_distance"),
        reason_code: map.text("reason").map(str::to_owned),
    })
}

// ---------------------------------------------------------------------------
// JG -- exclusion information
// ---------------------------------------------------------------------------

const JG_SPECS: &[FieldSpec] = &[
    layout::CREATED,
    field("horse_id", 27, 10, TextRaw),
    field("horse_name", 37, 36, Text),
    field("entry_order", 73, 3, Integer),
    field("state", 76, 1, Code),
];

pub const JG_LEN: usize = 77;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExclusionInfo {
    pub race: RaceId,
    pub horse: RunnerId,
    pub horse_name: Option<String>,
    pub entry_order: Option<i64>,
    pub state_code: Option<String>,
}

/// Required: race key, horse id.
pub fn parse_jg(bytes: &[u8]) -> Result<ExclusionInfo, RecordError> {
    let race = layout::race_id(bytes)?;
    let map = parse_fields(bytes, JG_SPECS)?;
    Ok(ExclusionInfo {
        race,
        horse: layout::require_runner_id(&map, "horse_id")?,
        horse_name: map.text("horse_name").map(str::to_owned),
        entry_order: map.integer("entry_order"),
        state_code: map.text("state").map(str::to_owned),
    })
}
