//! Per-horse tallies and forecasts: career results (`CK`), slope training
//! (`HC`), and the mining forecast (`DM`).

use super::layout;
use crate::codes::TrainingCenter;
use crate::fieldspec::{
    DateFormat, FieldEncoding::*, FieldSpec, RecordError, field, parse_fields,
};
use crate::ids::{RaceId, RunnerId};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CK -- career results tally
// ---------------------------------------------------------------------------

const CK_SPECS: &[FieldSpec] = &[
    layout::CREATED,
    field("horse_id", 11, 10, TextRaw),
    field("horse_name", 21, 36, Text),
    field("starts", 57, 3, Integer),
    field("wins", 60, 3, Integer),
    field("seconds", 63, 3, Integer),
    field("thirds", 66, 3, Integer),
    field("total_prize", 69, 12, Integer),
];

pub const CK_LEN: usize = 81;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsTally {
    pub horse: RunnerId,
    pub horse_name: Option<String>,
    pub starts: Option<i64>,
    pub wins: Option<i64>,
    pub seconds: Option<i64>,
    pub thirds: Option<i64>,
    /// Career prize money in hundreds of yen, as delivered.
    pub total_prize: Option<i64>,
}

/// Required: horse id.
pub fn parse_ck(bytes: &[u8]) -> Result<ResultsTally, RecordError> {
    let map = parse_fields(bytes, CK_SPECS)?;
    Ok(ResultsTally {
        horse: layout::require_runner_id(&map, "horse_id")?,
        horse_name: map.text("horse_name").map(str::to_owned),
        starts: map.integer("starts"),
        wins: map.integer("wins"),
        seconds: map.integer("seconds"),
        thirds: map.integer("thirds"),
        total_prize: map.integer("total_prize"),
    })
}

// ---------------------------------------------------------------------------
// HC -- slope training session
// ---------------------------------------------------------------------------

const HC_SPECS: &[FieldSpec] = &[
    layout::CREATED,
    field("training_center", 11, 1, Code),
    field("training_date", 12, 8, Date(DateFormat::Ymd)),
    field("training_time", 20, 4, Date(DateFormat::Hm)),
    field("horse_id", 24, 10, TextRaw),
    field("four_furlong", 34, 4, Decimal(1)),
    field("three_furlong", 38, 4, Decimal(1)),
    field("two_furlong", 42, 4, Decimal(1)),
    field("final_furlong", 46, 4, Decimal(1)),
];

pub const HC_LEN: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlopeTraining {
    pub training_center: Option<TrainingCenter>,
    pub training_date: NaiveDate,
    pub training_time: Option<NaiveTime>,
    pub horse: RunnerId,
    pub four_furlong_seconds: Option<f64>,
    pub three_furlong_seconds: Option<f64>,
    pub two_furlong_seconds: Option<f64>,
    pub final_furlong_seconds: Option<f64>,
}

/// Required: horse id, training date.
pub fn parse_hc(bytes: &[u8]) -> Result<SlopeTraining, RecordError> {
    let map = parse_fields(bytes, HC_SPECS)?;
    Ok(SlopeTraining {
        training_center: map
            .text("training_center")
            .and_then(TrainingCenter::from_code),
        training_date: map.date("training_date").ok_or(RecordError::MissingField {
            name: "training_date",
        })?,
        training_time: map.time("training_time"),
        horse: layout::require_runner_id(&map, "horse_id")?,
        four_furlong_seconds: map.decimal("four_furlong"),
        three_furlong_seconds: map.decimal("three_furlong"),
        two_furlong_seconds: map.decimal("two_furlong"),
        final_furlong_seconds: map.decimal("final_furlong"),
    })
}

// ---------------------------------------------------------------------------
// DM -- mining forecast
// ---------------------------------------------------------------------------

const DM_SPECS: &[FieldSpec] = &[
    layout::CREATED,
    field("generated_at", 27, 12, Date(DateFormat::YmdHm)),
    field("entry_count", 39, 2, Integer),
];

const DM_BLOCK_BASE: usize = 41;
const DM_BLOCK_LEN: usize = 12;

const DM_BLOCK_SPECS: &[FieldSpec] = &[
    field("horse_number", 0, 2, Integer),
    field("predicted_time", 2, 4, Decimal(1)),
    field("error_plus", 6, 3, Decimal(1)),
    field("error_minus", 9, 3, Decimal(1)),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiningEntry {
    pub horse_number: i64,
    pub predicted_time_seconds: Option<f64>,
    pub error_plus_seconds: Option<f64>,
    pub error_minus_seconds: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiningForecast {
    pub race: RaceId,
    pub generated_at: Option<NaiveDateTime>,
    pub entries: Vec<MiningEntry>,
}

/// Required: race key.
pub fn parse_dm(bytes: &[u8]) -> Result<MiningForecast, RecordError> {
    let race = layout::race_id(bytes)?;
    let map = parse_fields(bytes, DM_SPECS)?;
    let count = map.integer("entry_count").unwrap_or(0).max(0) as usize;
    let entries = layout::parse_blocks(
        bytes,
        DM_BLOCK_BASE,
        DM_BLOCK_LEN,
        count,
        DM_BLOCK_SPECS,
        |block| {
            let Some(horse_number) = block.integer("horse_number") else {
                return Ok(None);
            };
            Ok(Some(MiningEntry {
                horse_number,
                predicted_time_seconds: block.decimal("predicted_time"),
                error_plus_seconds: block.decimal("error_plus"),
                error_minus_seconds: block.decimal("error_minus"),
            }))
        },
    )?;
    Ok(MiningForecast {
        race,
        generated_at: map.date_time("generated_at"),
        entries,
    })
}
