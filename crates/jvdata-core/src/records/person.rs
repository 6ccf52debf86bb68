//! Jockey (`KS`) and trainer (`CH`) master records.

use super::layout;
use crate::codes::TrainingCenter;
use crate::fieldspec::{
    DateFormat, FieldEncoding::*, FieldSpec, RecordError, field, parse_fields,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const KS_SPECS: &[FieldSpec] = &[
    layout::CREATED,
    field("jockey_code", 11, 5, Code),
    field("name", 16, 34, Text),
    field("name_kana", 50, 30, TextRaw),
    field("birth_date", 80, 8, Date(DateFormat::Ymd)),
    field("first_license_year", 88, 4, Integer),
    field("apprentice_mark", 92, 1, Code),
    field("training_center", 93, 1, Code),
    field("retired", 94, 1, Flag),
];

pub const KS_LEN: usize = 95;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JockeyMaster {
    pub code: String,
    pub name: Option<String>,
    pub name_kana: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub first_license_year: Option<i64>,
    pub apprentice_mark: Option<String>,
    pub training_center: Option<TrainingCenter>,
    pub retired: bool,
}

/// Required: jockey code.
pub fn parse_ks(bytes: &[u8]) -> Result<JockeyMaster, RecordError> {
    let map = parse_fields(bytes, KS_SPECS)?;
    Ok(JockeyMaster {
        code: map.require_text("jockey_code")?,
        name: map.text("name").map(str::to_owned),
        name_kana: map.text("name_kana").map(str::to_owned),
        birth_date: map.date("birth_date"),
        first_license_year: map.integer("first_license_year"),
        apprentice_mark: map.text("apprentice_mark").map(str::to_owned),
        training_center: map
            .text("training_center")
            .and_then(TrainingCenter::from_code),
        retired: map.flag("retired"),
    })
}

const CH_SPECS: &[FieldSpec] = &[
    layout::CREATED,
    field("trainer_code", 11, 5, Code),
    field("name", 16, 34, Text),
    field("name_kana", 50, 30, TextRaw),
    field("birth_date", 80, 8, Date(DateFormat::Ymd)),
    field("first_license_year", 88, 4, Integer),
    field("training_center", 92, 1, Code),
    field("retired", 93, 1, Flag),
];

pub const CH_LEN: usize = 94;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerMaster {
    pub code: String,
    pub name: Option<String>,
    pub name_kana: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub first_license_year: Option<i64>,
    pub training_center: Option<TrainingCenter>,
    pub retired: bool,
}

/// Required: trainer code.
pub fn parse_ch(bytes: &[u8]) -> Result<TrainerMaster, RecordError> {
    let map = parse_fields(bytes, CH_SPECS)?;
    Ok(TrainerMaster {
        code: map.require_text("trainer_code")?,
        name: map.text("name").map(str::to_owned),
        name_kana: map.text("name_kana").map(str::to_owned),
        birth_date: map.date("birth_date"),
        first_license_year: map.integer("first_license_year"),
        training_center: map
            .text("training_center")
            .and_then(TrainingCenter::from_code),
        retired: map.flag("retired"),
    })
}
