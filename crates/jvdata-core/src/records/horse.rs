//! Horse master records: `UM` (racehorse), `HN` (breeding horse),
//! `SK` (offspring), `HS` (market transaction), `HY` (name origin).

use super::layout;
use crate::codes::{Breed, HairColor, ImportCategory, Sex, TrainingCenter};
use crate::fieldspec::{
    DateFormat, FieldEncoding::*, FieldSpec, RecordError, field, parse_fields,
};
use crate::ids::RunnerId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// UM -- racehorse master
// ---------------------------------------------------------------------------

const UM_SPECS: &[FieldSpec] = &[
    layout::CREATED,
    field("horse_id", 11, 10, TextRaw),
    field("horse_name", 21, 36, Text),
    field("sex", 57, 1, Code),
    field("hair_color", 58, 2, Code),
    field("birth_date", 60, 8, Date(DateFormat::Ymd)),
    field("breed", 68, 1, Code),
    field("import_category", 69, 1, Code),
    field("sire_id", 70, 10, TextRaw),
    field("sire_name", 80, 36, Text),
    field("dam_id", 116, 10, TextRaw),
    field("dam_name", 126, 36, Text),
    field("trainer_code", 162, 5, Code),
    field("training_center", 167, 1, Code),
    field("owner_name", 168, 64, Text),
    field("breeder_name", 232, 72, Text),
    field("deregistered", 304, 1, Flag),
];

pub const UM_LEN: usize = 305;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorseMaster {
    pub horse: RunnerId,
    pub name: String,
    pub sex: Option<Sex>,
    pub hair_color: Option<HairColor>,
    pub birth_date: Option<NaiveDate>,
    pub breed: Option<Breed>,
    pub import_category: Option<ImportCategory>,
    pub sire_id: Option<String>,
    pub sire_name: Option<String>,
    pub dam_id: Option<String>,
    pub dam_name: Option<String>,
    pub trainer_code: Option<String>,
    pub training_center: Option<TrainingCenter>,
    pub owner_name: Option<String>,
    pub breeder_name: Option<String>,
    pub deregistered: bool,
}

/// Required: horse id, horse name.
pub fn parse_um(bytes: &[u8]) -> Result<HorseMaster, RecordError> {
    let map = parse_fields(bytes, UM_SPECS)?;
    Ok(HorseMaster {
        horse: layout::require_runner_id(&map, "horse_id")?,
        name: map.require_text("horse_name")?,
        sex: map.text("sex").and_then(Sex::from_code),
        hair_color: map.text("hair_color").and_then(HairColor::from_code),
        birth_date: map.date("birth_date"),
        breed: map.text("breed").and_then(Breed::from_code),
        import_category: map
            .text("import_category")
            .and_then(ImportCategory::from_code),
        sire_id: map.text("sire_id").map(str::to_owned),
        sire_name: map.text("sire_name").map(str::to_owned),
        dam_id: map.text("dam_id").map(str::to_owned),
        dam_name: map.text("dam_name").map(str::to_owned),
        trainer_code: map.text("trainer_code").map(str::to_owned),
        training_center: map
            .text("training_center")
            .and_then(TrainingCenter::from_code),
        owner_name: map.text("owner_name").map(str::to_owned),
        breeder_name: map.text("breeder_name").map(str::to_owned),
        deregistered: map.flag("deregistered"),
    })
}

// ---------------------------------------------------------------------------
// HN -- breeding horse master
// ---------------------------------------------------------------------------

const HN_SPECS: &[FieldSpec] = &[
    layout::CREATED,
    field("breeding_id", 11, 10, TextRaw),
    field("horse_id", 21, 10, TextRaw),
    field("name", 31, 36, Text),
    field("sex", 67, 1, Code),
    field("hair_color", 68, 2, Code),
    field("birth_year", 70, 4, Integer),
    field("import_category", 74, 1, Code),
];

pub const HN_LEN: usize = 75;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreedingHorse {
    pub breeding_id: String,
    /// Racing registration, when the horse raced before entering the stud book.
    pub horse: Option<RunnerId>,
    pub name: String,
    pub sex: Option<Sex>,
    pub hair_color: Option<HairColor>,
    pub birth_year: Option<i64>,
    pub import_category: Option<ImportCategory>,
}

/// Required: breeding id, name.
pub fn parse_hn(bytes: &[u8]) -> Result<BreedingHorse, RecordError> {
    let map = parse_fields(bytes, HN_SPECS)?;
    Ok(BreedingHorse {
        breeding_id: map.require_text("breeding_id")?,
        horse: layout::optional_runner_id(&map, "horse_id")?,
        name: map.require_text("name")?,
        sex: map.text("sex").and_then(Sex::from_code),
        hair_color: map.text("hair_color").and_then(HairColor::from_code),
        birth_year: map.integer("birth_year"),
        import_category: map
            .text("import_category")
            .and_then(ImportCategory::from_code),
    })
}

// ---------------------------------------------------------------------------
// SK -- offspring master
// ---------------------------------------------------------------------------

const SK_SPECS: &[FieldSpec] = &[
    layout::CREATED,
    field("horse_id", 11, 10, TextRaw),
    field("birth_date", 21, 8, Date(DateFormat::Ymd)),
    field("sex", 29, 1, Code),
    field("hair_color", 30, 2, Code),
    field("breed", 32, 1, Code),
    field("sire_breeding_id", 33, 10, TextRaw),
    field("dam_breeding_id", 43, 10, TextRaw),
];

pub const SK_LEN: usize = 53;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offspring {
    pub horse: RunnerId,
    pub birth_date: Option<NaiveDate>,
    pub sex: Option<Sex>,
    pub hair_color: Option<HairColor>,
    pub breed: Option<Breed>,
    pub sire_breeding_id: Option<String>,
    pub dam_breeding_id: Option<String>,
}

/// Required: horse id.
pub fn parse_sk(bytes: &[u8]) -> Result<Offspring, RecordError> {
    let map = parse_fields(bytes, SK_SPECS)?;
    Ok(Offspring {
        horse: layout::require_runner_id(&map, "horse_id")?,
        birth_date: map.date("birth_date"),
        sex: map.text("sex").and_then(Sex::from_code),
        hair_color: map.text("hair_color").and_then(HairColor::from_code),
        breed: map.text("breed").and_then(Breed::from_code),
        sire_breeding_id: map.text("sire_breeding_id").map(str::to_owned),
        dam_breeding_id: map.text("dam_breeding_id").map(str::to_owned),
    })
}

// ---------------------------------------------------------------------------
// HS -- market transaction price
// ---------------------------------------------------------------------------

const HS_SPECS: &[FieldSpec] = &[
    layout::CREATED,
    field("horse_id", 11, 10, TextRaw),
    field("market_code", 21, 6, Code),
    field("market_name", 27, 40, Text),
    field("transaction_date", 67, 8, Date(DateFormat::Ymd)),
    field("price_yen", 75, 10, Integer),
];

pub const HS_LEN: usize = 85;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPrice {
    pub horse: RunnerId,
    pub market_code: Option<String>,
    pub market_name: Option<String>,
    pub transaction_date: Option<NaiveDate>,
    pub price_yen: Option<i64>,
}

/// Required: horse id.
pub fn parse_hs(bytes: &[u8]) -> Result<MarketPrice, RecordError> {
    let map = parse_fields(bytes, HS_SPECS)?;
    Ok(MarketPrice {
        horse: layout::require_runner_id(&map, "horse_id")?,
        market_code: map.text("market_code").map(str::to_owned),
        market_name: map.text("market_name").map(str::to_owned),
        transaction_date: map.date("transaction_date"),
        price_yen: map.integer("price_yen"),
    })
}

// ---------------------------------------------------------------------------
// HY -- horse name origin
// ---------------------------------------------------------------------------

const HY_SPECS: &[FieldSpec] = &[
    layout::CREATED,
    field("horse_id", 11, 10, TextRaw),
    field("horse_name", 21, 36, Text),
    field("meaning", 57, 64, Text),
];

pub const HY_LEN: usize = 121;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorseNameOrigin {
    pub horse: RunnerId,
    pub name: Option<String>,
    pub meaning: Option<String>,
}

/// Required: horse id.
pub fn parse_hy(bytes: &[u8]) -> Result<HorseNameOrigin, RecordError> {
    let map = parse_fields(bytes, HY_SPECS)?;
    Ok(HorseNameOrigin {
        horse: layout::require_runner_id(&map, "horse_id")?,
        name: map.text("horse_name").map(str::to_owned),
        meaning: map.text("meaning").map(str::to_owned),
    })
}
