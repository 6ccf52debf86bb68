//! Race entry (`SE`) records: one runner's start in one race.

use super::layout;
use crate::codes::Sex;
use crate::fieldspec::{FieldEncoding::*, FieldSpec, RecordError, field, parse_fields};
use crate::ids::{RaceId, RunnerId};
use serde::{Deserialize, Serialize};

const SE_SPECS: &[FieldSpec] = &[
    layout::CREATED,
    field("bracket", 27, 2, Integer),
    field("horse_number", 29, 2, Integer),
    field("horse_id", 31, 10, TextRaw),
    field("horse_name", 41, 36, Text),
    field("sex", 77, 1, Code),
    field("age", 78, 2, Integer),
    field("jockey_code", 80, 5, Code),
    field("jockey_name", 85, 34, Text),
    field("weight_carried", 119, 3, Decimal(1)),
    field("trainer_code", 122, 5, Code),
    field("horse_weight", 127, 3, Integer),
    field("weight_diff", 130, 3, Integer),
    field("finish_position", 133, 2, Integer),
    field("time", 135, 4, Decimal(1)),
    field("odds", 139, 4, Decimal(1)),
    field("popularity", 143, 2, Integer),
];

/// Total record length for `SE`.
pub const SE_LEN: usize = 145;

/// One horse's start. Result fields stay `None` until the race is run;
/// `horse_weight` in particular is blank-filled when not yet announced, and
/// `None` here always means "not reported", never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceEntry {
    pub race: RaceId,
    pub horse: RunnerId,
    pub horse_name: String,
    pub bracket: Option<i64>,
    pub horse_number: Option<i64>,
    pub sex: Option<Sex>,
    pub age: Option<i64>,
    pub jockey_code: Option<String>,
    pub jockey_name: Option<String>,
    pub weight_carried_kg: Option<f64>,
    pub trainer_code: Option<String>,
    pub horse_weight_kg: Option<i64>,
    pub horse_weight_diff_kg: Option<i64>,
    pub finish_position: Option<i64>,
    pub time_seconds: Option<f64>,
    pub win_odds: Option<f64>,
    pub popularity: Option<i64>,
}

/// Required: race key, horse id, horse name.
pub fn parse_se(bytes: &[u8]) -> Result<RaceEntry, RecordError> {
    let race = layout::race_id(bytes)?;
    let map = parse_fields(bytes, SE_SPECS)?;
    Ok(RaceEntry {
        race,
        horse: layout::require_runner_id(&map, "horse_id")?,
        horse_name: map.require_text("horse_name")?,
        bracket: map.integer("bracket"),
        horse_number: map.integer("horse_number"),
        sex: map.text("sex").and_then(Sex::from_code),
        age: map.integer("age"),
        jockey_code: map.text("jockey_code").map(str::to_owned),
        jockey_name: map.text("jockey_name").map(str::to_owned),
        weight_carried_kg: map.decimal("weight_carried"),
        trainer_code: map.text("trainer_code").map(str::to_owned),
        horse_weight_kg: map.integer("horse_weight"),
        horse_weight_diff_kg: map.integer("weight_diff"),
        finish_position: map.integer("finish_position"),
        time_seconds: map.decimal("time"),
        win_odds: map.decimal("odds"),
        popularity: map.integer("popularity"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::testutil::RecordBuf;

    fn se_buf() -> RecordBuf {
        let mut buf = RecordBuf::new("SE", SE_LEN);
        buf.put(3, "20240501");
        buf.put(11, "20240505");
        buf.put(19, "05");
        buf.put(21, "03");
        buf.put(23, "02");
        buf.put(25, "11");
        buf.put(27, " 4");
        buf.put(29, " 7");
        buf.put(31, "2021104567");
        buf.put_text(41, "ｷﾀｻﾝﾌﾞﾗｯｸ", 36);
        buf.put(77, "1");
        buf.put(78, " 3");
        buf.put(80, "01088");
        buf.put_text(85, "武豊", 34);
        buf.put(119, "570");
        buf.put(122, "01053");
        buf
    }

    #[test]
    fn parses_pre_race_entry() {
        let entry = parse_se(&se_buf().into_bytes()).unwrap();
        assert_eq!(entry.race.as_str(), "2024050505030211");
        assert_eq!(entry.horse.as_str(), "2021104567");
        // Half-width katakana in the feed normalises to full-width.
        assert_eq!(entry.horse_name, "キタサンブラック");
        assert_eq!(entry.sex, Some(Sex::Colt));
        assert_eq!(entry.weight_carried_kg, Some(57.0));
        // Pre-race: weight and result not reported, distinct from zero.
        assert_eq!(entry.horse_weight_kg, None);
        assert_eq!(entry.finish_position, None);
    }

    #[test]
    fn parses_post_race_result_fields() {
        let mut buf = se_buf();
        buf.put(127, "498");
        buf.put(130, " +6");
        buf.put(133, " 1");
        buf.put(135, "2242");
        buf.put(139, " 32");
        buf.put(143, " 1");
        let entry = parse_se(&buf.into_bytes()).unwrap();
        assert_eq!(entry.horse_weight_kg, Some(498));
        assert_eq!(entry.horse_weight_diff_kg, Some(6));
        assert_eq!(entry.finish_position, Some(1));
        assert_eq!(entry.time_seconds, Some(224.2));
        assert_eq!(entry.win_odds, Some(3.2));
        assert_eq!(entry.popularity, Some(1));
    }

    #[test]
    fn blank_horse_id_is_a_missing_field() {
        let mut buf = se_buf();
        buf.put(31, "          ");
        let err = parse_se(&buf.into_bytes()).unwrap_err();
        assert_eq!(err, RecordError::MissingField { name: "horse_id" });
    }

    #[test]
    fn malformed_horse_id_is_invalid() {
        let mut buf = se_buf();
        buf.put(31, "20211045AB");
        let err = parse_se(&buf.into_bytes()).unwrap_err();
        assert!(matches!(
            err,
            RecordError::InvalidField {
                name: "horse_id",
                ..
            }
        ));
    }

    #[test]
    fn blank_horse_name_is_a_missing_field() {
        let mut buf = se_buf();
        buf.put_text(41, "", 36);
        let err = parse_se(&buf.into_bytes()).unwrap_err();
        assert_eq!(err, RecordError::MissingField { name: "horse_name" });
    }
}
