//! Odds snapshot records (`O1`..`O6`).
//!
//! All six pools share one wire shape: race key, announcement time, entry
//! count, then a run of per-line blocks. `O1` lines carry no combination
//! (the runner itself is the bet); the exotic pools put the combination
//! string next to the runner that anchors the line.

use super::layout;
use crate::fieldspec::{
    DateFormat, FieldEncoding::*, FieldSpec, RecordError, field, parse_fields,
};
use crate::ids::{RaceId, RunnerId};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Which betting pool an odds snapshot covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OddsKind {
    /// `O1` -- win, place, and bracket quinella.
    WinPlaceBracket,
    /// `O2` -- quinella.
    Quinella,
    /// `O3` -- quinella place (wide).
    QuinellaPlace,
    /// `O4` -- exacta.
    Exacta,
    /// `O5` -- trio.
    Trio,
    /// `O6` -- trifecta.
    Trifecta,
}

impl OddsKind {
    pub fn from_record_kind(kind: &str) -> Option<OddsKind> {
        match kind {
            "O1" => Some(OddsKind::WinPlaceBracket),
            "O2" => Some(OddsKind::Quinella),
            "O3" => Some(OddsKind::QuinellaPlace),
            "O4" => Some(OddsKind::Exacta),
            "O5" => Some(OddsKind::Trio),
            "O6" => Some(OddsKind::Trifecta),
            _ => None,
        }
    }
}

const ODDS_SPECS: &[FieldSpec] = &[
    layout::CREATED,
    field("announced_at", 27, 12, Date(DateFormat::YmdHm)),
    field("entry_count", 39, 2, Integer),
    field("line_count", 41, 2, Integer),
];

const ODDS_BLOCK_BASE: usize = 43;
const ODDS_BLOCK_LEN: usize = 27;

const ODDS_BLOCK_SPECS: &[FieldSpec] = &[
    field("runner_id", 0, 10, TextRaw),
    field("combination", 10, 8, TextRaw),
    field("odds", 18, 6, Decimal(1)),
    field("popularity", 24, 3, Integer),
];

/// One odds line. `odds` is `None` while the pool shows the runner as
/// not-yet-quoted (blank upstream).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsEntry {
    pub runner: RunnerId,
    pub combination: Option<String>,
    pub odds: Option<f64>,
    pub popularity: Option<i64>,
}

/// One snapshot of one pool's odds for one race.
///
/// The codec passes duplicate runners through untouched; uniqueness within a
/// snapshot is enforced by the serialiser layer at the domain boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceOdds {
    pub kind: OddsKind,
    pub race: RaceId,
    pub announced_at: Option<NaiveDateTime>,
    pub entry_count: Option<i64>,
    pub entries: Vec<OddsEntry>,
}

/// Required: race key. Blank filler lines are skipped.
pub fn parse_odds(bytes: &[u8], kind: OddsKind) -> Result<RaceOdds, RecordError> {
    let race = layout::race_id(bytes)?;
    let map = parse_fields(bytes, ODDS_SPECS)?;
    let count = map.integer("line_count").unwrap_or(0).max(0) as usize;
    let entries = layout::parse_blocks(
        bytes,
        ODDS_BLOCK_BASE,
        ODDS_BLOCK_LEN,
        count,
        ODDS_BLOCK_SPECS,
        |block| {
            let Some(runner) = layout::optional_runner_id(block, "runner_id")? else {
                return Ok(None);
            };
            Ok(Some(OddsEntry {
                runner,
                combination: block.text("combination").map(str::to_owned),
                odds: block.decimal("odds"),
                popularity: block.integer("popularity"),
            }))
        },
    )?;
    Ok(RaceOdds {
        kind,
        race,
        announced_at: map.date_time("announced_at"),
        entry_count: map.integer("entry_count"),
        entries,
    })
}
