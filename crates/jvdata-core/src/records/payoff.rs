//! Payoff (`HR`) and vote-count (`H1`, `H5`, `H6`) records.

use super::layout;
use crate::fieldspec::{FieldEncoding::*, FieldSpec, RecordError, field, parse_fields};
use crate::ids::RaceId;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// HR -- payoff
// ---------------------------------------------------------------------------

const HR_SPECS: &[FieldSpec] = &[
    layout::CREATED,
    field("entry_count", 27, 2, Integer),
    field("line_count", 29, 2, Integer),
];

const HR_BLOCK_BASE: usize = 31;
const HR_BLOCK_LEN: usize = 21;

const HR_BLOCK_SPECS: &[FieldSpec] = &[
    field("bet_type", 0, 1, Code),
    field("combination", 1, 8, TextRaw),
    field("amount", 9, 9, Integer),
    field("popularity", 18, 3, Integer),
];

/// One winning line of one pool: combination, payout per 100 yen unit,
/// finishing popularity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoffItem {
    pub bet_type: String,
    pub combination: String,
    pub amount_yen: Option<i64>,
    pub popularity: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payoff {
    pub race: RaceId,
    pub entry_count: Option<i64>,
    pub items: Vec<PayoffItem>,
}

/// Required: race key. Blank filler lines are skipped.
pub fn parse_hr(bytes: &[u8]) -> Result<Payoff, RecordError> {
    let race = layout::race_id(bytes)?;
    let map = parse_fields(bytes, HR_SPECS)?;
    let count = map.integer("line_count").unwrap_or(0).max(0) as usize;
    let items = layout::parse_blocks(
        bytes,
        HR_BLOCK_BASE,
        HR_BLOCK_LEN,
        count,
        HR_BLOCK_SPECS,
        |block| {
            let Some(combination) = block.text("combination") else {
                return Ok(None);
            };
            Ok(Some(PayoffItem {
                bet_type: block.text("bet_type").unwrap_or_default().to_owned(),
                combination: combination.to_owned(),
                amount_yen: block.integer("amount"),
                popularity: block.integer("popularity"),
            }))
        },
    )?;
    Ok(Payoff {
        race,
        entry_count: map.integer("entry_count"),
        items,
    })
}

// ---------------------------------------------------------------------------
// H1 / H5 / H6 -- vote counts
// ---------------------------------------------------------------------------

/// Which pool family a vote-count record covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteKind {
    /// `H1` -- win, place, bracket quinella.
    WinPlaceBracket,
    /// `H5` -- quinella place (wide).
    QuinellaPlace,
    /// `H6` -- trifecta.
    Trifecta,
}

impl VoteKind {
    pub fn from_record_kind(kind: &str) -> Option<VoteKind> {
        match kind {
            "H1" => Some(VoteKind::WinPlaceBracket),
            "H5" => Some(VoteKind::QuinellaPlace),
            "H6" => Some(VoteKind::Trifecta),
            _ => None,
        }
    }
}

const VOTE_SPECS: &[FieldSpec] = &[
    layout::CREATED,
    field("entry_count", 27, 2, Integer),
    field("total_votes", 29, 11, Integer),
    field("line_count", 40, 2, Integer),
];

const VOTE_BLOCK_BASE: usize = 42;
const VOTE_BLOCK_LEN: usize = 22;

const VOTE_BLOCK_SPECS: &[FieldSpec] = &[
    field("combination", 0, 8, TextRaw),
    field("votes", 8, 11, Integer),
    field("popularity", 19, 3, Integer),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteEntry {
    pub combination: String,
    pub votes: Option<i64>,
    pub popularity: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteCounts {
    pub kind: VoteKind,
    pub race: RaceId,
    pub entry_count: Option<i64>,
    pub total_votes: Option<i64>,
    pub entries: Vec<VoteEntry>,
}

/// Required: race key. Blank filler lines are skipped.
pub fn parse_votes(bytes: &[u8], kind: VoteKind) -> Result<VoteCounts, RecordError> {
    let race = layout::race_id(bytes)?;
    let map = parse_fields(bytes, VOTE_SPECS)?;
    let count = map.integer("line_count").unwrap_or(0).max(0) as usize;
    let entries = layout::parse_blocks(
        bytes,
        VOTE_BLOCK_BASE,
        VOTE_BLOCK_LEN,
        count,
        VOTE_BLOCK_SPECS,
        |block| {
            let Some(combination) = block.text("combination") else {
                return Ok(None);
            };
            Ok(Some(VoteEntry {
                combination: combination.to_owned(),
                votes: block.integer("votes"),
                popularity: block.integer("popularity"),
            }))
        },
    )?;
    Ok(VoteCounts {
        kind,
        race,
        entry_count: map.integer("entry_count"),
        total_votes: map.integer("total_votes"),
        entries,
    })
}

// ---------------------------------------------------------------------------
// WF -- WIN5 carryover
// ---------------------------------------------------------------------------

const WF_SPECS: &[FieldSpec] = &[
    layout::CREATED,
    field("meeting_date", 11, 8, Date(crate::fieldspec::DateFormat::Ymd)),
    field("carryover", 19, 11, Integer),
    field("total_votes", 30, 11, Integer),
];

pub const WF_LEN: usize = 41;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Carryover {
    pub meeting_date: chrono::NaiveDate,
    pub carryover_yen: Option<i64>,
    pub total_votes: Option<i64>,
}

/// Required: meeting date.
pub fn parse_wf(bytes: &[u8]) -> Result<Carryover, RecordError> {
    let map = parse_fields(bytes, WF_SPECS)?;
    Ok(Carryover {
        meeting_date: map.date("meeting_date").ok_or(RecordError::MissingField {
            name: "meeting_date",
        })?,
        carryover_yen: map.integer("carryover"),
        total_votes: map.integer("total_votes"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::testutil::RecordBuf;

    fn put_race_key(buf: &mut RecordBuf) {
        buf.put(11, "20240505");
        buf.put(19, "05");
        buf.put(21, "03");
        buf.put(23, "02");
        buf.put(25, "11");
    }

    #[test]
    fn hr_parses_payoff_lines() {
        let mut buf = RecordBuf::new("HR", HR_BLOCK_BASE + 2 * HR_BLOCK_LEN);
        put_race_key(&mut buf);
        buf.put(27, "18");
        buf.put(29, " 2");
        buf.put(31, "107            320  1");
        buf.put(52, "407-03        2410 12");
        let payoff = parse_hr(&buf.into_bytes()).unwrap();
        assert_eq!(payoff.race.as_str(), "2024050505030211");
        assert_eq!(payoff.items.len(), 2);
        assert_eq!(payoff.items[0].bet_type, "1");
        assert_eq!(payoff.items[0].combination, "07");
        assert_eq!(payoff.items[0].amount_yen, Some(320));
        assert_eq!(payoff.items[1].combination, "07-03");
        assert_eq!(payoff.items[1].popularity, Some(12));
    }

    #[test]
    fn hr_skips_blank_filler_lines() {
        let mut buf = RecordBuf::new("HR", HR_BLOCK_BASE + 3 * HR_BLOCK_LEN);
        put_race_key(&mut buf);
        buf.put(29, " 3");
        buf.put(31, "107            320  1");
        let payoff = parse_hr(&buf.into_bytes()).unwrap();
        assert_eq!(payoff.items.len(), 1);
    }

    #[test]
    fn hr_requires_race_key() {
        let buf = RecordBuf::new("HR", HR_BLOCK_BASE);
        let err = parse_hr(&buf.into_bytes()).unwrap_err();
        assert_eq!(err, RecordError::MissingField { name: "race_key" });
    }

    #[test]
    fn h1_parses_vote_lines() {
        let mut buf = RecordBuf::new("H1", VOTE_BLOCK_BASE + VOTE_BLOCK_LEN);
        put_race_key(&mut buf);
        buf.put(27, "18");
        buf.put(29, " 1234567890");
        buf.put(40, " 1");
        buf.put(42, "07         98765432  1");
        let votes = parse_votes(&buf.into_bytes(), VoteKind::WinPlaceBracket).unwrap();
        assert_eq!(votes.total_votes, Some(1_234_567_890));
        assert_eq!(votes.entries.len(), 1);
        assert_eq!(votes.entries[0].combination, "07");
        assert_eq!(votes.entries[0].votes, Some(98_765_432));
    }

    #[test]
    fn wf_parses_carryover() {
        let mut buf = RecordBuf::new("WF", WF_LEN);
        buf.put(11, "20240505");
        buf.put(19, "  600000000");
        buf.put(30, "   41234567");
        let wf = parse_wf(&buf.into_bytes()).unwrap();
        assert_eq!(wf.carryover_yen, Some(600_000_000));
        assert_eq!(wf.total_votes, Some(41_234_567));
    }

    #[test]
    fn vote_kind_maps_record_kinds() {
        assert_eq!(VoteKind::from_record_kind("H5"), Some(VoteKind::QuinellaPlace));
        assert_eq!(VoteKind::from_record_kind("H2"), None);
    }
}
