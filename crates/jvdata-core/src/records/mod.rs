//! Record parsers and the kind dispatcher.
//!
//! The first two bytes of every record name its kind. [`parse_record`] reads
//! them, hands the buffer to the matching parser, and wraps the result in the
//! [`ParsedRecord`] sum. Kinds this build does not know are returned as
//! [`ParsedRecord::Unrecognised`] so a feed upgrade never breaks a consumer
//! that only cares about a subset.

pub mod course;
pub mod entry;
pub mod horse;
mod layout;
pub mod notice;
pub mod odds;
pub mod payoff;
pub mod person;
pub mod race;
pub mod results;

pub use course::{CourseInfo, CourseRecord, Schedule};
pub use entry::RaceEntry;
pub use horse::{BreedingHorse, HorseMaster, HorseNameOrigin, MarketPrice, Offspring};
pub use notice::{
    AvoidedRunner, CourseChange, ExclusionInfo, HorseWeights, JockeyChange, StartTimeChange,
    WeatherCondition,
};
pub use odds::{OddsEntry, OddsKind, RaceOdds};
pub use payoff::{Carryover, Payoff, PayoffItem, VoteCounts, VoteKind};
pub use person::{JockeyMaster, TrainerMaster};
pub use race::{Race, SpecialRegistration};
pub use results::{MiningForecast, ResultsTally, SlopeTraining};

use crate::fieldspec::RecordError;
use crate::text;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ParsedRecord
// ---------------------------------------------------------------------------

/// Every record kind the codec understands, plus the pass-through arm for
/// kinds it does not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParsedRecord {
    Race(Race),
    SpecialRegistration(SpecialRegistration),
    RaceEntry(RaceEntry),
    Horse(HorseMaster),
    BreedingHorse(BreedingHorse),
    Offspring(Offspring),
    MarketPrice(MarketPrice),
    HorseNameOrigin(HorseNameOrigin),
    Jockey(JockeyMaster),
    Trainer(TrainerMaster),
    Payoff(Payoff),
    VoteCounts(VoteCounts),
    Odds(RaceOdds),
    Carryover(Carryover),
    ResultsTally(ResultsTally),
    SlopeTraining(SlopeTraining),
    MiningForecast(MiningForecast),
    CourseInfo(CourseInfo),
    CourseRecord(CourseRecord),
    Schedule(Schedule),
    WeatherCondition(WeatherCondition),
    HorseWeights(HorseWeights),
    AvoidedRunner(AvoidedRunner),
    JockeyChange(JockeyChange),
    StartTimeChange(StartTimeChange),
    CourseChange(CourseChange),
    ExclusionInfo(ExclusionInfo),
    Unrecognised { kind: String, bytes: Vec<u8> },
}

impl ParsedRecord {
    /// The two-character kind this record arrived as.
    pub fn kind(&self) -> &str {
        match self {
            ParsedRecord::Race(_) => "RA",
            ParsedRecord::SpecialRegistration(_) => "TK",
            ParsedRecord::RaceEntry(_) => "SE",
            ParsedRecord::Horse(_) => "UM",
            ParsedRecord::BreedingHorse(_) => "HN",
            ParsedRecord::Offspring(_) => "SK",
            ParsedRecord::MarketPrice(_) => "HS",
            ParsedRecord::HorseNameOrigin(_) => "HY",
            ParsedRecord::Jockey(_) => "KS",
            ParsedRecord::Trainer(_) => "CH",
            ParsedRecord::Payoff(_) => "HR",
            ParsedRecord::VoteCounts(v) => match v.kind {
                VoteKind::WinPlaceBracket => "H1",
                VoteKind::QuinellaPlace => "H5",
                VoteKind::Trifecta => "H6",
            },
            ParsedRecord::Odds(o) => match o.kind {
                OddsKind::WinPlaceBracket => "O1",
                OddsKind::Quinella => "O2",
                OddsKind::QuinellaPlace => "O3",
                OddsKind::Exacta => "O4",
                OddsKind::Trio => "O5",
                OddsKind::Trifecta => "O6",
            },
            ParsedRecord::Carryover(_) => "WF",
            ParsedRecord::ResultsTally(_) => "CK",
            ParsedRecord::SlopeTraining(_) => "HC",
            ParsedRecord::MiningForecast(_) => "DM",
            ParsedRecord::CourseInfo(_) => "CS",
            ParsedRecord::CourseRecord(_) => "RC",
            ParsedRecord::Schedule(_) => "YS",
            ParsedRecord::WeatherCondition(_) => "WE",
            ParsedRecord::HorseWeights(_) => "WH",
            ParsedRecord::AvoidedRunner(_) => "AV",
            ParsedRecord::JockeyChange(_) => "JC",
            ParsedRecord::StartTimeChange(_) => "TC",
            ParsedRecord::CourseChange(_) => "CC",
            ParsedRecord::ExclusionInfo(_) => "JG",
            ParsedRecord::Unrecognised { kind, .. } => kind,
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Decode the two-byte kind identifier, if the buffer has one.
pub fn record_kind(bytes: &[u8]) -> Option<String> {
    if bytes.len() < 2 {
        return None;
    }
    Some(text::decode(&bytes[..2]))
}

/// Parse one raw record by its kind identifier.
pub fn parse_record(bytes: &[u8]) -> Result<ParsedRecord, RecordError> {
    let kind = record_kind(bytes).ok_or(RecordError::TooShort {
        expected: 2,
        actual: bytes.len(),
    })?;
    match kind.as_str() {
        "RA" => race::parse_ra(bytes).map(ParsedRecord::Race),
        "TK" => race::parse_tk(bytes).map(ParsedRecord::SpecialRegistration),
        "SE" => entry::parse_se(bytes).map(ParsedRecord::RaceEntry),
        "UM" => horse::parse_um(bytes).map(ParsedRecord::Horse),
        "HN" => horse::parse_hn(bytes).map(ParsedRecord::BreedingHorse),
        "SK" => horse::parse_sk(bytes).map(ParsedRecord::Offspring),
        "HS" => horse::parse_hs(bytes).map(ParsedRecord::MarketPrice),
        "HY" => horse::parse_hy(bytes).map(ParsedRecord::HorseNameOrigin),
        "KS" => person::parse_ks(bytes).map(ParsedRecord::Jockey),
        "CH" => person::parse_ch(bytes).map(ParsedRecord::Trainer),
        "HR" => payoff::parse_hr(bytes).map(ParsedRecord::Payoff),
        "WF" => payoff::parse_wf(bytes).map(ParsedRecord::Carryover),
        "CK" => results::parse_ck(bytes).map(ParsedRecord::ResultsTally),
        "HC" => results::parse_hc(bytes).map(ParsedRecord::SlopeTraining),
        "DM" => results::parse_dm(bytes).map(ParsedRecord::MiningForecast),
        "CS" => course::parse_cs(bytes).map(ParsedRecord::CourseInfo),
        "RC" => course::parse_rc(bytes).map(ParsedRecord::CourseRecord),
        "YS" => course::parse_ys(bytes).map(ParsedRecord::Schedule),
        "WE" => notice::parse_we(bytes).map(ParsedRecord::WeatherCondition),
        "WH" => notice::parse_wh(bytes).map(ParsedRecord::HorseWeights),
        "AV" => notice::parse_av(bytes).map(ParsedRecord::AvoidedRunner),
        "JC" => notice::parse_jc(bytes).map(ParsedRecord::JockeyChange),
        "TC" => notice::parse_tc(bytes).map(ParsedRecord::StartTimeChange),
        "CC" => notice::parse_cc(bytes).map(ParsedRecord::CourseChange),
        "JG" => notice::parse_jg(bytes).map(ParsedRecord::ExclusionInfo),
        _ => {
            if let Some(odds_kind) = OddsKind::from_record_kind(&kind) {
                return odds::parse_odds(bytes, odds_kind).map(ParsedRecord::Odds);
            }
            if let Some(vote_kind) = VoteKind::from_record_kind(&kind) {
                return payoff::parse_votes(bytes, vote_kind).map(ParsedRecord::VoteCounts);
            }
            Ok(ParsedRecord::Unrecognised {
                kind,
                bytes: bytes.to_vec(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Batch parsing
// ---------------------------------------------------------------------------

/// Fail-fast batch parse: stops at the first malformed payload.
pub fn parse_all(payloads: &[Vec<u8>]) -> Result<Vec<ParsedRecord>, RecordError> {
    payloads.iter().map(|p| parse_record(p)).collect()
}

/// Collecting batch parse: malformed payloads are reported alongside the
/// successes, keyed by their position in the input.
pub fn parse_collecting(payloads: &[Vec<u8>]) -> (Vec<ParsedRecord>, Vec<(usize, RecordError)>) {
    let mut records = Vec::with_capacity(payloads.len());
    let mut failures = Vec::new();
    for (i, payload) in payloads.iter().enumerate() {
        match parse_record(payload) {
            Ok(record) => records.push(record),
            Err(err) => failures.push((i, err)),
        }
    }
    (records, failures)
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod testutil {
    use crate::text;

    /// Space-filled record buffer with the kind and a default data category
    /// stamped in; tests poke fields at their layout offsets.
    pub struct RecordBuf {
        bytes: Vec<u8>,
    }

    impl RecordBuf {
        pub fn new(kind: &str, len: usize) -> RecordBuf {
            let mut bytes = vec![b' '; len];
            bytes[..2].copy_from_slice(kind.as_bytes());
            bytes[2] = b'1';
            RecordBuf { bytes }
        }

        /// Place raw ASCII at an offset.
        pub fn put(&mut self, offset: usize, s: &str) {
            self.bytes[offset..offset + s.len()].copy_from_slice(s.as_bytes());
        }

        /// Shift-JIS-encode text into a fixed-width, space-padded window.
        pub fn put_text(&mut self, offset: usize, s: &str, width: usize) {
            let mut encoded = text::encode(s);
            assert!(encoded.len() <= width, "text wider than field");
            encoded.resize(width, b' ');
            self.bytes[offset..offset + width].copy_from_slice(&encoded);
        }

        pub fn into_bytes(self) -> Vec<u8> {
            self.bytes
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::RecordBuf;
    use super::*;

    fn ra_bytes() -> Vec<u8> {
        let mut buf = RecordBuf::new("RA", race::RA_LEN);
        buf.put(3, "20240501");
        buf.put(11, "20240505");
        buf.put(19, "05");
        buf.put(21, "03");
        buf.put(23, "02");
        buf.put(25, "11");
        buf.put_text(28, "日本ダービー", 60);
        buf.into_bytes()
    }

    #[test]
    fn dispatches_on_the_two_byte_kind() {
        match parse_record(&ra_bytes()).unwrap() {
            ParsedRecord::Race(race) => assert_eq!(race.name, "日本ダービー"),
            other => panic!("expected Race, got {:?}", other.kind()),
        }
    }

    #[test]
    fn unknown_kinds_are_not_fatal() {
        let mut bytes = ra_bytes();
        bytes[..2].copy_from_slice(b"ZZ");
        match parse_record(&bytes).unwrap() {
            ParsedRecord::Unrecognised { kind, bytes: raw } => {
                assert_eq!(kind, "ZZ");
                assert_eq!(raw.len(), race::RA_LEN);
            }
            other => panic!("expected Unrecognised, got {:?}", other.kind()),
        }
    }

    #[test]
    fn empty_buffer_is_too_short() {
        assert_eq!(
            parse_record(b"").unwrap_err(),
            RecordError::TooShort {
                expected: 2,
                actual: 0
            }
        );
    }

    #[test]
    fn odds_kinds_route_to_the_shared_parser() {
        for (kind, expected) in [
            ("O1", OddsKind::WinPlaceBracket),
            ("O4", OddsKind::Exacta),
            ("O6", OddsKind::Trifecta),
        ] {
            let mut buf = RecordBuf::new(kind, 43);
            buf.put(11, "20240505");
            buf.put(19, "05");
            buf.put(21, "03");
            buf.put(23, "02");
            buf.put(25, "11");
            // Blank line count: an empty snapshot rather than an error.
            match parse_record(&buf.into_bytes()).unwrap() {
                ParsedRecord::Odds(odds) => {
                    assert_eq!(odds.kind, expected);
                    assert!(odds.entries.is_empty());
                }
                other => panic!("expected Odds, got {:?}", other.kind()),
            }
        }
    }

    #[test]
    fn parse_all_is_fail_fast() {
        let good = ra_bytes();
        let mut bad = ra_bytes();
        bad.truncate(20);
        let err = parse_all(&[good.clone(), bad.clone(), good.clone()]).unwrap_err();
        assert!(matches!(err, RecordError::TooShort { .. }));
    }

    #[test]
    fn parse_collecting_reports_positions() {
        let good = ra_bytes();
        let mut bad = ra_bytes();
        bad.truncate(20);
        let (records, failures) = parse_collecting(&[good.clone(), bad, good]);
        assert_eq!(records.len(), 2);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, 1);
    }
}
