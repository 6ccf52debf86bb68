//! Code tables.
//!
//! The feed encodes categorical fields as zero-padded decimal strings; each
//! table below maps those codes onto an enum. Lookup is total: an unknown or
//! blank code yields `None` rather than an error, because master records
//! routinely carry codes newer than the client. Tables only grow an explicit
//! `Other` arm where the upstream specification itself defines one.

use serde::{Deserialize, Serialize};

fn code_value(code: &str) -> Option<u32> {
    let code = code.trim();
    if code.is_empty() {
        return None;
    }
    code.parse().ok()
}

// ---------------------------------------------------------------------------
// Sex
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    Colt,
    Filly,
    Gelding,
}

impl Sex {
    pub fn from_code(code: &str) -> Option<Sex> {
        match code_value(code)? {
            1 => Some(Sex::Colt),
            2 => Some(Sex::Filly),
            3 => Some(Sex::Gelding),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Sex::Colt => "牡",
            Sex::Filly => "牝",
            Sex::Gelding => "セン",
        }
    }
}

// ---------------------------------------------------------------------------
// Hair colour
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HairColor {
    Chestnut,
    DarkChestnut,
    Bay,
    DarkBay,
    BrownBlack,
    Black,
    Grey,
    Roan,
    White,
}

impl HairColor {
    pub fn from_code(code: &str) -> Option<HairColor> {
        match code_value(code)? {
            1 => Some(HairColor::Chestnut),
            2 => Some(HairColor::DarkChestnut),
            3 => Some(HairColor::Bay),
            4 => Some(HairColor::DarkBay),
            5 => Some(HairColor::BrownBlack),
            6 => Some(HairColor::Black),
            7 => Some(HairColor::Grey),
            8 => Some(HairColor::Roan),
            9 => Some(HairColor::White),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            HairColor::Chestnut => "栗毛",
            HairColor::DarkChestnut => "栃栗毛",
            HairColor::Bay => "鹿毛",
            HairColor::DarkBay => "黒鹿毛",
            HairColor::BrownBlack => "青鹿毛",
            HairColor::Black => "青毛",
            HairColor::Grey => "芦毛",
            HairColor::Roan => "粕毛",
            HairColor::White => "白毛",
        }
    }
}

// ---------------------------------------------------------------------------
// Track condition / surface
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackCondition {
    Firm,
    Good,
    Yielding,
    Soft,
}

impl TrackCondition {
    pub fn from_code(code: &str) -> Option<TrackCondition> {
        match code_value(code)? {
            1 => Some(TrackCondition::Firm),
            2 => Some(TrackCondition::Good),
            3 => Some(TrackCondition::Yielding),
            4 => Some(TrackCondition::Soft),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TrackCondition::Firm => "良",
            TrackCondition::Good => "稍重",
            TrackCondition::Yielding => "重",
            TrackCondition::Soft => "不良",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackSurface {
    Turf,
    Dirt,
    Steeplechase,
}

impl TrackSurface {
    pub fn from_code(code: &str) -> Option<TrackSurface> {
        match code_value(code)? {
            1 => Some(TrackSurface::Turf),
            2 => Some(TrackSurface::Dirt),
            3 => Some(TrackSurface::Steeplechase),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TrackSurface::Turf => "芝",
            TrackSurface::Dirt => "ダート",
            TrackSurface::Steeplechase => "障害",
        }
    }
}

// ---------------------------------------------------------------------------
// Venue
// ---------------------------------------------------------------------------

/// The ten JRA racecourses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Venue {
    Sapporo,
    Hakodate,
    Fukushima,
    Niigata,
    Tokyo,
    Nakayama,
    Chukyo,
    Kyoto,
    Hanshin,
    Kokura,
}

impl Venue {
    pub fn from_code(code: &str) -> Option<Venue> {
        match code_value(code)? {
            1 => Some(Venue::Sapporo),
            2 => Some(Venue::Hakodate),
            3 => Some(Venue::Fukushima),
            4 => Some(Venue::Niigata),
            5 => Some(Venue::Tokyo),
            6 => Some(Venue::Nakayama),
            7 => Some(Venue::Chukyo),
            8 => Some(Venue::Kyoto),
            9 => Some(Venue::Hanshin),
            10 => Some(Venue::Kokura),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Venue::Sapporo => "札幌",
            Venue::Hakodate => "函館",
            Venue::Fukushima => "福島",
            Venue::Niigata => "新潟",
            Venue::Tokyo => "東京",
            Venue::Nakayama => "中山",
            Venue::Chukyo => "中京",
            Venue::Kyoto => "京都",
            Venue::Hanshin => "阪神",
            Venue::Kokura => "小倉",
        }
    }
}

// ---------------------------------------------------------------------------
// Grade / race condition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    G1,
    G2,
    G3,
    Listed,
    OpenSpecial,
}

impl Grade {
    pub fn from_code(code: &str) -> Option<Grade> {
        match code_value(code)? {
            1 => Some(Grade::G1),
            2 => Some(Grade::G2),
            3 => Some(Grade::G3),
            4 => Some(Grade::Listed),
            5 => Some(Grade::OpenSpecial),
            _ => None,
        }
    }
}

/// Race class condition (who may enter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaceCondition {
    Newcomer,
    Maiden,
    OneWin,
    TwoWins,
    ThreeWins,
    Open,
}

impl RaceCondition {
    pub fn from_code(code: &str) -> Option<RaceCondition> {
        match code_value(code)? {
            1 => Some(RaceCondition::Newcomer),
            2 => Some(RaceCondition::Maiden),
            3 => Some(RaceCondition::OneWin),
            4 => Some(RaceCondition::TwoWins),
            5 => Some(RaceCondition::ThreeWins),
            6 => Some(RaceCondition::Open),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Running style
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunningStyle {
    FrontRunner,
    Stalker,
    Midfield,
    Closer,
}

impl RunningStyle {
    pub fn from_code(code: &str) -> Option<RunningStyle> {
        match code_value(code)? {
            1 => Some(RunningStyle::FrontRunner),
            2 => Some(RunningStyle::Stalker),
            3 => Some(RunningStyle::Midfield),
            4 => Some(RunningStyle::Closer),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RunningStyle::FrontRunner => "逃げ",
            RunningStyle::Stalker => "先行",
            RunningStyle::Midfield => "差し",
            RunningStyle::Closer => "追込",
        }
    }
}

// ---------------------------------------------------------------------------
// Day of week
// ---------------------------------------------------------------------------

/// Meeting day-of-week. The feed numbers Saturday first because that is the
/// usual first day of a JRA meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayOfWeek {
    Saturday,
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl DayOfWeek {
    pub fn from_code(code: &str) -> Option<DayOfWeek> {
        match code_value(code)? {
            1 => Some(DayOfWeek::Saturday),
            2 => Some(DayOfWeek::Sunday),
            3 => Some(DayOfWeek::Monday),
            4 => Some(DayOfWeek::Tuesday),
            5 => Some(DayOfWeek::Wednesday),
            6 => Some(DayOfWeek::Thursday),
            7 => Some(DayOfWeek::Friday),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Breed / import category
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Breed {
    Thoroughbred,
    AngloArab,
    Arab,
}

impl Breed {
    pub fn from_code(code: &str) -> Option<Breed> {
        match code_value(code)? {
            1 => Some(Breed::Thoroughbred),
            2 => Some(Breed::AngloArab),
            3 => Some(Breed::Arab),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportCategory {
    DomesticBred,
    Imported,
    BroughtInForRacing,
}

impl ImportCategory {
    pub fn from_code(code: &str) -> Option<ImportCategory> {
        match code_value(code)? {
            1 => Some(ImportCategory::DomesticBred),
            2 => Some(ImportCategory::Imported),
            3 => Some(ImportCategory::BroughtInForRacing),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Training centre
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainingCenter {
    Miho,
    Ritto,
}

impl TrainingCenter {
    pub fn from_code(code: &str) -> Option<TrainingCenter> {
        match code_value(code)? {
            1 => Some(TrainingCenter::Miho),
            2 => Some(TrainingCenter::Ritto),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TrainingCenter::Miho => "美浦",
            TrainingCenter::Ritto => "栗東",
        }
    }
}
