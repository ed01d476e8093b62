//! Canonical, version-independent entities produced by normalization.
//!
//! Every entity serializes to the current wire shape, so a canonical record
//! fed back through the pipeline is detected as current and normalizes to
//! itself.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Declares a closed wire enum that still carries values it does not know.
///
/// Unknown strings land in `Other` so the validator can flag them as a
/// warning without losing the original value.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $wire:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant,)+
            Other(String),
        }

        impl $name {
            pub const KNOWN: &'static [&'static str] = &[$($wire),+];

            pub fn from_wire(value: &str) -> Self {
                match value {
                    $($wire => $name::$variant,)+
                    other => $name::Other(other.to_string()),
                }
            }

            pub fn as_str(&self) -> &str {
                match self {
                    $($name::$variant => $wire,)+
                    $name::Other(other) => other.as_str(),
                }
            }

            pub fn is_known(&self) -> bool {
                !matches!(self, $name::Other(_))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Ok($name::from_wire(&raw))
            }
        }
    };
}

wire_enum! {
    /// Only rugby union is published today.
    Sport { RugbyUnion => "rugby union" }
}

wire_enum! {
    Category { International => "international", Club => "club" }
}

wire_enum! {
    Gender { Men => "men", Women => "women", Mixed => "mixed" }
}

wire_enum! {
    AgeGrade { Senior => "senior", U20 => "u20" }
}

wire_enum! {
    Tier { Tier1 => "tier-1", Tier2 => "tier-2", Tier3 => "tier-3" }
}

wire_enum! {
    SeasonPattern { Annual => "annual", Variable => "variable" }
}

impl Default for Sport {
    fn default() -> Self {
        Sport::RugbyUnion
    }
}

impl Default for SeasonPattern {
    fn default() -> Self {
        SeasonPattern::Annual
    }
}

/// Match statuses the upstream collectors are known to emit.
///
/// Status is an open enum on the wire; values outside this list are kept
/// verbatim and only tallied.
pub const KNOWN_MATCH_STATUSES: &[&str] = &[
    "scheduled",
    "live",
    "completed",
    "postponed",
    "cancelled",
];

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BroadcastRegion {
    pub region: String,
    pub providers: Vec<String>,
    pub official_source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnalysisProvider {
    pub name: String,
    pub official_source: String,
}

/// Where a competition can be watched and analysed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Coverage {
    pub broadcast_regions: Vec<BroadcastRegion>,
    pub analysis_providers: Vec<AnalysisProvider>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Empty strings mean "unknown".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataSummary {
    pub match_count: u64,
    pub seasons: Vec<String>,
    pub date_range: DateRange,
    pub last_updated: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Competition {
    pub id: String,
    pub name: String,
    pub short_name: String,
    pub sport: Sport,
    pub category: Category,
    pub gender: Gender,
    pub age_grade: AgeGrade,
    pub tier: Tier,
    pub region: String,
    pub governing_body: String,
    pub organizer: String,
    pub official_sites: Vec<String>,
    pub official_feeds: Vec<String>,
    pub timezone_default: String,
    pub season_pattern: SeasonPattern,
    pub match_url_template: String,
    pub data_paths: Vec<String>,
    pub coverage: Coverage,
    /// Display names as published; informational only, never linked to teams.
    pub teams: Vec<String>,
    pub team_ids: BTreeSet<String>,
    pub data_summary: DataSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_repo_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub competition_id: String,
    pub name: String,
    pub name_ja: String,
    pub short_name: String,
    pub country: String,
    pub division: String,
    pub logo_url: String,
    pub badge_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub match_id: String,
    pub competition_id: String,
    pub season: String,
    pub round: String,
    pub status: String,
    /// Local kickoff exactly as published.
    pub kickoff: String,
    pub kickoff_utc: String,
    pub timezone: String,
    pub venue: String,
    pub home_team: String,
    pub away_team: String,
    /// Empty means unresolved.
    pub home_team_id: String,
    pub away_team_id: String,
    pub match_url: String,
    pub broadcasters: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub division: Option<String>,
}

impl Match {
    pub fn has_known_status(&self) -> bool {
        self.status.is_empty() || KNOWN_MATCH_STATUSES.contains(&self.status.as_str())
    }
}
