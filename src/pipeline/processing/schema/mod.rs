//! Schema registry: the known wire versions, their field-shape tables, and
//! version detection for individual records.

pub mod timestamp;

use std::collections::HashSet;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants;
use crate::domain::{AgeGrade, Category, Gender, SeasonPattern, Sport, Tier};
use crate::pipeline::ingestion::ResourceKind;

/// The two wire schemas that coexist upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaVersion {
    /// Flat schema without stable match/team ids
    Legacy,
    /// Normalized schema with stable ids and branding fields
    Current,
}

impl SchemaVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaVersion::Legacy => "legacy",
            SchemaVersion::Current => "current",
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed enums checked for membership
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumKind {
    Sport,
    Category,
    Gender,
    AgeGrade,
    Tier,
    SeasonPattern,
}

impl EnumKind {
    pub fn known_values(&self) -> &'static [&'static str] {
        match self {
            EnumKind::Sport => Sport::KNOWN,
            EnumKind::Category => Category::KNOWN,
            EnumKind::Gender => Gender::KNOWN,
            EnumKind::AgeGrade => AgeGrade::KNOWN,
            EnumKind::Tier => Tier::KNOWN,
            EnumKind::SeasonPattern => SeasonPattern::KNOWN,
        }
    }
}

/// Primitive shape a field must have on the wire
#[derive(Debug, Clone, Copy)]
pub enum FieldShape {
    Text,
    Timestamp,
    TextList,
    /// A single string or an array of strings (legacy broadcasters)
    TextOrList,
    /// A string or an integer (season, round)
    TextOrNumber,
    /// Non-negative integer
    Count,
    Enum(EnumKind),
    Object(&'static [FieldSpec]),
    ObjectList(&'static [FieldSpec]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    /// Older spellings of the same field, checked after `name`
    pub aliases: &'static [&'static str],
    pub shape: FieldShape,
    pub presence: Presence,
}

impl FieldSpec {
    const fn required(name: &'static str, shape: FieldShape) -> Self {
        Self { name, aliases: &[], shape, presence: Presence::Required }
    }

    const fn optional(name: &'static str, shape: FieldShape) -> Self {
        Self { name, aliases: &[], shape, presence: Presence::Optional }
    }

    const fn aka(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }

    /// Look the field up under its name, then its aliases.
    pub fn lookup<'a>(&self, record: &'a Map<String, Value>) -> Option<(&'static str, &'a Value)> {
        std::iter::once(&self.name)
            .chain(self.aliases.iter())
            .find_map(|key| record.get(*key).map(|v| (*key, v)))
    }
}

use FieldShape::*;

pub const DATE_RANGE_FIELDS: &[FieldSpec] = &[
    FieldSpec::optional("start", Timestamp),
    FieldSpec::optional("end", Timestamp),
];

pub const DATA_SUMMARY_FIELDS: &[FieldSpec] = &[
    FieldSpec::optional("match_count", Count),
    FieldSpec::optional("seasons", TextList),
    FieldSpec::optional("date_range", Object(DATE_RANGE_FIELDS)),
    FieldSpec::optional("last_updated", Timestamp),
];

pub const BROADCAST_REGION_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("region", Text),
    FieldSpec::optional("providers", TextList),
    FieldSpec::optional("official_source", Text),
];

pub const ANALYSIS_PROVIDER_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("name", Text),
    FieldSpec::optional("official_source", Text),
];

pub const COVERAGE_FIELDS: &[FieldSpec] = &[
    FieldSpec::optional("broadcast_regions", ObjectList(BROADCAST_REGION_FIELDS)),
    FieldSpec::optional("analysis_providers", ObjectList(ANALYSIS_PROVIDER_FIELDS)),
    FieldSpec::optional("notes", Text),
];

pub const LEGACY_COMPETITION_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("id", Text),
    FieldSpec::required("name", Text),
    FieldSpec::optional("short_name", Text),
    FieldSpec::optional("sport", Enum(EnumKind::Sport)),
    FieldSpec::required("category", Enum(EnumKind::Category)),
    FieldSpec::required("gender", Enum(EnumKind::Gender)),
    FieldSpec::required("age_grade", Enum(EnumKind::AgeGrade)),
    FieldSpec::required("tier", Enum(EnumKind::Tier)),
    FieldSpec::optional("region", Text),
    FieldSpec::optional("governing_body", Text),
    FieldSpec::optional("organizer", Text),
    FieldSpec::optional("official_sites", TextList),
    FieldSpec::optional("official_feeds", TextList),
    FieldSpec::optional("timezone_default", Text),
    FieldSpec::optional("season_pattern", Enum(EnumKind::SeasonPattern)),
    FieldSpec::optional("match_url_template", Text),
    FieldSpec::optional("data_paths", TextList),
    FieldSpec::optional("coverage", Object(COVERAGE_FIELDS)),
    FieldSpec::optional("teams", TextList),
    FieldSpec::optional("data_summary", Object(DATA_SUMMARY_FIELDS)),
];

pub const CURRENT_COMPETITION_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("id", Text),
    FieldSpec::required("name", Text),
    FieldSpec::optional("short_name", Text),
    FieldSpec::optional("sport", Enum(EnumKind::Sport)),
    FieldSpec::required("category", Enum(EnumKind::Category)),
    FieldSpec::required("gender", Enum(EnumKind::Gender)),
    FieldSpec::required("age_grade", Enum(EnumKind::AgeGrade)),
    FieldSpec::required("tier", Enum(EnumKind::Tier)),
    FieldSpec::optional("region", Text),
    FieldSpec::optional("governing_body", Text),
    FieldSpec::optional("organizer", Text),
    FieldSpec::optional("official_sites", TextList),
    FieldSpec::optional("official_feeds", TextList),
    FieldSpec::optional("timezone_default", Text),
    FieldSpec::optional("season_pattern", Enum(EnumKind::SeasonPattern)),
    FieldSpec::optional("match_url_template", Text),
    FieldSpec::optional("data_paths", TextList),
    FieldSpec::optional("coverage", Object(COVERAGE_FIELDS)),
    FieldSpec::optional("teams", TextList),
    FieldSpec::optional("team_ids", TextList),
    FieldSpec::optional("data_summary", Object(DATA_SUMMARY_FIELDS)),
    FieldSpec::optional("logo_url", Text),
    FieldSpec::optional("logo_repo_path", Text),
    FieldSpec::optional("license_key", Text),
];

pub const CURRENT_TEAM_FIELDS: &[FieldSpec] = &[
    // Required unless the record is keyed by id in a teams map
    FieldSpec::optional("id", Text),
    FieldSpec::required("competition_id", Text),
    FieldSpec::required("name", Text),
    FieldSpec::optional("name_ja", Text),
    FieldSpec::optional("short_name", Text),
    FieldSpec::optional("country", Text),
    FieldSpec::optional("division", Text),
    FieldSpec::optional("logo_url", Text),
    FieldSpec::optional("badge_url", Text),
];

pub const LEGACY_MATCH_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("kickoff", Timestamp).aka(&["date"]),
    FieldSpec::optional("competition_id", Text),
    FieldSpec::optional("season", TextOrNumber),
    FieldSpec::optional("round", TextOrNumber),
    FieldSpec::optional("venue", Text),
    FieldSpec::required("home_team", Text),
    FieldSpec::required("away_team", Text),
    FieldSpec::optional("broadcasters", TextOrList),
    FieldSpec::optional("match_url", Text).aka(&["url"]),
    FieldSpec::optional("division", Text),
];

pub const CURRENT_MATCH_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("match_id", Text),
    FieldSpec::required("competition_id", Text),
    FieldSpec::optional("season", TextOrNumber),
    FieldSpec::optional("round", TextOrNumber),
    FieldSpec::optional("status", Text),
    FieldSpec::required("kickoff", Timestamp),
    FieldSpec::optional("kickoff_utc", Timestamp),
    FieldSpec::optional("timezone", Text),
    FieldSpec::optional("venue", Text),
    FieldSpec::required("home_team", Text),
    FieldSpec::required("away_team", Text),
    FieldSpec::optional("home_team_id", Text),
    FieldSpec::optional("away_team_id", Text),
    FieldSpec::optional("match_url", Text),
    FieldSpec::optional("broadcasters", TextOrList),
    FieldSpec::optional("division", Text),
];

const CURRENT_MATCH_MARKERS: &[&str] = &[
    "match_id",
    "home_team_id",
    "away_team_id",
    "kickoff_utc",
];
const LEGACY_MATCH_MARKERS: &[&str] = &["date", "url", "home_team", "away_team", "venue", "broadcasters"];
const CURRENT_COMPETITION_MARKERS: &[&str] = &["logo_url", "logo_repo_path", "license_key", "team_ids"];

static SHORT_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z][a-z0-9]{0,7}(-div[0-9]+)?$").expect("static pattern")
});
static LONG_SLUG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]+([-_][a-z0-9]+)+$").expect("static pattern")
});

/// Holds the known schema versions and answers shape questions about them.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    current_ids: HashSet<&'static str>,
    legacy_ids: HashSet<&'static str>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self {
            current_ids: constants::current_competition_ids().into_iter().collect(),
            legacy_ids: constants::legacy_competition_ids().into_iter().collect(),
        }
    }

    pub fn versions(&self) -> &'static [SchemaVersion] {
        &[SchemaVersion::Legacy, SchemaVersion::Current]
    }

    /// Field table for a record of `resource` under `version`.
    ///
    /// Teams only exist in the current schema.
    pub fn fields(&self, version: SchemaVersion, resource: ResourceKind) -> Option<&'static [FieldSpec]> {
        match (version, resource) {
            (SchemaVersion::Legacy, ResourceKind::Competitions) => Some(LEGACY_COMPETITION_FIELDS),
            (SchemaVersion::Current, ResourceKind::Competitions) => Some(CURRENT_COMPETITION_FIELDS),
            (SchemaVersion::Legacy, ResourceKind::Teams) => None,
            (SchemaVersion::Current, ResourceKind::Teams) => Some(CURRENT_TEAM_FIELDS),
            (SchemaVersion::Legacy, ResourceKind::Matches) => Some(LEGACY_MATCH_FIELDS),
            (SchemaVersion::Current, ResourceKind::Matches) => Some(CURRENT_MATCH_FIELDS),
        }
    }

    /// Detect the schema version of one record. `None` means unknown.
    pub fn detect_version(&self, resource: ResourceKind, record: &Value) -> Option<SchemaVersion> {
        let obj = record.as_object()?;
        match resource {
            ResourceKind::Matches => detect_match(obj),
            ResourceKind::Competitions => self.detect_competition(obj),
            ResourceKind::Teams => detect_team(obj),
        }
    }

    fn detect_competition(&self, obj: &Map<String, Value>) -> Option<SchemaVersion> {
        if CURRENT_COMPETITION_MARKERS.iter().any(|k| obj.contains_key(*k)) {
            return Some(SchemaVersion::Current);
        }

        let id = obj.get("id")?.as_str()?;
        let is_current = self.current_ids.contains(id);
        let is_legacy = self.legacy_ids.contains(id);

        match (is_current, is_legacy) {
            (true, false) => Some(SchemaVersion::Current),
            (false, true) => Some(SchemaVersion::Legacy),
            // Same spelling in both tables: the data path layout tells them apart
            (true, true) => Some(if uses_flat_match_files(obj) {
                SchemaVersion::Legacy
            } else {
                SchemaVersion::Current
            }),
            (false, false) => {
                if SHORT_CODE.is_match(id) {
                    Some(SchemaVersion::Current)
                } else if LONG_SLUG.is_match(id) {
                    Some(SchemaVersion::Legacy)
                } else {
                    None
                }
            }
        }
    }

    pub fn is_short_code(&self, id: &str) -> bool {
        SHORT_CODE.is_match(id)
    }
}

fn detect_match(obj: &Map<String, Value>) -> Option<SchemaVersion> {
    if CURRENT_MATCH_MARKERS.iter().any(|k| obj.contains_key(*k)) {
        return Some(SchemaVersion::Current);
    }
    if LEGACY_MATCH_MARKERS.iter().any(|k| obj.contains_key(*k)) {
        return Some(SchemaVersion::Legacy);
    }
    None
}

fn detect_team(obj: &Map<String, Value>) -> Option<SchemaVersion> {
    if obj.contains_key("competition_id") || obj.contains_key("name") {
        Some(SchemaVersion::Current)
    } else {
        None
    }
}

/// Legacy competitions point at `data/matches/{id}.json` files; current ones
/// at `data/matches/{id}` directories.
fn uses_flat_match_files(obj: &Map<String, Value>) -> bool {
    obj.get("data_paths")
        .and_then(|v| v.as_array())
        .map(|paths| {
            paths
                .iter()
                .filter_map(|p| p.as_str())
                .any(|p| p.ends_with(".json"))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detects_current_match() {
        let registry = SchemaRegistry::new();
        let record = json!({
            "match_id": "m6n-2026-rd1-1",
            "competition_id": "m6n",
            "kickoff": "2026-02-05T20:10:00+01:00",
            "home_team": "France",
            "home_team_id": "NT-M-FRA",
            "away_team": "Ireland",
        });
        assert_eq!(
            registry.detect_version(ResourceKind::Matches, &record),
            Some(SchemaVersion::Current)
        );
    }

    #[test]
    fn test_detects_legacy_match() {
        let registry = SchemaRegistry::new();
        let record = json!({
            "date": "2024-12-21 12:10:00",
            "venue": "Suzuka",
            "home_team": "Mie Honda Heat",
            "away_team": "Black Rams Tokyo",
            "broadcasters": "J SPORTS 3",
            "url": "https://league-one.jp/match/27447",
        });
        assert_eq!(
            registry.detect_version(ResourceKind::Matches, &record),
            Some(SchemaVersion::Legacy)
        );
    }

    #[test]
    fn test_unknown_shapes() {
        let registry = SchemaRegistry::new();
        assert_eq!(registry.detect_version(ResourceKind::Matches, &json!({ "foo": 1 })), None);
        assert_eq!(registry.detect_version(ResourceKind::Matches, &json!("text")), None);
        assert_eq!(
            registry.detect_version(ResourceKind::Competitions, &json!({ "id": "Not An Id!" })),
            None
        );
    }

    #[test]
    fn test_competition_detection_by_id_table() {
        let registry = SchemaRegistry::new();
        assert_eq!(
            registry.detect_version(ResourceKind::Competitions, &json!({ "id": "six-nations" })),
            Some(SchemaVersion::Legacy)
        );
        assert_eq!(
            registry.detect_version(ResourceKind::Competitions, &json!({ "id": "m6n" })),
            Some(SchemaVersion::Current)
        );
        assert_eq!(
            registry.detect_version(
                ResourceKind::Competitions,
                &json!({ "id": "urc", "data_paths": ["data/matches/urc.json"] })
            ),
            Some(SchemaVersion::Legacy)
        );
        assert_eq!(
            registry.detect_version(
                ResourceKind::Competitions,
                &json!({ "id": "urc", "data_paths": ["data/matches/urc"] })
            ),
            Some(SchemaVersion::Current)
        );
    }

    #[test]
    fn test_branding_fields_imply_current() {
        let registry = SchemaRegistry::new();
        let record = json!({ "id": "six-nations", "logo_url": "https://example.org/6n.png" });
        assert_eq!(
            registry.detect_version(ResourceKind::Competitions, &record),
            Some(SchemaVersion::Current)
        );
    }

    #[test]
    fn test_unlisted_ids_fall_back_to_patterns() {
        let registry = SchemaRegistry::new();
        assert_eq!(
            registry.detect_version(ResourceKind::Competitions, &json!({ "id": "pacific-nations-cup" })),
            Some(SchemaVersion::Legacy)
        );
        assert_eq!(
            registry.detect_version(ResourceKind::Competitions, &json!({ "id": "pnc" })),
            Some(SchemaVersion::Current)
        );
    }

    #[test]
    fn test_teams_have_no_legacy_table() {
        let registry = SchemaRegistry::new();
        assert!(registry.fields(SchemaVersion::Legacy, ResourceKind::Teams).is_none());
        assert!(registry.fields(SchemaVersion::Current, ResourceKind::Teams).is_some());
    }

    #[test]
    fn test_aliases_resolve_legacy_field_names() {
        let spec = LEGACY_MATCH_FIELDS[0];
        let record = json!({ "date": "2024-12-21 12:10:00" });
        let (key, value) = spec.lookup(record.as_object().unwrap()).unwrap();
        assert_eq!(key, "date");
        assert_eq!(value, "2024-12-21 12:10:00");
    }
}
