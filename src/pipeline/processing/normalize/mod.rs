use std::collections::BTreeSet;

use crate::domain::{Competition, Match, SeasonPattern, Team};
use crate::pipeline::processing::diagnostics::{DiagnosticKind, FieldIssue};
use crate::pipeline::processing::identifiers::UNKNOWN_SEASON;
use crate::pipeline::processing::schema::timestamp::{parse_timestamp, year_of};
use crate::pipeline::processing::schema::SchemaVersion;
use crate::pipeline::processing::validate::{Broadcasters, RawCompetition, RawMatch, RawTeam};

/// A canonical entity plus the non-fatal findings made while building it
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<T> {
    pub entity: T,
    pub warnings: Vec<FieldIssue>,
}

/// Identifiers a match needs before it can be normalized. The loader resolves
/// them because they depend on the rest of the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchKeys {
    pub match_id: String,
    pub competition_id: String,
    pub season: String,
}

/// The one place where version-specific coercion happens.
#[derive(Debug, Clone)]
pub struct Normalizer {
    /// Give legacy matches without a timezone their competition's default zone
    pub fill_match_timezone: bool,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            fill_match_timezone: true,
        }
    }
}

impl Normalizer {
    pub fn new(fill_match_timezone: bool) -> Self {
        Self { fill_match_timezone }
    }

    /// Build a canonical competition under its resolved id.
    ///
    /// Legacy `teams` display names stay informational; `team_ids` only ever
    /// come from the record itself or the team index.
    pub fn competition(&self, raw: RawCompetition, id: String) -> Normalized<Competition> {
        let mut warnings = Vec::new();

        let data_summary = raw.data_summary.unwrap_or_default();
        let range = &data_summary.date_range;
        if let (Some(start), Some(end)) = (parse_timestamp(&range.start), parse_timestamp(&range.end)) {
            if start > end {
                warnings.push(FieldIssue::warning(
                    DiagnosticKind::SummaryInconsistent,
                    "data_summary.date_range",
                    format!("start '{}' is after end '{}'", range.start, range.end),
                ));
            }
        }

        let team_ids: BTreeSet<String> = match raw.version {
            SchemaVersion::Current => raw.team_ids.into_iter().collect(),
            SchemaVersion::Legacy => BTreeSet::new(),
        };

        let entity = Competition {
            id,
            name: raw.name,
            short_name: raw.short_name.unwrap_or_default(),
            sport: raw.sport.unwrap_or_default(),
            category: raw.category,
            gender: raw.gender,
            age_grade: raw.age_grade,
            tier: raw.tier,
            region: raw.region.unwrap_or_default(),
            governing_body: raw.governing_body.unwrap_or_default(),
            organizer: raw.organizer.unwrap_or_default(),
            official_sites: raw.official_sites,
            official_feeds: raw.official_feeds,
            timezone_default: raw.timezone_default.unwrap_or_default(),
            season_pattern: raw.season_pattern.unwrap_or(SeasonPattern::Annual),
            match_url_template: raw.match_url_template.unwrap_or_default(),
            data_paths: raw.data_paths,
            coverage: raw.coverage.unwrap_or_default(),
            teams: raw.teams,
            team_ids,
            data_summary,
            logo_url: raw.logo_url,
            logo_repo_path: raw.logo_repo_path,
            license_key: raw.license_key,
        };

        Normalized { entity, warnings }
    }

    pub fn team(&self, raw: RawTeam, competition_id: String) -> Team {
        Team {
            id: raw.id,
            competition_id,
            name: raw.name,
            name_ja: raw.name_ja.unwrap_or_default(),
            short_name: raw.short_name.unwrap_or_default(),
            country: raw.country.unwrap_or_default(),
            division: raw.division.unwrap_or_default(),
            logo_url: raw.logo_url.unwrap_or_default(),
            badge_url: raw.badge_url.unwrap_or_default(),
        }
    }

    /// Build a canonical match. `competition` is the indexed competition the
    /// match belongs to, when there is one.
    pub fn match_record(&self, raw: RawMatch, keys: MatchKeys, competition: Option<&Competition>) -> Match {
        let timezone = match raw.timezone {
            Some(tz) => tz,
            None if self.fill_match_timezone && raw.version == SchemaVersion::Legacy => competition
                .map(|c| c.timezone_default.clone())
                .unwrap_or_default(),
            None => String::new(),
        };

        Match {
            match_id: keys.match_id,
            competition_id: keys.competition_id,
            season: keys.season,
            round: raw.round.unwrap_or_default(),
            status: raw.status.unwrap_or_default(),
            kickoff: raw.kickoff,
            kickoff_utc: raw.kickoff_utc.unwrap_or_default(),
            timezone,
            venue: raw.venue.unwrap_or_default(),
            home_team: raw.home_team,
            away_team: raw.away_team,
            home_team_id: raw.home_team_id.unwrap_or_default(),
            away_team_id: raw.away_team_id.unwrap_or_default(),
            match_url: raw.match_url.unwrap_or_default(),
            broadcasters: broadcaster_list(raw.broadcasters),
            division: raw.division,
        }
    }
}

/// Canonical broadcaster list: a single string becomes one element, empty
/// entries are dropped.
pub fn broadcaster_list(broadcasters: Broadcasters) -> Vec<String> {
    match broadcasters {
        Broadcasters::Absent => Vec::new(),
        Broadcasters::Text(s) if s.trim().is_empty() => Vec::new(),
        Broadcasters::Text(s) => vec![s],
        Broadcasters::List(items) => items.into_iter().filter(|b| !b.trim().is_empty()).collect(),
    }
}

/// Season as published, else the kickoff year.
pub fn effective_season(raw: &RawMatch) -> String {
    raw.season
        .clone()
        .or_else(|| year_of(&raw.kickoff))
        .unwrap_or_else(|| UNKNOWN_SEASON.to_string())
}
