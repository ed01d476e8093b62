use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::debug;

use crate::domain::{Competition, DataSummary, Match, Team};
use crate::pipeline::processing::summary::derive_summary;

/// Counters gathered during one load
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub payloads: usize,
    pub records_seen: usize,
    /// Records per `{resource}/{version}`, e.g. `matches/legacy`
    pub records_by_version: BTreeMap<String, usize>,
    pub excluded_records: usize,
    pub synthesized_match_ids: usize,
    /// Match statuses outside the known set, with their counts
    pub unknown_statuses: BTreeMap<String, usize>,
}

/// One fully aggregated, internally consistent load result.
///
/// Competitions and teams are keyed by id; matches keep batch order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Dataset {
    competitions: BTreeMap<String, Competition>,
    teams: BTreeMap<String, Team>,
    matches: Vec<Match>,
    #[serde(skip)]
    match_index: HashMap<String, usize>,
    stats: LoadStats,
}

impl Dataset {
    pub(crate) fn from_parts(
        competitions: BTreeMap<String, Competition>,
        teams: BTreeMap<String, Team>,
        matches: Vec<Match>,
        stats: LoadStats,
    ) -> Self {
        let match_index = matches
            .iter()
            .enumerate()
            .map(|(i, m)| (m.match_id.clone(), i))
            .collect();
        Self {
            competitions,
            teams,
            matches,
            match_index,
            stats,
        }
    }

    pub fn competition(&self, id: &str) -> Option<&Competition> {
        self.competitions.get(id)
    }

    pub fn competitions(&self) -> impl Iterator<Item = &Competition> {
        self.competitions.values()
    }

    pub fn team(&self, id: &str) -> Option<&Team> {
        self.teams.get(id)
    }

    pub fn teams(&self) -> impl Iterator<Item = &Team> {
        self.teams.values()
    }

    pub fn teams_for<'a>(&'a self, competition_id: &'a str) -> impl Iterator<Item = &'a Team> + 'a {
        self.teams.values().filter(move |t| t.competition_id == competition_id)
    }

    pub fn match_by_id(&self, match_id: &str) -> Option<&Match> {
        self.match_index.get(match_id).map(|&i| &self.matches[i])
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn matches_for<'a>(&'a self, competition_id: &'a str) -> impl Iterator<Item = &'a Match> + 'a {
        self.matches.iter().filter(move |m| m.competition_id == competition_id)
    }

    /// Summary computed from the matches actually loaded for a competition
    pub fn derived_summary(&self, competition_id: &str) -> DataSummary {
        derive_summary(self.matches_for(competition_id))
    }

    pub fn stats(&self) -> &LoadStats {
        &self.stats
    }

    pub fn is_empty(&self) -> bool {
        self.competitions.is_empty() && self.teams.is_empty() && self.matches.is_empty()
    }
}

/// Holds the published snapshot. Readers get the whole previous or the whole
/// next dataset, never a mix.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: RwLock<Arc<Dataset>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Arc<Dataset> {
        let guard = self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&*guard)
    }

    /// Replace the published snapshot and return the one it replaced.
    pub fn publish(&self, dataset: Dataset) -> Arc<Dataset> {
        let next = Arc::new(dataset);
        let mut guard = self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        debug!(
            "Publishing snapshot: {} competitions, {} teams, {} matches",
            next.competitions.len(),
            next.teams.len(),
            next.matches.len()
        );
        std::mem::replace(&mut *guard, next)
    }
}
