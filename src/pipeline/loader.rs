//! Dataset loading: detect, validate, resolve and normalize a batch of
//! payloads into one snapshot plus the diagnostics for every record that
//! was excluded or adjusted on the way.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::{CrossReferencePolicy, LoaderConfig};
use crate::domain::{Competition, Match, Team};
use crate::error::{IngestError, Result};
use crate::observability::metrics;
use crate::pipeline::ingestion::{RawRecord, ResourceKind, SourcePayload};
use crate::pipeline::processing::diagnostics::{Diagnostic, DiagnosticKind, RecordLocation, Severity};
use crate::pipeline::processing::identifiers::{IdentifierMapper, MatchIdAllocator};
use crate::pipeline::processing::normalize::{effective_season, MatchKeys, Normalizer};
use crate::pipeline::processing::schema::{SchemaRegistry, SchemaVersion};
use crate::pipeline::processing::summary::{check_summary, derive_summary};
use crate::pipeline::processing::teams::duplicate_candidates;
use crate::pipeline::processing::validate::{self, RawCompetition, RawMatch, RawTeam, TypedRecord};
use crate::pipeline::snapshot::{Dataset, LoadStats};

/// Which diagnostics make a caller refuse a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcceptancePolicy {
    /// Kinds that reject regardless of severity
    pub reject_kinds: BTreeSet<DiagnosticKind>,
    /// Any diagnostic at or above this severity rejects
    pub reject_at: Option<Severity>,
}

impl AcceptancePolicy {
    /// Accept every snapshot
    pub fn permissive() -> Self {
        Self::default()
    }

    pub fn reject_on(kinds: impl IntoIterator<Item = DiagnosticKind>) -> Self {
        Self {
            reject_kinds: kinds.into_iter().collect(),
            reject_at: None,
        }
    }

    pub fn with_severity_threshold(mut self, severity: Severity) -> Self {
        self.reject_at = Some(severity);
        self
    }

    fn rejects(&self, diagnostic: &Diagnostic) -> bool {
        self.reject_kinds.contains(&diagnostic.kind)
            || self.reject_at.map_or(false, |threshold| diagnostic.severity >= threshold)
    }

    /// `Err(Rejected)` naming the first offending kind and how often it occurs.
    pub fn evaluate(&self, diagnostics: &[Diagnostic]) -> Result<()> {
        for kind in DiagnosticKind::all() {
            let count = diagnostics
                .iter()
                .filter(|d| d.kind == kind && self.rejects(d))
                .count();
            if count > 0 {
                return Err(IngestError::Rejected { kind, count });
            }
        }
        Ok(())
    }
}

/// Result of one load: the snapshot and everything said about its inputs
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub dataset: Dataset,
    /// Ordered by payload, then record, then emission
    pub diagnostics: Vec<Diagnostic>,
}

impl LoadReport {
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics.iter().filter(|d| d.kind == kind).count()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    /// Hand out the snapshot if `policy` accepts the diagnostics.
    pub fn accept(self, policy: &AcceptancePolicy) -> Result<Dataset> {
        policy.evaluate(&self.diagnostics)?;
        Ok(self.dataset)
    }
}

/// One record that survived detection and validation
#[derive(Debug)]
struct Examined {
    location: RecordLocation,
    version: SchemaVersion,
    record: TypedRecord,
}

#[derive(Debug)]
struct ExaminedPayload {
    resource: ResourceKind,
    competition_hint: Option<String>,
    records: Vec<Examined>,
    diagnostics: Vec<Diagnostic>,
    records_seen: usize,
    by_version: Vec<String>,
    rejected: usize,
}

#[derive(Debug)]
struct Indexed<T> {
    entity: T,
    version: SchemaVersion,
    location: RecordLocation,
}

/// Orchestrates a load over a batch of already-decoded payloads.
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    registry: SchemaRegistry,
    mapper: IdentifierMapper,
    normalizer: Normalizer,
    config: LoaderConfig,
}

impl Default for DatasetLoader {
    fn default() -> Self {
        Self::new(LoaderConfig::default())
    }
}

impl DatasetLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            registry: SchemaRegistry::new(),
            mapper: IdentifierMapper::new(),
            normalizer: Normalizer::new(config.fill_match_timezone),
            config,
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Load a batch. Never fails: bad records become diagnostics and the
    /// snapshot holds everything that could be kept.
    pub fn load(&self, payloads: &[SourcePayload]) -> LoadReport {
        let started = Instant::now();
        info!("Loading {} payload(s)", payloads.len());

        // Detection and validation only read fixed tables, so payloads are independent
        let examined: Vec<ExaminedPayload> = if self.config.parallel {
            payloads
                .par_iter()
                .enumerate()
                .map(|(i, payload)| self.examine(i, payload))
                .collect()
        } else {
            payloads
                .iter()
                .enumerate()
                .map(|(i, payload)| self.examine(i, payload))
                .collect()
        };

        let mut aggregation = Aggregation::new(self, &examined);
        for payload in &examined {
            aggregation.absorb_examination(payload);
        }
        aggregation.index_competitions(&examined);
        aggregation.index_teams(&examined);
        aggregation.link_team_ids();
        aggregation.flag_duplicate_teams();
        aggregation.load_matches(&examined);
        if self.config.check_data_summary && aggregation.has_resource(ResourceKind::Matches) {
            aggregation.check_summaries();
        }
        let report = aggregation.finish();

        let elapsed = started.elapsed().as_secs_f64();
        metrics::loader::duration(elapsed);
        info!(
            "Loaded {} competitions, {} teams, {} matches with {} diagnostic(s) in {:.3}s",
            report.dataset.competitions().count(),
            report.dataset.teams().count(),
            report.dataset.matches().len(),
            report.diagnostics.len(),
            elapsed
        );
        report
    }

    fn examine(&self, payload_index: usize, payload: &SourcePayload) -> ExaminedPayload {
        metrics::loader::payload_processed(payload.resource.as_str());

        let mut examined = ExaminedPayload {
            resource: payload.resource,
            competition_hint: payload.competition_hint.clone(),
            records: Vec::new(),
            diagnostics: Vec::new(),
            records_seen: 0,
            by_version: Vec::new(),
            rejected: 0,
        };

        let Some(records) = payload.records() else {
            let location = location_of(payload_index, payload, None);
            examined.diagnostics.push(Diagnostic::new(
                DiagnosticKind::SchemaUnrecognized,
                Severity::Error,
                location,
                format!(
                    "{} payload must be an array of {} records",
                    payload.resource,
                    payload.resource.record_noun()
                ),
            ));
            return examined;
        };

        for record in records {
            examined.records_seen += 1;
            let location = location_of(payload_index, payload, Some(&record));

            let Some(version) = self.registry.detect_version(payload.resource, record.value) else {
                debug!("No schema matches {}{}", payload.origin, location.path);
                examined.rejected += 1;
                examined.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::SchemaUnrecognized,
                    Severity::Error,
                    location,
                    format!("record does not look like any known {} schema", payload.resource.record_noun()),
                ));
                continue;
            };
            metrics::loader::record_detected(payload.resource.as_str(), version.as_str());
            examined.by_version.push(format!("{}/{}", payload.resource, version));

            match validate::validate(&self.registry, &record, payload.resource, version) {
                Ok(validated) => {
                    examined.diagnostics.extend(
                        validated
                            .warnings
                            .into_iter()
                            .map(|issue| Diagnostic::from_issue(issue, location.clone())),
                    );
                    examined.records.push(Examined {
                        location,
                        version,
                        record: validated.record,
                    });
                }
                Err(issues) => {
                    debug!("Invalid {} record at {}{}", version, payload.origin, location.path);
                    examined.rejected += 1;
                    examined.diagnostics.extend(
                        issues
                            .into_iter()
                            .map(|issue| Diagnostic::from_issue(issue, location.clone())),
                    );
                }
            }
        }

        examined
    }
}

fn location_of(payload_index: usize, payload: &SourcePayload, record: Option<&RawRecord<'_>>) -> RecordLocation {
    RecordLocation {
        payload: payload_index,
        record: record.map(|r| r.index),
        origin: payload.origin.clone(),
        resource: payload.resource,
        path: record.map(RawRecord::path).unwrap_or_else(|| "$".to_string()),
    }
}

/// The sequential half of a load: everything that depends on the whole batch.
struct Aggregation<'l> {
    loader: &'l DatasetLoader,
    resources: BTreeSet<ResourceKind>,
    diagnostics: Vec<Diagnostic>,
    stats: LoadStats,
    competitions: BTreeMap<String, Indexed<Competition>>,
    teams: BTreeMap<String, Indexed<Team>>,
    matches: Vec<Match>,
}

impl<'l> Aggregation<'l> {
    fn new(loader: &'l DatasetLoader, examined: &[ExaminedPayload]) -> Self {
        Self {
            loader,
            resources: examined.iter().map(|p| p.resource).collect(),
            diagnostics: Vec::new(),
            stats: LoadStats {
                payloads: examined.len(),
                ..LoadStats::default()
            },
            competitions: BTreeMap::new(),
            teams: BTreeMap::new(),
            matches: Vec::new(),
        }
    }

    fn has_resource(&self, resource: ResourceKind) -> bool {
        self.resources.contains(&resource)
    }

    /// Whether references to `resource` are checked against the index
    fn checks_references_to(&self, resource: ResourceKind) -> bool {
        self.loader.config.cross_reference == CrossReferencePolicy::Strict || self.has_resource(resource)
    }

    fn absorb_examination(&mut self, payload: &ExaminedPayload) {
        self.stats.records_seen += payload.records_seen;
        self.stats.excluded_records += payload.rejected;
        for key in &payload.by_version {
            *self.stats.records_by_version.entry(key.clone()).or_insert(0) += 1;
        }
        self.diagnostics.extend(payload.diagnostics.iter().cloned());
        for _ in 0..payload.rejected {
            metrics::loader::record_excluded(payload.resource.as_str());
        }
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Record a diagnostic for a record that does not make it into the snapshot.
    fn exclude(&mut self, diagnostic: Diagnostic) {
        warn!("Excluding record: {}", diagnostic);
        metrics::loader::record_excluded(diagnostic.location.resource.as_str());
        self.stats.excluded_records += 1;
        self.diagnostics.push(diagnostic);
    }

    fn index_competitions(&mut self, examined: &[ExaminedPayload]) {
        for payload in examined.iter().filter(|p| p.resource == ResourceKind::Competitions) {
            for item in &payload.records {
                if let TypedRecord::Competition(raw) = &item.record {
                    self.index_competition(raw.clone(), item);
                }
            }
        }
    }

    fn index_competition(&mut self, raw: RawCompetition, item: &Examined) {
        let Some(id) = self.loader.mapper.resolve_competition(&raw.id, item.version) else {
            self.exclude(
                Diagnostic::new(
                    DiagnosticKind::IdentifierUnresolved,
                    Severity::Error,
                    item.location.clone(),
                    format!("legacy competition id '{}' has no current mapping", raw.id),
                )
                .with_field("id"),
            );
            return;
        };
        if id != raw.id {
            debug!("Competition '{}' resolved to '{}'", raw.id, id);
        }

        let normalized = self.loader.normalizer.competition(raw, id.clone());
        for issue in normalized.warnings {
            self.report(Diagnostic::from_issue(issue, item.location.clone()));
        }

        let incoming = Indexed {
            entity: normalized.entity,
            version: item.version,
            location: item.location.clone(),
        };

        match self.competitions.remove(&id) {
            None => {
                self.competitions.insert(id, incoming);
            }
            Some(existing) => {
                // Current records carry more than legacy ones; otherwise the first stays
                let (kept, dropped) =
                    if incoming.version == SchemaVersion::Current && existing.version == SchemaVersion::Legacy {
                        (incoming, existing)
                    } else {
                        (existing, incoming)
                    };
                self.report(
                    Diagnostic::new(
                        DiagnosticKind::DuplicateIdentifier,
                        Severity::Info,
                        dropped.location.clone(),
                        format!(
                            "competition '{}' ({}) merged into the {} record at {}{}",
                            id, dropped.version, kept.version, kept.location.origin, kept.location.path
                        ),
                    )
                    .with_field("id"),
                );
                self.competitions.insert(id, kept);
            }
        }
    }

    fn index_teams(&mut self, examined: &[ExaminedPayload]) {
        let check = self.checks_references_to(ResourceKind::Competitions);
        for payload in examined.iter().filter(|p| p.resource == ResourceKind::Teams) {
            for item in &payload.records {
                if let TypedRecord::Team(raw) = &item.record {
                    self.index_team(raw.clone(), item, check);
                }
            }
        }
    }

    fn index_team(&mut self, raw: RawTeam, item: &Examined, check_competition: bool) {
        let competition_id = self
            .loader
            .mapper
            .resolve_competition(&raw.competition_id, SchemaVersion::Current)
            .unwrap_or_else(|| raw.competition_id.clone());

        if check_competition && !self.competitions.contains_key(&competition_id) {
            self.exclude(
                Diagnostic::new(
                    DiagnosticKind::CrossReferenceBroken,
                    Severity::Error,
                    item.location.clone(),
                    format!("team '{}' references unknown competition '{}'", raw.id, competition_id),
                )
                .with_field("competition_id"),
            );
            return;
        }

        if let Some(existing) = self.teams.get(&raw.id) {
            let message = format!(
                "team '{}' already defined at {}{}; first definition kept",
                raw.id, existing.location.origin, existing.location.path
            );
            self.exclude(
                Diagnostic::new(
                    DiagnosticKind::DuplicateIdentifier,
                    Severity::Warning,
                    item.location.clone(),
                    message,
                )
                .with_field("id"),
            );
            return;
        }

        let team = self.loader.normalizer.team(raw, competition_id);
        self.teams.insert(
            team.id.clone(),
            Indexed {
                entity: team,
                version: item.version,
                location: item.location.clone(),
            },
        );
    }

    /// Complete each competition's `team_ids` from the team index.
    fn link_team_ids(&mut self) {
        let check = self.checks_references_to(ResourceKind::Teams);
        let mut broken = Vec::new();

        for competition in self.competitions.values_mut() {
            let declared = std::mem::take(&mut competition.entity.team_ids);
            for team_id in declared {
                let resolves = self
                    .teams
                    .get(&team_id)
                    .map_or(false, |t| t.entity.competition_id == competition.entity.id);
                if resolves || !check {
                    competition.entity.team_ids.insert(team_id);
                } else {
                    broken.push(
                        Diagnostic::new(
                            DiagnosticKind::CrossReferenceBroken,
                            Severity::Warning,
                            competition.location.clone(),
                            format!(
                                "team_ids entry '{}' is not a team of '{}'; dropped",
                                team_id, competition.entity.id
                            ),
                        )
                        .with_field("team_ids"),
                    );
                }
            }
        }

        for team in self.teams.values() {
            if let Some(competition) = self.competitions.get_mut(&team.entity.competition_id) {
                competition.entity.team_ids.insert(team.entity.id.clone());
            }
        }

        for diagnostic in broken {
            self.report(diagnostic);
        }
    }

    fn flag_duplicate_teams(&mut self) {
        let groups = duplicate_candidates(self.teams.values().map(|t| &t.entity));
        for group in groups {
            let Some(first) = group.team_ids.first().and_then(|id| self.teams.get(id)) else {
                continue;
            };
            let diagnostic = Diagnostic::new(
                DiagnosticKind::DuplicateTeamCandidate,
                Severity::Info,
                first.location.clone(),
                format!(
                    "teams {:?} of '{}' share the base name '{}'",
                    group.team_ids, group.competition_id, group.base_name
                ),
            )
            .with_field("name");
            self.report(diagnostic);
        }
    }

    fn load_matches(&mut self, examined: &[ExaminedPayload]) {
        let mut allocator = self.loader.mapper.match_id_allocator(self.loader.config.match_id_strategy);
        let match_payloads: Vec<&ExaminedPayload> =
            examined.iter().filter(|p| p.resource == ResourceKind::Matches).collect();

        // Published ids are never handed out again by synthesis
        for payload in &match_payloads {
            for item in &payload.records {
                if let TypedRecord::Match(RawMatch { match_id: Some(id), .. }) = &item.record {
                    allocator.reserve(id);
                }
            }
        }

        let check_competition = self.checks_references_to(ResourceKind::Competitions);
        let mut seen_ids: BTreeMap<String, RecordLocation> = BTreeMap::new();

        for payload in match_payloads {
            for item in &payload.records {
                if let TypedRecord::Match(raw) = &item.record {
                    self.load_match(
                        raw.clone(),
                        item,
                        payload.competition_hint.as_deref(),
                        check_competition,
                        &mut allocator,
                        &mut seen_ids,
                    );
                }
            }
        }
    }

    fn resolve_match_competition(&self, raw: &RawMatch, hint: Option<&str>) -> std::result::Result<String, String> {
        match raw.version {
            SchemaVersion::Current => {
                let id = raw.competition_id.as_deref().unwrap_or_default();
                self.loader
                    .mapper
                    .resolve_competition(id, SchemaVersion::Current)
                    .ok_or_else(|| format!("competition id '{}' cannot be resolved", id))
            }
            SchemaVersion::Legacy => {
                let Some(id) = raw.competition_id.as_deref().or(hint) else {
                    return Err("legacy match has no competition id and its payload carries no hint".to_string());
                };
                self.loader
                    .mapper
                    .resolve_competition(id, SchemaVersion::Legacy)
                    .or_else(|| self.competitions.contains_key(id).then(|| id.to_string()))
                    .ok_or_else(|| format!("legacy competition id '{}' has no current mapping", id))
            }
        }
    }

    fn load_match(
        &mut self,
        raw: RawMatch,
        item: &Examined,
        hint: Option<&str>,
        check_competition: bool,
        allocator: &mut MatchIdAllocator,
        seen_ids: &mut BTreeMap<String, RecordLocation>,
    ) {
        let competition_id = match self.resolve_match_competition(&raw, hint) {
            Ok(id) => id,
            Err(message) => {
                self.exclude(
                    Diagnostic::new(
                        DiagnosticKind::IdentifierUnresolved,
                        Severity::Error,
                        item.location.clone(),
                        message,
                    )
                    .with_field("competition_id"),
                );
                return;
            }
        };

        if check_competition && !self.competitions.contains_key(&competition_id) {
            self.exclude(
                Diagnostic::new(
                    DiagnosticKind::CrossReferenceBroken,
                    Severity::Error,
                    item.location.clone(),
                    format!("match references unknown competition '{}'", competition_id),
                )
                .with_field("competition_id"),
            );
            return;
        }

        let season = effective_season(&raw);
        let match_id = match raw.match_id.clone() {
            Some(id) => id,
            None => {
                let id = allocator.allocate(&competition_id, &season, &raw.home_team, &raw.away_team, &raw.kickoff);
                self.stats.synthesized_match_ids += 1;
                metrics::loader::match_id_synthesized();
                id
            }
        };

        if let Some(first) = seen_ids.get(&match_id) {
            let message = format!(
                "match '{}' already loaded from {}{}; first kept",
                match_id, first.origin, first.path
            );
            self.exclude(
                Diagnostic::new(
                    DiagnosticKind::DuplicateIdentifier,
                    Severity::Warning,
                    item.location.clone(),
                    message,
                )
                .with_field("match_id"),
            );
            return;
        }
        seen_ids.insert(match_id.clone(), item.location.clone());

        let keys = MatchKeys {
            match_id,
            competition_id,
            season,
        };
        let competition = self.competitions.get(&keys.competition_id).map(|c| &c.entity);
        let mut normalized = self.loader.normalizer.match_record(raw, keys, competition);

        self.check_team_reference(&mut normalized, item, TeamSide::Home);
        self.check_team_reference(&mut normalized, item, TeamSide::Away);

        if !normalized.has_known_status() {
            metrics::loader::unknown_status(&normalized.status);
            *self
                .stats
                .unknown_statuses
                .entry(normalized.status.clone())
                .or_insert(0) += 1;
        }

        debug!("Loaded match {}", normalized.match_id);
        self.matches.push(normalized);
    }

    /// A team id that does not resolve inside the match's competition is
    /// cleared; the match itself is kept. Ids are left alone when the batch
    /// carries no teams and the policy is not strict.
    fn check_team_reference(&mut self, m: &mut Match, item: &Examined, side: TeamSide) {
        if !self.checks_references_to(ResourceKind::Teams) {
            return;
        }
        let (field, team_id) = match side {
            TeamSide::Home => ("home_team_id", &mut m.home_team_id),
            TeamSide::Away => ("away_team_id", &mut m.away_team_id),
        };
        if team_id.is_empty() {
            return;
        }

        let problem = match self.teams.get(team_id.as_str()) {
            None => format!("team '{}' is not in the team index", team_id),
            Some(team) if team.entity.competition_id != m.competition_id => format!(
                "team '{}' belongs to '{}', not '{}'",
                team_id, team.entity.competition_id, m.competition_id
            ),
            Some(_) => return,
        };

        team_id.clear();
        self.report(
            Diagnostic::new(
                DiagnosticKind::CrossReferenceBroken,
                Severity::Error,
                item.location.clone(),
                format!("{}; reference cleared", problem),
            )
            .with_field(field),
        );
    }

    fn check_summaries(&mut self) {
        let mut findings = Vec::new();
        for competition in self.competitions.values() {
            let derived = derive_summary(
                self.matches
                    .iter()
                    .filter(|m| m.competition_id == competition.entity.id),
            );
            for issue in check_summary(&competition.entity, &derived) {
                findings.push(Diagnostic::from_issue(issue, competition.location.clone()));
            }
        }
        self.diagnostics.extend(findings);
    }

    fn finish(mut self) -> LoadReport {
        // Stable: findings for one record keep their emission order
        self.diagnostics.sort_by(|a, b| {
            (a.location.payload, a.location.record).cmp(&(b.location.payload, b.location.record))
        });
        for diagnostic in &self.diagnostics {
            metrics::loader::diagnostic(diagnostic.kind.as_str(), diagnostic.severity.as_str());
        }

        let competitions = self
            .competitions
            .into_iter()
            .map(|(id, indexed)| (id, indexed.entity))
            .collect();
        let teams = self
            .teams
            .into_iter()
            .map(|(id, indexed)| (id, indexed.entity))
            .collect();

        LoadReport {
            dataset: Dataset::from_parts(competitions, teams, self.matches, self.stats),
            diagnostics: self.diagnostics,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum TeamSide {
    Home,
    Away,
}
