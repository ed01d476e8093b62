use std::collections::BTreeMap;

use serde_json::{json, Value};

use rugby_ingest::config::{CrossReferencePolicy, LoaderConfig};
use rugby_ingest::domain::Team;
use rugby_ingest::pipeline::processing::diagnostics::{DiagnosticKind, Severity};
use rugby_ingest::pipeline::processing::identifiers::MatchIdStrategy;
use rugby_ingest::{DatasetLoader, LoadReport, ResourceKind, SnapshotStore, SourcePayload};

fn sequential() -> DatasetLoader {
    DatasetLoader::new(LoaderConfig {
        parallel: false,
        ..LoaderConfig::default()
    })
}

fn fixture(origin: &str, resource: ResourceKind, content: &str) -> SourcePayload {
    SourcePayload::from_slice(origin, resource, content.as_bytes()).unwrap()
}

fn fixture_batch() -> Vec<SourcePayload> {
    vec![
        fixture(
            "data/competitions.legacy.json",
            ResourceKind::Competitions,
            include_str!("resources/competitions_legacy.json"),
        ),
        fixture(
            "data/competitions.json",
            ResourceKind::Competitions,
            include_str!("resources/competitions_current.json"),
        ),
        fixture("data/teams.json", ResourceKind::Teams, include_str!("resources/teams.json")),
        fixture(
            "data/matches/six-nations.json",
            ResourceKind::Matches,
            include_str!("resources/matches_six-nations_legacy.json"),
        )
        .with_competition_hint("six-nations"),
        fixture(
            "data/matches/m6n/2026.json",
            ResourceKind::Matches,
            include_str!("resources/matches_m6n_2026.json"),
        )
        .with_competition_hint("m6n"),
    ]
}

fn count_at(report: &LoadReport, kind: DiagnosticKind, severity: Severity) -> usize {
    report
        .diagnostics
        .iter()
        .filter(|d| d.kind == kind && d.severity == severity)
        .count()
}

#[test]
fn test_missing_required_field_excludes_only_that_record() {
    let payload = SourcePayload::new(
        "data/matches/six-nations.json",
        ResourceKind::Matches,
        json!([
            { "date": "2026-02-05 21:10:00", "home_team": "France", "away_team": "Ireland" },
            { "date": "2026-02-07 14:10:00", "away_team": "Scotland" }
        ]),
    )
    .with_competition_hint("six-nations");

    let report = sequential().load(&[payload]);

    assert_eq!(report.diagnostics.len(), 1);
    let diagnostic = &report.diagnostics[0];
    assert_eq!(diagnostic.kind, DiagnosticKind::FieldMissing);
    assert_eq!(diagnostic.severity, Severity::Error);
    assert_eq!(diagnostic.location.record, Some(1));
    assert_eq!(diagnostic.field.as_deref(), Some("home_team"));

    assert_eq!(report.dataset.matches().len(), 1);
    assert_eq!(report.dataset.matches()[0].home_team, "France");
    assert_eq!(report.dataset.stats().excluded_records, 1);
}

#[test]
fn test_legacy_and_current_competition_collapse_to_one() {
    let legacy = SourcePayload::new(
        "legacy/competitions.json",
        ResourceKind::Competitions,
        json!([{
            "id": "six-nations",
            "name": "Six Nations Championship",
            "category": "international",
            "gender": "men",
            "age_grade": "senior",
            "tier": "tier-1",
            "teams": ["England"]
        }]),
    );
    let current = SourcePayload::new(
        "data/competitions.json",
        ResourceKind::Competitions,
        json!([{
            "id": "m6n",
            "name": "Guinness Men's Six Nations",
            "category": "international",
            "gender": "men",
            "age_grade": "senior",
            "tier": "tier-1",
            "team_ids": [],
            "logo_url": "https://www.sixnationsrugby.com/logo.png"
        }]),
    );

    let report = sequential().load(&[legacy, current]);

    let ids: Vec<&str> = report.dataset.competitions().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["m6n"]);
    let m6n = report.dataset.competition("m6n").unwrap();
    assert_eq!(m6n.name, "Guinness Men's Six Nations");
    assert_eq!(m6n.logo_url.as_deref(), Some("https://www.sixnationsrugby.com/logo.png"));

    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].kind, DiagnosticKind::DuplicateIdentifier);
    assert_eq!(report.diagnostics[0].severity, Severity::Info);
    assert_eq!(report.diagnostics[0].location.payload, 0);
}

#[test]
fn test_full_batch_from_fixtures() {
    let report = sequential().load(&fixture_batch());
    let dataset = &report.dataset;

    let competitions: Vec<&str> = dataset.competitions().map(|c| c.id.as_str()).collect();
    assert_eq!(competitions, vec!["jrlo-div1", "m6n"]);
    assert_eq!(dataset.teams().count(), 6);
    assert_eq!(dataset.matches().len(), 5);

    let m6n = dataset.competition("m6n").unwrap();
    let team_ids: Vec<&str> = m6n.team_ids.iter().map(String::as_str).collect();
    assert_eq!(team_ids, vec!["NT-M-ENG", "NT-M-FRA", "NT-M-IRE"]);
    assert_eq!(m6n.coverage.broadcast_regions.len(), 2);
    assert_eq!(m6n.coverage.notes.as_deref(), Some("Free-to-air in the UK"));

    let jrlo = dataset.competition("jrlo-div1").unwrap();
    assert_eq!(jrlo.team_ids.len(), 3);
    assert_eq!(jrlo.license_key.as_deref(), Some("jrlo-logo-2025"));

    assert_eq!(count_at(&report, DiagnosticKind::DuplicateIdentifier, Severity::Info), 2);
    assert_eq!(count_at(&report, DiagnosticKind::CrossReferenceBroken, Severity::Warning), 1);
    assert_eq!(count_at(&report, DiagnosticKind::CrossReferenceBroken, Severity::Error), 1);
    assert_eq!(report.count(DiagnosticKind::DuplicateTeamCandidate), 1);
    assert_eq!(report.diagnostics.len(), 5);

    let stats = dataset.stats();
    assert_eq!(stats.payloads, 5);
    assert_eq!(stats.records_seen, 4 + 6 + 5);
    assert_eq!(stats.records_by_version.get("competitions/legacy"), Some(&2));
    assert_eq!(stats.records_by_version.get("competitions/current"), Some(&2));
    assert_eq!(stats.records_by_version.get("matches/legacy"), Some(&3));
    assert_eq!(stats.synthesized_match_ids, 3);
    assert_eq!(stats.excluded_records, 0);
}

#[test]
fn test_diagnostics_are_ordered_by_payload_then_record() {
    let report = sequential().load(&fixture_batch());
    let positions: Vec<(usize, Option<usize>)> = report
        .diagnostics
        .iter()
        .map(|d| (d.location.payload, d.location.record))
        .collect();
    let mut sorted = positions.clone();
    sorted.sort();
    assert_eq!(positions, sorted);
}

#[test]
fn test_kickoff_and_timezone_are_preserved_verbatim() {
    let report = sequential().load(&fixture_batch());
    let dataset = &report.dataset;

    let current = dataset.match_by_id("m6n-2026-rd5-1").unwrap();
    assert_eq!(current.kickoff, "2026-03-14T15:00:00+00:00");
    assert_eq!(current.kickoff_utc, "2026-03-14T15:00:00Z");
    assert_eq!(current.timezone, "Europe/London");

    let dublin = dataset.match_by_id("m6n-2026-rd5-2").unwrap();
    assert_eq!(dublin.timezone, "Europe/Dublin");

    let legacy = dataset.match_by_id("m6n-2026-1").unwrap();
    assert_eq!(legacy.kickoff, "2026-02-05 21:10:00");
    assert_eq!(legacy.kickoff_utc, "");
    // Legacy files carry no timezone; the competition default fills it
    assert_eq!(legacy.timezone, "Europe/London");
    assert_eq!(legacy.season, "2026");
    assert_eq!(legacy.competition_id, "m6n");
}

#[test]
fn test_legacy_broadcasters_become_lists() {
    let report = sequential().load(&fixture_batch());
    let dataset = &report.dataset;

    assert_eq!(dataset.match_by_id("m6n-2026-1").unwrap().broadcasters, vec!["BBC"]);
    assert!(dataset.match_by_id("m6n-2026-2").unwrap().broadcasters.is_empty());
    assert_eq!(
        dataset.match_by_id("m6n-2026-3").unwrap().broadcasters,
        vec!["BBC", "ITV"]
    );
    assert_eq!(dataset.match_by_id("m6n-2026-1").unwrap().match_url, "https://www.sixnationsrugby.com/en/m6n/fixtures/1");
    assert_eq!(dataset.match_by_id("m6n-2026-2").unwrap().match_url, "");
}

#[test]
fn test_unknown_team_reference_is_reported_once_and_cleared() {
    let report = sequential().load(&fixture_batch());

    let broken: Vec<_> = report
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::CrossReferenceBroken && d.severity == Severity::Error)
        .collect();
    assert_eq!(broken.len(), 1);
    assert_eq!(broken[0].field.as_deref(), Some("away_team_id"));
    assert_eq!(broken[0].location.origin, "data/matches/m6n/2026.json");
    assert_eq!(broken[0].location.record, Some(1));

    let m = report.dataset.match_by_id("m6n-2026-rd5-2").unwrap();
    assert_eq!(m.home_team_id, "NT-M-IRE");
    assert_eq!(m.away_team_id, "");
    assert_eq!(m.away_team, "Wales");
}

#[test]
fn test_team_of_another_competition_is_not_linked() {
    let teams = SourcePayload::new(
        "data/teams.json",
        ResourceKind::Teams,
        json!({
            "NT-M-FRA": { "competition_id": "m6n", "name": "France" },
            "jrlo-div1_1": { "competition_id": "jrlo-div1", "name": "Mie Honda Heat" }
        }),
    );
    let matches = SourcePayload::new(
        "data/matches/m6n/2026.json",
        ResourceKind::Matches,
        json!([{
            "match_id": "m6n-2026-x",
            "competition_id": "m6n",
            "kickoff": "2026-02-05T20:10:00+00:00",
            "home_team": "France",
            "away_team": "Mie Honda Heat",
            "home_team_id": "NT-M-FRA",
            "away_team_id": "jrlo-div1_1"
        }]),
    );

    let report = sequential().load(&[teams, matches]);

    assert_eq!(report.count(DiagnosticKind::CrossReferenceBroken), 1);
    let m = report.dataset.match_by_id("m6n-2026-x").unwrap();
    assert_eq!(m.home_team_id, "NT-M-FRA");
    assert_eq!(m.away_team_id, "");
}

#[test]
fn test_canonical_output_reloads_to_itself() {
    let first = sequential().load(&fixture_batch());
    let dataset = &first.dataset;

    let competitions: Vec<Value> = dataset
        .competitions()
        .map(|c| serde_json::to_value(c).unwrap())
        .collect();
    let teams: BTreeMap<&str, &Team> = dataset.teams().map(|t| (t.id.as_str(), t)).collect();
    let matches: Vec<Value> = dataset
        .matches()
        .iter()
        .map(|m| serde_json::to_value(m).unwrap())
        .collect();

    let second = sequential().load(&[
        SourcePayload::new("canonical/competitions.json", ResourceKind::Competitions, Value::Array(competitions)),
        SourcePayload::new("canonical/teams.json", ResourceKind::Teams, serde_json::to_value(&teams).unwrap()),
        SourcePayload::new("canonical/matches.json", ResourceKind::Matches, Value::Array(matches)),
    ]);

    assert!(!second.has_errors());
    assert_eq!(second.count(DiagnosticKind::FieldShapeInvalid), 0);
    assert_eq!(second.count(DiagnosticKind::CrossReferenceBroken), 0);
    assert_eq!(second.dataset.stats().synthesized_match_ids, 0);
    assert_eq!(second.dataset.stats().records_by_version.get("competitions/current"), Some(&2));
    assert_eq!(second.dataset.stats().records_by_version.get("matches/current"), Some(&5));

    let before: Vec<_> = dataset.competitions().collect();
    let after: Vec<_> = second.dataset.competitions().collect();
    assert_eq!(before, after);
    assert_eq!(dataset.teams().collect::<Vec<_>>(), second.dataset.teams().collect::<Vec<_>>());
    assert_eq!(dataset.matches(), second.dataset.matches());
}

#[test]
fn test_summary_checks_when_enabled() {
    let loader = DatasetLoader::new(LoaderConfig {
        parallel: false,
        check_data_summary: true,
        ..LoaderConfig::default()
    });
    let report = loader.load(&fixture_batch());

    let findings: Vec<_> = report
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::SummaryInconsistent)
        .collect();
    // m6n declares 15 matches but 5 are loaded; jrlo-div1 lists a data path with no matches
    assert_eq!(findings.len(), 2);
    assert!(findings.iter().all(|d| d.severity == Severity::Warning));
    assert!(findings.iter().any(|d| d.field.as_deref() == Some("data_summary.match_count")));
    assert!(findings.iter().any(|d| d.field.as_deref() == Some("data_paths")));

    let derived = report.dataset.derived_summary("m6n");
    assert_eq!(derived.match_count, 5);
    assert_eq!(derived.seasons, vec!["2026"]);
}

#[test]
fn test_summary_checks_are_off_by_default() {
    let report = sequential().load(&fixture_batch());
    assert_eq!(report.count(DiagnosticKind::SummaryInconsistent), 0);
}

#[test]
fn test_strict_policy_without_competitions_excludes_matches() {
    let loader = DatasetLoader::new(LoaderConfig {
        parallel: false,
        cross_reference: CrossReferencePolicy::Strict,
        ..LoaderConfig::default()
    });
    let payload = fixture(
        "data/matches/m6n/2026.json",
        ResourceKind::Matches,
        include_str!("resources/matches_m6n_2026.json"),
    );

    let report = loader.load(&[payload]);

    assert!(report.dataset.matches().is_empty());
    assert_eq!(count_at(&report, DiagnosticKind::CrossReferenceBroken, Severity::Error), 2);
    assert_eq!(report.dataset.stats().excluded_records, 2);
}

#[test]
fn test_content_hash_ids_do_not_depend_on_batch_order() {
    let loader = DatasetLoader::new(LoaderConfig {
        parallel: false,
        match_id_strategy: MatchIdStrategy::ContentHash,
        ..LoaderConfig::default()
    });
    let records = vec![
        json!({ "date": "2026-02-05 21:10:00", "home_team": "France", "away_team": "Ireland" }),
        json!({ "date": "2026-02-07 14:10:00", "home_team": "Italy", "away_team": "Scotland" }),
    ];
    let forward = SourcePayload::new("a.json", ResourceKind::Matches, Value::Array(records.clone()))
        .with_competition_hint("six-nations");
    let reversed = SourcePayload::new(
        "b.json",
        ResourceKind::Matches,
        Value::Array(records.into_iter().rev().collect()),
    )
    .with_competition_hint("six-nations");

    let a = loader.load(&[forward]);
    let b = loader.load(&[reversed]);

    let id_of = |report: &LoadReport, home: &str| {
        report
            .dataset
            .matches()
            .iter()
            .find(|m| m.home_team == home)
            .map(|m| m.match_id.clone())
            .unwrap()
    };
    assert_eq!(id_of(&a, "France"), id_of(&b, "France"));
    assert_eq!(id_of(&a, "Italy"), id_of(&b, "Italy"));
    assert!(id_of(&a, "France").starts_with("m6n-2026-"));
}

#[test]
fn test_published_snapshot_is_shared_until_replaced() {
    let store = SnapshotStore::new();
    assert!(store.current().is_empty());

    let report = sequential().load(&fixture_batch());
    store.publish(report.dataset);

    let reader = store.current();
    assert_eq!(reader.matches().len(), 5);

    let previous = store.publish(sequential().load(&[]).dataset);
    assert_eq!(previous.matches().len(), 5);
    // A reader holding the old snapshot keeps a consistent view
    assert_eq!(reader.matches().len(), 5);
    assert!(store.current().is_empty());
}

fn current_match_with_team_ids() -> SourcePayload {
    SourcePayload::new(
        "data/matches/m6n/2026.json",
        ResourceKind::Matches,
        json!([{
            "match_id": "m6n-2026-rd1-1",
            "competition_id": "m6n",
            "kickoff": "2026-02-05T20:10:00+00:00",
            "home_team": "France",
            "away_team": "Ireland",
            "home_team_id": "NT-M-FRA",
            "away_team_id": "NT-M-IRE"
        }]),
    )
}

#[test]
fn test_matches_only_batch_keeps_team_ids() {
    let report = sequential().load(&[current_match_with_team_ids()]);

    assert!(report.diagnostics.is_empty());
    let m = report.dataset.match_by_id("m6n-2026-rd1-1").unwrap();
    assert_eq!(m.home_team_id, "NT-M-FRA");
    assert_eq!(m.away_team_id, "NT-M-IRE");
}

#[test]
fn test_matches_only_batch_under_strict_policy_checks_team_ids() {
    let loader = DatasetLoader::new(LoaderConfig {
        parallel: false,
        cross_reference: CrossReferencePolicy::Strict,
        ..LoaderConfig::default()
    });
    let competitions = fixture(
        "data/competitions.json",
        ResourceKind::Competitions,
        include_str!("resources/competitions_current.json"),
    );

    let report = loader.load(&[competitions, current_match_with_team_ids()]);

    let m = report.dataset.match_by_id("m6n-2026-rd1-1").unwrap();
    assert_eq!(m.home_team_id, "");
    assert_eq!(m.away_team_id, "");
    let broken: Vec<_> = report
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::CrossReferenceBroken && d.severity == Severity::Error)
        .filter_map(|d| d.field.as_deref())
        .collect();
    assert_eq!(broken, vec!["home_team_id", "away_team_id"]);
}

#[test]
fn test_season_fallback_uses_the_local_kickoff_year() {
    let payload = SourcePayload::new(
        "data/matches/six-nations.json",
        ResourceKind::Matches,
        json!([{ "date": "2026-01-01T00:30:00+01:00", "home_team": "France", "away_team": "Ireland" }]),
    )
    .with_competition_hint("six-nations");

    let report = sequential().load(&[payload]);

    let m = &report.dataset.matches()[0];
    assert_eq!(m.season, "2026");
    assert_eq!(m.match_id, "m6n-2026-1");
}
