//! Data summaries derived from loaded matches, and checks of the published
//! summary against them.

use std::collections::BTreeSet;

use crate::domain::{Competition, DataSummary, DateRange, Match};
use crate::pipeline::processing::diagnostics::{DiagnosticKind, FieldIssue};
use crate::pipeline::processing::schema::timestamp::parse_timestamp;

/// Summary of `matches` as loaded: count, sorted seasons, kickoff range.
///
/// The range keeps the kickoff strings of the earliest and latest match.
/// `last_updated` is left empty because loading does not date anything.
pub fn derive_summary<'a>(matches: impl IntoIterator<Item = &'a Match>) -> DataSummary {
    let mut match_count = 0u64;
    let mut seasons = BTreeSet::new();
    let mut earliest: Option<(chrono::NaiveDateTime, &str)> = None;
    let mut latest: Option<(chrono::NaiveDateTime, &str)> = None;

    for m in matches {
        match_count += 1;
        if !m.season.is_empty() {
            seasons.insert(m.season.clone());
        }
        let Some(at) = parse_timestamp(&m.kickoff) else {
            continue;
        };
        if earliest.map_or(true, |(e, _)| at < e) {
            earliest = Some((at, m.kickoff.as_str()));
        }
        if latest.map_or(true, |(l, _)| at > l) {
            latest = Some((at, m.kickoff.as_str()));
        }
    }

    DataSummary {
        match_count,
        seasons: seasons.into_iter().collect(),
        date_range: DateRange {
            start: earliest.map(|(_, s)| s.to_string()).unwrap_or_default(),
            end: latest.map(|(_, s)| s.to_string()).unwrap_or_default(),
        },
        last_updated: String::new(),
    }
}

fn same_day(declared: &str, derived: &str) -> bool {
    match (parse_timestamp(declared), parse_timestamp(derived)) {
        (Some(a), Some(b)) => a.date() == b.date(),
        _ => true,
    }
}

/// Compare a competition's published summary with one derived from the
/// matches loaded for it.
///
/// A summary that was never published (all defaults) is not compared.
pub fn check_summary(competition: &Competition, derived: &DataSummary) -> Vec<FieldIssue> {
    let mut issues = Vec::new();
    let declared = &competition.data_summary;

    if derived.match_count == 0 {
        if !competition.data_paths.is_empty() {
            issues.push(FieldIssue::warning(
                DiagnosticKind::SummaryInconsistent,
                "data_paths",
                format!(
                    "{} data path(s) listed but no loaded match references '{}'",
                    competition.data_paths.len(),
                    competition.id
                ),
            ));
        }
        return issues;
    }

    if *declared == DataSummary::default() {
        return issues;
    }

    if declared.match_count != derived.match_count {
        issues.push(FieldIssue::warning(
            DiagnosticKind::SummaryInconsistent,
            "data_summary.match_count",
            format!(
                "declares {} matches, {} loaded",
                declared.match_count, derived.match_count
            ),
        ));
    }

    let declared_seasons: BTreeSet<&String> = declared.seasons.iter().collect();
    let derived_seasons: BTreeSet<&String> = derived.seasons.iter().collect();
    if !declared_seasons.is_empty() && declared_seasons != derived_seasons {
        issues.push(FieldIssue::warning(
            DiagnosticKind::SummaryInconsistent,
            "data_summary.seasons",
            format!("declares seasons {:?}, loaded {:?}", declared.seasons, derived.seasons),
        ));
    }

    let range = &declared.date_range;
    if !same_day(&range.start, &derived.date_range.start) || !same_day(&range.end, &derived.date_range.end) {
        issues.push(FieldIssue::warning(
            DiagnosticKind::SummaryInconsistent,
            "data_summary.date_range",
            format!(
                "declares {}..{}, loaded kickoffs span {}..{}",
                range.start, range.end, derived.date_range.start, derived.date_range.end
            ),
        ));
    }

    issues
}
