//! Detection of teams that are probably the same club published under
//! different sponsor names.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::constants::{SPONSOR_PREFIXES, SPONSOR_SUFFIXES};
use crate::domain::Team;

fn alternation(names: &[&str]) -> String {
    names
        .iter()
        .map(|name| regex::escape(name).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|")
}

static SPONSOR_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\s+(?:{})$", alternation(SPONSOR_SUFFIXES))).expect("static pattern")
});
static SPONSOR_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)^(?:{})\s+", alternation(SPONSOR_PREFIXES))).expect("static pattern")
});
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static pattern"));
static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("static pattern"));

/// Team name with sponsor prefixes and suffixes removed
pub fn base_team_name(name: &str) -> String {
    let mut base = name.trim().to_string();
    loop {
        let stripped = SPONSOR_SUFFIX.replace(&base, "");
        let stripped = SPONSOR_PREFIX.replace(&stripped, "").trim().to_string();
        // Never strip a name down to nothing
        if stripped == base || stripped.is_empty() {
            return base;
        }
        base = stripped;
    }
}

/// Comparison key: upper case, single spaces, no punctuation
pub fn comparison_key(name: &str) -> String {
    let upper = name.trim().to_uppercase();
    let spaced = WHITESPACE.replace_all(&upper, " ");
    PUNCTUATION.replace_all(&spaced, "").into_owned()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    pub competition_id: String,
    pub base_name: String,
    pub team_ids: Vec<String>,
}

/// Group teams of the same competition whose base names collide.
pub fn duplicate_candidates<'a>(teams: impl IntoIterator<Item = &'a Team>) -> Vec<DuplicateGroup> {
    let mut groups: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();
    for team in teams {
        let key = comparison_key(&base_team_name(&team.name));
        if key.is_empty() {
            continue;
        }
        groups
            .entry((team.competition_id.clone(), key))
            .or_default()
            .push(team.id.clone());
    }

    groups
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|((competition_id, base_name), team_ids)| DuplicateGroup {
            competition_id,
            base_name,
            team_ids,
        })
        .collect()
}
