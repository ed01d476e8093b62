// Pipeline ingestion: the boundary where already-fetched JSON enters the core

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{IngestError, Result};

/// Which upstream resource a payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// `competitions.json`: array of competitions
    Competitions,
    /// `teams.json`: map of team id -> team (an array of teams is also accepted)
    Teams,
    /// `matches/...`: array of matches
    Matches,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Competitions => "competitions",
            ResourceKind::Teams => "teams",
            ResourceKind::Matches => "matches",
        }
    }

    /// Kind of a single record inside this resource
    pub fn record_noun(&self) -> &'static str {
        match self {
            ResourceKind::Competitions => "competition",
            ResourceKind::Teams => "team",
            ResourceKind::Matches => "match",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded resource handed over by the fetch collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePayload {
    /// Free-form tag naming where the payload came from (URL, path, ...)
    pub origin: String,
    pub resource: ResourceKind,
    /// Competition the payload belongs to, when the addressing implies one.
    /// Legacy match files carry no competition id of their own.
    pub competition_hint: Option<String>,
    pub body: Value,
}

impl SourcePayload {
    pub fn new(origin: impl Into<String>, resource: ResourceKind, body: Value) -> Self {
        Self {
            origin: origin.into(),
            resource,
            competition_hint: None,
            body,
        }
    }

    pub fn with_competition_hint(mut self, hint: impl Into<String>) -> Self {
        self.competition_hint = Some(hint.into());
        self
    }

    /// Decode raw bytes. Undecodable bytes are the one failure that never
    /// reaches the loader.
    pub fn from_slice(origin: impl Into<String>, resource: ResourceKind, bytes: &[u8]) -> Result<Self> {
        let origin = origin.into();
        let body = serde_json::from_slice(bytes).map_err(|source| IngestError::Decode {
            origin: origin.clone(),
            source,
        })?;
        Ok(Self {
            origin,
            resource,
            competition_hint: None,
            body,
        })
    }

    /// Split the payload into individual records.
    ///
    /// Returns `None` when the top-level shape does not fit the resource kind.
    pub fn records(&self) -> Option<Vec<RawRecord<'_>>> {
        match (&self.resource, &self.body) {
            (_, Value::Array(items)) => Some(
                items
                    .iter()
                    .enumerate()
                    .map(|(index, value)| RawRecord {
                        index,
                        key: None,
                        value,
                    })
                    .collect(),
            ),
            (ResourceKind::Teams, Value::Object(entries)) => Some(
                entries
                    .iter()
                    .enumerate()
                    .map(|(index, (key, value))| RawRecord {
                        index,
                        key: Some(key.as_str()),
                        value,
                    })
                    .collect(),
            ),
            _ => None,
        }
    }
}

/// A single record borrowed out of a payload.
#[derive(Debug, Clone, Copy)]
pub struct RawRecord<'a> {
    pub index: usize,
    pub key: Option<&'a str>,
    pub value: &'a Value,
}

impl<'a> RawRecord<'a> {
    pub fn path(&self) -> String {
        match self.key {
            Some(key) => format!("$['{}']", key),
            None => format!("$[{}]", self.index),
        }
    }
}

/// Infer the resource kind and competition hint from an upstream data path.
///
/// Understands both layouts:
/// `data/matches/{legacy-id}.json` and `data/matches/{id}/{season}.json`.
pub fn classify_path(path: &Path) -> Option<(ResourceKind, Option<String>)> {
    let file_stem = path.file_stem()?.to_str()?;
    let parent = path.parent().and_then(|p| p.file_name()).and_then(|n| n.to_str());

    match file_stem {
        "competitions" => return Some((ResourceKind::Competitions, None)),
        "teams" => return Some((ResourceKind::Teams, None)),
        _ => {}
    }

    if path.extension().and_then(|e| e.to_str()) != Some("json") {
        return None;
    }

    match parent {
        Some("matches") => Some((ResourceKind::Matches, Some(file_stem.to_string()))),
        Some(competition) => {
            let grandparent = path
                .parent()
                .and_then(|p| p.parent())
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str());
            if grandparent == Some("matches") {
                Some((ResourceKind::Matches, Some(competition.to_string())))
            } else {
                None
            }
        }
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_slice_rejects_invalid_json() {
        let err = SourcePayload::from_slice("broken.json", ResourceKind::Matches, b"[{").unwrap_err();
        assert!(matches!(err, IngestError::Decode { ref origin, .. } if origin == "broken.json"));
    }

    #[test]
    fn test_team_map_records_are_keyed() {
        let payload = SourcePayload::new(
            "teams.json",
            ResourceKind::Teams,
            json!({ "NT-M-ENG": { "name": "England" }, "premier_1": { "name": "Bath" } }),
        );
        let records = payload.records().unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().any(|r| r.key == Some("NT-M-ENG") && r.path() == "$['NT-M-ENG']"));
    }

    #[test]
    fn test_object_matches_payload_has_no_records() {
        let payload = SourcePayload::new("m.json", ResourceKind::Matches, json!({ "matches": [] }));
        assert!(payload.records().is_none());
    }

    #[test]
    fn test_classify_legacy_and_current_match_paths() {
        assert_eq!(
            classify_path(Path::new("data/matches/six-nations.json")),
            Some((ResourceKind::Matches, Some("six-nations".to_string())))
        );
        assert_eq!(
            classify_path(Path::new("data/matches/w6n/2026.json")),
            Some((ResourceKind::Matches, Some("w6n".to_string())))
        );
        assert_eq!(
            classify_path(Path::new("data/competitions.json")),
            Some((ResourceKind::Competitions, None))
        );
        assert_eq!(classify_path(Path::new("data/notes.txt")), None);
    }
}
