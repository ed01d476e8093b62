use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::pipeline::ingestion::ResourceKind;

/// Types of data-quality issues the pipeline reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// No known schema version matches the record shape
    SchemaUnrecognized,
    /// A required field is absent
    FieldMissing,
    /// Wrong primitive kind, or an unparseable date
    FieldShapeInvalid,
    /// A closed enum holds a value outside its known set
    EnumValueUnknown,
    /// A legacy or hinted id has no mapping entry
    IdentifierUnresolved,
    /// A reference to a competition or team absent from the index
    CrossReferenceBroken,
    /// Two records claim the same canonical id
    DuplicateIdentifier,
    /// Summary figures disagree with each other or with loaded matches
    SummaryInconsistent,
    /// Two teams of one competition look like sponsor variants of each other
    DuplicateTeamCandidate,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::SchemaUnrecognized => "schema_unrecognized",
            DiagnosticKind::FieldMissing => "field_missing",
            DiagnosticKind::FieldShapeInvalid => "field_shape_invalid",
            DiagnosticKind::EnumValueUnknown => "enum_value_unknown",
            DiagnosticKind::IdentifierUnresolved => "identifier_unresolved",
            DiagnosticKind::CrossReferenceBroken => "cross_reference_broken",
            DiagnosticKind::DuplicateIdentifier => "duplicate_identifier",
            DiagnosticKind::SummaryInconsistent => "summary_inconsistent",
            DiagnosticKind::DuplicateTeamCandidate => "duplicate_team_candidate",
        }
    }

    pub fn all() -> impl Iterator<Item = DiagnosticKind> {
        use DiagnosticKind::*;
        [
            SchemaUnrecognized,
            FieldMissing,
            FieldShapeInvalid,
            EnumValueUnknown,
            IdentifierUnresolved,
            CrossReferenceBroken,
            DuplicateIdentifier,
            SummaryInconsistent,
            DuplicateTeamCandidate,
        ]
        .into_iter()
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiagnosticKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        DiagnosticKind::all()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| format!("unknown diagnostic kind: {}", s))
    }
}

/// Severity levels for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Benign reconciliation, nothing lost
    Info,
    /// Record kept; a value was defaulted or is questionable
    Warning,
    /// Record (or the offending reference) excluded from the snapshot
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// A field-level finding before it is pinned to a record in the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub field: Option<String>,
    pub message: String,
}

impl FieldIssue {
    pub fn error(kind: DiagnosticKind, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Error,
            field: Some(field.into()),
            message: message.into(),
        }
    }

    pub fn warning(kind: DiagnosticKind, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Warning,
            field: Some(field.into()),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Where in the batch a diagnostic points.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordLocation {
    /// Position of the payload in the submitted batch
    pub payload: usize,
    /// Position of the record inside the payload; `None` for the payload itself
    pub record: Option<usize>,
    pub origin: String,
    pub resource: ResourceKind,
    /// JSONPath-like pointer to the record (`$[3]`, `$['NT-M-ENG']`, `$`)
    pub path: String,
}

/// One data-quality issue in one input record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub location: RecordLocation,
    pub field: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        kind: DiagnosticKind,
        severity: Severity,
        location: RecordLocation,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            location,
            field: None,
            message: message.into(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn from_issue(issue: FieldIssue, location: RecordLocation) -> Self {
        Self {
            kind: issue.kind,
            severity: issue.severity,
            location,
            field: issue.field,
            message: issue.message,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:?}] {} {}{}",
            self.severity, self.kind, self.location.origin, self.location.path
        )?;
        if let Some(field) = &self.field {
            write!(f, ".{}", field)?;
        }
        write!(f, ": {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parses_cli_spellings() {
        assert_eq!(
            "cross-reference-broken".parse::<DiagnosticKind>().unwrap(),
            DiagnosticKind::CrossReferenceBroken
        );
        assert_eq!(
            "FIELD_MISSING".parse::<DiagnosticKind>().unwrap(),
            DiagnosticKind::FieldMissing
        );
        assert!("nonsense".parse::<DiagnosticKind>().is_err());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }

    #[test]
    fn test_payload_level_locations_sort_first() {
        let payload_level = RecordLocation {
            payload: 0,
            record: None,
            origin: "m.json".into(),
            resource: ResourceKind::Matches,
            path: "$".into(),
        };
        let record_level = RecordLocation {
            record: Some(0),
            path: "$[0]".into(),
            ..payload_level.clone()
        };
        assert!(payload_level < record_level);
    }
}
