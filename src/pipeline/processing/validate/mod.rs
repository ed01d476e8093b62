//! Record validation: checks a raw record against the field table of its
//! schema version and reads the well-formed fields into a typed record.
//!
//! Nothing here coerces values. A field that fails its shape check is either
//! fatal (required) or dropped with a warning (optional); everything else is
//! passed on as published.

use serde_json::{Map, Number, Value};

use crate::domain::{
    AgeGrade, AnalysisProvider, BroadcastRegion, Category, Coverage, DataSummary, DateRange, Gender,
    SeasonPattern, Sport, Tier,
};
use crate::pipeline::ingestion::{RawRecord, ResourceKind};
use crate::pipeline::processing::diagnostics::{DiagnosticKind, FieldIssue, Severity};
use crate::pipeline::processing::identifiers;
use crate::pipeline::processing::schema::timestamp::parse_timestamp;
use crate::pipeline::processing::schema::{FieldShape, FieldSpec, Presence, SchemaRegistry, SchemaVersion};

/// Broadcasters as published: legacy files use a single string
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Broadcasters {
    #[default]
    Absent,
    Text(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawCompetition {
    pub version: SchemaVersion,
    pub id: String,
    pub name: String,
    pub short_name: Option<String>,
    pub sport: Option<Sport>,
    pub category: Category,
    pub gender: Gender,
    pub age_grade: AgeGrade,
    pub tier: Tier,
    pub region: Option<String>,
    pub governing_body: Option<String>,
    pub organizer: Option<String>,
    pub official_sites: Vec<String>,
    pub official_feeds: Vec<String>,
    pub timezone_default: Option<String>,
    pub season_pattern: Option<SeasonPattern>,
    pub match_url_template: Option<String>,
    pub data_paths: Vec<String>,
    pub coverage: Option<Coverage>,
    pub teams: Vec<String>,
    pub team_ids: Vec<String>,
    pub data_summary: Option<DataSummary>,
    pub logo_url: Option<String>,
    pub logo_repo_path: Option<String>,
    pub license_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawTeam {
    pub id: String,
    pub competition_id: String,
    pub name: String,
    pub name_ja: Option<String>,
    pub short_name: Option<String>,
    pub country: Option<String>,
    pub division: Option<String>,
    pub logo_url: Option<String>,
    pub badge_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawMatch {
    pub version: SchemaVersion,
    pub match_id: Option<String>,
    pub competition_id: Option<String>,
    pub season: Option<String>,
    pub round: Option<String>,
    pub status: Option<String>,
    pub kickoff: String,
    pub kickoff_utc: Option<String>,
    pub timezone: Option<String>,
    pub venue: Option<String>,
    pub home_team: String,
    pub away_team: String,
    pub home_team_id: Option<String>,
    pub away_team_id: Option<String>,
    pub match_url: Option<String>,
    pub broadcasters: Broadcasters,
    pub division: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypedRecord {
    Competition(RawCompetition),
    Team(RawTeam),
    Match(RawMatch),
}

/// A record that passed validation, with its non-fatal findings
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    pub record: TypedRecord,
    pub warnings: Vec<FieldIssue>,
}

/// Validate one record under `version`.
///
/// `Err` carries every finding for the record, at least one of them an error.
pub fn validate(
    registry: &SchemaRegistry,
    record: &RawRecord<'_>,
    resource: ResourceKind,
    version: SchemaVersion,
) -> Result<Validated, Vec<FieldIssue>> {
    let Some(fields) = registry.fields(version, resource) else {
        return Err(vec![record_issue(format!(
            "{} records have no {} schema",
            resource.record_noun(),
            version
        ))]);
    };
    let Some(obj) = record.value.as_object() else {
        return Err(vec![record_issue(format!(
            "{} record is not a JSON object",
            resource.record_noun()
        ))]);
    };

    let mut issues = Vec::new();
    let checked = check_fields(fields, obj, "", &mut issues);
    if issues.iter().any(FieldIssue::is_error) {
        return Err(issues);
    }

    let typed = match resource {
        ResourceKind::Competitions => TypedRecord::Competition(read_competition(&checked, version)),
        ResourceKind::Matches => TypedRecord::Match(read_match(&checked, version)),
        ResourceKind::Teams => match read_team(&checked, record.key, &mut issues) {
            Some(team) => TypedRecord::Team(team),
            None => return Err(issues),
        },
    };

    Ok(Validated {
        record: typed,
        warnings: issues,
    })
}

fn record_issue(message: String) -> FieldIssue {
    FieldIssue {
        kind: DiagnosticKind::FieldShapeInvalid,
        severity: Severity::Error,
        field: None,
        message,
    }
}

fn field_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

/// Check every field in `fields` and return the well-formed ones under their
/// canonical names.
fn check_fields(
    fields: &[FieldSpec],
    obj: &Map<String, Value>,
    prefix: &str,
    issues: &mut Vec<FieldIssue>,
) -> Map<String, Value> {
    let mut checked = Map::new();

    for spec in fields {
        let path = field_path(prefix, spec.name);
        let found = spec.lookup(obj).filter(|(_, v)| !v.is_null());

        let Some((wire_name, value)) = found else {
            if spec.presence == Presence::Required {
                issues.push(FieldIssue::error(
                    DiagnosticKind::FieldMissing,
                    path,
                    format!("required field '{}' is absent", spec.name),
                ));
            }
            continue;
        };

        match check_value(spec.shape, value, &path, issues) {
            Ok(Some(clean)) => {
                checked.insert(spec.name.to_string(), clean);
            }
            Ok(None) => {
                if spec.presence == Presence::Required {
                    issues.push(FieldIssue::error(
                        DiagnosticKind::FieldMissing,
                        path,
                        format!("required field '{}' is empty", wire_name),
                    ));
                }
            }
            Err(mut issue) => {
                if spec.presence == Presence::Optional {
                    issue.severity = Severity::Warning;
                    issue.message.push_str("; field ignored");
                }
                issues.push(issue);
            }
        }
    }

    checked
}

fn shape_error(path: &str, message: String) -> FieldIssue {
    FieldIssue::error(DiagnosticKind::FieldShapeInvalid, path, message)
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn string_list(value: &Value, path: &str) -> Result<Vec<Value>, FieldIssue> {
    let Some(items) = value.as_array() else {
        return Err(shape_error(path, format!("expected an array of strings, got {}", describe(value))));
    };
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match item {
            Value::String(_) => out.push(item.clone()),
            other => {
                return Err(shape_error(
                    path,
                    format!("element {} should be a string, got {}", i, describe(other)),
                ))
            }
        }
    }
    Ok(out)
}

/// `Ok(None)` means the value is present but empty.
fn check_value(
    shape: FieldShape,
    value: &Value,
    path: &str,
    issues: &mut Vec<FieldIssue>,
) -> Result<Option<Value>, FieldIssue> {
    match shape {
        FieldShape::Text => match value.as_str() {
            Some("") => Ok(None),
            Some(_) => Ok(Some(value.clone())),
            None => Err(shape_error(path, format!("expected a string, got {}", describe(value)))),
        },
        FieldShape::Timestamp => match value.as_str() {
            Some("") => Ok(None),
            Some(s) if parse_timestamp(s).is_some() => Ok(Some(value.clone())),
            Some(s) => Err(shape_error(path, format!("'{}' is not an ISO-8601 timestamp", s))),
            None => Err(shape_error(path, format!("expected a timestamp string, got {}", describe(value)))),
        },
        FieldShape::TextList => string_list(value, path).map(|items| Some(Value::Array(items))),
        FieldShape::TextOrList => match value {
            Value::String(s) if s.is_empty() => Ok(None),
            Value::String(_) => Ok(Some(value.clone())),
            _ => string_list(value, path).map(|items| Some(Value::Array(items))),
        },
        FieldShape::TextOrNumber => match value {
            Value::String(s) if s.is_empty() => Ok(None),
            Value::String(_) => Ok(Some(value.clone())),
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(Some(value.clone())),
            _ => Err(shape_error(path, format!("expected a string or integer, got {}", describe(value)))),
        },
        FieldShape::Count => match value.as_u64() {
            Some(_) => Ok(Some(value.clone())),
            None => Err(shape_error(path, format!("expected a non-negative integer, got {}", describe(value)))),
        },
        FieldShape::Enum(kind) => match value.as_str() {
            Some("") => Ok(None),
            Some(s) => {
                let known = kind.known_values();
                if !known.contains(&s) {
                    issues.push(FieldIssue::warning(
                        DiagnosticKind::EnumValueUnknown,
                        path,
                        format!("'{}' is not one of {:?}; kept as published", s, known),
                    ));
                }
                Ok(Some(value.clone()))
            }
            None => Err(shape_error(path, format!("expected a string, got {}", describe(value)))),
        },
        FieldShape::Object(fields) => {
            let Some(obj) = value.as_object() else {
                return Err(shape_error(path, format!("expected an object, got {}", describe(value))));
            };
            let mut nested = Vec::new();
            let checked = check_fields(fields, obj, path, &mut nested);
            issues.extend(nested.into_iter().map(demote));
            Ok(Some(Value::Object(checked)))
        }
        FieldShape::ObjectList(fields) => {
            let Some(items) = value.as_array() else {
                return Err(shape_error(path, format!("expected an array of objects, got {}", describe(value))));
            };
            let mut kept = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let item_path = format!("{}[{}]", path, i);
                let Some(obj) = item.as_object() else {
                    issues.push(FieldIssue::warning(
                        DiagnosticKind::FieldShapeInvalid,
                        item_path,
                        format!("expected an object, got {}; element ignored", describe(item)),
                    ));
                    continue;
                };
                let mut nested = Vec::new();
                let checked = check_fields(fields, obj, &item_path, &mut nested);
                if !nested.iter().any(FieldIssue::is_error) {
                    kept.push(Value::Object(checked));
                }
                issues.extend(nested.into_iter().map(demote));
            }
            Ok(Some(Value::Array(kept)))
        }
    }
}

/// Defects inside embedded objects never cost the whole record.
fn demote(mut issue: FieldIssue) -> FieldIssue {
    if issue.severity == Severity::Error {
        issue.severity = Severity::Warning;
        issue.message.push_str("; element ignored");
    }
    issue
}

/// Read access to a checked field map. Every value in it already has the
/// shape its table demands.
struct Fields<'a>(&'a Map<String, Value>);

impl<'a> Fields<'a> {
    fn text(&self, name: &str) -> Option<String> {
        self.0.get(name).and_then(Value::as_str).map(str::to_string)
    }

    fn required_text(&self, name: &str) -> String {
        self.text(name).unwrap_or_default()
    }

    fn texts(&self, name: &str) -> Vec<String> {
        self.0
            .get(name)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn scalar(&self, name: &str) -> Option<String> {
        match self.0.get(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(number_text(n)),
            _ => None,
        }
    }

    fn count(&self, name: &str) -> Option<u64> {
        self.0.get(name).and_then(Value::as_u64)
    }

    fn object(&self, name: &str) -> Option<Fields<'a>> {
        self.0.get(name).and_then(Value::as_object).map(Fields)
    }

    fn objects(&self, name: &str) -> Vec<Fields<'a>> {
        self.0
            .get(name)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_object).map(Fields).collect())
            .unwrap_or_default()
    }

    fn broadcasters(&self) -> Broadcasters {
        match self.0.get("broadcasters") {
            Some(Value::String(s)) => Broadcasters::Text(s.clone()),
            Some(Value::Array(_)) => Broadcasters::List(self.texts("broadcasters")),
            _ => Broadcasters::Absent,
        }
    }
}

fn number_text(n: &Number) -> String {
    n.to_string()
}

fn read_coverage(fields: &Fields<'_>) -> Coverage {
    Coverage {
        broadcast_regions: fields
            .objects("broadcast_regions")
            .iter()
            .map(|r| BroadcastRegion {
                region: r.required_text("region"),
                providers: r.texts("providers"),
                official_source: r.text("official_source").unwrap_or_default(),
            })
            .collect(),
        analysis_providers: fields
            .objects("analysis_providers")
            .iter()
            .map(|p| AnalysisProvider {
                name: p.required_text("name"),
                official_source: p.text("official_source").unwrap_or_default(),
            })
            .collect(),
        notes: fields.text("notes"),
    }
}

fn read_data_summary(fields: &Fields<'_>) -> DataSummary {
    let date_range = fields
        .object("date_range")
        .map(|r| DateRange {
            start: r.text("start").unwrap_or_default(),
            end: r.text("end").unwrap_or_default(),
        })
        .unwrap_or_default();
    DataSummary {
        match_count: fields.count("match_count").unwrap_or(0),
        seasons: fields.texts("seasons"),
        date_range,
        last_updated: fields.text("last_updated").unwrap_or_default(),
    }
}

fn read_competition(checked: &Map<String, Value>, version: SchemaVersion) -> RawCompetition {
    let f = Fields(checked);
    RawCompetition {
        version,
        id: f.required_text("id"),
        name: f.required_text("name"),
        short_name: f.text("short_name"),
        sport: f.text("sport").map(|s| Sport::from_wire(&s)),
        category: Category::from_wire(&f.required_text("category")),
        gender: Gender::from_wire(&f.required_text("gender")),
        age_grade: AgeGrade::from_wire(&f.required_text("age_grade")),
        tier: Tier::from_wire(&f.required_text("tier")),
        region: f.text("region"),
        governing_body: f.text("governing_body"),
        organizer: f.text("organizer"),
        official_sites: f.texts("official_sites"),
        official_feeds: f.texts("official_feeds"),
        timezone_default: f.text("timezone_default"),
        season_pattern: f.text("season_pattern").map(|s| SeasonPattern::from_wire(&s)),
        match_url_template: f.text("match_url_template"),
        data_paths: f.texts("data_paths"),
        coverage: f.object("coverage").map(|c| read_coverage(&c)),
        teams: f.texts("teams"),
        team_ids: f.texts("team_ids"),
        data_summary: f.object("data_summary").map(|s| read_data_summary(&s)),
        logo_url: f.text("logo_url"),
        logo_repo_path: f.text("logo_repo_path"),
        license_key: f.text("license_key"),
    }
}

fn read_team(checked: &Map<String, Value>, key: Option<&str>, issues: &mut Vec<FieldIssue>) -> Option<RawTeam> {
    let f = Fields(checked);
    let declared = f.text("id");

    let id = match (key, declared.as_deref()) {
        (Some(key), Some(declared)) if key != declared => {
            issues.push(FieldIssue::warning(
                DiagnosticKind::FieldShapeInvalid,
                "id",
                format!("id '{}' disagrees with its map key '{}'; the key wins", declared, key),
            ));
            key.to_string()
        }
        (Some(key), _) => key.to_string(),
        (None, Some(declared)) => declared.to_string(),
        (None, None) => {
            issues.push(FieldIssue::error(
                DiagnosticKind::FieldMissing,
                "id",
                "team has neither an 'id' field nor a map key",
            ));
            return None;
        }
    };

    let competition_id = f.required_text("competition_id");
    if let Some(reason) = identifiers::team_id_mismatch(&id, &competition_id) {
        issues.push(FieldIssue::warning(DiagnosticKind::FieldShapeInvalid, "id", reason));
    }

    Some(RawTeam {
        id,
        competition_id,
        name: f.required_text("name"),
        name_ja: f.text("name_ja"),
        short_name: f.text("short_name"),
        country: f.text("country"),
        division: f.text("division"),
        logo_url: f.text("logo_url"),
        badge_url: f.text("badge_url"),
    })
}

fn read_match(checked: &Map<String, Value>, version: SchemaVersion) -> RawMatch {
    let f = Fields(checked);
    RawMatch {
        version,
        match_id: f.text("match_id"),
        competition_id: f.text("competition_id"),
        season: f.scalar("season"),
        round: f.scalar("round"),
        status: f.text("status"),
        kickoff: f.required_text("kickoff"),
        kickoff_utc: f.text("kickoff_utc"),
        timezone: f.text("timezone"),
        venue: f.text("venue"),
        home_team: f.required_text("home_team"),
        away_team: f.required_text("away_team"),
        home_team_id: f.text("home_team_id"),
        away_team_id: f.text("away_team_id"),
        match_url: f.text("match_url"),
        broadcasters: f.broadcasters(),
        division: f.text("division"),
    }
}
