//! Raw record loading and the typed deal / activity records

use crate::error::{PipelineError, PipelineResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

/// One JSON object from an export file. Field sets vary per record.
pub type RawRecord = Map<String, Value>;

/// Load a JSON file whose top level must be an array of objects.
pub fn load_records<P: AsRef<Path>>(path: P) -> PipelineResult<Vec<RawRecord>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let records = parse_records(&content).map_err(|e| match e {
        RecordsError::Json(source) => PipelineError::Json {
            path: path.to_path_buf(),
            source,
        },
        RecordsError::Schema(msg) => PipelineError::schema(format!("{} in {:?}", msg, path)),
    })?;
    tracing::info!("Loaded {} records from {:?}", records.len(), path);
    Ok(records)
}

enum RecordsError {
    Json(serde_json::Error),
    Schema(String),
}

fn parse_records(content: &str) -> Result<Vec<RawRecord>, RecordsError> {
    let value: Value = serde_json::from_str(content).map_err(RecordsError::Json)?;
    let Value::Array(items) = value else {
        return Err(RecordsError::Schema("expected a list of records".to_string()));
    };
    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| match item {
            Value::Object(map) => Ok(map),
            other => Err(RecordsError::Schema(format!(
                "expected record {} to be an object, found {}",
                idx,
                json_kind(&other)
            ))),
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Union of field names across a record set, in sorted order.
pub fn columns(records: &[RawRecord]) -> BTreeSet<&str> {
    records
        .iter()
        .flat_map(|r| r.keys().map(String::as_str))
        .collect()
}

pub fn has_column(records: &[RawRecord], name: &str) -> bool {
    records.iter().any(|r| r.contains_key(name))
}

/// Render an identifier value as a string key.
///
/// Null, empty strings and missing values all yield `None`; numbers are
/// rendered in decimal so numeric and string ids join on the same key.
pub fn id_value(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn string_value(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}

/// Deal outcome label, assigned by the file a deal was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Lost,
    Won,
}

impl Outcome {
    pub fn label(self) -> i32 {
        match self {
            Outcome::Lost => 0,
            Outcome::Won => 1,
        }
    }

    pub fn from_label(label: i64) -> Option<Self> {
        match label {
            0 => Some(Outcome::Lost),
            1 => Some(Outcome::Won),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Lost => write!(f, "lost"),
            Outcome::Won => write!(f, "won"),
        }
    }
}

/// A normalized CRM deal.
#[derive(Debug, Clone, PartialEq)]
pub struct Deal {
    pub deal_id: String,
    pub outcome: Outcome,
    /// Remaining export fields (owner, create/close dates, ...), passed through.
    pub properties: RawRecord,
}

/// The closed set of activity types that get their own count column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    Call,
    Email,
    Meeting,
    Note,
    Task,
}

impl ActivityKind {
    /// Exact, case-sensitive match.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Call" => Some(ActivityKind::Call),
            "Email" => Some(ActivityKind::Email),
            "Meeting" => Some(ActivityKind::Meeting),
            "Note" => Some(ActivityKind::Note),
            "Task" => Some(ActivityKind::Task),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityKind::Call => "Call",
            ActivityKind::Email => "Email",
            ActivityKind::Meeting => "Meeting",
            ActivityKind::Note => "Note",
            ActivityKind::Task => "Task",
        }
    }
}

/// An activity that survived aggregation: linked to a deal and timestamped.
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub activity_id: Option<String>,
    pub deal_id: String,
    pub activity_type: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// The timestamp exactly as exported, re-parsed during feature extraction.
    pub raw_timestamp: Value,
    pub description: Option<String>,
    pub owner_id: Option<String>,
}

impl Activity {
    pub fn from_record(
        record: &RawRecord,
        deal_id: String,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            activity_id: id_value(record.get("activity_id")),
            deal_id,
            activity_type: string_value(record.get("activity_type")),
            timestamp,
            raw_timestamp: record.get("timestamp").cloned().unwrap_or(Value::Null),
            description: string_value(record.get("description")),
            owner_id: id_value(record.get("owner_id")),
        }
    }

    pub fn kind(&self) -> Option<ActivityKind> {
        self.activity_type.as_deref().and_then(ActivityKind::parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_json(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_records_sparse_schema() {
        let file = write_json(r#"[{"id": "1", "amount": 10}, {"deal_id": "2"}]"#);
        let records = load_records(file.path()).unwrap();

        assert_eq!(records.len(), 2);
        let cols: Vec<_> = columns(&records).into_iter().collect();
        assert_eq!(cols, vec!["amount", "deal_id", "id"]);
    }

    #[test]
    fn test_load_records_rejects_object() {
        let file = write_json(r#"{"deal_id": "1"}"#);
        let err = load_records(file.path()).unwrap_err();
        assert!(matches!(err, PipelineError::Schema(_)));
        assert!(err.to_string().contains("expected a list of records"));
    }

    #[test]
    fn test_load_records_rejects_scalar_items() {
        let file = write_json(r#"[{"deal_id": "1"}, 42]"#);
        let err = load_records(file.path()).unwrap_err();
        assert!(matches!(err, PipelineError::Schema(_)));
    }

    #[test]
    fn test_load_records_bad_json_and_missing_file() {
        let file = write_json("[{");
        assert!(matches!(
            load_records(file.path()),
            Err(PipelineError::Json { .. })
        ));
        assert!(matches!(
            load_records("/nonexistent/deals.json"),
            Err(PipelineError::Io { .. })
        ));
    }

    #[test]
    fn test_id_value() {
        assert_eq!(id_value(Some(&json!("abc"))), Some("abc".to_string()));
        assert_eq!(id_value(Some(&json!(12345))), Some("12345".to_string()));
        assert_eq!(id_value(Some(&json!(""))), None);
        assert_eq!(id_value(Some(&Value::Null)), None);
        assert_eq!(id_value(None), None);
    }

    #[test]
    fn test_activity_kind_is_case_sensitive() {
        assert_eq!(ActivityKind::parse("Note"), Some(ActivityKind::Note));
        assert_eq!(ActivityKind::parse("note"), None);
        assert_eq!(ActivityKind::parse("SMS"), None);
        assert_eq!(ActivityKind::Meeting.as_str(), "Meeting");
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(Outcome::Won.label(), 1);
        assert_eq!(Outcome::Lost.label(), 0);
        assert_eq!(Outcome::from_label(1), Some(Outcome::Won));
        assert_eq!(Outcome::from_label(2), None);
        assert_eq!(format!("{} deals", Outcome::Lost), "lost deals");
    }
}
