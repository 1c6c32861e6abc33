//! Per-deal feature extraction
//!
//! Three independent feature groups are computed from a deal's ordered
//! activity list:
//! 1. Counts per known activity type
//! 2. Temporal statistics (span, mean gap, rate)
//! 3. Word counts over note descriptions

use crate::pipeline::merge::DealActivities;
use crate::pipeline::record::{Activity, ActivityKind, Outcome};
use crate::timestamp::{delta_days, delta_hours, parse_timestamp};

/// Added to the rate denominator so zero-length spans do not divide by zero.
/// Single-activity deals therefore get a rate of `1 / RATE_EPSILON`.
pub const RATE_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeCounts {
    pub email: i64,
    pub meeting: i64,
    pub task: i64,
    pub note: i64,
    pub call: i64,
}

impl TypeCounts {
    pub fn get(&self, kind: ActivityKind) -> i64 {
        match kind {
            ActivityKind::Email => self.email,
            ActivityKind::Meeting => self.meeting,
            ActivityKind::Task => self.task,
            ActivityKind::Note => self.note,
            ActivityKind::Call => self.call,
        }
    }

    fn bump(&mut self, kind: ActivityKind) {
        match kind {
            ActivityKind::Email => self.email += 1,
            ActivityKind::Meeting => self.meeting += 1,
            ActivityKind::Task => self.task += 1,
            ActivityKind::Note => self.note += 1,
            ActivityKind::Call => self.call += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TemporalFeatures {
    pub duration_days: f64,
    pub avg_delta_hours: f64,
    pub activity_rate_per_day: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnstructuredFeatures {
    pub total_note_words: i64,
}

/// One fixed-schema feature record per deal.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub deal_id: String,
    pub outcome: Outcome,
    pub counts: TypeCounts,
    pub temporal: TemporalFeatures,
    pub unstructured: UnstructuredFeatures,
}

/// Returns the counts and how many activities had a type outside the known set.
pub fn count_activity_types(activities: &[Activity]) -> (TypeCounts, usize) {
    let mut counts = TypeCounts::default();
    let mut unknown = 0;
    for activity in activities {
        match activity.kind() {
            Some(kind) => counts.bump(kind),
            None => unknown += 1,
        }
    }
    (counts, unknown)
}

pub fn extract_temporal_features(activities: &[Activity]) -> TemporalFeatures {
    let mut timestamps: Vec<_> = activities
        .iter()
        .filter_map(|a| parse_timestamp(&a.raw_timestamp))
        .collect();
    if timestamps.is_empty() {
        return TemporalFeatures::default();
    }
    timestamps.sort();

    let duration_days = match (timestamps.first(), timestamps.last()) {
        (Some(first), Some(last)) => delta_days(*last - *first),
        _ => 0.0,
    };

    let gaps: Vec<f64> = timestamps
        .windows(2)
        .map(|pair| delta_hours(pair[1] - pair[0]))
        .collect();
    let avg_delta_hours = if gaps.is_empty() {
        0.0
    } else {
        gaps.iter().sum::<f64>() / gaps.len() as f64
    };

    let activity_rate_per_day = timestamps.len() as f64 / (duration_days + RATE_EPSILON);

    TemporalFeatures {
        duration_days,
        avg_delta_hours,
        activity_rate_per_day,
    }
}

pub fn extract_unstructured_features(activities: &[Activity]) -> UnstructuredFeatures {
    let total_note_words = activities
        .iter()
        .filter(|a| a.activity_type.as_deref() == Some("Note"))
        .filter_map(|a| a.description.as_deref())
        .map(|text| text.split_whitespace().count() as i64)
        .sum();
    UnstructuredFeatures { total_note_words }
}

/// Feature row for one merged deal, plus its unknown-type activity count.
pub fn extract_features(row: &DealActivities) -> (FeatureRow, usize) {
    let (counts, unknown) = count_activity_types(&row.activities);
    let feature_row = FeatureRow {
        deal_id: row.deal.deal_id.clone(),
        outcome: row.deal.outcome,
        counts,
        temporal: extract_temporal_features(&row.activities),
        unstructured: extract_unstructured_features(&row.activities),
    };
    (feature_row, unknown)
}

pub fn extract_all(rows: &[DealActivities]) -> (Vec<FeatureRow>, usize) {
    let mut unknown_types = 0;
    let features = rows
        .iter()
        .map(|row| {
            let (features, unknown) = extract_features(row);
            unknown_types += unknown;
            features
        })
        .collect();
    (features, unknown_types)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::record::Deal;
    use chrono::{DateTime, Utc};
    use serde_json::{json, Map, Value};

    fn activity(kind: &str, ts: &str, description: Option<&str>) -> Activity {
        Activity {
            activity_id: None,
            deal_id: "d1".to_string(),
            activity_type: Some(kind.to_string()),
            timestamp: DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc),
            raw_timestamp: Value::String(ts.to_string()),
            description: description.map(str::to_string),
            owner_id: None,
        }
    }

    fn merged(activities: Vec<Activity>) -> DealActivities {
        DealActivities {
            deal: Deal {
                deal_id: "d1".to_string(),
                outcome: Outcome::Won,
                properties: Map::new(),
            },
            activities,
        }
    }

    #[test]
    fn test_call_then_note_scenario() {
        let row = merged(vec![
            activity("Call", "2024-03-01T09:00:00Z", None),
            activity("Note", "2024-03-01T10:00:00Z", Some("hello world")),
        ]);

        let (features, unknown) = extract_features(&row);
        assert_eq!(unknown, 0);
        assert_eq!(features.counts.call, 1);
        assert_eq!(features.counts.note, 1);
        assert_eq!(features.counts.email, 0);
        assert_eq!(features.counts.meeting, 0);
        assert_eq!(features.counts.task, 0);
        assert!((features.temporal.duration_days - 1.0 / 24.0).abs() < 1e-9);
        assert!((features.temporal.avg_delta_hours - 1.0).abs() < 1e-9);
        let expected_rate = 2.0 / (1.0 / 24.0 + RATE_EPSILON);
        assert!((features.temporal.activity_rate_per_day - expected_rate).abs() < 1e-9);
        assert!((features.temporal.activity_rate_per_day - 48.0).abs() < 0.01);
        assert_eq!(features.unstructured.total_note_words, 2);
    }

    #[test]
    fn test_no_activities_are_all_zero() {
        let (features, unknown) = extract_features(&merged(vec![]));
        assert_eq!(unknown, 0);
        assert_eq!(features.counts, TypeCounts::default());
        assert_eq!(features.temporal, TemporalFeatures::default());
        assert_eq!(features.unstructured.total_note_words, 0);
    }

    #[test]
    fn test_single_activity_rate_is_degenerate() {
        let temporal =
            extract_temporal_features(&[activity("Email", "2024-03-01T09:00:00Z", None)]);
        assert_eq!(temporal.duration_days, 0.0);
        assert_eq!(temporal.avg_delta_hours, 0.0);
        assert!((temporal.activity_rate_per_day - 1.0 / RATE_EPSILON).abs() < 1e-3);
    }

    #[test]
    fn test_unparsable_raw_timestamps_zero_temporal() {
        let mut a = activity("Call", "2024-03-01T09:00:00Z", None);
        a.raw_timestamp = json!("garbage");
        let mut b = activity("Call", "2024-03-01T10:00:00Z", None);
        b.raw_timestamp = Value::Null;

        assert_eq!(extract_temporal_features(&[a, b]), TemporalFeatures::default());
    }

    #[test]
    fn test_temporal_uses_raw_values_sorted() {
        let temporal = extract_temporal_features(&[
            activity("Call", "2024-03-03T00:00:00Z", None),
            activity("Call", "2024-03-01T00:00:00Z", None),
            activity("Call", "2024-03-02T00:00:00Z", None),
        ]);
        assert!((temporal.duration_days - 2.0).abs() < 1e-12);
        assert!((temporal.avg_delta_hours - 24.0).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_types_are_ignored() {
        let activities = vec![
            activity("Call", "2024-03-01T09:00:00Z", None),
            activity("call", "2024-03-01T09:00:00Z", None),
            activity("SMS", "2024-03-01T09:00:00Z", None),
            activity("Meeting", "2024-03-01T09:00:00Z", None),
        ];

        let (counts, unknown) = count_activity_types(&activities);
        assert_eq!(counts.call, 1);
        assert_eq!(counts.meeting, 1);
        assert_eq!(unknown, 2);
        let counted = counts.email + counts.meeting + counts.task + counts.note + counts.call;
        assert_eq!(counted + unknown as i64, activities.len() as i64);
    }

    #[test]
    fn test_note_words_only_from_notes() {
        let activities = vec![
            activity("Note", "2024-03-01T09:00:00Z", Some("  spaced\tout\nwords, here ")),
            activity("Email", "2024-03-01T09:00:00Z", Some("not counted at all")),
            activity("note", "2024-03-01T09:00:00Z", Some("nor this")),
            activity("Note", "2024-03-01T09:00:00Z", None),
        ];

        assert_eq!(extract_unstructured_features(&activities).total_note_words, 4);
    }

    #[test]
    fn test_duration_is_never_negative() {
        let temporal = extract_temporal_features(&[
            activity("Task", "2024-03-05T00:00:00Z", None),
            activity("Task", "2024-03-05T00:00:00Z", None),
        ]);
        assert_eq!(temporal.duration_days, 0.0);
        assert_eq!(temporal.avg_delta_hours, 0.0);
        assert!((temporal.activity_rate_per_day - 2.0 / RATE_EPSILON).abs() < 1e-3);
    }
}
