//! Feature table assembly

use crate::pipeline::extract::FeatureRow;
use crate::pipeline::record::ActivityKind;
use anyhow::{Context, Result};
use polars::prelude::*;

pub const OUTCOME_COLUMN: &str = "outcome";

/// Type-count columns, in output order.
pub const TYPE_COLUMNS: [ActivityKind; 5] = [
    ActivityKind::Email,
    ActivityKind::Meeting,
    ActivityKind::Task,
    ActivityKind::Note,
    ActivityKind::Call,
];

/// Model input columns, in output order (everything but `outcome`).
pub const FEATURE_COLUMNS: [&str; 9] = [
    "Email",
    "Meeting",
    "Task",
    "Note",
    "Call",
    "duration_days",
    "avg_delta_hours",
    "activity_rate_per_day",
    "total_note_words",
];

/// The assembled table. `frame` holds `outcome` plus the feature columns;
/// `deal_ids` is row-aligned with it and never part of the model input.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    pub frame: DataFrame,
    pub deal_ids: Vec<String>,
}

impl FeatureTable {
    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

/// Stack feature rows into the output table, in row order.
pub fn assemble_feature_table(rows: &[FeatureRow]) -> Result<FeatureTable> {
    let deal_ids: Vec<String> = rows.iter().map(|r| r.deal_id.clone()).collect();
    let outcome_col: Vec<i32> = rows.iter().map(|r| r.outcome.label()).collect();

    let mut columns = vec![
        Series::new("deal_id", deal_ids.clone()),
        Series::new(OUTCOME_COLUMN, outcome_col),
    ];
    for kind in TYPE_COLUMNS {
        let counts: Vec<i64> = rows.iter().map(|r| r.counts.get(kind)).collect();
        columns.push(Series::new(kind.as_str(), counts));
    }

    let duration_col: Vec<f64> = rows.iter().map(|r| r.temporal.duration_days).collect();
    let delta_col: Vec<f64> = rows.iter().map(|r| r.temporal.avg_delta_hours).collect();
    let rate_col: Vec<f64> = rows
        .iter()
        .map(|r| r.temporal.activity_rate_per_day)
        .collect();
    let words_col: Vec<i64> = rows
        .iter()
        .map(|r| r.unstructured.total_note_words)
        .collect();
    columns.push(Series::new("duration_days", duration_col));
    columns.push(Series::new("avg_delta_hours", delta_col));
    columns.push(Series::new("activity_rate_per_day", rate_col));
    columns.push(Series::new("total_note_words", words_col));

    let frame = DataFrame::new(columns)
        .context("Failed to build feature frame")?
        .drop("deal_id")
        .context("Failed to drop deal_id column")?
        .fill_null(FillNullStrategy::Zero)
        .context("Failed to fill missing feature values")?;

    tracing::info!(
        "Assembled feature table: {} rows x {} columns",
        frame.height(),
        frame.width()
    );

    Ok(FeatureTable { frame, deal_ids })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extract::{TemporalFeatures, TypeCounts, UnstructuredFeatures};
    use crate::pipeline::record::Outcome;

    fn row(deal_id: &str, outcome: Outcome, calls: i64) -> FeatureRow {
        FeatureRow {
            deal_id: deal_id.to_string(),
            outcome,
            counts: TypeCounts {
                call: calls,
                ..TypeCounts::default()
            },
            temporal: TemporalFeatures {
                duration_days: 1.5,
                avg_delta_hours: 2.0,
                activity_rate_per_day: 3.0,
            },
            unstructured: UnstructuredFeatures { total_note_words: 4 },
        }
    }

    #[test]
    fn test_column_order_and_no_deal_id() {
        let table =
            assemble_feature_table(&[row("d1", Outcome::Won, 2), row("d2", Outcome::Lost, 0)])
                .unwrap();

        let mut expected = vec![OUTCOME_COLUMN.to_string()];
        expected.extend(FEATURE_COLUMNS.iter().map(|c| c.to_string()));
        assert_eq!(table.column_names(), expected);
        assert_eq!(table.deal_ids, vec!["d1", "d2"]);
        assert_eq!(table.height(), 2);
    }

    #[test]
    fn test_values_follow_rows() {
        let table =
            assemble_feature_table(&[row("d1", Outcome::Won, 2), row("d2", Outcome::Lost, 0)])
                .unwrap();

        let outcome = table.frame.column("outcome").unwrap().i32().unwrap();
        assert_eq!(outcome.get(0), Some(1));
        assert_eq!(outcome.get(1), Some(0));
        let calls = table.frame.column("Call").unwrap().i64().unwrap();
        assert_eq!(calls.get(0), Some(2));
        assert_eq!(calls.get(1), Some(0));
        assert_eq!(table.frame.column("Email").unwrap().null_count(), 0);
    }

    #[test]
    fn test_empty_table_keeps_schema() {
        let table = assemble_feature_table(&[]).unwrap();
        assert_eq!(table.height(), 0);
        assert_eq!(table.frame.width(), FEATURE_COLUMNS.len() + 1);
    }
}
