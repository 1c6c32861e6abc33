//! Deal normalization: identifier reconciliation, outcome stamping, validation

use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::record::{columns, has_column, id_value, Deal, Outcome, RawRecord};
use serde_json::Value;
use std::collections::HashSet;

pub const REQUIRED_DEAL_COLUMNS: &[&str] = &["deal_id", "outcome"];

/// Normalized deal table plus what normalization noticed along the way.
#[derive(Debug, Clone, Default)]
pub struct NormalizedDeals {
    pub deals: Vec<Deal>,
    /// Records whose `id` field was renamed to `deal_id`.
    pub renamed_ids: usize,
    /// Deals sharing an identifier with an earlier deal.
    pub duplicate_ids: usize,
}

/// Rename `id` to `deal_id` when a record only carries the former.
pub fn reconcile_id_field(record: &mut RawRecord) -> bool {
    if record.contains_key("deal_id") {
        return false;
    }
    match record.remove("id") {
        Some(id) => {
            record.insert("deal_id".to_string(), id);
            true
        }
        None => false,
    }
}

/// Outcome is taken from the source file and overrides any field in the record.
pub fn stamp_outcome(record: &mut RawRecord, outcome: Outcome) {
    record.insert("outcome".to_string(), Value::from(outcome.label()));
}

/// Check the combined deal set before it becomes typed.
pub fn validate_deals(records: &[RawRecord]) -> PipelineResult<()> {
    let missing: Vec<&str> = REQUIRED_DEAL_COLUMNS
        .iter()
        .copied()
        .filter(|col| !has_column(records, col))
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::schema(format!(
            "missing columns in deals: {:?} (found {:?})",
            missing,
            columns(records)
        )));
    }

    let null_ids = records
        .iter()
        .filter(|r| id_value(r.get("deal_id")).is_none())
        .count();
    if null_ids > 0 {
        return Err(PipelineError::validation(format!(
            "{} deal(s) with a null deal_id",
            null_ids
        )));
    }

    Ok(())
}

/// Build the labeled deal table from the won and lost exports.
pub fn normalize_deals(won: Vec<RawRecord>, lost: Vec<RawRecord>) -> PipelineResult<NormalizedDeals> {
    let mut renamed_ids = 0;
    let mut records = Vec::with_capacity(won.len() + lost.len());
    let mut outcomes = Vec::with_capacity(won.len() + lost.len());

    let labeled = won
        .into_iter()
        .map(|r| (r, Outcome::Won))
        .chain(lost.into_iter().map(|r| (r, Outcome::Lost)));
    for (mut record, outcome) in labeled {
        if reconcile_id_field(&mut record) {
            renamed_ids += 1;
        }
        stamp_outcome(&mut record, outcome);
        records.push(record);
        outcomes.push(outcome);
    }

    validate_deals(&records)?;

    let mut seen = HashSet::new();
    let mut duplicate_ids = 0;
    let mut deals = Vec::with_capacity(records.len());
    for (mut properties, outcome) in records.into_iter().zip(outcomes) {
        // validate_deals guarantees every record has an id
        let Some(deal_id) = id_value(properties.remove("deal_id").as_ref()) else {
            continue;
        };
        properties.remove("outcome");
        if !seen.insert(deal_id.clone()) {
            tracing::warn!("Duplicate deal_id {} in {} deals", deal_id, outcome);
            duplicate_ids += 1;
        }
        deals.push(Deal {
            deal_id,
            outcome,
            properties,
        });
    }

    let won_count = deals.iter().filter(|d| d.outcome == Outcome::Won).count();
    tracing::info!(
        "Normalized {} deals ({} won, {} lost, {} renamed ids)",
        deals.len(),
        won_count,
        deals.len() - won_count,
        renamed_ids
    );

    Ok(NormalizedDeals {
        deals,
        renamed_ids,
        duplicate_ids,
    })
}
