//! Deals + activities → feature table pipeline
//!
//! Stages, leaves first:
//! 1. Loading JSON exports into raw records
//! 2. Normalizing won/lost deals into one labeled table
//! 3. Aggregating activities into time-ordered groups per deal
//! 4. Left-joining deals with their activity groups
//! 5. Extracting a fixed-schema feature row per deal
//! 6. Assembling the rows into the feature table

pub mod record;
pub mod normalize;
pub mod aggregate;
pub mod merge;
pub mod extract;
pub mod assemble;

pub use record::*;
pub use normalize::*;
pub use aggregate::*;
pub use merge::*;
pub use extract::*;
pub use assemble::*;

use anyhow::Result;
use std::path::Path;

/// Counts of everything the run skipped or noticed without failing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub deals: usize,
    pub renamed_ids: usize,
    pub duplicate_deal_ids: usize,
    pub activities_in: usize,
    pub activities_kept: usize,
    pub dropped: ActivityDrops,
    pub orphaned_activities: usize,
    pub deals_without_activities: usize,
    pub unknown_activity_types: usize,
}

impl PipelineReport {
    pub fn log(&self) {
        tracing::info!(
            "Pipeline: {} deals, {}/{} activities kept, {} dropped ({} without deal_id, {} bad timestamps), {} orphaned, {} unknown types",
            self.deals,
            self.activities_kept,
            self.activities_in,
            self.dropped.total(),
            self.dropped.missing_deal_id,
            self.dropped.bad_timestamp,
            self.orphaned_activities,
            self.unknown_activity_types
        );
        if self.duplicate_deal_ids > 0 {
            tracing::warn!("{} duplicate deal ids in exports", self.duplicate_deal_ids);
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub table: FeatureTable,
    pub report: PipelineReport,
}

/// Run stages 2 to 6 over already-loaded records.
pub fn build_feature_table(
    won: Vec<RawRecord>,
    lost: Vec<RawRecord>,
    activities: &[RawRecord],
) -> Result<PipelineOutput> {
    let normalized = normalize_deals(won, lost)?;
    let aggregated = aggregate_activities(activities)?;
    let merged = left_join(normalized.deals, &aggregated.groups);
    let (rows, unknown_activity_types) = extract_all(&merged.rows);
    let table = assemble_feature_table(&rows)?;

    let report = PipelineReport {
        deals: merged.rows.len(),
        renamed_ids: normalized.renamed_ids,
        duplicate_deal_ids: normalized.duplicate_ids,
        activities_in: activities.len(),
        activities_kept: aggregated.kept,
        dropped: aggregated.dropped,
        orphaned_activities: merged.orphaned_activities,
        deals_without_activities: merged.without_activities,
        unknown_activity_types,
    };
    report.log();

    Ok(PipelineOutput { table, report })
}

/// Load the three exports and build the feature table.
pub fn run_pipeline(
    won_path: impl AsRef<Path>,
    lost_path: impl AsRef<Path>,
    activities_path: impl AsRef<Path>,
) -> Result<PipelineOutput> {
    let won = load_records(won_path)?;
    let lost = load_records(lost_path)?;
    let activities = load_records(activities_path)?;
    build_feature_table(won, lost, &activities)
}
