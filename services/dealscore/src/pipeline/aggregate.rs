//! Activity aggregation: parse, filter, group by deal, order by time

use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::record::{columns, has_column, id_value, Activity, RawRecord};
use crate::timestamp::parse_timestamp;
use std::collections::HashMap;

/// Activities per deal, each list non-empty and ordered by timestamp.
pub type ActivityGroups = HashMap<String, Vec<Activity>>;

/// Activities that did not make it into any group, by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivityDrops {
    pub missing_deal_id: usize,
    pub bad_timestamp: usize,
}

impl ActivityDrops {
    pub fn total(&self) -> usize {
        self.missing_deal_id + self.bad_timestamp
    }
}

#[derive(Debug, Clone, Default)]
pub struct AggregatedActivities {
    pub groups: ActivityGroups,
    pub kept: usize,
    pub dropped: ActivityDrops,
}

/// Turn raw records into typed activities, skipping those without a deal or
/// a parseable timestamp. Input order is preserved.
pub fn parse_activities(records: &[RawRecord]) -> (Vec<Activity>, ActivityDrops) {
    let mut activities = Vec::with_capacity(records.len());
    let mut dropped = ActivityDrops::default();

    for (idx, record) in records.iter().enumerate() {
        let Some(deal_id) = id_value(record.get("deal_id")) else {
            tracing::debug!("Dropping activity #{}: no deal_id", idx);
            dropped.missing_deal_id += 1;
            continue;
        };
        let Some(timestamp) = record.get("timestamp").and_then(parse_timestamp) else {
            tracing::debug!(
                "Dropping activity #{} for deal {}: unparsable timestamp {:?}",
                idx,
                deal_id,
                record.get("timestamp")
            );
            dropped.bad_timestamp += 1;
            continue;
        };
        activities.push(Activity::from_record(record, deal_id, timestamp));
    }

    (activities, dropped)
}

pub fn group_by_deal(activities: Vec<Activity>) -> ActivityGroups {
    let mut groups: ActivityGroups = HashMap::new();
    for activity in activities {
        groups
            .entry(activity.deal_id.clone())
            .or_default()
            .push(activity);
    }
    groups
}

/// Stable ascending sort; activities with equal timestamps keep input order.
pub fn sort_groups(groups: &mut ActivityGroups) {
    for activities in groups.values_mut() {
        activities.sort_by_key(|a| a.timestamp);
    }
}

pub fn aggregate_activities(records: &[RawRecord]) -> PipelineResult<AggregatedActivities> {
    if !has_column(records, "deal_id") {
        return Err(PipelineError::schema(format!(
            "activities must contain a 'deal_id' column (found {:?})",
            columns(records)
        )));
    }

    let (activities, dropped) = parse_activities(records);
    let kept = activities.len();

    let mut groups = group_by_deal(activities);
    sort_groups(&mut groups);

    tracing::info!(
        "Aggregated {} activities into {} deal groups ({} without deal_id, {} with bad timestamps)",
        kept,
        groups.len(),
        dropped.missing_deal_id,
        dropped.bad_timestamp
    );

    Ok(AggregatedActivities {
        groups,
        kept,
        dropped,
    })
}
