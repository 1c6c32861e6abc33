//! Left join of the deal table against the activity groups

use crate::pipeline::aggregate::ActivityGroups;
use crate::pipeline::record::{Activity, Deal};
use std::collections::HashSet;

/// A deal together with its time-ordered activities (possibly none).
#[derive(Debug, Clone, PartialEq)]
pub struct DealActivities {
    pub deal: Deal,
    pub activities: Vec<Activity>,
}

#[derive(Debug, Clone, Default)]
pub struct MergedDeals {
    pub rows: Vec<DealActivities>,
    /// Deals that matched no activity group.
    pub without_activities: usize,
    /// Activities whose deal_id matched no deal; never joined.
    pub orphaned_activities: usize,
}

/// Every deal appears exactly once, in input order. Groups are looked up, not
/// consumed, so a deal_id shared by several deals gives each the same list.
pub fn left_join(deals: Vec<Deal>, groups: &ActivityGroups) -> MergedDeals {
    let known: HashSet<&str> = deals.iter().map(|d| d.deal_id.as_str()).collect();
    let orphaned_activities = groups
        .iter()
        .filter(|(deal_id, _)| !known.contains(deal_id.as_str()))
        .map(|(_, activities)| activities.len())
        .sum();

    let mut without_activities = 0;
    let rows: Vec<DealActivities> = deals
        .into_iter()
        .map(|deal| {
            let activities = groups.get(&deal.deal_id).cloned().unwrap_or_default();
            if activities.is_empty() {
                without_activities += 1;
            }
            DealActivities { deal, activities }
        })
        .collect();

    tracing::info!(
        "Merged {} deals with activities ({} without activities, {} orphaned activities)",
        rows.len(),
        without_activities,
        orphaned_activities
    );

    MergedDeals {
        rows,
        without_activities,
        orphaned_activities,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::aggregate::group_by_deal;
    use crate::pipeline::record::Outcome;
    use chrono::{DateTime, Utc};
    use serde_json::{Map, Value};

    fn deal(id: &str) -> Deal {
        Deal {
            deal_id: id.to_string(),
            outcome: Outcome::Won,
            properties: Map::new(),
        }
    }

    fn activity(deal_id: &str, ts: &str) -> Activity {
        Activity {
            activity_id: None,
            deal_id: deal_id.to_string(),
            activity_type: Some("Call".to_string()),
            timestamp: DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc),
            raw_timestamp: Value::String(ts.to_string()),
            description: None,
            owner_id: None,
        }
    }

    #[test]
    fn test_every_deal_once_in_order() {
        let deals = vec![deal("d3"), deal("d1"), deal("d2")];
        let groups = group_by_deal(vec![
            activity("d1", "2024-01-01T00:00:00Z"),
            activity("d1", "2024-01-02T00:00:00Z"),
        ]);

        let merged = left_join(deals, &groups);
        let ids: Vec<_> = merged.rows.iter().map(|r| r.deal.deal_id.as_str()).collect();
        assert_eq!(ids, vec!["d3", "d1", "d2"]);
        assert_eq!(merged.rows[1].activities.len(), 2);
        assert!(merged.rows[0].activities.is_empty());
        assert_eq!(merged.without_activities, 2);
    }

    #[test]
    fn test_orphans_never_create_rows() {
        let deals = vec![deal("d1")];
        let groups = group_by_deal(vec![
            activity("d99", "2024-01-01T00:00:00Z"),
            activity("d99", "2024-01-02T00:00:00Z"),
        ]);

        let merged = left_join(deals, &groups);
        assert_eq!(merged.rows.len(), 1);
        assert_eq!(merged.rows[0].deal.deal_id, "d1");
        assert!(merged.rows[0].activities.is_empty());
        assert_eq!(merged.orphaned_activities, 2);
    }

    #[test]
    fn test_join_totality() {
        for (n_deals, n_acts) in [(0, 0), (0, 3), (5, 0), (5, 12), (3, 30)] {
            let deals: Vec<_> = (0..n_deals).map(|i| deal(&format!("d{}", i))).collect();
            let activities: Vec<_> = (0..n_acts)
                .map(|i| activity(&format!("d{}", i % 4), "2024-01-01T00:00:00Z"))
                .collect();
            let groups = group_by_deal(activities);

            let merged = left_join(deals, &groups);
            assert_eq!(merged.rows.len(), n_deals);
        }
    }
}
