// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Batch planning: partition pending items by kind and cap batch size.
//!
//! Each payload kind routes to a different remote endpoint, so a dispatch
//! pass sends one batch per kind. Within a kind, items are ordered by
//! priority descending, then enqueue time ascending (oldest first), and
//! only the first `max_batch` items go out in this pass, bounding per-pass
//! latency and payload size regardless of queue depth.

use std::collections::BTreeMap;

use crate::sync_item::SyncItem;

/// One kind's slice of a dispatch pass.
#[derive(Debug)]
pub struct KindBatch {
    pub kind: String,
    /// Items to send this pass, in dispatch order.
    pub items: Vec<SyncItem>,
    /// Ready items of this kind left for the next pass.
    pub deferred: usize,
}

/// Plans the per-kind batches for one dispatch pass.
#[derive(Debug, Clone)]
pub struct BatchPlanner {
    pub max_batch: usize,
}

impl BatchPlanner {
    #[must_use]
    pub fn new(max_batch: usize) -> Self {
        Self { max_batch }
    }

    /// Partition `items` by kind and select each kind's bounded, ordered
    /// batch. Nothing orders one kind against another; kinds come out in
    /// stable (alphabetical) order only to keep passes deterministic.
    #[must_use]
    pub fn plan(&self, items: Vec<SyncItem>) -> Vec<KindBatch> {
        let mut groups: BTreeMap<String, Vec<SyncItem>> = BTreeMap::new();
        for item in items {
            groups.entry(item.kind.clone()).or_default().push(item);
        }

        groups
            .into_iter()
            .map(|(kind, mut group)| {
                group.sort_by(|a, b| {
                    b.priority
                        .cmp(&a.priority)
                        .then(a.enqueued_at.cmp(&b.enqueued_at))
                });
                let deferred = group.len().saturating_sub(self.max_batch);
                group.truncate(self.max_batch);
                KindBatch {
                    kind,
                    items: group,
                    deferred,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(kind: &str, priority: i32, enqueued_at: i64) -> SyncItem {
        let mut item = SyncItem::new(kind, json!({}), priority);
        item.enqueued_at = enqueued_at;
        item
    }

    #[test]
    fn test_empty_plan() {
        let planner = BatchPlanner::new(10);
        assert!(planner.plan(Vec::new()).is_empty());
    }

    #[test]
    fn test_partitions_by_kind() {
        let planner = BatchPlanner::new(10);
        let batches = planner.plan(vec![
            item("performance", 0, 1),
            item("scenario", 0, 2),
            item("performance", 0, 3),
        ]);

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].kind, "performance");
        assert_eq!(batches[0].items.len(), 2);
        assert_eq!(batches[1].kind, "scenario");
        assert_eq!(batches[1].items.len(), 1);
    }

    #[test]
    fn test_priority_descending_then_oldest_first() {
        let planner = BatchPlanner::new(10);

        // Priorities [1, 5, 3] enqueued in that order select as [5, 3, 1].
        let batches = planner.plan(vec![
            item("performance", 1, 100),
            item("performance", 5, 200),
            item("performance", 3, 300),
        ]);

        let priorities: Vec<i32> = batches[0].items.iter().map(|i| i.priority).collect();
        assert_eq!(priorities, vec![5, 3, 1]);
    }

    #[test]
    fn test_equal_priority_breaks_ties_by_age() {
        let planner = BatchPlanner::new(10);
        let batches = planner.plan(vec![
            item("settings", 2, 300),
            item("settings", 2, 100),
            item("settings", 2, 200),
        ]);

        let times: Vec<i64> = batches[0].items.iter().map(|i| i.enqueued_at).collect();
        assert_eq!(times, vec![100, 200, 300]);
    }

    #[test]
    fn test_caps_batch_and_counts_deferred() {
        let planner = BatchPlanner::new(10);
        let items: Vec<SyncItem> = (0..12).map(|i| item("performance", 0, i)).collect();

        let batches = planner.plan(items);

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].items.len(), 10);
        assert_eq!(batches[0].deferred, 2);
        // The cap keeps the oldest ten; the two newest wait.
        assert_eq!(batches[0].items.last().unwrap().enqueued_at, 9);
    }

    #[test]
    fn test_cap_applies_per_kind() {
        let planner = BatchPlanner::new(2);
        let batches = planner.plan(vec![
            item("performance", 0, 1),
            item("performance", 0, 2),
            item("performance", 0, 3),
            item("scenario", 0, 1),
        ]);

        assert_eq!(batches[0].items.len(), 2);
        assert_eq!(batches[0].deferred, 1);
        assert_eq!(batches[1].items.len(), 1);
        assert_eq!(batches[1].deferred, 0);
    }

    #[test]
    fn test_high_priority_survives_cap() {
        let planner = BatchPlanner::new(1);
        let batches = planner.plan(vec![
            item("performance", 0, 1),
            item("performance", 9, 999),
        ]);

        assert_eq!(batches[0].items.len(), 1);
        assert_eq!(batches[0].items[0].priority, 9);
    }
}
