//! Backlog-size fairness tiers.
//!
//! Areas with few pending items get a low tier and drain first, so rare
//! categories finish quickly while large backlogs run in the background.

use std::collections::HashMap;

use crate::model::{Area, ItemSummary, QueueItem, Tier};

/// Upper bound (inclusive) of pending items per area for each tier.
const TIER_THRESHOLDS: [(usize, Tier); 5] = [(10, 1), (50, 2), (100, 3), (200, 4), (500, 5)];

/// Tier for areas above every threshold.
pub const MAX_TIER: Tier = 6;

/// Map a per-area pending count to its tier.
pub fn tier_for_count(count: usize) -> Tier {
    TIER_THRESHOLDS
        .iter()
        .find(|(limit, _)| count <= *limit)
        .map(|(_, tier)| *tier)
        .unwrap_or(MAX_TIER)
}

/// Recompute every item's tier from current area counts, then order by
/// `(tier, enqueue sequence)`: first-enqueued-first-served within a tier.
pub fn prioritize(items: &mut [QueueItem]) {
    let mut counts: HashMap<&Area, usize> = HashMap::new();
    for item in items.iter() {
        *counts.entry(&item.area).or_default() += 1;
    }
    let tiers: HashMap<Area, Tier> = counts
        .into_iter()
        .map(|(area, count)| (area.clone(), tier_for_count(count)))
        .collect();

    for item in items.iter_mut() {
        item.tier = tiers.get(&item.area).copied().unwrap_or(MAX_TIER);
    }
    items.sort_by_key(|item| (item.tier, item.seq));
}

/// Order `items` the way a queue would after enqueuing them one by one,
/// without dispatching anything. Later duplicates of an id are dropped.
pub fn plan(items: impl IntoIterator<Item = QueueItem>) -> Vec<ItemSummary> {
    let mut pending: Vec<QueueItem> = Vec::new();
    for (seq, mut item) in items.into_iter().enumerate() {
        if pending.iter().any(|p| p.id == item.id) {
            continue;
        }
        item.seq = seq as u64;
        pending.push(item);
    }
    prioritize(&mut pending);
    pending.iter().map(QueueItem::summary).collect()
}
