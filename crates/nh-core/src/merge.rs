//! Chronological k-way merge of several event sources.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::source::{Event, EventSource, EventSources};

/// Direction of a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    fn compare(self, a: DateTime<Utc>, b: DateTime<Utc>) -> Ordering {
        match self {
            Self::Asc => a.cmp(&b),
            Self::Desc => b.cmp(&a),
        }
    }
}

/// Next unmerged event of one lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Head {
    timestamp: DateTime<Utc>,
    rank: usize,
    index: usize,
    cursor: usize,
    order: SortOrder,
}

impl Ord for Head {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order
            .compare(self.timestamp, other.timestamp)
            .then(self.rank.cmp(&other.rank))
            .then(self.index.cmp(&other.index))
    }
}

impl PartialOrd for Head {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One included source with its rows sorted in merge direction.
struct Lane<'s, 'a> {
    source: &'s EventSource<'a>,
    sorted: Vec<usize>,
}

impl<'s, 'a> Lane<'s, 'a> {
    fn new(source: &'s EventSource<'a>, order: SortOrder) -> Self {
        let mut sorted: Vec<usize> = (0..source.len()).collect();
        // Stable: equal timestamps keep input order in both directions.
        sorted.sort_by(|&a, &b| order.compare(timestamp_of(source, a), timestamp_of(source, b)));
        Self { source, sorted }
    }

    fn head(&self, rank: usize, cursor: usize, order: SortOrder) -> Option<Head> {
        let index = *self.sorted.get(cursor)?;
        Some(Head {
            timestamp: timestamp_of(self.source, index),
            rank,
            index,
            cursor,
            order,
        })
    }
}

fn timestamp_of(source: &EventSource<'_>, index: usize) -> DateTime<Utc> {
    source.timestamp(index).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Merges the sources named in `categories` into one ordered sequence.
///
/// Ties on timestamp are broken by position in `categories`, then by the
/// row's input index, so the result is deterministic. A category listed
/// twice is merged once. An empty list yields an empty sequence.
pub fn merge_event_sources<'a>(
    sources: &EventSources<'a>,
    categories: &[Category],
    order: SortOrder,
) -> Vec<Event<'a>> {
    let mut included: Vec<Category> = Vec::with_capacity(categories.len());
    for category in categories {
        if !included.contains(category) {
            included.push(*category);
        }
    }

    let lanes: Vec<Lane<'_, 'a>> = included
        .iter()
        .map(|category| Lane::new(sources.get(*category), order))
        .collect();

    let total = lanes.iter().map(|lane| lane.sorted.len()).sum();
    let mut merged = Vec::with_capacity(total);
    let mut heap: BinaryHeap<Reverse<Head>> = lanes
        .iter()
        .enumerate()
        .filter_map(|(rank, lane)| lane.head(rank, 0, order))
        .map(Reverse)
        .collect();

    while let Some(Reverse(head)) = heap.pop() {
        let lane = &lanes[head.rank];
        if let Some(event) = lane.source.get(head.index) {
            merged.push(event);
        }
        if let Some(next) = lane.head(head.rank, head.cursor + 1, order) {
            heap.push(Reverse(next));
        }
    }

    tracing::trace!(
        categories = ?included,
        ?order,
        events = merged.len(),
        "merged event sources"
    );
    merged
}
