//! Property tests over randomly generated skeleton histories.

use std::collections::BTreeSet;

use chrono::{DateTime, TimeDelta, Utc};
use proptest::prelude::*;
use serde_json::{Map, Value, json};

use nh_core::{
    Category, ColumnLayout, Event, EventSources, InactivityThreshold, NodeId, SkeletonDetail,
    SkeletonId, SortOrder, TRACING_CATEGORIES, active_bouts, build_history, measure,
    merge_event_sources, reconstruct, total_time,
};

const ALL_CATEGORIES: [Category; 4] = [
    Category::Nodes,
    Category::Connectors,
    Category::Tags,
    Category::Reviews,
];

fn ts(minutes: i64) -> String {
    (DateTime::<Utc>::UNIX_EPOCH + TimeDelta::minutes(minutes)).to_rfc3339()
}

fn valid_to(from: i64, length: Option<i64>) -> Value {
    length.map_or(Value::Null, |length| json!(ts(from + length)))
}

/// Node rows: id, parent, position, start minute and optional lifetime.
type NodeSpec = (i64, Option<i64>, (i8, i8, i8), i64, Option<i64>);
/// Connector link rows: node, connector, relation code, start, lifetime.
type LinkSpec = (i64, i64, i64, i64, Option<i64>);
/// Tag rows: label choice, node, start, lifetime.
type TagSpec = (usize, i64, i64, Option<i64>);

const LABELS: [&str; 3] = ["soma", "ends", "uncertain"];

fn node_specs() -> impl Strategy<Value = Vec<NodeSpec>> {
    prop::collection::vec(
        (
            1i64..8,
            prop::option::of(1i64..10),
            (any::<i8>(), any::<i8>(), any::<i8>()),
            0i64..120,
            prop::option::weighted(0.3, 1i64..60),
        ),
        0..14,
    )
}

fn link_specs() -> impl Strategy<Value = Vec<LinkSpec>> {
    prop::collection::vec(
        (
            1i64..8,
            100i64..104,
            0i64..3,
            0i64..120,
            prop::option::weighted(0.3, 1i64..60),
        ),
        0..6,
    )
}

fn tag_specs() -> impl Strategy<Value = Vec<TagSpec>> {
    prop::collection::vec(
        (
            0usize..LABELS.len(),
            1i64..8,
            0i64..120,
            prop::option::weighted(0.3, 1i64..60),
        ),
        0..5,
    )
}

fn review_specs() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(60i64..240, 0..6)
}

fn build_detail(
    nodes: &[NodeSpec],
    links: &[LinkSpec],
    tags: &[TagSpec],
    reviews: &[i64],
) -> SkeletonDetail {
    let nodes: Vec<Value> = nodes
        .iter()
        .map(|&(id, parent, (x, y, z), from, length)| {
            json!([id, parent, 3, x, y, z, -1, 5, ts(from), valid_to(from, length)])
        })
        .collect();
    let links: Vec<Value> = links
        .iter()
        .map(|&(node, connector, relation, from, length)| {
            json!([node, connector, relation, 0.0, 0.0, 0.0, ts(from), valid_to(from, length)])
        })
        .collect();
    let mut tag_map = Map::new();
    for &(label, node, from, length) in tags {
        let rows = tag_map
            .entry(LABELS[label])
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(rows) = rows {
            rows.push(json!([node, 3, ts(from), valid_to(from, length)]));
        }
    }
    let reviews: Vec<Value> = reviews
        .iter()
        .map(|&minute| json!([4, 1, 1, ts(minute)]))
        .collect();

    serde_json::from_value(json!([nodes, links, tag_map, reviews])).unwrap()
}

fn skeleton_details() -> impl Strategy<Value = SkeletonDetail> {
    (node_specs(), link_specs(), tag_specs(), review_specs())
        .prop_map(|(nodes, links, tags, reviews)| build_detail(&nodes, &links, &tags, &reviews))
}

/// Details whose rows all have distinct timestamps, spread over categories.
fn distinct_time_details() -> impl Strategy<Value = SkeletonDetail> {
    prop::collection::btree_set(0i64..500, 0..24)
        .prop_flat_map(|minutes| {
            let n = minutes.len();
            (Just(minutes), prop::collection::vec(0usize..4, n))
        })
        .prop_map(|(minutes, choices)| {
            let (mut nodes, mut links, mut tags, mut reviews) =
                (Vec::new(), Vec::new(), Vec::new(), Vec::new());
            for (minute, choice) in minutes.into_iter().zip(choices) {
                match choice {
                    0 => nodes.push((1, None, (0, 0, 0), minute, None)),
                    1 => links.push((1, 100, 0, minute, None)),
                    2 => tags.push((usize::try_from(minute % 3).unwrap(), 1, minute, None)),
                    _ => reviews.push(minute),
                }
            }
            build_detail(&nodes, &links, &tags, &reviews)
        })
}

fn threshold_minutes() -> impl Strategy<Value = f64> {
    prop_oneof![Just(0.0), Just(3.0), 0.0f64..90.0]
}

fn sources(detail: &SkeletonDetail) -> EventSources<'_> {
    EventSources::from_detail(SkeletonId::new(1), detail, &ColumnLayout::default()).unwrap()
}

fn keys(events: &[Event<'_>]) -> Vec<(Category, usize)> {
    events.iter().map(|e| (e.category, e.index)).collect()
}

fn minute(minutes: i64) -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + TimeDelta::minutes(minutes)
}

/// Nodes none of whose versions carry an end time.
fn never_deleted(detail: &SkeletonDetail) -> BTreeSet<NodeId> {
    let history = build_history(&sources(detail), &ColumnLayout::default()).unwrap();
    history
        .nodes
        .iter()
        .filter(|(_, versions)| versions.iter().all(|version| version.valid_to.is_none()))
        .map(|(id, _)| *id)
        .collect()
}

proptest! {
    #[test]
    fn prop_ascending_merge_is_non_decreasing(detail in skeleton_details()) {
        let sources = sources(&detail);
        let events = merge_event_sources(&sources, &ALL_CATEGORIES, SortOrder::Asc);

        let total: usize = ALL_CATEGORIES.iter().map(|&c| sources.get(c).len()).sum();
        prop_assert_eq!(events.len(), total);
        for pair in events.windows(2) {
            prop_assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[test]
    fn prop_descending_is_reversed_ascending(detail in distinct_time_details()) {
        let sources = sources(&detail);
        let ascending = merge_event_sources(&sources, &ALL_CATEGORIES, SortOrder::Asc);
        let mut descending = merge_event_sources(&sources, &ALL_CATEGORIES, SortOrder::Desc);
        descending.reverse();

        prop_assert_eq!(keys(&ascending), keys(&descending));
    }

    #[test]
    fn prop_bouts_partition_the_events(
        detail in skeleton_details(),
        minutes in threshold_minutes(),
    ) {
        let sources = sources(&detail);
        let events = merge_event_sources(&sources, &TRACING_CATEGORIES, SortOrder::Asc);
        let threshold = InactivityThreshold::from_minutes(minutes).unwrap();
        let bouts = active_bouts(&events, threshold);

        let flattened: Vec<Event<'_>> =
            bouts.iter().flat_map(|bout| bout.events.iter().copied()).collect();
        prop_assert_eq!(keys(&flattened), keys(&events));
        for bout in &bouts {
            prop_assert!(!bout.is_empty());
            for pair in bout.events.windows(2) {
                prop_assert!(pair[1].timestamp - pair[0].timestamp <= threshold.as_duration());
            }
        }
        for pair in bouts.windows(2) {
            prop_assert!(pair[1].min_time - pair[0].max_time > threshold.as_duration());
        }
    }

    #[test]
    fn prop_coverage_is_at_most_the_span(
        detail in skeleton_details(),
        minutes in threshold_minutes(),
    ) {
        let sources = sources(&detail);
        let events = merge_event_sources(&sources, &TRACING_CATEGORIES, SortOrder::Asc);
        let threshold = InactivityThreshold::from_minutes(minutes).unwrap();
        let bouts = active_bouts(&events, threshold);

        if let (Some(first), Some(last)) = (bouts.first(), bouts.last()) {
            let span = last.max_time - first.min_time;
            let total = total_time(&bouts);
            prop_assert!(total <= span);
            prop_assert_eq!(total == span, bouts.len() == 1);
        } else {
            prop_assert!(events.is_empty());
        }
    }

    #[test]
    fn prop_larger_threshold_never_adds_bouts(
        detail in skeleton_details(),
        lower in 0.0f64..60.0,
        extra in 0.0f64..60.0,
    ) {
        let sources = sources(&detail);
        let events = merge_event_sources(&sources, &TRACING_CATEGORIES, SortOrder::Asc);
        let tight = active_bouts(&events, InactivityThreshold::from_minutes(lower).unwrap());
        let loose =
            active_bouts(&events, InactivityThreshold::from_minutes(lower + extra).unwrap());

        prop_assert!(loose.len() <= tight.len());
        prop_assert!(total_time(&loose) >= total_time(&tight));
    }

    #[test]
    fn prop_reconstruction_is_deterministic(
        detail in skeleton_details(),
        cutoff in -10i64..200,
    ) {
        let layout = ColumnLayout::default();
        let (first, _) = build_history(&sources(&detail), &layout).unwrap().with_resolved_parents();
        let (second, _) =
            build_history(&sources(&detail), &layout).unwrap().with_resolved_parents();

        prop_assert_eq!(reconstruct(&first, minute(cutoff)), reconstruct(&first, minute(cutoff)));
        prop_assert_eq!(reconstruct(&first, minute(cutoff)), reconstruct(&second, minute(cutoff)));
    }

    #[test]
    fn prop_undeleted_nodes_stay_present(
        detail in skeleton_details(),
        earlier in -10i64..200,
        later_by in 0i64..200,
    ) {
        let (history, _) = build_history(&sources(&detail), &ColumnLayout::default())
            .unwrap()
            .with_resolved_parents();
        let before = reconstruct(&history, minute(earlier));
        let after = reconstruct(&history, minute(earlier + later_by));

        for node in never_deleted(&detail) {
            if before.contains(node) {
                prop_assert!(after.contains(node), "node {} disappeared", node);
            }
        }
    }

    #[test]
    fn prop_snapshot_is_closed_and_cable_non_negative(
        detail in skeleton_details(),
        cutoff in -10i64..200,
    ) {
        let (history, _) = build_history(&sources(&detail), &ColumnLayout::default())
            .unwrap()
            .with_resolved_parents();
        let snapshot = reconstruct(&history, minute(cutoff));

        for (child, parent) in &snapshot.edges {
            prop_assert!(snapshot.nodes.contains(child));
            if let Some(parent) = parent {
                prop_assert!(snapshot.nodes.contains(parent), "{} -> {}", child, parent);
            }
        }
        for link in &snapshot.connector_links {
            prop_assert!(snapshot.nodes.contains(&link.node));
        }
        for node in snapshot.tags.keys() {
            prop_assert!(snapshot.nodes.contains(node));
        }

        let metrics = measure(&snapshot);
        prop_assert!(metrics.cable_length.is_finite());
        prop_assert!(metrics.cable_length >= 0.0);
        prop_assert_eq!(metrics.node_count, snapshot.len());
    }
}
