//! Per-identity version history.
//!
//! Every node, connector link and tag link may have several versions, each
//! valid over a half-open interval `[valid_from, valid_to)`. The index
//! groups versions by identity and keeps each group sorted by `valid_from`,
//! so the version valid at a point in time is one binary search away.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::category::Category;
use crate::payload::{ColumnLayout, cell_f64, cell_i64, cell_is_null, parse_timestamp};
use crate::source::{Event, EventSource, EventSources, SourceError};
use crate::types::{ConnectorId, NodeId, Point3, SkeletonId};

/// Errors raised while turning rows into typed versions.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HistoryError {
    #[error(transparent)]
    Source(#[from] SourceError),

    /// A required column is missing or has the wrong type.
    #[error("skeleton {skeleton_id}: {category} row {index} has no valid {field} in column {column}")]
    MalformedRow {
        skeleton_id: SkeletonId,
        category: Category,
        index: usize,
        field: &'static str,
        column: usize,
    },
}

/// A record with an identity and a validity interval.
pub trait Versioned {
    type Key: Ord + Clone + fmt::Debug;

    fn key(&self) -> Self::Key;

    fn valid_from(&self) -> DateTime<Utc>;

    /// End of validity; `None` while the version is still current.
    fn valid_to(&self) -> Option<DateTime<Utc>>;

    /// Whether this version's interval contains `at`.
    fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.valid_from() <= at && self.valid_to().is_none_or(|end| at < end)
    }

    /// Whether the two validity intervals share at least one instant.
    fn overlaps<V: Versioned + ?Sized>(&self, other: &V) -> bool {
        let self_ends_after = self.valid_to().is_none_or(|end| other.valid_from() < end);
        let other_ends_after = other.valid_to().is_none_or(|end| self.valid_from() < end);
        self_ends_after && other_ends_after
    }
}

/// One version of a tree node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeVersion {
    pub id: NodeId,
    /// `None` for a root.
    pub parent: Option<NodeId>,
    pub position: Point3,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
}

impl Versioned for NodeVersion {
    type Key = NodeId;

    fn key(&self) -> NodeId {
        self.id
    }

    fn valid_from(&self) -> DateTime<Utc> {
        self.valid_from
    }

    fn valid_to(&self) -> Option<DateTime<Utc>> {
        self.valid_to
    }
}

/// How a node takes part in a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// The node is presynaptic to the connector (an outgoing link).
    Presynaptic,
    /// The node is postsynaptic to the connector (an incoming link).
    Postsynaptic,
    /// Any other relation code, such as gap junctions or attachments.
    Other(i64),
}

impl Relation {
    /// Maps the provider's relation code.
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Presynaptic,
            1 => Self::Postsynaptic,
            other => Self::Other(other),
        }
    }
}

/// Identity of a connector link: which node links to which connector, how.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ConnectorLink {
    pub connector: ConnectorId,
    pub node: NodeId,
    pub relation: Relation,
}

/// One version of a node-to-connector link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkVersion {
    pub node: NodeId,
    pub connector: ConnectorId,
    pub relation: Relation,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
}

impl Versioned for LinkVersion {
    type Key = ConnectorLink;

    fn key(&self) -> ConnectorLink {
        ConnectorLink {
            connector: self.connector,
            node: self.node,
            relation: self.relation,
        }
    }

    fn valid_from(&self) -> DateTime<Utc> {
        self.valid_from
    }

    fn valid_to(&self) -> Option<DateTime<Utc>> {
        self.valid_to
    }
}

/// One version of a label attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagVersion {
    pub node: NodeId,
    pub label: String,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
}

impl Versioned for TagVersion {
    type Key = (NodeId, String);

    fn key(&self) -> (NodeId, String) {
        (self.node, self.label.clone())
    }

    fn valid_from(&self) -> DateTime<Utc> {
        self.valid_from
    }

    fn valid_to(&self) -> Option<DateTime<Utc>> {
        self.valid_to
    }
}

/// Identity to its versions, each list sorted ascending by `valid_from`.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryIndex<T: Versioned> {
    chains: BTreeMap<T::Key, Vec<T>>,
}

impl<T: Versioned> Default for HistoryIndex<T> {
    fn default() -> Self {
        Self {
            chains: BTreeMap::new(),
        }
    }
}

impl<T: Versioned> HistoryIndex<T> {
    /// Groups versions by identity. Versions with equal `valid_from` keep
    /// their input order.
    pub fn from_versions(versions: impl IntoIterator<Item = T>) -> Self {
        let mut chains: BTreeMap<T::Key, Vec<T>> = BTreeMap::new();
        for version in versions {
            chains.entry(version.key()).or_default().push(version);
        }
        for chain in chains.values_mut() {
            chain.sort_by_key(T::valid_from);
        }
        Self { chains }
    }

    /// Number of distinct identities.
    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Total number of versions over all identities.
    pub fn version_count(&self) -> usize {
        self.chains.values().map(Vec::len).sum()
    }

    /// All versions of one identity, oldest first.
    pub fn versions(&self, key: &T::Key) -> &[T] {
        self.chains.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Identities with their version lists, in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&T::Key, &[T])> {
        self.chains.iter().map(|(key, chain)| (key, chain.as_slice()))
    }

    /// The version of `key` in effect at `at`.
    ///
    /// That is the latest version with `valid_from <= at`. If its validity
    /// already ended at `at`, the identity was deleted and `None` is
    /// returned; `None` is also returned before the first version.
    pub fn latest_at(&self, key: &T::Key, at: DateTime<Utc>) -> Option<&T> {
        latest_in_chain(self.versions(key), at)
    }

    /// Every identity's version in effect at `at`, in key order.
    pub fn state_at(&self, at: DateTime<Utc>) -> impl Iterator<Item = &T> {
        self.chains
            .values()
            .filter_map(move |chain| latest_in_chain(chain, at))
    }

    fn map_versions(&self, mut f: impl FnMut(&T) -> T) -> Self
    where
        T: Clone,
    {
        let chains = self
            .chains
            .iter()
            .map(|(key, chain)| (key.clone(), chain.iter().map(&mut f).collect()))
            .collect();
        Self { chains }
    }
}

fn latest_in_chain<T: Versioned>(chain: &[T], at: DateTime<Utc>) -> Option<&T> {
    let after = chain.partition_point(|version| version.valid_from() <= at);
    let version = chain.get(after.checked_sub(1)?)?;
    version.is_valid_at(at).then_some(version)
}

/// Structural history of one skeleton.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    pub nodes: HistoryIndex<NodeVersion>,
    pub connectors: HistoryIndex<LinkVersion>,
    pub tags: HistoryIndex<TagVersion>,
}

impl History {
    /// Applies [`resolve_dangling_parents`] to the node index.
    ///
    /// Returns the rewritten history and the number of rewritten versions.
    #[must_use]
    pub fn with_resolved_parents(&self) -> (Self, usize) {
        let (nodes, rewritten) = resolve_dangling_parents(&self.nodes);
        let history = Self {
            nodes,
            connectors: self.connectors.clone(),
            tags: self.tags.clone(),
        };
        (history, rewritten)
    }
}

/// Builds the structural history (nodes, connector links, tags) from the
/// event sources of one skeleton. Reviews carry no structure and are ignored.
pub fn build_history(
    sources: &EventSources<'_>,
    layout: &ColumnLayout,
) -> Result<History, HistoryError> {
    let nodes = parse_all(&sources.nodes, |event| node_version(event, layout))?;
    let connectors = parse_all(&sources.connectors, |event| link_version(event, layout))?;
    let tags = parse_all(&sources.tags, |event| tag_version(event, layout))?;

    let history = History {
        nodes: HistoryIndex::from_versions(nodes),
        connectors: HistoryIndex::from_versions(connectors),
        tags: HistoryIndex::from_versions(tags),
    };

    tracing::debug!(
        skeleton_id = %sources.nodes.skeleton_id(),
        nodes = history.nodes.len(),
        node_versions = history.nodes.version_count(),
        links = history.connectors.len(),
        tags = history.tags.len(),
        "built history index"
    );
    Ok(history)
}

/// Rewrites parent references that cannot be satisfied to `None`.
///
/// A node version's parent is dangling when the parent identity has no
/// version whose validity overlaps the child version's, or when a node
/// names itself. Such versions become (synthetic) roots. The input is left
/// untouched; the rewritten index and the rewrite count are returned.
pub fn resolve_dangling_parents(
    nodes: &HistoryIndex<NodeVersion>,
) -> (HistoryIndex<NodeVersion>, usize) {
    let mut rewritten = 0;
    let resolved = nodes.map_versions(|version| {
        let Some(parent) = version.parent else {
            return version.clone();
        };
        let satisfiable = parent != version.id
            && nodes
                .versions(&parent)
                .iter()
                .any(|candidate| candidate.overlaps(version));
        if satisfiable {
            version.clone()
        } else {
            tracing::trace!(node = %version.id, %parent, "parent unavailable, treating as root");
            rewritten += 1;
            NodeVersion {
                parent: None,
                ..version.clone()
            }
        }
    });

    if rewritten > 0 {
        tracing::debug!(rewritten, "resolved dangling parent references");
    }
    (resolved, rewritten)
}

fn parse_all<T>(
    source: &EventSource<'_>,
    parse: impl Fn(&Event<'_>) -> Result<T, HistoryError>,
) -> Result<Vec<T>, HistoryError> {
    source.iter().map(|event| parse(&event)).collect()
}

struct RowReader<'e, 'a> {
    event: &'e Event<'a>,
}

impl RowReader<'_, '_> {
    fn malformed(&self, field: &'static str, column: usize) -> HistoryError {
        HistoryError::MalformedRow {
            skeleton_id: self.event.skeleton_id,
            category: self.event.category,
            index: self.event.index,
            field,
            column,
        }
    }

    fn int(&self, field: &'static str, column: usize) -> Result<i64, HistoryError> {
        cell_i64(self.event.payload, column).ok_or_else(|| self.malformed(field, column))
    }

    fn optional_int(&self, field: &'static str, column: usize) -> Result<Option<i64>, HistoryError> {
        if cell_is_null(self.event.payload, column) {
            return Ok(None);
        }
        self.int(field, column).map(Some)
    }

    fn float(&self, field: &'static str, column: usize) -> Result<f64, HistoryError> {
        cell_f64(self.event.payload, column).ok_or_else(|| self.malformed(field, column))
    }

    fn valid_to(&self, column: usize) -> Result<Option<DateTime<Utc>>, HistoryError> {
        if cell_is_null(self.event.payload, column) {
            return Ok(None);
        }
        let value = self.event.payload.get(column).unwrap_or(&Value::Null);
        parse_timestamp(value).map(Some).ok_or_else(|| {
            SourceError::InvalidTimestamp {
                skeleton_id: self.event.skeleton_id,
                category: self.event.category,
                index: self.event.index,
                value: value.to_string(),
            }
            .into()
        })
    }
}

fn node_version(event: &Event<'_>, layout: &ColumnLayout) -> Result<NodeVersion, HistoryError> {
    let columns = &layout.nodes;
    let row = RowReader { event };
    Ok(NodeVersion {
        id: row.int("id", columns.id)?.into(),
        parent: row.optional_int("parent", columns.parent)?.map(NodeId::from),
        position: Point3::new(
            row.float("x", columns.x)?,
            row.float("y", columns.y)?,
            row.float("z", columns.z)?,
        ),
        valid_from: event.timestamp,
        valid_to: row.valid_to(columns.valid_to)?,
    })
}

fn link_version(event: &Event<'_>, layout: &ColumnLayout) -> Result<LinkVersion, HistoryError> {
    let columns = &layout.connectors;
    let row = RowReader { event };
    Ok(LinkVersion {
        node: row.int("node", columns.node)?.into(),
        connector: row.int("connector", columns.connector)?.into(),
        relation: Relation::from_code(row.int("relation", columns.relation)?),
        valid_from: event.timestamp,
        valid_to: row.valid_to(columns.valid_to)?,
    })
}

fn tag_version(event: &Event<'_>, layout: &ColumnLayout) -> Result<TagVersion, HistoryError> {
    let columns = &layout.tags;
    let row = RowReader { event };
    Ok(TagVersion {
        node: row.int("node", columns.node)?.into(),
        label: event.label.unwrap_or_default().to_string(),
        valid_from: event.timestamp,
        valid_to: row.valid_to(columns.valid_to)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeDelta;
    use serde_json::json;

    use crate::payload::SkeletonDetail;

    fn ts(minutes: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + TimeDelta::minutes(minutes)
    }

    fn node(id: i64, parent: Option<i64>, from: i64, to: Option<i64>) -> NodeVersion {
        NodeVersion {
            id: NodeId::new(id),
            parent: parent.map(NodeId::new),
            position: Point3::default(),
            valid_from: ts(from),
            valid_to: to.map(ts),
        }
    }

    #[test]
    fn chains_are_sorted_by_valid_from() {
        let index = HistoryIndex::from_versions([
            node(5, None, 10, None),
            node(5, None, 0, Some(10)),
            node(6, Some(5), 3, None),
        ]);

        assert_eq!(index.len(), 2);
        assert_eq!(index.version_count(), 3);
        let froms: Vec<_> = index
            .versions(&NodeId::new(5))
            .iter()
            .map(|v| v.valid_from)
            .collect();
        assert_eq!(froms, vec![ts(0), ts(10)]);
        assert!(index.versions(&NodeId::new(99)).is_empty());
    }

    #[test]
    fn latest_at_picks_version_in_effect() {
        let index = HistoryIndex::from_versions([
            node(5, None, 0, Some(10)),
            node(5, None, 10, None),
        ]);
        let id = NodeId::new(5);

        assert!(index.latest_at(&id, ts(-1)).is_none());
        assert_eq!(index.latest_at(&id, ts(5)).unwrap().valid_from, ts(0));
        assert_eq!(index.latest_at(&id, ts(10)).unwrap().valid_from, ts(10));
        assert_eq!(index.latest_at(&id, ts(15)).unwrap().valid_from, ts(10));
    }

    #[test]
    fn closed_latest_version_means_deleted() {
        let index = HistoryIndex::from_versions([node(7, None, 0, Some(20))]);
        let id = NodeId::new(7);

        assert!(index.latest_at(&id, ts(19)).is_some());
        assert!(index.latest_at(&id, ts(20)).is_none());
        assert_eq!(index.state_at(ts(30)).count(), 0);
    }

    #[test]
    fn validity_is_half_open() {
        let closed = node(1, None, 0, Some(10));
        assert!(!closed.is_valid_at(ts(-1)));
        assert!(closed.is_valid_at(ts(0)));
        assert!(closed.is_valid_at(ts(9)));
        assert!(!closed.is_valid_at(ts(10)));
        assert!(node(1, None, 0, None).is_valid_at(ts(1_000_000)));
    }

    #[test]
    fn overlap_is_half_open() {
        let a = node(1, None, 0, Some(10));
        assert!(a.overlaps(&node(2, None, 5, None)));
        assert!(a.overlaps(&node(2, None, -5, Some(1))));
        assert!(!a.overlaps(&node(2, None, 10, None)));
        assert!(!a.overlaps(&node(2, None, -5, Some(0))));
        assert!(node(1, None, 0, None).overlaps(&node(2, None, 100, None)));
    }

    #[test]
    fn missing_parent_becomes_root() {
        let nodes = HistoryIndex::from_versions([
            node(1, None, 0, None),
            node(2, Some(1), 1, None),
            node(3, Some(404), 2, None),
        ]);

        let (resolved, rewritten) = resolve_dangling_parents(&nodes);

        assert_eq!(rewritten, 1);
        assert_eq!(resolved.versions(&NodeId::new(3))[0].parent, None);
        assert_eq!(
            resolved.versions(&NodeId::new(2))[0].parent,
            Some(NodeId::new(1))
        );
        // Input is untouched.
        assert_eq!(nodes.versions(&NodeId::new(3))[0].parent, Some(NodeId::new(404)));
    }

    #[test]
    fn parent_without_overlapping_version_becomes_root() {
        let nodes = HistoryIndex::from_versions([
            node(1, None, 0, Some(5)),
            node(2, Some(1), 6, None),
        ]);

        let (resolved, rewritten) = resolve_dangling_parents(&nodes);

        assert_eq!(rewritten, 1);
        assert_eq!(resolved.versions(&NodeId::new(2))[0].parent, None);
    }

    #[test]
    fn self_reference_becomes_root() {
        let nodes = HistoryIndex::from_versions([
            node(5, None, 0, Some(10)),
            node(5, Some(5), 10, None),
        ]);

        let (resolved, rewritten) = resolve_dangling_parents(&nodes);

        assert_eq!(rewritten, 1);
        assert!(resolved.versions(&NodeId::new(5)).iter().all(|v| v.parent.is_none()));
    }

    fn detail(value: serde_json::Value) -> SkeletonDetail {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn build_history_parses_all_structural_categories() {
        let detail = detail(json!([
            [
                [1, null, 3, 0.0, 0.0, 0.0, -1, 5, "2016-01-01T10:00:00Z", "2016-01-01T11:00:00Z"],
                [1, null, 3, 5.0, 0.0, 0.0, -1, 5, "2016-01-01T11:00:00Z", null],
                [2, 1, 3, 10.0, 0.0, 0.0, -1, 5, "2016-01-01T10:05:00Z", null]
            ],
            [[2, 100, 1, 0.0, 0.0, 0.0, "2016-01-01T10:06:00Z", null]],
            {"ends": [[2, 3, "2016-01-01T10:07:00Z", null]]},
            [[3, 1, 99, "2016-01-02T09:00:00Z"]]
        ]));
        let sources =
            EventSources::from_detail(SkeletonId::new(9), &detail, &ColumnLayout::default())
                .unwrap();

        let history = build_history(&sources, &ColumnLayout::default()).unwrap();

        assert_eq!(history.nodes.len(), 2);
        assert_eq!(history.nodes.version_count(), 3);
        let latest = history.nodes.versions(&NodeId::new(1)).last().unwrap();
        assert!((latest.position.x - 5.0).abs() < f64::EPSILON);
        assert_eq!(latest.valid_to, None);

        let (key, links) = history.connectors.iter().next().unwrap();
        assert_eq!(key.relation, Relation::Postsynaptic);
        assert_eq!(links[0].connector, ConnectorId::new(100));

        let (tag_key, _) = history.tags.iter().next().unwrap();
        assert_eq!(tag_key, &(NodeId::new(2), "ends".to_string()));
    }

    #[test]
    fn malformed_node_row_is_reported() {
        let detail = detail(json!([
            [[1, "root?", 3, 0.0, 0.0, 0.0, -1, 5, "2016-01-01T10:00:00Z", null]],
            [],
            {},
            []
        ]));
        let sources =
            EventSources::from_detail(SkeletonId::new(9), &detail, &ColumnLayout::default())
                .unwrap();

        let err = build_history(&sources, &ColumnLayout::default()).unwrap_err();

        assert_eq!(
            err,
            HistoryError::MalformedRow {
                skeleton_id: SkeletonId::new(9),
                category: Category::Nodes,
                index: 0,
                field: "parent",
                column: 1,
            }
        );
    }

    #[test]
    fn invalid_valid_to_is_an_invalid_timestamp() {
        let detail = detail(json!([
            [[1, null, 3, 0.0, 0.0, 0.0, -1, 5, "2016-01-01T10:00:00Z", "later"]],
            [],
            {},
            []
        ]));
        let sources =
            EventSources::from_detail(SkeletonId::new(9), &detail, &ColumnLayout::default())
                .unwrap();

        let err = build_history(&sources, &ColumnLayout::default()).unwrap_err();

        assert!(matches!(
            err,
            HistoryError::Source(SourceError::InvalidTimestamp { index: 0, .. })
        ));
    }

    #[test]
    fn relation_codes() {
        assert_eq!(Relation::from_code(0), Relation::Presynaptic);
        assert_eq!(Relation::from_code(1), Relation::Postsynaptic);
        assert_eq!(Relation::from_code(4), Relation::Other(4));
    }
}
