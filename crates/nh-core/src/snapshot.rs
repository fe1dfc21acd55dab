//! Point-in-time reconstruction of a skeleton.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::history::{ConnectorLink, History, Versioned};
use crate::types::{NodeId, Point3};

/// The structure of a skeleton as it was at one instant.
///
/// A plain value: it keeps no reference to the history it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub cutoff: DateTime<Utc>,
    pub nodes: BTreeSet<NodeId>,
    /// Child to parent; `None` marks a root.
    pub edges: BTreeMap<NodeId, Option<NodeId>>,
    pub positions: BTreeMap<NodeId, Point3>,
    pub connector_links: BTreeSet<ConnectorLink>,
    pub tags: BTreeMap<NodeId, BTreeSet<String>>,
    /// Parent references that named a node absent at the cutoff and were
    /// turned into roots.
    pub synthetic_roots: usize,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    /// Parent of `node`, if it has one in this snapshot.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.edges.get(&node).copied().flatten()
    }

    /// Nodes without a parent.
    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.edges
            .iter()
            .filter(|(_, parent)| parent.is_none())
            .map(|(node, _)| *node)
    }

    /// Number of children per node. Nodes without children are absent.
    pub fn child_counts(&self) -> BTreeMap<NodeId, usize> {
        let mut counts = BTreeMap::new();
        for parent in self.edges.values().flatten() {
            *counts.entry(*parent).or_insert(0) += 1;
        }
        counts
    }
}

/// Reconstructs the skeleton as of `cutoff`.
///
/// For every identity the latest version with `valid_from <= cutoff` is
/// used; identities whose version had already ended are left out. Connector
/// links and tags are kept only for nodes present at the cutoff, and parent
/// references to absent nodes become roots. Calling this twice with the
/// same arguments gives equal snapshots.
pub fn reconstruct(history: &History, cutoff: DateTime<Utc>) -> Snapshot {
    let present: Vec<_> = history.nodes.state_at(cutoff).collect();
    let nodes: BTreeSet<NodeId> = present.iter().map(|version| version.id).collect();

    let mut synthetic_roots = 0;
    let mut edges = BTreeMap::new();
    let mut positions = BTreeMap::new();
    for version in &present {
        let parent = version.parent.filter(|parent| nodes.contains(parent));
        if version.parent.is_some() && parent.is_none() {
            synthetic_roots += 1;
        }
        edges.insert(version.id, parent);
        positions.insert(version.id, version.position);
    }

    let connector_links = history
        .connectors
        .state_at(cutoff)
        .filter(|link| nodes.contains(&link.node))
        .map(Versioned::key)
        .collect();

    let mut tags: BTreeMap<NodeId, BTreeSet<String>> = BTreeMap::new();
    for tag in history.tags.state_at(cutoff) {
        if nodes.contains(&tag.node) {
            tags.entry(tag.node).or_default().insert(tag.label.clone());
        }
    }

    tracing::trace!(
        %cutoff,
        nodes = nodes.len(),
        synthetic_roots,
        "reconstructed snapshot"
    );

    Snapshot {
        cutoff,
        nodes,
        edges,
        positions,
        connector_links,
        tags,
        synthetic_roots,
    }
}
