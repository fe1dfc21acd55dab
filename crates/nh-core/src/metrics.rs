//! Scalar metrics over a reconstructed snapshot.

use serde::Serialize;

use crate::history::Relation;
use crate::snapshot::Snapshot;

/// Summed Euclidean length of all parent-child edges.
///
/// Roots, including synthetic ones, contribute nothing.
pub fn cable_length(snapshot: &Snapshot) -> f64 {
    snapshot
        .edges
        .iter()
        .filter_map(|(child, parent)| {
            let parent = (*parent)?;
            let from = snapshot.positions.get(child)?;
            let to = snapshot.positions.get(&parent)?;
            Some(from.distance_to(to))
        })
        .sum()
}

/// Connector links by direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConnectorCounts {
    /// Outgoing links: the skeleton is presynaptic.
    pub presynaptic: usize,
    /// Incoming links: the skeleton is postsynaptic.
    pub postsynaptic: usize,
    /// Links with any other relation; not part of [`Self::total`].
    pub other: usize,
}

impl ConnectorCounts {
    /// Synaptic links in either direction.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.presynaptic + self.postsynaptic
    }
}

/// Tallies the snapshot's connector links of present nodes by direction.
pub fn connector_counts(snapshot: &Snapshot) -> ConnectorCounts {
    let mut counts = ConnectorCounts::default();
    for link in &snapshot.connector_links {
        if !snapshot.contains(link.node) {
            continue;
        }
        match link.relation {
            Relation::Presynaptic => counts.presynaptic += 1,
            Relation::Postsynaptic => counts.postsynaptic += 1,
            Relation::Other(_) => counts.other += 1,
        }
    }
    counts
}

/// Everything measured on one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SnapshotMetrics {
    pub cable_length: f64,
    pub node_count: usize,
    pub root_count: usize,
    /// Nodes without children.
    pub end_point_count: usize,
    /// Nodes with two or more children.
    pub branch_point_count: usize,
    pub connectors: ConnectorCounts,
}

/// Computes all snapshot metrics.
pub fn measure(snapshot: &Snapshot) -> SnapshotMetrics {
    let child_counts = snapshot.child_counts();
    let end_point_count = snapshot
        .nodes
        .iter()
        .filter(|node| !child_counts.contains_key(*node))
        .count();
    let branch_point_count = child_counts.values().filter(|&&count| count >= 2).count();

    SnapshotMetrics {
        cable_length: cable_length(snapshot),
        node_count: snapshot.len(),
        root_count: snapshot.roots().count(),
        end_point_count,
        branch_point_count,
        connectors: connector_counts(snapshot),
    }
}
