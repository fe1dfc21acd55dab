//! Snapshot command: one skeleton reconstructed at a point in time.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use nh_core::{
    AnalysisConfig, CompactDetail, EventSources, NodeId, SkeletonId, SnapshotMetrics, build_history,
    measure, reconstruct,
};
use serde::Serialize;

use super::util::skeleton_detail;

/// Output of the snapshot command.
#[derive(Debug, Serialize)]
pub struct SnapshotReport {
    pub skeleton_id: SkeletonId,
    pub at: DateTime<Utc>,
    pub metrics: SnapshotMetrics,
    /// Parents absent at `at`, turned into roots for this snapshot.
    pub synthetic_roots: usize,
    /// Parents that never coexisted with their child, rewritten to roots.
    pub dangling_parents_resolved: usize,
    pub tags: BTreeMap<NodeId, BTreeSet<String>>,
}

/// Runs the snapshot command.
pub fn run<W: Write>(
    writer: &mut W,
    payload: &CompactDetail,
    skeleton_id: SkeletonId,
    config: &AnalysisConfig,
    at: DateTime<Utc>,
    json: bool,
) -> Result<()> {
    let detail = skeleton_detail(payload, skeleton_id)?;
    let sources = EventSources::from_detail(skeleton_id, detail, &config.columns)?;
    let (history, dangling_parents_resolved) =
        build_history(&sources, &config.columns)?.with_resolved_parents();
    let snapshot = reconstruct(&history, at);

    let report = SnapshotReport {
        skeleton_id,
        at,
        metrics: measure(&snapshot),
        synthetic_roots: snapshot.synthetic_roots,
        dangling_parents_resolved,
        tags: snapshot.tags,
    };

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        write_report(writer, &report)?;
    }
    Ok(())
}

fn write_report<W: Write>(writer: &mut W, report: &SnapshotReport) -> std::io::Result<()> {
    let metrics = &report.metrics;
    writeln!(
        writer,
        "skeleton {} at {}",
        report.skeleton_id,
        report.at.format("%Y-%m-%d %H:%M:%S")
    )?;
    if metrics.node_count == 0 {
        return writeln!(writer, "No nodes existed at this time.");
    }

    writeln!(writer, "  nodes:          {}", metrics.node_count)?;
    writeln!(writer, "  roots:          {}", metrics.root_count)?;
    writeln!(writer, "  branch points:  {}", metrics.branch_point_count)?;
    writeln!(writer, "  end points:     {}", metrics.end_point_count)?;
    writeln!(writer, "  cable length:   {:.2}", metrics.cable_length)?;
    writeln!(
        writer,
        "  connectors:     {} pre, {} post, {} other",
        metrics.connectors.presynaptic, metrics.connectors.postsynaptic, metrics.connectors.other
    )?;
    if report.synthetic_roots > 0 {
        writeln!(writer, "  synthetic roots: {}", report.synthetic_roots)?;
    }
    if report.dangling_parents_resolved > 0 {
        writeln!(
            writer,
            "  dangling parents resolved: {}",
            report.dangling_parents_resolved
        )?;
    }
    for (node, labels) in &report.tags {
        let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
        writeln!(writer, "  tag {node}: {}", labels.join(", "))?;
    }
    Ok(())
}
