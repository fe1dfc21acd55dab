//! Analyze command: per-skeleton tracing and review statistics.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use nh_core::{AnalysisConfig, BatchReport, CompactDetail, SkeletonId, analyze_batch};

use super::util::{format_duration, plural};

/// Runs the analyze command.
///
/// With no `skeleton_ids`, every skeleton in the payload is analyzed.
pub fn run<W: Write>(
    writer: &mut W,
    payload: &CompactDetail,
    skeleton_ids: &[SkeletonId],
    config: &AnalysisConfig,
    now: DateTime<Utc>,
    json: bool,
) -> Result<()> {
    let requested = if skeleton_ids.is_empty() {
        payload.skeleton_ids()
    } else {
        skeleton_ids.to_vec()
    };

    let report = analyze_batch(payload, &requested, config, now);

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        write_report(writer, &report)?;
    }
    Ok(())
}

fn write_report<W: Write>(writer: &mut W, report: &BatchReport) -> std::io::Result<()> {
    if report.statistics.is_empty() && report.missing.is_empty() && report.failures.is_empty() {
        return writeln!(writer, "No skeletons analyzed.");
    }

    for stats in &report.statistics {
        writeln!(writer, "skeleton {}", stats.skeleton_id)?;
        writeln!(
            writer,
            "  tracing time:  {} ({})",
            format_duration(stats.tracing_time_ms),
            plural(stats.tracing_bouts, "bout")
        )?;
        writeln!(
            writer,
            "  review time:   {} ({})",
            format_duration(stats.review_time_ms),
            plural(stats.review_bouts, "bout")
        )?;
        if let Some(first) = stats.first_review {
            writeln!(writer, "  first review:  {}", first.format("%Y-%m-%d %H:%M:%S"))?;
        }
        writeln!(
            writer,
            "  cable:         {} -> {:.2}",
            stats
                .cable_before_review()
                .map_or_else(|| "n/a".to_string(), |cable| format!("{cable:.2}")),
            stats.cable_after_review()
        )?;
        writeln!(
            writer,
            "  connectors:    {} -> {}",
            stats
                .connectors_before_review()
                .map_or_else(|| "n/a".to_string(), |count| count.to_string()),
            stats.connectors_after_review()
        )?;
        if stats.dangling_parents_resolved > 0 {
            writeln!(
                writer,
                "  dangling parents resolved: {}",
                stats.dangling_parents_resolved
            )?;
        }
    }

    if !report.missing.is_empty() {
        let missing: Vec<String> = report.missing.iter().map(ToString::to_string).collect();
        writeln!(writer, "missing: {}", missing.join(", "))?;
    }
    for failure in &report.failures {
        writeln!(writer, "failed: {}", failure.error)?;
    }
    Ok(())
}
