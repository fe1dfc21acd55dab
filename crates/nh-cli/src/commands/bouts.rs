//! Bouts command: the active bouts behind tracing or review time.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use nh_core::{
    AnalysisConfig, Bout, Category, CompactDetail, EventSources, Gap, REVIEW_CATEGORIES, SkeletonId,
    SortOrder, TRACING_CATEGORIES, active_bouts, inactivity_gaps, merge_event_sources, total_time,
};
use serde::Serialize;

use super::util::{format_duration, plural, skeleton_detail};

/// One bout, without its events.
#[derive(Debug, Serialize)]
pub struct BoutSummary {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_ms: i64,
    pub events: usize,
    /// Categories seen in the bout, in category order.
    pub categories: Vec<Category>,
}

impl From<&Bout<'_>> for BoutSummary {
    fn from(bout: &Bout<'_>) -> Self {
        let mut categories: Vec<Category> = bout.events.iter().map(|e| e.category).collect();
        categories.sort_unstable();
        categories.dedup();
        Self {
            start: bout.min_time,
            end: bout.max_time,
            duration_ms: bout.duration().num_milliseconds(),
            events: bout.len(),
            categories,
        }
    }
}

/// JSON output of the bouts command.
#[derive(Debug, Serialize)]
pub struct BoutsReport {
    pub skeleton_id: SkeletonId,
    pub categories: Vec<Category>,
    pub threshold_minutes: f64,
    pub total_ms: i64,
    pub bouts: Vec<BoutSummary>,
    pub gaps: Vec<Gap>,
}

/// Categories to merge: the requested ones, or else the tracing or review set.
pub fn event_categories(requested: &[Category], reviews: bool) -> Vec<Category> {
    let mut categories = match (requested.is_empty(), reviews) {
        (false, _) => requested.to_vec(),
        (true, true) => REVIEW_CATEGORIES.to_vec(),
        (true, false) => TRACING_CATEGORIES.to_vec(),
    };
    categories.sort_unstable();
    categories.dedup();
    categories
}

/// Runs the bouts command over the events of `categories`.
pub fn run<W: Write>(
    writer: &mut W,
    payload: &CompactDetail,
    skeleton_id: SkeletonId,
    categories: &[Category],
    config: &AnalysisConfig,
    json: bool,
) -> Result<()> {
    let detail = skeleton_detail(payload, skeleton_id)?;
    let sources = EventSources::from_detail(skeleton_id, detail, &config.columns)?;
    let events = merge_event_sources(&sources, categories, SortOrder::Asc);
    let bouts = active_bouts(&events, config.inactivity_threshold);

    let report = BoutsReport {
        skeleton_id,
        categories: categories.to_vec(),
        threshold_minutes: config.inactivity_threshold.minutes(),
        total_ms: total_time(&bouts).num_milliseconds(),
        bouts: bouts.iter().map(BoutSummary::from).collect(),
        gaps: inactivity_gaps(&bouts),
    };

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        write_report(writer, &report)?;
    }
    Ok(())
}

fn write_report<W: Write>(writer: &mut W, report: &BoutsReport) -> std::io::Result<()> {
    let kind = if report.categories == TRACING_CATEGORIES {
        "tracing".to_string()
    } else if report.categories == REVIEW_CATEGORIES {
        "review".to_string()
    } else {
        let names: Vec<&str> = report.categories.iter().map(Category::as_str).collect();
        names.join("+")
    };
    if report.bouts.is_empty() {
        return writeln!(writer, "No {kind} events for skeleton {}.", report.skeleton_id);
    }

    writeln!(
        writer,
        "{kind} bouts for skeleton {} (threshold {} min)",
        report.skeleton_id, report.threshold_minutes
    )?;
    for (i, bout) in report.bouts.iter().enumerate() {
        if let Some(gap) = i.checked_sub(1).and_then(|j| report.gaps.get(j)) {
            writeln!(
                writer,
                "  idle {}",
                format_duration(gap.duration().num_milliseconds())
            )?;
        }
        let categories: Vec<&str> = bout.categories.iter().map(Category::as_str).collect();
        writeln!(
            writer,
            "{}  {} - {}  {:>7}  {} ({})",
            i + 1,
            bout.start.format("%Y-%m-%d %H:%M:%S"),
            bout.end.format("%H:%M:%S"),
            format_duration(bout.duration_ms),
            plural(bout.events, "event"),
            categories.join(", ")
        )?;
    }
    writeln!(
        writer,
        "total: {} in {}",
        format_duration(report.total_ms),
        plural(report.bouts.len(), "bout")
    )
}
