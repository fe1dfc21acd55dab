//! Shared utilities for CLI commands.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::Context;
use chrono::{DateTime, TimeDelta, Utc};
use nh_core::{AnalysisError, CompactDetail, SkeletonDetail, SkeletonId};
use regex::Regex;

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s+(second|minute|hour|day|week)s?\s+ago$")
        .unwrap_or_else(|e| unreachable!("static regex is valid: {e}"))
});

/// Conservative bounds for relative time parsing (~1000 years in seconds).
const MAX_RELATIVE_SECONDS: i64 = 1000 * 365 * 24 * 60 * 60;

/// Parse a datetime string as either ISO 8601 or relative to `now`.
///
/// Supports:
/// - ISO 8601: "2016-05-01T10:30:00Z"
/// - Relative: "90 seconds ago", "2 hours ago", "1 day ago", "1 week ago"
pub fn parse_datetime(s: &str, now: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let Some(caps) = RELATIVE_TIME_RE.captures(s.trim()) else {
        anyhow::bail!(
            "Invalid datetime: {s}. Use ISO 8601 (e.g., 2016-05-01T10:30:00Z) or relative (e.g., '2 hours ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative time")?;

    let seconds_per_unit = match &caps[2] {
        "second" => 1,
        "minute" => 60,
        "hour" => 60 * 60,
        "day" => 60 * 60 * 24,
        "week" => 60 * 60 * 24 * 7,
        unit => anyhow::bail!("Unknown time unit: {unit}"),
    };

    if n > MAX_RELATIVE_SECONDS / seconds_per_unit {
        anyhow::bail!("Relative time value too large: {n} {}", &caps[2]);
    }

    Ok(now - TimeDelta::seconds(n * seconds_per_unit))
}

/// Formats milliseconds as `Xh Ym`, or `Xm Ys` below one hour.
pub fn format_duration(ms: i64) -> String {
    let total_seconds = ms.max(0) / 1000;
    let hours = total_seconds / 3600;
    let minutes = total_seconds % 3600 / 60;
    let seconds = total_seconds % 60;

    if hours >= 1 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m {seconds}s")
    }
}

/// `1 bout`, `2 bouts`.
pub fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

/// Reads and parses a compact-detail payload file.
pub fn load_payload(path: &Path) -> anyhow::Result<CompactDetail> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let payload: CompactDetail = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse payload {}", path.display()))?;
    tracing::debug!(
        path = %path.display(),
        skeletons = payload.skeletons.len(),
        "loaded payload"
    );
    Ok(payload)
}

/// Looks up one skeleton, failing if the payload has no entry for it.
pub fn skeleton_detail(
    payload: &CompactDetail,
    skeleton_id: SkeletonId,
) -> Result<&SkeletonDetail, AnalysisError> {
    payload
        .get(skeleton_id)
        .ok_or(AnalysisError::MissingEntityPayload(skeleton_id))
}
