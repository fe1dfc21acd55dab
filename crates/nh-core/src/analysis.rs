//! Per-skeleton statistics: tracing and review time, and structure before
//! and after review.
//!
//! # Pipeline
//!
//! 1. Wrap the payload members as event sources
//! 2. Merge node, connector and tag events, split them into active bouts and
//!    sum the bouts into tracing time; do the same for review events
//! 3. Build the history index and turn unavailable parents into roots
//! 4. Reconstruct the skeleton at the first review and at the configured
//!    after-review cutoff, and measure both
//!
//! Skeletons are independent, so a batch is analyzed in parallel.

use chrono::{DateTime, TimeDelta, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::bout::{active_bouts, total_time};
use crate::category::{REVIEW_CATEGORIES, TRACING_CATEGORIES};
use crate::history::{HistoryError, build_history};
use crate::merge::{SortOrder, merge_event_sources};
use crate::metrics::{SnapshotMetrics, measure};
use crate::payload::{ColumnLayout, CompactDetail, SkeletonDetail};
use crate::snapshot::reconstruct;
use crate::source::{EventSources, SourceError};
use crate::types::{InactivityThreshold, SkeletonId, ValidationError};

/// Errors from analyzing skeletons.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    History(#[from] HistoryError),

    /// The provider returned nothing for a requested skeleton.
    #[error("no payload for skeleton {0}")]
    MissingEntityPayload(SkeletonId),

    /// Configuration was rejected before any work started.
    #[error(transparent)]
    InvalidConfig(#[from] ValidationError),
}

/// Which instant the "after review" snapshot describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AfterReviewCutoff {
    /// The analysis time passed by the caller.
    #[default]
    Now,
    /// The end of the last review bout. Falls back to now without reviews.
    LastReview,
}

/// Settings shared by every skeleton in a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub inactivity_threshold: InactivityThreshold,
    pub after_review_cutoff: AfterReviewCutoff,
    pub columns: ColumnLayout,
}

impl AnalysisConfig {
    /// Builds a configuration from a raw threshold in minutes.
    pub fn with_threshold_minutes(minutes: f64) -> Result<Self, AnalysisError> {
        Ok(Self {
            inactivity_threshold: InactivityThreshold::from_minutes(minutes)?,
            ..Self::default()
        })
    }
}

/// Statistics for one skeleton.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkeletonStatistics {
    pub skeleton_id: SkeletonId,

    /// Sum of active node, connector and tag editing bouts.
    pub tracing_time_ms: i64,

    /// Sum of active review bouts.
    pub review_time_ms: i64,

    pub tracing_bouts: usize,
    pub review_bouts: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_review: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_review: Option<DateTime<Utc>>,

    /// Structure at the first review; `None` when there are no reviews.
    pub before_review: Option<SnapshotMetrics>,

    /// Structure at the after-review cutoff.
    pub after_review: SnapshotMetrics,

    /// Node versions whose parent reference was rewritten to a root.
    pub dangling_parents_resolved: usize,
}

impl SkeletonStatistics {
    pub const fn tracing_time(&self) -> TimeDelta {
        TimeDelta::milliseconds(self.tracing_time_ms)
    }

    pub const fn review_time(&self) -> TimeDelta {
        TimeDelta::milliseconds(self.review_time_ms)
    }

    pub fn cable_before_review(&self) -> Option<f64> {
        self.before_review.map(|m| m.cable_length)
    }

    pub const fn cable_after_review(&self) -> f64 {
        self.after_review.cable_length
    }

    pub fn connectors_before_review(&self) -> Option<usize> {
        self.before_review.map(|m| m.connectors.total())
    }

    pub const fn connectors_after_review(&self) -> usize {
        self.after_review.connectors.total()
    }
}

/// Analyzes one skeleton as of `now`.
///
/// Any unparseable timestamp or malformed row rejects the whole skeleton.
pub fn analyze_skeleton(
    skeleton_id: SkeletonId,
    detail: &SkeletonDetail,
    config: &AnalysisConfig,
    now: DateTime<Utc>,
) -> Result<SkeletonStatistics, AnalysisError> {
    let sources = EventSources::from_detail(skeleton_id, detail, &config.columns)?;

    let tracing_events = merge_event_sources(&sources, &TRACING_CATEGORIES, SortOrder::Asc);
    let review_events = merge_event_sources(&sources, &REVIEW_CATEGORIES, SortOrder::Asc);
    let tracing_bouts = active_bouts(&tracing_events, config.inactivity_threshold);
    let review_bouts = active_bouts(&review_events, config.inactivity_threshold);

    let first_review = review_bouts.first().map(|bout| bout.min_time);
    let last_review = review_bouts.last().map(|bout| bout.max_time);

    let (history, dangling_parents_resolved) =
        build_history(&sources, &config.columns)?.with_resolved_parents();

    let after_cutoff = match config.after_review_cutoff {
        AfterReviewCutoff::Now => now,
        AfterReviewCutoff::LastReview => last_review.unwrap_or(now),
    };
    let before_review = first_review.map(|cutoff| measure(&reconstruct(&history, cutoff)));
    let after_review = measure(&reconstruct(&history, after_cutoff));

    let statistics = SkeletonStatistics {
        skeleton_id,
        tracing_time_ms: total_time(&tracing_bouts).num_milliseconds(),
        review_time_ms: total_time(&review_bouts).num_milliseconds(),
        tracing_bouts: tracing_bouts.len(),
        review_bouts: review_bouts.len(),
        first_review,
        last_review,
        before_review,
        after_review,
        dangling_parents_resolved,
    };

    tracing::debug!(
        %skeleton_id,
        tracing_events = tracing_events.len(),
        review_events = review_events.len(),
        tracing_time_ms = statistics.tracing_time_ms,
        review_time_ms = statistics.review_time_ms,
        dangling_parents_resolved,
        "analyzed skeleton"
    );
    Ok(statistics)
}

/// A skeleton whose analysis failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkeletonFailure {
    pub skeleton_id: SkeletonId,
    #[serde(serialize_with = "serialize_display")]
    pub error: AnalysisError,
}

fn serialize_display<S: Serializer>(
    error: &AnalysisError,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// Outcome of a batch. One bad skeleton never aborts the others.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    /// Successful results, in request order.
    pub statistics: Vec<SkeletonStatistics>,
    /// Requested skeletons the payload has no entry for.
    pub missing: Vec<SkeletonId>,
    pub failures: Vec<SkeletonFailure>,
}

/// Analyzes every requested skeleton in parallel.
pub fn analyze_batch(
    payload: &CompactDetail,
    skeleton_ids: &[SkeletonId],
    config: &AnalysisConfig,
    now: DateTime<Utc>,
) -> BatchReport {
    let outcomes: Vec<(SkeletonId, Result<SkeletonStatistics, AnalysisError>)> = skeleton_ids
        .par_iter()
        .map(|&skeleton_id| {
            let result = payload
                .get(skeleton_id)
                .ok_or(AnalysisError::MissingEntityPayload(skeleton_id))
                .and_then(|detail| analyze_skeleton(skeleton_id, detail, config, now));
            (skeleton_id, result)
        })
        .collect();

    let mut report = BatchReport::default();
    for (skeleton_id, outcome) in outcomes {
        match outcome {
            Ok(statistics) => report.statistics.push(statistics),
            Err(AnalysisError::MissingEntityPayload(_)) => {
                tracing::warn!(%skeleton_id, "no skeleton details, skipping");
                report.missing.push(skeleton_id);
            }
            Err(error) => {
                tracing::warn!(%skeleton_id, %error, "skipping skeleton");
                report.failures.push(SkeletonFailure { skeleton_id, error });
            }
        }
    }

    tracing::debug!(
        requested = skeleton_ids.len(),
        analyzed = report.statistics.len(),
        missing = report.missing.len(),
        failed = report.failures.len(),
        "batch complete"
    );
    report
}
