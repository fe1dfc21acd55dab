//! Core engine for neuron reconstruction history.
//!
//! This crate contains the fundamental types and logic for:
//! - Event sources: wrapping payload rows as time-ordered events
//! - Merging and bout detection: tracing and review time from activity
//! - History: versioned nodes, connector links and tags
//! - Snapshots: the skeleton as it was at any instant, and its metrics
//! - Analysis: per-skeleton statistics over a batch

pub mod analysis;
pub mod bout;
pub mod category;
pub mod history;
pub mod merge;
pub mod metrics;
pub mod payload;
pub mod snapshot;
pub mod source;
pub mod types;

pub use analysis::{
    AfterReviewCutoff, AnalysisConfig, AnalysisError, BatchReport, SkeletonFailure,
    SkeletonStatistics, analyze_batch, analyze_skeleton,
};
pub use bout::{Bout, Gap, active_bouts, inactivity_gaps, total_time};
pub use category::{Category, REVIEW_CATEGORIES, TRACING_CATEGORIES, UnknownCategory};
pub use history::{History, HistoryError, build_history};
pub use merge::{SortOrder, merge_event_sources};
pub use metrics::{ConnectorCounts, SnapshotMetrics, measure};
pub use payload::{ColumnLayout, CompactDetail, SkeletonDetail};
pub use snapshot::{Snapshot, reconstruct};
pub use source::{Event, EventSource, EventSources, SourceError};
pub use types::{ConnectorId, InactivityThreshold, NodeId, SkeletonId, ValidationError};
