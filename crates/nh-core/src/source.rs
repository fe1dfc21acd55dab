//! Typed, timestamped views over the raw payload rows.

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::category::Category;
use crate::payload::{ColumnLayout, Row, SkeletonDetail, TagMap, parse_timestamp};
use crate::types::SkeletonId;

/// Errors raised while wrapping raw rows.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SourceError {
    /// A row's time column could not be parsed as a point in time.
    #[error("skeleton {skeleton_id}: invalid timestamp {value} in {category} row {index}")]
    InvalidTimestamp {
        skeleton_id: SkeletonId,
        category: Category,
        index: usize,
        value: String,
    },
}

/// One edit event: a payload row together with its extracted timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event<'a> {
    pub skeleton_id: SkeletonId,
    pub timestamp: DateTime<Utc>,
    pub category: Category,
    /// Position of the row within its source.
    pub index: usize,
    /// Tag label, for rows flattened out of the tag mapping.
    pub label: Option<&'a str>,
    pub payload: &'a [Value],
}

#[derive(Debug, Clone, Copy)]
struct Entry<'a> {
    timestamp: DateTime<Utc>,
    row: &'a [Value],
    label: Option<&'a str>,
}

/// The rows of one category for one skeleton, each with a parsed timestamp.
///
/// Rows keep their input order; no sorting happens here.
#[derive(Debug, Clone)]
pub struct EventSource<'a> {
    skeleton_id: SkeletonId,
    category: Category,
    entries: Vec<Entry<'a>>,
}

impl<'a> EventSource<'a> {
    /// Wraps `rows`, reading each row's timestamp from `timestamp_column`.
    pub fn new(
        skeleton_id: SkeletonId,
        category: Category,
        rows: &'a [Row],
        timestamp_column: usize,
    ) -> Result<Self, SourceError> {
        let entries = rows
            .iter()
            .enumerate()
            .map(|(index, row)| {
                let timestamp = row_timestamp(skeleton_id, category, index, row, timestamp_column)?;
                Ok(Entry {
                    timestamp,
                    row: row.as_slice(),
                    label: None,
                })
            })
            .collect::<Result<Vec<_>, SourceError>>()?;

        Ok(Self {
            skeleton_id,
            category,
            entries,
        })
    }

    /// Flattens a tag mapping into a single source, keeping each row's label.
    ///
    /// Labels are visited in lexicographic order, rows in input order. The
    /// payload's own label order is not kept, so tag events with equal
    /// timestamps reach a merge ordered by label, then by row.
    pub fn from_tags(
        skeleton_id: SkeletonId,
        tags: &'a TagMap,
        timestamp_column: usize,
    ) -> Result<Self, SourceError> {
        let category = Category::Tags;
        let entries = tags
            .iter()
            .flat_map(|(label, rows)| rows.iter().map(move |row| (label.as_str(), row)))
            .enumerate()
            .map(|(index, (label, row))| {
                let timestamp = row_timestamp(skeleton_id, category, index, row, timestamp_column)?;
                Ok(Entry {
                    timestamp,
                    row: row.as_slice(),
                    label: Some(label),
                })
            })
            .collect::<Result<Vec<_>, SourceError>>()?;

        Ok(Self {
            skeleton_id,
            category,
            entries,
        })
    }

    pub const fn skeleton_id(&self) -> SkeletonId {
        self.skeleton_id
    }

    pub const fn category(&self) -> Category {
        self.category
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the event at `index`, if any.
    pub fn get(&self, index: usize) -> Option<Event<'a>> {
        self.entries.get(index).map(|entry| Event {
            skeleton_id: self.skeleton_id,
            timestamp: entry.timestamp,
            category: self.category,
            index,
            label: entry.label,
            payload: entry.row,
        })
    }

    /// Timestamp of the event at `index`.
    pub fn timestamp(&self, index: usize) -> Option<DateTime<Utc>> {
        self.entries.get(index).map(|entry| entry.timestamp)
    }

    /// Iterates events in input order.
    pub fn iter(&self) -> impl Iterator<Item = Event<'a>> + '_ {
        (0..self.entries.len()).filter_map(|index| self.get(index))
    }
}

fn row_timestamp(
    skeleton_id: SkeletonId,
    category: Category,
    index: usize,
    row: &[Value],
    column: usize,
) -> Result<DateTime<Utc>, SourceError> {
    let value = row.get(column).unwrap_or(&Value::Null);
    parse_timestamp(value).ok_or_else(|| SourceError::InvalidTimestamp {
        skeleton_id,
        category,
        index,
        value: value.to_string(),
    })
}

/// One event source per category for a single skeleton.
#[derive(Debug, Clone)]
pub struct EventSources<'a> {
    pub nodes: EventSource<'a>,
    pub connectors: EventSource<'a>,
    pub tags: EventSource<'a>,
    pub reviews: EventSource<'a>,
}

impl<'a> EventSources<'a> {
    /// Wraps all four members of a skeleton's payload.
    ///
    /// Fails on the first unparseable timestamp; partial sources are never
    /// returned because they could not be ordered safely.
    pub fn from_detail(
        skeleton_id: SkeletonId,
        detail: &'a SkeletonDetail,
        layout: &ColumnLayout,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            nodes: EventSource::new(
                skeleton_id,
                Category::Nodes,
                &detail.nodes,
                layout.nodes.valid_from,
            )?,
            connectors: EventSource::new(
                skeleton_id,
                Category::Connectors,
                &detail.connectors,
                layout.connectors.valid_from,
            )?,
            tags: EventSource::from_tags(skeleton_id, &detail.tags, layout.tags.valid_from)?,
            reviews: EventSource::new(
                skeleton_id,
                Category::Reviews,
                &detail.reviews,
                layout.reviews.timestamp,
            )?,
        })
    }

    /// The source for `category`.
    pub const fn get(&self, category: Category) -> &EventSource<'a> {
        match category {
            Category::Nodes => &self.nodes,
            Category::Connectors => &self.connectors,
            Category::Tags => &self.tags,
            Category::Reviews => &self.reviews,
        }
    }
}
