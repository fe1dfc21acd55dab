//! Compact skeleton detail payloads as returned by the data provider.
//!
//! Every record is a positional JSON array. The engine binds to column
//! indices, never to names, so the indices live in [`ColumnLayout`] and can
//! be overridden when the provider's layout differs from the default.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::SkeletonId;

/// One positional record.
pub type Row = Vec<Value>;

/// Tag label to the rows of nodes bearing that label.
pub type TagMap = BTreeMap<String, Vec<Row>>;

/// Everything the provider returns for a single skeleton.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawSkeletonDetail", into = "RawSkeletonDetail")]
pub struct SkeletonDetail {
    pub nodes: Vec<Row>,
    pub connectors: Vec<Row>,
    pub tags: TagMap,
    pub reviews: Vec<Row>,
}

/// Wire shape: `[nodes, connectors, tags, reviews]`.
#[derive(Serialize, Deserialize)]
struct RawSkeletonDetail(Vec<Row>, Vec<Row>, TagMap, Vec<Row>);

impl From<RawSkeletonDetail> for SkeletonDetail {
    fn from(raw: RawSkeletonDetail) -> Self {
        let RawSkeletonDetail(nodes, connectors, tags, reviews) = raw;
        Self {
            nodes,
            connectors,
            tags,
            reviews,
        }
    }
}

impl From<SkeletonDetail> for RawSkeletonDetail {
    fn from(detail: SkeletonDetail) -> Self {
        Self(detail.nodes, detail.connectors, detail.tags, detail.reviews)
    }
}

/// A batch response: skeleton ID (as a JSON object key) to its detail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompactDetail {
    #[serde(default)]
    pub skeletons: BTreeMap<String, SkeletonDetail>,
}

impl CompactDetail {
    /// Looks up the detail for one skeleton.
    pub fn get(&self, skeleton_id: SkeletonId) -> Option<&SkeletonDetail> {
        self.skeletons.get(&skeleton_id.to_string())
    }

    /// All skeleton IDs present in the payload, in ascending order.
    ///
    /// Keys that are not integers are logged and left out, so one bad entry
    /// never hides the others.
    pub fn skeleton_ids(&self) -> Vec<SkeletonId> {
        let mut ids: Vec<SkeletonId> = self
            .skeletons
            .keys()
            .filter_map(|key| match key.parse() {
                Ok(id) => Some(id),
                Err(error) => {
                    tracing::warn!(%error, "skipping payload entry");
                    None
                }
            })
            .collect();
        ids.sort_unstable();
        ids
    }
}

/// Column positions of a node version row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeColumns {
    pub id: usize,
    pub parent: usize,
    pub x: usize,
    pub y: usize,
    pub z: usize,
    pub valid_from: usize,
    pub valid_to: usize,
}

impl Default for NodeColumns {
    fn default() -> Self {
        Self {
            id: 0,
            parent: 1,
            x: 3,
            y: 4,
            z: 5,
            valid_from: 8,
            valid_to: 9,
        }
    }
}

/// Column positions of a connector link version row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorColumns {
    pub node: usize,
    pub connector: usize,
    pub relation: usize,
    pub valid_from: usize,
    pub valid_to: usize,
}

impl Default for ConnectorColumns {
    fn default() -> Self {
        Self {
            node: 0,
            connector: 1,
            relation: 2,
            valid_from: 6,
            valid_to: 7,
        }
    }
}

/// Column positions of a tag link version row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagColumns {
    pub node: usize,
    pub valid_from: usize,
    pub valid_to: usize,
}

impl Default for TagColumns {
    fn default() -> Self {
        Self {
            node: 0,
            valid_from: 2,
            valid_to: 3,
        }
    }
}

/// Column positions of a review row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewColumns {
    pub reviewer: usize,
    pub node: usize,
    pub timestamp: usize,
}

impl Default for ReviewColumns {
    fn default() -> Self {
        Self {
            reviewer: 0,
            node: 1,
            timestamp: 3,
        }
    }
}

/// Column layout for all four payload members.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnLayout {
    pub nodes: NodeColumns,
    pub connectors: ConnectorColumns,
    pub tags: TagColumns,
    pub reviews: ReviewColumns,
}

/// PostgreSQL's default text rendering of `timestamptz`.
const POSTGRES_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f%#z";

/// Parses a timestamp cell.
///
/// Accepts RFC 3339 strings, PostgreSQL-style `timestamptz` strings and
/// numeric Unix epoch seconds (fractional allowed).
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .or_else(|_| DateTime::parse_from_str(s, POSTGRES_TIMESTAMP_FORMAT))
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_f64().and_then(epoch_seconds_to_datetime),
        _ => None,
    }
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "range is checked by DateTime::from_timestamp; nanos are in [0, 1e9)"
)]
fn epoch_seconds_to_datetime(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() || seconds.abs() > 1e14 {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}

/// Reads an integer cell. Integral floats and numeric strings are accepted.
pub fn cell_i64(row: &[Value], column: usize) -> Option<i64> {
    match row.get(column)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "checked integral and well inside the i64 range"
)]
fn integral(value: f64) -> Option<i64> {
    (value.fract() == 0.0 && value.abs() < 9.0e15).then(|| value as i64)
}

/// Reads a floating point cell.
pub fn cell_f64(row: &[Value], column: usize) -> Option<f64> {
    match row.get(column)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Whether a cell is absent or JSON `null`.
pub fn cell_is_null(row: &[Value], column: usize) -> bool {
    row.get(column).is_none_or(Value::is_null)
}
