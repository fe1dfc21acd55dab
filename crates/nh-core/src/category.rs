//! Event categories as the single source of truth for category names.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// The kinds of versioned records a skeleton payload carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Nodes,
    Connectors,
    Tags,
    Reviews,
}

/// Categories whose events count as reconstruction work.
pub const TRACING_CATEGORIES: [Category; 3] = [Category::Nodes, Category::Connectors, Category::Tags];

/// Categories whose events count as review work.
pub const REVIEW_CATEGORIES: [Category; 1] = [Category::Reviews];

impl Category {
    /// All categories in payload member order.
    pub const ALL: [Self; 4] = [Self::Nodes, Self::Connectors, Self::Tags, Self::Reviews];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Nodes => "nodes",
            Self::Connectors => "connectors",
            Self::Tags => "tags",
            Self::Reviews => "reviews",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nodes" => Ok(Self::Nodes),
            "connectors" => Ok(Self::Connectors),
            "tags" => Ok(Self::Tags),
            "reviews" => Ok(Self::Reviews),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}

impl Serialize for Category {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Error type for unknown category strings.
#[derive(Debug, Clone)]
pub struct UnknownCategory(String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown category: {}", self.0)
    }
}

impl std::error::Error for UnknownCategory {}
