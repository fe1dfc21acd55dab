//! Core type definitions with validation.

use std::fmt;
use std::str::FromStr;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// The inactivity threshold was negative or not a finite number.
    #[error("inactivity threshold must be a non-negative number of minutes, got {value}")]
    InvalidThreshold { value: f64 },

    /// An identifier could not be parsed.
    #[error("invalid {field}: {value:?}")]
    InvalidId { field: &'static str, value: String },
}

/// Generates a numeric ID newtype with common trait implementations.
macro_rules! define_numeric_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw identifier.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw identifier.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<i64>()
                    .map(Self)
                    .map_err(|_| ValidationError::InvalidId {
                        field: $field_name,
                        value: s.to_string(),
                    })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_numeric_id!(
    /// Identifies one reconstruction (a skeleton) in a batch.
    SkeletonId, "skeleton ID"
);

define_numeric_id!(
    /// Identifies a tree node. Stable across all versions of that node.
    NodeId, "node ID"
);

define_numeric_id!(
    /// Identifies a connector (synapse site) that nodes link to.
    ConnectorId, "connector ID"
);

/// A position in project space, in nanometers.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dz.mul_add(dz, dx.mul_add(dx, dy * dy)).sqrt()
    }
}

/// Maximum allowed gap between two events of the same active bout, in minutes.
///
/// Fractional minutes are allowed. Zero is legal and splits every event into
/// its own bout unless timestamps are exactly equal.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct InactivityThreshold(f64);

impl InactivityThreshold {
    /// Three minutes, the threshold used when nothing else is configured.
    pub const DEFAULT: Self = Self(3.0);

    /// Creates a threshold after validation.
    ///
    /// Returns an error if the value is negative, NaN or infinite.
    pub fn from_minutes(minutes: f64) -> Result<Self, ValidationError> {
        if !minutes.is_finite() || minutes < 0.0 {
            return Err(ValidationError::InvalidThreshold { value: minutes });
        }
        Ok(Self(minutes))
    }

    /// Returns the threshold in minutes.
    #[must_use]
    pub const fn minutes(self) -> f64 {
        self.0
    }

    /// Returns the threshold as a duration with microsecond precision.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "validated finite; thresholds are far below i64 microseconds"
    )]
    pub fn as_duration(self) -> TimeDelta {
        TimeDelta::microseconds((self.0 * 60_000_000.0).round() as i64)
    }
}

impl Default for InactivityThreshold {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for InactivityThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} min", self.0)
    }
}

impl TryFrom<f64> for InactivityThreshold {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::from_minutes(value)
    }
}

impl Serialize for InactivityThreshold {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for InactivityThreshold {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Self::from_minutes(value).map_err(serde::de::Error::custom)
    }
}
