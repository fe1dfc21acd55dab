//! CLI command implementations.

pub mod analyze;
pub mod bouts;
pub mod snapshot;
pub mod util;

#[cfg(test)]
mod fixtures;
