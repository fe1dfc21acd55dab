//! Neuron history CLI library.
//!
//! This crate provides the `nh` command-line interface over `nh-core`.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands};
pub use config::Config;
