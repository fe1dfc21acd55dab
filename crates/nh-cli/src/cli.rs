//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use nh_core::{Category, SkeletonId};

/// Neuron reconstruction history.
///
/// Reads a compact-detail payload and reports how long skeletons were
/// traced and reviewed, and what they looked like before and after review.
#[derive(Debug, Parser)]
#[command(name = "nh", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Tracing time, review time and cable/connector changes per skeleton.
    Analyze {
        /// Compact-detail payload (JSON).
        payload: PathBuf,

        /// Skeletons to analyze (repeatable). Defaults to every skeleton in
        /// the payload.
        #[arg(short, long = "skeleton")]
        skeletons: Vec<SkeletonId>,

        /// Inactivity threshold in minutes, overriding the configuration.
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Analysis time (ISO 8601 or relative, e.g. "2 hours ago").
        #[arg(long)]
        now: Option<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List active bouts for one skeleton.
    Bouts {
        /// Compact-detail payload (JSON).
        payload: PathBuf,

        #[arg(short, long)]
        skeleton: SkeletonId,

        /// Use review events instead of tracing events.
        #[arg(long)]
        reviews: bool,

        /// Event categories to merge (repeatable): nodes, connectors, tags
        /// or reviews.
        #[arg(long = "category", conflicts_with = "reviews")]
        categories: Vec<Category>,

        /// Inactivity threshold in minutes, overriding the configuration.
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Reconstruct one skeleton at a point in time.
    Snapshot {
        /// Compact-detail payload (JSON).
        payload: PathBuf,

        #[arg(short, long)]
        skeleton: SkeletonId,

        /// Reconstruction time (ISO 8601 or relative). Defaults to now.
        #[arg(long)]
        at: Option<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}
