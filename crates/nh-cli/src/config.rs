//! Configuration loading and management.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use nh_core::{AfterReviewCutoff, AnalysisConfig, ColumnLayout, InactivityThreshold, ValidationError};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Largest gap between two events of one active bout, in minutes.
    pub inactivity_threshold_minutes: f64,

    /// Instant the "after review" snapshot describes.
    pub after_review_cutoff: AfterReviewCutoff,

    /// Column positions inside payload rows.
    pub columns: ColumnLayout,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inactivity_threshold_minutes: InactivityThreshold::DEFAULT.minutes(),
            after_review_cutoff: AfterReviewCutoff::default(),
            columns: ColumnLayout::default(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // NH_INACTIVITY_THRESHOLD_MINUTES, NH_COLUMNS__NODES__VALID_FROM, ...
        figment = figment.merge(Env::prefixed("NH_").split("__"));

        figment.extract()
    }

    /// Engine settings, with an optional per-invocation threshold override.
    ///
    /// Fails on an invalid threshold before any skeleton is touched.
    pub fn analysis_config(
        &self,
        threshold_minutes: Option<f64>,
    ) -> Result<AnalysisConfig, ValidationError> {
        let minutes = threshold_minutes.unwrap_or(self.inactivity_threshold_minutes);
        Ok(AnalysisConfig {
            inactivity_threshold: InactivityThreshold::try_from(minutes)?,
            after_review_cutoff: self.after_review_cutoff,
            columns: self.columns,
        })
    }
}

/// Returns the platform-specific config directory for nh.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("nh"))
}
