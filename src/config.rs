//! Tunable parameters for the colony analysis pipeline.
//!
//! Every field has a default, so a configuration can be loaded from a partial
//! JSON document:
//!
//! ```no_run
//! use colonyscope::AnalysisConfig;
//!
//! let config: AnalysisConfig = serde_json::from_str(r#"{ "min_colony_size": 30 }"#)?;
//! assert_eq!(config.max_colony_size, 10_000);
//! # Ok::<(), serde_json::Error>(())
//! ```

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

use crate::error::{ColonyError, Result};

/// How the local mean is computed for adaptive thresholding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptiveMethod {
    Mean,
    Gaussian,
}

/// Complete single-image analysis configuration.
///
/// Only the detection-stage parameters are exposed; morphology class
/// thresholds and scoring weights are fixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Bilateral filter neighbourhood diameter in pixels
    pub bilateral_d: u32,
    /// Bilateral filter sigma in colour space
    pub bilateral_sigma_color: f32,
    /// Bilateral filter sigma in coordinate space
    pub bilateral_sigma_space: f32,

    /// CLAHE clip limit (multiple of the uniform bin height)
    pub clahe_clip_limit: f32,
    /// CLAHE tiles per image side
    pub clahe_tile_grid: u32,

    /// Power-law exponent; < 1 brightens, > 1 darkens
    pub gamma: f32,
    /// Sharpening strength; 0 disables sharpening
    pub sharpen_strength: f32,

    /// Fraction of each image edge excluded from the plate region
    pub margin_percent: f32,

    /// Adaptive threshold neighbourhood size (odd, >= 3)
    pub adaptive_block_size: u32,
    /// Offset a pixel must exceed its local mean by to count as foreground
    pub adaptive_c: f32,
    pub adaptive_method: AdaptiveMethod,

    /// Split touching colonies with distance transform + watershed
    pub watershed: bool,
    /// Minimum separation between watershed seeds
    pub watershed_min_distance: u32,

    /// Smallest colony area kept, in pixels
    pub min_colony_size: u32,
    /// Largest colony area kept, in pixels
    pub max_colony_size: u32,

    /// Global colour cluster count; 0 selects the count automatically
    pub color_n_clusters: usize,
    /// Seed for every k-means run
    pub color_random_state: u64,
    /// Number of k-means initialisations; the lowest inertia wins
    pub color_n_init: usize,

    /// Size of the ranked top-colony selection
    pub n_top_colonies: usize,
    /// Diversity pressure in [0, 1]; 0 selects purely by score
    pub penalty_factor: f64,

    pub run_morphology: bool,
    pub run_color_analysis: bool,
    pub run_density_analysis: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            bilateral_d: 9,
            bilateral_sigma_color: 75.0,
            bilateral_sigma_space: 75.0,
            clahe_clip_limit: 3.0,
            clahe_tile_grid: 8,
            gamma: 1.2,
            sharpen_strength: 1.0,
            margin_percent: 0.08,
            adaptive_block_size: 15,
            adaptive_c: 3.0,
            adaptive_method: AdaptiveMethod::Gaussian,
            watershed: true,
            watershed_min_distance: 8,
            min_colony_size: 15,
            max_colony_size: 10_000,
            color_n_clusters: 0,
            color_random_state: 42,
            color_n_init: 10,
            n_top_colonies: 20,
            penalty_factor: 0.5,
            run_morphology: true,
            run_color_analysis: true,
            run_density_analysis: true,
        }
    }
}

impl AnalysisConfig {
    /// The faster, coarser profile used for large batches
    pub fn fast() -> Self {
        Self::default().with_fast_profile()
    }

    /// Apply the fast-profile overrides on top of this configuration
    pub fn with_fast_profile(mut self) -> Self {
        self.bilateral_d = 5;
        self.clahe_clip_limit = 2.0;
        self.adaptive_block_size = 17;
        self.color_n_init = 3;
        self
    }

    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Reject parameter combinations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.bilateral_d == 0 {
            return Err(ColonyError::InvalidConfig("bilateral_d must be positive".into()));
        }
        if !positive(self.bilateral_sigma_color) || !positive(self.bilateral_sigma_space) {
            return Err(ColonyError::InvalidConfig("bilateral sigmas must be positive".into()));
        }
        if !positive(self.clahe_clip_limit) {
            return Err(ColonyError::InvalidConfig("clahe_clip_limit must be positive".into()));
        }
        if self.clahe_tile_grid == 0 {
            return Err(ColonyError::InvalidConfig("clahe_tile_grid must be positive".into()));
        }
        if !positive(self.gamma) {
            return Err(ColonyError::InvalidConfig(format!("gamma must be positive, got {}", self.gamma)));
        }
        if !(self.sharpen_strength.is_finite() && self.sharpen_strength >= 0.0) {
            return Err(ColonyError::InvalidConfig("sharpen_strength must not be negative".into()));
        }
        if !self.adaptive_c.is_finite() {
            return Err(ColonyError::InvalidConfig("adaptive_c must be finite".into()));
        }
        if !(0.0..0.5).contains(&self.margin_percent) {
            return Err(ColonyError::InvalidConfig(format!(
                "margin_percent must be in [0, 0.5), got {}",
                self.margin_percent
            )));
        }
        if self.adaptive_block_size < 3 || self.adaptive_block_size % 2 == 0 {
            return Err(ColonyError::InvalidConfig(format!(
                "adaptive_block_size must be odd and >= 3, got {}",
                self.adaptive_block_size
            )));
        }
        if self.min_colony_size > self.max_colony_size {
            return Err(ColonyError::InvalidConfig(format!(
                "min_colony_size ({}) exceeds max_colony_size ({})",
                self.min_colony_size, self.max_colony_size
            )));
        }
        if self.color_n_init == 0 {
            return Err(ColonyError::InvalidConfig("color_n_init must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.penalty_factor) {
            return Err(ColonyError::InvalidConfig(format!(
                "penalty_factor must be in [0, 1], got {}",
                self.penalty_factor
            )));
        }
        Ok(())
    }

    /// Stable hash of every parameter, for callers that memoize results
    /// keyed on (image, configuration).
    pub fn cache_key(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        // serde_json output is deterministic for a struct: field order is fixed
        serde_json::to_string(self)
            .unwrap_or_default()
            .hash(&mut hasher);
        hasher.finish()
    }
}

/// Options that only apply to multi-image runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOptions {
    /// Substitute the fast profile for every image
    pub fast_mode: bool,
    /// Upper bound on images processed at once
    pub max_concurrency: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            fast_mode: false,
            max_concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

/// Finite and greater than zero; NaN fails
fn positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}
