//! Per-colony feature extraction and scoring over a finished label map.

pub mod color;
pub mod density;
pub mod kmeans;
pub mod morphology;
pub mod scoring;

pub use color::{analyze_colors, ColorAnalysis};
pub use density::DensityContext;
pub use kmeans::{KMeans, KMeansFit};
pub use scoring::{score_colonies, ScoringOutcome, ScoringParams};
