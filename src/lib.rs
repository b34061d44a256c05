//! Detection, characterisation and ranking of bacterial colonies in
//! photographs of petri dishes.
//!
//! ```no_run
//! use colonyscope::{analyze, AnalysisConfig};
//!
//! let bundle = analyze("plate.jpg", &AnalysisConfig::default())?;
//! for colony in bundle.top() {
//!     println!("colony {} interest {:.2}", colony.label(), colony.bio_interest());
//! }
//! # Ok::<(), colonyscope::ColonyError>(())
//! ```

pub mod analysis;
pub mod batch;
pub mod comparison;
pub mod config;
pub mod detection;
pub mod error;
pub mod models;
pub mod pipeline;

use image::{DynamicImage, ImageReader, RgbImage};
use std::path::PathBuf;

pub use batch::{analyze_batch, BatchInput, BatchResult, BatchRunner};
pub use config::{AdaptiveMethod, AnalysisConfig, BatchOptions};
pub use detection::ColonyAnalyzer;
pub use error::{ColonyError, Result};
pub use models::{
    BoundingBox, ColonyFeatures, ColonyForm, ColonyMargin, ColonyRegion, ColonyRow, DensityClass, LabelMap,
    ResultBundle, RunSummary,
};
pub use pipeline::{DebugConfig, Pipeline, PipelineContext, PipelineStep, PlateState};

/// Where an input image comes from
#[derive(Debug, Clone)]
pub enum ImageSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
    Image(DynamicImage),
}

impl ImageSource {
    /// Decode into an RGB image; any failure is an `InvalidImage` error
    pub fn load(self) -> Result<RgbImage> {
        let decoded = match self {
            ImageSource::Path(path) => ImageReader::open(&path)
                .map_err(|e| ColonyError::InvalidImage(format!("{}: {e}", path.display())))?
                .with_guessed_format()
                .map_err(|e| ColonyError::InvalidImage(format!("{}: {e}", path.display())))?
                .decode()
                .map_err(|e| ColonyError::InvalidImage(format!("{}: {e}", path.display())))?,
            ImageSource::Bytes(bytes) => image::load_from_memory(&bytes)
                .map_err(|e| ColonyError::InvalidImage(format!("failed to decode image bytes: {e}")))?,
            ImageSource::Image(image) => image,
        };
        detection::preprocessing::to_rgb(&decoded)
    }
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        ImageSource::Path(path)
    }
}

impl From<&std::path::Path> for ImageSource {
    fn from(path: &std::path::Path) -> Self {
        ImageSource::Path(path.to_path_buf())
    }
}

impl From<&str> for ImageSource {
    fn from(path: &str) -> Self {
        ImageSource::Path(PathBuf::from(path))
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        ImageSource::Bytes(bytes)
    }
}

impl From<DynamicImage> for ImageSource {
    fn from(image: DynamicImage) -> Self {
        ImageSource::Image(image)
    }
}

impl From<RgbImage> for ImageSource {
    fn from(image: RgbImage) -> Self {
        ImageSource::Image(DynamicImage::ImageRgb8(image))
    }
}

/// Analyse one image with `config`.
///
/// The result is a pure function of (image, configuration); callers that
/// memoize can key on the image bytes and [`AnalysisConfig::cache_key`].
pub fn analyze(source: impl Into<ImageSource>, config: &AnalysisConfig) -> Result<ResultBundle> {
    let analyzer = ColonyAnalyzer::new(config.clone())?;
    let image = source.into().load()?;
    analyzer.analyze(image)
}
