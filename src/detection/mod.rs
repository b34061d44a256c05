pub mod contours;
pub mod plate;
pub mod preprocessing;
pub mod regions;
pub mod segmentation;
pub mod steps;

use image::RgbImage;
use std::path::PathBuf;
use tracing::info;

use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::models::ResultBundle;
use crate::pipeline::Pipeline;

/// Main colony analysis orchestrator.
///
/// Runs preprocessing, plate detection, segmentation and the enabled
/// analyses strictly in sequence and assembles the [`ResultBundle`].
pub struct ColonyAnalyzer {
    config: AnalysisConfig,
    verbose: bool,
    debug_dir: Option<PathBuf>,
}

impl ColonyAnalyzer {
    /// Fails if the configuration is invalid
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            verbose: false,
            debug_dir: None,
        })
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Write every intermediate image into `dir` (must be empty or absent)
    pub fn with_debug(mut self, dir: PathBuf) -> Self {
        self.debug_dir = Some(dir);
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// The step sequence this analyzer runs
    pub fn pipeline(&self) -> Result<Pipeline> {
        let mut pipeline = steps::standard_steps(&self.config)
            .into_iter()
            .fold(Pipeline::new().with_verbose(self.verbose), |p, step| p.add_step_boxed(step));
        if let Some(dir) = &self.debug_dir {
            pipeline = pipeline.with_debug(dir.clone())?;
        }
        Ok(pipeline)
    }

    /// Analyse one decoded image
    pub fn analyze(&self, image: RgbImage) -> Result<ResultBundle> {
        let (width, height) = image.dimensions();
        let state = self.pipeline()?.run(image)?;
        let bundle = state.into_bundle()?;

        info!(
            "Analysed {}x{} image: {} colonies, {} selected",
            width,
            height,
            bundle.total_colonies(),
            bundle.top_colonies.len()
        );
        Ok(bundle)
    }
}
