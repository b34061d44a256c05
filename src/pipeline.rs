use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{ColonyError, Result};
use crate::models::{ColonyFeatures, LabelMap, ResultBundle, StagesRun};

/// State that flows through the pipeline.
///
/// Each step reads the outputs of earlier steps and fills in its own; nothing
/// written by an earlier step is modified afterwards.
#[derive(Clone)]
pub struct PlateState {
    /// The decoded input (shared, never modified)
    pub original: Arc<RgbImage>,

    /// Denoised, contrast-enhanced, sharpened image
    pub processed: Option<RgbImage>,

    /// Usable interior of the dish
    pub plate_mask: Option<GrayImage>,

    /// Cleaned foreground before splitting and size filtering
    pub binary_mask: Option<GrayImage>,

    pub label_map: Option<LabelMap>,

    /// Per-colony feature table, ascending by label
    pub colonies: Vec<ColonyFeatures>,

    pub color_clusters: Option<usize>,

    /// Selected top colonies, best first
    pub top_colonies: Vec<u32>,

    pub stages: StagesRun,
}

impl PlateState {
    pub fn from_image(image: RgbImage) -> Self {
        Self {
            original: Arc::new(image),
            processed: None,
            plate_mask: None,
            binary_mask: None,
            label_map: None,
            colonies: Vec::new(),
            color_clusters: None,
            top_colonies: Vec::new(),
            stages: StagesRun {
                morphology: false,
                color: false,
                density: false,
            },
        }
    }

    pub fn processed(&self, step: &str) -> Result<&RgbImage> {
        self.processed.as_ref().ok_or_else(|| missing(step, "a processed image"))
    }

    pub fn plate_mask(&self, step: &str) -> Result<&GrayImage> {
        self.plate_mask.as_ref().ok_or_else(|| missing(step, "a plate mask"))
    }

    pub fn label_map(&self, step: &str) -> Result<&LabelMap> {
        self.label_map.as_ref().ok_or_else(|| missing(step, "a label map"))
    }

    /// Most recent intermediate image, for debug dumps
    pub fn latest_image(&self) -> DynamicImage {
        if let Some(labels) = &self.label_map {
            DynamicImage::ImageRgb8(colorize_labels(labels))
        } else if let Some(mask) = &self.binary_mask {
            DynamicImage::ImageLuma8(mask.clone())
        } else if let Some(mask) = &self.plate_mask {
            DynamicImage::ImageLuma8(mask.clone())
        } else if let Some(processed) = &self.processed {
            DynamicImage::ImageRgb8(processed.clone())
        } else {
            DynamicImage::ImageRgb8(self.original.as_ref().clone())
        }
    }

    /// Assemble the final bundle; fails if a required stage never ran
    pub fn into_bundle(self) -> Result<ResultBundle> {
        const STEP: &str = "Result Assembly";
        let processed_image = self.processed.ok_or_else(|| missing(STEP, "a processed image"))?;
        let plate_mask = self.plate_mask.ok_or_else(|| missing(STEP, "a plate mask"))?;
        let binary_mask = self.binary_mask.ok_or_else(|| missing(STEP, "a binary mask"))?;
        let label_map = self.label_map.ok_or_else(|| missing(STEP, "a label map"))?;

        Ok(ResultBundle {
            original_image: Arc::unwrap_or_clone(self.original),
            processed_image,
            plate_mask,
            binary_mask,
            label_map,
            colonies: self.colonies,
            color_clusters: self.color_clusters,
            top_colonies: self.top_colonies,
            stages: self.stages,
        })
    }
}

fn missing(step: &str, what: &'static str) -> ColonyError {
    ColonyError::StageOrder {
        step: step.to_string(),
        missing: what,
    }
}

/// Render a label map with a stable pseudo-colour per label
pub fn colorize_labels(labels: &LabelMap) -> RgbImage {
    RgbImage::from_fn(labels.width(), labels.height(), |x, y| {
        let label = labels.get_pixel(x, y)[0];
        if label == 0 {
            return Rgb([0, 0, 0]);
        }
        let h = label.wrapping_mul(2_654_435_761);
        Rgb([
            64 + (h >> 24) as u8 % 192,
            64 + (h >> 16) as u8 % 192,
            64 + (h >> 8) as u8 % 192,
        ])
    })
}

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
    pub enabled: bool,
}

/// Context available to all pipeline steps
#[derive(Clone, Debug, Default)]
pub struct PipelineContext {
    pub verbose: bool,
    pub debug: Option<DebugConfig>,
}

/// Trait that all pipeline steps must implement
pub trait PipelineStep: Send + Sync {
    /// Consume the state and return it with this step's outputs filled in
    fn process(&self, state: PlateState, context: &PipelineContext) -> Result<PlateState>;

    /// Human-readable name for this step (used in logs and debug file names)
    fn name(&self) -> &str;
}

/// Composable pipeline builder
#[derive(Clone, Default)]
pub struct Pipeline {
    steps: Vec<Arc<dyn PipelineStep>>,
    context: PipelineContext,
}

impl Pipeline {
    /// Create a new empty pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Log every step at info level
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.context.verbose = verbose;
        self
    }

    /// Enable debug mode with output directory.
    /// The directory must be empty or non-existent
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(ColonyError::Io(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    format!("Debug directory is not empty: {}", output_dir.display()),
                )));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.context.debug = Some(DebugConfig {
            output_dir,
            enabled: true,
        });

        Ok(self)
    }

    /// Add a processing step to the pipeline
    pub fn add_step(mut self, step: Arc<dyn PipelineStep>) -> Self {
        self.steps.push(step);
        self
    }

    /// Helper method to add a step from a Box (for convenience)
    pub fn add_step_boxed(mut self, step: Box<dyn PipelineStep>) -> Self {
        self.steps.push(Arc::from(step));
        self
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step in order on one image
    pub fn run(&self, input: RgbImage) -> Result<PlateState> {
        self.run_partial(input, self.steps.len())
    }

    /// Run only the first `num_steps` steps (useful for inspecting intermediates)
    pub fn run_partial(&self, input: RgbImage, num_steps: usize) -> Result<PlateState> {
        let mut state = PlateState::from_image(input);
        self.save_debug_output(&state, 0, "input")?;

        for (idx, step) in self.steps.iter().take(num_steps).enumerate() {
            if self.context.verbose {
                info!("Running step {}: {}", idx + 1, step.name());
            } else {
                debug!("Running step {}: {}", idx + 1, step.name());
            }

            state = step.process(state, &self.context)?;
            self.save_debug_output(&state, idx + 1, step.name())?;

            if self.context.verbose {
                info!("  → {} colonies", state.colonies.len());
            }
        }

        Ok(state)
    }

    fn save_debug_output(&self, state: &PlateState, index: usize, step_name: &str) -> Result<()> {
        let Some(debug_config) = &self.context.debug else {
            return Ok(());
        };
        if !debug_config.enabled {
            return Ok(());
        }

        let filename = format!("{:02}_{}.png", index, step_name.to_lowercase().replace(' ', "_"));
        let output_path = debug_config.output_dir.join(&filename);
        state
            .latest_image()
            .save(&output_path)
            .map_err(|e| ColonyError::Io(std::io::Error::other(format!("Failed to save debug image: {e}"))))?;

        debug!("Debug: saved {}", filename);
        Ok(())
    }
}
