use tracing::{debug, info};

use crate::analysis::density::{self, DensityContext};
use crate::analysis::{color, morphology, scoring, ScoringParams};
use crate::config::AnalysisConfig;
use crate::detection::preprocessing::{self, PreprocessParams};
use crate::detection::regions::{collect_pixels, measure_regions};
use crate::detection::segmentation::{self, SegmentationParams};
use crate::detection::plate;
use crate::error::Result;
use crate::models::ColonyFeatures;
use crate::pipeline::{PipelineContext, PipelineStep, PlateState};

/// Denoise, enhance contrast, gamma-correct and sharpen
pub struct PreprocessStep {
    pub params: PreprocessParams,
}

impl PipelineStep for PreprocessStep {
    fn process(&self, mut state: PlateState, _context: &PipelineContext) -> Result<PlateState> {
        state.processed = Some(preprocessing::preprocess(&state.original, &self.params)?);
        Ok(state)
    }

    fn name(&self) -> &str {
        "Preprocessing"
    }
}

/// Find the usable interior of the dish
pub struct PlateDetectionStep {
    pub margin_percent: f32,
}

impl PipelineStep for PlateDetectionStep {
    fn process(&self, mut state: PlateState, _context: &PipelineContext) -> Result<PlateState> {
        let mask = plate::locate_plate(state.processed(self.name())?, self.margin_percent);
        state.plate_mask = Some(mask);
        Ok(state)
    }

    fn name(&self) -> &str {
        "Plate Detection"
    }
}

/// Threshold, split and size-filter colonies, then measure each region.
/// After this step the colony table holds one entry per label.
pub struct SegmentationStep {
    pub params: SegmentationParams,
}

impl PipelineStep for SegmentationStep {
    fn process(&self, mut state: PlateState, context: &PipelineContext) -> Result<PlateState> {
        let processed = state.processed(self.name())?;
        let plate_mask = state.plate_mask(self.name())?;
        let result = segmentation::segment(processed, plate_mask, &self.params);

        state.colonies = measure_regions(&result.label_map)
            .into_iter()
            .map(ColonyFeatures::new)
            .collect();
        if context.verbose {
            info!("Segmented {} colonies", result.colony_count);
        }

        state.binary_mask = Some(result.binary_mask);
        state.label_map = Some(result.label_map);
        Ok(state)
    }

    fn name(&self) -> &str {
        "Segmentation"
    }
}

/// Shape descriptors, form and margin per colony
pub struct MorphologyStep;

impl PipelineStep for MorphologyStep {
    fn process(&self, mut state: PlateState, _context: &PipelineContext) -> Result<PlateState> {
        state.label_map(self.name())?;
        for colony in &mut state.colonies {
            colony.morphology = Some(morphology::analyze_region(&colony.region));
        }
        state.stages.morphology = true;
        Ok(state)
    }

    fn name(&self) -> &str {
        "Morphology Analysis"
    }
}

/// Dominant colour per colony and global colour clusters
pub struct ColorStep {
    /// 0 picks the count automatically
    pub n_clusters: usize,
    pub seed: u64,
    pub n_init: usize,
}

impl PipelineStep for ColorStep {
    fn process(&self, mut state: PlateState, context: &PipelineContext) -> Result<PlateState> {
        let processed = state.processed(self.name())?;
        let pixels = collect_pixels(state.label_map(self.name())?);
        let per_colony: Vec<&[(u32, u32)]> = state
            .colonies
            .iter()
            .map(|c| pixels[c.label() as usize].as_slice())
            .collect();

        let analysis = color::analyze_colors(processed, &per_colony, self.n_clusters, self.seed, self.n_init);
        if context.verbose {
            info!("Found {} colour clusters", analysis.n_clusters);
        }

        for (colony, record) in state.colonies.iter_mut().zip(analysis.records) {
            colony.color = Some(record);
        }
        state.color_clusters = Some(analysis.n_clusters);
        state.stages.color = true;
        Ok(state)
    }

    fn name(&self) -> &str {
        "Color Analysis"
    }
}

/// Opacity, texture, core/rim gradient and saturation per colony
pub struct DensityStep;

impl PipelineStep for DensityStep {
    fn process(&self, mut state: PlateState, _context: &PipelineContext) -> Result<PlateState> {
        let processed = state.processed(self.name())?;
        let plate_mask = state.plate_mask(self.name())?;
        let labels = state.label_map(self.name())?;

        let gray = preprocessing::to_grayscale(processed);
        let ctx = DensityContext::new(processed, &gray, labels, plate_mask);
        let pixels = collect_pixels(labels);
        let records: Vec<_> = state
            .colonies
            .iter()
            .map(|c| density::analyze_colony(&ctx, &pixels[c.label() as usize], &c.region.bounding_box))
            .collect();

        for (colony, record) in state.colonies.iter_mut().zip(records) {
            colony.density = Some(record);
        }
        state.stages.density = true;
        Ok(state)
    }

    fn name(&self) -> &str {
        "Density Analysis"
    }
}

/// Composite interest score, ranks and the top-N selection
pub struct ScoringStep {
    pub params: ScoringParams,
}

impl PipelineStep for ScoringStep {
    fn process(&self, mut state: PlateState, context: &PipelineContext) -> Result<PlateState> {
        state.label_map(self.name())?;
        let outcome = scoring::score_colonies(&state.colonies, &self.params);

        for (colony, score) in state.colonies.iter_mut().zip(outcome.scores) {
            colony.score = Some(score);
        }
        if context.verbose {
            info!("Selected {} top colonies", outcome.top.len());
        } else {
            debug!("Top colonies: {:?}", outcome.top);
        }
        state.top_colonies = outcome.top;
        Ok(state)
    }

    fn name(&self) -> &str {
        "Scoring"
    }
}

/// The standard step sequence for `config`; skipped analyses are left out
pub fn standard_steps(config: &AnalysisConfig) -> Vec<Box<dyn PipelineStep>> {
    let mut steps: Vec<Box<dyn PipelineStep>> = vec![
        Box::new(PreprocessStep {
            params: PreprocessParams::from(config),
        }),
        Box::new(PlateDetectionStep {
            margin_percent: config.margin_percent,
        }),
        Box::new(SegmentationStep {
            params: SegmentationParams::from(config),
        }),
    ];
    if config.run_morphology {
        steps.push(Box::new(MorphologyStep));
    }
    if config.run_color_analysis {
        steps.push(Box::new(ColorStep {
            n_clusters: config.color_n_clusters,
            seed: config.color_random_state,
            n_init: config.color_n_init,
        }));
    }
    if config.run_density_analysis {
        steps.push(Box::new(DensityStep));
    }
    steps.push(Box::new(ScoringStep {
        params: ScoringParams::from(config),
    }));
    steps
}
