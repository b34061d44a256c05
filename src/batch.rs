//! Multi-image analysis.
//!
//! Every image runs its own independent pipeline on a bounded rayon pool.
//! Only the per-colony table of each image is kept; the combined table is
//! assembled after all images have finished.

use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use crate::comparison::{self, ColonyClustering, SimilarityReport, StatisticalTests};
use crate::config::{AnalysisConfig, BatchOptions};
use crate::detection::ColonyAnalyzer;
use crate::error::Result;
use crate::models::{ColonyRow, RunSummary};
use crate::ImageSource;

/// One image in a batch, identified by a caller-chosen label
#[derive(Debug, Clone)]
pub struct BatchInput {
    pub label: String,
    pub source: ImageSource,
}

impl BatchInput {
    pub fn new(label: impl Into<String>, source: impl Into<ImageSource>) -> Self {
        Self {
            label: label.into(),
            source: source.into(),
        }
    }
}

/// Results kept for a successfully analysed image
#[derive(Debug, Clone, Serialize)]
pub struct SampleResult {
    pub label: String,
    /// Every row is tagged with `label`
    pub rows: Vec<ColonyRow>,
    pub top_colonies: Vec<u32>,
    pub summary: RunSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub label: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    /// Successful images, in input order
    pub samples: Vec<SampleResult>,
    pub failures: Vec<BatchFailure>,
    /// Images never started because the batch was stopped
    pub skipped: Vec<String>,
    /// All colony rows of all samples, in input order
    pub combined_rows: Vec<ColonyRow>,
    pub similarity: Option<SimilarityReport>,
    /// Area comparison between samples; needs two or more samples
    pub statistical_tests: Option<StatisticalTests>,
}

/// How many of each sample's top colonies take part in cross-sample clustering
pub const TOP_ROWS_PER_SAMPLE: usize = 20;

impl BatchResult {
    pub fn succeeded(&self) -> usize {
        self.samples.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn total_colonies(&self) -> usize {
        self.combined_rows.len()
    }

    /// The first `TOP_ROWS_PER_SAMPLE` top colonies of every sample, in rank order
    pub fn top_rows(&self) -> Vec<ColonyRow> {
        self.samples
            .iter()
            .flat_map(|sample| {
                sample
                    .top_colonies
                    .iter()
                    .take(TOP_ROWS_PER_SAMPLE)
                    .filter_map(|label| sample.rows.iter().find(|r| r.label == *label).cloned())
            })
            .collect()
    }

    /// Cluster the top colonies of all samples together
    pub fn cluster_top_colonies(&self, n_clusters: usize) -> Result<ColonyClustering> {
        comparison::cluster_colonies(
            &self.top_rows(),
            &comparison::TOP_CLUSTER_FEATURES,
            n_clusters,
            comparison::TOP_CLUSTER_SEED,
        )
    }
}

enum Outcome {
    Done(SampleResult),
    Failed(BatchFailure),
    Skipped(String),
}

/// Runs many single-image pipelines with bounded concurrency
pub struct BatchRunner {
    config: AnalysisConfig,
    options: BatchOptions,
    stop: Option<Arc<AtomicBool>>,
}

impl BatchRunner {
    pub fn new(config: AnalysisConfig, options: BatchOptions) -> Self {
        Self {
            config,
            options,
            stop: None,
        }
    }

    /// Once `flag` is set, no further images are started
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    /// The configuration actually applied to every image
    pub fn effective_config(&self) -> AnalysisConfig {
        if self.options.fast_mode {
            self.config.clone().with_fast_profile()
        } else {
            self.config.clone()
        }
    }

    fn stopped(&self) -> bool {
        self.stop.as_ref().is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn run_one(&self, analyzer: &ColonyAnalyzer, input: BatchInput) -> Outcome {
        if self.stopped() {
            return Outcome::Skipped(input.label);
        }
        let label = input.label;
        let bundle = input.source.load().and_then(|image| analyzer.analyze(image));
        match bundle {
            Ok(bundle) => {
                let rows = bundle
                    .colonies
                    .iter()
                    .map(|c| c.to_row(Some(&label)))
                    .collect();
                Outcome::Done(SampleResult {
                    rows,
                    top_colonies: bundle.top_colonies.clone(),
                    summary: bundle.summary(),
                    label,
                })
            }
            Err(e) => {
                warn!("Image '{}' failed: {}", label, e);
                Outcome::Failed(BatchFailure {
                    label,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Analyse every input. Per-image failures are recorded, never propagated;
    /// only an invalid configuration or an unbuildable pool fails the batch.
    pub fn run(&self, inputs: Vec<BatchInput>) -> Result<BatchResult> {
        let analyzer = ColonyAnalyzer::new(self.effective_config())?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.max_concurrency.max(1))
            .build()?;

        let total = inputs.len();
        // collect() returns only after every image has finished
        let outcomes: Vec<Outcome> =
            pool.install(|| inputs.into_par_iter().map(|input| self.run_one(&analyzer, input)).collect());

        let mut result = BatchResult::default();
        for outcome in outcomes {
            match outcome {
                Outcome::Done(sample) => result.samples.push(sample),
                Outcome::Failed(failure) => result.failures.push(failure),
                Outcome::Skipped(label) => result.skipped.push(label),
            }
        }
        result.combined_rows = result.samples.iter().flat_map(|s| s.rows.iter().cloned()).collect();
        if !result.combined_rows.is_empty() {
            result.similarity = comparison::similarity_analysis(&result.combined_rows).ok();
        }
        if result.samples.len() >= 2 {
            result.statistical_tests = match comparison::statistical_tests(&result.combined_rows) {
                Ok(tests) => Some(tests),
                Err(e) => {
                    warn!("Skipping statistical tests: {}", e);
                    None
                }
            };
        }

        info!(
            "Batch finished: {} of {} images succeeded, {} failed, {} skipped, {} colonies",
            result.succeeded(),
            total,
            result.failed(),
            result.skipped.len(),
            result.total_colonies()
        );
        Ok(result)
    }
}

/// Analyse a batch of labelled images
pub fn analyze_batch(inputs: Vec<BatchInput>, config: &AnalysisConfig, options: &BatchOptions) -> Result<BatchResult> {
    BatchRunner::new(config.clone(), options.clone()).run(inputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn blank() -> RgbImage {
        RgbImage::from_pixel(64, 64, Rgb([80, 80, 80]))
    }

    #[test]
    fn fast_mode_substitutes_the_fast_profile() {
        let options = BatchOptions {
            fast_mode: true,
            max_concurrency: 1,
        };
        let runner = BatchRunner::new(AnalysisConfig::default(), options);
        assert_eq!(runner.effective_config(), AnalysisConfig::fast());
    }

    #[test]
    fn corrupt_input_is_recorded_not_raised() {
        let inputs = vec![
            BatchInput::new("good", blank()),
            BatchInput::new("bad", vec![0u8, 1, 2, 3]),
        ];
        let result = analyze_batch(inputs, &AnalysisConfig::default(), &BatchOptions::default()).unwrap();
        assert_eq!(result.succeeded(), 1);
        assert_eq!(result.failed(), 1);
        assert_eq!(result.failures[0].label, "bad");
        assert!(result.similarity.is_none());
    }

    #[test]
    fn stop_flag_skips_unstarted_images() {
        let flag = Arc::new(AtomicBool::new(true));
        let runner = BatchRunner::new(AnalysisConfig::default(), BatchOptions::default()).with_stop_flag(flag);
        let result = runner
            .run(vec![BatchInput::new("a", blank()), BatchInput::new("b", blank())])
            .unwrap();
        assert_eq!(result.skipped, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(result.succeeded(), 0);
    }

    #[test]
    fn invalid_config_fails_the_whole_batch() {
        let config = AnalysisConfig {
            gamma: 0.0,
            ..Default::default()
        };
        assert!(analyze_batch(vec![], &config, &BatchOptions::default()).is_err());
    }
}
