use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::Level;

use colonyscope::comparison::{self, FeatureSet};
use colonyscope::{
    analyze_batch, AnalysisConfig, BatchInput, BatchOptions, BatchResult, ColonyAnalyzer, ColonyRow, ImageSource,
    ResultBundle, RunSummary,
};

#[derive(Parser)]
#[command(name = "colonyscope")]
#[command(about = "Detect, characterise and rank bacterial colonies in petri dish photographs")]
struct Cli {
    /// Input image(s); more than one runs a batch comparison
    #[arg(value_name = "IMAGE", required = true)]
    images: Vec<PathBuf>,

    /// Load analysis parameters from a JSON file (missing fields use defaults)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Use the faster, coarser parameter profile
    #[arg(long)]
    fast: bool,

    /// Number of top colonies to select
    #[arg(long, value_name = "N")]
    top: Option<usize>,

    /// Diversity penalty in [0, 1]; 0 ranks purely by score
    #[arg(long, value_name = "FACTOR")]
    penalty: Option<f64>,

    /// Smallest colony area in pixels
    #[arg(long, value_name = "PIXELS")]
    min_size: Option<u32>,

    /// Largest colony area in pixels
    #[arg(long, value_name = "PIXELS")]
    max_size: Option<u32>,

    #[arg(long)]
    no_morphology: bool,

    #[arg(long)]
    no_color: bool,

    #[arg(long)]
    no_density: bool,

    /// Images analysed at once in batch mode
    #[arg(long, value_name = "N")]
    jobs: Option<usize>,

    /// Feature set for batch PCA (morphology, bio_scoring, bio_with_morphology,
    /// size_shape, advanced_shape, all_available)
    #[arg(long, value_name = "SET")]
    pca: Option<FeatureSet>,

    /// Cluster the top colonies of every sample into N groups (batch mode)
    #[arg(long, value_name = "N")]
    cluster_top: Option<usize>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Save debug outputs to directory (must be empty; single image only)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn analysis_config(&self) -> anyhow::Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => AnalysisConfig::default(),
        };
        if let Some(top) = self.top {
            config.n_top_colonies = top;
        }
        if let Some(penalty) = self.penalty {
            config.penalty_factor = penalty;
        }
        if let Some(min_size) = self.min_size {
            config.min_colony_size = min_size;
        }
        if let Some(max_size) = self.max_size {
            config.max_colony_size = max_size;
        }
        config.run_morphology &= !self.no_morphology;
        config.run_color_analysis &= !self.no_color;
        config.run_density_analysis &= !self.no_density;
        Ok(config)
    }
}

#[derive(Serialize)]
struct SingleReport<'a> {
    summary: RunSummary,
    top_colonies: &'a [u32],
    colonies: Vec<ColonyRow>,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::INFO } else { Level::WARN })
        .with_target(false)
        .init();

    let config = args.analysis_config()?;

    if let [image] = args.images.as_slice() {
        let config = if args.fast { config.with_fast_profile() } else { config };
        run_single(&args, image, config)
    } else {
        run_batch(&args, config)
    }
}

fn run_single(args: &Cli, path: &Path, config: AnalysisConfig) -> anyhow::Result<()> {
    let image = ImageSource::from(path)
        .load()
        .with_context(|| format!("Failed to load {}", path.display()))?;

    let mut analyzer = ColonyAnalyzer::new(config)?.with_verbose(args.verbose);
    if let Some(dir) = &args.debug_out {
        analyzer = analyzer.with_debug(dir.clone());
    }
    let bundle = analyzer.analyze(image)?;

    if args.json {
        let report = SingleReport {
            summary: bundle.summary(),
            top_colonies: &bundle.top_colonies,
            colonies: bundle.rows(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_single(&bundle);
    }
    Ok(())
}

fn print_single(bundle: &ResultBundle) {
    let summary = bundle.summary();
    println!("\n=== Colony Analysis Results ===");
    println!("Total colonies: {}", summary.total_colonies);
    println!("Average area: {:.1} px", summary.average_area);
    if let Some(circular) = summary.circular_colonies {
        println!("Circular colonies: {}", circular);
    }
    if let Some(dense) = summary.dense_colonies {
        println!("Dense colonies: {}", dense);
    }
    if let Some(clusters) = summary.color_clusters {
        println!("Colour clusters: {}", clusters);
    }

    if bundle.top_colonies.is_empty() {
        println!("No colonies detected.");
        return;
    }
    println!("\nTop colonies:");
    for colony in bundle.top() {
        let (row, col) = colony.region.centroid;
        let form = colony.morphology.as_ref().map_or("-", |m| m.form.as_str());
        println!(
            "  #{:<3} colony {:<4} at ({:.0}, {:.0})  area {:>6}  form {:<11} interest {:.3}",
            colony.score.as_ref().map_or(0, |s| s.rank),
            colony.label(),
            col,
            row,
            colony.region.area,
            form,
            colony.bio_interest()
        );
    }
}

fn run_batch(args: &Cli, config: AnalysisConfig) -> anyhow::Result<()> {
    let mut options = BatchOptions {
        fast_mode: args.fast,
        ..Default::default()
    };
    if let Some(jobs) = args.jobs {
        options.max_concurrency = jobs;
    }

    let inputs = args
        .images
        .iter()
        .map(|path| {
            let label = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            BatchInput::new(label, path.clone())
        })
        .collect();

    let result = analyze_batch(inputs, &config, &options)?;
    let pca = args
        .pca
        .map(|set| comparison::pca_analysis(&result.combined_rows, set));
    let clustering = args.cluster_top.map(|n| result.cluster_top_colonies(n));

    if args.json {
        let pca = match pca {
            Some(Ok(report)) => Some(serde_json::to_value(report)?),
            Some(Err(e)) => Some(serde_json::json!({ "error": e.to_string() })),
            None => None,
        };
        let clustering = match clustering {
            Some(Ok(clustering)) => Some(serde_json::to_value(clustering)?),
            Some(Err(e)) => Some(serde_json::json!({ "error": e.to_string() })),
            None => None,
        };
        let report = serde_json::json!({ "batch": result, "pca": pca, "top_clustering": clustering });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_batch(&result);
    match pca {
        Some(Ok(report)) => {
            println!("\nPCA ({}):", report.feature_set);
            for (i, ratio) in report.explained_variance_ratio.iter().enumerate() {
                println!("  PC{}: {:.1}% of variance", i + 1, ratio * 100.0);
            }
            println!("  Most variable sample: {}", report.most_variable);
            println!("  Least variable sample: {}", report.least_variable);
        }
        Some(Err(e)) => println!("\nPCA unavailable: {}", e),
        None => {}
    }
    match clustering {
        Some(Ok(clustering)) => {
            println!(
                "\nTop colonies in {} clusters ({}):",
                clustering.clusters.len(),
                clustering.features.join(", ")
            );
            for cluster in &clustering.clusters {
                let means: Vec<String> = cluster.feature_means.iter().map(|v| format!("{v:.2}")).collect();
                println!("  Cluster {}: {} colonies, means [{}]", cluster.cluster, cluster.count, means.join(", "));
            }
        }
        Some(Err(e)) => println!("\nTop colony clustering unavailable: {}", e),
        None => {}
    }
    Ok(())
}

fn print_batch(result: &BatchResult) {
    println!("\n=== Batch Analysis Results ===");
    println!(
        "Samples: {} succeeded, {} failed, {} skipped",
        result.succeeded(),
        result.failed(),
        result.skipped.len()
    );
    println!("Total colonies: {}", result.total_colonies());

    for sample in &result.samples {
        println!(
            "  {:<24} {:>5} colonies, average area {:.1} px",
            sample.label, sample.summary.total_colonies, sample.summary.average_area
        );
    }
    for failure in &result.failures {
        println!("  {:<24} FAILED: {}", failure.label, failure.reason);
    }

    if let Some(similarity) = &result.similarity {
        println!("\nSample similarity:");
        for (i, a) in similarity.samples.iter().enumerate() {
            let cells: Vec<String> = similarity.matrix[i].iter().map(|v| format!("{v:.3}")).collect();
            println!("  {:<24} {}", a.sample, cells.join("  "));
        }
    }

    if let Some(tests) = &result.statistical_tests {
        println!("\nColony area between samples:");
        println!(
            "  One-way ANOVA: F({}, {}) = {:.3}, p = {:.6}",
            tests.anova.df_between, tests.anova.df_within, tests.anova.f_statistic, tests.anova.p_value
        );
        if let Some(t) = &tests.t_test {
            println!(
                "  t-test {} vs {}: t({}) = {:.3}, p = {:.6}",
                t.first, t.second, t.df, t.t_statistic, t.p_value
            );
        }
    }
}
