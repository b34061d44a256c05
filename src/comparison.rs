//! Cross-sample comparison over the combined colony table of a batch.

use nalgebra::{DMatrix, SymmetricEigen};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};
use std::fmt;

use crate::analysis::KMeans;
use crate::error::{ColonyError, Result};
use crate::models::{ColonyRow, NUMERIC_FEATURES};

const MAX_COMPONENTS: usize = 5;
const MIN_FEATURES: usize = 2;
const CLUSTER_N_INIT: usize = 10;

/// Default features and seed for clustering the top colonies of a batch
pub const TOP_CLUSTER_FEATURES: [&str; 3] = ["area", "perimeter", "circularity"];
pub const TOP_CLUSTER_SEED: u64 = 42;

/// Summary statistics of one sample's colonies
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleStats {
    pub sample: String,
    pub colony_count: usize,
    pub area_mean: f64,
    pub area_std: f64,
    pub circularity_mean: f64,
    pub circularity_std: f64,
    pub aspect_ratio_mean: f64,
    pub aspect_ratio_std: f64,
}

impl SampleStats {
    fn vector(&self) -> [f64; 7] {
        [
            self.area_mean,
            self.area_std,
            self.colony_count as f64,
            self.circularity_mean,
            self.circularity_std,
            self.aspect_ratio_mean,
            self.aspect_ratio_std,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityReport {
    /// In order of first appearance in the table
    pub samples: Vec<SampleStats>,
    /// `matrix[i][j]` = 1 / (1 + distance between the stat vectors); 1 on the diagonal
    pub matrix: Vec<Vec<f64>>,
}

impl SimilarityReport {
    pub fn similarity(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.samples.iter().position(|s| s.sample == a)?;
        let j = self.samples.iter().position(|s| s.sample == b)?;
        Some(self.matrix[i][j])
    }
}

/// Distinct sample names in order of first appearance
fn sample_names(rows: &[ColonyRow]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for row in rows {
        if !names.iter().any(|n| n == row.sample_name()) {
            names.push(row.sample_name().to_string());
        }
    }
    names
}

/// Mean and sample standard deviation (ddof = 1); 0 where undefined
fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Per-sample colony statistics and the pairwise similarity between samples
pub fn similarity_analysis(rows: &[ColonyRow]) -> Result<SimilarityReport> {
    if rows.is_empty() {
        return Err(ColonyError::InsufficientColonies { required: 1, found: 0 });
    }

    let samples: Vec<SampleStats> = sample_names(rows)
        .into_iter()
        .map(|name| {
            let mine: Vec<&ColonyRow> = rows.iter().filter(|r| r.sample_name() == name).collect();
            let column = |feature: &str| -> Vec<f64> { mine.iter().filter_map(|r| r.numeric(feature)).collect() };
            let (area_mean, area_std) = mean_std(&column("area"));
            let (circularity_mean, circularity_std) = mean_std(&column("circularity"));
            let (aspect_ratio_mean, aspect_ratio_std) = mean_std(&column("aspect_ratio"));
            SampleStats {
                sample: name,
                colony_count: mine.len(),
                area_mean: round3(area_mean),
                area_std: round3(area_std),
                circularity_mean: round3(circularity_mean),
                circularity_std: round3(circularity_std),
                aspect_ratio_mean: round3(aspect_ratio_mean),
                aspect_ratio_std: round3(aspect_ratio_std),
            }
        })
        .collect();

    let vectors: Vec<[f64; 7]> = samples.iter().map(SampleStats::vector).collect();
    let matrix = vectors
        .iter()
        .enumerate()
        .map(|(i, a)| {
            vectors
                .iter()
                .enumerate()
                .map(|(j, b)| {
                    if i == j {
                        return 1.0;
                    }
                    let d = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt();
                    1.0 / (1.0 + d)
                })
                .collect()
        })
        .collect();

    Ok(SimilarityReport { samples, matrix })
}

/// One-way ANOVA of colony area across samples
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnovaResult {
    pub f_statistic: f64,
    pub p_value: f64,
    pub df_between: usize,
    pub df_within: usize,
}

/// Independent two-sample t-test with pooled variance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TTestResult {
    pub first: String,
    pub second: String,
    pub t_statistic: f64,
    /// Two-sided
    pub p_value: f64,
    pub df: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticalTests {
    pub anova: AnovaResult,
    /// Only run when the table holds exactly two samples
    pub t_test: Option<TTestResult>,
}

/// Compare colony area between the samples of a combined table.
///
/// Needs at least two samples and more colonies than samples. When the
/// areas do not vary within any sample the statistic is infinite (p = 0),
/// or 0 (p = 1) if nothing varies at all.
pub fn statistical_tests(rows: &[ColonyRow]) -> Result<StatisticalTests> {
    let names = sample_names(rows);
    if names.len() < 2 {
        return Err(ColonyError::InsufficientSamples {
            required: 2,
            found: names.len(),
        });
    }
    if rows.len() <= names.len() {
        return Err(ColonyError::InsufficientColonies {
            required: names.len() + 1,
            found: rows.len(),
        });
    }

    let groups: Vec<Vec<f64>> = names
        .iter()
        .map(|name| {
            rows.iter()
                .filter(|r| r.sample_name() == name)
                .map(|r| r.area as f64)
                .collect()
        })
        .collect();

    let anova = one_way_anova(&groups)?;
    let t_test = match (names.as_slice(), groups.as_slice()) {
        ([first, second], [a, b]) => Some(pooled_t_test(first, second, a, b)?),
        _ => None,
    };
    Ok(StatisticalTests { anova, t_test })
}

fn sum_of_squares(values: &[f64], mean: f64) -> f64 {
    values.iter().map(|v| (v - mean).powi(2)).sum()
}

fn one_way_anova(groups: &[Vec<f64>]) -> Result<AnovaResult> {
    let total: usize = groups.iter().map(Vec::len).sum();
    let grand_mean = groups.iter().flatten().sum::<f64>() / total as f64;

    let mut ss_between = 0.0;
    let mut ss_within = 0.0;
    for group in groups {
        let mean = group.iter().sum::<f64>() / group.len() as f64;
        ss_between += group.len() as f64 * (mean - grand_mean).powi(2);
        ss_within += sum_of_squares(group, mean);
    }
    let df_between = groups.len() - 1;
    let df_within = total - groups.len();

    let (f_statistic, p_value) = if ss_within > 0.0 {
        let f = (ss_between / df_between as f64) / (ss_within / df_within as f64);
        let dist = FisherSnedecor::new(df_between as f64, df_within as f64)
            .map_err(|e| ColonyError::Statistics(e.to_string()))?;
        (f, dist.sf(f))
    } else if ss_between > 0.0 {
        (f64::INFINITY, 0.0)
    } else {
        (0.0, 1.0)
    };

    Ok(AnovaResult {
        f_statistic,
        p_value,
        df_between,
        df_within,
    })
}

fn pooled_t_test(first: &str, second: &str, a: &[f64], b: &[f64]) -> Result<TTestResult> {
    let (na, nb) = (a.len() as f64, b.len() as f64);
    let mean_a = a.iter().sum::<f64>() / na;
    let mean_b = b.iter().sum::<f64>() / nb;
    let df = a.len() + b.len() - 2;
    let pooled = (sum_of_squares(a, mean_a) + sum_of_squares(b, mean_b)) / df as f64;
    let diff = mean_a - mean_b;

    let (t_statistic, p_value) = if pooled > 0.0 {
        let t = diff / (pooled * (1.0 / na + 1.0 / nb)).sqrt();
        let dist = StudentsT::new(0.0, 1.0, df as f64).map_err(|e| ColonyError::Statistics(e.to_string()))?;
        (t, (2.0 * dist.sf(t.abs())).min(1.0))
    } else if diff != 0.0 {
        (diff.signum() * f64::INFINITY, 0.0)
    } else {
        (0.0, 1.0)
    };

    Ok(TTestResult {
        first: first.to_string(),
        second: second.to_string(),
        t_statistic,
        p_value,
        df,
    })
}

/// Named groups of numeric features for PCA
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSet {
    Morphology,
    BioScoring,
    BioWithMorphology,
    SizeShape,
    AdvancedShape,
    AllAvailable,
}

impl FeatureSet {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureSet::Morphology => "morphology",
            FeatureSet::BioScoring => "bio_scoring",
            FeatureSet::BioWithMorphology => "bio_with_morphology",
            FeatureSet::SizeShape => "size_shape",
            FeatureSet::AdvancedShape => "advanced_shape",
            FeatureSet::AllAvailable => "all_available",
        }
    }

    pub fn features(&self) -> &'static [&'static str] {
        match self {
            FeatureSet::Morphology => &["area", "perimeter", "circularity", "aspect_ratio", "solidity"],
            FeatureSet::BioScoring => &["bio_interest", "morphology_score", "density_score", "form_score"],
            FeatureSet::BioWithMorphology => {
                &["area", "perimeter", "circularity", "aspect_ratio", "solidity", "bio_interest"]
            }
            FeatureSet::SizeShape => &["area", "perimeter", "circularity"],
            FeatureSet::AdvancedShape => &["aspect_ratio", "solidity", "circularity"],
            FeatureSet::AllAvailable => NUMERIC_FEATURES,
        }
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FeatureSet {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "morphology" => Ok(FeatureSet::Morphology),
            "bio_scoring" => Ok(FeatureSet::BioScoring),
            "bio_with_morphology" => Ok(FeatureSet::BioWithMorphology),
            "size_shape" => Ok(FeatureSet::SizeShape),
            "advanced_shape" => Ok(FeatureSet::AdvancedShape),
            "all_available" => Ok(FeatureSet::AllAvailable),
            other => Err(format!("unknown feature set '{other}'")),
        }
    }
}

/// Features from `wanted` that at least one row carries
fn available_features(rows: &[ColonyRow], wanted: &[&str]) -> Vec<String> {
    wanted
        .iter()
        .filter(|f| rows.iter().any(|r| r.numeric(f).is_some()))
        .map(|f| f.to_string())
        .collect()
}

/// Rows having every feature, as (row index, values)
fn complete_rows(rows: &[ColonyRow], features: &[String]) -> Vec<(usize, Vec<f64>)> {
    rows.iter()
        .enumerate()
        .filter_map(|(i, r)| {
            let values: Option<Vec<f64>> = features.iter().map(|f| r.numeric(f)).collect();
            values.map(|v| (i, v))
        })
        .collect()
}

/// Zero-mean, unit-variance columns (population std; constant columns stay at 0)
fn standardize(data: &[Vec<f64>]) -> DMatrix<f64> {
    let (n, p) = (data.len(), data.first().map_or(0, Vec::len));
    let mut m = DMatrix::from_fn(n, p, |i, j| data[i][j]);
    for j in 0..p {
        let mean = m.column(j).mean();
        let var = m.column(j).iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        let scale = if var > 0.0 { var.sqrt() } else { 1.0 };
        for i in 0..n {
            m[(i, j)] = (m[(i, j)] - mean) / scale;
        }
    }
    m
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PcaRow {
    pub sample: String,
    pub label: u32,
    /// One score per component
    pub components: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PcaReport {
    pub feature_set: FeatureSet,
    pub feature_names: Vec<String>,
    pub explained_variance_ratio: Vec<f64>,
    pub rows: Vec<PcaRow>,
    /// Variance over PC1 and PC2 per sample, in order of first appearance
    pub sample_variance: Vec<(String, f64)>,
    pub most_variable: String,
    pub least_variable: String,
}

/// Principal component analysis of the standardised features of `feature_set`
pub fn pca_analysis(rows: &[ColonyRow], feature_set: FeatureSet) -> Result<PcaReport> {
    let features = available_features(rows, feature_set.features());
    if features.len() < MIN_FEATURES {
        return Err(ColonyError::InsufficientFeatures {
            feature_set: format!("PCA ({feature_set})"),
            required: MIN_FEATURES,
            available: features,
        });
    }

    let complete = complete_rows(rows, &features);
    if complete.len() < 2 {
        return Err(ColonyError::InsufficientColonies {
            required: 2,
            found: complete.len(),
        });
    }
    let data: Vec<Vec<f64>> = complete.iter().map(|(_, v)| v.clone()).collect();
    let x = standardize(&data);
    let n = x.nrows();

    let covariance = (x.transpose() * &x) / (n as f64 - 1.0);
    let eigen = SymmetricEigen::new(covariance);
    let mut order: Vec<usize> = (0..eigen.eigenvalues.len()).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

    let n_components = features.len().min(MAX_COMPONENTS).min(n);
    let total: f64 = eigen.eigenvalues.iter().map(|v| v.max(0.0)).sum();
    let explained_variance_ratio = order
        .iter()
        .take(n_components)
        .map(|&i| if total > 0.0 { eigen.eigenvalues[i].max(0.0) / total } else { 0.0 })
        .collect();

    // each axis points toward its largest-magnitude loading
    let axes: Vec<Vec<f64>> = order
        .iter()
        .take(n_components)
        .map(|&i| {
            let v: Vec<f64> = eigen.eigenvectors.column(i).iter().copied().collect();
            let pivot = v.iter().copied().fold(0.0, |acc: f64, x| if x.abs() > acc.abs() { x } else { acc });
            if pivot < 0.0 { v.into_iter().map(|x| -x).collect() } else { v }
        })
        .collect();

    let pca_rows: Vec<PcaRow> = complete
        .iter()
        .enumerate()
        .map(|(r, (original, _))| PcaRow {
            sample: rows[*original].sample_name().to_string(),
            label: rows[*original].label,
            components: axes
                .iter()
                .map(|axis| axis.iter().enumerate().map(|(j, w)| x[(r, j)] * w).sum())
                .collect(),
        })
        .collect();

    let mut sample_variance: Vec<(String, f64)> = Vec::new();
    for name in sample_names(rows) {
        let scores: Vec<&PcaRow> = pca_rows.iter().filter(|r| r.sample == name).collect();
        if scores.is_empty() {
            continue;
        }
        let variance: f64 = (0..2.min(n_components))
            .map(|c| {
                let values: Vec<f64> = scores.iter().map(|r| r.components[c]).collect();
                let (_, std) = mean_std(&values);
                std * std
            })
            .sum();
        sample_variance.push((name, variance));
    }

    let most_variable = sample_variance
        .iter()
        .fold(None, |best: Option<&(String, f64)>, cur| match best {
            Some(b) if b.1 >= cur.1 => Some(b),
            _ => Some(cur),
        })
        .map(|(name, _)| name.clone())
        .unwrap_or_default();
    let least_variable = sample_variance
        .iter()
        .fold(None, |best: Option<&(String, f64)>, cur| match best {
            Some(b) if b.1 <= cur.1 => Some(b),
            _ => Some(cur),
        })
        .map(|(name, _)| name.clone())
        .unwrap_or_default();

    Ok(PcaReport {
        feature_set,
        feature_names: features,
        explained_variance_ratio,
        rows: pca_rows,
        sample_variance,
        most_variable,
        least_variable,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub cluster: usize,
    pub count: usize,
    /// Mean of each feature in original units, same order as `features`
    pub feature_means: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColonyClustering {
    pub features: Vec<String>,
    /// (sample, label, cluster) for every row that has all features
    pub assignments: Vec<(String, u32, usize)>,
    pub clusters: Vec<ClusterSummary>,
}

/// Group colonies by standardised k-means over `features`
pub fn cluster_colonies(
    rows: &[ColonyRow],
    features: &[&str],
    n_clusters: usize,
    seed: u64,
) -> Result<ColonyClustering> {
    let available = available_features(rows, features);
    if available.len() < MIN_FEATURES {
        return Err(ColonyError::InsufficientFeatures {
            feature_set: "Colony clustering".to_string(),
            required: MIN_FEATURES,
            available,
        });
    }
    let complete = complete_rows(rows, &available);
    let required = n_clusters.max(1) + 1;
    if complete.len() < required {
        return Err(ColonyError::InsufficientColonies {
            required,
            found: complete.len(),
        });
    }

    let data: Vec<Vec<f64>> = complete.iter().map(|(_, v)| v.clone()).collect();
    let x = standardize(&data);
    let points: Vec<Vec<f64>> = x.row_iter().map(|r| r.iter().copied().collect()).collect();
    let fit = KMeans::new(n_clusters.max(1))
        .with_seed(seed)
        .with_n_init(CLUSTER_N_INIT)
        .fit(&points)
        .ok_or(ColonyError::InsufficientColonies {
            required,
            found: points.len(),
        })?;

    let clusters = (0..fit.centers.len())
        .map(|cluster| {
            let members: Vec<&Vec<f64>> = data
                .iter()
                .zip(&fit.assignments)
                .filter(|(_, a)| **a == cluster)
                .map(|(v, _)| v)
                .collect();
            let feature_means = (0..available.len())
                .map(|j| {
                    if members.is_empty() {
                        0.0
                    } else {
                        members.iter().map(|v| v[j]).sum::<f64>() / members.len() as f64
                    }
                })
                .collect();
            ClusterSummary {
                cluster,
                count: members.len(),
                feature_means,
            }
        })
        .collect();

    let assignments = complete
        .iter()
        .zip(&fit.assignments)
        .map(|((i, _), &a)| (rows[*i].sample_name().to_string(), rows[*i].label, a))
        .collect();

    Ok(ColonyClustering {
        features: available,
        assignments,
        clusters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BoundingBox;

    fn row(sample: &str, label: u32, area: u32, circularity: Option<f64>, aspect: Option<f64>) -> ColonyRow {
        ColonyRow {
            sample: Some(sample.to_string()),
            label,
            area,
            perimeter: (area as f64).sqrt() * 3.6,
            centroid_row: 0.0,
            centroid_col: 0.0,
            bounding_box: BoundingBox { min_row: 0, min_col: 0, max_row: 1, max_col: 1 },
            major_axis_length: 10.0,
            minor_axis_length: 8.0,
            solidity: 0.95,
            convex_area: area,
            circularity,
            aspect_ratio: aspect,
            convexity: None,
            form: None,
            margin: None,
            dominant_color: None,
            lab_color: None,
            color_cluster: None,
            opacity_score: None,
            texture_score: None,
            density_gradient: None,
            density_class: None,
            saturation: None,
            morphology_score: None,
            form_score: None,
            size_score: None,
            density_score: None,
            novelty_score: None,
            bio_interest: None,
            rank: None,
        }
    }

    fn table() -> Vec<ColonyRow> {
        vec![
            row("a", 1, 100, Some(0.9), Some(1.1)),
            row("a", 2, 120, Some(0.85), Some(1.2)),
            row("a", 3, 90, Some(0.95), Some(1.0)),
            row("b", 1, 400, Some(0.5), Some(2.5)),
            row("b", 2, 600, Some(0.4), Some(3.0)),
            row("c", 1, 110, Some(0.9), Some(1.1)),
            row("c", 2, 105, Some(0.88), Some(1.15)),
        ]
    }

    #[test]
    fn similarity_matrix_is_symmetric_with_unit_diagonal() {
        let report = similarity_analysis(&table()).unwrap();
        assert_eq!(report.samples.len(), 3);
        for i in 0..3 {
            assert_eq!(report.matrix[i][i], 1.0);
            for j in 0..3 {
                assert_eq!(report.matrix[i][j], report.matrix[j][i]);
                assert!(report.matrix[i][j] > 0.0 && report.matrix[i][j] <= 1.0);
            }
        }
        // a and c have similar colonies, b is different
        assert!(report.similarity("a", "c").unwrap() > report.similarity("a", "b").unwrap());
    }

    #[test]
    fn single_colony_sample_has_zero_std() {
        let rows = vec![row("solo", 1, 50, Some(0.9), Some(1.0))];
        let report = similarity_analysis(&rows).unwrap();
        assert_eq!(report.samples[0].area_std, 0.0);
        assert_eq!(report.samples[0].colony_count, 1);
    }

    #[test]
    fn pca_reports_ordered_explained_variance() {
        let report = pca_analysis(&table(), FeatureSet::Morphology).unwrap();
        assert_eq!(report.feature_names.len(), 5);
        assert_eq!(report.explained_variance_ratio.len(), 5);
        let ratios = &report.explained_variance_ratio;
        assert!(ratios.windows(2).all(|w| w[0] >= w[1] - 1e-12));
        assert!((ratios.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert_eq!(report.rows.len(), 7);
        assert_eq!(report.sample_variance.len(), 3);
        assert_eq!(report.most_variable, "b");
    }

    #[test]
    fn pca_without_enough_features_lists_what_is_available() {
        let err = pca_analysis(&table(), FeatureSet::BioScoring).unwrap_err();
        match err {
            ColonyError::InsufficientFeatures { required, available, .. } => {
                assert_eq!(required, 2);
                assert!(available.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn pca_drops_incomplete_rows() {
        let mut rows = table();
        rows.push(row("d", 1, 300, None, None));
        let report = pca_analysis(&rows, FeatureSet::SizeShape).unwrap();
        assert_eq!(report.rows.len(), 7);
        assert!(report.rows.iter().all(|r| r.sample != "d"));
    }

    #[test]
    fn clustering_separates_large_from_small_colonies() {
        let clustering = cluster_colonies(&table(), &["area", "circularity"], 2, 42).unwrap();
        assert_eq!(clustering.assignments.len(), 7);
        let cluster_of = |sample: &str, label: u32| {
            clustering
                .assignments
                .iter()
                .find(|(s, l, _)| s == sample && *l == label)
                .map(|(_, _, c)| *c)
                .unwrap()
        };
        assert_eq!(cluster_of("b", 1), cluster_of("b", 2));
        assert_ne!(cluster_of("a", 1), cluster_of("b", 1));
        assert_eq!(clustering.clusters.iter().map(|c| c.count).sum::<usize>(), 7);
    }

    #[test]
    fn clustering_needs_more_rows_than_clusters() {
        let rows: Vec<ColonyRow> = table().into_iter().take(3).collect();
        assert!(matches!(
            cluster_colonies(&rows, &["area", "circularity"], 3, 1),
            Err(ColonyError::InsufficientColonies { required: 4, found: 3 })
        ));
    }

    #[test]
    fn two_samples_get_anova_and_t_test() {
        let rows: Vec<ColonyRow> = [("x", 1), ("x", 2), ("x", 3), ("y", 4), ("y", 5), ("y", 6)]
            .iter()
            .enumerate()
            .map(|(i, &(sample, area))| row(sample, i as u32 + 1, area, None, None))
            .collect();
        let tests = statistical_tests(&rows).unwrap();

        assert_eq!(tests.anova.df_between, 1);
        assert_eq!(tests.anova.df_within, 4);
        assert!((tests.anova.f_statistic - 13.5).abs() < 1e-9);
        assert!((tests.anova.p_value - 0.021312).abs() < 1e-5);

        let t = tests.t_test.unwrap();
        assert_eq!((t.first.as_str(), t.second.as_str()), ("x", "y"));
        assert_eq!(t.df, 4);
        // with two groups t^2 = F and both tests agree
        assert!((t.t_statistic + 13.5f64.sqrt()).abs() < 1e-9);
        assert!((t.p_value - tests.anova.p_value).abs() < 1e-9);
    }

    #[test]
    fn three_samples_skip_the_t_test() {
        let tests = statistical_tests(&table()).unwrap();
        assert_eq!(tests.anova.df_between, 2);
        assert_eq!(tests.anova.df_within, 4);
        assert!(tests.anova.p_value < 0.01);
        assert!(tests.t_test.is_none());
    }

    #[test]
    fn identical_areas_are_not_different() {
        let rows = vec![
            row("x", 1, 50, None, None),
            row("x", 2, 50, None, None),
            row("y", 1, 50, None, None),
        ];
        let tests = statistical_tests(&rows).unwrap();
        assert_eq!(tests.anova.f_statistic, 0.0);
        assert_eq!(tests.anova.p_value, 1.0);
        assert_eq!(tests.t_test.unwrap().p_value, 1.0);
    }

    #[test]
    fn statistical_tests_need_two_samples_and_spare_colonies() {
        let one = vec![row("x", 1, 50, None, None), row("x", 2, 60, None, None)];
        assert!(matches!(
            statistical_tests(&one),
            Err(ColonyError::InsufficientSamples { required: 2, found: 1 })
        ));

        let singletons = vec![row("x", 1, 50, None, None), row("y", 1, 60, None, None)];
        assert!(matches!(
            statistical_tests(&singletons),
            Err(ColonyError::InsufficientColonies { required: 3, found: 2 })
        ));
    }
}
