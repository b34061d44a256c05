use image::RgbImage;
use palette::{FromColor, Lab, Srgb};
use std::collections::HashSet;
use tracing::debug;

use crate::analysis::kmeans::{renumber_by_appearance, KMeans};
use crate::models::ColorRecord;

/// Pixels sampled per colony for its dominant colour
pub const MAX_COLOR_SAMPLES: usize = 2000;
/// Clusters used to find one colony's dominant colour
pub const DOMINANT_CLUSTERS: usize = 3;
/// Largest cluster count the elbow search may pick
pub const MAX_AUTO_CLUSTERS: usize = 8;

/// Colour records for a set of colonies plus the global cluster count
#[derive(Debug, Clone, PartialEq)]
pub struct ColorAnalysis {
    /// Same order as the colonies passed in
    pub records: Vec<ColorRecord>,
    pub n_clusters: usize,
}

pub fn rgb_to_lab(rgb: [u8; 3]) -> [f32; 3] {
    let lab: Lab = Lab::from_color(Srgb::new(rgb[0], rgb[1], rgb[2]).into_format::<f32>());
    [lab.l, lab.a, lab.b]
}

/// Evenly strided subset of at most `limit` items
fn sample<T: Copy>(items: &[T], limit: usize) -> Vec<T> {
    if items.len() <= limit {
        return items.to_vec();
    }
    let stride = items.len().div_ceil(limit);
    items.iter().step_by(stride).copied().collect()
}

/// Centre of the largest colour cluster among the colony's pixels
pub fn dominant_color(img: &RgbImage, pixels: &[(u32, u32)], seed: u64, n_init: usize) -> [u8; 3] {
    let colors: Vec<[u8; 3]> = sample(pixels, MAX_COLOR_SAMPLES)
        .into_iter()
        .map(|(x, y)| img.get_pixel(x, y).0)
        .collect();
    if colors.is_empty() {
        return [0, 0, 0];
    }

    let distinct: HashSet<[u8; 3]> = colors.iter().copied().collect();
    let k = DOMINANT_CLUSTERS.min(distinct.len());
    let data: Vec<Vec<f64>> = colors
        .iter()
        .map(|c| c.iter().map(|&v| v as f64).collect())
        .collect();

    let Some(fit) = KMeans::new(k).with_seed(seed).with_n_init(n_init).fit(&data) else {
        return colors[0];
    };
    let sizes = fit.cluster_sizes();
    let largest = sizes
        .iter()
        .enumerate()
        .fold(0, |best, (i, &n)| if n > sizes[best] { i } else { best });

    let center = &fit.centers[largest];
    [0, 1, 2].map(|c| center[c].round().clamp(0.0, 255.0) as u8)
}

/// Elbow of the inertia curve: the k in [2, 8] with the largest second difference
pub fn elbow_cluster_count(points: &[Vec<f64>], seed: u64, n_init: usize) -> usize {
    let max_k = (MAX_AUTO_CLUSTERS + 1).min(points.len());
    let inertias: Vec<f64> = (1..=max_k)
        .map(|k| {
            KMeans::new(k)
                .with_seed(seed)
                .with_n_init(n_init)
                .fit(points)
                .map(|fit| fit.inertia)
                .unwrap_or(0.0)
        })
        .collect();
    if inertias.len() < 3 {
        return 2.min(points.len());
    }

    // inertias[k - 1] is I(k)
    let mut best_k = 2;
    let mut best_bend = f64::NEG_INFINITY;
    for k in 2..inertias.len() {
        let bend = inertias[k - 2] - 2.0 * inertias[k - 1] + inertias[k];
        if bend > best_bend {
            best_bend = bend;
            best_k = k;
        }
    }
    best_k
}

/// Cluster Lab colours into `requested` groups (0 = choose by elbow).
/// Ids are renumbered by first appearance; returns ids and the number used.
pub fn cluster_colors(labs: &[[f32; 3]], requested: usize, seed: u64, n_init: usize) -> (Vec<usize>, usize) {
    if labs.is_empty() {
        return (Vec::new(), 0);
    }
    let points: Vec<Vec<f64>> = labs
        .iter()
        .map(|lab| lab.iter().map(|&v| v as f64).collect())
        .collect();

    let k = if requested == 0 {
        elbow_cluster_count(&points, seed, n_init)
    } else {
        requested.min(points.len())
    };
    match KMeans::new(k).with_seed(seed).with_n_init(n_init).fit(&points) {
        Some(fit) => renumber_by_appearance(&fit.assignments),
        None => (vec![0; labs.len()], 1),
    }
}

/// Dominant colour per colony, then global clustering over their Lab values
pub fn analyze_colors(
    img: &RgbImage,
    colony_pixels: &[&[(u32, u32)]],
    requested_clusters: usize,
    seed: u64,
    n_init: usize,
) -> ColorAnalysis {
    let dominants: Vec<[u8; 3]> = colony_pixels
        .iter()
        .map(|pixels| dominant_color(img, pixels, seed, n_init))
        .collect();
    let labs: Vec<[f32; 3]> = dominants.iter().map(|&c| rgb_to_lab(c)).collect();
    let (clusters, n_clusters) = cluster_colors(&labs, requested_clusters, seed, n_init);
    debug!("Color analysis: {} colonies in {} clusters", labs.len(), n_clusters);

    let records = dominants
        .into_iter()
        .zip(labs)
        .zip(clusters)
        .map(|((dominant_color, lab_color), color_cluster)| ColorRecord {
            dominant_color,
            lab_color,
            color_cluster,
        })
        .collect();

    ColorAnalysis { records, n_clusters }
}
