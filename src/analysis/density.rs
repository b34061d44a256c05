use image::{GrayImage, RgbImage};

use crate::detection::regions::region_mask;
use crate::detection::segmentation::distance_transform;
use crate::models::{BoundingBox, DensityClass, DensityRecord, LabelMap};

/// Width of the background ring sampled around each colony's bounding box
pub const BACKGROUND_RING: u32 = 10;
/// Background standard deviation never drops below this
pub const MIN_BACKGROUND_STD: f64 = 1.0;

/// Shared per-image inputs for density measurement
pub struct DensityContext<'a> {
    pub rgb: &'a RgbImage,
    pub gray: &'a GrayImage,
    pub labels: &'a LabelMap,
    pub plate_mask: &'a GrayImage,
    /// Unlabeled plate pixels, used when a colony has no ring background
    fallback_background: Option<(f64, f64)>,
}

impl<'a> DensityContext<'a> {
    pub fn new(rgb: &'a RgbImage, gray: &'a GrayImage, labels: &'a LabelMap, plate_mask: &'a GrayImage) -> Self {
        let background: Vec<f64> = gray
            .enumerate_pixels()
            .filter(|(x, y, _)| plate_mask.get_pixel(*x, *y)[0] != 0 && labels.get_pixel(*x, *y)[0] == 0)
            .map(|(_, _, p)| p[0] as f64)
            .collect();
        let fallback_background = mean_std(&background);
        Self {
            rgb,
            gray,
            labels,
            plate_mask,
            fallback_background,
        }
    }

    /// Mean and std of plate background just outside `bbox`
    fn local_background(&self, bbox: &BoundingBox) -> Option<(f64, f64)> {
        let ring = bbox.expand(BACKGROUND_RING, self.gray.width(), self.gray.height());
        let mut values = Vec::new();
        for y in ring.min_row..ring.max_row {
            for x in ring.min_col..ring.max_col {
                if bbox.contains(y, x)
                    || self.plate_mask.get_pixel(x, y)[0] == 0
                    || self.labels.get_pixel(x, y)[0] != 0
                {
                    continue;
                }
                values.push(self.gray.get_pixel(x, y)[0] as f64);
            }
        }
        mean_std(&values)
    }
}

/// Population mean and standard deviation; `None` when empty
fn mean_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    Some((mean, var.sqrt()))
}

pub fn classify_density(opacity: f64) -> DensityClass {
    if opacity < 0.5 {
        DensityClass::VerySparse
    } else if opacity < 1.0 {
        DensityClass::Sparse
    } else if opacity < 2.0 {
        DensityClass::Medium
    } else if opacity < 3.5 {
        DensityClass::Dense
    } else {
        DensityClass::VeryDense
    }
}

/// Intensity variance in the 3x3 window around (x, y), clipped to the image
fn local_variance(gray: &GrayImage, x: u32, y: u32) -> f64 {
    let (w, h) = gray.dimensions();
    let (mut sum, mut sum_sq, mut n) = (0.0, 0.0, 0.0);
    for yy in y.saturating_sub(1)..=(y + 1).min(h - 1) {
        for xx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
            let v = gray.get_pixel(xx, yy)[0] as f64;
            sum += v;
            sum_sq += v * v;
            n += 1.0;
        }
    }
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}

/// HSV saturation in [0, 1]
fn saturation(rgb: [u8; 3]) -> f64 {
    let max = rgb.iter().copied().max().unwrap_or(0) as f64;
    let min = rgb.iter().copied().min().unwrap_or(0) as f64;
    if max == 0.0 { 0.0 } else { (max - min) / max }
}

/// Core mean minus rim mean, split at half the deepest inward distance
fn core_rim_gradient(gray: &GrayImage, pixels: &[(u32, u32)], bbox: &BoundingBox) -> f64 {
    let mask = region_mask(pixels, bbox);
    let distances = distance_transform(&mask);
    let stride = mask.width() as usize;
    let depth = |x: u32, y: u32| {
        let (mx, my) = ((x - bbox.min_col + 1) as usize, (y - bbox.min_row + 1) as usize);
        distances[my * stride + mx]
    };

    let deepest = pixels.iter().map(|&(x, y)| depth(x, y)).fold(0.0, f64::max);
    let split = deepest / 2.0;
    let (mut core_sum, mut core_n, mut rim_sum, mut rim_n) = (0.0, 0usize, 0.0, 0usize);
    for &(x, y) in pixels {
        let v = gray.get_pixel(x, y)[0] as f64;
        if depth(x, y) >= split {
            core_sum += v;
            core_n += 1;
        } else {
            rim_sum += v;
            rim_n += 1;
        }
    }
    if core_n == 0 || rim_n == 0 {
        return 0.0;
    }
    core_sum / core_n as f64 - rim_sum / rim_n as f64
}

/// Density descriptors for one colony
pub fn analyze_colony(ctx: &DensityContext<'_>, pixels: &[(u32, u32)], bbox: &BoundingBox) -> DensityRecord {
    if pixels.is_empty() {
        return DensityRecord {
            opacity_score: 0.0,
            texture_score: 0.0,
            density_gradient: 0.0,
            density_class: DensityClass::VerySparse,
            saturation: 0.0,
        };
    }
    let n = pixels.len() as f64;
    let colony_mean = pixels
        .iter()
        .map(|&(x, y)| ctx.gray.get_pixel(x, y)[0] as f64)
        .sum::<f64>()
        / n;

    // no background anywhere on the plate: nothing to contrast against
    let (bg_mean, bg_std) = ctx
        .local_background(bbox)
        .or(ctx.fallback_background)
        .unwrap_or((colony_mean, MIN_BACKGROUND_STD));
    let opacity_score = (colony_mean - bg_mean).abs() / bg_std.max(MIN_BACKGROUND_STD);

    let texture_score = pixels
        .iter()
        .map(|&(x, y)| local_variance(ctx.gray, x, y))
        .sum::<f64>()
        / n;
    let saturation = pixels
        .iter()
        .map(|&(x, y)| saturation(ctx.rgb.get_pixel(x, y).0))
        .sum::<f64>()
        / n;

    DensityRecord {
        opacity_score,
        texture_score,
        density_gradient: core_rim_gradient(ctx.gray, pixels, bbox),
        density_class: classify_density(opacity_score),
        saturation,
    }
}
