use image::{GrayImage, Luma, RgbImage};
use imageproc::distance_transform::{euclidean_squared_distance_transform, Norm};
use imageproc::filter::{box_filter, gaussian_blur_f32};
use imageproc::morphology::{close, erode, open};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::debug;

use crate::config::{AdaptiveMethod, AnalysisConfig};
use crate::detection::contours::{self, FOREGROUND};
use crate::detection::preprocessing::to_grayscale;
use crate::models::LabelMap;

/// Least rise above the plate background for the background test
pub const MIN_BACKGROUND_MARGIN: f64 = 24.0;
/// Background noise multiples (robust sigma) for the background test
pub const BACKGROUND_SIGMAS: f64 = 4.0;
/// A distance-map peak must rise this far above the saddle joining it to a
/// higher peak to seed its own basin
pub const MIN_PEAK_DYNAMIC: f64 = 1.5;

/// Output of colony segmentation
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// Dense labels 1..=colony_count, 0 for background
    pub label_map: LabelMap,
    /// Cleaned foreground before splitting and size filtering
    pub binary_mask: GrayImage,
    pub colony_count: u32,
}

/// Parameters of colony segmentation
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationParams {
    pub block_size: u32,
    pub offset: f32,
    pub method: AdaptiveMethod,
    pub watershed: bool,
    pub min_distance: u32,
    pub min_size: u32,
    pub max_size: u32,
}

impl From<&AnalysisConfig> for SegmentationParams {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            block_size: config.adaptive_block_size,
            offset: config.adaptive_c,
            method: config.adaptive_method,
            watershed: config.watershed,
            min_distance: config.watershed_min_distance,
            min_size: config.min_colony_size,
            max_size: config.max_colony_size,
        }
    }
}

impl Default for SegmentationParams {
    fn default() -> Self {
        Self::from(&AnalysisConfig::default())
    }
}

/// Segment colonies inside the plate mask
pub fn segment(img: &RgbImage, plate_mask: &GrayImage, params: &SegmentationParams) -> Segmentation {
    let gray = to_grayscale(img);

    // Pixels whose threshold window reaches past the plate edge would see the
    // dark surround and light up as a ring.
    let guard = (params.block_size / 2 + 2).min(u8::MAX as u32) as u8;
    let inner_plate = erode(plate_mask, Norm::LInf, guard);

    let adaptive = adaptive_threshold(&gray, &inner_plate, params.block_size, params.offset, params.method);
    let raw = with_background_support(&gray, &inner_plate, &adaptive, params.max_size);
    let binary_mask = clean_mask(&raw, &inner_plate);

    let labels = if params.watershed {
        let distances = distance_transform(&binary_mask);
        let seeds = find_peaks(&distances, &binary_mask, params.min_distance);
        debug!("Watershed: {} seeds", seeds.len());
        watershed(&distances, &binary_mask, &seeds)
    } else {
        contours::label_components(&binary_mask).0
    };

    let (label_map, colony_count) = filter_by_size(&labels, params.min_size, params.max_size);
    debug!(
        "Segmentation: {} foreground pixels, {} colonies after size filtering",
        contours::count_foreground(&binary_mask),
        colony_count
    );

    Segmentation {
        label_map,
        binary_mask,
        colony_count,
    }
}

/// Local thresholding: a pixel is foreground when it exceeds the mean of its
/// `block_size` neighbourhood by more than `c`. Only pixels inside `mask` count.
pub fn adaptive_threshold(
    gray: &GrayImage,
    mask: &GrayImage,
    block_size: u32,
    c: f32,
    method: AdaptiveMethod,
) -> GrayImage {
    let radius = block_size / 2;
    let local_mean = match method {
        AdaptiveMethod::Mean => box_filter(gray, radius, radius),
        AdaptiveMethod::Gaussian => {
            // sigma OpenCV derives for a kernel of this size
            let sigma = 0.3 * ((block_size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
            gaussian_blur_f32(gray, sigma)
        }
    };

    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let inside = mask.get_pixel(x, y)[0] != 0;
        let value = gray.get_pixel(x, y)[0] as f32;
        let mean = local_mean.get_pixel(x, y)[0] as f32;
        if inside && value > mean + c {
            Luma([FOREGROUND])
        } else {
            Luma([0])
        }
    })
}

/// Opening then closing with a 3x3 square, re-clipped to `mask`, then hole filling
pub fn clean_mask(binary: &GrayImage, mask: &GrayImage) -> GrayImage {
    let opened = open(binary, Norm::LInf, 1);
    let closed = close(&opened, Norm::LInf, 1);
    let clipped = GrayImage::from_fn(closed.width(), closed.height(), |x, y| {
        if closed.get_pixel(x, y)[0] != 0 && mask.get_pixel(x, y)[0] != 0 {
            Luma([FOREGROUND])
        } else {
            Luma([0])
        }
    });
    contours::fill_holes(&clipped)
}

/// Row-major Euclidean distance from every foreground pixel to the nearest
/// background pixel; pixels outside the image count as background.
pub fn distance_transform(mask: &GrayImage) -> Vec<f64> {
    let (width, height) = mask.dimensions();
    // background becomes the "feature" set the transform measures distance to
    let padded = GrayImage::from_fn(width + 2, height + 2, |x, y| {
        let interior = x >= 1 && y >= 1 && x <= width && y <= height;
        if interior && mask.get_pixel(x - 1, y - 1)[0] != 0 {
            Luma([0])
        } else {
            Luma([FOREGROUND])
        }
    });
    let squared = euclidean_squared_distance_transform(&padded);

    let mut distances = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            distances.push(squared.get_pixel(x + 1, y + 1)[0].sqrt());
        }
    }
    distances
}

/// Median of a 256-bin histogram holding `n` samples
fn histogram_median(hist: &[usize; 256], n: usize) -> u8 {
    let mut seen = 0;
    for (value, &count) in hist.iter().enumerate() {
        seen += count;
        if 2 * seen >= n {
            return value as u8;
        }
    }
    u8::MAX
}

/// Add the parts of colonies the local threshold misses.
///
/// A uniform colony wider than the threshold block only lights up along its
/// rim, since its interior equals its own local mean. Pixels standing clearly
/// above the plate background (median plus `BACKGROUND_SIGMAS` robust sigmas,
/// at least `MIN_BACKGROUND_MARGIN`) fill it back in. Only components of that
/// background test which overlap the adaptive foreground and are no larger
/// than `max_area` are taken, so a plate without local contrast stays empty.
pub fn with_background_support(gray: &GrayImage, mask: &GrayImage, adaptive: &GrayImage, max_area: u32) -> GrayImage {
    let mut hist = [0usize; 256];
    let mut n = 0;
    for (p, m) in gray.pixels().zip(mask.pixels()) {
        if m[0] != 0 {
            hist[p[0] as usize] += 1;
            n += 1;
        }
    }
    if n == 0 {
        return adaptive.clone();
    }
    let median = histogram_median(&hist, n);

    let mut deviations = [0usize; 256];
    for (value, &count) in hist.iter().enumerate() {
        deviations[(value as i32 - median as i32).unsigned_abs() as usize] += count;
    }
    let sigma = 1.4826 * histogram_median(&deviations, n) as f64;
    let level = median as f64 + (BACKGROUND_SIGMAS * sigma).max(MIN_BACKGROUND_MARGIN);

    let above = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if mask.get_pixel(x, y)[0] != 0 && gray.get_pixel(x, y)[0] as f64 > level {
            Luma([FOREGROUND])
        } else {
            Luma([0])
        }
    });
    let (components, count) = contours::label_components(&above);
    let areas = contours::label_areas(&components, count);
    let mut keep = vec![false; count as usize + 1];
    for (x, y, p) in adaptive.enumerate_pixels() {
        if p[0] != 0 {
            let c = components.get_pixel(x, y)[0] as usize;
            keep[c] = c != 0 && areas[c] <= max_area;
        }
    }

    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if adaptive.get_pixel(x, y)[0] != 0 || keep[components.get_pixel(x, y)[0] as usize] {
            Luma([FOREGROUND])
        } else {
            Luma([0])
        }
    })
}

fn find_root(parent: &mut [usize], mut idx: usize) -> usize {
    while parent[idx] != idx {
        parent[idx] = parent[parent[idx]];
        idx = parent[idx];
    }
    idx
}

/// Maxima of the distance map whose dynamic is at least `min_dynamic`,
/// strongest first.
///
/// Foreground pixels join in decreasing distance order (raster order among
/// ties) and merge with their 8-neighbours. Where two regions meet, the one
/// with the lower peak ends there; its peak is kept only if it rose
/// `min_dynamic` above the meeting level. A flat or slightly bumpy ridge
/// therefore yields a single maximum, and the highest peak of every
/// connected component is always kept.
pub fn persistent_maxima(distances: &[f64], width: usize, height: usize, min_dynamic: f64) -> Vec<usize> {
    let n = distances.len();
    let mut order: Vec<usize> = (0..n).filter(|&i| distances[i] > 0.0).collect();
    order.sort_by(|&a, &b| distances[b].total_cmp(&distances[a]));
    let mut rank = vec![usize::MAX; n];
    for (r, &idx) in order.iter().enumerate() {
        rank[idx] = r;
    }

    // the root of every region is its highest pixel
    let mut parent: Vec<usize> = (0..n).collect();
    let mut added = vec![false; n];
    let mut maxima = Vec::new();

    for &idx in &order {
        added[idx] = true;
        let level = distances[idx];
        let (x, y) = (idx % width, idx / width);
        for ny in y.saturating_sub(1)..=(y + 1).min(height - 1) {
            for nx in x.saturating_sub(1)..=(x + 1).min(width - 1) {
                let nb = ny * width + nx;
                if nb == idx || !added[nb] {
                    continue;
                }
                let (a, b) = (find_root(&mut parent, idx), find_root(&mut parent, nb));
                if a == b {
                    continue;
                }
                let (keep, end) = if rank[a] < rank[b] { (a, b) } else { (b, a) };
                if end != idx && distances[end] - level >= min_dynamic {
                    maxima.push(end);
                }
                parent[end] = keep;
            }
        }
    }
    for &idx in &order {
        if find_root(&mut parent, idx) == idx {
            maxima.push(idx);
        }
    }

    maxima.sort_by_key(|&idx| rank[idx]);
    maxima
}

/// Watershed seeds: distance-map maxima with enough dynamic, at least
/// `min_distance` apart (Chebyshev), strongest first. Every foreground
/// component receives at least one seed. Returned as (x, y).
pub fn find_peaks(distances: &[f64], mask: &GrayImage, min_distance: u32) -> Vec<(u32, u32)> {
    let (width, height) = (mask.width() as usize, mask.height() as usize);
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let radius = min_distance.max(1) as usize;
    let candidates = persistent_maxima(distances, width, height, MIN_PEAK_DYNAMIC);

    let mut blocked = vec![false; distances.len()];
    let mut peaks = Vec::new();
    for idx in candidates {
        if blocked[idx] {
            continue;
        }
        let (x, y) = (idx % width, idx / width);
        peaks.push((x as u32, y as u32));
        for by in y.saturating_sub(radius)..=(y + radius).min(height - 1) {
            for bx in x.saturating_sub(radius)..=(x + radius).min(width - 1) {
                blocked[by * width + bx] = true;
            }
        }
    }

    // a small component can sit inside a bigger neighbour's window
    let (components, count) = contours::label_components(mask);
    let mut seeded = vec![false; count as usize + 1];
    for &(x, y) in &peaks {
        seeded[components.get_pixel(x, y)[0] as usize] = true;
    }
    let mut strongest: Vec<Option<usize>> = vec![None; count as usize + 1];
    for (idx, component) in components.pixels().enumerate() {
        let c = component[0] as usize;
        if c == 0 || seeded[c] {
            continue;
        }
        match strongest[c] {
            Some(best) if distances[best] >= distances[idx] => {}
            _ => strongest[c] = Some(idx),
        }
    }
    peaks.extend(
        strongest
            .into_iter()
            .flatten()
            .map(|idx| ((idx % width) as u32, (idx / width) as u32)),
    );
    peaks
}

#[derive(PartialEq)]
struct FloodEntry {
    distance: f64,
    age: u64,
    index: usize,
    label: u32,
}

impl Eq for FloodEntry {}

impl Ord for FloodEntry {
    // deepest basin (largest distance) first, then oldest entry
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| other.age.cmp(&self.age))
    }
}

impl PartialOrd for FloodEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Marker-based watershed on the negative distance map.
///
/// Each seed floods its basin over 4-connected foreground pixels in order of
/// decreasing distance; a pixel belongs to whichever basin reaches it first.
/// Seed `i` gets label `i + 1`.
pub fn watershed(distances: &[f64], mask: &GrayImage, seeds: &[(u32, u32)]) -> LabelMap {
    let (width, height) = mask.dimensions();
    let (w, h) = (width as usize, height as usize);
    let mut labels = vec![0u32; w * h];
    let mut heap = BinaryHeap::new();
    let mut age = 0u64;

    let is_foreground = |idx: usize| mask.as_raw()[idx] != 0;

    for (i, &(x, y)) in seeds.iter().enumerate() {
        let idx = y as usize * w + x as usize;
        if is_foreground(idx) && labels[idx] == 0 {
            labels[idx] = i as u32 + 1;
        }
    }

    let mut push_neighbours = |idx: usize, label: u32, labels: &[u32], heap: &mut BinaryHeap<FloodEntry>| {
        let (x, y) = (idx % w, idx / w);
        let mut neighbours = [None; 4];
        if x > 0 {
            neighbours[0] = Some(idx - 1);
        }
        if x + 1 < w {
            neighbours[1] = Some(idx + 1);
        }
        if y > 0 {
            neighbours[2] = Some(idx - w);
        }
        if y + 1 < h {
            neighbours[3] = Some(idx + w);
        }
        for n in neighbours.into_iter().flatten() {
            if labels[n] == 0 && is_foreground(n) {
                heap.push(FloodEntry {
                    distance: distances[n],
                    age,
                    index: n,
                    label,
                });
                age += 1;
            }
        }
    };

    for idx in 0..labels.len() {
        if labels[idx] != 0 {
            push_neighbours(idx, labels[idx], &labels, &mut heap);
        }
    }

    while let Some(entry) = heap.pop() {
        if labels[entry.index] != 0 {
            continue;
        }
        labels[entry.index] = entry.label;
        push_neighbours(entry.index, entry.label, &labels, &mut heap);
    }

    LabelMap::from_raw(width, height, labels).unwrap_or_else(|| LabelMap::new(width, height))
}

/// Drop regions whose area is outside [min_size, max_size] and renumber the
/// rest 1..=n in raster order of their first pixel.
pub fn filter_by_size(labels: &LabelMap, min_size: u32, max_size: u32) -> (LabelMap, u32) {
    let max_label = labels.pixels().map(|p| p[0]).max().unwrap_or(0);
    let areas = contours::label_areas(labels, max_label);

    let mut remap = vec![0u32; max_label as usize + 1];
    let mut next = 0u32;
    for p in labels.pixels() {
        let old = p[0] as usize;
        if old == 0 || remap[old] != 0 {
            continue;
        }
        let area = areas[old];
        if area >= min_size && area <= max_size {
            next += 1;
            remap[old] = next;
        }
    }

    let filtered = LabelMap::from_fn(labels.width(), labels.height(), |x, y| {
        Luma([remap[labels.get_pixel(x, y)[0] as usize]])
    });
    (filtered, next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn disc_mask(width: u32, height: u32, discs: &[(f32, f32, f32)]) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let inside = discs.iter().any(|&(cx, cy, r)| {
                let (dx, dy) = (x as f32 - cx, y as f32 - cy);
                dx * dx + dy * dy <= r * r
            });
            if inside { Luma([FOREGROUND]) } else { Luma([0]) }
        })
    }

    fn distinct_labels(labels: &LabelMap) -> Vec<u32> {
        let mut seen: Vec<u32> = labels.pixels().map(|p| p[0]).filter(|&l| l != 0).collect();
        seen.sort();
        seen.dedup();
        seen
    }

    #[test]
    fn distance_grows_toward_centre() {
        let mask = disc_mask(41, 41, &[(20.0, 20.0, 10.0)]);
        let d = distance_transform(&mask);
        assert_eq!(d[0], 0.0);
        let centre = d[20 * 41 + 20];
        assert!((10.0..=11.5).contains(&centre), "centre distance {centre}");
        assert!(d[20 * 41 + 12] < centre);
    }

    #[test]
    fn watershed_splits_touching_discs() {
        let min_distance = 8;
        // centres 2 * min_distance apart, radii overlapping
        let mask = disc_mask(60, 40, &[(22.0, 20.0, 10.0), (38.0, 20.0, 10.0)]);
        assert_eq!(contours::label_components(&mask).1, 1);

        let d = distance_transform(&mask);
        let seeds = find_peaks(&d, &mask, min_distance);
        assert_eq!(seeds.len(), 2);

        let labels = watershed(&d, &mask, &seeds);
        assert_eq!(distinct_labels(&labels).len(), 2);
        assert_ne!(labels.get_pixel(22, 20)[0], labels.get_pixel(38, 20)[0]);
        // every foreground pixel is claimed
        for (x, y, p) in mask.enumerate_pixels() {
            assert_eq!(p[0] != 0, labels.get_pixel(x, y)[0] != 0);
        }
    }

    #[test]
    fn small_component_next_to_large_one_still_gets_a_seed() {
        let mask = disc_mask(60, 40, &[(20.0, 20.0, 12.0), (37.0, 20.0, 2.0)]);
        let d = distance_transform(&mask);
        let seeds = find_peaks(&d, &mask, 15);
        let labels = watershed(&d, &mask, &seeds);
        assert_ne!(labels.get_pixel(37, 20)[0], 0);
        assert_ne!(labels.get_pixel(37, 20)[0], labels.get_pixel(20, 20)[0]);
    }

    #[test]
    fn size_filter_relabels_densely() {
        let mut labels = LabelMap::new(10, 10);
        // label 7: 2 pixels (too small), label 3: 9 pixels, label 9: 4 pixels
        labels.put_pixel(0, 0, Luma([7]));
        labels.put_pixel(1, 0, Luma([7]));
        for y in 5..8 {
            for x in 5..8 {
                labels.put_pixel(x, y, Luma([3]));
            }
        }
        for y in 1..3 {
            for x in 8..10 {
                labels.put_pixel(x, y, Luma([9]));
            }
        }
        let (filtered, count) = filter_by_size(&labels, 3, 100);
        assert_eq!(count, 2);
        assert_eq!(filtered.get_pixel(0, 0)[0], 0);
        // raster order: label 9 appears first (row 1)
        assert_eq!(filtered.get_pixel(8, 1)[0], 1);
        assert_eq!(filtered.get_pixel(5, 5)[0], 2);
    }

    #[test]
    fn adaptive_threshold_respects_mask_and_offset() {
        let gray = GrayImage::from_fn(30, 30, |x, y| {
            if (10..14).contains(&x) && (10..14).contains(&y) { Luma([200]) } else { Luma([50]) }
        });
        let everywhere = GrayImage::from_pixel(30, 30, Luma([FOREGROUND]));
        let nowhere = GrayImage::new(30, 30);

        let fg = adaptive_threshold(&gray, &everywhere, 11, 3.0, AdaptiveMethod::Mean);
        assert_eq!(fg.get_pixel(11, 11)[0], FOREGROUND);
        assert_eq!(fg.get_pixel(25, 25)[0], 0);

        let masked = adaptive_threshold(&gray, &nowhere, 11, 3.0, AdaptiveMethod::Gaussian);
        assert_eq!(contours::count_foreground(&masked), 0);
    }

    #[test]
    fn blank_plate_segments_to_nothing() {
        let img = RgbImage::from_pixel(80, 80, Rgb([70, 70, 70]));
        let plate = GrayImage::from_pixel(80, 80, Luma([FOREGROUND]));
        let seg = segment(&img, &plate, &SegmentationParams::default());
        assert_eq!(seg.colony_count, 0);
        assert!(seg.label_map.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn disabling_watershed_keeps_touching_discs_merged() {
        let img = RgbImage::from_fn(80, 60, |x, y| {
            let inside = [(32.0f32, 30.0f32), (48.0, 30.0)].iter().any(|&(cx, cy)| {
                let (dx, dy) = (x as f32 - cx, y as f32 - cy);
                dx * dx + dy * dy <= 100.0
            });
            if inside { Rgb([210; 3]) } else { Rgb([40; 3]) }
        });
        let plate = GrayImage::from_pixel(80, 60, Luma([FOREGROUND]));
        let params = SegmentationParams {
            watershed: false,
            ..Default::default()
        };
        assert_eq!(segment(&img, &plate, &params).colony_count, 1);
        assert_eq!(segment(&img, &plate, &SegmentationParams::default()).colony_count, 2);
    }

    fn ellipse_image(width: u32, height: u32, semi_x: f32, semi_y: f32) -> RgbImage {
        let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
        RgbImage::from_fn(width, height, |x, y| {
            let (dx, dy) = ((x as f32 - cx) / semi_x, (y as f32 - cy) / semi_y);
            if dx * dx + dy * dy <= 1.0 { Rgb([215; 3]) } else { Rgb([35; 3]) }
        })
    }

    #[test]
    fn elongated_colony_keeps_one_seed() {
        let img = ellipse_image(130, 44, 45.0, 6.0);
        let plate = GrayImage::from_pixel(130, 44, Luma([FOREGROUND]));

        let seg = segment(&img, &plate, &SegmentationParams::default());
        assert_eq!(seg.colony_count, 1);

        let d = distance_transform(&seg.binary_mask);
        assert_eq!(find_peaks(&d, &seg.binary_mask, 8).len(), 1);
    }

    #[test]
    fn flat_plateau_is_one_maximum() {
        // a 30 x 5 bar: the middle row is a long run of equal distances
        let mask = GrayImage::from_fn(40, 11, |x, y| {
            if (5..35).contains(&x) && (3..8).contains(&y) { Luma([FOREGROUND]) } else { Luma([0]) }
        });
        let d = distance_transform(&mask);
        let maxima = persistent_maxima(&d, 40, 11, MIN_PEAK_DYNAMIC);
        assert_eq!(maxima.len(), 1);
        assert_eq!(maxima[0] / 40, 5);
    }

    #[test]
    fn separate_peaks_survive_a_deep_saddle() {
        let mask = disc_mask(60, 40, &[(22.0, 20.0, 10.0), (38.0, 20.0, 10.0)]);
        let d = distance_transform(&mask);
        assert_eq!(persistent_maxima(&d, 60, 40, MIN_PEAK_DYNAMIC).len(), 2);
        // a dynamic larger than the discs themselves merges them
        assert_eq!(persistent_maxima(&d, 60, 40, 20.0).len(), 1);
    }

    #[test]
    fn dim_colony_beside_bright_ones_stays_whole() {
        let discs = [
            ((40.0f32, 40.0f32), 220u8),
            ((90.0, 40.0), 220),
            ((40.0, 90.0), 220),
            ((90.0, 90.0), 99),
        ];
        let img = RgbImage::from_fn(130, 130, |x, y| {
            for &((cx, cy), value) in &discs {
                let (dx, dy) = (x as f32 - cx, y as f32 - cy);
                if dx * dx + dy * dy <= 100.0 {
                    return Rgb([value; 3]);
                }
            }
            Rgb([29; 3])
        });
        let plate = GrayImage::from_pixel(130, 130, Luma([FOREGROUND]));

        let seg = segment(&img, &plate, &SegmentationParams::default());
        assert_eq!(seg.colony_count, 4);
        let dim = seg.label_map.get_pixel(90, 90)[0];
        assert_ne!(dim, 0);
        let area = seg.label_map.pixels().filter(|p| p[0] == dim).count();
        assert!((280..=340).contains(&area), "dim colony area {area}");
    }

    #[test]
    fn background_support_needs_local_contrast() {
        let gray = GrayImage::from_pixel(40, 40, Luma([90]));
        let plate = GrayImage::from_pixel(40, 40, Luma([FOREGROUND]));
        let nothing = GrayImage::new(40, 40);
        let supported = with_background_support(&gray, &plate, &nothing, 10_000);
        assert_eq!(contours::count_foreground(&supported), 0);
    }

    #[test]
    fn background_support_fills_a_hollow_rim() {
        // disc interior brighter than the plate, but only its rim found locally
        let gray = GrayImage::from_fn(60, 60, |x, y| {
            let (dx, dy) = (x as f32 - 30.0, y as f32 - 30.0);
            if dx * dx + dy * dy <= 144.0 { Luma([120]) } else { Luma([30]) }
        });
        let plate = GrayImage::from_pixel(60, 60, Luma([FOREGROUND]));
        let mut rim = GrayImage::new(60, 60);
        rim.put_pixel(30, 18, Luma([FOREGROUND]));

        let supported = with_background_support(&gray, &plate, &rim, 10_000);
        assert_eq!(supported.get_pixel(30, 30)[0], FOREGROUND);
        assert_eq!(supported.get_pixel(5, 5)[0], 0);

        // a component larger than the colony limit is not used
        let capped = with_background_support(&gray, &plate, &rim, 100);
        assert_eq!(contours::count_foreground(&capped), 1);
    }
}
