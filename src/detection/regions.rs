use image::{GrayImage, Luma};
use imageproc::geometry::convex_hull;
use imageproc::point::Point;

use crate::detection::contours::{outer_perimeter, FOREGROUND};
use crate::models::{BoundingBox, ColonyRegion, LabelMap};

/// Pixel coordinates (x, y) of every label, indexed by label (index 0 unused)
pub fn collect_pixels(labels: &LabelMap) -> Vec<Vec<(u32, u32)>> {
    let max_label = labels.pixels().map(|p| p[0]).max().unwrap_or(0);
    let mut pixels = vec![Vec::new(); max_label as usize + 1];
    for (x, y, p) in labels.enumerate_pixels() {
        if p[0] != 0 {
            pixels[p[0] as usize].push((x, y));
        }
    }
    pixels
}

/// Measure every labeled region, ascending by label
pub fn measure_regions(labels: &LabelMap) -> Vec<ColonyRegion> {
    collect_pixels(labels)
        .iter()
        .enumerate()
        .filter(|(_, pixels)| !pixels.is_empty())
        .map(|(label, pixels)| measure_region(label as u32, pixels))
        .collect()
}

/// Geometric properties of one region given its pixel coordinates
pub fn measure_region(label: u32, pixels: &[(u32, u32)]) -> ColonyRegion {
    let area = pixels.len() as u32;
    let n = pixels.len() as f64;

    let mut bbox = BoundingBox {
        min_row: u32::MAX,
        min_col: u32::MAX,
        max_row: 0,
        max_col: 0,
    };
    let (mut sum_r, mut sum_c) = (0.0, 0.0);
    for &(x, y) in pixels {
        bbox.min_row = bbox.min_row.min(y);
        bbox.min_col = bbox.min_col.min(x);
        bbox.max_row = bbox.max_row.max(y + 1);
        bbox.max_col = bbox.max_col.max(x + 1);
        sum_r += y as f64;
        sum_c += x as f64;
    }
    let centroid = (sum_r / n, sum_c / n);

    let (major_axis_length, minor_axis_length) = axis_lengths(pixels, centroid);
    let perimeter = region_perimeter(pixels, &bbox);
    let convex_area = convex_area(pixels, &bbox).max(area);

    ColonyRegion {
        label,
        area,
        perimeter,
        centroid,
        bounding_box: bbox,
        major_axis_length,
        minor_axis_length,
        solidity: area as f64 / convex_area as f64,
        convex_area,
    }
}

/// Lengths of the ellipse with the same second moments as the region
fn axis_lengths(pixels: &[(u32, u32)], centroid: (f64, f64)) -> (f64, f64) {
    let n = pixels.len() as f64;
    let (mut srr, mut scc, mut src) = (0.0, 0.0, 0.0);
    for &(x, y) in pixels {
        let dr = y as f64 - centroid.0;
        let dc = x as f64 - centroid.1;
        srr += dr * dr;
        scc += dc * dc;
        src += dr * dc;
    }
    let (a, b, c) = (srr / n, scc / n, src / n);

    // eigenvalues of [[a, c], [c, b]]
    let mean = (a + b) / 2.0;
    let spread = (((a - b) / 2.0).powi(2) + c * c).sqrt();
    let major = (mean + spread).max(0.0);
    let minor = (mean - spread).max(0.0);
    (4.0 * major.sqrt(), 4.0 * minor.sqrt())
}

/// Binary crop of the region with a one-pixel empty border
pub fn region_mask(pixels: &[(u32, u32)], bbox: &BoundingBox) -> GrayImage {
    let mut mask = GrayImage::new(bbox.width() + 2, bbox.height() + 2);
    for &(x, y) in pixels {
        mask.put_pixel(x - bbox.min_col + 1, y - bbox.min_row + 1, Luma([FOREGROUND]));
    }
    mask
}

fn region_perimeter(pixels: &[(u32, u32)], bbox: &BoundingBox) -> f64 {
    outer_perimeter(&region_mask(pixels, bbox))
}

/// Number of pixel centres inside the convex hull of the region's pixel centres
fn convex_area(pixels: &[(u32, u32)], bbox: &BoundingBox) -> u32 {
    let points: Vec<Point<i32>> = pixels
        .iter()
        .map(|&(x, y)| Point::new(x as i32, y as i32))
        .collect();
    let hull = convex_hull(points.as_slice());
    if hull.len() < 3 {
        return pixels.len() as u32;
    }

    let twice_area: i64 = hull
        .iter()
        .zip(hull.iter().cycle().skip(1))
        .map(|(p, q)| p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64)
        .sum();
    if twice_area == 0 {
        return pixels.len() as u32;
    }
    let orientation = twice_area.signum();

    let inside = |px: i64, py: i64| {
        hull.iter().zip(hull.iter().cycle().skip(1)).all(|(p, q)| {
            let cross = (q.x as i64 - p.x as i64) * (py - p.y as i64)
                - (q.y as i64 - p.y as i64) * (px - p.x as i64);
            cross * orientation >= 0
        })
    };

    let mut count = 0u32;
    for y in bbox.min_row..bbox.max_row {
        for x in bbox.min_col..bbox.max_col {
            if inside(x as i64, y as i64) {
                count += 1;
            }
        }
    }
    count
}
