use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::geometry::arc_length;
use imageproc::region_labelling::{connected_components, Connectivity};
use std::collections::VecDeque;

use crate::models::LabelMap;

pub const FOREGROUND: u8 = 255;

/// Label 8-connected foreground components; returns the labels and their count
pub fn label_components(mask: &GrayImage) -> (LabelMap, u32) {
    let labeled = connected_components(mask, Connectivity::Eight, Luma([0u8]));
    let count = labeled.pixels().map(|p| p[0]).max().unwrap_or(0);
    (labeled, count)
}

/// Pixel count per label, indexed by label (index 0 is background)
pub fn label_areas(labels: &LabelMap, count: u32) -> Vec<u32> {
    let mut areas = vec![0u32; count as usize + 1];
    for p in labels.pixels() {
        let label = p[0] as usize;
        if label < areas.len() {
            areas[label] += 1;
        }
    }
    areas
}

/// Mask of the largest 8-connected component, or `None` if the mask is empty.
/// Ties go to the component found first in raster order.
pub fn largest_component(mask: &GrayImage) -> Option<GrayImage> {
    let (labels, count) = label_components(mask);
    if count == 0 {
        return None;
    }
    let areas = label_areas(&labels, count);
    let (best, _) = areas
        .iter()
        .enumerate()
        .skip(1)
        .fold((0usize, 0u32), |(best, best_area), (label, &area)| {
            if area > best_area { (label, area) } else { (best, best_area) }
        });

    Some(GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        if labels.get_pixel(x, y)[0] as usize == best {
            Luma([FOREGROUND])
        } else {
            Luma([0])
        }
    }))
}

/// Fill background regions that cannot be reached from the image border
pub fn fill_holes(mask: &GrayImage) -> GrayImage {
    let (width, height) = mask.dimensions();
    if width == 0 || height == 0 {
        return mask.clone();
    }
    let mut reached = vec![false; (width * height) as usize];
    let mut queue = VecDeque::new();

    let seed = |x: u32, y: u32, queue: &mut VecDeque<(u32, u32)>, reached: &mut Vec<bool>| {
        let idx = (y * width + x) as usize;
        if mask.get_pixel(x, y)[0] == 0 && !reached[idx] {
            reached[idx] = true;
            queue.push_back((x, y));
        }
    };
    for x in 0..width {
        seed(x, 0, &mut queue, &mut reached);
        seed(x, height - 1, &mut queue, &mut reached);
    }
    for y in 0..height {
        seed(0, y, &mut queue, &mut reached);
        seed(width - 1, y, &mut queue, &mut reached);
    }

    while let Some((x, y)) = queue.pop_front() {
        let neighbours = [
            (x.wrapping_sub(1), y),
            (x + 1, y),
            (x, y.wrapping_sub(1)),
            (x, y + 1),
        ];
        for (nx, ny) in neighbours {
            if nx < width && ny < height {
                seed(nx, ny, &mut queue, &mut reached);
            }
        }
    }

    GrayImage::from_fn(width, height, |x, y| {
        if mask.get_pixel(x, y)[0] != 0 || !reached[(y * width + x) as usize] {
            Luma([FOREGROUND])
        } else {
            Luma([0])
        }
    })
}

/// Length of the longest outer boundary in a binary mask.
///
/// The boundary is traced through pixel centres with 8-connectivity, so
/// diagonal steps count √2. A single isolated pixel has perimeter 0.
pub fn outer_perimeter(mask: &GrayImage) -> f64 {
    find_contours::<i32>(mask)
        .iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer))
        .map(|c| arc_length(c.points.as_slice(), true))
        .fold(0.0, f64::max)
}

/// Count of non-zero pixels
pub fn count_foreground(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p[0] != 0).count()
}
