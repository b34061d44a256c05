use image::{GrayImage, Luma, RgbImage};
use imageproc::contrast::otsu_level;
use tracing::{debug, warn};

use crate::detection::contours::{self, FOREGROUND};
use crate::detection::preprocessing::to_grayscale;

/// The detected dish must cover at least this fraction of the margin
/// rectangle, otherwise the rectangle itself is used.
pub const MIN_PLATE_COVERAGE: f64 = 0.25;

/// Inner rectangle left after excluding `margin_percent` of each edge.
/// Returns (x0, y0, x1, y1) with exclusive upper bounds.
pub fn margin_rect(width: u32, height: u32, margin_percent: f32) -> (u32, u32, u32, u32) {
    let mut mx = (width as f32 * margin_percent).floor() as u32;
    let mut my = (height as f32 * margin_percent).floor() as u32;
    if 2 * mx >= width {
        mx = 0;
    }
    if 2 * my >= height {
        my = 0;
    }
    (mx, my, width - mx, height - my)
}

/// Mask covering only the margin rectangle
pub fn margin_mask(width: u32, height: u32, margin_percent: f32) -> GrayImage {
    let (x0, y0, x1, y1) = margin_rect(width, height, margin_percent);
    GrayImage::from_fn(width, height, |x, y| {
        if x >= x0 && x < x1 && y >= y0 && y < y1 {
            Luma([FOREGROUND])
        } else {
            Luma([0])
        }
    })
}

/// Find the usable interior of the dish.
///
/// Otsu thresholding inside the margin rectangle, then the largest bright
/// component with its holes filled. Falls back to the plain margin rectangle
/// when no sufficiently large component exists; this is a normal outcome for
/// tightly cropped photographs.
pub fn locate_plate(img: &RgbImage, margin_percent: f32) -> GrayImage {
    let gray = to_grayscale(img);
    let (width, height) = gray.dimensions();
    let (x0, y0, x1, y1) = margin_rect(width, height, margin_percent);
    let (rw, rh) = (x1 - x0, y1 - y0);

    let inner = image::imageops::crop_imm(&gray, x0, y0, rw, rh).to_image();
    let level = otsu_level(&inner);
    let binary = GrayImage::from_fn(rw, rh, |x, y| {
        if inner.get_pixel(x, y)[0] > level {
            Luma([FOREGROUND])
        } else {
            Luma([0])
        }
    });

    let Some(component) = contours::largest_component(&binary) else {
        warn!("No plate contour found; using margin rectangle");
        return margin_mask(width, height, margin_percent);
    };
    let filled = contours::fill_holes(&component);

    let coverage = contours::count_foreground(&filled) as f64 / (rw as f64 * rh as f64);
    if coverage < MIN_PLATE_COVERAGE {
        warn!(
            "Plate contour covers only {:.1}% of the inner region; using margin rectangle",
            coverage * 100.0
        );
        return margin_mask(width, height, margin_percent);
    }
    debug!("Plate located: otsu level {}, coverage {:.1}%", level, coverage * 100.0);

    let mut mask = GrayImage::new(width, height);
    for (x, y, pixel) in filled.enumerate_pixels() {
        if pixel[0] != 0 {
            mask.put_pixel(x + x0, y + y0, Luma([FOREGROUND]));
        }
    }
    mask
}
