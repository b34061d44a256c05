use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use palette::{FromColor, Lab, Srgb};

use crate::config::AnalysisConfig;
use crate::error::{ColonyError, Result};

/// Convert a decoded image to 8-bit RGB, rejecting inputs the pipeline cannot use
pub fn to_rgb(img: &DynamicImage) -> Result<RgbImage> {
    if img.width() == 0 || img.height() == 0 {
        return Err(ColonyError::InvalidImage(format!(
            "image has zero area ({}x{})",
            img.width(),
            img.height()
        )));
    }
    let channels = img.color().channel_count();
    if !matches!(channels, 1 | 3 | 4) {
        return Err(ColonyError::InvalidImage(format!(
            "unsupported channel count {channels} ({:?})",
            img.color()
        )));
    }
    Ok(img.to_rgb8())
}

/// Convert image to grayscale
pub fn to_grayscale(img: &RgbImage) -> GrayImage {
    image::imageops::grayscale(img)
}

/// Parameters of the preprocessing chain
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessParams {
    pub bilateral_d: u32,
    pub sigma_color: f32,
    pub sigma_space: f32,
    pub clip_limit: f32,
    pub tile_grid: u32,
    pub gamma: f32,
    pub sharpen_strength: f32,
}

impl From<&AnalysisConfig> for PreprocessParams {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            bilateral_d: config.bilateral_d,
            sigma_color: config.bilateral_sigma_color,
            sigma_space: config.bilateral_sigma_space,
            clip_limit: config.clahe_clip_limit,
            tile_grid: config.clahe_tile_grid,
            gamma: config.gamma,
            sharpen_strength: config.sharpen_strength,
        }
    }
}

/// Full preprocessing chain: bilateral smoothing, CLAHE, gamma, sharpening
pub fn preprocess(img: &RgbImage, params: &PreprocessParams) -> Result<RgbImage> {
    if img.width() == 0 || img.height() == 0 {
        return Err(ColonyError::InvalidImage("image has zero area".into()));
    }
    let smoothed = bilateral_filter(img, params.bilateral_d, params.sigma_color, params.sigma_space);
    let enhanced = enhance_contrast(&smoothed, params.clip_limit, params.tile_grid);
    let corrected = adjust_gamma(&enhanced, params.gamma);
    Ok(sharpen(&corrected, params.sharpen_strength))
}

/// Edge-preserving smoothing.
///
/// Each output pixel is a weighted mean over a circular neighbourhood of
/// `diameter` pixels; weights fall off with spatial distance (`sigma_space`)
/// and with the L1 colour difference to the centre pixel (`sigma_color`).
pub fn bilateral_filter(img: &RgbImage, diameter: u32, sigma_color: f32, sigma_space: f32) -> RgbImage {
    let radius = (diameter / 2) as i64;
    if radius == 0 {
        return img.clone();
    }
    let (width, height) = img.dimensions();
    let (w, h) = (width as i64, height as i64);

    let space_coeff = -0.5 / (sigma_space as f64 * sigma_space as f64);
    let color_coeff = -0.5 / (sigma_color as f64 * sigma_color as f64);

    let mut offsets = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let r2 = (dx * dx + dy * dy) as f64;
            if r2 <= (radius * radius) as f64 {
                offsets.push((dx, dy, (r2 * space_coeff).exp()));
            }
        }
    }
    // L1 distance over three channels is at most 3 * 255
    let color_weights: Vec<f64> = (0..=765)
        .map(|d| ((d * d) as f64 * color_coeff).exp())
        .collect();

    let src = img.as_raw();
    let mut out = RgbImage::new(width, height);
    for y in 0..h {
        for x in 0..w {
            let center = ((y * w + x) * 3) as usize;
            let c = [src[center] as i32, src[center + 1] as i32, src[center + 2] as i32];
            let mut acc = [0.0f64; 3];
            let mut norm = 0.0f64;

            for &(dx, dy, ws) in &offsets {
                let nx = x + dx;
                let ny = y + dy;
                if nx < 0 || ny < 0 || nx >= w || ny >= h {
                    continue;
                }
                let idx = ((ny * w + nx) * 3) as usize;
                let p = [src[idx] as i32, src[idx + 1] as i32, src[idx + 2] as i32];
                let diff = (p[0] - c[0]).abs() + (p[1] - c[1]).abs() + (p[2] - c[2]).abs();
                let weight = ws * color_weights[diff as usize];
                acc[0] += weight * p[0] as f64;
                acc[1] += weight * p[1] as f64;
                acc[2] += weight * p[2] as f64;
                norm += weight;
            }

            out.put_pixel(
                x as u32,
                y as u32,
                Rgb([
                    (acc[0] / norm).round().clamp(0.0, 255.0) as u8,
                    (acc[1] / norm).round().clamp(0.0, 255.0) as u8,
                    (acc[2] / norm).round().clamp(0.0, 255.0) as u8,
                ]),
            );
        }
    }
    out
}

/// Contrast-limited adaptive histogram equalization on a single plane.
///
/// The image is split into `grid` x `grid` tiles; each tile's histogram is
/// clipped at `clip_limit` times the uniform bin height and the excess spread
/// over all bins. Pixels are remapped by bilinear interpolation between the
/// four nearest tile mappings.
pub fn clahe(gray: &GrayImage, clip_limit: f32, grid: u32) -> GrayImage {
    let (width, height) = gray.dimensions();
    let grid_x = grid.clamp(1, width.max(1));
    let grid_y = grid.clamp(1, height.max(1));

    let tile_x0 = |i: u32| (i as u64 * width as u64 / grid_x as u64) as u32;
    let tile_y0 = |j: u32| (j as u64 * height as u64 / grid_y as u64) as u32;

    let mut luts = vec![[0u8; 256]; (grid_x * grid_y) as usize];
    for j in 0..grid_y {
        for i in 0..grid_x {
            let (x0, x1) = (tile_x0(i), tile_x0(i + 1));
            let (y0, y1) = (tile_y0(j), tile_y0(j + 1));
            let area = ((x1 - x0) * (y1 - y0)) as u64;
            if area == 0 {
                continue;
            }

            let mut hist = [0u64; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[gray.get_pixel(x, y)[0] as usize] += 1;
                }
            }

            let limit = ((clip_limit as f64 * area as f64 / 256.0) as u64).max(1);
            let mut excess = 0u64;
            for bin in hist.iter_mut() {
                if *bin > limit {
                    excess += *bin - limit;
                    *bin = limit;
                }
            }
            let per_bin = excess / 256;
            let residual = excess % 256;
            for bin in hist.iter_mut() {
                *bin += per_bin;
            }
            if residual > 0 {
                let step = (256 / residual).max(1) as usize;
                for bin in hist.iter_mut().step_by(step).take(residual as usize) {
                    *bin += 1;
                }
            }

            let lut = &mut luts[(j * grid_x + i) as usize];
            let mut cdf = 0u64;
            for (value, count) in hist.iter().enumerate() {
                cdf += count;
                lut[value] = ((cdf as f64 * 255.0 / area as f64).round()).min(255.0) as u8;
            }
        }
    }

    let tile_w = width as f32 / grid_x as f32;
    let tile_h = height as f32 / grid_y as f32;
    let neighbours = |pos: f32, tile: f32, count: u32| -> (usize, usize, f32) {
        let f = (pos + 0.5) / tile - 0.5;
        let lo = f.floor().clamp(0.0, (count - 1) as f32) as u32;
        let hi = (lo + 1).min(count - 1);
        let t = (f - lo as f32).clamp(0.0, 1.0);
        (lo as usize, hi as usize, t)
    };

    GrayImage::from_fn(width, height, |x, y| {
        let v = gray.get_pixel(x, y)[0] as usize;
        let (i0, i1, tx) = neighbours(x as f32, tile_w, grid_x);
        let (j0, j1, ty) = neighbours(y as f32, tile_h, grid_y);
        let gx = grid_x as usize;
        let top = luts[j0 * gx + i0][v] as f32 * (1.0 - tx) + luts[j0 * gx + i1][v] as f32 * tx;
        let bottom = luts[j1 * gx + i0][v] as f32 * (1.0 - tx) + luts[j1 * gx + i1][v] as f32 * tx;
        Luma([(top * (1.0 - ty) + bottom * ty).round().clamp(0.0, 255.0) as u8])
    })
}

/// CLAHE applied to the lightness channel only, so hues are preserved
pub fn enhance_contrast(img: &RgbImage, clip_limit: f32, grid: u32) -> RgbImage {
    let (width, height) = img.dimensions();
    let labs: Vec<Lab> = img
        .pixels()
        .map(|p| Lab::from_color(Srgb::new(p[0], p[1], p[2]).into_format::<f32>()))
        .collect();

    let lightness = GrayImage::from_fn(width, height, |x, y| {
        let lab = labs[(y * width + x) as usize];
        Luma([(lab.l * 2.55).round().clamp(0.0, 255.0) as u8])
    });
    let equalized = clahe(&lightness, clip_limit, grid);

    RgbImage::from_fn(width, height, |x, y| {
        let mut lab = labs[(y * width + x) as usize];
        lab.l = equalized.get_pixel(x, y)[0] as f32 / 2.55;
        let rgb: Srgb<f32> = Srgb::from_color(lab);
        Rgb([
            (rgb.red.clamp(0.0, 1.0) * 255.0).round() as u8,
            (rgb.green.clamp(0.0, 1.0) * 255.0).round() as u8,
            (rgb.blue.clamp(0.0, 1.0) * 255.0).round() as u8,
        ])
    })
}

/// Power-law remap: out = 255 * (in / 255)^gamma
pub fn adjust_gamma(img: &RgbImage, gamma: f32) -> RgbImage {
    let lut: Vec<u8> = (0..256)
        .map(|v| ((v as f32 / 255.0).powf(gamma) * 255.0).round().clamp(0.0, 255.0) as u8)
        .collect();
    let mut out = img.clone();
    for pixel in out.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            *channel = lut[*channel as usize];
        }
    }
    out
}

/// Boost high frequencies with a 4-neighbour Laplacian kernel.
///
/// Kernel: center weight (1 + 4 * strength), edges -strength. Border pixels
/// are copied unchanged; strength 0 returns the input.
pub fn sharpen(img: &RgbImage, strength: f32) -> RgbImage {
    let (width, height) = img.dimensions();
    let mut sharpened = img.clone();
    if strength == 0.0 || width < 3 || height < 3 {
        return sharpened;
    }

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let center = img.get_pixel(x, y);
            let top = img.get_pixel(x, y - 1);
            let bottom = img.get_pixel(x, y + 1);
            let left = img.get_pixel(x - 1, y);
            let right = img.get_pixel(x + 1, y);

            let mut out = [0u8; 3];
            for c in 0..3 {
                let neighbours = top[c] as f32 + bottom[c] as f32 + left[c] as f32 + right[c] as f32;
                let value = center[c] as f32 * (1.0 + 4.0 * strength) - neighbours * strength;
                out[c] = value.round().clamp(0.0, 255.0) as u8;
            }
            sharpened.put_pixel(x, y, Rgb(out));
        }
    }
    sharpened
}
