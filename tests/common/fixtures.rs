use image::{ImageFormat, Rgb, RgbImage};
use tempfile::NamedTempFile;

pub const BACKGROUND: Rgb<u8> = Rgb([40, 40, 40]);
pub const COLONY: Rgb<u8> = Rgb([220, 210, 190]);

/// Radius of a digital disc covering roughly 500 pixels
pub const DISC_RADIUS: f64 = 12.6;

/// Uniform dark plate with nothing on it
pub fn blank_plate(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, BACKGROUND)
}

/// Dark plate with bright filled discs, each given as (cx, cy, radius)
pub fn plate_with_discs(width: u32, height: u32, discs: &[(f64, f64, f64)]) -> RgbImage {
    plate_with_colored_discs(width, height, &discs.iter().map(|&d| (d, COLONY)).collect::<Vec<_>>())
}

/// Like [`plate_with_discs`] but every disc carries its own colour
pub fn plate_with_colored_discs(width: u32, height: u32, discs: &[((f64, f64, f64), Rgb<u8>)]) -> RgbImage {
    let mut img = blank_plate(width, height);
    for &((cx, cy, r), color) in discs {
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            let (dx, dy) = (x as f64 - cx, y as f64 - cy);
            if dx * dx + dy * dy <= r * r {
                *pixel = color;
            }
        }
    }
    img
}

/// Two well separated colonies of about 500 pixels each
pub fn two_colonies() -> RgbImage {
    plate_with_discs(200, 200, &[(70.0, 70.0, DISC_RADIUS), (130.0, 130.0, DISC_RADIUS)])
}

/// Two overlapping discs whose centres lie 20 pixels apart
pub fn touching_colonies() -> RgbImage {
    plate_with_discs(200, 200, &[(90.0, 100.0, 12.0), (110.0, 100.0, 12.0)])
}

/// A mix of sizes and shapes: round discs plus one elongated ellipse
pub fn mixed_colonies() -> RgbImage {
    let mut img = plate_with_discs(
        240,
        240,
        &[
            (60.0, 60.0, 6.0),
            (120.0, 60.0, 10.0),
            (180.0, 60.0, 14.0),
            (60.0, 170.0, 8.0),
        ],
    );
    // Ellipse with semi-axes 22 x 7 around (160, 170)
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let dx = (x as f64 - 160.0) / 22.0;
        let dy = (y as f64 - 170.0) / 7.0;
        if dx * dx + dy * dy <= 1.0 {
            *pixel = COLONY;
        }
    }
    img
}

/// Writes `img` as a PNG temp file.
/// The file will be automatically cleaned up when dropped.
pub fn write_png(img: &RgbImage) -> NamedTempFile {
    let file = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .expect("Failed to create temp image file");
    img.save_with_format(file.path(), ImageFormat::Png)
        .expect("Failed to save test image");
    file
}

/// A `.png` file whose contents are not an image
pub fn write_corrupt_file() -> NamedTempFile {
    let file = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .expect("Failed to create temp file");
    std::fs::write(file.path(), b"definitely not a png").expect("Failed to write corrupt file");
    file
}
