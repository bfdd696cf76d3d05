//! Synthetic image helpers shared by unit tests.

#![allow(clippy::unwrap_used)]

use image::{ExtendedColorType, ImageEncoder, RgbImage, RgbaImage};

/// Encode an RGB raster as PNG bytes.
pub fn encode_png(img: &RgbImage) -> Vec<u8> {
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    encoder
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            ExtendedColorType::Rgb8,
        )
        .unwrap();
    buf
}

/// Encode an RGBA image as PNG bytes.
pub fn encode_rgba_png(img: &RgbaImage) -> Vec<u8> {
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    encoder
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            ExtendedColorType::Rgba8,
        )
        .unwrap();
    buf
}

/// Solid-color raster.
pub fn solid(width: u32, height: u32, value: u8) -> RgbImage {
    RgbImage::from_pixel(width, height, image::Rgb([value, value, value]))
}

/// Deterministic textured raster: diagonal gradient with a checker
/// pattern, so every window has non-zero variance.
pub fn textured(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let base = (x * 3 + y * 5) % 200;
        let checker = if (x / 4 + y / 4) % 2 == 0 { 40 } else { 0 };
        let v = u8::try_from(base + checker).unwrap();
        image::Rgb([v, v.saturating_add(10), v / 2])
    })
}

mod tests {
    use super::*;

    #[test]
    fn encoded_png_decodes_to_the_same_raster() {
        let img = textured(9, 7);
        let decoded = image::load_from_memory(&encode_png(&img)).unwrap();
        assert_eq!(decoded.to_rgb8(), img);
    }

    #[test]
    fn encoded_rgba_png_keeps_alpha() {
        let img = RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 4]));
        let decoded = image::load_from_memory(&encode_rgba_png(&img)).unwrap();
        assert_eq!(decoded.to_rgba8(), img);
    }
}
