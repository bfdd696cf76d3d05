//! Image decoding and conversion to the canonical raster format.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP, TIFF) and produces an
//! 8-bit RGB raster. This is the only place that knows about source
//! formats: metrics and the visualizer only ever see [`RgbImage`].

use image::DynamicImage;

use crate::types::{AnalysisError, ImageRole, RgbImage};

/// Decode raw image bytes into a canonical RGB raster.
///
/// # Errors
///
/// Returns [`AnalysisError::EmptyInput`] if `bytes` is empty.
/// Returns [`AnalysisError::Decode`] if the format is unrecognized or
/// the data is corrupt.
/// Returns [`AnalysisError::Shape`] if the decoded image has zero area.
pub fn decode_raster(bytes: &[u8], role: ImageRole) -> Result<RgbImage, AnalysisError> {
    if bytes.is_empty() {
        return Err(AnalysisError::EmptyInput { role });
    }

    let img =
        image::load_from_memory(bytes).map_err(|source| AnalysisError::Decode { role, source })?;
    canonicalize(&img, role)
}

/// Convert any decoded image to the canonical raster format.
///
/// Alpha is discarded without compositing, grayscale is replicated
/// into all three channels, and 16-bit or float samples are scaled to
/// 8 bits by the `image` crate's standard conversion.
///
/// # Errors
///
/// Returns [`AnalysisError::Shape`] if either axis is zero.
pub fn canonicalize(image: &DynamicImage, role: ImageRole) -> Result<RgbImage, AnalysisError> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(AnalysisError::Shape {
            role,
            width,
            height,
        });
    }
    Ok(image.to_rgb8())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::{encode_png, encode_rgba_png};

    #[test]
    fn empty_input_returns_error() {
        let result = decode_raster(&[], ImageRole::Before);
        assert!(matches!(
            result,
            Err(AnalysisError::EmptyInput {
                role: ImageRole::Before
            })
        ));
    }

    #[test]
    fn corrupt_bytes_returns_decode_error() {
        let result = decode_raster(&[0xFF, 0xFE, 0x00, 0x01], ImageRole::After);
        assert!(matches!(
            result,
            Err(AnalysisError::Decode {
                role: ImageRole::After,
                ..
            })
        ));
    }

    #[test]
    fn truncated_png_returns_decode_error() {
        let png = encode_png(&RgbImage::from_pixel(8, 8, image::Rgb([1, 2, 3])));
        let result = decode_raster(&png[..png.len() / 2], ImageRole::Before);
        assert!(matches!(result, Err(AnalysisError::Decode { .. })));
    }

    #[test]
    fn zero_area_image_returns_shape_error() {
        let img = DynamicImage::new_rgb8(0, 5);
        let result = canonicalize(&img, ImageRole::Before);
        assert!(matches!(
            result,
            Err(AnalysisError::Shape {
                width: 0,
                height: 5,
                ..
            })
        ));
    }

    #[test]
    fn rgba_input_drops_alpha() {
        let png = encode_rgba_png(&image::RgbaImage::from_pixel(
            3,
            2,
            image::Rgba([10, 20, 30, 0]),
        ));
        let raster = decode_raster(&png, ImageRole::Before).unwrap();
        assert_eq!(raster.dimensions(), (3, 2));
        assert_eq!(raster.get_pixel(2, 1).0, [10, 20, 30]);
    }

    #[test]
    fn grayscale_input_expands_to_rgb() {
        let gray = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(2, 2, image::Luma([77])));
        let raster = canonicalize(&gray, ImageRole::After).unwrap();
        assert_eq!(raster.get_pixel(0, 0).0, [77, 77, 77]);
    }

    #[test]
    fn sixteen_bit_input_scales_to_eight_bit() {
        let deep = DynamicImage::ImageRgb16(image::ImageBuffer::from_pixel(
            1,
            1,
            image::Rgb([u16::MAX, 0, 32_896]),
        ));
        let raster = canonicalize(&deep, ImageRole::Before).unwrap();
        assert_eq!(raster.get_pixel(0, 0).0, [255, 0, 128]);
    }

    #[test]
    fn output_dimensions_match_input() {
        let png = encode_png(&RgbImage::from_pixel(17, 31, image::Rgb([128, 64, 32])));
        let raster = decode_raster(&png, ImageRole::Before).unwrap();
        assert_eq!(raster.width(), 17);
        assert_eq!(raster.height(), 31);
    }
}
