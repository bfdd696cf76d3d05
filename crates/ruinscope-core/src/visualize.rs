//! Difference heatmap rendering and encoding.
//!
//! The per-pixel change magnitude is the channel-averaged absolute
//! difference, `[0, 255]`. It is optionally smoothed with a Gaussian
//! blur (via [`imageproc::filter::gaussian_blur_f32`]) and mapped
//! through a fixed color ramp:
//!
//! ```text
//! 0 ──── 64 ──── 128 ──── 192 ──── 255
//! blue   cyan    green    yellow   red
//! ```
//!
//! The ramp is applied on the absolute scale (no per-image
//! normalization), so the same amount of change always renders the
//! same color. Output is PNG; identical inputs give byte-identical
//! artifacts.

use image::imageops;
use image::{ExtendedColorType, GrayImage, ImageEncoder, Luma, Rgb};
use serde::{Deserialize, Serialize};

use crate::normalize::RasterPair;
use crate::types::{
    AnalysisError, Dimensions, PNG_MEDIA_TYPE, RgbImage, VisualizationArtifact,
};

/// How the heatmap is presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualizationLayout {
    /// Color ramp only.
    Heatmap,
    /// Heatmap blended over the "after" image.
    #[default]
    Overlay,
    /// `before | after | overlay`, left to right.
    SideBySide,
}

/// Heatmap rendering options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizationConfig {
    /// How the heatmap is composed into the output image.
    pub layout: VisualizationLayout,

    /// Heatmap opacity over the "after" image (0.0 to 1.0). Used by
    /// the overlay and side-by-side layouts.
    pub overlay_alpha: f32,

    /// Gaussian sigma applied to the difference map before coloring.
    /// `0.0` disables smoothing.
    pub smoothing_sigma: f32,
}

impl VisualizationConfig {
    /// Default heatmap opacity: an even blend.
    pub const DEFAULT_OVERLAY_ALPHA: f32 = 0.5;
    /// Default smoothing: none.
    pub const DEFAULT_SMOOTHING_SIGMA: f32 = 0.0;

    /// Check alpha and sigma.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidConfig`] if `overlay_alpha` is
    /// outside `[0, 1]` or `smoothing_sigma` is negative or non-finite.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !(0.0..=1.0).contains(&self.overlay_alpha) {
            return Err(AnalysisError::InvalidConfig(format!(
                "overlay_alpha must be in [0, 1], got {}",
                self.overlay_alpha
            )));
        }
        if !(self.smoothing_sigma.is_finite() && self.smoothing_sigma >= 0.0) {
            return Err(AnalysisError::InvalidConfig(format!(
                "smoothing_sigma must be non-negative and finite, got {}",
                self.smoothing_sigma
            )));
        }
        Ok(())
    }
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            layout: VisualizationLayout::default(),
            overlay_alpha: Self::DEFAULT_OVERLAY_ALPHA,
            smoothing_sigma: Self::DEFAULT_SMOOTHING_SIGMA,
        }
    }
}

/// Channel-averaged absolute difference per pixel, rounded to nearest.
#[must_use]
pub fn difference_map(pair: &RasterPair) -> GrayImage {
    let (before, after) = (pair.before(), pair.after());
    GrayImage::from_fn(before.width(), before.height(), |x, y| {
        let a = before.get_pixel(x, y).0;
        let b = after.get_pixel(x, y).0;
        let sum: u16 = a
            .iter()
            .zip(b)
            .map(|(&p, q)| u16::from(p.abs_diff(q)))
            .sum();
        // sum <= 765, so the rounded mean fits in a u8.
        Luma([u8::try_from((sum + 1) / 3).unwrap_or(u8::MAX)])
    })
}

/// Gaussian-smooth a difference map. Non-positive sigma returns the
/// map unchanged, since `imageproc` panics on `sigma <= 0.0`.
#[must_use = "returns the smoothed map"]
pub fn smooth(map: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 {
        return map.clone();
    }
    imageproc::filter::gaussian_blur_f32(map, sigma)
}

/// Ramp color for a change magnitude.
#[must_use]
pub fn ramp_color(magnitude: u8) -> Rgb<u8> {
    let m = u16::from(magnitude);
    let segment = m / 64;
    // Position within the segment scaled to 0..=255.
    let t = u8::try_from((m % 64) * 255 / 63).unwrap_or(u8::MAX);
    match segment {
        0 => Rgb([0, t, 255]),
        1 => Rgb([0, 255, 255 - t]),
        2 => Rgb([t, 255, 0]),
        _ => Rgb([255, 255 - t, 0]),
    }
}

/// Color every pixel of a difference map through the ramp.
#[must_use]
pub fn colorize(map: &GrayImage) -> RgbImage {
    RgbImage::from_fn(map.width(), map.height(), |x, y| {
        ramp_color(map.get_pixel(x, y).0[0])
    })
}

/// Blend `overlay` over `base` with constant opacity `alpha`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn blend(base: &RgbImage, overlay: &RgbImage, alpha: f32) -> RgbImage {
    let alpha = alpha.clamp(0.0, 1.0);
    let mix = |b: u8, o: u8| -> u8 {
        let v = f32::from(b).mul_add(1.0 - alpha, f32::from(o) * alpha);
        v.round().clamp(0.0, 255.0) as u8
    };
    RgbImage::from_fn(base.width(), base.height(), |x, y| {
        let b = base.get_pixel(x, y).0;
        let o = overlay.get_pixel(x, y).0;
        Rgb([mix(b[0], o[0]), mix(b[1], o[1]), mix(b[2], o[2])])
    })
}

/// Place images left to right on one canvas of their common height.
fn side_by_side(panels: &[&RgbImage]) -> Result<RgbImage, AnalysisError> {
    let height = panels.iter().map(|p| p.height()).max().unwrap_or(0);
    let width = panels
        .iter()
        .try_fold(0_u32, |acc, p| acc.checked_add(p.width()))
        .ok_or_else(|| AnalysisError::Internal("side-by-side canvas too wide".to_string()))?;

    let mut canvas = RgbImage::new(width, height);
    let mut x = 0_i64;
    for panel in panels {
        imageops::replace(&mut canvas, *panel, x, 0);
        x += i64::from(panel.width());
    }
    Ok(canvas)
}

/// Render the visualization image for a pair, before encoding.
///
/// # Errors
///
/// Returns [`AnalysisError::Internal`] if the side-by-side canvas would
/// exceed `u32::MAX` pixels in width.
pub fn render(pair: &RasterPair, config: &VisualizationConfig) -> Result<RgbImage, AnalysisError> {
    let map = smooth(&difference_map(pair), config.smoothing_sigma);
    let heatmap = colorize(&map);

    match config.layout {
        VisualizationLayout::Heatmap => Ok(heatmap),
        VisualizationLayout::Overlay => Ok(blend(pair.after(), &heatmap, config.overlay_alpha)),
        VisualizationLayout::SideBySide => {
            let overlay = blend(pair.after(), &heatmap, config.overlay_alpha);
            side_by_side(&[pair.before(), pair.after(), &overlay])
        }
    }
}

/// Encode a raster as PNG.
///
/// # Errors
///
/// Returns [`AnalysisError::Encode`] if the encoder fails.
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, AnalysisError> {
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    encoder
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(AnalysisError::Encode)?;
    Ok(buf)
}

/// Render and encode the visualization artifact for a pair.
///
/// # Errors
///
/// Propagates errors from [`render`] and [`encode_png`].
pub fn visualize(
    pair: &RasterPair,
    config: &VisualizationConfig,
) -> Result<VisualizationArtifact, AnalysisError> {
    let image = render(pair, config)?;
    let bytes = encode_png(&image)?;
    tracing::debug!(
        layout = ?config.layout,
        dimensions = %Dimensions::of(&image),
        bytes = bytes.len(),
        "encoded visualization",
    );
    Ok(VisualizationArtifact {
        bytes,
        media_type: PNG_MEDIA_TYPE,
        dimensions: Dimensions::of(&image),
    })
}
