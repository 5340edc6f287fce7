//! Image normalisation: raw posting bytes → single-channel image tuned for OCR.
//!
//! Two profiles exist because no single filter chain wins on every input:
//!
//! * **Enhanced** — grayscale → optional resize → adaptive binarisation →
//!   median denoise → contrast boost. Best for photos with uneven lighting
//!   and scans with a background gradient.
//! * **Basic** — grayscale → mild contrast boost. Binarisation occasionally
//!   wipes out faint or thin text entirely; the Basic profile keeps those
//!   strokes and is used only when the Enhanced pass produced no text.
//!
//! Everything here is a pure function of the input bytes and the settings.
//! Nothing touches the filesystem.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Named variant of the normalisation stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreprocessProfile {
    /// Full filter chain. Always tried first.
    Enhanced,
    /// Grayscale plus mild contrast. Fallback only.
    Basic,
}

impl fmt::Display for PreprocessProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreprocessProfile::Enhanced => f.write_str("enhanced"),
            PreprocessProfile::Basic => f.write_str("basic"),
        }
    }
}

/// A grayscale (or binary) pixel buffer tagged with the profile that made it.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedImage {
    profile: PreprocessProfile,
    pixels: GrayImage,
}

impl NormalizedImage {
    pub fn new(profile: PreprocessProfile, pixels: GrayImage) -> Self {
        Self { profile, pixels }
    }

    pub fn profile(&self) -> PreprocessProfile {
        self.profile
    }

    pub fn pixels(&self) -> &GrayImage {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn into_pixels(self) -> GrayImage {
        self.pixels
    }
}

/// Capability interface for the normalisation stage.
///
/// The pipeline only talks to this trait, so tests and alternative filter
/// chains can be swapped in without touching orchestration logic.
pub trait ImageNormalizer: Send + Sync {
    /// Decode `image` and apply `profile`.
    ///
    /// # Errors
    /// [`PipelineError::ImageDecode`] when the bytes are not a supported raster format.
    fn normalize(
        &self,
        image: &[u8],
        profile: PreprocessProfile,
    ) -> Result<NormalizedImage, PipelineError>;
}

/// Filter parameters, split out of [`PipelineConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessSettings {
    pub target_width: Option<u32>,
    pub block_size: u32,
    pub offset: i16,
    pub denoise_radius: u32,
    pub contrast_factor: f32,
    pub basic_contrast_factor: f32,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for PreprocessSettings {
    fn from(c: &PipelineConfig) -> Self {
        Self {
            target_width: c.target_width,
            block_size: c.threshold_block_size,
            offset: c.threshold_offset,
            denoise_radius: c.denoise_radius,
            contrast_factor: c.contrast_factor,
            basic_contrast_factor: c.basic_contrast_factor,
        }
    }
}

/// The built-in normaliser, implemented on the `image` crate.
#[derive(Debug, Clone, Default)]
pub struct FilterNormalizer {
    settings: PreprocessSettings,
}

impl FilterNormalizer {
    pub fn new(settings: PreprocessSettings) -> Self {
        Self { settings }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(PreprocessSettings::from(config))
    }

    pub fn settings(&self) -> &PreprocessSettings {
        &self.settings
    }
}

impl ImageNormalizer for FilterNormalizer {
    fn normalize(
        &self,
        image: &[u8],
        profile: PreprocessProfile,
    ) -> Result<NormalizedImage, PipelineError> {
        let gray = decode_grayscale(image, profile)?;
        debug!(
            "Decoded {} byte image → {}x{} px ({} profile)",
            image.len(),
            gray.width(),
            gray.height(),
            profile
        );

        let pixels = match profile {
            PreprocessProfile::Enhanced => enhance(gray, &self.settings),
            PreprocessProfile::Basic => boost_contrast(&gray, self.settings.basic_contrast_factor),
        };

        Ok(NormalizedImage::new(profile, pixels))
    }
}

/// Decode any supported raster format and drop colour.
pub fn decode_grayscale(
    bytes: &[u8],
    profile: PreprocessProfile,
) -> Result<GrayImage, PipelineError> {
    image::load_from_memory(bytes)
        .map(|img| img.to_luma8())
        .map_err(|e| PipelineError::ImageDecode {
            profile,
            detail: e.to_string(),
        })
}

/// Enhanced filter chain on an already-grayscale image.
pub fn enhance(gray: GrayImage, settings: &PreprocessSettings) -> GrayImage {
    if gray.width() == 0 || gray.height() == 0 {
        return gray;
    }

    let resized = match settings.target_width {
        Some(w) if w != gray.width() => resize_to_width(&gray, w),
        _ => gray,
    };
    let binary = adaptive_threshold(&resized, settings.block_size, settings.offset);
    let denoised = median_filter(&binary, settings.denoise_radius);
    boost_contrast(&denoised, settings.contrast_factor)
}

/// Proportional resize with a Lanczos filter, which keeps stroke edges sharp.
pub fn resize_to_width(gray: &GrayImage, width: u32) -> GrayImage {
    let (w, h) = gray.dimensions();
    let height = ((h as u64 * width as u64 + w as u64 / 2) / w as u64).max(1) as u32;
    debug!("Resizing {}x{} → {}x{}", w, h, width, height);
    imageops::resize(gray, width, height, FilterType::Lanczos3)
}

/// Gaussian-weighted adaptive threshold.
///
/// Each pixel is compared against the Gaussian-weighted mean of its
/// `block_size`×`block_size` neighbourhood minus `offset`; pixels above the
/// local threshold become white (255), the rest black (0). The sigma follows
/// the usual block-size relation `0.3·((block−1)/2 − 1) + 0.8`.
pub fn adaptive_threshold(gray: &GrayImage, block_size: u32, offset: i16) -> GrayImage {
    let sigma = 0.3 * ((block_size.saturating_sub(1)) as f32 * 0.5 - 1.0) + 0.8;
    let local = imageops::blur(gray, sigma.max(0.1));

    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y)[0] as i32;
        let t = local.get_pixel(x, y)[0] as i32 - offset as i32;
        if v > t {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Median filter over a `(2r+1)`×`(2r+1)` window with clamped edges.
///
/// On a binary image this removes isolated speckles while leaving strokes
/// that are at least `r + 1` pixels wide intact.
pub fn median_filter(gray: &GrayImage, radius: u32) -> GrayImage {
    if radius == 0 {
        return gray.clone();
    }
    let (w, h) = gray.dimensions();
    let r = radius as i64;
    let side = (2 * radius + 1) as usize;
    let mut window: Vec<u8> = Vec::with_capacity(side * side);

    GrayImage::from_fn(w, h, |x, y| {
        window.clear();
        for dy in -r..=r {
            let yy = (y as i64 + dy).clamp(0, h as i64 - 1) as u32;
            for dx in -r..=r {
                let xx = (x as i64 + dx).clamp(0, w as i64 - 1) as u32;
                window.push(gray.get_pixel(xx, yy)[0]);
            }
        }
        let mid = window.len() / 2;
        let (_, median, _) = window.select_nth_unstable(mid);
        Luma([*median])
    })
}

/// Scale each pixel's distance from the image mean by `factor`.
///
/// `factor == 1.0` is the identity; values above 1 push pixels away from the
/// mean grey level and saturate at 0/255.
pub fn boost_contrast(gray: &GrayImage, factor: f32) -> GrayImage {
    let count = gray.as_raw().len();
    if count == 0 {
        return gray.clone();
    }
    let sum: u64 = gray.as_raw().iter().map(|&v| v as u64).sum();
    let mean = ((sum as f64 / count as f64) + 0.5).floor() as f32;

    let mut out = gray.clone();
    for p in out.pixels_mut() {
        let v = mean + factor * (p[0] as f32 - mean);
        p[0] = v.round().clamp(0.0, 255.0) as u8;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes(img: DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    /// White page with a dark horizontal bar, on a left-to-right lighting gradient.
    fn gradient_page() -> RgbImage {
        RgbImage::from_fn(60, 30, |x, y| {
            if (12..18).contains(&y) && (10..50).contains(&x) {
                Rgb([20, 20, 20])
            } else {
                let bg = 140 + (x as u8);
                Rgb([bg, bg, bg])
            }
        })
    }

    #[test]
    fn undecodable_bytes_fail_with_profile() {
        let err = FilterNormalizer::default()
            .normalize(b"definitely not an image", PreprocessProfile::Enhanced)
            .unwrap_err();
        match err {
            PipelineError::ImageDecode { profile, .. } => {
                assert_eq!(profile, PreprocessProfile::Enhanced)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_buffer_fails() {
        assert!(FilterNormalizer::default()
            .normalize(&[], PreprocessProfile::Basic)
            .is_err());
    }

    #[test]
    fn enhanced_output_is_binary() {
        let bytes = png_bytes(DynamicImage::ImageRgb8(gradient_page()));
        let out = FilterNormalizer::default()
            .normalize(&bytes, PreprocessProfile::Enhanced)
            .unwrap();
        assert_eq!(out.profile(), PreprocessProfile::Enhanced);
        assert!(out.pixels().pixels().all(|p| p[0] == 0 || p[0] == 255));
        // bar interior stays black, background far from the bar turns white
        assert_eq!(out.pixels().get_pixel(30, 15)[0], 0);
        assert_eq!(out.pixels().get_pixel(2, 2)[0], 255);
        assert_eq!(out.pixels().get_pixel(57, 27)[0], 255);
    }

    #[test]
    fn basic_keeps_dimensions_and_grey_levels() {
        let bytes = png_bytes(DynamicImage::ImageRgb8(gradient_page()));
        let out = FilterNormalizer::default()
            .normalize(&bytes, PreprocessProfile::Basic)
            .unwrap();
        assert_eq!(out.profile(), PreprocessProfile::Basic);
        assert_eq!((out.width(), out.height()), (60, 30));
        assert!(out.pixels().pixels().any(|p| p[0] != 0 && p[0] != 255));
    }

    #[test]
    fn resize_preserves_aspect_ratio() {
        let gray = GrayImage::from_pixel(100, 50, Luma([200]));
        let out = resize_to_width(&gray, 300);
        assert_eq!(out.dimensions(), (300, 150));
    }

    #[test]
    fn enhanced_applies_target_width() {
        let bytes = png_bytes(DynamicImage::ImageRgb8(gradient_page()));
        let normalizer = FilterNormalizer::new(PreprocessSettings {
            target_width: Some(120),
            ..PreprocessSettings::default()
        });
        let out = normalizer
            .normalize(&bytes, PreprocessProfile::Enhanced)
            .unwrap();
        assert_eq!((out.width(), out.height()), (120, 60));
    }

    #[test]
    fn uniform_image_thresholds_to_white() {
        let gray = GrayImage::from_pixel(20, 20, Luma([90]));
        let out = adaptive_threshold(&gray, 11, 2);
        assert!(out.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn median_removes_isolated_speckle() {
        let mut gray = GrayImage::from_pixel(9, 9, Luma([255]));
        gray.put_pixel(4, 4, Luma([0]));
        let out = median_filter(&gray, 1);
        assert_eq!(out.get_pixel(4, 4)[0], 255);
    }

    #[test]
    fn median_radius_zero_is_identity() {
        let mut gray = GrayImage::from_pixel(5, 5, Luma([255]));
        gray.put_pixel(2, 2, Luma([0]));
        assert_eq!(median_filter(&gray, 0), gray);
    }

    #[test]
    fn contrast_stretches_around_mean() {
        let mut gray = GrayImage::from_pixel(2, 1, Luma([100]));
        gray.put_pixel(1, 0, Luma([140]));
        // mean 120 → 100 becomes 80, 140 becomes 160
        let out = boost_contrast(&gray, 2.0);
        assert_eq!(out.get_pixel(0, 0)[0], 80);
        assert_eq!(out.get_pixel(1, 0)[0], 160);
    }

    #[test]
    fn contrast_factor_one_is_identity() {
        let gray = GrayImage::from_fn(4, 4, |x, y| Luma([(x * 40 + y * 10) as u8]));
        assert_eq!(boost_contrast(&gray, 1.0), gray);
    }
}
