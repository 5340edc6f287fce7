//! Configuration types for job-posting image processing.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share a config across worker threads, serialise it for logging,
//! and diff two runs to understand why their outputs differ.
//!
//! The engines themselves (image normaliser, OCR recogniser) are not part of
//! the config; they are injected into [`crate::process::JobPipeline`].

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Characters the OCR engine is allowed to emit.
///
/// Letters, digits and the punctuation that actually shows up in postings.
/// Anything else the engine guesses on a garbled glyph is rejected.
pub const DEFAULT_CHAR_WHITELIST: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-.,/()&";

/// Configuration for turning a posting image into a [`crate::output::JobRecord`].
///
/// Built via [`PipelineConfig::builder()`] or using [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use posting_ocr::{MatchStrictness, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .target_width(1800)
///     .ocr_timeout_secs(20)
///     .match_strictness(MatchStrictness::Phrase)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Resize the Enhanced image to this width, preserving aspect ratio. Default: None.
    ///
    /// Very small screenshots give strokes that are one or two pixels wide and
    /// very large phone photos waste engine time; pinning the width keeps text
    /// stroke width in the range the engine was trained on.
    pub target_width: Option<u32>,

    /// Side length of the local neighbourhood used for adaptive binarisation. Default: 11.
    ///
    /// Must be odd. Larger blocks tolerate bigger lighting gradients but blur
    /// the boundary between thin strokes and background.
    pub threshold_block_size: u32,

    /// Constant subtracted from the local mean before thresholding. Default: 2.
    pub threshold_offset: i16,

    /// Radius of the median filter applied after binarisation. Default: 1 (3×3); 0 disables.
    pub denoise_radius: u32,

    /// Contrast multiplier for the Enhanced profile. Default: 2.0.
    pub contrast_factor: f32,

    /// Contrast multiplier for the Basic fallback profile. Default: 1.5.
    pub basic_contrast_factor: f32,

    /// Tesseract page segmentation mode. Default: 6 (single uniform block of text).
    pub page_seg_mode: u8,

    /// Characters the engine may emit. Empty means unrestricted.
    pub char_whitelist: String,

    /// Keep runs of spaces between words as recognised. Default: true.
    pub preserve_interword_spaces: bool,

    /// Tesseract language pack. Default: "eng".
    pub language: String,

    /// Path or name of the tesseract executable. Default: "tesseract".
    pub tesseract_path: PathBuf,

    /// Per-image recognition timeout in seconds. Default: 30.
    pub ocr_timeout_secs: u64,

    /// How strictly skill phrases must match. Default: [`MatchStrictness::Loose`].
    pub match_strictness: MatchStrictness,

    /// Images processed at once in batch mode. Default: 4.
    ///
    /// Every worker runs its own engine process, so this is bounded by cores
    /// rather than by network latency.
    pub concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_width: None,
            threshold_block_size: 11,
            threshold_offset: 2,
            denoise_radius: 1,
            contrast_factor: 2.0,
            basic_contrast_factor: 1.5,
            page_seg_mode: 6,
            char_whitelist: DEFAULT_CHAR_WHITELIST.to_string(),
            preserve_interword_spaces: true,
            language: "eng".to_string(),
            tesseract_path: PathBuf::from("tesseract"),
            ocr_timeout_secs: 30,
            match_strictness: MatchStrictness::default(),
            concurrency: 4,
        }
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if let Some(w) = self.target_width {
            if w < 16 {
                return Err(PipelineError::InvalidConfig(format!(
                    "Target width must be ≥ 16 px, got {w}"
                )));
            }
        }
        if self.threshold_block_size < 3 || self.threshold_block_size % 2 == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "Threshold block size must be odd and ≥ 3, got {}",
                self.threshold_block_size
            )));
        }
        if self.denoise_radius > 5 {
            return Err(PipelineError::InvalidConfig(format!(
                "Denoise radius must be 0–5, got {}",
                self.denoise_radius
            )));
        }
        let positive = |f: f32| f.is_finite() && f > 0.0;
        if !positive(self.contrast_factor) || !positive(self.basic_contrast_factor) {
            return Err(PipelineError::InvalidConfig(
                "Contrast factors must be > 0".into(),
            ));
        }
        if self.page_seg_mode > 13 {
            return Err(PipelineError::InvalidConfig(format!(
                "Page segmentation mode must be 0–13, got {}",
                self.page_seg_mode
            )));
        }
        if self.language.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        if self.ocr_timeout_secs == 0 {
            return Err(PipelineError::InvalidConfig(
                "OCR timeout must be ≥ 1 second".into(),
            ));
        }
        if self.concurrency == 0 {
            return Err(PipelineError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn target_width(mut self, width: u32) -> Self {
        self.config.target_width = Some(width);
        self
    }

    pub fn no_resize(mut self) -> Self {
        self.config.target_width = None;
        self
    }

    pub fn threshold_block_size(mut self, size: u32) -> Self {
        self.config.threshold_block_size = size;
        self
    }

    pub fn threshold_offset(mut self, offset: i16) -> Self {
        self.config.threshold_offset = offset;
        self
    }

    pub fn denoise_radius(mut self, radius: u32) -> Self {
        self.config.denoise_radius = radius;
        self
    }

    pub fn contrast_factor(mut self, factor: f32) -> Self {
        self.config.contrast_factor = factor;
        self
    }

    pub fn basic_contrast_factor(mut self, factor: f32) -> Self {
        self.config.basic_contrast_factor = factor;
        self
    }

    pub fn page_seg_mode(mut self, psm: u8) -> Self {
        self.config.page_seg_mode = psm;
        self
    }

    pub fn char_whitelist(mut self, chars: impl Into<String>) -> Self {
        self.config.char_whitelist = chars.into();
        self
    }

    pub fn preserve_interword_spaces(mut self, v: bool) -> Self {
        self.config.preserve_interword_spaces = v;
        self
    }

    pub fn language(mut self, lang: impl Into<String>) -> Self {
        self.config.language = lang.into();
        self
    }

    pub fn tesseract_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tesseract_path = path.into();
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = secs;
        self
    }

    pub fn match_strictness(mut self, strictness: MatchStrictness) -> Self {
        self.config.match_strictness = strictness;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How skill phrases from the taxonomy are matched against posting text.
///
/// OCR output is noisy: a multi-word skill such as "project management" may
/// come back as "project manaqement". The loose mode still credits the skill
/// when one of its words survives, at the cost of occasionally crediting an
/// unrelated phrase that merely shares a word with the posting.
///
/// | Mode | Matches when |
/// |------|--------------|
/// | `Loose` | the whole phrase appears, **or** any significant word of a multi-word phrase appears (default) |
/// | `Phrase` | the whole phrase appears as a contiguous run of words |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrictness {
    /// Phrase match or word-level fallback. (default)
    #[default]
    Loose,
    /// Contiguous phrase match only.
    Phrase,
}

impl std::str::FromStr for MatchStrictness {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "loose" | "word" => Ok(MatchStrictness::Loose),
            "phrase" | "strict" => Ok(MatchStrictness::Phrase),
            other => Err(PipelineError::InvalidConfig(format!(
                "Unknown match strictness '{other}' (expected loose or phrase)"
            ))),
        }
    }
}
