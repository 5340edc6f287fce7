//! Single-image processing: the pipeline orchestrator.
//!
//! One call to [`JobPipeline::process`] walks an image through
//!
//! ```text
//! normalize(Enhanced) → recognize → clean ──┬── text ──→ sections → skills → JobRecord
//!                                           └── empty ─→ normalize(Basic) → recognize → clean
//!                                                          ├── text ──→ sections → skills → JobRecord
//!                                                          └── empty ─→ EmptyText error
//! ```
//!
//! The retry policy lives in one pure function, [`next_step`], so the
//! fallback can be tested without any image or engine. Decode and OCR
//! failures are fatal for the image and are never retried here.
//!
//! A `JobPipeline` holds no mutable state. It is `Send + Sync` and meant to
//! be shared behind an `Arc` by concurrent workers.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::output::JobRecord;
use crate::pipeline::ocr::{TesseractRecognizer, TextRecognizer};
use crate::pipeline::postprocess::clean_text;
use crate::pipeline::preprocess::{FilterNormalizer, ImageNormalizer, PreprocessProfile};
use crate::pipeline::sections::extract_sections;
use crate::pipeline::skills::match_skills;
use crate::taxonomy::SkillTaxonomy;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// What the orchestrator does after a profile produced `text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The text is usable; continue to extraction.
    Accept,
    /// Nothing was read; run the whole read step again with this profile.
    Retry(PreprocessProfile),
    /// Nothing was read and no fallback is left.
    GiveUp,
}

/// Fallback policy: Enhanced falls back to Basic exactly once.
pub fn next_step(profile: PreprocessProfile, text: &str) -> Transition {
    if !text.trim().is_empty() {
        return Transition::Accept;
    }
    match profile {
        PreprocessProfile::Enhanced => Transition::Retry(PreprocessProfile::Basic),
        PreprocessProfile::Basic => Transition::GiveUp,
    }
}

/// Image → [`JobRecord`] orchestrator with injectable engines.
#[derive(Clone)]
pub struct JobPipeline {
    config: PipelineConfig,
    normalizer: Arc<dyn ImageNormalizer>,
    recognizer: Arc<dyn TextRecognizer>,
    taxonomy: Arc<SkillTaxonomy>,
}

impl std::fmt::Debug for JobPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobPipeline")
            .field("config", &self.config)
            .field("taxonomy_len", &self.taxonomy.len())
            .finish_non_exhaustive()
    }
}

impl JobPipeline {
    /// Pipeline with the built-in image filters and the Tesseract engine.
    ///
    /// # Errors
    /// [`PipelineError::InvalidConfig`] when `config` fails validation.
    pub fn new(config: PipelineConfig, taxonomy: Arc<SkillTaxonomy>) -> Result<Self, PipelineError> {
        let normalizer = Arc::new(FilterNormalizer::from_config(&config));
        let recognizer = Arc::new(TesseractRecognizer::from_config(&config));
        Self::with_engines(config, normalizer, recognizer, taxonomy)
    }

    /// Pipeline with caller-supplied normalisation and recognition engines.
    pub fn with_engines(
        config: PipelineConfig,
        normalizer: Arc<dyn ImageNormalizer>,
        recognizer: Arc<dyn TextRecognizer>,
        taxonomy: Arc<SkillTaxonomy>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            config,
            normalizer,
            recognizer,
            taxonomy,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn taxonomy(&self) -> &Arc<SkillTaxonomy> {
        &self.taxonomy
    }

    /// Run one image through the full pipeline.
    ///
    /// # Errors
    /// * [`PipelineError::ImageDecode`] — the bytes are not an image
    /// * [`PipelineError::Ocr`] / [`PipelineError::OcrTimeout`] — engine failure
    /// * [`PipelineError::EmptyText`] — both profiles read nothing
    pub fn process(&self, image: &[u8]) -> Result<JobRecord, PipelineError> {
        let start = Instant::now();
        let mut profile = PreprocessProfile::Enhanced;
        let mut attempts = Vec::with_capacity(2);

        let text = loop {
            attempts.push(profile);
            let text = self.read_text(image, profile)?;
            match next_step(profile, &text) {
                Transition::Accept => break text,
                Transition::Retry(fallback) => {
                    warn!("{profile} profile read no text, falling back to {fallback}");
                    profile = fallback;
                }
                Transition::GiveUp => {
                    warn!("No text after {} attempt(s); giving up", attempts.len());
                    return Err(PipelineError::EmptyText { attempts });
                }
            }
        };

        let record = self.assemble(&text);
        info!(
            "Processed image with {} profile: {} chars, {} skills in {}ms",
            profile,
            text.len(),
            record.skills.len(),
            start.elapsed().as_millis()
        );
        Ok(record)
    }

    /// Normalise, recognise and clean with one profile.
    pub fn read_text(&self, image: &[u8], profile: PreprocessProfile) -> Result<String, PipelineError> {
        let normalized = self.normalizer.normalize(image, profile)?;
        let raw = self.recognizer.recognize(&normalized)?;
        let cleaned = clean_text(&raw);
        debug!(
            "{profile} profile: {} raw chars → {} clean chars",
            raw.len(),
            cleaned.len()
        );
        Ok(cleaned)
    }

    /// Extraction and matching over already-clean text.
    pub fn assemble(&self, text: &str) -> JobRecord {
        let sections = extract_sections(text);
        let skills = match_skills(
            sections.skill_source(),
            &self.taxonomy,
            self.config.match_strictness,
        );
        debug!(
            "Matched {} skills against {} taxonomy phrases",
            skills.len(),
            self.taxonomy.len()
        );
        JobRecord::from_sections(sections, skills)
    }
}

/// Process one image with the default engines.
///
/// Convenience for one-off calls; build a [`JobPipeline`] once and reuse it
/// when processing many images.
pub fn process_image(
    image: &[u8],
    config: &PipelineConfig,
    taxonomy: Arc<SkillTaxonomy>,
) -> Result<JobRecord, PipelineError> {
    JobPipeline::new(config.clone(), taxonomy)?.process(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::preprocess::NormalizedImage;
    use image::GrayImage;

    #[test]
    fn enhanced_text_is_accepted() {
        assert_eq!(next_step(PreprocessProfile::Enhanced, "hi"), Transition::Accept);
    }

    #[test]
    fn enhanced_empty_retries_with_basic() {
        assert_eq!(
            next_step(PreprocessProfile::Enhanced, " \n "),
            Transition::Retry(PreprocessProfile::Basic)
        );
    }

    #[test]
    fn basic_empty_gives_up() {
        assert_eq!(next_step(PreprocessProfile::Basic, ""), Transition::GiveUp);
        assert_eq!(next_step(PreprocessProfile::Basic, "x"), Transition::Accept);
    }

    struct Blank;

    impl ImageNormalizer for Blank {
        fn normalize(
            &self,
            _image: &[u8],
            profile: PreprocessProfile,
        ) -> Result<NormalizedImage, PipelineError> {
            Ok(NormalizedImage::new(profile, GrayImage::new(1, 1)))
        }
    }

    struct Fixed(&'static str);

    impl TextRecognizer for Fixed {
        fn recognize(&self, _image: &NormalizedImage) -> Result<String, PipelineError> {
            Ok(self.0.to_string())
        }
    }

    fn pipeline(text: &'static str) -> JobPipeline {
        JobPipeline::with_engines(
            PipelineConfig::default(),
            Arc::new(Blank),
            Arc::new(Fixed(text)),
            Arc::new(SkillTaxonomy::from_phrases(["python", "sql"])),
        )
        .unwrap()
    }

    #[test]
    fn skills_come_from_qualifications_when_present() {
        let record = pipeline("DATA ANALYST\nKnows python\nRequirements: SQL").process(b"x").unwrap();
        assert_eq!(record.title, "DATA ANALYST");
        assert_eq!(record.qualifications, "SQL");
        assert_eq!(record.skills, vec!["sql"]);
    }

    #[test]
    fn skills_fall_back_to_description() {
        let record = pipeline("we use python and sql daily").process(b"x").unwrap();
        assert_eq!(record.skills, vec!["python", "sql"]);
        assert_eq!(record.description, "we use python and sql daily");
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = PipelineConfig {
            threshold_block_size: 4,
            ..Default::default()
        };
        let err = JobPipeline::with_engines(
            config,
            Arc::new(Blank),
            Arc::new(Fixed("x")),
            Arc::new(SkillTaxonomy::empty()),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }
}
