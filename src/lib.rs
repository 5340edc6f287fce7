//! # posting-ocr
//!
//! Turn scanned, photographed or screenshotted job-posting images into
//! structured records: title, company, qualifications, description and the
//! set of recognised skills.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image bytes
//!  │
//!  ├─ 1. Normalise  grayscale → resize → adaptive threshold → median → contrast
//!  ├─ 2. Recognise  Tesseract over stdin/stdout, bounded by a timeout
//!  ├─ 3. Clean      5-rule text cleanup (split letters, merged words, whitespace)
//!  │      └─ empty? re-run 1–3 once with the Basic profile (contrast only)
//!  ├─ 4. Sections   ordered first-match-wins pattern rules
//!  ├─ 5. Skills     taxonomy match over qualifications (or the whole text)
//!  └─ 6. Output     JobRecord {title, company, qualifications, description, skills}
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use posting_ocr::{JobPipeline, PipelineConfig, TaxonomyLoader, TaxonomySource};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let taxonomy = TaxonomyLoader::new()
//!         .source(TaxonomySource::esco("skill_data/esco/skills_en.csv"))
//!         .load()
//!         .taxonomy;
//!     let pipeline = JobPipeline::new(PipelineConfig::default(), Arc::new(taxonomy))?;
//!
//!     let bytes = std::fs::read("posting.png")?;
//!     let record = pipeline.process(&bytes)?;
//!     println!("{}", serde_json::to_string_pretty(&record)?);
//!     Ok(())
//! }
//! ```
//!
//! For many images use [`process_batch`] (async) or [`process_batch_sync`].
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `posting-ocr` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! posting-ocr = { version = "0.1", default-features = false }
//! ```
//!
//! ## Requirements
//!
//! The default recogniser shells out to the `tesseract` executable (4.x or
//! 5.x) with English language data. Point
//! [`PipelineConfig::tesseract_path`] elsewhere, or supply your own
//! [`TextRecognizer`] through [`JobPipeline::with_engines`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod taxonomy;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{process_batch, process_batch_sync, process_stream, BatchInput, ItemStream};
pub use config::{MatchStrictness, PipelineConfig, PipelineConfigBuilder};
pub use error::{ErrorKind, ErrorReport, PipelineError, TaxonomyLoadError};
pub use output::{BatchItem, BatchOutput, BatchStats, JobRecord, JobSections};
pub use pipeline::ocr::{TesseractRecognizer, TextRecognizer};
pub use pipeline::postprocess::clean_text;
pub use pipeline::preprocess::{FilterNormalizer, ImageNormalizer, NormalizedImage, PreprocessProfile};
pub use pipeline::sections::extract_sections;
pub use pipeline::skills::match_skills;
pub use process::{process_image, JobPipeline};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use taxonomy::{SkillTaxonomy, TaxonomyLoad, TaxonomyLoader, TaxonomySource};
