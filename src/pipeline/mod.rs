//! Pipeline stages for image-to-record extraction.
//!
//! Each submodule implements exactly one transformation step. The two
//! fallible, engine-backed stages sit behind traits
//! ([`preprocess::ImageNormalizer`], [`ocr::TextRecognizer`]); the text stages
//! are total functions that never fail.
//!
//! ## Data Flow
//!
//! ```text
//! preprocess ──▶ encode ──▶ ocr ──▶ postprocess ──▶ sections ──▶ skills
//!  (filters)     (PNG)   (engine)    (cleanup)       (regex)    (taxonomy)
//! ```
//!
//! 1. [`preprocess`]  — decode, grayscale, and apply the Enhanced or Basic profile
//! 2. [`encode`]      — lossless PNG for the engine's stdin
//! 3. [`ocr`]         — run the recognition engine under a timeout
//! 4. [`postprocess`] — deterministic cleanup of recognition artefacts
//! 5. [`sections`]    — title, company and qualifications by ordered rules
//! 6. [`skills`]      — taxonomy phrases found in the text
//!
//! Sequencing and the Enhanced → Basic fallback live in [`crate::process`].

pub mod encode;
pub mod ocr;
pub mod postprocess;
pub mod preprocess;
pub mod sections;
pub mod skills;
