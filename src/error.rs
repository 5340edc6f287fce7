//! Error types for the posting-ocr library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PipelineError`] — **Fatal** for one image: the bytes could not be
//!   decoded, the recognition engine failed or timed out, or neither
//!   preprocessing profile produced any text. Returned as
//!   `Err(PipelineError)` from [`crate::process::JobPipeline::process`].
//!
//! * [`TaxonomyLoadError`] — **Non-fatal**: one skill source was missing or
//!   malformed. The loader skips it, logs a warning and hands the error back
//!   next to whatever taxonomy it did manage to build.
//!
//! Section extraction and skill matching are total functions and have no
//! error type at all: "no match" is a default value, not a failure.

use crate::pipeline::preprocess::PreprocessProfile;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned while processing a single posting image.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The byte buffer is not a decodable raster image.
    #[error("Image could not be decoded ({profile} profile): {detail}")]
    ImageDecode {
        profile: PreprocessProfile,
        detail: String,
    },

    // ── Recognition errors ────────────────────────────────────────────────
    /// The OCR engine reported a hard failure (crash, corrupt buffer, missing binary).
    #[error("OCR failed ({profile} profile): {detail}")]
    Ocr {
        profile: PreprocessProfile,
        detail: String,
    },

    /// The OCR engine did not finish within the configured timeout.
    #[error("OCR timed out after {secs}s ({profile} profile)\nIncrease --ocr-timeout.")]
    OcrTimeout {
        profile: PreprocessProfile,
        secs: u64,
    },

    /// Every attempted profile produced only whitespace.
    #[error("OCR returned empty text after trying profiles: {}", format_attempts(.attempts))]
    EmptyText { attempts: Vec<PreprocessProfile> },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// A batch worker panicked or could not be joined.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_attempts(attempts: &[PreprocessProfile]) -> String {
    attempts
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(" → ")
}

/// Caller-facing classification of a [`PipelineError`].
///
/// Timeouts collapse into [`ErrorKind::Ocr`]: from the caller's point of view
/// both mean "the recogniser could not produce text for this image".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ImageDecode,
    Ocr,
    EmptyText,
    InvalidConfig,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::ImageDecode => "image_decode",
            ErrorKind::Ocr => "ocr",
            ErrorKind::EmptyText => "empty_text",
            ErrorKind::InvalidConfig => "invalid_config",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

impl PipelineError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::ImageDecode { .. } => ErrorKind::ImageDecode,
            PipelineError::Ocr { .. } | PipelineError::OcrTimeout { .. } => ErrorKind::Ocr,
            PipelineError::EmptyText { .. } => ErrorKind::EmptyText,
            PipelineError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            PipelineError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The preprocessing profile that was active when the error occurred.
    ///
    /// For [`PipelineError::EmptyText`] this is the last profile attempted.
    pub fn profile(&self) -> Option<PreprocessProfile> {
        match self {
            PipelineError::ImageDecode { profile, .. }
            | PipelineError::Ocr { profile, .. }
            | PipelineError::OcrTimeout { profile, .. } => Some(*profile),
            PipelineError::EmptyText { attempts } => attempts.last().copied(),
            PipelineError::InvalidConfig(_) | PipelineError::Internal(_) => None,
        }
    }

    /// Should the caller treat this image as bad input rather than retry it?
    pub fn is_bad_input(&self) -> bool {
        matches!(
            self,
            PipelineError::ImageDecode { .. } | PipelineError::EmptyText { .. }
        )
    }

    /// Build the JSON-facing failure payload.
    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            error: self.to_string(),
        }
    }
}

/// Structured failure payload: `{"error": "..."}`.
///
/// Emitted in place of a [`crate::output::JobRecord`] so a consumer never sees
/// partial record JSON mixed with diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub error: String,
}

impl From<&PipelineError> for ErrorReport {
    fn from(e: &PipelineError) -> Self {
        e.to_report()
    }
}

/// A non-fatal failure to read one skill taxonomy source.
///
/// The loader keeps going with the remaining sources.
#[derive(Debug, Error)]
pub enum TaxonomyLoadError {
    /// The source file could not be opened or read.
    #[error("Skill source '{path}' could not be read: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The header row does not contain the expected label column.
    #[error("Skill source '{path}' has no '{column}' column")]
    MissingColumn { path: PathBuf, column: String },

    /// The file is not valid delimited text (e.g. an unterminated quote).
    #[error("Skill source '{path}' is malformed near record {record}: {detail}")]
    Malformed {
        path: PathBuf,
        record: usize,
        detail: String,
    },
}

impl TaxonomyLoadError {
    /// Path of the offending source.
    pub fn path(&self) -> &std::path::Path {
        match self {
            TaxonomyLoadError::Unreadable { path, .. }
            | TaxonomyLoadError::MissingColumn { path, .. }
            | TaxonomyLoadError::Malformed { path, .. } => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_classified_as_ocr() {
        let e = PipelineError::OcrTimeout {
            profile: PreprocessProfile::Enhanced,
            secs: 30,
        };
        assert_eq!(e.kind(), ErrorKind::Ocr);
        assert!(e.to_string().contains("30s"), "got: {e}");
        assert!(e.to_string().contains("enhanced"), "got: {e}");
    }

    #[test]
    fn empty_text_lists_attempts() {
        let e = PipelineError::EmptyText {
            attempts: vec![PreprocessProfile::Enhanced, PreprocessProfile::Basic],
        };
        let msg = e.to_string();
        assert!(msg.contains("enhanced → basic"), "got: {msg}");
        assert_eq!(e.profile(), Some(PreprocessProfile::Basic));
        assert!(e.is_bad_input());
    }

    #[test]
    fn decode_error_carries_profile() {
        let e = PipelineError::ImageDecode {
            profile: PreprocessProfile::Enhanced,
            detail: "bad magic".into(),
        };
        assert_eq!(e.kind(), ErrorKind::ImageDecode);
        assert_eq!(e.profile(), Some(PreprocessProfile::Enhanced));
    }

    #[test]
    fn report_serialises_as_single_error_field() {
        let e = PipelineError::Ocr {
            profile: PreprocessProfile::Basic,
            detail: "engine crashed".into(),
        };
        let json = serde_json::to_value(e.to_report()).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert!(obj["error"].as_str().unwrap().contains("engine crashed"));
    }

    #[test]
    fn taxonomy_error_exposes_path() {
        let e = TaxonomyLoadError::MissingColumn {
            path: PathBuf::from("skills_en.csv"),
            column: "preferredLabel".into(),
        };
        assert_eq!(e.path(), std::path::Path::new("skills_en.csv"));
        assert!(e.to_string().contains("preferredLabel"));
    }
}
