//! Output types: extracted sections, the final job record, batch results.

use crate::error::{ErrorKind, ErrorReport, PipelineError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Title used when no title rule matches.
pub const DEFAULT_TITLE: &str = "Unknown Position";

/// Company used when no company rule matches.
pub const DEFAULT_COMPANY: &str = "Unknown Company";

/// Structured fields recovered from canonical text.
///
/// Every field is always a string. An empty `qualifications` means the
/// extractor abstained; `description` is the whole input text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSections {
    pub title: String,
    pub company: String,
    pub qualifications: String,
    pub description: String,
}

impl JobSections {
    /// Sections with every field defaulted and `description` set to `text`.
    pub fn defaults(text: impl Into<String>) -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            company: DEFAULT_COMPANY.to_string(),
            qualifications: String::new(),
            description: text.into(),
        }
    }

    /// Text the skill matcher should scan: qualifications if present, else description.
    pub fn skill_source(&self) -> &str {
        if self.qualifications.trim().is_empty() {
            &self.description
        } else {
            &self.qualifications
        }
    }
}

/// Terminal artifact of the pipeline.
///
/// Serialises to `{title, company, qualifications, description, skills}` and
/// nothing else; diagnostics go to the tracing channel.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobRecord {
    pub title: String,
    pub company: String,
    pub qualifications: String,
    pub description: String,
    /// Matched taxonomy phrases, deduplicated and sorted.
    pub skills: Vec<String>,
}

impl JobRecord {
    pub fn from_sections(sections: JobSections, skills: Vec<String>) -> Self {
        Self {
            title: sections.title,
            company: sections.company,
            qualifications: sections.qualifications,
            description: sections.description,
            skills,
        }
    }
}

/// Result of processing one image in a batch.
#[derive(Debug)]
pub struct BatchItem {
    /// 0-indexed position in the input list.
    pub index: usize,
    /// Caller-supplied label, usually a file name.
    pub source: String,
    pub result: Result<JobRecord, PipelineError>,
    /// Wall-clock time spent on this image.
    pub duration_ms: u64,
}

impl BatchItem {
    /// JSON payload for this item: the record, or `{"error": ...}`.
    pub fn to_json(&self) -> serde_json::Value {
        let value = match &self.result {
            Ok(record) => serde_json::to_value(record),
            Err(e) => serde_json::to_value(ErrorReport::from(e)),
        };
        value.unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }))
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Aggregate numbers for a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total_images: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Failure counts keyed by [`ErrorKind`].
    pub failures_by_kind: BTreeMap<String, usize>,
    pub total_skills: usize,
    pub total_duration_ms: u64,
}

impl BatchStats {
    pub fn from_items(items: &[BatchItem], total_duration_ms: u64) -> Self {
        let mut stats = BatchStats {
            total_images: items.len(),
            total_duration_ms,
            ..Default::default()
        };
        for item in items {
            match &item.result {
                Ok(record) => {
                    stats.succeeded += 1;
                    stats.total_skills += record.skills.len();
                }
                Err(e) => {
                    stats.failed += 1;
                    *stats
                        .failures_by_kind
                        .entry(e.kind().to_string())
                        .or_default() += 1;
                }
            }
        }
        stats
    }

    pub fn failures_of(&self, kind: ErrorKind) -> usize {
        self.failures_by_kind
            .get(&kind.to_string())
            .copied()
            .unwrap_or(0)
    }
}

/// All items of a batch, in input order, plus aggregate stats.
#[derive(Debug)]
pub struct BatchOutput {
    pub items: Vec<BatchItem>,
    pub stats: BatchStats,
}
