//! Skill taxonomy: the immutable set of known skill phrases and its loader.
//!
//! A [`SkillTaxonomy`] is built once at startup by a [`TaxonomyLoader`] from
//! any number of [`TaxonomySource`]s and then shared read-only (usually via
//! `Arc`) by every matching call. There is no global state.
//!
//! Loading is best-effort. A source that is missing or malformed is skipped
//! with a `warn!` and its [`TaxonomyLoadError`] is handed back in
//! [`TaxonomyLoad::errors`]; the taxonomy keeps whatever the other sources
//! (and the built-in set, unless disabled) provided.
//!
//! ```rust,no_run
//! use posting_ocr::{TaxonomyLoader, TaxonomySource};
//!
//! let load = TaxonomyLoader::new()
//!     .source(TaxonomySource::esco("skill_data/esco/skills_en.csv"))
//!     .source(TaxonomySource::lines("skill_data/onet/Skills.txt"))
//!     .load();
//! for err in &load.errors {
//!     eprintln!("skipped: {err}");
//! }
//! println!("{} skills", load.taxonomy.len());
//! ```

use crate::error::TaxonomyLoadError;
use crate::pipeline::skills::{compact, tokenize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Label column of the ESCO `skills_en.csv` export.
pub const ESCO_COLUMN: &str = "preferredLabel";

/// Label column of the O*NET `Skills.txt` tab-separated export.
pub const ONET_COLUMN: &str = "Element Name";

/// Skills available without any external source.
const BUILTIN_SKILLS: &[&str] = &[
    "agile",
    "android",
    "angular",
    "aws",
    "azure",
    "c#",
    "c++",
    "communication",
    "critical thinking",
    "css",
    "customer service",
    "data analysis",
    "django",
    "docker",
    "excel",
    "figma",
    "flask",
    "gcp",
    "git",
    "graphql",
    "html",
    "ios",
    "java",
    "javascript",
    "jira",
    "kotlin",
    "kubernetes",
    "leadership",
    "linux",
    "machine learning",
    "mongodb",
    "mysql",
    "node.js",
    "php",
    "postgresql",
    "power bi",
    "problem solving",
    "project management",
    "python",
    "pytorch",
    "react",
    "ruby",
    "rust",
    "scrum",
    "sql",
    "swift",
    "tableau",
    "teamwork",
    "tensorflow",
    "typescript",
    "vue",
];

/// Normalise a raw label: trim, lowercase, collapse inner whitespace.
///
/// Returns `None` for labels that are empty after normalisation.
pub fn normalize_phrase(raw: &str) -> Option<String> {
    let phrase = raw.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    (!phrase.is_empty()).then_some(phrase)
}

/// One taxonomy phrase, pre-tokenised for matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillEntry {
    phrase: String,
    tokens: Vec<String>,
    compact: String,
}

impl SkillEntry {
    fn new(phrase: String) -> Option<Self> {
        let tokens = tokenize(&phrase);
        if tokens.is_empty() {
            return None;
        }
        let compact = compact(&tokens);
        Some(Self {
            phrase,
            tokens,
            compact,
        })
    }

    /// The normalised phrase as reported in results.
    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Tokens concatenated, e.g. `node.js` → `nodejs`.
    pub fn compact(&self) -> &str {
        &self.compact
    }
}

/// Immutable, sorted, deduplicated set of skill phrases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkillTaxonomy {
    entries: Vec<SkillEntry>,
}

impl SkillTaxonomy {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from raw labels. Labels are normalised; those with no
    /// matchable characters (e.g. `"---"`) are dropped.
    pub fn from_phrases<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set: BTreeSet<String> = phrases
            .into_iter()
            .filter_map(|p| normalize_phrase(p.as_ref()))
            .collect();
        Self {
            entries: set.into_iter().filter_map(SkillEntry::new).collect(),
        }
    }

    /// The built-in default taxonomy.
    pub fn builtin() -> Self {
        Self::from_phrases(BUILTIN_SKILLS)
    }

    pub fn builtin_phrases() -> &'static [&'static str] {
        BUILTIN_SKILLS
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `phrase` (after normalisation) is in the taxonomy.
    pub fn contains(&self, phrase: &str) -> bool {
        normalize_phrase(phrase).is_some_and(|p| {
            self.entries
                .binary_search_by(|e| e.phrase.as_str().cmp(p.as_str()))
                .is_ok()
        })
    }

    /// Phrases in sorted order.
    pub fn phrases(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.phrase.as_str())
    }

    /// Entries in sorted phrase order.
    pub fn entries(&self) -> &[SkillEntry] {
        &self.entries
    }
}

/// Where skill labels come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaxonomySource {
    /// A delimited file with a header row; labels are read from `column`.
    Delimited {
        path: PathBuf,
        delimiter: char,
        column: String,
    },
    /// One label per non-empty line.
    LineList { path: PathBuf },
    /// Labels supplied in-process.
    Inline(Vec<String>),
}

impl TaxonomySource {
    /// ESCO `skills_en.csv`: comma separated, `preferredLabel` column.
    pub fn esco(path: impl Into<PathBuf>) -> Self {
        Self::Delimited {
            path: path.into(),
            delimiter: ',',
            column: ESCO_COLUMN.to_string(),
        }
    }

    /// O*NET `Skills.txt`: tab separated, `Element Name` column.
    pub fn onet(path: impl Into<PathBuf>) -> Self {
        Self::Delimited {
            path: path.into(),
            delimiter: '\t',
            column: ONET_COLUMN.to_string(),
        }
    }

    pub fn lines(path: impl Into<PathBuf>) -> Self {
        Self::LineList { path: path.into() }
    }

    /// Short label for log lines.
    pub fn describe(&self) -> String {
        match self {
            Self::Delimited { path, column, .. } => format!("{} [{column}]", path.display()),
            Self::LineList { path } => path.display().to_string(),
            Self::Inline(labels) => format!("inline ({} labels)", labels.len()),
        }
    }

    /// Read the raw labels of this source.
    pub fn read_labels(&self) -> Result<Vec<String>, TaxonomyLoadError> {
        match self {
            Self::Delimited {
                path,
                delimiter,
                column,
            } => {
                let text = read_text(path)?;
                labels_from_delimited(path, &text, *delimiter, column)
            }
            Self::LineList { path } => {
                let text = read_text(path)?;
                Ok(text
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string)
                    .collect())
            }
            Self::Inline(labels) => Ok(labels.clone()),
        }
    }
}

/// Result of a best-effort taxonomy load.
#[derive(Debug)]
pub struct TaxonomyLoad {
    pub taxonomy: SkillTaxonomy,
    /// One entry per skipped source.
    pub errors: Vec<TaxonomyLoadError>,
    /// Number of sources that loaded successfully.
    pub loaded_sources: usize,
}

/// Builds a [`SkillTaxonomy`] from the built-in set plus any sources.
#[derive(Debug, Clone)]
pub struct TaxonomyLoader {
    sources: Vec<TaxonomySource>,
    include_builtin: bool,
}

impl Default for TaxonomyLoader {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            include_builtin: true,
        }
    }
}

impl TaxonomyLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source. Sources are read in the order given.
    pub fn source(mut self, source: TaxonomySource) -> Self {
        self.sources.push(source);
        self
    }

    /// Include the built-in skill set (default `true`).
    pub fn include_builtin(mut self, include: bool) -> Self {
        self.include_builtin = include;
        self
    }

    /// Read every source, skipping the ones that fail.
    pub fn load(&self) -> TaxonomyLoad {
        let mut labels: Vec<String> = Vec::new();
        if self.include_builtin {
            labels.extend(BUILTIN_SKILLS.iter().map(|s| s.to_string()));
        }

        let mut errors = Vec::new();
        let mut loaded_sources = 0;
        for source in &self.sources {
            match source.read_labels() {
                Ok(found) => {
                    debug!("Skill source {}: {} labels", source.describe(), found.len());
                    labels.extend(found);
                    loaded_sources += 1;
                }
                Err(e) => {
                    warn!("Skipping skill source: {e}");
                    errors.push(e);
                }
            }
        }

        let taxonomy = SkillTaxonomy::from_phrases(labels);
        info!(
            "Loaded {} skills from {}/{} sources{}",
            taxonomy.len(),
            loaded_sources,
            self.sources.len(),
            if self.include_builtin { " + built-in set" } else { "" }
        );
        TaxonomyLoad {
            taxonomy,
            errors,
            loaded_sources,
        }
    }
}

fn read_text(path: &Path) -> Result<String, TaxonomyLoadError> {
    let bytes = std::fs::read(path).map_err(|source| TaxonomyLoadError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text.strip_prefix('\u{feff}').unwrap_or(&text[..]).to_string())
}

fn labels_from_delimited(
    path: &Path,
    text: &str,
    delimiter: char,
    column: &str,
) -> Result<Vec<String>, TaxonomyLoadError> {
    let records = parse_delimited(text, delimiter).map_err(|(record, detail)| {
        TaxonomyLoadError::Malformed {
            path: path.to_path_buf(),
            record,
            detail,
        }
    })?;

    let mut rows = records.into_iter();
    let missing = || TaxonomyLoadError::MissingColumn {
        path: path.to_path_buf(),
        column: column.to_string(),
    };
    let header = rows.next().ok_or_else(missing)?;
    let idx = header
        .iter()
        .position(|h| h.trim() == column)
        .or_else(|| header.iter().position(|h| h.trim().eq_ignore_ascii_case(column)))
        .ok_or_else(missing)?;

    Ok(rows
        .filter_map(|mut row| (idx < row.len()).then(|| row.swap_remove(idx)))
        .filter(|label| !label.trim().is_empty())
        .collect())
}

/// Split delimited text into records of fields.
///
/// Double-quoted fields may contain the delimiter, newlines and `""`
/// escapes. Blank lines are skipped. An unterminated quote is an error
/// carrying the 1-based record number where the quote opened.
fn parse_delimited(text: &str, delimiter: char) -> Result<Vec<Vec<String>>, (usize, String)> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut field_started = false;
    let mut chars = text.chars().peekable();

    let finish_record = |record: &mut Vec<String>, records: &mut Vec<Vec<String>>| {
        let row = std::mem::take(record);
        if !(row.len() == 1 && row[0].trim().is_empty()) {
            records.push(row);
        }
    };

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }
        match c {
            '"' if !field_started => {
                in_quotes = true;
                field_started = true;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                record.push(std::mem::take(&mut field));
                field_started = false;
                finish_record(&mut record, &mut records);
            }
            c if c == delimiter => {
                record.push(std::mem::take(&mut field));
                field_started = false;
            }
            c => {
                field.push(c);
                field_started = true;
            }
        }
    }

    if in_quotes {
        return Err((records.len() + 1, "unterminated quoted field".to_string()));
    }
    if field_started || !record.is_empty() {
        record.push(field);
        finish_record(&mut record, &mut records);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn normalize_collapses_and_lowercases() {
        assert_eq!(normalize_phrase("  Machine   Learning "), Some("machine learning".into()));
        assert_eq!(normalize_phrase(" \t "), None);
    }

    #[test]
    fn taxonomy_is_sorted_and_deduplicated() {
        let tax = SkillTaxonomy::from_phrases(["SQL", "python", "sql ", "---", "Python"]);
        let phrases: Vec<&str> = tax.phrases().collect();
        assert_eq!(phrases, vec!["python", "sql"]);
        assert!(tax.contains("PYTHON"));
        assert!(!tax.contains("rust"));
    }

    #[test]
    fn builtin_set_is_usable() {
        let tax = SkillTaxonomy::builtin();
        assert_eq!(tax.len(), SkillTaxonomy::builtin_phrases().len());
        assert!(tax.contains("c++"));
        assert!(tax.contains("communication"));
    }

    #[test]
    fn parse_quoted_fields() {
        let rows = parse_delimited("a,b\n\"x, y\",\"say \"\"hi\"\"\"\r\n\n\"multi\nline\",z", ',')
            .unwrap();
        assert_eq!(
            rows,
            vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["x, y".to_string(), "say \"hi\"".to_string()],
                vec!["multi\nline".to_string(), "z".to_string()],
            ]
        );
    }

    #[test]
    fn parse_unterminated_quote_fails() {
        let err = parse_delimited("a\n\"open", ',').unwrap_err();
        assert_eq!(err.0, 2);
    }

    #[test]
    fn esco_source_reads_preferred_label() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "skills_en.csv",
            "\u{feff}conceptType,preferredLabel,altLabels\n\
             KnowledgeSkillCompetence,manage musical staff,\"a\nb\"\n\
             KnowledgeSkillCompetence,Python (computer programming),\n",
        );
        let labels = TaxonomySource::esco(&path).read_labels().unwrap();
        assert_eq!(labels, vec!["manage musical staff", "Python (computer programming)"]);
    }

    #[test]
    fn onet_source_reads_element_name() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "Skills.txt",
            "O*NET-SOC Code\tElement ID\tElement Name\n11-1011.00\t2.A.1.a\tReading Comprehension\n",
        );
        let labels = TaxonomySource::onet(&path).read_labels().unwrap();
        assert_eq!(labels, vec!["Reading Comprehension"]);
    }

    #[test]
    fn missing_column_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "bad.csv", "name,label\nx,y\n");
        let err = TaxonomySource::esco(&path).read_labels().unwrap_err();
        assert!(matches!(err, TaxonomyLoadError::MissingColumn { .. }));
        assert_eq!(err.path(), path.as_path());
    }

    #[test]
    fn loader_survives_a_failing_source() {
        let dir = TempDir::new().unwrap();
        let good = write(&dir, "skills.txt", "Rust\n\nKubernetes\n");
        let load = TaxonomyLoader::new()
            .include_builtin(false)
            .source(TaxonomySource::esco(dir.path().join("missing.csv")))
            .source(TaxonomySource::lines(&good))
            .load();
        assert_eq!(load.loaded_sources, 1);
        assert_eq!(load.errors.len(), 1);
        assert!(matches!(load.errors[0], TaxonomyLoadError::Unreadable { .. }));
        let phrases: Vec<&str> = load.taxonomy.phrases().collect();
        assert_eq!(phrases, vec!["kubernetes", "rust"]);
    }

    #[test]
    fn loader_with_no_sources_and_no_builtin_is_empty() {
        let load = TaxonomyLoader::new().include_builtin(false).load();
        assert!(load.taxonomy.is_empty());
        assert!(load.errors.is_empty());
    }

    #[test]
    fn inline_source_merges_with_builtin() {
        let load = TaxonomyLoader::new()
            .source(TaxonomySource::Inline(vec!["Terraform".into()]))
            .load();
        assert!(load.taxonomy.contains("terraform"));
        assert!(load.taxonomy.contains("python"));
    }
}
