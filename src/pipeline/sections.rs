//! Section extraction: title, company and qualifications from posting text.
//!
//! Each field is recovered by an ordered table of [`Rule`]s. Rules are tried
//! in order and the first one that yields an acceptable, non-empty value
//! wins. When nothing matches, the field keeps its documented default from
//! [`JobSections::defaults`]. Extraction never fails.

use crate::output::JobSections;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// One named pattern; capture group 1 is the extracted value.
struct Rule {
    name: &'static str,
    pattern: &'static Lazy<Regex>,
}

/// Extract structured sections from (canonical) posting text.
///
/// Horizontal whitespace is collapsed first, so raw recogniser output and
/// canonical text give the same answer. `description` is that collapsed
/// text, whatever else matched.
pub fn extract_sections(text: &str) -> JobSections {
    let text = collapse_horizontal(text);
    let mut sections = JobSections::defaults(text.clone());

    if let Some(title) = first_match("title", TITLE_RULES, &text, |_| true) {
        sections.title = title;
    }
    if let Some(company) = first_match("company", COMPANY_RULES, &text, is_company_name) {
        sections.company = company;
    }
    if let Some(quals) = first_match("qualifications", QUALIFICATION_RULES, &text, |_| true) {
        sections.qualifications = quals;
    }

    sections
}

static RE_HSPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());

fn collapse_horizontal(text: &str) -> String {
    text.lines()
        .map(|line| RE_HSPACE.replace_all(line.trim(), " ").into_owned())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Run `rules` in order; return the first accepted capture.
fn first_match(
    field: &str,
    rules: &[Rule],
    text: &str,
    accept: impl Fn(&str) -> bool,
) -> Option<String> {
    for rule in rules {
        for caps in rule.pattern.captures_iter(text) {
            let Some(m) = caps.get(1) else { continue };
            let value = tidy_value(m.as_str());
            if !value.is_empty() && accept(&value) {
                debug!("{field}: rule '{}' matched {:?}", rule.name, value);
                return Some(value);
            }
        }
    }
    debug!("{field}: no rule matched, using default");
    None
}

/// Trim whitespace and trailing punctuation left over from the sentence.
fn tidy_value(raw: &str) -> String {
    raw.trim()
        .trim_end_matches(|c: char| matches!(c, '!' | '?' | ',' | ';' | ':' | '.'))
        .trim_end()
        .to_string()
}

// ── Title ────────────────────────────────────────────────────────────────────

static RE_TITLE_UPPER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*([A-Z][A-Z ]*?(?:DEVELOPER|ENGINEER|ANALYST|SPECIALIST|MANAGER))\b")
        .unwrap()
});

static RE_TITLE_LABELLED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[ \t]*(?:job[ \t]+title|position)[ \t]*:[ \t]*([^\n]+)").unwrap()
});

static RE_TITLE_CASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[ \t]*((?:[A-Z][a-z]+[ \t]+){0,4}(?:Developer|Engineer|Analyst|Specialist|Manager))\b",
    )
    .unwrap()
});

static TITLE_RULES: &[Rule] = &[
    Rule {
        name: "uppercase role line",
        pattern: &RE_TITLE_UPPER,
    },
    Rule {
        name: "labelled title",
        pattern: &RE_TITLE_LABELLED,
    },
    Rule {
        name: "title-case role line",
        pattern: &RE_TITLE_CASE,
    },
];

// ── Company ──────────────────────────────────────────────────────────────────

static RE_COMPANY_JOIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?i:join)[ \t]+(?:(?i:us[ \t]+at)[ \t]+)?([A-Z][A-Za-z0-9&.\-]*(?:[ \t]+(?:[A-Z][A-Za-z0-9&.\-]*|&))*)",
    )
    .unwrap()
});

static RE_COMPANY_HIRING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b([A-Z][A-Za-z0-9&.\-]*(?:[ \t]+[A-Z][A-Za-z0-9&.\-]*)*)(?:[ \t]+|[ \t]*\n[ \t]*)(?i:is[ \t]+(?:now[ \t]+)?(?:hiring|looking))\b",
    )
    .unwrap()
});

static RE_COMPANY_LABELLED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^[ \t]*company[ \t]*:[ \t]*([^\n]+)").unwrap());

/// A short capitalised line directly above a line that opens with a hiring phrase.
static RE_COMPANY_LINE_ABOVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[ \t]*([A-Z][A-Za-z0-9&.,'\-]*(?:[ \t]+[A-Za-z0-9&.,'\-]+){0,4})[ \t]*\n[ \t]*(?i:join|(?:is[ \t]+)?(?:now[ \t]+)?(?:hiring|looking))\b",
    )
    .unwrap()
});

static RE_COMPANY_BEFORE_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?im)^[ \t]*([a-z][a-z0-9 &.\-]*?)[ \t]+(?:(?:is[ \t]+)?(?:now[ \t]+)?(?:hiring|looking)|join)\b",
    )
    .unwrap()
});

static COMPANY_RULES: &[Rule] = &[
    Rule {
        name: "join <name>",
        pattern: &RE_COMPANY_JOIN,
    },
    Rule {
        name: "<name> is hiring",
        pattern: &RE_COMPANY_HIRING,
    },
    Rule {
        name: "labelled company",
        pattern: &RE_COMPANY_LABELLED,
    },
    Rule {
        name: "name line above hiring phrase",
        pattern: &RE_COMPANY_LINE_ABOVE,
    },
    Rule {
        name: "text before hiring keyword",
        pattern: &RE_COMPANY_BEFORE_KEYWORD,
    },
];

/// Words that open a hiring phrase but never a company name
/// ("Join Us Today", "Currently hiring", "is hiring").
const NOT_A_COMPANY: &[&str] = &[
    "a", "an", "apply", "currently", "hiring", "immediately", "is", "join", "looking", "now",
    "our", "the", "team", "today", "urgently", "us", "we", "we're",
];

/// Role nouns; a line naming a role is a title, not a company.
const ROLE_WORDS: &[&str] = &["analyst", "developer", "engineer", "manager", "specialist"];

fn is_company_name(value: &str) -> bool {
    let mut words = value.split_whitespace().map(str::to_ascii_lowercase);
    let Some(first) = words.next() else {
        return false;
    };
    !NOT_A_COMPANY.contains(&first.as_str())
        && !std::iter::once(first)
            .chain(words)
            .any(|w| ROLE_WORDS.contains(&w.trim_end_matches('s')))
}

// ── Qualifications ───────────────────────────────────────────────────────────

static RE_QUALIFICATIONS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)\b(?:qualifications?|requirements?|skills?|experience)\b[ \t]*:?[ \t\n]*(.+?)(?:\n[ \t]*\n|https?://|www\.|$)",
    )
    .unwrap()
});

static QUALIFICATION_RULES: &[Rule] = &[Rule {
    name: "section header",
    pattern: &RE_QUALIFICATIONS,
}];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{DEFAULT_COMPANY, DEFAULT_TITLE};

    #[test]
    fn scenario_posting_banner() {
        let s = extract_sections(
            "SOFTWARE ENGINEER  Join Acme Corp today! Requirements: Python, SQL, communication",
        );
        assert_eq!(s.title, "SOFTWARE ENGINEER");
        assert_eq!(s.company, "Acme Corp");
        assert!(s.qualifications.contains("Python, SQL, communication"));
        assert_eq!(
            s.description,
            "SOFTWARE ENGINEER Join Acme Corp today! Requirements: Python, SQL, communication"
        );
    }

    #[test]
    fn unmatched_text_uses_defaults() {
        let s = extract_sections("lorem ipsum dolor sit amet");
        assert_eq!(s.title, DEFAULT_TITLE);
        assert_eq!(s.company, DEFAULT_COMPANY);
        assert_eq!(s.qualifications, "");
        assert_eq!(s.description, "lorem ipsum dolor sit amet");
    }

    #[test]
    fn empty_text_is_all_defaults() {
        let s = extract_sections("");
        assert_eq!(s.title, DEFAULT_TITLE);
        assert_eq!(s.company, DEFAULT_COMPANY);
        assert_eq!(s.description, "");
    }

    #[test]
    fn uppercase_title_takes_priority() {
        let s = extract_sections("Position: Intern\nSENIOR DATA ANALYST\nmore text");
        assert_eq!(s.title, "SENIOR DATA ANALYST");
    }

    #[test]
    fn labelled_title() {
        let s = extract_sections("Job Title: Backend Wizard\nCompany: Initech");
        assert_eq!(s.title, "Backend Wizard");
        assert_eq!(s.company, "Initech");
    }

    #[test]
    fn title_case_title() {
        let s = extract_sections("Senior Data Engineer\nGreat benefits");
        assert_eq!(s.title, "Senior Data Engineer");
    }

    #[test]
    fn is_hiring_company() {
        let s = extract_sections("Globex Corporation is hiring a cloud engineer.");
        assert_eq!(s.company, "Globex Corporation");
    }

    #[test]
    fn join_us_is_not_a_company() {
        let s = extract_sections("Join Us Today\nHooli is now hiring");
        assert_eq!(s.company, "Hooli");
    }

    #[test]
    fn join_us_at_name() {
        let s = extract_sections("Join us at Pied Piper and build things");
        assert_eq!(s.company, "Pied Piper");
    }

    #[test]
    fn lowercase_text_before_keyword() {
        let s = extract_sections("vandelay industries is looking for you");
        assert_eq!(s.company, "vandelay industries");
    }

    #[test]
    fn name_on_line_above_is_hiring() {
        let s = extract_sections("Globex Corporation\nis hiring\nRequirements: SQL");
        assert_eq!(s.company, "Globex Corporation");
    }

    #[test]
    fn name_on_line_above_join() {
        let s = extract_sections("Acme Corp\nJoin our team");
        assert_eq!(s.company, "Acme Corp");
    }

    #[test]
    fn name_on_line_above_hiring_now() {
        let s = extract_sections("Initech\nHiring now: Data Analyst");
        assert_eq!(s.company, "Initech");
    }

    #[test]
    fn role_line_above_join_is_not_a_company() {
        let s = extract_sections("SOFTWARE ENGINEER\nJoin our team");
        assert_eq!(s.company, DEFAULT_COMPANY);
    }

    #[test]
    fn leading_adverbs_are_not_companies() {
        for text in [
            "Currently hiring engineers",
            "Urgently Looking for a Python Developer",
            "is hiring",
        ] {
            assert_eq!(extract_sections(text).company, DEFAULT_COMPANY, "{text}");
        }
    }

    #[test]
    fn cleaned_multiline_layouts() {
        use crate::pipeline::postprocess::clean_text;
        let company = |t: &str| extract_sections(&clean_text(t)).company;
        assert_eq!(company("Globex  Corporation\n\n is hiring\n"), "Globex Corporation");
        assert_eq!(company("Acme Corp\r\nJoin our team"), "Acme Corp");
    }

    #[test]
    fn qualifications_stop_at_url() {
        let s = extract_sections("Qualifications: Rust, Go, Kubernetes https://jobs.example.com apply");
        assert_eq!(s.qualifications, "Rust, Go, Kubernetes");
    }

    #[test]
    fn qualifications_stop_at_blank_line() {
        let s = extract_sections("Skills:\nExcel, Tableau\n\nAbout us: a great place");
        assert_eq!(s.qualifications, "Excel, Tableau");
    }

    #[test]
    fn raw_and_canonical_agree() {
        let raw = extract_sections("DATA  ANALYST\t\nRequirements:   SQL");
        let canonical = extract_sections("DATA ANALYST\nRequirements: SQL");
        assert_eq!(raw, canonical);
    }
}
