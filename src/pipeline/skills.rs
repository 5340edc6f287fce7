//! Skill matching: scan posting text against the skill taxonomy.
//!
//! Both the text and every taxonomy phrase are reduced to the same token
//! alphabet (lowercase ASCII letters, digits, `+` and `#`), so `C++`,
//! `c#` and `Node.js` survive tokenisation and case never matters.
//!
//! A phrase matches when:
//! * **(a)** its tokens appear as a contiguous run in the text, or its
//!   compact form (`node.js` → `nodejs`) equals one token or two/three
//!   adjacent tokens glued together (`Java Script` → `javascript`); or
//! * **(b)** in [`MatchStrictness::Loose`] only, any significant word of a
//!   multi-word phrase appears anywhere in the text.
//!
//! Rule (b) recovers skills whose other words were mangled by OCR, and it
//! also credits unrelated phrases that share a word with the posting.
//! [`MatchStrictness::Phrase`] turns it off.
//!
//! A single token that only ever occurs inside a glued run matching a
//! longer taxonomy key does not count on its own: `Java Script` credits
//! `javascript`, not `java`.

use crate::config::MatchStrictness;
use crate::taxonomy::{SkillEntry, SkillTaxonomy};
use std::collections::HashSet;

/// Longest run of adjacent tokens glued together for compact-form matching.
const MAX_GLUED_TOKENS: usize = 3;

/// Words too generic to credit a phrase on their own in loose mode.
const STOPWORDS: &[&str] = &[
    "all", "and", "any", "are", "for", "from", "into", "its", "not", "other", "our", "per",
    "the", "their", "use", "using", "via", "with", "within", "your",
];

/// Shortest word that can credit a phrase on its own in loose mode.
const MIN_FALLBACK_WORD_LEN: usize = 3;

/// Lowercase `text` and split it into skill tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let mapped: String = text
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '+' | '#' => c,
            _ => ' ',
        })
        .collect();
    mapped.split_whitespace().map(str::to_string).collect()
}

/// Compact form of a phrase: its tokens concatenated.
pub fn compact(tokens: &[String]) -> String {
    tokens.concat()
}

/// Every taxonomy phrase found in `text`, deduplicated and sorted.
///
/// The result is always a subset of `taxonomy`. Empty text yields nothing.
pub fn match_skills(text: &str, taxonomy: &SkillTaxonomy, strictness: MatchStrictness) -> Vec<String> {
    if text.trim().is_empty() || taxonomy.is_empty() {
        return Vec::new();
    }
    let index = TextIndex::new(text, taxonomy);
    // Taxonomy entries are stored sorted and unique, so the filtered
    // sequence is already in the documented order.
    taxonomy
        .entries()
        .iter()
        .filter(|entry| index.matches(entry, strictness))
        .map(|entry| entry.phrase().to_string())
        .collect()
}

/// Token views of one input text, built once per call.
struct TextIndex {
    tokens: Vec<String>,
    /// Tokens with at least one occurrence outside a glued taxonomy key.
    words: HashSet<String>,
    glued: HashSet<String>,
}

impl TextIndex {
    fn new(text: &str, taxonomy: &SkillTaxonomy) -> Self {
        let tokens = tokenize(text);
        let keys: HashSet<&str> = taxonomy.entries().iter().map(SkillEntry::compact).collect();

        let mut glued = HashSet::new();
        let mut covered = vec![false; tokens.len()];
        for n in 2..=MAX_GLUED_TOKENS {
            for (start, window) in tokens.windows(n).enumerate() {
                let key = window.concat();
                if keys.contains(key.as_str()) {
                    covered[start..start + n].iter_mut().for_each(|c| *c = true);
                }
                glued.insert(key);
            }
        }
        let words = tokens
            .iter()
            .zip(&covered)
            .filter(|(_, &c)| !c)
            .map(|(t, _)| t.clone())
            .collect();

        Self {
            tokens,
            words,
            glued,
        }
    }

    fn matches(&self, entry: &SkillEntry, strictness: MatchStrictness) -> bool {
        self.phrase_match(entry)
            || (strictness == MatchStrictness::Loose && self.word_match(entry))
    }

    /// Rule (a): contiguous tokens, or the compact form.
    fn phrase_match(&self, entry: &SkillEntry) -> bool {
        let tokens = entry.tokens();
        if tokens.is_empty() {
            return false;
        }
        let key = entry.compact();
        if tokens.len() == 1 {
            return self.words.contains(key) || self.glued.contains(key);
        }
        self.tokens.windows(tokens.len()).any(|w| w == tokens) || self.glued.contains(key)
    }

    /// Rule (b): any significant word of a multi-word phrase.
    fn word_match(&self, entry: &SkillEntry) -> bool {
        let tokens = entry.tokens();
        tokens.len() > 1
            && tokens
                .iter()
                .any(|t| is_significant(t) && self.words.contains(t))
    }
}

fn is_significant(word: &str) -> bool {
    word.len() >= MIN_FALLBACK_WORD_LEN && !STOPWORDS.contains(&word)
}
