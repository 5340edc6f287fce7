//! Post-processing: deterministic cleanup of raw OCR text.
//!
//! OCR engines produce a handful of recurring artefacts on posting images:
//!
//! - stray control bytes and non-ASCII glyph guesses
//! - words split into letters, e.g. `S o f t w a r e`, when the engine
//!   sees generous letter-spacing as word gaps
//! - words merged across a boundary, e.g. `SoftwareEngineer`, when a line
//!   break or narrow gap was missed
//! - ragged whitespace and runs of blank lines
//!
//! [`clean_text`] fixes these with five cheap rules. It is a total function
//! and idempotent: `clean_text(&clean_text(t)) == clean_text(t)`.
//!
//! ## Rule Order
//!
//! Unprintable characters go first so they cannot hide a split word. Letter
//! runs are merged before case-boundary splitting so that a re-assembled
//! `SoftwareEngineer` is split again into two words. Whitespace is
//! normalised last so the earlier rules see the original gaps.

/// Minimum number of consecutive single letters treated as one split word.
///
/// Two single letters in a row ("a I") happen in ordinary prose; three or
/// more almost never do.
const MIN_SPLIT_RUN: usize = 3;

/// Apply all cleanup rules to raw recogniser output.
///
/// Rules (applied in order):
/// 1. Strip characters outside printable ASCII, keeping `\n`, `\r` and `\t`
/// 2. Merge runs of 3+ single letters separated by spaces (`S o f t` → `Soft`)
/// 3. Insert a space at a lowercase→uppercase word boundary (`SoftwareEngineer` → `Software Engineer`)
/// 4. Collapse horizontal whitespace to one space and blank-line runs to one newline
/// 5. Trim leading and trailing whitespace
///
/// Rule 1 keeps `\t` only so rule 2 can see tab-separated letters; rule 4
/// turns every tab into a space, so tabs never reach the output.
///
/// The result contains no control characters other than `\n`, no double
/// spaces and no double newlines.
pub fn clean_text(raw: &str) -> String {
    let s = strip_unprintable(raw);
    let s = merge_split_letters(&s);
    let s = split_case_boundaries(&s);
    let s = collapse_whitespace(&s);
    s.trim().to_string()
}

// ── Rule 1: Strip unprintable characters ─────────────────────────────────────

fn strip_unprintable(input: &str) -> String {
    input
        .chars()
        .filter(|&c| matches!(c, ' '..='~' | '\n' | '\r' | '\t'))
        .collect()
}

// ── Rule 2: Merge letter-spaced words ────────────────────────────────────────

fn is_horizontal_space(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// An alphanumeric character with no alphanumeric neighbour on either side.
fn is_single(chars: &[char], i: usize) -> bool {
    let alnum = |j: usize| chars[j].is_ascii_alphanumeric();
    alnum(i) && (i == 0 || !alnum(i - 1)) && (i + 1 == chars.len() || !alnum(i + 1))
}

fn merge_split_letters(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let n = chars.len();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < n {
        if is_single(&chars, i) {
            let mut run = vec![i];
            let mut last = i;
            loop {
                let mut k = last + 1;
                while k < n && is_horizontal_space(chars[k]) {
                    k += 1;
                }
                if k > last + 1 && k < n && is_single(&chars, k) {
                    run.push(k);
                    last = k;
                } else {
                    break;
                }
            }
            if run.len() >= MIN_SPLIT_RUN {
                out.extend(run.iter().map(|&p| chars[p]));
                i = last + 1;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }

    out
}

// ── Rule 3: Split merged words at case boundaries ────────────────────────────

/// Insert a space before an uppercase letter that follows two lowercase
/// letters and is itself followed by a lowercase letter.
///
/// Requiring two lowercase letters on the left and one on the right keeps
/// `iPhone`, `McDonald` and acronyms such as `PostgreSQL` intact and never
/// produces a one-letter word, which would otherwise feed back into rule 2.
fn split_case_boundaries(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 16);

    for (i, &c) in chars.iter().enumerate() {
        let boundary = i >= 2
            && c.is_ascii_uppercase()
            && chars[i - 1].is_ascii_lowercase()
            && chars[i - 2].is_ascii_lowercase()
            && chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
        if boundary {
            out.push(' ');
        }
        out.push(c);
    }

    out
}

// ── Rule 4: Normalise whitespace ─────────────────────────────────────────────

fn collapse_whitespace(input: &str) -> String {
    let unified = input.replace("\r\n", "\n").replace('\r', "\n");
    unified
        .split('\n')
        .map(|line| {
            line.split(is_horizontal_space)
                .filter(|w| !w.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Tests ────────────────────────────────────────────────────────────────────
