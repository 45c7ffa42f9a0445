//! Text heuristics used when the `/Info` dictionary lacks a title or author.
//!
//! Both scanners work on the trimmed, non-empty lines of the extracted text.

use once_cell::sync::Lazy;
use regex::Regex;

/// Number of leading lines considered as title candidates.
const TITLE_SCAN_LINES: usize = 10;
/// Exclusive upper bound on the line index of an author candidate.
const AUTHOR_SCAN_LINES: usize = 15;

static LEADING_NUMBER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\s*").expect("leading number regex should compile"));
static COLLAPSE_WHITESPACE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex should compile"));
static FULL_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z][a-z]+ [A-Z][a-z]+").expect("full name regex should compile")
});
static INITIAL_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z]\. [A-Z][a-z]+").expect("initial name regex should compile")
});
static AND_TOKEN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\band\b").expect("and token regex should compile"));

fn content_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|line| !line.is_empty())
}

/// First plausible title among the leading lines of `text`.
///
/// A candidate is strictly between 10 and 200 characters long and carries no
/// `@` or `http`. Leading numbering is stripped and whitespace collapsed; a
/// cleaned line of 10 characters or fewer is skipped.
pub fn title_from_text(text: &str) -> Option<String> {
    for line in content_lines(text).take(TITLE_SCAN_LINES) {
        let length = line.chars().count();
        if length <= 10 || length >= 200 || line.contains('@') || line.contains("http") {
            continue;
        }

        let without_number = LEADING_NUMBER_REGEX.replace(line, "");
        let collapsed = COLLAPSE_WHITESPACE_REGEX.replace_all(&without_number, " ");
        let cleaned = collapsed.trim();

        if cleaned.chars().count() > 10 {
            return Some(cleaned.to_string());
        }
    }

    None
}

/// First line after the opening one that looks like an author byline.
///
/// Accepts lines of 5 to 100 characters that start with `Firstname Lastname`,
/// start with `F. Lastname`, or contain the word `and`.
pub fn author_from_text(text: &str) -> Option<String> {
    content_lines(text)
        .enumerate()
        .take(AUTHOR_SCAN_LINES)
        .skip(1)
        .find(|(_, line)| {
            let length = line.chars().count();
            (5..=100).contains(&length)
                && (FULL_NAME_REGEX.is_match(line)
                    || INITIAL_NAME_REGEX.is_match(line)
                    || AND_TOKEN_REGEX.is_match(line))
        })
        .map(|(_, line)| line.to_string())
}
