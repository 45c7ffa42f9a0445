use chrono::{DateTime, Datelike, FixedOffset};
use serde::Serialize;

/// Separators tried in priority order when isolating the first author.
const AUTHOR_SEPARATORS: [&str; 5] = [",", ";", " and ", " & ", "\n"];

/// Metadata recovered from a single document. Every field is optional; the
/// naming pipeline has a fallback for each one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    /// Raw author string, possibly listing several authors.
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<DateTime<FixedOffset>>,
    pub modification_date: Option<DateTime<FixedOffset>>,
    pub keywords: Vec<String>,
}

impl DocumentMetadata {
    /// Surname-like token of the first listed author.
    ///
    /// The first separator (in [`AUTHOR_SEPARATORS`] order) present in the
    /// author string splits it; the first non-empty segment is the first
    /// author and its last whitespace-separated component is the surname.
    pub fn first_author_surname(&self) -> Option<String> {
        let author = self.author.as_deref()?.trim();
        if author.is_empty() {
            return None;
        }

        for separator in AUTHOR_SEPARATORS {
            if author.contains(separator) {
                let first = author.split(separator).next().unwrap_or_default().trim();
                if !first.is_empty() {
                    return Some(last_name(first));
                }
            }
        }

        Some(last_name(author))
    }

    /// Four digit year of the creation date, in the document's own offset.
    pub fn year_string(&self) -> Option<String> {
        self.creation_date
            .map(|date| format!("{:04}", date.year()))
    }

    /// Returns `true` if no field carries a value.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.author.is_none()
            && self.subject.is_none()
            && self.creator.is_none()
            && self.producer.is_none()
            && self.creation_date.is_none()
            && self.modification_date.is_none()
            && self.keywords.is_empty()
    }
}

/// Split a raw `/Keywords` value on `,` and `;`, dropping empty entries.
pub(crate) fn split_keywords(raw: &str) -> Vec<String> {
    raw.split([',', ';'])
        .map(str::trim)
        .filter(|keyword| !keyword.is_empty())
        .map(str::to_string)
        .collect()
}

fn last_name(full_name: &str) -> String {
    let components: Vec<&str> = full_name.split_whitespace().collect();
    match components.as_slice() {
        [.., last] if components.len() >= 2 => (*last).to_string(),
        _ => full_name.to_string(),
    }
}
