use super::sanitize::sanitize;
use crate::metadata::DocumentMetadata;

/// Publisher names looked for in the `Producer` field, in priority order.
pub const PUBLISHER_HINTS: [&str; 9] = [
    "IEEE", "ACM", "Nature", "Science", "Cell", "PLOS", "Elsevier", "Springer", "Wiley",
];

/// Words in a title that suggest it names a venue.
pub const VENUE_KEYWORDS: [&str; 5] =
    ["journal", "proceedings", "transactions", "letters", "review"];

pub const UNKNOWN_JOURNAL: &str = "Unknown_Journal";

/// Best guess at the venue a document was published in, sanitized.
///
/// Order: the subject field, a publisher named in the producer, a venue
/// keyword in the title together with its neighbouring words.
pub fn resolve_journal(metadata: &DocumentMetadata) -> String {
    if let Some(subject) = metadata.subject.as_deref().filter(|s| !s.is_empty()) {
        return sanitize(subject);
    }

    if let Some(producer) = metadata.producer.as_deref() {
        let producer = producer.to_lowercase();
        if let Some(hint) = PUBLISHER_HINTS
            .iter()
            .find(|hint| producer.contains(&hint.to_lowercase()))
        {
            return sanitize(hint);
        }
    }

    if let Some(window) = metadata.title.as_deref().and_then(venue_window) {
        return sanitize(&window);
    }

    UNKNOWN_JOURNAL.to_string()
}

/// The first venue keyword found in `title`, plus one word either side,
/// clamped at the ends of the title.
fn venue_window(title: &str) -> Option<String> {
    let lowered = title.to_lowercase();
    let words: Vec<&str> = title.split_whitespace().collect();

    for keyword in VENUE_KEYWORDS {
        if !lowered.contains(keyword) {
            continue;
        }
        if let Some(index) = words
            .iter()
            .position(|word| word.to_lowercase().contains(keyword))
        {
            let start = index.saturating_sub(1);
            let end = (index + 1).min(words.len() - 1);
            return Some(words[start..=end].join(" "));
        }
    }

    None
}
