/// Characters that never appear in a generated name.
pub const INVALID_FILENAME_CHARS: [char; 9] = ['/', '<', '>', ':', '"', '|', '\\', '?', '*'];

/// Per-field length cap, in characters.
pub const MAX_FIELD_CHARS: usize = 100;

/// Placeholder for a field that sanitizes to nothing.
pub const EMPTY_FIELD: &str = "Unknown";

/// Turn free text into a filename field.
///
/// Invalid characters are removed, the remaining text is split on whitespace,
/// punctuation is trimmed from both ends of each word and the surviving words
/// are joined with `_`. Empty results become [`EMPTY_FIELD`]; anything longer
/// than [`MAX_FIELD_CHARS`] is cut.
pub fn sanitize(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .filter(|c| !INVALID_FILENAME_CHARS.contains(c) && (!c.is_control() || c.is_whitespace()))
        .collect();

    let joined = cleaned
        .split_whitespace()
        .map(|word| word.trim_matches(is_punctuation))
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("_");

    if joined.is_empty() {
        return EMPTY_FIELD.to_string();
    }

    joined.chars().take(MAX_FIELD_CHARS).collect()
}

/// Punctuation in the Unicode sense: ASCII symbols such as `+`, `=` or `$`
/// are kept, dashes, quotes, brackets and the like are not.
fn is_punctuation(c: char) -> bool {
    if c.is_ascii() {
        return c.is_ascii_punctuation()
            && !matches!(c, '$' | '+' | '<' | '=' | '>' | '^' | '`' | '|' | '~');
    }
    matches!(
        c,
        '\u{00A1}' | '\u{00A7}' | '\u{00AB}' | '\u{00B6}' | '\u{00B7}' | '\u{00BB}' | '\u{00BF}'
            | '\u{2010}'..='\u{2027}'
            | '\u{2030}'..='\u{205E}'
            | '\u{3001}'..='\u{3003}'
            | '\u{3008}'..='\u{3011}'
    )
}
