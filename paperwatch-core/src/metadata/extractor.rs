use std::path::Path;

use lopdf::{Dictionary, Document, Object};
use tracing::{debug, warn};

use super::document::split_keywords;
use super::heuristics::{author_from_text, title_from_text};
use super::pdf_date::parse_pdf_date;
use super::DocumentMetadata;
use crate::{PaperwatchError, Result};

/// Pages whose text feeds the title/author heuristics.
pub const DEFAULT_TEXT_PAGE_LIMIT: u32 = 2;

/// Produces a [`DocumentMetadata`] record for a document on disk.
///
/// Implementations are synchronous; callers run them on a blocking thread.
pub trait MetadataExtractor: Send + Sync {
    /// Fails only when the document itself cannot be opened. Missing fields
    /// are reported as `None`.
    fn extract(&self, path: &Path) -> Result<DocumentMetadata>;
}

/// Extractor backed by `lopdf`.
#[derive(Debug, Clone)]
pub struct PdfMetadataExtractor {
    text_page_limit: u32,
}

impl Default for PdfMetadataExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfMetadataExtractor {
    pub fn new() -> Self {
        Self {
            text_page_limit: DEFAULT_TEXT_PAGE_LIMIT,
        }
    }

    pub fn with_text_page_limit(text_page_limit: u32) -> Self {
        Self {
            text_page_limit: text_page_limit.max(1),
        }
    }

    /// Plain text of the first `text_page_limit` pages, bounded by the real
    /// page count. Text that cannot be decoded yields an empty string.
    fn leading_text(&self, document: &Document, path: &Path) -> String {
        let pages: Vec<u32> = document
            .get_pages()
            .keys()
            .copied()
            .take(self.text_page_limit as usize)
            .collect();
        if pages.is_empty() {
            return String::new();
        }

        match document.extract_text(&pages) {
            Ok(text) => text,
            Err(err) => {
                warn!(path = %path.display(), "text extraction failed: {}", err);
                String::new()
            }
        }
    }
}

impl MetadataExtractor for PdfMetadataExtractor {
    fn extract(&self, path: &Path) -> Result<DocumentMetadata> {
        let document = Document::load(path).map_err(|err| PaperwatchError::UnreadableDocument {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;

        let info = info_dictionary(&document);
        let field = |key: &[u8]| info.and_then(|dict| text_entry(&document, dict, key));

        let mut metadata = DocumentMetadata {
            title: field(b"Title"),
            author: field(b"Author"),
            subject: field(b"Subject"),
            creator: field(b"Creator"),
            producer: field(b"Producer"),
            creation_date: field(b"CreationDate").as_deref().and_then(parse_pdf_date),
            modification_date: field(b"ModDate").as_deref().and_then(parse_pdf_date),
            keywords: field(b"Keywords")
                .map(|raw| split_keywords(&raw))
                .unwrap_or_default(),
        };

        if metadata.title.is_none() || metadata.author.is_none() {
            let text = self.leading_text(&document, path);
            debug!(
                path = %path.display(),
                chars = text.len(),
                "falling back to text heuristics"
            );
            if metadata.title.is_none() {
                metadata.title = title_from_text(&text);
            }
            if metadata.author.is_none() {
                metadata.author = author_from_text(&text);
            }
        }

        Ok(metadata)
    }
}

fn info_dictionary(document: &Document) -> Option<&Dictionary> {
    let info = document.trailer.get(b"Info").ok()?;
    resolve(document, info)?.as_dict().ok()
}

fn resolve<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => document.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Decoded, trimmed text value of `key`. Blank values count as absent.
fn text_entry(document: &Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    let object = resolve(document, dict.get(key).ok()?)?;
    let Object::String(bytes, _) = object else {
        return None;
    };
    let text = decode_text_string(bytes);
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Decode a PDF text string: UTF-16BE or UTF-8 when a byte order mark is
/// present, otherwise UTF-8 if valid, else Latin-1 (close to PDFDocEncoding).
fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(utf8) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(utf8).into_owned();
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&byte| char::from(byte)).collect(),
    }
}
