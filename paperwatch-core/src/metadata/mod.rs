//! Best-effort metadata extraction for incoming documents.
//!
//! Structured fields come from the PDF `/Info` dictionary. When the title or
//! author is missing we fall back to scanning the text of the first pages,
//! see [`heuristics`].

mod document;
mod extractor;
pub mod heuristics;
mod pdf_date;

pub use document::DocumentMetadata;
pub use extractor::{MetadataExtractor, PdfMetadataExtractor, DEFAULT_TEXT_PAGE_LIMIT};
pub use pdf_date::parse_pdf_date;
