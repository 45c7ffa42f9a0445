//! Filename generation from document metadata.
//!
//! Generation is pure: the same metadata and template always produce the
//! same name and nothing touches the filesystem. Collision checks belong to
//! the caller.

pub mod journal;
pub mod sanitize;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metadata::DocumentMetadata;
pub use journal::resolve_journal;
pub use sanitize::sanitize;

pub const UNKNOWN_AUTHOR: &str = "Unknown_Author";
pub const UNKNOWN_TITLE: &str = "Unknown_Title";
pub const UNKNOWN_YEAR: &str = "Unknown_Year";

/// Field ordering used to build a filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NamingTemplate {
    #[default]
    AuthorTitleJournalYear,
    TitleAuthorYear,
    AuthorYearTitle,
    YearAuthorTitle,
    AuthorTitleYear,
}

impl NamingTemplate {
    /// Every template, in menu order.
    pub const ALL: [NamingTemplate; 5] = [
        NamingTemplate::AuthorTitleJournalYear,
        NamingTemplate::TitleAuthorYear,
        NamingTemplate::AuthorYearTitle,
        NamingTemplate::YearAuthorTitle,
        NamingTemplate::AuthorTitleYear,
    ];

    /// Stable identifier used in configuration and on the command line.
    pub fn id(&self) -> &'static str {
        match self {
            NamingTemplate::AuthorTitleJournalYear => "author-title-journal-year",
            NamingTemplate::TitleAuthorYear => "title-author-year",
            NamingTemplate::AuthorYearTitle => "author-year-title",
            NamingTemplate::YearAuthorTitle => "year-author-title",
            NamingTemplate::AuthorTitleYear => "author-title-year",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            NamingTemplate::AuthorTitleJournalYear => "firstauthor_title_journal_year.pdf",
            NamingTemplate::TitleAuthorYear => "title_firstauthor_year.pdf",
            NamingTemplate::AuthorYearTitle => "firstauthor_year_title.pdf",
            NamingTemplate::YearAuthorTitle => "year_firstauthor_title.pdf",
            NamingTemplate::AuthorTitleYear => "firstauthor_title_year.pdf",
        }
    }

    pub fn example_output(&self) -> &'static str {
        match self {
            NamingTemplate::AuthorTitleJournalYear => {
                "Smith_Machine_Learning_in_Biology_Nature_2023.pdf"
            }
            NamingTemplate::TitleAuthorYear => "Machine_Learning_in_Biology_Smith_2023.pdf",
            NamingTemplate::AuthorYearTitle => "Smith_2023_Machine_Learning_in_Biology.pdf",
            NamingTemplate::YearAuthorTitle => "2023_Smith_Machine_Learning_in_Biology.pdf",
            NamingTemplate::AuthorTitleYear => "Smith_Machine_Learning_in_Biology_2023.pdf",
        }
    }

    /// Filename stem for `metadata`, without extension.
    pub fn file_stem(&self, metadata: &DocumentMetadata) -> String {
        let NameFields {
            author,
            title,
            year,
            journal,
        } = NameFields::resolve(metadata, *self);

        let ordered: Vec<String> = match self {
            NamingTemplate::AuthorTitleJournalYear => {
                vec![author, title, journal.unwrap_or_default(), year]
            }
            NamingTemplate::TitleAuthorYear => vec![title, author, year],
            NamingTemplate::AuthorYearTitle => vec![author, year, title],
            NamingTemplate::YearAuthorTitle => vec![year, author, title],
            NamingTemplate::AuthorTitleYear => vec![author, title, year],
        };

        ordered.join("_")
    }

    fn uses_journal(&self) -> bool {
        matches!(self, NamingTemplate::AuthorTitleJournalYear)
    }
}

impl fmt::Display for NamingTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "unknown naming template '{0}' (expected one of: {known})",
    known = known_template_ids()
)]
pub struct UnknownTemplate(pub String);

fn known_template_ids() -> String {
    NamingTemplate::ALL.map(|template| template.id()).join(", ")
}

impl FromStr for NamingTemplate {
    type Err = UnknownTemplate;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        NamingTemplate::ALL
            .into_iter()
            .find(|template| template.id() == wanted)
            .ok_or_else(|| UnknownTemplate(s.to_string()))
    }
}

/// Display values shared by every template.
#[derive(Debug, Clone, PartialEq, Eq)]
struct NameFields {
    author: String,
    title: String,
    year: String,
    journal: Option<String>,
}

impl NameFields {
    fn resolve(metadata: &DocumentMetadata, template: NamingTemplate) -> Self {
        Self {
            author: sanitize(
                metadata
                    .first_author_surname()
                    .as_deref()
                    .unwrap_or(UNKNOWN_AUTHOR),
            ),
            title: sanitize(metadata.title.as_deref().unwrap_or(UNKNOWN_TITLE)),
            year: metadata
                .year_string()
                .unwrap_or_else(|| UNKNOWN_YEAR.to_string()),
            journal: template.uses_journal().then(|| resolve_journal(metadata)),
        }
    }
}

/// Build the target filename for `metadata` under `template`, keeping the
/// source file's `extension` (pass an empty string for none).
pub fn generate(metadata: &DocumentMetadata, template: NamingTemplate, extension: &str) -> String {
    let stem = template.file_stem(metadata);
    if extension.is_empty() {
        stem
    } else {
        format!("{stem}.{extension}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn complete() -> DocumentMetadata {
        DocumentMetadata {
            title: Some("Deep Learning for Genomics".into()),
            author: Some("Jane A. Smith".into()),
            subject: Some("Nature Communications".into()),
            creation_date: Some(
                FixedOffset::east_opt(0)
                    .unwrap()
                    .with_ymd_and_hms(2023, 3, 14, 12, 0, 0)
                    .unwrap(),
            ),
            ..Default::default()
        }
    }

    #[test]
    fn every_template_orders_fields() {
        let meta = complete();
        let expected = [
            (
                NamingTemplate::AuthorTitleJournalYear,
                "Smith_Deep_Learning_for_Genomics_Nature_Communications_2023.pdf",
            ),
            (
                NamingTemplate::TitleAuthorYear,
                "Deep_Learning_for_Genomics_Smith_2023.pdf",
            ),
            (
                NamingTemplate::AuthorYearTitle,
                "Smith_2023_Deep_Learning_for_Genomics.pdf",
            ),
            (
                NamingTemplate::YearAuthorTitle,
                "2023_Smith_Deep_Learning_for_Genomics.pdf",
            ),
            (
                NamingTemplate::AuthorTitleYear,
                "Smith_Deep_Learning_for_Genomics_2023.pdf",
            ),
        ];
        for (template, name) in expected {
            assert_eq!(generate(&meta, template, "pdf"), name, "{template}");
        }
    }

    #[test]
    fn missing_metadata_uses_placeholders() {
        let meta = DocumentMetadata::default();
        assert_eq!(
            generate(&meta, NamingTemplate::AuthorTitleJournalYear, "pdf"),
            "Unknown_Author_Unknown_Title_Unknown_Journal_Unknown_Year.pdf"
        );
        assert_eq!(
            generate(&meta, NamingTemplate::YearAuthorTitle, "pdf"),
            "Unknown_Year_Unknown_Author_Unknown_Title.pdf"
        );
    }

    #[test]
    fn generation_is_deterministic() {
        let meta = complete();
        for template in NamingTemplate::ALL {
            let first = generate(&meta, template, "pdf");
            let second = generate(&meta, template, "pdf");
            assert_eq!(first, second);
        }
    }

    #[test]
    fn keeps_original_extension_verbatim() {
        let meta = complete();
        assert!(generate(&meta, NamingTemplate::AuthorTitleYear, "PDF").ends_with("_2023.PDF"));
        assert_eq!(
            generate(&meta, NamingTemplate::AuthorTitleYear, ""),
            "Smith_Deep_Learning_for_Genomics_2023"
        );
    }

    #[test]
    fn fields_are_truncated_independently() {
        let meta = DocumentMetadata {
            title: Some("t".repeat(250)),
            author: Some("a".repeat(250)),
            ..Default::default()
        };
        let stem = NamingTemplate::AuthorTitleYear.file_stem(&meta);
        let parts: Vec<&str> = stem.split('_').collect();
        assert_eq!(parts[0].len(), 100);
        assert_eq!(parts[1].len(), 100);
        assert_eq!(stem.len(), 100 + 1 + 100 + 1 + "Unknown_Year".len());
    }

    #[test]
    fn parses_identifiers() {
        for template in NamingTemplate::ALL {
            assert_eq!(template.id().parse::<NamingTemplate>(), Ok(template));
        }
        assert_eq!(
            "Author_Year_Title".parse::<NamingTemplate>(),
            Ok(NamingTemplate::AuthorYearTitle)
        );
        assert!("title-only".parse::<NamingTemplate>().is_err());
    }

    #[test]
    fn unknown_template_lists_the_known_ones() {
        let err = "title-only".parse::<NamingTemplate>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown naming template 'title-only' (expected one of: author-title-journal-year, \
             title-author-year, author-year-title, year-author-title, author-title-year)"
        );
    }

    #[test]
    fn serde_uses_identifiers() {
        let json = serde_json::to_string(&NamingTemplate::TitleAuthorYear).unwrap();
        assert_eq!(json, "\"title-author-year\"");
        let back: NamingTemplate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, NamingTemplate::TitleAuthorYear);
    }
}
