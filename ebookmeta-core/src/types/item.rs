//! The domain record filled from canonical properties

use super::property::DeclaredType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Bibliographic record for one ebook
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EbookPropertyItem {
    /// File the record was read from
    pub file: Option<PathBuf>,
    pub mime_type: Option<String>,

    pub authors: Vec<String>,
    pub title: Option<String>,
    pub genre: Option<String>,
    pub series_name: Option<String>,
    /// Kept as text: indices like "2.5" are common
    pub series_index: Option<String>,
    pub rating: Option<f32>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub publisher: Option<String>,
    pub isbn: Option<String>,
    pub uuid: Option<String>,
    pub rights: Option<String>,
    pub keywords: Vec<String>,
    pub age_suggestion: Option<String>,
    pub creation_date: Option<DateTime<Utc>>,
    pub publication_date: Option<DateTime<Utc>>,
    pub modification_date: Option<DateTime<Utc>>,
    /// Format-specific cover reference (manifest id, page index)
    pub cover_ref: Option<String>,
}

impl EbookPropertyItem {
    pub fn new(file: impl Into<PathBuf>, mime_type: impl Into<String>) -> Self {
        Self {
            file: Some(file.into()),
            mime_type: Some(mime_type.into()),
            ..Self::default()
        }
    }

    /// Reset every field derived from metadata, keeping file identity
    pub fn clear_derived(&mut self) {
        *self = Self {
            file: self.file.take(),
            mime_type: self.mime_type.take(),
            ..Self::default()
        };
    }

    /// Display value of a field by its schema key
    pub fn field_value(&self, key: &str) -> Option<String> {
        let text = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
        let list = |v: &Vec<String>| Some(v.join(", ")).filter(|s| !s.is_empty());
        let date = |v: &Option<DateTime<Utc>>| v.map(|d| d.format("%Y-%m-%d").to_string());

        match key {
            "author" => list(&self.authors),
            "title" => text(&self.title),
            "genre" => text(&self.genre),
            "seriesName" => text(&self.series_name),
            "seriesIndex" => text(&self.series_index),
            "rating" => self.rating.map(|r| r.to_string()),
            "description" => text(&self.description),
            "language" => text(&self.language),
            "publisher" => text(&self.publisher),
            "isbn" => text(&self.isbn),
            "uuid" => text(&self.uuid),
            "rights" => text(&self.rights),
            "keywords" => list(&self.keywords),
            "ageSuggestion" => text(&self.age_suggestion),
            "creationDate" => date(&self.creation_date),
            "publicationDate" => date(&self.publication_date),
            "modificationDate" => date(&self.modification_date),
            "cover" => text(&self.cover_ref),
            _ => None,
        }
    }
}

/// One entry of the static record schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemField {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: DeclaredType,
}

const fn field(key: &'static str, label: &'static str, kind: DeclaredType) -> ItemField {
    ItemField { key, label, kind }
}

/// Record schema in display order; keys match canonical names
pub const ITEM_FIELDS: &[ItemField] = &[
    field("title", "Title", DeclaredType::String),
    field("author", "Author", DeclaredType::String),
    field("seriesName", "Series", DeclaredType::String),
    field("seriesIndex", "Series Index", DeclaredType::String),
    field("genre", "Genre", DeclaredType::String),
    field("rating", "Rating", DeclaredType::Integer),
    field("description", "Description", DeclaredType::String),
    field("language", "Language", DeclaredType::String),
    field("publisher", "Publisher", DeclaredType::String),
    field("isbn", "ISBN", DeclaredType::String),
    field("uuid", "UUID", DeclaredType::String),
    field("rights", "Rights", DeclaredType::String),
    field("keywords", "Keywords", DeclaredType::String),
    field("ageSuggestion", "Age Suggestion", DeclaredType::String),
    field("creationDate", "Created", DeclaredType::Date),
    field("publicationDate", "Published", DeclaredType::Date),
    field("modificationDate", "Modified", DeclaredType::Date),
    field("cover", "Cover", DeclaredType::String),
];
