//! Canonical metadata types
//!
//! Every format maps its native tags onto this fixed set. Each variant owns a
//! stable name (consumed by UI bindings and sort/filter configuration, so
//! renaming one is a breaking change) and a pure function that applies a
//! property to an [`EbookPropertyItem`].

use super::date::parse_date;
use super::item::EbookPropertyItem;
use super::property::{DeclaredType, MetadataProperty};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CanonicalType {
    Author,
    Title,
    Genre,
    SeriesName,
    SeriesIndex,
    Rating,
    Description,
    Language,
    Publisher,
    Isbn,
    Uuid,
    Rights,
    Keywords,
    AgeSuggestion,
    CreationDate,
    PublicationDate,
    ModificationDate,
    Cover,
}

/// All canonical types in display order
pub const METADATA_TYPES: &[CanonicalType] = &[
    CanonicalType::Author,
    CanonicalType::Title,
    CanonicalType::Genre,
    CanonicalType::SeriesName,
    CanonicalType::SeriesIndex,
    CanonicalType::Rating,
    CanonicalType::Description,
    CanonicalType::Language,
    CanonicalType::Publisher,
    CanonicalType::Isbn,
    CanonicalType::Uuid,
    CanonicalType::Rights,
    CanonicalType::Keywords,
    CanonicalType::AgeSuggestion,
    CanonicalType::CreationDate,
    CanonicalType::PublicationDate,
    CanonicalType::ModificationDate,
    CanonicalType::Cover,
];

impl CanonicalType {
    /// Stable canonical name
    pub fn name(self) -> &'static str {
        match self {
            CanonicalType::Author => "author",
            CanonicalType::Title => "title",
            CanonicalType::Genre => "genre",
            CanonicalType::SeriesName => "seriesName",
            CanonicalType::SeriesIndex => "seriesIndex",
            CanonicalType::Rating => "rating",
            CanonicalType::Description => "description",
            CanonicalType::Language => "language",
            CanonicalType::Publisher => "publisher",
            CanonicalType::Isbn => "isbn",
            CanonicalType::Uuid => "uuid",
            CanonicalType::Rights => "rights",
            CanonicalType::Keywords => "keywords",
            CanonicalType::AgeSuggestion => "ageSuggestion",
            CanonicalType::CreationDate => "creationDate",
            CanonicalType::PublicationDate => "publicationDate",
            CanonicalType::ModificationDate => "modificationDate",
            CanonicalType::Cover => "cover",
        }
    }

    /// Look up a canonical type by its stable name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        METADATA_TYPES
            .iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(name))
    }

    pub fn declared_type(self) -> DeclaredType {
        match self {
            CanonicalType::CreationDate
            | CanonicalType::PublicationDate
            | CanonicalType::ModificationDate => DeclaredType::Date,
            CanonicalType::Rating => DeclaredType::Integer,
            _ => DeclaredType::String,
        }
    }

    /// Apply `property` to the matching field of `item`
    pub fn apply(self, item: &mut EbookPropertyItem, property: &MetadataProperty) {
        let value = property.value().trim();
        if property.is_empty() {
            return;
        }

        match self {
            CanonicalType::Author => item.authors.extend(
                property
                    .values()
                    .iter()
                    .map(|v| v.trim())
                    .filter(|v| !v.is_empty())
                    .map(str::to_string),
            ),
            CanonicalType::Title => item.title = Some(value.to_string()),
            CanonicalType::Genre => {
                item.genre = Some(match item.genre.take() {
                    Some(existing) => format!("{existing}, {value}"),
                    None => value.to_string(),
                })
            }
            CanonicalType::SeriesName => item.series_name = Some(value.to_string()),
            CanonicalType::SeriesIndex => item.series_index = Some(value.to_string()),
            CanonicalType::Rating => item.rating = value.replace(',', ".").parse::<f32>().ok(),
            CanonicalType::Description => item.description = Some(value.to_string()),
            CanonicalType::Language => item.language = Some(value.to_string()),
            CanonicalType::Publisher => item.publisher = Some(value.to_string()),
            CanonicalType::Isbn => item.isbn = Some(value.to_string()),
            CanonicalType::Uuid => {
                let uuid = value
                    .strip_prefix("urn:uuid:")
                    .or_else(|| value.strip_prefix("uuid:"))
                    .unwrap_or(value);
                item.uuid = Some(uuid.to_string())
            }
            CanonicalType::Rights => item.rights = Some(value.to_string()),
            CanonicalType::Keywords => item.keywords.extend(
                property
                    .values()
                    .iter()
                    .flat_map(|v| v.split([',', ';']))
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string),
            ),
            CanonicalType::AgeSuggestion => item.age_suggestion = Some(value.to_string()),
            CanonicalType::CreationDate => item.creation_date = parse_date(value),
            CanonicalType::PublicationDate => item.publication_date = parse_date(value),
            CanonicalType::ModificationDate => item.modification_date = parse_date(value),
            CanonicalType::Cover => item.cover_ref = Some(value.to_string()),
        }
    }
}
