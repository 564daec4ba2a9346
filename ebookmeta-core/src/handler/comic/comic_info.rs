//! ComicInfo.xml model

use crate::error::{ParseError, Result, ValidationError, WriteError};
use crate::types::date::parse_date_fixed;
use crate::types::{DeclaredType, MetadataProperty, PropertyPayload};
use chrono::Datelike;
use crate::xml::{XmlDocument, XmlElement, XmlNode};

pub const FILE_NAME: &str = "ComicInfo.xml";

/// Value domain of a ComicInfo field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Decimal,
    /// `Unknown`, `No` or `Yes`
    YesNo,
}

impl FieldKind {
    fn declared_type(self) -> DeclaredType {
        match self {
            FieldKind::Integer => DeclaredType::Integer,
            _ => DeclaredType::String,
        }
    }
}

pub const YES_NO: &[&str] = &["Unknown", "No", "Yes"];

/// Top-level ComicInfo fields in schema order
pub const COMIC_FIELDS: &[(&str, FieldKind)] = &[
    ("Title", FieldKind::Text),
    ("Series", FieldKind::Text),
    ("Number", FieldKind::Text),
    ("Count", FieldKind::Integer),
    ("Volume", FieldKind::Integer),
    ("AlternateSeries", FieldKind::Text),
    ("AlternateNumber", FieldKind::Text),
    ("AlternateCount", FieldKind::Integer),
    ("Summary", FieldKind::Text),
    ("Notes", FieldKind::Text),
    ("Year", FieldKind::Integer),
    ("Month", FieldKind::Integer),
    ("Day", FieldKind::Integer),
    ("Writer", FieldKind::Text),
    ("Penciller", FieldKind::Text),
    ("Inker", FieldKind::Text),
    ("Colorist", FieldKind::Text),
    ("Letterer", FieldKind::Text),
    ("CoverArtist", FieldKind::Text),
    ("Editor", FieldKind::Text),
    ("Publisher", FieldKind::Text),
    ("Imprint", FieldKind::Text),
    ("Genre", FieldKind::Text),
    ("Tags", FieldKind::Text),
    ("Web", FieldKind::Text),
    ("PageCount", FieldKind::Integer),
    ("LanguageISO", FieldKind::Text),
    ("Format", FieldKind::Text),
    ("BlackAndWhite", FieldKind::YesNo),
    ("Manga", FieldKind::YesNo),
    ("Characters", FieldKind::Text),
    ("Teams", FieldKind::Text),
    ("Locations", FieldKind::Text),
    ("ScanInformation", FieldKind::Text),
    ("StoryArc", FieldKind::Text),
    ("SeriesGroup", FieldKind::Text),
    ("AgeRating", FieldKind::Text),
    ("CommunityRating", FieldKind::Decimal),
    ("GTIN", FieldKind::Text),
];

/// Attributes of a `<Page>` entry
pub const PAGE_FIELDS: &[(&str, FieldKind)] = &[
    ("Image", FieldKind::Integer),
    ("Type", FieldKind::Text),
    ("DoublePage", FieldKind::Text),
    ("ImageSize", FieldKind::Integer),
    ("Key", FieldKind::Text),
    ("Bookmark", FieldKind::Text),
    ("ImageWidth", FieldKind::Integer),
    ("ImageHeight", FieldKind::Integer),
];

pub fn field_kind(name: &str) -> Option<FieldKind> {
    COMIC_FIELDS
        .iter()
        .find(|(field, _)| *field == name)
        .map(|(_, kind)| *kind)
}

fn page_field_kind(name: &str) -> Option<FieldKind> {
    PAGE_FIELDS
        .iter()
        .find(|(field, _)| *field == name)
        .map(|(_, kind)| *kind)
}

/// Name of the composite property for one page attribute
pub fn page_property_name(index: usize, field: &str) -> String {
    format!("Page_{index}_{field}")
}

/// Page index and attribute of a page property
pub fn page_address(property: &MetadataProperty) -> Option<Result<(usize, String)>> {
    if let PropertyPayload::ComicPage { index, field } = property.payload() {
        return Some(Ok((*index, field.clone())));
    }
    let rest = property.name().strip_prefix("Page_")?;
    let parsed = rest
        .split_once('_')
        .and_then(|(index, field)| Some((index.parse::<usize>().ok()?, field)))
        .filter(|(_, field)| !field.is_empty())
        .map(|(index, field)| (index, field.to_string()))
        .ok_or_else(|| ValidationError::InvalidPageProperty(property.name().to_string()).into());
    Some(parsed)
}

fn check_value(field: &str, kind: FieldKind, value: &str) -> Result<()> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(());
    }
    match kind {
        FieldKind::Text => Ok(()),
        FieldKind::Integer => value.parse::<i64>().map(|_| ()).map_err(|_| {
            ValidationError::NotAnInteger {
                field: field.to_string(),
                value: value.to_string(),
            }
            .into()
        }),
        FieldKind::Decimal => value.parse::<f64>().map(|_| ()).map_err(|_| {
            ValidationError::NotANumber {
                field: field.to_string(),
                value: value.to_string(),
            }
            .into()
        }),
        FieldKind::YesNo if YES_NO.contains(&value) => Ok(()),
        FieldKind::YesNo => Err(ValidationError::ControlledVocabulary {
            field: field.to_string(),
            value: value.to_string(),
            allowed: YES_NO,
        }
        .into()),
    }
}

/// How many of year, month and day a date string spells out
fn date_precision(value: &str) -> usize {
    if let Some(pdf) = value.strip_prefix("D:") {
        return match pdf.chars().take_while(char::is_ascii_digit).count() {
            0..=5 => 1,
            6 | 7 => 2,
            _ => 3,
        };
    }
    let date_part = value.split(['T', ' ']).next().unwrap_or(value);
    date_part.split('-').count().clamp(1, 3)
}

/// Spread a full date proposed for `Year` over `Year`, `Month` and `Day`
///
/// Only the parts the date spells out are written. Plain years and values
/// that are not dates pass through unchanged for [`validate`] to judge.
pub fn split_dates(properties: &[MetadataProperty]) -> Vec<MetadataProperty> {
    let Some(year) = properties.iter().find(|p| p.name() == "Year") else {
        return properties.to_vec();
    };
    let value = year.value().trim();
    if value.is_empty() || value.parse::<i64>().is_ok() {
        return properties.to_vec();
    }
    let Some(date) = parse_date_fixed(value) else {
        return properties.to_vec();
    };

    let parts = [
        ("Year", date.year().to_string()),
        ("Month", date.month().to_string()),
        ("Day", date.day().to_string()),
    ];
    let parts = &parts[..date_precision(value)];
    tracing::debug!("Splitting date {} into {} ComicInfo fields", value, parts.len());

    let mut split = Vec::with_capacity(properties.len() + 2);
    for property in properties {
        if parts[1..].iter().any(|(name, _)| *name == property.name()) {
            continue;
        }
        if property.name() == "Year" {
            split.extend(parts.iter().map(|(name, part)| {
                MetadataProperty::new(*name, part.as_str()).with_type(DeclaredType::Integer)
            }));
            continue;
        }
        split.push(property.clone());
    }
    split
}

/// Check every property against the field table
pub fn validate(properties: &[MetadataProperty]) -> Result<()> {
    for property in properties {
        if let Some(address) = page_address(property) {
            let (_, field) = address?;
            if let Some(kind) = page_field_kind(&field) {
                check_value(property.name(), kind, property.value())?;
            }
            continue;
        }
        if let Some(kind) = field_kind(property.name()) {
            for value in property.values() {
                check_value(property.name(), kind, value)?;
            }
        }
    }
    Ok(())
}

/// A parsed ComicInfo document
#[derive(Debug, Clone)]
pub struct ComicInfo {
    document: XmlDocument,
}

impl ComicInfo {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let document = XmlDocument::parse_bytes(bytes)?;
        if document.root.local_name() != "ComicInfo" {
            return Err(ParseError::MalformedContent(format!(
                "expected <ComicInfo>, found <{}>",
                document.root.name
            ))
            .into());
        }
        Ok(Self { document })
    }

    pub fn new() -> Self {
        let root = XmlElement::new("ComicInfo")
            .with_attribute("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance")
            .with_attribute("xmlns:xsd", "http://www.w3.org/2001/XMLSchema");
        Self {
            document: XmlDocument::new(root),
        }
    }

    fn pages(&self) -> impl Iterator<Item = &XmlElement> {
        self.document
            .root
            .find_child("Pages")
            .into_iter()
            .flat_map(|pages| pages.child_elements())
            .filter(|page| page.name == "Page")
    }

    /// One property per field element, plus one per page attribute
    pub fn properties(&self) -> Vec<MetadataProperty> {
        let mut properties: Vec<MetadataProperty> = self
            .document
            .root
            .child_elements()
            .filter(|e| e.name != "Pages")
            .map(|e| {
                let kind = field_kind(&e.name).unwrap_or(FieldKind::Text);
                MetadataProperty::new(e.name.as_str(), e.text().trim()).with_type(kind.declared_type())
            })
            .collect();

        for (index, page) in self.pages().enumerate() {
            for (field, value) in &page.attributes {
                let kind = page_field_kind(field).unwrap_or(FieldKind::Text);
                properties.push(
                    MetadataProperty::new(page_property_name(index, field), value.as_str())
                        .with_type(kind.declared_type())
                        .with_payload(PropertyPayload::ComicPage {
                            index,
                            field: field.clone(),
                        }),
                );
            }
        }
        properties
    }

    /// Index into the sorted image list of the page marked `FrontCover`
    pub fn front_cover_image(&self) -> Option<usize> {
        self.pages().enumerate().find_map(|(position, page)| {
            if page.attribute("Type") != Some("FrontCover") {
                return None;
            }
            Some(
                page.attribute("Image")
                    .and_then(|i| i.trim().parse().ok())
                    .unwrap_or(position),
            )
        })
    }

    /// Replace all fields and pages with `properties`; callers validate first
    pub fn rebuild(&mut self, properties: &[MetadataProperty]) -> Result<()> {
        let mut pages: Vec<Vec<(String, String)>> = Vec::new();
        let mut fields: Vec<XmlElement> = Vec::new();

        for property in properties {
            if let Some(address) = page_address(property) {
                let (index, field) = address?;
                if pages.len() <= index {
                    pages.resize_with(index + 1, Vec::new);
                }
                let value = property.value().trim();
                if !value.is_empty() {
                    pages[index].retain(|(k, _)| k != &field);
                    pages[index].push((field, value.to_string()));
                }
                continue;
            }
            if property.is_empty() {
                continue;
            }
            let values: Vec<&str> = property
                .values()
                .iter()
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .collect();
            fields.push(XmlElement::new(property.name()).with_text(values.join(", ")));
        }

        let root = &mut self.document.root;
        root.clear_children();
        for field in fields {
            root.children.push(XmlNode::Text("\n  ".to_string()));
            root.push_child(field);
        }
        if !pages.is_empty() {
            let mut list = XmlElement::new("Pages");
            for attributes in pages {
                let mut page = XmlElement::new("Page");
                page.attributes = attributes;
                list.children.push(XmlNode::Text("\n    ".to_string()));
                list.push_child(page);
            }
            list.children.push(XmlNode::Text("\n  ".to_string()));
            root.children.push(XmlNode::Text("\n  ".to_string()));
            root.push_child(list);
        }
        root.children.push(XmlNode::Text("\n".to_string()));
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.document
            .to_bytes()
            .map_err(|e| WriteError::EncodingFailed(format!("ComicInfo serialization failed: {e}")).into())
    }
}

impl Default for ComicInfo {
    fn default() -> Self {
        Self::new()
    }
}
