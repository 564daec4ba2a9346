//! Metadata properties as read from a container

use crate::xml::XmlElement;
use serde::{Deserialize, Serialize};

/// Value type hint used to pick renderers and validators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclaredType {
    String,
    Date,
    Integer,
}

/// Format-specific data needed to write a property back in its original shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PropertyPayload {
    /// Nothing beyond name and values
    Plain,

    /// OPF metadata element with its attributes (`opf:scheme`, `opf:event`, `id`, ...)
    StructuredXml(XmlElement),

    /// XMP property element including any `rdf:Alt`/`rdf:Seq`/`rdf:Bag` container
    PdfXmpNode {
        /// Namespace URI bound to the element's prefix
        namespace: String,
        element: XmlElement,
    },

    /// One attribute of a `<Page>` entry in ComicInfo.xml
    ComicPage { index: usize, field: String },
}

/// A named, ordered list of values read from (or destined for) one container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataProperty {
    name: String,
    values: Vec<String>,
    declared_type: Option<DeclaredType>,
    payload: PropertyPayload,
}

impl MetadataProperty {
    /// Create a plain property with a single value
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: vec![value.into()],
            declared_type: None,
            payload: PropertyPayload::Plain,
        }
    }

    pub fn with_values(mut self, values: Vec<String>) -> Self {
        self.set_values(values);
        self
    }

    pub fn with_type(mut self, declared_type: DeclaredType) -> Self {
        self.declared_type = Some(declared_type);
        self
    }

    pub fn with_payload(mut self, payload: PropertyPayload) -> Self {
        self.payload = payload;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// First value, or an empty string
    pub fn value(&self) -> &str {
        self.values.first().map(String::as_str).unwrap_or("")
    }

    /// Replace all values with `value`
    pub fn set_value(&mut self, value: impl Into<String>) {
        self.values = vec![value.into()];
    }

    /// Replace all values; an empty list becomes a single empty value
    pub fn set_values(&mut self, values: Vec<String>) {
        self.values = if values.is_empty() {
            vec![String::new()]
        } else {
            values
        };
    }

    pub fn add_value(&mut self, value: impl Into<String>) {
        if self.values.len() == 1 && self.values[0].is_empty() {
            self.values[0] = value.into();
        } else {
            self.values.push(value.into());
        }
    }

    /// True when no value carries any non-whitespace text
    pub fn is_empty(&self) -> bool {
        self.values.iter().all(|v| v.trim().is_empty())
    }

    pub fn declared_type(&self) -> DeclaredType {
        self.declared_type.unwrap_or(DeclaredType::String)
    }

    pub fn payload(&self) -> &PropertyPayload {
        &self.payload
    }

    /// Same name and same first value
    pub fn same_as(&self, other: &MetadataProperty) -> bool {
        self.name == other.name && self.value() == other.value()
    }
}

/// Cover image bytes with the MIME type they were stored under
#[derive(Debug, Clone, PartialEq)]
pub struct CoverImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    /// Entry name or object label the image came from
    pub source: Option<String>,
}

impl CoverImage {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Raw metadata document for a manual XML edit view
#[derive(Debug, Clone, PartialEq)]
pub struct PlainMetadata {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}
