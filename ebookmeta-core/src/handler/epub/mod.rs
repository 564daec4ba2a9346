//! EPUB metadata handler
//!
//! Properties come from the OPF `<metadata>` section: Dublin Core elements
//! keep their full element as payload so scheme and event attributes survive
//! a rewrite, `<meta name content>` pairs are keyed by `name`, and EPUB 3
//! `<meta property>` refinements by `property`.

mod container;
mod opf;

pub use container::EpubContainer;

use opf::ManifestItem;

use super::cover::{extension_for_mime, image_mime_type, normalize_cover};
use super::source::CachedContainer;
use super::{MetadataReader, MetadataWriter};
use crate::error::{MetadataError, Result, ValidationError};
use crate::storage::replace_atomically;
use crate::types::{
    mime, CanonicalType, CoverImage, MetadataProperty, PlainMetadata, PropertyPayload, Resource,
};
use crate::xml::{XmlDocument, XmlElement};
use std::collections::BTreeMap;
use zip::CompressionMethod;

/// Native property names with a fixed canonical meaning, compared case-insensitively
const EPUB_MAPPING: &[(&str, CanonicalType)] = &[
    ("dc:creator", CanonicalType::Author),
    ("dc:title", CanonicalType::Title),
    ("dc:subject", CanonicalType::Genre),
    ("dc:description", CanonicalType::Description),
    ("dc:publisher", CanonicalType::Publisher),
    ("dc:rights", CanonicalType::Rights),
    ("dc:language", CanonicalType::Language),
    ("calibre:series", CanonicalType::SeriesName),
    ("calibre:series_index", CanonicalType::SeriesIndex),
    ("calibre:rating", CanonicalType::Rating),
    ("jeboorker:age_suggestion", CanonicalType::AgeSuggestion),
    ("jeboorker:keywords", CanonicalType::Keywords),
    ("dcterms:modified", CanonicalType::ModificationDate),
    ("cover", CanonicalType::Cover),
];

fn canonical_for(property: &MetadataProperty) -> Option<CanonicalType> {
    let name = property.name();
    let element = match property.payload() {
        PropertyPayload::StructuredXml(element) => Some(element),
        _ => None,
    };
    let attribute = |local: &str| {
        element
            .and_then(|e| e.attribute_local(local))
            .map(|v| v.trim().to_lowercase())
    };

    if name.eq_ignore_ascii_case("dc:identifier") {
        return match attribute("scheme").as_deref() {
            Some("uuid") => Some(CanonicalType::Uuid),
            Some("isbn") => Some(CanonicalType::Isbn),
            _ => None,
        };
    }

    if name.eq_ignore_ascii_case("dc:date") {
        return Some(match attribute("event").as_deref() {
            Some("publication") => CanonicalType::PublicationDate,
            Some("modification") => CanonicalType::ModificationDate,
            _ => CanonicalType::CreationDate,
        });
    }

    EPUB_MAPPING
        .iter()
        .find(|(native, _)| native.eq_ignore_ascii_case(name))
        .map(|(_, canonical)| *canonical)
}

fn dc_property(name: &str, element: XmlElement) -> MetadataProperty {
    MetadataProperty::new(name, "").with_payload(PropertyPayload::StructuredXml(element))
}

fn new_property(canonical: CanonicalType) -> MetadataProperty {
    let dc = |local: &str| {
        let name = format!("dc:{local}");
        dc_property(&name, XmlElement::new(name.as_str()))
    };
    let date = |event: &str| {
        dc_property(
            "dc:date",
            XmlElement::new("dc:date").with_attribute("opf:event", event),
        )
        .with_type(canonical.declared_type())
    };
    let meta = |name: &str| MetadataProperty::new(name, "").with_type(canonical.declared_type());

    match canonical {
        CanonicalType::Author => dc_property(
            "dc:creator",
            XmlElement::new("dc:creator").with_attribute("opf:role", "aut"),
        ),
        CanonicalType::Title => dc("title"),
        CanonicalType::Genre => dc("subject"),
        CanonicalType::Description => dc("description"),
        CanonicalType::Language => dc("language"),
        CanonicalType::Publisher => dc("publisher"),
        CanonicalType::Rights => dc("rights"),
        CanonicalType::Isbn => dc_property(
            "dc:identifier",
            XmlElement::new("dc:identifier").with_attribute("opf:scheme", "ISBN"),
        ),
        CanonicalType::Uuid => dc_property(
            "dc:identifier",
            XmlElement::new("dc:identifier").with_attribute("opf:scheme", "uuid"),
        ),
        CanonicalType::CreationDate => date("creation"),
        CanonicalType::PublicationDate => date("publication"),
        CanonicalType::ModificationDate => date("modification"),
        CanonicalType::SeriesName => meta("calibre:series"),
        CanonicalType::SeriesIndex => meta("calibre:series_index"),
        CanonicalType::Rating => meta("calibre:rating"),
        CanonicalType::AgeSuggestion => meta("jeboorker:age_suggestion"),
        CanonicalType::Keywords => meta("jeboorker:keywords"),
        CanonicalType::Cover => meta("cover"),
    }
}

/// Reads metadata from an EPUB package
pub struct EpubReader {
    container: CachedContainer<EpubContainer>,
}

impl EpubReader {
    pub fn new(resource: Resource) -> Self {
        Self {
            container: CachedContainer::new(resource),
        }
    }

    fn parsed(&mut self) -> Result<&mut EpubContainer> {
        self.container.get_or_parse(EpubContainer::open)
    }
}

impl MetadataReader for EpubReader {
    fn resources(&self) -> &[Resource] {
        std::slice::from_ref(self.container.resource())
    }

    fn try_read_metadata(&mut self) -> Result<Vec<MetadataProperty>> {
        Ok(self.parsed()?.package().properties())
    }

    fn try_read_cover(&mut self) -> Result<Option<CoverImage>> {
        self.parsed()?.read_cover()
    }

    fn try_plain_metadata(&mut self) -> Result<Option<PlainMetadata>> {
        let opf = self.parsed()?.opf_bytes().to_vec();
        Ok(Some(PlainMetadata {
            bytes: opf,
            mime_type: mime::TEXT_XML,
        }))
    }

    fn canonical_type_of(&self, property: &MetadataProperty) -> Option<CanonicalType> {
        canonical_for(property)
    }

    fn create_property(&self, canonical: CanonicalType) -> Option<MetadataProperty> {
        Some(new_property(canonical))
    }

    fn dispose(&mut self) {
        self.container.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.container.is_disposed()
    }
}

/// Rewrites the package document and cover of an EPUB
pub struct EpubWriter {
    resource: Resource,
    compression: CompressionMethod,
}

impl EpubWriter {
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            compression: CompressionMethod::Deflated,
        }
    }

    /// Compression for replaced or added entries; copied entries keep theirs
    pub fn with_compression(mut self, compression: CompressionMethod) -> Self {
        self.compression = compression;
        self
    }

    fn open(&self) -> Result<EpubContainer> {
        EpubContainer::open(self.resource.read_bytes()?)
    }

    fn commit(&self, container: &EpubContainer, replacements: BTreeMap<String, Vec<u8>>) -> Result<()> {
        replace_atomically(self.resource.path(), |file| {
            container.rewrite(file, &replacements, self.compression)
        })?;
        tracing::info!("Wrote {}", self.resource.name());
        Ok(())
    }
}

impl MetadataWriter for EpubWriter {
    fn resource(&self) -> &Resource {
        &self.resource
    }

    fn write_metadata(&mut self, properties: &[MetadataProperty]) -> Result<()> {
        let mut container = self.open()?;
        container.package_mut().rebuild_metadata(properties)?;

        let mut replacements = BTreeMap::new();
        replacements.insert(container.opf_path().to_string(), container.package().to_bytes()?);
        self.commit(&container, replacements)
    }

    fn set_cover(&mut self, image: &[u8]) -> Result<()> {
        let mut container = self.open()?;
        let mut replacements = BTreeMap::new();

        match container.declared_cover_entry() {
            Some(entry) => {
                tracing::debug!("Replacing cover entry {}", entry.entry_name);
                let bytes = normalize_cover(image, &entry.media_type)?;
                replacements.insert(entry.entry_name, bytes);
            }
            None => {
                let media_type = image_mime_type(image)
                    .ok_or_else(|| MetadataError::Unsupported("unrecognized cover image format".to_string()))?;
                let (id, href) = container.free_cover_slot(extension_for_mime(media_type));
                let entry_name = format!("{}{}", container.opf_dir(), href);
                tracing::debug!("Adding cover entry {} as '{}'", entry_name, id);

                let package = container.package_mut();
                package.add_manifest_item(&ManifestItem {
                    id: id.clone(),
                    href,
                    media_type: media_type.to_string(),
                    properties: None,
                })?;
                package.set_cover_id(&id)?;

                replacements.insert(entry_name, image.to_vec());
                replacements.insert(container.opf_path().to_string(), container.package().to_bytes()?);
            }
        }

        self.commit(&container, replacements)
    }

    fn store_plain_metadata(&mut self, bytes: &[u8]) -> Result<()> {
        let document = XmlDocument::parse_bytes(bytes)
            .map_err(|e| ValidationError::MalformedXml(e.to_string()))?;
        if document.root.local_name() != "package" {
            return Err(ValidationError::MalformedXml(format!(
                "expected <package>, found <{}>",
                document.root.name
            ))
            .into());
        }

        let container = self.open()?;
        let mut replacements = BTreeMap::new();
        replacements.insert(container.opf_path().to_string(), bytes.to_vec());
        self.commit(&container, replacements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dc(name: &str, attrs: &[(&str, &str)], text: &str) -> MetadataProperty {
        let mut element = XmlElement::new(name).with_text(text);
        for (k, v) in attrs {
            element.set_attribute(*k, *v);
        }
        MetadataProperty::new(name, text).with_payload(PropertyPayload::StructuredXml(element))
    }

    #[test]
    fn test_identifier_scheme_mapping() {
        assert_eq!(
            canonical_for(&dc("dc:identifier", &[("opf:scheme", "UUID")], "x")),
            Some(CanonicalType::Uuid)
        );
        assert_eq!(
            canonical_for(&dc("dc:identifier", &[("scheme", "isbn")], "x")),
            Some(CanonicalType::Isbn)
        );
        assert_eq!(
            canonical_for(&dc("dc:identifier", &[("opf:scheme", "calibre")], "x")),
            None
        );
        assert_eq!(canonical_for(&dc("dc:identifier", &[], "x")), None);
    }

    #[test]
    fn test_date_event_mapping() {
        assert_eq!(
            canonical_for(&dc("dc:date", &[("opf:event", "publication")], "2020")),
            Some(CanonicalType::PublicationDate)
        );
        assert_eq!(
            canonical_for(&dc("dc:date", &[("opf:event", "modification")], "2020")),
            Some(CanonicalType::ModificationDate)
        );
        assert_eq!(
            canonical_for(&dc("dc:date", &[], "2020")),
            Some(CanonicalType::CreationDate)
        );
        assert_eq!(
            canonical_for(&dc("dc:date", &[("opf:event", "original-publication")], "2020")),
            Some(CanonicalType::CreationDate)
        );
    }

    #[test]
    fn test_table_mapping_is_case_insensitive() {
        assert_eq!(
            canonical_for(&MetadataProperty::new("Calibre:Series", "S")),
            Some(CanonicalType::SeriesName)
        );
        assert_eq!(
            canonical_for(&dc("DC:Creator", &[], "A")),
            Some(CanonicalType::Author)
        );
        assert_eq!(canonical_for(&MetadataProperty::new("calibre:timestamp", "x")), None);
    }

    #[test]
    fn test_created_properties_map_back() {
        for canonical in crate::types::METADATA_TYPES {
            let property = new_property(*canonical);
            assert_eq!(canonical_for(&property), Some(*canonical), "{canonical:?}");
        }
    }
}
