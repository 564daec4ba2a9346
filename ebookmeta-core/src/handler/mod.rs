//! Per-format metadata readers and writers

mod archive;
mod comic;
mod cover;
mod epub;
mod factory;
mod pdf;
mod source;

pub use comic::{ComicContainer, ComicReader, ComicWriter, FieldKind, COMIC_FIELDS, YES_NO};
pub use cover::{extension_for_mime, image_mime_type, normalize_cover};
pub use epub::{EpubContainer, EpubReader, EpubWriter};
pub use factory::{BatchReader, BatchWriter, HandlerFactory, ReaderCache, SharedReader};
pub use pdf::{CoverHeuristic, PdfContainer, PdfReader, PdfWriter};

use crate::error::{MetadataError, Result};
use crate::types::{
    mime, CanonicalType, CoverImage, EbookPropertyItem, MetadataProperty, PlainMetadata, Resource,
};

/// Reads native properties, cover and plain metadata from a container
pub trait MetadataReader {
    /// Resources this reader is bound to
    fn resources(&self) -> &[Resource];

    /// Parse the container into native properties
    fn try_read_metadata(&mut self) -> Result<Vec<MetadataProperty>>;

    /// Locate and extract the cover image
    fn try_read_cover(&mut self) -> Result<Option<CoverImage>>;

    /// Raw metadata document for manual editing
    fn try_plain_metadata(&mut self) -> Result<Option<PlainMetadata>>;

    /// Canonical type a native property maps to, if any
    fn canonical_type_of(&self, property: &MetadataProperty) -> Option<CanonicalType>;

    /// A new empty native property for `canonical`, `None` if the format cannot store it
    fn create_property(&self, canonical: CanonicalType) -> Option<MetadataProperty>;

    /// Release parsed buffers. The reader cannot be used afterwards.
    fn dispose(&mut self);

    fn is_disposed(&self) -> bool;

    /// Native properties, or an empty list if the container cannot be parsed
    fn read_metadata(&mut self) -> Vec<MetadataProperty> {
        self.try_read_metadata().unwrap_or_else(|e| {
            tracing::warn!("Failed to read metadata from {}: {}", describe(self.resources()), e);
            Vec::new()
        })
    }

    /// Cover image, or `None` if there is none or the container cannot be parsed
    fn read_cover(&mut self) -> Option<CoverImage> {
        self.try_read_cover().unwrap_or_else(|e| {
            tracing::warn!("Failed to read cover from {}: {}", describe(self.resources()), e);
            None
        })
    }

    fn plain_metadata(&mut self) -> Option<PlainMetadata> {
        self.try_plain_metadata().unwrap_or_else(|e| {
            tracing::warn!(
                "Failed to export plain metadata from {}: {}",
                describe(self.resources()),
                e
            );
            None
        })
    }

    /// Indices of all properties mapping to `canonical`
    fn canonical_indices(&self, properties: &[MetadataProperty], canonical: CanonicalType) -> Vec<usize> {
        properties
            .iter()
            .enumerate()
            .filter(|(_, p)| self.canonical_type_of(p) == Some(canonical))
            .map(|(i, _)| i)
            .collect()
    }

    /// Index of the first property for `canonical`, appending an empty one when
    /// `create` is set and none exists
    fn find_or_create(
        &self,
        properties: &mut Vec<MetadataProperty>,
        canonical: CanonicalType,
        create: bool,
    ) -> Option<usize> {
        if let Some(&index) = self.canonical_indices(properties, canonical).first() {
            return Some(index);
        }
        if !create {
            return None;
        }
        let property = self.create_property(canonical)?;
        properties.push(property);
        Some(properties.len() - 1)
    }

    /// Reset `item` and apply every property with a canonical mapping
    fn fill_ebook_property_item(&self, properties: &[MetadataProperty], item: &mut EbookPropertyItem) {
        item.clear_derived();
        for property in properties {
            if let Some(canonical) = self.canonical_type_of(property) {
                canonical.apply(item, property);
            }
        }
    }
}

/// Rewrites a container from native properties
pub trait MetadataWriter {
    fn resource(&self) -> &Resource;

    /// Replace the container's metadata with `properties`
    fn write_metadata(&mut self, properties: &[MetadataProperty]) -> Result<()>;

    /// Embed `image` as the cover
    fn set_cover(&mut self, _image: &[u8]) -> Result<()> {
        Err(MetadataError::Unsupported(format!(
            "cover writing for {}",
            self.resource().mime_type()
        )))
    }

    /// Replace the raw metadata document after checking it is well-formed
    fn store_plain_metadata(&mut self, bytes: &[u8]) -> Result<()>;
}

/// Reader for unsupported MIME types: no properties, no cover
pub struct EmptyReader {
    resource: Resource,
    disposed: bool,
}

impl EmptyReader {
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            disposed: false,
        }
    }
}

impl MetadataReader for EmptyReader {
    fn resources(&self) -> &[Resource] {
        std::slice::from_ref(&self.resource)
    }

    fn try_read_metadata(&mut self) -> Result<Vec<MetadataProperty>> {
        Ok(Vec::new())
    }

    fn try_read_cover(&mut self) -> Result<Option<CoverImage>> {
        Ok(None)
    }

    fn try_plain_metadata(&mut self) -> Result<Option<PlainMetadata>> {
        Ok(None)
    }

    fn canonical_type_of(&self, _property: &MetadataProperty) -> Option<CanonicalType> {
        None
    }

    fn create_property(&self, _canonical: CanonicalType) -> Option<MetadataProperty> {
        None
    }

    fn dispose(&mut self) {
        self.disposed = true;
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}

/// Reader for a resource by MIME type; unsupported types get an [`EmptyReader`]
pub fn reader_for(resource: &Resource) -> Box<dyn MetadataReader> {
    match resource.mime_type() {
        mime::EPUB => Box::new(EpubReader::new(resource.clone())),
        mime::PDF => Box::new(PdfReader::new(resource.clone())),
        mime::CBZ => Box::new(ComicReader::new(resource.clone())),
        _ => Box::new(EmptyReader::new(resource.clone())),
    }
}

/// Writer for a resource by MIME type
pub fn writer_for(resource: &Resource) -> Option<Box<dyn MetadataWriter>> {
    match resource.mime_type() {
        mime::EPUB => Some(Box::new(EpubWriter::new(resource.clone()))),
        mime::PDF => Some(Box::new(PdfWriter::new(resource.clone()))),
        mime::CBZ => Some(Box::new(ComicWriter::new(resource.clone()))),
        _ => None,
    }
}

/// Whether [`MetadataWriter::set_cover`] is supported for the resource
pub fn has_cover_writer_support(resource: &Resource) -> bool {
    matches!(resource.mime_type(), mime::EPUB | mime::CBZ)
}

/// Whether plain metadata export and store are supported for the resource
pub fn has_plain_metadata_support(resource: &Resource) -> bool {
    matches!(resource.mime_type(), mime::EPUB | mime::PDF | mime::CBZ)
}

fn describe(resources: &[Resource]) -> String {
    match resources {
        [single] => single.path().display().to_string(),
        many => format!("{} resources", many.len()),
    }
}
