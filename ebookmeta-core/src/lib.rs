//! Ebookmeta Core Library
//!
//! Reads and writes bibliographic metadata in EPUB, PDF and CBZ containers
//! through one canonical property model. Each format has a reader that parses
//! native properties and a writer that rewrites the container; the
//! [`HandlerFactory`] dispatches by MIME type and the [`MultiMetadataHandler`]
//! edits many resources in one batch.

pub mod error;
pub mod handler;
pub mod multi;
pub mod storage;
pub mod types;
pub mod xml;

pub use error::{MetadataError, ParseError, Result, ValidationError, WriteError};
pub use handler::{
    has_cover_writer_support, has_plain_metadata_support, reader_for, writer_for, BatchReader,
    BatchWriter, HandlerFactory, MetadataReader, MetadataWriter, ReaderCache, SharedReader,
};
pub use multi::{MultiMetadataHandler, WriteReport};
pub use types::{
    CanonicalType, CoverImage, DeclaredType, EbookPropertyItem, MetadataProperty,
    MultiMetadataProperty, PlainMetadata, PropertyPayload, Resource, METADATA_TYPES,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_from_unsupported_resource_clears_item() {
        let resource = Resource::new("notes.txt");
        let mut reader = reader_for(&resource);
        let mut item = EbookPropertyItem::new(resource.path(), resource.mime_type());
        item.title = Some("stale".to_string());

        let properties = reader.read_metadata();
        reader.fill_ebook_property_item(&properties, &mut item);
        assert_eq!(item.title, None);
    }
}
