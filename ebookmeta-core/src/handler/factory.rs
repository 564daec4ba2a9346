//! MIME dispatch for readers and writers, with a one-slot reader cache

use super::{has_cover_writer_support, has_plain_metadata_support, reader_for, writer_for};
use super::{MetadataReader, MetadataWriter};
use crate::multi::MultiMetadataHandler;
use crate::types::Resource;
use std::cell::RefCell;
use std::rc::Rc;

/// A reader that may be held by the cache and the caller at the same time
pub type SharedReader = Rc<RefCell<Box<dyn MetadataReader>>>;

/// Holds the most recently requested single-resource reader
#[derive(Default)]
pub struct ReaderCache {
    latest: Option<SharedReader>,
}

impl ReaderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached reader if it is live and bound to exactly `resource`,
    /// otherwise a new reader that replaces it.
    ///
    /// The replaced reader is not disposed; callers holding it still own it.
    pub fn get(&mut self, resource: &Resource) -> SharedReader {
        if let Some(reader) = self.latest.as_ref().filter(|r| Self::serves(r, resource)) {
            return Rc::clone(reader);
        }

        tracing::debug!("Creating reader for {}", resource.name());
        let reader: SharedReader = Rc::new(RefCell::new(reader_for(resource)));
        self.latest = Some(Rc::clone(&reader));
        reader
    }

    /// Forget the cached reader without disposing it
    pub fn clear(&mut self) {
        self.latest = None;
    }

    fn serves(reader: &SharedReader, resource: &Resource) -> bool {
        // A reader borrowed elsewhere right now is treated as unavailable
        let Ok(reader) = reader.try_borrow() else {
            return false;
        };
        !reader.is_disposed() && matches!(reader.resources(), [bound] if bound == resource)
    }
}

/// Reader returned for a list of resources
pub enum BatchReader {
    Single(SharedReader),
    Multi(MultiMetadataHandler),
}

/// Writer returned for a list of resources
pub enum BatchWriter {
    Single(Box<dyn MetadataWriter>),
    Multi(MultiMetadataHandler),
}

/// Entry point for obtaining handlers. Owns the reader cache for a session.
#[derive(Default)]
pub struct HandlerFactory {
    cache: ReaderCache,
}

impl HandlerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reader for one resource, reused while it stays live
    pub fn reader(&mut self, resource: &Resource) -> SharedReader {
        self.cache.get(resource)
    }

    /// A single-resource list gets a plain reader; anything else the batch engine
    pub fn reader_for_all(&mut self, resources: &[Resource]) -> BatchReader {
        match resources {
            [single] => BatchReader::Single(self.reader(single)),
            many => BatchReader::Multi(MultiMetadataHandler::new(many.to_vec())),
        }
    }

    /// Fresh writer bound to the current container bytes; never cached
    pub fn writer(&self, resource: &Resource) -> Option<Box<dyn MetadataWriter>> {
        writer_for(resource)
    }

    pub fn writer_for_all(&self, resources: &[Resource]) -> Option<BatchWriter> {
        match resources {
            [single] => self.writer(single).map(BatchWriter::Single),
            many => Some(BatchWriter::Multi(MultiMetadataHandler::new(many.to_vec()))),
        }
    }

    pub fn has_cover_writer_support(&self, resource: &Resource) -> bool {
        has_cover_writer_support(resource)
    }

    pub fn has_plain_metadata_support(&self, resource: &Resource) -> bool {
        has_plain_metadata_support(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_resource_returns_cached_instance() {
        let mut factory = HandlerFactory::new();
        let resource = Resource::new("a.epub");

        let first = factory.reader(&resource);
        let second = factory.reader(&resource);
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_different_resource_replaces_without_disposing() {
        let mut factory = HandlerFactory::new();
        let first = factory.reader(&Resource::new("a.epub"));
        let other = factory.reader(&Resource::new("b.epub"));

        assert!(!Rc::ptr_eq(&first, &other));
        assert!(!first.borrow().is_disposed());

        let again = factory.reader(&Resource::new("a.epub"));
        assert!(!Rc::ptr_eq(&first, &again));
    }

    #[test]
    fn test_disposed_reader_is_rebuilt() {
        let mut factory = HandlerFactory::new();
        let resource = Resource::new("a.pdf");

        let first = factory.reader(&resource);
        first.borrow_mut().dispose();

        let second = factory.reader(&resource);
        assert!(!Rc::ptr_eq(&first, &second));
        assert!(!second.borrow().is_disposed());
    }

    #[test]
    fn test_resource_lists() {
        let mut factory = HandlerFactory::new();
        let one = [Resource::new("a.cbz")];
        let many = [Resource::new("a.cbz"), Resource::new("b.epub")];

        assert!(matches!(factory.reader_for_all(&one), BatchReader::Single(_)));
        match factory.reader_for_all(&many) {
            BatchReader::Multi(multi) => assert_eq!(multi.resources(), many),
            BatchReader::Single(_) => panic!("expected batch reader"),
        }

        assert!(matches!(factory.writer_for_all(&one), Some(BatchWriter::Single(_))));
        assert!(matches!(factory.writer_for_all(&many), Some(BatchWriter::Multi(_))));
        assert!(factory.writer_for_all(&[Resource::new("a.txt")]).is_none());
    }
}
