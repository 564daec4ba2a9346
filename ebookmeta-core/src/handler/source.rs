//! Lazily parsed container bound to one resource

use crate::error::{MetadataError, Result};
use crate::types::{Resource, ResourceStamp};

/// Parses the resource on first access and keeps the result until the file's
/// stamp changes or the container is disposed
pub(crate) struct CachedContainer<T> {
    resource: Resource,
    cached: Option<(ResourceStamp, T)>,
    disposed: bool,
}

impl<T> CachedContainer<T> {
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            cached: None,
            disposed: false,
        }
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn get_or_parse<F>(&mut self, parse: F) -> Result<&mut T>
    where
        F: FnOnce(Vec<u8>) -> Result<T>,
    {
        if self.disposed {
            return Err(MetadataError::Disposed(self.resource.name()));
        }

        let current = self.resource.stamp();
        let fresh = matches!((&self.cached, current), (Some((cached, _)), Some(now)) if *cached == now);

        if !fresh {
            // Drop the stale parse before reading so two copies never coexist
            self.cached = None;
            let bytes = self.resource.read_bytes()?;
            let stamp = current.unwrap_or(ResourceStamp {
                modified: None,
                len: bytes.len() as u64,
            });
            tracing::debug!("Parsing {:?}", self.resource.path());
            self.cached = Some((stamp, parse(bytes)?));
        }

        match &mut self.cached {
            Some((_, parsed)) => Ok(parsed),
            None => Err(MetadataError::Disposed(self.resource.name())),
        }
    }

    pub fn dispose(&mut self) {
        self.cached = None;
        self.disposed = true;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}
