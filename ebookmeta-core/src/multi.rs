//! Batch metadata editing across several resources
//!
//! [`MultiMetadataHandler::read`] produces one [`MultiMetadataProperty`] per
//! canonical type, with a value slot for every resource. [`MultiMetadataHandler::write`]
//! re-reads each resource, applies only the proposals that differ from the
//! current value and rewrites just the resources that changed.

use crate::error::{MetadataError, Result};
use crate::handler::{reader_for, writer_for, MetadataReader, MetadataWriter};
use crate::types::{MultiMetadataProperty, Resource, METADATA_TYPES};

/// Outcome of a batch write, by resource
#[derive(Debug, Default)]
pub struct WriteReport {
    /// Resources whose container was rewritten
    pub written: Vec<Resource>,
    /// Resources where every proposal matched the current value
    pub unchanged: Vec<Resource>,
    /// Resources that failed, with the error message
    pub failed: Vec<(Resource, String)>,
}

impl WriteReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    fn record_failure(&mut self, resource: &Resource, error: &MetadataError) {
        tracing::warn!("Failed to write {}: {}", resource.name(), error);
        self.failed.push((resource.clone(), error.to_string()));
    }
}

/// Reads and writes metadata for an ordered list of resources
pub struct MultiMetadataHandler {
    resources: Vec<Resource>,
}

impl MultiMetadataHandler {
    pub fn new(resources: Vec<Resource>) -> Self {
        Self { resources }
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// One property per canonical type, values aligned to [`Self::resources`].
    ///
    /// A resource that lacks a type, cannot store it, or fails to parse
    /// contributes an empty string at its index.
    pub fn read(&self) -> Vec<MultiMetadataProperty> {
        let mut columns: Vec<Vec<String>> = vec![Vec::with_capacity(self.resources.len()); METADATA_TYPES.len()];

        for resource in &self.resources {
            let mut reader = reader_for(resource);
            let mut properties = reader.read_metadata();

            for (column, canonical) in columns.iter_mut().zip(METADATA_TYPES) {
                let value = reader
                    .find_or_create(&mut properties, *canonical, true)
                    .map(|index| properties[index].value().to_string())
                    .unwrap_or_default();
                column.push(value);
            }
            reader.dispose();
        }

        METADATA_TYPES
            .iter()
            .zip(columns)
            .map(|(canonical, values)| MultiMetadataProperty::new(*canonical, values))
            .collect()
    }

    /// Apply `proposals` to every resource, rewriting only those where at
    /// least one value changed. A failing resource does not stop the batch.
    pub fn write(&self, proposals: &[MultiMetadataProperty]) -> WriteReport {
        let mut report = WriteReport::default();

        for (index, resource) in self.resources.iter().enumerate() {
            match write_one(resource, index, proposals) {
                Ok(true) => report.written.push(resource.clone()),
                Ok(false) => {
                    tracing::debug!("No changes for {}", resource.name());
                    report.unchanged.push(resource.clone());
                }
                Err(e) => report.record_failure(resource, &e),
            }
        }

        report
    }

    /// Embed `image` as the cover of every resource
    pub fn set_cover(&self, image: &[u8]) -> WriteReport {
        let mut report = WriteReport::default();

        for resource in &self.resources {
            let result = writer(resource).and_then(|mut writer| writer.set_cover(image));
            match result {
                Ok(()) => report.written.push(resource.clone()),
                Err(e) => report.record_failure(resource, &e),
            }
        }

        report
    }
}

fn writer(resource: &Resource) -> Result<Box<dyn MetadataWriter>> {
    writer_for(resource).ok_or_else(|| MetadataError::Unsupported(resource.mime_type().to_string()))
}

/// Returns whether the resource was rewritten
fn write_one(resource: &Resource, index: usize, proposals: &[MultiMetadataProperty]) -> Result<bool> {
    // Fresh read: the file may have changed since the batch was loaded
    let mut reader = reader_for(resource);
    let mut properties = reader.try_read_metadata()?;
    let mut changed = false;

    for proposal in proposals {
        let Some(value) = proposal.proposed_value(index) else {
            continue;
        };
        let Some(position) = reader.find_or_create(&mut properties, proposal.canonical_type(), true) else {
            tracing::debug!("{} cannot store {}", resource.name(), proposal.name());
            continue;
        };

        let property = &mut properties[position];
        if property.value() != value {
            property.set_value(value);
            changed = true;
        }
    }
    reader.dispose();

    if !changed {
        return Ok(false);
    }

    writer(resource)?.write_metadata(&properties)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CanonicalType;

    #[test]
    fn test_read_unsupported_resources_yields_aligned_blanks() {
        let handler = MultiMetadataHandler::new(vec![
            Resource::new("one.txt"),
            Resource::new("/nonexistent/two.epub"),
        ]);

        let properties = handler.read();
        assert_eq!(properties.len(), METADATA_TYPES.len());
        for property in &properties {
            assert_eq!(property.values(), ["", ""], "{}", property.name());
        }
    }

    #[test]
    fn test_write_failure_is_reported_not_raised() {
        let handler = MultiMetadataHandler::new(vec![
            Resource::new("/nonexistent/a.epub"),
            Resource::new("b.txt"),
        ]);

        let report = handler.write(&[MultiMetadataProperty::broadcast(CanonicalType::Title, "T")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, Resource::new("/nonexistent/a.epub"));
        // Unsupported types cannot create the property, so nothing changes
        assert_eq!(report.unchanged, vec![Resource::new("b.txt")]);
        assert!(!report.is_success());
    }

    #[test]
    fn test_set_cover_fans_out_to_every_resource() {
        let handler = MultiMetadataHandler::new(vec![Resource::new("a.txt"), Resource::new("b.txt")]);
        let report = handler.set_cover(b"\xFF\xD8\xFF");
        assert_eq!(report.failed.len(), 2);
        assert!(report.written.is_empty());
    }
}
