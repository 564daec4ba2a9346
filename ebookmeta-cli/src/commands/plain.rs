//! Plain metadata command implementation

use super::resources;
use anyhow::{bail, Context, Result};
use ebookmeta_core::{has_plain_metadata_support, reader_for, writer_for, MetadataReader};
use std::fs;
use std::io::Write;

/// Print the raw metadata document, or replace it with the contents of `store`
pub fn plain(input: &str, store: Option<&str>) -> Result<()> {
    let resources = resources(&[input.to_string()])?;
    let resource = &resources[0];

    if !has_plain_metadata_support(resource) {
        bail!("Plain metadata is not supported for {}", resource.mime_type());
    }

    match store {
        Some(path) => {
            let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path))?;
            let mut writer = writer_for(resource)
                .with_context(|| format!("No writer for {}", resource.mime_type()))?;
            writer
                .store_plain_metadata(&bytes)
                .with_context(|| format!("Failed to store metadata in {}", input))?;
            println!("Stored metadata in {}", input);
        }
        None => {
            let plain = reader_for(resource)
                .try_plain_metadata()
                .with_context(|| format!("Failed to read {}", input))?
                .with_context(|| format!("No metadata document in {}", input))?;
            tracing::debug!("Exporting {} bytes of {}", plain.bytes.len(), plain.mime_type);
            std::io::stdout().write_all(&plain.bytes)?;
        }
    }

    Ok(())
}
