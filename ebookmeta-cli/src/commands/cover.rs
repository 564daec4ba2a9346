//! Cover command implementation

use super::resources;
use anyhow::{bail, Context, Result};
use ebookmeta_core::handler::extension_for_mime;
use ebookmeta_core::{has_cover_writer_support, reader_for, MetadataReader, MultiMetadataHandler};
use std::fs;

/// Embed, extract or describe cover images
pub fn cover(inputs: &[String], set: Option<&str>, output: Option<&str>) -> Result<()> {
    let resources = resources(inputs)?;

    if let Some(image_path) = set {
        let image = fs::read(image_path)
            .with_context(|| format!("Failed to read cover image: {}", image_path))?;

        if let Some(unsupported) = resources.iter().find(|r| !has_cover_writer_support(r)) {
            bail!(
                "Cannot write covers to {} ({})",
                unsupported.path().display(),
                unsupported.mime_type()
            );
        }

        let report = MultiMetadataHandler::new(resources).set_cover(&image);
        for resource in &report.written {
            println!("Cover set  {}", resource.path().display());
        }
        for (resource, error) in &report.failed {
            println!("Failed     {}: {}", resource.path().display(), error);
        }
        if !report.is_success() {
            bail!("{} covers could not be written", report.failed.len());
        }
        return Ok(());
    }

    if let Some(output) = output {
        let [resource] = resources.as_slice() else {
            bail!("--output needs exactly one input file");
        };
        let cover = reader_for(resource)
            .try_read_cover()
            .with_context(|| format!("Failed to read {}", resource.path().display()))?
            .with_context(|| format!("No cover found in {}", resource.path().display()))?;

        fs::write(output, &cover.bytes)
            .with_context(|| format!("Failed to write cover to {}", output))?;
        tracing::info!("Wrote {} cover to {}", cover.mime_type, output);
        return Ok(());
    }

    for resource in &resources {
        match reader_for(resource).read_cover() {
            Some(cover) => println!(
                "{}: {} ({} bytes, .{}){}",
                resource.path().display(),
                cover.mime_type,
                cover.bytes.len(),
                extension_for_mime(&cover.mime_type),
                cover.source.map(|s| format!(" from {s}")).unwrap_or_default()
            ),
            None => println!("{}: no cover", resource.path().display()),
        }
    }

    Ok(())
}
