//! Set command implementation

use super::resources;
use anyhow::{bail, Context, Result};
use ebookmeta_core::{CanonicalType, MultiMetadataHandler, MultiMetadataProperty};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Apply `field=value` assignments to every input
pub fn set(inputs: &[String], fields: &[(String, String)]) -> Result<()> {
    let resources = resources(inputs)?;

    let proposals = fields
        .iter()
        .map(|(field, value)| {
            let canonical = CanonicalType::from_name(field)
                .with_context(|| format!("Unknown field '{}'", field))?;
            Ok(MultiMetadataProperty::broadcast(canonical, value.as_str()))
        })
        .collect::<Result<Vec<_>>>()?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    spinner.set_message(format!("Updating {} files", resources.len()));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let handler = MultiMetadataHandler::new(resources);
    let report = handler.write(&proposals);
    spinner.finish_and_clear();

    for resource in &report.written {
        println!("Updated    {}", resource.path().display());
    }
    for resource in &report.unchanged {
        println!("Unchanged  {}", resource.path().display());
    }
    for (resource, error) in &report.failed {
        println!("Failed     {}: {}", resource.path().display(), error);
    }

    if !report.is_success() {
        bail!("{} of {} files could not be updated", report.failed.len(), inputs.len());
    }

    Ok(())
}
