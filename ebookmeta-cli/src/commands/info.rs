//! Info command implementation

use super::resources;
use anyhow::Result;
use ebookmeta_core::types::ITEM_FIELDS;
use ebookmeta_core::{EbookPropertyItem, HandlerFactory, MetadataReader};
use serde::Serialize;

/// Native property output
#[derive(Serialize)]
struct NativeProperty {
    name: String,
    values: Vec<String>,
    canonical: Option<&'static str>,
}

/// Display the metadata of each input
pub fn info(inputs: &[String], json: bool, native: bool) -> Result<()> {
    let resources = resources(inputs)?;
    let mut factory = HandlerFactory::new();
    let mut items = Vec::new();
    let mut natives = Vec::new();

    for resource in &resources {
        let reader = factory.reader(resource);
        let mut reader = reader.borrow_mut();
        let properties = reader.try_read_metadata().map_err(|e| {
            anyhow::anyhow!("Failed to read metadata from {}: {}", resource.path().display(), e)
        })?;

        if native {
            natives.push(
                properties
                    .iter()
                    .map(|p| NativeProperty {
                        name: p.name().to_string(),
                        values: p.values().to_vec(),
                        canonical: reader.canonical_type_of(p).map(|c| c.name()),
                    })
                    .collect::<Vec<_>>(),
            );
        } else {
            let mut item = EbookPropertyItem::new(resource.path(), resource.mime_type());
            reader.fill_ebook_property_item(&properties, &mut item);
            items.push(item);
        }
        tracing::debug!("Read {} properties from {}", properties.len(), resource.name());
    }

    if json {
        let output = match (native, resources.len()) {
            (true, 1) => serde_json::to_string_pretty(&natives[0])?,
            (true, _) => serde_json::to_string_pretty(&natives)?,
            (false, 1) => serde_json::to_string_pretty(&items[0])?,
            (false, _) => serde_json::to_string_pretty(&items)?,
        };
        println!("{}", output);
        return Ok(());
    }

    for (index, resource) in resources.iter().enumerate() {
        if resources.len() > 1 {
            println!("== {} ==", resource.path().display());
        }
        if native {
            print_native(&natives[index]);
        } else {
            print_item(&items[index]);
        }
    }

    Ok(())
}

fn print_item(item: &EbookPropertyItem) {
    for field in ITEM_FIELDS {
        if let Some(value) = item.field_value(field.key) {
            println!("{:<16}{}", format!("{}:", field.label), value);
        }
    }
}

fn print_native(properties: &[NativeProperty]) {
    for property in properties {
        let marker = property.canonical.map(|c| format!(" [{c}]")).unwrap_or_default();
        println!("{}{}: {}", property.name, marker, property.values.join(" | "));
    }
}
