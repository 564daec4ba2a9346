//! Core types: properties, canonical types, the domain record and resources

mod canonical;
pub mod date;
mod item;
mod multi;
mod property;
mod resource;

pub use canonical::{CanonicalType, METADATA_TYPES};
pub use item::{EbookPropertyItem, ItemField, ITEM_FIELDS};
pub use multi::MultiMetadataProperty;
pub use property::{CoverImage, DeclaredType, MetadataProperty, PlainMetadata, PropertyPayload};
pub use resource::{mime, mime_type_for_path, Resource, ResourceStamp};
