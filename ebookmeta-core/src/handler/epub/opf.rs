//! OPF package document model

use crate::error::{ParseError, Result, WriteError};
use crate::types::{DeclaredType, MetadataProperty, PropertyPayload};
use crate::xml::{XmlDocument, XmlElement, XmlNode};

pub const DC_NAMESPACE: &str = "http://purl.org/dc/elements/1.1/";
pub const OPF_NAMESPACE: &str = "http://www.idpf.org/2007/opf";

const METADATA_INDENT: &str = "\n    ";
const SECTION_INDENT: &str = "\n  ";

/// A `<manifest>` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
    pub properties: Option<String>,
}

/// The parsed package document
#[derive(Debug, Clone)]
pub struct OpfPackage {
    document: XmlDocument,
    /// Namespace prefix of the root element (`opf` for `<opf:package>`)
    prefix: Option<String>,
}

impl OpfPackage {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let document = XmlDocument::parse_bytes(bytes)?;
        if document.root.local_name() != "package" {
            return Err(ParseError::MalformedContent(format!(
                "OPF root is <{}>, expected <package>",
                document.root.name
            ))
            .into());
        }
        let prefix = document.root.prefix().map(str::to_string);
        Ok(Self { document, prefix })
    }

    pub fn document(&self) -> &XmlDocument {
        &self.document
    }

    /// Qualify an OPF element name with the document's root prefix
    pub fn qualify(&self, local: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{local}"),
            None => local.to_string(),
        }
    }

    /// Name under which a section exists: prefixed first, then unprefixed
    fn section_name(&self, local: &str) -> Option<String> {
        let qualified = self.qualify(local);
        if self.document.root.find_child(&qualified).is_some() {
            Some(qualified)
        } else if self.document.root.find_child(local).is_some() {
            Some(local.to_string())
        } else {
            None
        }
    }

    pub fn metadata(&self) -> Option<&XmlElement> {
        let name = self.section_name("metadata")?;
        self.document.root.find_child(&name)
    }

    fn metadata_mut(&mut self) -> Option<&mut XmlElement> {
        let name = self.section_name("metadata")?;
        self.document.root.find_child_mut(&name)
    }

    fn manifest_mut(&mut self) -> Option<&mut XmlElement> {
        let name = self.section_name("manifest")?;
        self.document.root.find_child_mut(&name)
    }

    /// Metadata children, descending into OPF 1.x `dc-metadata`/`x-metadata` wrappers
    fn metadata_elements(&self) -> Vec<&XmlElement> {
        let mut elements = Vec::new();
        if let Some(metadata) = self.metadata() {
            for child in metadata.child_elements() {
                match child.local_name() {
                    "dc-metadata" | "x-metadata" => elements.extend(child.child_elements()),
                    _ => elements.push(child),
                }
            }
        }
        elements
    }

    pub fn manifest_items(&self) -> Vec<ManifestItem> {
        let Some(name) = self.section_name("manifest") else {
            return Vec::new();
        };
        let Some(manifest) = self.document.root.find_child(&name) else {
            return Vec::new();
        };
        manifest
            .child_elements()
            .filter(|e| e.local_name() == "item")
            .map(|e| ManifestItem {
                id: e.attribute("id").unwrap_or_default().to_string(),
                href: e.attribute("href").unwrap_or_default().to_string(),
                media_type: e.attribute("media-type").unwrap_or_default().to_string(),
                properties: e.attribute("properties").map(str::to_string),
            })
            .collect()
    }

    /// `content` of `<meta name="cover">`
    pub fn cover_id(&self) -> Option<String> {
        self.metadata_elements()
            .into_iter()
            .filter(|e| e.local_name() == "meta")
            .find(|e| {
                e.attribute("name")
                    .map(|n| n.eq_ignore_ascii_case("cover"))
                    .unwrap_or(false)
            })
            .and_then(|e| e.attribute("content"))
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
    }

    /// The image manifest item declared as cover
    pub fn cover_image_item(&self) -> Option<ManifestItem> {
        let items = self.manifest_items();
        if let Some(id) = self.cover_id() {
            if let Some(item) = items
                .iter()
                .find(|i| i.id == id && i.media_type.starts_with("image/"))
            {
                return Some(item.clone());
            }
        }
        items.into_iter().find(|i| {
            i.media_type.starts_with("image/")
                && i.properties
                    .as_deref()
                    .map(|p| p.split_whitespace().any(|p| p == "cover-image"))
                    .unwrap_or(false)
        })
    }

    /// Native properties in document order
    pub fn properties(&self) -> Vec<MetadataProperty> {
        self.metadata_elements()
            .into_iter()
            .filter_map(property_from_element)
            .collect()
    }

    /// Clear the metadata section and rebuild it from `properties`
    pub fn rebuild_metadata(&mut self, properties: &[MetadataProperty]) -> Result<()> {
        let meta_name = self.qualify("meta");
        let elements: Vec<XmlElement> = properties
            .iter()
            .filter(|p| !p.is_empty())
            .flat_map(|p| elements_for_property(p, &meta_name))
            .collect();

        let root_declares = |ns: &str| -> bool {
            self.document.root.attribute(&format!("xmlns:{ns}")).is_some()
        };
        let needs_dc = !root_declares("dc");
        let needs_opf = !root_declares("opf");

        let metadata = self
            .metadata_mut()
            .ok_or_else(|| ParseError::MissingEntry("OPF <metadata> section".to_string()))?;

        metadata.clear_children();
        for element in elements {
            metadata.children.push(XmlNode::Text(METADATA_INDENT.to_string()));
            metadata.push_child(element);
        }
        metadata.children.push(XmlNode::Text(SECTION_INDENT.to_string()));

        let uses_prefix = |metadata: &XmlElement, ns: &str| -> bool {
            let marker = format!("{ns}:");
            metadata.child_elements().any(|e| {
                e.name.starts_with(&marker) || e.attributes.iter().any(|(k, _)| k.starts_with(&marker))
            })
        };
        if needs_dc && uses_prefix(&*metadata, "dc") && metadata.attribute("xmlns:dc").is_none() {
            metadata.set_attribute("xmlns:dc", DC_NAMESPACE);
        }
        if needs_opf && uses_prefix(&*metadata, "opf") && metadata.attribute("xmlns:opf").is_none() {
            metadata.set_attribute("xmlns:opf", OPF_NAMESPACE);
        }

        self.ensure_unique_identifier()
    }

    /// Keep `package@unique-identifier` pointing at an identifier element
    fn ensure_unique_identifier(&mut self) -> Result<()> {
        let id = self
            .document
            .root
            .attribute("unique-identifier")
            .map(str::to_string)
            .unwrap_or_else(|| "uuid_id".to_string());

        let present = self
            .metadata_elements()
            .iter()
            .any(|e| e.attribute("id") == Some(id.as_str()));
        if present {
            return Ok(());
        }

        tracing::debug!("Synthesizing unique identifier '{}'", id);
        self.document.root.set_attribute("unique-identifier", id.as_str());
        let identifier = XmlElement::new("dc:identifier")
            .with_attribute("id", id.as_str())
            .with_attribute("opf:scheme", "uuid")
            .with_text(format!("urn:uuid:{}", uuid::Uuid::new_v4()));

        let root_has_opf = self.document.root.attribute("xmlns:opf").is_some();
        let root_has_dc = self.document.root.attribute("xmlns:dc").is_some();
        let metadata = self
            .metadata_mut()
            .ok_or_else(|| ParseError::MissingEntry("OPF <metadata> section".to_string()))?;
        // Insert before the closing indent
        let at = metadata.children.len().saturating_sub(1);
        metadata.children.insert(at, XmlNode::Element(identifier));
        metadata.children.insert(at, XmlNode::Text(METADATA_INDENT.to_string()));
        if !root_has_opf && metadata.attribute("xmlns:opf").is_none() {
            metadata.set_attribute("xmlns:opf", OPF_NAMESPACE);
        }
        if !root_has_dc && metadata.attribute("xmlns:dc").is_none() {
            metadata.set_attribute("xmlns:dc", DC_NAMESPACE);
        }
        Ok(())
    }

    pub fn add_manifest_item(&mut self, item: &ManifestItem) -> Result<()> {
        let item_name = self.qualify("item");
        let manifest = self
            .manifest_mut()
            .ok_or_else(|| ParseError::MissingEntry("OPF <manifest> section".to_string()))?;
        let mut element = XmlElement::new(item_name)
            .with_attribute("id", item.id.as_str())
            .with_attribute("href", item.href.as_str())
            .with_attribute("media-type", item.media_type.as_str());
        if let Some(properties) = &item.properties {
            element.set_attribute("properties", properties.as_str());
        }
        manifest.children.push(XmlNode::Text("  ".to_string()));
        manifest.push_child(element);
        manifest.children.push(XmlNode::Text(SECTION_INDENT.to_string()));
        Ok(())
    }

    /// Point `<meta name="cover">` at `id`, adding the element if absent
    pub fn set_cover_id(&mut self, id: &str) -> Result<()> {
        let meta_name = self.qualify("meta");
        let metadata = self
            .metadata_mut()
            .ok_or_else(|| ParseError::MissingEntry("OPF <metadata> section".to_string()))?;

        let existing = metadata.child_elements_mut().find(|e| {
            e.local_name() == "meta"
                && e.attribute("name")
                    .map(|n| n.eq_ignore_ascii_case("cover"))
                    .unwrap_or(false)
        });
        match existing {
            Some(meta) => meta.set_attribute("content", id),
            None => {
                metadata.children.push(XmlNode::Text("  ".to_string()));
                metadata.push_child(
                    XmlElement::new(meta_name)
                        .with_attribute("name", "cover")
                        .with_attribute("content", id),
                );
                metadata.children.push(XmlNode::Text(SECTION_INDENT.to_string()));
            }
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.document
            .to_bytes()
            .map_err(|e| WriteError::EncodingFailed(format!("OPF serialization failed: {e}")).into())
    }
}

fn property_from_element(element: &XmlElement) -> Option<MetadataProperty> {
    let payload = PropertyPayload::StructuredXml(element.clone());

    if element.local_name() == "meta" {
        if let Some(name) = element.attribute("name") {
            let content = element.attribute("content").unwrap_or_default();
            return Some(MetadataProperty::new(name, content.trim()).with_payload(payload));
        }
        let property = element.attribute("property")?;
        return Some(MetadataProperty::new(property, element.text().trim()).with_payload(payload));
    }

    let property = MetadataProperty::new(element.name.as_str(), element.text().trim()).with_payload(payload);
    Some(match element.local_name() {
        "date" => property.with_type(DeclaredType::Date),
        _ => property,
    })
}

/// Elements written for a property: one per value for Dublin Core elements,
/// a single element for `<meta>`
fn elements_for_property(property: &MetadataProperty, meta_name: &str) -> Vec<XmlElement> {
    let base = match property.payload() {
        PropertyPayload::StructuredXml(original) => original.clone(),
        _ if property.name().starts_with("dc:") => XmlElement::new(property.name()),
        _ => XmlElement::new(meta_name).with_attribute("name", property.name()),
    };

    if base.local_name() == "meta" {
        let mut meta = base;
        if meta.attribute("name").is_some() {
            meta.clear_children();
            meta.set_attribute("content", property.value());
        } else {
            meta.set_text(property.value());
        }
        return vec![meta];
    }

    property
        .values()
        .iter()
        .filter(|v| !v.trim().is_empty())
        .enumerate()
        .map(|(i, value)| {
            let mut element = base.clone();
            if i > 0 {
                element.remove_attribute("id");
            }
            element.set_text(value.as_str());
            element
        })
        .collect()
}
