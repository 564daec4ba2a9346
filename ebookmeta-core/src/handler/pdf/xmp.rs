//! XMP packet model
//!
//! Each simple child of an `rdf:Description` (and each property attribute on
//! it) becomes one property. Children whose value is an `rdf:Alt`, `rdf:Seq`
//! or `rdf:Bag` are flattened to their `rdf:li` texts while the original
//! element travels along as payload, so an unchanged value is written back
//! verbatim and a changed one keeps its container shape and `li` attributes.
//! Structured resources such as thumbnails or history entries are not exposed
//! and survive a rebuild untouched.

use crate::error::{ParseError, Result, WriteError};
use crate::types::{DeclaredType, MetadataProperty, PropertyPayload};
use crate::xml::{XmlDocument, XmlElement, XmlNode};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::collections::BTreeMap;

pub const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const DC_NS: &str = "http://purl.org/dc/elements/1.1/";
pub const XMP_NS: &str = "http://ns.adobe.com/xap/1.0/";
pub const PDF_NS: &str = "http://ns.adobe.com/pdf/1.3/";
pub const XMP_MM_NS: &str = "http://ns.adobe.com/xap/1.0/mm/";
pub const PHOTOSHOP_NS: &str = "http://ns.adobe.com/photoshop/1.0/";

const XPACKET_BEGIN: &str = "xpacket begin=\"\u{feff}\" id=\"W5M0MpCehiHzreSzNTczkc9d\"";
const XPACKET_END: &str = "xpacket end=\"w\"";

/// Schemas mapped to properties, with the prefix used when a schema is created
pub const SCHEMAS: &[(&str, &str)] = &[
    ("dc", DC_NS),
    ("xmp", XMP_NS),
    ("pdf", PDF_NS),
    ("xmpMM", XMP_MM_NS),
    ("photoshop", PHOTOSHOP_NS),
];

/// Info dictionary keys and their XMP counterparts
pub const INFO_MIRRORS: &[(&str, &str, &str)] = &[
    ("Title", DC_NS, "title"),
    ("Author", DC_NS, "creator"),
    ("Subject", DC_NS, "description"),
    ("Keywords", PDF_NS, "Keywords"),
    ("Creator", XMP_NS, "CreatorTool"),
    ("Producer", PDF_NS, "Producer"),
    ("CreationDate", XMP_NS, "CreateDate"),
    ("ModDate", XMP_NS, "ModifyDate"),
];

const DATE_PROPERTIES: &[(&str, &str)] = &[
    (DC_NS, "date"),
    (XMP_NS, "CreateDate"),
    (XMP_NS, "ModifyDate"),
    (XMP_NS, "MetadataDate"),
];

/// RDF container wrapping a multi-valued property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RdfContainer {
    Alt,
    Seq,
    Bag,
}

impl RdfContainer {
    fn from_local(local: &str) -> Option<Self> {
        match local {
            "Alt" => Some(Self::Alt),
            "Seq" => Some(Self::Seq),
            "Bag" => Some(Self::Bag),
            _ => None,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Self::Alt => "rdf:Alt",
            Self::Seq => "rdf:Seq",
            Self::Bag => "rdf:Bag",
        }
    }
}

/// Standard RDF container for a known XMP property
pub fn default_container(namespace: &str, local: &str) -> Option<RdfContainer> {
    if namespace != DC_NS {
        return None;
    }
    match local {
        "title" | "description" | "rights" => Some(RdfContainer::Alt),
        "creator" | "date" => Some(RdfContainer::Seq),
        "subject" | "publisher" | "language" | "contributor" | "type" => Some(RdfContainer::Bag),
        _ => None,
    }
}

pub fn preferred_prefix(namespace: &str) -> Option<&'static str> {
    SCHEMAS
        .iter()
        .find(|(_, ns)| *ns == namespace)
        .map(|(prefix, _)| *prefix)
}

pub fn namespace_for_prefix(prefix: &str) -> Option<&'static str> {
    SCHEMAS
        .iter()
        .find(|(p, _)| *p == prefix)
        .map(|(_, ns)| *ns)
}

pub fn mirror_for_xmp(namespace: &str, local: &str) -> Option<&'static str> {
    INFO_MIRRORS
        .iter()
        .find(|(_, ns, name)| *ns == namespace && *name == local)
        .map(|(key, _, _)| *key)
}

pub fn mirror_for_info(key: &str) -> Option<(&'static str, &'static str)> {
    INFO_MIRRORS
        .iter()
        .find(|(info, _, _)| *info == key)
        .map(|(_, ns, local)| (*ns, *local))
}

pub fn is_date_property(namespace: &str, local: &str) -> bool {
    DATE_PROPERTIES
        .iter()
        .any(|(ns, name)| *ns == namespace && *name == local)
}

fn local_of(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

fn prefix_of(name: &str) -> Option<&str> {
    name.split_once(':').map(|(prefix, _)| prefix)
}

/// Flattened values of a property element
pub fn node_values(element: &XmlElement) -> Vec<String> {
    if let Some(container) = element
        .child_elements()
        .find(|c| RdfContainer::from_local(c.local_name()).is_some())
    {
        return container
            .child_elements()
            .filter(|li| li.local_name() == "li")
            .map(|li| li.text().trim().to_string())
            .collect();
    }
    if let Some(resource) = element.attribute("rdf:resource") {
        return vec![resource.to_string()];
    }
    vec![element.text().trim().to_string()]
}

/// Whether a Description child carries nested resources rather than text values
fn is_structured(element: &XmlElement) -> bool {
    if element.attribute("rdf:parseType").is_some() {
        return true;
    }
    element.child_elements().any(|child| match RdfContainer::from_local(child.local_name()) {
        Some(_) => child
            .child_elements()
            .any(|li| li.has_child_elements() || li.attribute("rdf:parseType").is_some()),
        None => true,
    })
}

/// Build a property element holding `values`
///
/// When `template` is given its container tag and per-item attributes are
/// reused; otherwise the prescribed container for the property is used.
pub fn build_element(
    name: &str,
    namespace: &str,
    values: &[String],
    template: Option<&XmlElement>,
) -> XmlElement {
    let template_container = template.and_then(|t| {
        t.child_elements()
            .find(|c| RdfContainer::from_local(c.local_name()).is_some())
    });
    let container = match template_container {
        Some(c) => RdfContainer::from_local(c.local_name()),
        None if template.is_some() => None,
        None => default_container(namespace, local_of(name)),
    };

    let mut element = XmlElement::new(name);
    if let Some(template) = template {
        for (key, value) in &template.attributes {
            if key != "rdf:resource" {
                element.set_attribute(key.as_str(), value.as_str());
            }
        }
    }

    let values: Vec<&String> = values.iter().filter(|v| !v.trim().is_empty()).collect();
    let Some(container) = container else {
        let joined = values.iter().map(|v| v.as_str()).collect::<Vec<_>>().join(", ");
        return element.with_text(joined);
    };

    let template_items: Vec<&XmlElement> = template_container
        .map(|c| c.child_elements().filter(|li| li.local_name() == "li").collect())
        .unwrap_or_default();
    let tag = template_container
        .map(|c| c.name.clone())
        .unwrap_or_else(|| container.tag().to_string());

    let mut list = XmlElement::new(tag);
    for (i, value) in values.iter().enumerate() {
        let mut item = XmlElement::new("rdf:li");
        match template_items.get(i) {
            Some(original) => item.attributes = original.attributes.clone(),
            None if i == 0 && container == RdfContainer::Alt => {
                item.set_attribute("xml:lang", "x-default");
            }
            None => {}
        }
        item.set_text(value.as_str());
        list.push_child(item);
    }
    element.push_child(list);
    element
}

/// A property element ready to be placed into the schema for `namespace`
#[derive(Debug, Clone)]
pub struct XmpEntry {
    pub namespace: String,
    pub element: XmlElement,
}

/// A parsed XMP packet
#[derive(Debug, Clone)]
pub struct XmpPacket {
    document: XmlDocument,
}

impl XmpPacket {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let document = XmlDocument::parse_bytes(bytes)?;
        let has_rdf = document.root.local_name() == "RDF"
            || document.root.find_descendant_local("RDF").is_some();
        if !has_rdf {
            return Err(ParseError::MalformedContent("XMP packet has no rdf:RDF".to_string()).into());
        }
        Ok(Self { document })
    }

    /// An empty packet with an `x:xmpmeta` envelope
    pub fn new() -> Self {
        let root = XmlElement::new("x:xmpmeta")
            .with_attribute("xmlns:x", "adobe:ns:meta/")
            .with_child(XmlElement::new("rdf:RDF").with_attribute("xmlns:rdf", RDF_NS));
        let mut document = XmlDocument::new(root);
        document.declaration = None;
        document
            .prolog
            .push(XmlNode::ProcessingInstruction(XPACKET_BEGIN.to_string()));
        document
            .epilog
            .push(XmlNode::ProcessingInstruction(XPACKET_END.to_string()));
        Self { document }
    }

    fn rdf(&self) -> Option<&XmlElement> {
        if self.document.root.local_name() == "RDF" {
            return Some(&self.document.root);
        }
        self.document.root.find_descendant_local("RDF")
    }

    fn namespaces(&self) -> BTreeMap<String, String> {
        let mut namespaces = BTreeMap::new();
        self.document.root.collect_namespaces(&mut namespaces);
        namespaces
    }

    fn descriptions(&self) -> impl Iterator<Item = &XmlElement> {
        self.rdf()
            .into_iter()
            .flat_map(|rdf| rdf.child_elements())
            .filter(|e| e.local_name() == "Description")
    }

    /// Simple-valued properties of every schema
    pub fn properties(&self) -> Vec<MetadataProperty> {
        let namespaces = self.namespaces();
        let namespace_of = |name: &str| {
            prefix_of(name)
                .and_then(|p| namespaces.get(p))
                .cloned()
                .unwrap_or_default()
        };

        let mut properties = Vec::new();
        for description in self.descriptions() {
            for (key, value) in &description.attributes {
                if key.starts_with("xmlns") || prefix_of(key) == Some("rdf") || !key.contains(':') {
                    continue;
                }
                let element = XmlElement::new(key.as_str()).with_text(value.as_str());
                properties.push(xmp_property(namespace_of(key), element));
            }
            for child in description.child_elements() {
                if is_structured(child) {
                    continue;
                }
                properties.push(xmp_property(namespace_of(&child.name), child.clone()));
            }
        }
        properties
    }

    /// Decoded `xmp:Thumbnails` image, if any
    pub fn thumbnail(&self) -> Option<Vec<u8>> {
        let thumbnails = self
            .descriptions()
            .find_map(|d| d.find_child_local("Thumbnails"))?;
        let encoded = match thumbnails.find_descendant_local("image") {
            Some(image) => image.text(),
            None => {
                let li = thumbnails.find_descendant_local("li")?;
                li.attribute_local("image")?.to_string()
            }
        };
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        match STANDARD.decode(compact.as_bytes()) {
            Ok(bytes) if !bytes.is_empty() => Some(bytes),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("Ignoring undecodable XMP thumbnail: {}", e);
                None
            }
        }
    }

    /// Replace every simple property with `entries`, keeping structured ones
    pub fn rebuild(&mut self, entries: &[XmpEntry]) -> Result<()> {
        // Prefixes bound above the descriptions stay usable in any of them
        let mut outer = BTreeMap::new();
        for (key, value) in &self.document.root.attributes {
            if let Some(prefix) = key.strip_prefix("xmlns:") {
                outer.insert(prefix.to_string(), value.clone());
            }
        }

        let rdf = rdf_element_mut(&mut self.document.root)
            .ok_or_else(|| ParseError::MalformedContent("XMP packet has no rdf:RDF".to_string()))?;
        for (key, value) in &rdf.attributes {
            if let Some(prefix) = key.strip_prefix("xmlns:") {
                outer.insert(prefix.to_string(), value.clone());
            }
        }

        let about = rdf
            .child_elements()
            .find(|e| e.local_name() == "Description")
            .and_then(|e| e.attribute("rdf:about"))
            .unwrap_or_default()
            .to_string();

        // Strip simple content, leaving namespace declarations and structured children
        let mut descriptions: Vec<XmlElement> = Vec::new();
        let mut others: Vec<XmlNode> = Vec::new();
        for node in std::mem::take(&mut rdf.children) {
            match node {
                XmlNode::Element(mut e) if e.local_name() == "Description" => {
                    e.attributes
                        .retain(|(k, _)| k.starts_with("xmlns") || prefix_of(k) == Some("rdf"));
                    let kept: Vec<XmlElement> = e.child_elements().filter(|c| is_structured(c)).cloned().collect();
                    e.clear_children();
                    for child in kept {
                        e.children.push(XmlNode::Text("\n   ".to_string()));
                        e.push_child(child);
                    }
                    descriptions.push(e);
                }
                XmlNode::Text(t) if t.trim().is_empty() => {}
                other => others.push(other),
            }
        }

        let mut seen: Vec<String> = Vec::new();
        for entry in entries {
            if seen.contains(&entry.element.name) {
                continue;
            }
            seen.push(entry.element.name.clone());

            let prefix = prefix_of(&entry.element.name).unwrap_or_default().to_string();
            let declaration = format!("xmlns:{prefix}");
            let bound_outside = outer.get(&prefix).map(|ns| ns == &entry.namespace).unwrap_or(false);

            let index = descriptions
                .iter()
                .position(|d| d.attribute(&declaration) == Some(entry.namespace.as_str()))
                .or_else(|| if bound_outside { (!descriptions.is_empty()).then_some(0) } else { None });
            let index = match index {
                Some(i) => i,
                None => {
                    let mut description = XmlElement::new("rdf:Description")
                        .with_attribute("rdf:about", about.as_str());
                    if !bound_outside {
                        description.set_attribute(declaration.as_str(), entry.namespace.as_str());
                    }
                    descriptions.push(description);
                    descriptions.len() - 1
                }
            };

            let description = &mut descriptions[index];
            description.children.push(XmlNode::Text("\n   ".to_string()));
            description.push_child(entry.element.clone());
        }

        for node in others {
            rdf.children.push(XmlNode::Text("\n  ".to_string()));
            rdf.children.push(node);
        }
        for mut description in descriptions {
            let has_content = description.has_child_elements()
                || description
                    .attributes
                    .iter()
                    .any(|(k, _)| !k.starts_with("xmlns") && prefix_of(k) != Some("rdf"));
            if !has_content {
                continue;
            }
            description.children.push(XmlNode::Text("\n  ".to_string()));
            rdf.children.push(XmlNode::Text("\n  ".to_string()));
            rdf.push_child(description);
        }
        rdf.children.push(XmlNode::Text("\n ".to_string()));
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut document = self.document.clone();
        let has_begin = document
            .prolog
            .iter()
            .any(|n| matches!(n, XmlNode::ProcessingInstruction(pi) if pi.starts_with("xpacket begin")));
        if !has_begin {
            document
                .prolog
                .insert(0, XmlNode::ProcessingInstruction(XPACKET_BEGIN.to_string()));
        }
        let has_end = document
            .epilog
            .iter()
            .any(|n| matches!(n, XmlNode::ProcessingInstruction(pi) if pi.starts_with("xpacket end")));
        if !has_end {
            document
                .epilog
                .push(XmlNode::ProcessingInstruction(XPACKET_END.to_string()));
        }
        document
            .to_bytes()
            .map_err(|e| WriteError::EncodingFailed(format!("XMP serialization failed: {e}")).into())
    }
}

impl Default for XmpPacket {
    fn default() -> Self {
        Self::new()
    }
}

fn xmp_property(namespace: String, element: XmlElement) -> MetadataProperty {
    let local = element.local_name().to_string();
    let name = match preferred_prefix(&namespace) {
        Some(prefix) => format!("{prefix}:{local}"),
        None => element.name.clone(),
    };
    let values = node_values(&element);
    let declared = if is_date_property(&namespace, &local) {
        DeclaredType::Date
    } else {
        DeclaredType::String
    };
    MetadataProperty::new(name, "")
        .with_values(values)
        .with_type(declared)
        .with_payload(PropertyPayload::PdfXmpNode { namespace, element })
}

fn rdf_element_mut(element: &mut XmlElement) -> Option<&mut XmlElement> {
    if element.local_name() == "RDF" {
        return Some(element);
    }
    for child in element.child_elements_mut() {
        if let Some(found) = rdf_element_mut(child) {
            return Some(found);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const PACKET: &str = r#"<?xpacket begin="" id="W5M0MpCehiHzreSzNTczkc9d"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/">
 <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
  <rdf:Description rdf:about="" xmlns:dc="http://purl.org/dc/elements/1.1/">
   <dc:title><rdf:Alt><rdf:li xml:lang="de-DE">Der Titel</rdf:li></rdf:Alt></dc:title>
   <dc:creator><rdf:Seq><rdf:li>Anna</rdf:li><rdf:li>Ben</rdf:li></rdf:Seq></dc:creator>
  </rdf:Description>
  <rdf:Description rdf:about="" xmlns:xap="http://ns.adobe.com/xap/1.0/" xmlns:xapGImg="http://ns.adobe.com/xap/1.0/g/img/" xap:CreatorTool="Writer">
   <xap:CreateDate>2020-01-02T03:04:05Z</xap:CreateDate>
   <xap:Thumbnails><rdf:Alt><rdf:li rdf:parseType="Resource"><xapGImg:image>aGVs&#xA;bG8=</xapGImg:image></rdf:li></rdf:Alt></xap:Thumbnails>
  </rdf:Description>
 </rdf:RDF>
</x:xmpmeta>
<?xpacket end="w"?>"#;

    fn property<'a>(props: &'a [MetadataProperty], name: &str) -> &'a MetadataProperty {
        props.iter().find(|p| p.name() == name).unwrap()
    }

    #[test]
    fn test_properties_are_flattened_with_normalized_names() {
        let packet = XmpPacket::parse(PACKET.as_bytes()).unwrap();
        let props = packet.properties();

        assert_eq!(property(&props, "dc:title").values(), ["Der Titel"]);
        assert_eq!(property(&props, "dc:creator").values(), ["Anna", "Ben"]);
        assert_eq!(property(&props, "xmp:CreatorTool").value(), "Writer");
        let created = property(&props, "xmp:CreateDate");
        assert_eq!(created.declared_type(), DeclaredType::Date);
        assert!(props.iter().all(|p| !p.name().ends_with("Thumbnails")));
    }

    #[test]
    fn test_thumbnail_is_base64_decoded() {
        let packet = XmpPacket::parse(PACKET.as_bytes()).unwrap();
        assert_eq!(packet.thumbnail().unwrap(), b"hello");
    }

    #[test]
    fn test_changed_value_keeps_container_shape() {
        let packet = XmpPacket::parse(PACKET.as_bytes()).unwrap();
        let props = packet.properties();
        let PropertyPayload::PdfXmpNode { namespace, element } = property(&props, "dc:title").payload() else {
            panic!("expected XMP payload");
        };

        let rebuilt = build_element(&element.name, namespace, &["Neuer Titel".to_string()], Some(element));
        assert_eq!(
            rebuilt.to_xml_string().unwrap(),
            r#"<dc:title><rdf:Alt><rdf:li xml:lang="de-DE">Neuer Titel</rdf:li></rdf:Alt></dc:title>"#
        );
    }

    #[test]
    fn test_default_containers() {
        let creator = build_element("dc:creator", DC_NS, &["A".into(), "B".into()], None);
        insta::assert_snapshot!(
            creator.to_xml_string().unwrap(),
            @"<dc:creator><rdf:Seq><rdf:li>A</rdf:li><rdf:li>B</rdf:li></rdf:Seq></dc:creator>"
        );
        let title = build_element("dc:title", DC_NS, &["T".into()], None);
        insta::assert_snapshot!(
            title.to_xml_string().unwrap(),
            @r#"<dc:title><rdf:Alt><rdf:li xml:lang="x-default">T</rdf:li></rdf:Alt></dc:title>"#
        );
        let keywords = build_element("pdf:Keywords", PDF_NS, &["a".into(), "b".into()], None);
        assert_eq!(keywords.to_xml_string().unwrap(), "<pdf:Keywords>a, b</pdf:Keywords>");
    }

    #[test]
    fn test_rebuild_keeps_structured_nodes_and_adds_schemas() {
        let mut packet = XmpPacket::parse(PACKET.as_bytes()).unwrap();
        let entries = vec![
            XmpEntry {
                namespace: DC_NS.to_string(),
                element: build_element("dc:title", DC_NS, &["Fresh".into()], None),
            },
            XmpEntry {
                namespace: PDF_NS.to_string(),
                element: build_element("pdf:Producer", PDF_NS, &["ebookmeta".into()], None),
            },
        ];
        packet.rebuild(&entries).unwrap();

        let reparsed = XmpPacket::parse(&packet.to_bytes().unwrap()).unwrap();
        let props = reparsed.properties();
        assert_eq!(property(&props, "dc:title").value(), "Fresh");
        assert_eq!(property(&props, "pdf:Producer").value(), "ebookmeta");
        assert!(props.iter().all(|p| p.name() != "dc:creator"));
        assert_eq!(reparsed.thumbnail().unwrap(), b"hello");
    }

    #[test]
    fn test_new_packet_is_wrapped_in_xpacket() {
        let mut packet = XmpPacket::new();
        packet
            .rebuild(&[XmpEntry {
                namespace: DC_NS.to_string(),
                element: build_element("dc:title", DC_NS, &["T".into()], None),
            }])
            .unwrap();
        let text = String::from_utf8(packet.to_bytes().unwrap()).unwrap();
        assert!(text.starts_with("<?xpacket begin="));
        assert!(text.trim_end().ends_with(r#"<?xpacket end="w"?>"#));
        assert!(text.contains(r#"xmlns:dc="http://purl.org/dc/elements/1.1/""#));
    }

    #[test]
    fn test_mirror_lookup() {
        assert_eq!(mirror_for_xmp(XMP_NS, "ModifyDate"), Some("ModDate"));
        assert_eq!(mirror_for_info("Subject"), Some((DC_NS, "description")));
        assert_eq!(mirror_for_info("SourceModified"), None);
    }
}
