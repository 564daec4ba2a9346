//! PDF metadata handler
//!
//! A PDF carries metadata twice: the flat Info dictionary and an XMP packet
//! referenced from the catalog. On read, an Info entry whose XMP counterpart
//! holds a value is dropped in favour of the XMP property. On write both
//! channels are regenerated from the same property list.

mod cover;
mod info;
mod xmp;

pub use cover::CoverHeuristic;
pub use xmp::{XmpEntry, XmpPacket};

use super::cover::image_mime_type;
use super::source::CachedContainer;
use super::{MetadataReader, MetadataWriter};
use crate::error::{ParseError, Result, ValidationError, WriteError};
use crate::storage::replace_atomically;
use crate::types::date::{format_iso_date, format_pdf_date, parse_date_fixed};
use crate::types::{
    mime, CanonicalType, CoverImage, DeclaredType, MetadataProperty, PlainMetadata, PropertyPayload,
    Resource,
};
use crate::xml::{decode_numeric_references, XmlElement};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

/// XMP properties with a canonical meaning
const XMP_MAPPING: &[(&str, &str, CanonicalType)] = &[
    (xmp::DC_NS, "title", CanonicalType::Title),
    (xmp::DC_NS, "creator", CanonicalType::Author),
    (xmp::DC_NS, "description", CanonicalType::Description),
    (xmp::DC_NS, "subject", CanonicalType::Genre),
    (xmp::DC_NS, "publisher", CanonicalType::Publisher),
    (xmp::DC_NS, "rights", CanonicalType::Rights),
    (xmp::DC_NS, "language", CanonicalType::Language),
    (xmp::PDF_NS, "Keywords", CanonicalType::Keywords),
    (xmp::XMP_NS, "CreateDate", CanonicalType::CreationDate),
    (xmp::XMP_NS, "ModifyDate", CanonicalType::ModificationDate),
    (xmp::XMP_NS, "Rating", CanonicalType::Rating),
    (xmp::XMP_MM_NS, "DocumentID", CanonicalType::Uuid),
];

/// XMP namespace and local name a property is stored under, if any
///
/// Properties read from XMP carry it in their payload; plain properties are
/// either `prefix:local` names of a known schema or Info keys with an XMP
/// counterpart.
fn xmp_identity(property: &MetadataProperty) -> Option<(String, String)> {
    match property.payload() {
        PropertyPayload::PdfXmpNode { namespace, element } => {
            Some((namespace.clone(), element.local_name().to_string()))
        }
        _ => match property.name().split_once(':') {
            Some((prefix, local)) => {
                xmp::namespace_for_prefix(prefix).map(|ns| (ns.to_string(), local.to_string()))
            }
            None => xmp::mirror_for_info(property.name())
                .map(|(ns, local)| (ns.to_string(), local.to_string())),
        },
    }
}

/// Info key a property is stored under, if any
fn info_key(property: &MetadataProperty) -> Option<String> {
    match property.payload() {
        PropertyPayload::PdfXmpNode { .. } => {
            let (namespace, local) = xmp_identity(property)?;
            xmp::mirror_for_xmp(&namespace, &local).map(str::to_string)
        }
        _ if property.name().contains(':') => {
            let (namespace, local) = xmp_identity(property)?;
            xmp::mirror_for_xmp(&namespace, &local).map(str::to_string)
        }
        _ => Some(property.name().to_string()),
    }
}

fn canonical_for(property: &MetadataProperty) -> Option<CanonicalType> {
    let (namespace, local) = xmp_identity(property)?;
    XMP_MAPPING
        .iter()
        .find(|(ns, name, _)| *ns == namespace && *name == local)
        .map(|(_, _, canonical)| *canonical)
}

fn new_property(canonical: CanonicalType) -> Option<MetadataProperty> {
    let (namespace, local, _) = XMP_MAPPING.iter().find(|(_, _, c)| *c == canonical)?;
    let prefix = xmp::preferred_prefix(namespace)?;
    Some(MetadataProperty::new(format!("{prefix}:{local}"), "").with_type(canonical.declared_type()))
}

fn catalog_id(document: &Document) -> Result<ObjectId> {
    document
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|e| ParseError::InvalidPdf(format!("No document catalog: {e}")).into())
}

/// Raw bytes of the catalog's `/Metadata` stream
fn metadata_stream(document: &Document) -> Option<Vec<u8>> {
    let catalog = document.get_object(catalog_id(document).ok()?).ok()?.as_dict().ok()?;
    let id = catalog.get(b"Metadata").ok()?.as_reference().ok()?;
    let stream = document.get_object(id).ok()?.as_stream().ok()?;
    match stream.dict.get(b"Filter") {
        Ok(_) => stream.decompressed_content().ok(),
        Err(_) => Some(stream.content.clone()),
    }
}

/// Store `packet` as the catalog's `/Metadata` stream, replacing any existing one
fn set_metadata_stream(document: &mut Document, packet: Vec<u8>) -> Result<()> {
    let catalog = catalog_id(document)?;
    let stream = Object::Stream(Stream::new(
        dictionary! {
            "Type" => "Metadata",
            "Subtype" => "XML",
        },
        packet,
    ));

    let existing = document
        .get_object(catalog)
        .and_then(Object::as_dict)
        .ok()
        .and_then(|dict| dict.get(b"Metadata").ok())
        .and_then(|o| o.as_reference().ok());

    match existing {
        Some(id) => {
            document.objects.insert(id, stream);
        }
        None => {
            let id = document.add_object(stream);
            document
                .get_object_mut(catalog)
                .and_then(Object::as_dict_mut)
                .map_err(|e| ParseError::InvalidPdf(format!("Catalog is not a dictionary: {e}")))?
                .set("Metadata", Object::Reference(id));
        }
    }
    Ok(())
}

fn load(bytes: &[u8]) -> Result<Document> {
    Document::load_mem(bytes).map_err(|e| ParseError::InvalidPdf(e.to_string()).into())
}

fn save(resource: &Resource, mut document: Document) -> Result<()> {
    replace_atomically(resource.path(), |file| {
        document
            .save_to(file)
            .map_err(|e| WriteError::EncodingFailed(format!("PDF serialization failed: {e}")).into())
    })?;
    tracing::info!("Wrote {}", resource.name());
    Ok(())
}

/// A loaded PDF with both metadata channels extracted
pub struct PdfContainer {
    document: Document,
    info: Vec<(String, String)>,
    xmp: Option<XmpPacket>,
    xmp_bytes: Option<Vec<u8>>,
}

impl PdfContainer {
    pub fn open(bytes: Vec<u8>) -> Result<Self> {
        let document = load(&bytes)?;
        let info = info::read_info(&document);
        let xmp_bytes = metadata_stream(&document);
        let xmp = xmp_bytes.as_deref().and_then(|bytes| match XmpPacket::parse(bytes) {
            Ok(packet) => Some(packet),
            Err(e) => {
                tracing::warn!("Ignoring unreadable XMP packet: {}", e);
                None
            }
        });
        Ok(Self {
            document,
            info,
            xmp,
            xmp_bytes,
        })
    }

    /// Info entries without an XMP counterpart, followed by all XMP properties
    pub fn properties(&self) -> Vec<MetadataProperty> {
        let xmp_properties = self.xmp.as_ref().map(XmpPacket::properties).unwrap_or_default();
        let shadowed: Vec<String> = xmp_properties
            .iter()
            .filter(|p| !p.is_empty())
            .filter_map(info_key)
            .collect();

        let mut properties: Vec<MetadataProperty> = self
            .info
            .iter()
            .filter(|(key, _)| {
                let hidden = shadowed.contains(key);
                if hidden {
                    tracing::debug!("Info entry {} superseded by XMP", key);
                }
                !hidden
            })
            .map(|(key, value)| {
                let property = MetadataProperty::new(key.as_str(), value.as_str());
                if info::DATE_KEYS.contains(&key.as_str()) {
                    property.with_type(DeclaredType::Date)
                } else {
                    property
                }
            })
            .collect();
        properties.extend(xmp_properties);
        properties
    }
}

/// Reads metadata and cover from a PDF
pub struct PdfReader {
    container: CachedContainer<PdfContainer>,
    heuristic: CoverHeuristic,
}

impl PdfReader {
    pub fn new(resource: Resource) -> Self {
        Self {
            container: CachedContainer::new(resource),
            heuristic: CoverHeuristic::default(),
        }
    }

    pub fn with_cover_heuristic(mut self, heuristic: CoverHeuristic) -> Self {
        self.heuristic = heuristic;
        self
    }

    fn parsed(&mut self) -> Result<&mut PdfContainer> {
        self.container.get_or_parse(PdfContainer::open)
    }
}

impl MetadataReader for PdfReader {
    fn resources(&self) -> &[Resource] {
        std::slice::from_ref(self.container.resource())
    }

    fn try_read_metadata(&mut self) -> Result<Vec<MetadataProperty>> {
        Ok(self.parsed()?.properties())
    }

    fn try_read_cover(&mut self) -> Result<Option<CoverImage>> {
        let heuristic = self.heuristic;
        let container = self.parsed()?;

        if let Some(thumbnail) = container.xmp.as_ref().and_then(XmpPacket::thumbnail) {
            tracing::debug!("Using XMP thumbnail as cover");
            let mime_type = image_mime_type(&thumbnail).unwrap_or("image/jpeg");
            return Ok(Some(
                CoverImage::new(thumbnail, mime_type).with_source("xmp:Thumbnails"),
            ));
        }
        Ok(cover::find_cover(&container.document, &heuristic))
    }

    fn try_plain_metadata(&mut self) -> Result<Option<PlainMetadata>> {
        Ok(self.parsed()?.xmp_bytes.as_ref().map(|bytes| PlainMetadata {
            bytes: decode_numeric_references(&String::from_utf8_lossy(bytes)).into_bytes(),
            mime_type: mime::TEXT_XML,
        }))
    }

    fn canonical_type_of(&self, property: &MetadataProperty) -> Option<CanonicalType> {
        canonical_for(property)
    }

    fn create_property(&self, canonical: CanonicalType) -> Option<MetadataProperty> {
        new_property(canonical)
    }

    fn dispose(&mut self) {
        self.container.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.container.is_disposed()
    }
}

/// Rewrites the Info dictionary and XMP packet of a PDF
pub struct PdfWriter {
    resource: Resource,
}

impl PdfWriter {
    pub fn new(resource: Resource) -> Self {
        Self { resource }
    }
}

/// True when `property` still holds the Info value it was read from
fn is_stored_info(property: &MetadataProperty, stored: &[(String, String)]) -> bool {
    info_key(property).is_some_and(|key| {
        stored
            .iter()
            .any(|(k, v)| *k == key && v == property.value())
    })
}

/// XMP element for a property, or `None` for an unparsed date carried over
/// from the Info dictionary
fn xmp_element(
    property: &MetadataProperty,
    namespace: &str,
    local: &str,
    carried: bool,
) -> Result<Option<XmlElement>> {
    let template = match property.payload() {
        PropertyPayload::PdfXmpNode { element, .. } => Some(element),
        _ => None,
    };
    if let Some(original) = template {
        if xmp::node_values(original) == property.values() {
            return Ok(Some(original.clone()));
        }
    }

    let name = match template {
        Some(original) => original.name.clone(),
        None => {
            let prefix = xmp::preferred_prefix(namespace).unwrap_or("xmp");
            format!("{prefix}:{local}")
        }
    };
    let values = if xmp::is_date_property(namespace, local) {
        let mut dates = Vec::new();
        for value in property.values().iter().filter(|v| !v.trim().is_empty()) {
            match parse_date_fixed(value) {
                Some(date) => dates.push(format_iso_date(&date)),
                None if carried => {
                    tracing::debug!("Not mirroring unparsed date {} into XMP", property.name());
                    return Ok(None);
                }
                None => return Err(WriteError::InvalidDate(value.clone()).into()),
            }
        }
        dates
    } else {
        property.values().to_vec()
    };
    Ok(Some(xmp::build_element(&name, namespace, &values, template)))
}

/// XMP element and Info entry for each property
///
/// `stored` holds the Info entries currently in the file. An Info date that
/// does not parse is written back as is when it is one of them.
fn plan(
    properties: &[MetadataProperty],
    stored: &[(String, String)],
) -> Result<(Vec<XmpEntry>, Vec<(String, Object)>)> {
    let mut entries = Vec::new();
    let mut info_entries: Vec<(String, Object)> = Vec::new();

    for property in properties.iter().filter(|p| !p.is_empty()) {
        let carried = is_stored_info(property, stored);

        if let Some((namespace, local)) = xmp_identity(property) {
            if let Some(element) = xmp_element(property, &namespace, &local, carried)? {
                entries.push(XmpEntry { namespace, element });
            }
        }

        if let Some(key) = info_key(property) {
            let value = if info::DATE_KEYS.contains(&key.as_str()) {
                match parse_date_fixed(property.value()) {
                    Some(date) => Object::string_literal(format_pdf_date(&date)),
                    None if carried => info::encode_text(property.value()),
                    None => {
                        return Err(WriteError::InvalidDate(property.value().to_string()).into())
                    }
                }
            } else {
                let single = xmp_identity(property)
                    .and_then(|(ns, local)| xmp::default_container(&ns, &local))
                    == Some(xmp::RdfContainer::Alt);
                if single {
                    info::encode_text(property.value())
                } else {
                    let joined: Vec<&str> = property
                        .values()
                        .iter()
                        .map(String::as_str)
                        .filter(|v| !v.trim().is_empty())
                        .collect();
                    info::encode_text(&joined.join(", "))
                }
            };
            info_entries.retain(|(k, _)| k != &key);
            info_entries.push((key, value));
        }
    }
    Ok((entries, info_entries))
}

impl MetadataWriter for PdfWriter {
    fn resource(&self) -> &Resource {
        &self.resource
    }

    fn write_metadata(&mut self, properties: &[MetadataProperty]) -> Result<()> {
        let mut document = load(&self.resource.read_bytes()?)?;
        let (entries, info_entries) = plan(properties, &info::read_info(&document))?;

        let mut packet = metadata_stream(&document)
            .and_then(|bytes| XmpPacket::parse(&bytes).ok())
            .unwrap_or_default();
        packet.rebuild(&entries)?;

        info::write_info(&mut document, &info_entries)?;
        set_metadata_stream(&mut document, packet.to_bytes()?)?;
        save(&self.resource, document)
    }

    fn store_plain_metadata(&mut self, bytes: &[u8]) -> Result<()> {
        XmpPacket::parse(bytes).map_err(|e| ValidationError::MalformedXml(e.to_string()))?;

        let mut document = load(&self.resource.read_bytes()?)?;
        set_metadata_stream(&mut document, bytes.to_vec())?;
        save(&self.resource, document)
    }
}
