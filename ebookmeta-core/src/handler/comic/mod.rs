//! Comic book archive (CBZ) metadata handler

mod comic_info;

pub use comic_info::{ComicInfo, FieldKind, COMIC_FIELDS, YES_NO};

use comic_info::{split_dates, validate};

use super::archive::Archive;
use super::cover::normalize_cover;
use super::source::CachedContainer;
use super::{MetadataReader, MetadataWriter};
use crate::error::{ParseError, Result, ValidationError};
use crate::storage::replace_atomically;
use crate::types::{
    mime, CanonicalType, CoverImage, MetadataProperty, PlainMetadata, Resource,
};
use std::collections::BTreeMap;
use zip::CompressionMethod;

/// ComicInfo fields with a canonical meaning
const COMIC_MAPPING: &[(&str, CanonicalType)] = &[
    ("Title", CanonicalType::Title),
    ("Series", CanonicalType::SeriesName),
    ("Number", CanonicalType::SeriesIndex),
    ("Writer", CanonicalType::Author),
    ("Genre", CanonicalType::Genre),
    ("Summary", CanonicalType::Description),
    ("Publisher", CanonicalType::Publisher),
    ("LanguageISO", CanonicalType::Language),
    ("CommunityRating", CanonicalType::Rating),
    ("AgeRating", CanonicalType::AgeSuggestion),
    ("Tags", CanonicalType::Keywords),
    ("GTIN", CanonicalType::Isbn),
    ("Year", CanonicalType::PublicationDate),
];

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];

fn image_mime_for_name(name: &str) -> Option<&'static str> {
    let extension = name.rsplit('.').next()?.to_lowercase();
    if !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        return None;
    }
    Some(match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/bmp",
    })
}

/// A parsed comic archive
pub struct ComicContainer {
    archive: Archive,
    info_entry: Option<String>,
    info_bytes: Option<Vec<u8>>,
    info: Option<ComicInfo>,
}

impl ComicContainer {
    pub fn open(bytes: Vec<u8>) -> Result<Self> {
        let archive = Archive::open(bytes)?;
        let info_entry = archive
            .lookup(comic_info::FILE_NAME)
            .or_else(|| {
                archive.entry_names().iter().map(String::as_str).find(|name| {
                    name.rsplit('/')
                        .next()
                        .map(|file| file.eq_ignore_ascii_case(comic_info::FILE_NAME))
                        .unwrap_or(false)
                })
            })
            .map(str::to_string);

        let (info_bytes, info) = match &info_entry {
            Some(name) => {
                let bytes = archive.read_entry(name)?;
                let info = ComicInfo::parse(&bytes)?;
                (Some(bytes), Some(info))
            }
            None => (None, None),
        };
        tracing::debug!("Opened comic archive, ComicInfo at {:?}", info_entry);

        Ok(Self {
            archive,
            info_entry,
            info_bytes,
            info,
        })
    }

    pub fn properties(&self) -> Vec<MetadataProperty> {
        self.info.as_ref().map(ComicInfo::properties).unwrap_or_default()
    }

    /// Image entries ordered by name
    pub fn image_entries(&self) -> Vec<&str> {
        let mut images: Vec<&str> = self
            .archive
            .entry_names()
            .iter()
            .map(String::as_str)
            .filter(|name| !name.ends_with('/') && image_mime_for_name(name).is_some())
            .collect();
        images.sort_by_key(|name| name.to_lowercase());
        images
    }

    /// Entry holding the cover: the `FrontCover` page, else the first image
    pub fn cover_entry(&self) -> Option<&str> {
        let images = self.image_entries();
        let front = self.info.as_ref().and_then(ComicInfo::front_cover_image);
        match front.and_then(|index| images.get(index).copied()) {
            Some(entry) => Some(entry),
            None => images.first().copied(),
        }
    }

    pub fn read_cover(&self) -> Result<Option<CoverImage>> {
        let Some(entry) = self.cover_entry() else {
            return Ok(None);
        };
        let mime_type = image_mime_for_name(entry).unwrap_or("image/jpeg");
        let bytes = self.archive.read_entry(entry)?;
        Ok(Some(CoverImage::new(bytes, mime_type).with_source(entry)))
    }
}

/// Reads ComicInfo metadata from a CBZ archive
pub struct ComicReader {
    container: CachedContainer<ComicContainer>,
}

impl ComicReader {
    pub fn new(resource: Resource) -> Self {
        Self {
            container: CachedContainer::new(resource),
        }
    }

    fn parsed(&mut self) -> Result<&mut ComicContainer> {
        self.container.get_or_parse(ComicContainer::open)
    }
}

impl MetadataReader for ComicReader {
    fn resources(&self) -> &[Resource] {
        std::slice::from_ref(self.container.resource())
    }

    fn try_read_metadata(&mut self) -> Result<Vec<MetadataProperty>> {
        Ok(self.parsed()?.properties())
    }

    fn try_read_cover(&mut self) -> Result<Option<CoverImage>> {
        self.parsed()?.read_cover()
    }

    fn try_plain_metadata(&mut self) -> Result<Option<PlainMetadata>> {
        Ok(self.parsed()?.info_bytes.clone().map(|bytes| PlainMetadata {
            bytes,
            mime_type: mime::TEXT_XML,
        }))
    }

    fn canonical_type_of(&self, property: &MetadataProperty) -> Option<CanonicalType> {
        COMIC_MAPPING
            .iter()
            .find(|(name, _)| *name == property.name())
            .map(|(_, canonical)| *canonical)
    }

    fn create_property(&self, canonical: CanonicalType) -> Option<MetadataProperty> {
        let (name, _) = COMIC_MAPPING.iter().find(|(_, c)| *c == canonical)?;
        Some(MetadataProperty::new(*name, "").with_type(canonical.declared_type()))
    }

    fn dispose(&mut self) {
        self.container.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.container.is_disposed()
    }
}

/// Rewrites ComicInfo.xml and the cover image of a CBZ archive
pub struct ComicWriter {
    resource: Resource,
}

impl ComicWriter {
    pub fn new(resource: Resource) -> Self {
        Self { resource }
    }

    fn open(&self) -> Result<ComicContainer> {
        ComicContainer::open(self.resource.read_bytes()?)
    }

    fn commit(&self, container: &ComicContainer, replacements: BTreeMap<String, Vec<u8>>) -> Result<()> {
        replace_atomically(self.resource.path(), |file| {
            container
                .archive
                .rewrite(file, &replacements, CompressionMethod::Deflated)
        })?;
        tracing::info!("Wrote {}", self.resource.name());
        Ok(())
    }

    fn info_entry(container: &ComicContainer) -> String {
        container
            .info_entry
            .clone()
            .unwrap_or_else(|| comic_info::FILE_NAME.to_string())
    }
}

impl MetadataWriter for ComicWriter {
    fn resource(&self) -> &Resource {
        &self.resource
    }

    fn write_metadata(&mut self, properties: &[MetadataProperty]) -> Result<()> {
        let properties = split_dates(properties);
        validate(&properties)?;

        let container = self.open()?;
        let mut info = container.info.clone().unwrap_or_default();
        info.rebuild(&properties)?;

        let mut replacements = BTreeMap::new();
        replacements.insert(Self::info_entry(&container), info.to_bytes()?);
        self.commit(&container, replacements)
    }

    fn set_cover(&mut self, image: &[u8]) -> Result<()> {
        let container = self.open()?;
        let entry = container
            .cover_entry()
            .ok_or_else(|| ParseError::MissingEntry("image entry for the cover".to_string()))?
            .to_string();
        let mime_type = image_mime_for_name(&entry).unwrap_or("image/jpeg");
        tracing::debug!("Replacing comic cover {}", entry);

        let mut replacements = BTreeMap::new();
        replacements.insert(entry, normalize_cover(image, mime_type)?);
        self.commit(&container, replacements)
    }

    fn store_plain_metadata(&mut self, bytes: &[u8]) -> Result<()> {
        ComicInfo::parse(bytes).map_err(|e| ValidationError::MalformedXml(e.to_string()))?;

        let container = self.open()?;
        let mut replacements = BTreeMap::new();
        replacements.insert(Self::info_entry(&container), bytes.to_vec());
        self.commit(&container, replacements)
    }
}
