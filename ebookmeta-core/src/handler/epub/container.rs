//! EPUB zip container

use super::opf::{ManifestItem, OpfPackage};
use crate::error::{ParseError, Result};
use crate::handler::archive::Archive;
use crate::types::CoverImage;
use crate::xml::XmlDocument;
use std::collections::BTreeMap;
use std::io::{Seek, Write};
use zip::CompressionMethod;

const CONTAINER_PATH: &str = "META-INF/container.xml";
const OPF_MEDIA_TYPE: &str = "application/oebps-package+xml";

/// Location of the cover image inside the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverEntry {
    pub entry_name: String,
    pub media_type: String,
    /// Manifest item the entry was resolved through, if any
    pub manifest_id: Option<String>,
}

/// A parsed EPUB: archive, package path and package document
pub struct EpubContainer {
    archive: Archive,
    opf_path: String,
    opf_bytes: Vec<u8>,
    package: OpfPackage,
}

impl EpubContainer {
    pub fn open(bytes: Vec<u8>) -> Result<Self> {
        let archive = Archive::open(bytes)?;
        let container = archive.read_entry(CONTAINER_PATH)?;
        let wanted = opf_path_from_container(&container)?;
        let opf_path = archive
            .lookup(&wanted)
            .ok_or_else(|| ParseError::MissingEntry(wanted.clone()))?
            .to_string();
        let opf_bytes = archive.read_entry(&opf_path)?;
        let package = OpfPackage::parse(&opf_bytes)?;
        tracing::debug!("Opened EPUB package at {}", opf_path);

        Ok(Self {
            archive,
            opf_path,
            opf_bytes,
            package,
        })
    }

    pub fn opf_path(&self) -> &str {
        &self.opf_path
    }

    /// Directory of the package document, with trailing slash
    pub fn opf_dir(&self) -> &str {
        opf_dir(&self.opf_path)
    }

    /// Package document bytes as stored in the archive
    pub fn opf_bytes(&self) -> &[u8] {
        &self.opf_bytes
    }

    pub fn package(&self) -> &OpfPackage {
        &self.package
    }

    pub fn package_mut(&mut self) -> &mut OpfPackage {
        &mut self.package
    }

    pub fn has_entry(&self, name: &str) -> bool {
        self.archive.lookup(name).is_some()
    }

    pub fn read_entry(&self, name: &str) -> Result<Vec<u8>> {
        self.archive.read_entry(name)
    }

    /// Archive path of a manifest href
    pub fn resolve_href(&self, href: &str) -> String {
        let decoded = percent_decode(href);
        normalize_path(&format!("{}{}", self.opf_dir(), decoded))
    }

    /// Find the cover image entry
    ///
    /// The declared cover (meta `cover` or a `cover-image` manifest item) wins
    /// when its entry exists. Otherwise entries named like the declared file,
    /// then any `cover*` JPEG, are tried.
    pub fn cover_entry(&self) -> Option<CoverEntry> {
        if let Some(entry) = self.declared_cover_entry() {
            return Some(entry);
        }

        let guess = match self.package.cover_image_item() {
            Some(item) => Some(self.resolve_href(&item.href)),
            None => self.package.cover_id().map(|id| percent_decode(&id)),
        };
        let names = self.archive.entry_names();

        if let Some(guess) = guess {
            let wanted = file_stem(&guess).to_lowercase();
            let by_name = names.iter().find(|name| {
                let decoded = percent_decode(name).to_lowercase();
                is_jpeg_name(&decoded)
                    && (decoded.ends_with(&guess.to_lowercase()) || file_stem(&decoded) == wanted)
            });
            if let Some(name) = by_name {
                tracing::debug!("Cover found by declared name: {}", name);
                return Some(jpeg_entry(name));
            }
        }

        names
            .iter()
            .find(|name| {
                let decoded = percent_decode(name).to_lowercase();
                is_jpeg_name(&decoded) && file_name(&decoded).starts_with("cover")
            })
            .map(|name| {
                tracing::debug!("Cover found by file name: {}", name);
                jpeg_entry(name)
            })
    }

    /// The declared cover item, only when its entry exists in the archive
    pub fn declared_cover_entry(&self) -> Option<CoverEntry> {
        let item = self.package.cover_image_item()?;
        let path = self.resolve_href(&item.href);
        let name = self
            .archive
            .entry_names()
            .iter()
            .find(|name| percent_decode(name) == path)?;
        Some(CoverEntry {
            entry_name: name.clone(),
            media_type: item.media_type,
            manifest_id: Some(item.id),
        })
    }

    pub fn read_cover(&self) -> Result<Option<CoverImage>> {
        let Some(entry) = self.cover_entry() else {
            return Ok(None);
        };
        let bytes = self.read_entry(&entry.entry_name)?;
        Ok(Some(
            CoverImage::new(bytes, entry.media_type).with_source(entry.entry_name),
        ))
    }

    /// First free `cover`, `cover1`, ... id whose file is not yet taken
    pub fn free_cover_slot(&self, extension: &str) -> (String, String) {
        let items = self.package.manifest_items();
        let taken = |id: &str, href: &str| {
            items.iter().any(|i: &ManifestItem| i.id == id || i.href == href)
                || self.has_entry(&format!("{}{}", self.opf_dir(), href))
        };
        let mut n = 0usize;
        loop {
            let id = if n == 0 {
                "cover".to_string()
            } else {
                format!("cover{n}")
            };
            let href = format!("{id}.{extension}");
            if !taken(&id, &href) {
                return (id, href);
            }
            n += 1;
        }
    }

    pub fn rewrite<W: Write + Seek>(
        &self,
        out: W,
        replacements: &BTreeMap<String, Vec<u8>>,
        compression: CompressionMethod,
    ) -> Result<()> {
        self.archive.rewrite(out, replacements, compression)
    }
}

/// Package path from `META-INF/container.xml`
pub fn opf_path_from_container(xml: &[u8]) -> Result<String> {
    let document = XmlDocument::parse_bytes(xml)?;
    let rootfiles = document
        .root
        .find_descendant_local("rootfiles")
        .ok_or_else(|| ParseError::MalformedContent("container.xml has no <rootfiles>".to_string()))?;

    let candidates: Vec<_> = rootfiles
        .child_elements()
        .filter(|e| e.local_name() == "rootfile")
        .collect();
    candidates
        .iter()
        .find(|e| e.attribute("media-type") == Some(OPF_MEDIA_TYPE))
        .or_else(|| candidates.first())
        .and_then(|e| e.attribute("full-path"))
        .map(|p| p.trim_start_matches('/').to_string())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ParseError::MalformedContent("container.xml has no rootfile path".to_string()).into())
}

/// Directory part of a package path, keeping the trailing slash
pub fn opf_dir(opf_path: &str) -> &str {
    match opf_path.rfind('/') {
        Some(i) => &opf_path[..=i],
        None => "",
    }
}

fn percent_decode(text: &str) -> String {
    urlencoding::decode(text)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| text.to_string())
}

/// Collapse `.` and `..` segments
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn file_stem(path: &str) -> &str {
    let name = file_name(path);
    match name.rfind('.') {
        Some(i) if i > 0 => &name[..i],
        _ => name,
    }
}

fn is_jpeg_name(name: &str) -> bool {
    name.ends_with(".jpg") || name.ends_with(".jpeg")
}

fn jpeg_entry(name: &str) -> CoverEntry {
    CoverEntry {
        entry_name: name.to_string(),
        media_type: "image/jpeg".to_string(),
        manifest_id: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::archive::build_zip;

    const CONTAINER_XML: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

    fn build_epub(opf: &str, extra: &[(&str, &[u8])]) -> Vec<u8> {
        let mut entries: Vec<(&str, &[u8])> = vec![
            ("mimetype", b"application/epub+zip"),
            (CONTAINER_PATH, CONTAINER_XML.as_bytes()),
            ("OEBPS/content.opf", opf.as_bytes()),
        ];
        entries.extend_from_slice(extra);
        build_zip(&entries)
    }

    fn opf_with(metadata: &str, manifest: &str) -> String {
        format!(
            r#"<package xmlns="http://www.idpf.org/2007/opf" xmlns:dc="http://purl.org/dc/elements/1.1/" unique-identifier="id" version="2.0"><metadata>{metadata}</metadata><manifest>{manifest}</manifest></package>"#
        )
    }

    #[test]
    fn test_opf_path_and_dir() {
        let epub = build_epub(&opf_with("", ""), &[]);
        let container = EpubContainer::open(epub).unwrap();
        assert_eq!(container.opf_path(), "OEBPS/content.opf");
        assert_eq!(container.opf_dir(), "OEBPS/");
        assert_eq!(opf_dir("content.opf"), "");
    }

    #[test]
    fn test_missing_container_xml() {
        let bytes = build_zip(&[("mimetype", b"application/epub+zip")]);
        assert!(EpubContainer::open(bytes).is_err());
    }

    #[test]
    fn test_declared_cover_with_encoded_href() {
        let epub = build_epub(
            &opf_with(
                r#"<meta name="cover" content="c"/>"#,
                r#"<item id="c" href="images/my%20cover.png" media-type="image/png"/>"#,
            ),
            &[("OEBPS/images/my cover.png", b"png-bytes")],
        );
        let container = EpubContainer::open(epub).unwrap();
        let entry = container.cover_entry().unwrap();
        assert_eq!(entry.entry_name, "OEBPS/images/my cover.png");
        assert_eq!(entry.media_type, "image/png");
        assert_eq!(entry.manifest_id.as_deref(), Some("c"));
    }

    #[test]
    fn test_cover_image_property() {
        let epub = build_epub(
            &opf_with(
                "",
                r#"<item id="img" href="art.jpg" media-type="image/jpeg" properties="cover-image"/>"#,
            ),
            &[("OEBPS/art.jpg", b"jpg")],
        );
        let container = EpubContainer::open(epub).unwrap();
        assert_eq!(container.read_cover().unwrap().unwrap().bytes, b"jpg");
    }

    #[test]
    fn test_cover_by_guessed_name() {
        // Declared item points at a missing path; the file lives elsewhere
        let epub = build_epub(
            &opf_with(
                r#"<meta name="cover" content="c"/>"#,
                r#"<item id="c" href="img/front.jpg" media-type="image/jpeg"/>"#,
            ),
            &[("OEBPS/Images/Front.JPG", b"x"), ("OEBPS/Images/other.jpg", b"y")],
        );
        let container = EpubContainer::open(epub).unwrap();
        assert_eq!(container.cover_entry().unwrap().entry_name, "OEBPS/Images/Front.JPG");
    }

    #[test]
    fn test_cover_by_file_name_fallback() {
        let epub = build_epub(&opf_with("", ""), &[("OEBPS/cover.jpeg", b"x")]);
        let container = EpubContainer::open(epub).unwrap();
        assert_eq!(container.cover_entry().unwrap().entry_name, "OEBPS/cover.jpeg");
    }

    #[test]
    fn test_no_cover() {
        let epub = build_epub(&opf_with("", ""), &[("OEBPS/page.xhtml", b"<html/>")]);
        let container = EpubContainer::open(epub).unwrap();
        assert!(container.read_cover().unwrap().is_none());
    }

    #[test]
    fn test_free_cover_slot_skips_taken_ids() {
        let epub = build_epub(
            &opf_with("", r#"<item id="cover" href="title.xhtml" media-type="application/xhtml+xml"/>"#),
            &[],
        );
        let container = EpubContainer::open(epub).unwrap();
        assert_eq!(
            container.free_cover_slot("jpg"),
            ("cover1".to_string(), "cover1.jpg".to_string())
        );
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("OEBPS/text/../images/a.jpg"), "OEBPS/images/a.jpg");
        assert_eq!(normalize_path("./a.jpg"), "a.jpg");
    }
}
