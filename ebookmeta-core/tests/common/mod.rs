//! Fixture builders for integration tests
//!
//! Containers are authored programmatically with `zip` and `lopdf` inside a
//! temporary directory, so every test works on its own copy.

#![allow(dead_code)]

use ebookmeta_core::Resource;
use lopdf::{dictionary, Document, Object, Stream};
use std::io::{Cursor, Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

/// OPF with the given metadata children and a cover-less manifest
pub fn opf(metadata: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf" unique-identifier="BookId" version="2.0">
  <metadata>
    {metadata}
  </metadata>
  <manifest>
    <item id="ch1" href="chapter1.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine>
    <itemref idref="ch1"/>
  </spine>
</package>"#
    )
}

pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        let method = if *name == "mimetype" {
            CompressionMethod::Stored
        } else {
            CompressionMethod::Deflated
        };
        writer
            .start_file(*name, FileOptions::default().compression_method(method))
            .unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn epub_bytes(opf: &str, extra: &[(&str, &[u8])]) -> Vec<u8> {
    epub_bytes_with(opf.as_bytes(), extra)
}

/// EPUB whose package document is stored exactly as given
pub fn epub_bytes_raw(opf: &[u8]) -> Vec<u8> {
    epub_bytes_with(opf, &[])
}

fn epub_bytes_with(opf: &[u8], extra: &[(&str, &[u8])]) -> Vec<u8> {
    let mut entries: Vec<(&str, &[u8])> = vec![
        ("mimetype", b"application/epub+zip"),
        ("META-INF/container.xml", CONTAINER_XML.as_bytes()),
        ("OEBPS/content.opf", opf),
        ("OEBPS/chapter1.xhtml", b"<html><body><p>Hello</p></body></html>"),
    ];
    entries.extend_from_slice(extra);
    zip_bytes(&entries)
}

pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> Resource {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    Resource::new(path)
}

pub fn epub(dir: &Path, name: &str, metadata: &str) -> Resource {
    write_file(dir, name, &epub_bytes(&opf(metadata), &[]))
}

pub fn comic_info(fields: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<ComicInfo xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xsd="http://www.w3.org/2001/XMLSchema">
  {fields}
</ComicInfo>"#
    )
}

pub fn cbz(dir: &Path, name: &str, info: Option<&str>) -> Resource {
    let mut entries: Vec<(&str, &[u8])> = vec![
        ("page001.jpg", b"\xFF\xD8\xFF\xE0page1"),
        ("page002.jpg", b"\xFF\xD8\xFF\xE0page2"),
    ];
    if let Some(info) = info {
        entries.push(("ComicInfo.xml", info.as_bytes()));
    }
    write_file(dir, name, &zip_bytes(&entries))
}

pub fn read_entry(path: &Path, name: &str) -> Vec<u8> {
    let bytes = std::fs::read(path).unwrap();
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut data = Vec::new();
    file.read_to_end(&mut data).unwrap();
    data
}

pub fn entry_names(path: &Path) -> Vec<String> {
    let bytes = std::fs::read(path).unwrap();
    let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    archive.file_names().map(str::to_string).collect()
}

/// Single-page PDF with an Info dictionary and optional image XObjects
/// given as (width, height, bits per component)
pub fn pdf_bytes(info: &[(&str, &str)], images: &[(i64, i64, i64)]) -> Vec<u8> {
    let mut document = Document::with_version("1.5");
    let pages_id = document.new_object_id();

    for (width, height, bpc) in images {
        let samples = (width * height * 3) as usize;
        document.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => *width,
                "Height" => *height,
                "BitsPerComponent" => *bpc,
                "ColorSpace" => "DeviceRGB",
            },
            vec![0x80; samples],
        ));
    }

    let page_id = document.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    });
    document.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    document.trailer.set("Root", catalog_id);

    let mut info_dict = lopdf::Dictionary::new();
    for (key, value) in info {
        info_dict.set(*key, Object::string_literal(*value));
    }
    let info_id = document.add_object(info_dict);
    document.trailer.set("Info", info_id);

    let mut out = Vec::new();
    document.save_to(&mut out).unwrap();
    out
}

pub fn pdf(dir: &Path, name: &str, info: &[(&str, &str)]) -> Resource {
    write_file(dir, name, &pdf_bytes(info, &[]))
}
