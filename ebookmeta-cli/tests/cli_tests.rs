//! Integration tests for the ebookmeta CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::{Cursor, Write};
use std::path::PathBuf;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const CONTAINER_XML: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles><rootfile full-path="content.opf" media-type="application/oebps-package+xml"/></rootfiles>
</container>"#;

/// Create a minimal EPUB with the given title
fn create_test_epub(dir: &TempDir, name: &str, title: &str) -> PathBuf {
    let opf = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf" unique-identifier="BookId" version="2.0">
  <metadata>
    <dc:title>{title}</dc:title>
    <dc:identifier id="BookId" opf:scheme="uuid">urn:uuid:0f0e0d0c-0000-4000-8000-000000000000</dc:identifier>
  </metadata>
  <manifest/>
</package>"#
    );

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (entry, data) in [
        ("mimetype", "application/epub+zip"),
        ("META-INF/container.xml", CONTAINER_XML),
        ("content.opf", opf.as_str()),
    ] {
        let method = if entry == "mimetype" {
            CompressionMethod::Stored
        } else {
            CompressionMethod::Deflated
        };
        writer
            .start_file(entry, SimpleFileOptions::default().compression_method(method))
            .unwrap();
        writer.write_all(data.as_bytes()).unwrap();
    }
    let bytes = writer.finish().unwrap().into_inner();

    let path = dir.path().join(name);
    fs::write(&path, bytes).expect("Failed to write test file");
    path
}

fn ebookmeta() -> Command {
    Command::cargo_bin("ebookmeta").unwrap()
}

#[test]
fn test_help() {
    ebookmeta()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("info"))
        .stdout(predicate::str::contains("set"))
        .stdout(predicate::str::contains("cover"))
        .stdout(predicate::str::contains("plain"));
}

#[test]
fn test_version() {
    ebookmeta()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ebookmeta"));
}

#[test]
fn test_set_help() {
    ebookmeta()
        .args(["set", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set metadata fields"))
        .stdout(predicate::str::contains("--field"));
}

#[test]
fn test_info_nonexistent_file() {
    ebookmeta()
        .args(["info", "/nonexistent/file.epub"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_info_missing_input() {
    ebookmeta()
        .arg("info")
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn test_info_prints_title() {
    let temp_dir = TempDir::new().unwrap();
    let epub = create_test_epub(&temp_dir, "book.epub", "Solaris");

    ebookmeta()
        .args(["info", epub.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Title:"))
        .stdout(predicate::str::contains("Solaris"));
}

#[test]
fn test_info_json() {
    let temp_dir = TempDir::new().unwrap();
    let epub = create_test_epub(&temp_dir, "book.epub", "Solaris");

    let output = ebookmeta()
        .args(["info", "--json", epub.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["title"], "Solaris");
    assert_eq!(json["uuid"], "0f0e0d0c-0000-4000-8000-000000000000");
}

#[test]
fn test_info_native_marks_canonical_properties() {
    let temp_dir = TempDir::new().unwrap();
    let epub = create_test_epub(&temp_dir, "book.epub", "Solaris");

    ebookmeta()
        .args(["info", "--native", epub.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("dc:title [title]: Solaris"));
}

#[test]
fn test_set_updates_only_changed_files() {
    let temp_dir = TempDir::new().unwrap();
    let same = create_test_epub(&temp_dir, "same.epub", "Eden");
    let other = create_test_epub(&temp_dir, "other.epub", "Fiasco");
    let before = fs::read(&same).unwrap();

    ebookmeta()
        .args([
            "set",
            same.to_str().unwrap(),
            other.to_str().unwrap(),
            "--field",
            "title=Eden",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Unchanged"))
        .stdout(predicate::str::contains("Updated"));

    assert_eq!(fs::read(&same).unwrap(), before);

    ebookmeta()
        .args(["info", other.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Eden"));
}

#[test]
fn test_set_unknown_field() {
    let temp_dir = TempDir::new().unwrap();
    let epub = create_test_epub(&temp_dir, "book.epub", "Solaris");

    ebookmeta()
        .args(["set", epub.to_str().unwrap(), "--field", "colour=blue"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown field"));
}

#[test]
fn test_set_malformed_assignment() {
    let temp_dir = TempDir::new().unwrap();
    let epub = create_test_epub(&temp_dir, "book.epub", "Solaris");

    ebookmeta()
        .args(["set", epub.to_str().unwrap(), "--field", "title"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("field=value"));
}

#[test]
fn test_plain_export() {
    let temp_dir = TempDir::new().unwrap();
    let epub = create_test_epub(&temp_dir, "book.epub", "Solaris");

    ebookmeta()
        .args(["plain", epub.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("<dc:title>Solaris</dc:title>"));
}

#[test]
fn test_plain_store_rejects_malformed_xml() {
    let temp_dir = TempDir::new().unwrap();
    let epub = create_test_epub(&temp_dir, "book.epub", "Solaris");
    let broken = temp_dir.path().join("broken.opf");
    fs::write(&broken, "<package><metadata>").unwrap();
    let before = fs::read(&epub).unwrap();

    ebookmeta()
        .args([
            "plain",
            epub.to_str().unwrap(),
            "--store",
            broken.to_str().unwrap(),
        ])
        .assert()
        .failure();

    assert_eq!(fs::read(&epub).unwrap(), before);
}

#[test]
fn test_cover_output_requires_single_input() {
    let temp_dir = TempDir::new().unwrap();
    let a = create_test_epub(&temp_dir, "a.epub", "A");
    let b = create_test_epub(&temp_dir, "b.epub", "B");
    let out = temp_dir.path().join("cover.jpg");

    ebookmeta()
        .args([
            "cover",
            a.to_str().unwrap(),
            b.to_str().unwrap(),
            "--output",
            out.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("exactly one"));
}

#[test]
fn test_cover_set_then_extract() {
    let temp_dir = TempDir::new().unwrap();
    let epub = create_test_epub(&temp_dir, "book.epub", "Solaris");
    let image = temp_dir.path().join("new.jpg");
    fs::write(&image, b"\xFF\xD8\xFF\xE0not-really-a-jpeg").unwrap();
    let out = temp_dir.path().join("extracted.jpg");

    ebookmeta()
        .args([
            "cover",
            epub.to_str().unwrap(),
            "--set",
            image.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cover set"));

    ebookmeta()
        .args([
            "cover",
            epub.to_str().unwrap(),
            "--output",
            out.to_str().unwrap(),
        ])
        .assert()
        .success();

    assert_eq!(fs::read(&out).unwrap(), fs::read(&image).unwrap());
}
