//! Zip archive access shared by the EPUB and comic handlers

use crate::error::{ParseError, Result, WriteError};
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Seek, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Archive bytes plus the entry names in central-directory order
pub struct Archive {
    bytes: Vec<u8>,
    entry_names: Vec<String>,
}

impl Archive {
    pub fn open(bytes: Vec<u8>) -> Result<Self> {
        let entry_names = {
            let mut archive = zip_archive(&bytes)?;
            (0..archive.len())
                .map(|i| {
                    archive
                        .by_index_raw(i)
                        .map(|f| f.name().to_string())
                        .map_err(|e| ParseError::InvalidZip(e.to_string()).into())
                })
                .collect::<Result<Vec<_>>>()?
        };
        Ok(Self { bytes, entry_names })
    }

    pub fn entry_names(&self) -> &[String] {
        &self.entry_names
    }

    /// Exact entry name, falling back to a case-insensitive match
    pub fn lookup(&self, wanted: &str) -> Option<&str> {
        self.entry_names
            .iter()
            .find(|n| *n == wanted)
            .or_else(|| self.entry_names.iter().find(|n| n.eq_ignore_ascii_case(wanted)))
            .map(String::as_str)
    }

    pub fn read_entry(&self, name: &str) -> Result<Vec<u8>> {
        let mut archive = zip_archive(&self.bytes)?;
        let mut file = archive
            .by_name(name)
            .map_err(|_| ParseError::MissingEntry(name.to_string()))?;
        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Write the archive to `out`, replacing or adding the entries in
    /// `replacements` and raw-copying every other entry
    pub fn rewrite<W: Write + Seek>(
        &self,
        out: W,
        replacements: &BTreeMap<String, Vec<u8>>,
        compression: CompressionMethod,
    ) -> Result<()> {
        let mut archive = zip_archive(&self.bytes)?;
        let mut writer = ZipWriter::new(out);
        let options = FileOptions::default().compression_method(compression);
        let encoding = |e: zip::result::ZipError| WriteError::EncodingFailed(e.to_string());

        let mut written = Vec::new();
        for i in 0..archive.len() {
            let file = archive
                .by_index_raw(i)
                .map_err(|e| ParseError::InvalidZip(e.to_string()))?;
            let name = file.name().to_string();
            match replacements.get(&name) {
                Some(data) => {
                    drop(file);
                    writer.start_file(name.as_str(), options).map_err(encoding)?;
                    writer.write_all(data)?;
                    written.push(name);
                }
                None => writer.raw_copy_file(file).map_err(encoding)?,
            }
        }

        for (name, data) in replacements {
            if written.contains(name) {
                continue;
            }
            writer.start_file(name.as_str(), options).map_err(encoding)?;
            writer.write_all(data)?;
        }

        writer.finish().map_err(encoding)?;
        Ok(())
    }
}

fn zip_archive(bytes: &[u8]) -> Result<ZipArchive<Cursor<&[u8]>>> {
    ZipArchive::new(Cursor::new(bytes)).map_err(|e| ParseError::InvalidZip(e.to_string()).into())
}

#[cfg(test)]
pub(crate) fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_order_and_lookup() {
        let archive = Archive::open(build_zip(&[("b.txt", b"b"), ("A.txt", b"a")])).unwrap();
        assert_eq!(archive.entry_names(), ["b.txt", "A.txt"]);
        assert_eq!(archive.lookup("a.txt"), Some("A.txt"));
        assert_eq!(archive.lookup("c.txt"), None);
    }

    #[test]
    fn test_rewrite_replaces_and_appends() {
        let archive = Archive::open(build_zip(&[
            ("mimetype", b"application/epub+zip"),
            ("keep.txt", b"keep"),
            ("swap.txt", b"old"),
        ]))
        .unwrap();

        let mut replacements = BTreeMap::new();
        replacements.insert("swap.txt".to_string(), b"new".to_vec());
        replacements.insert("added.txt".to_string(), b"added".to_vec());

        let mut out = Cursor::new(Vec::new());
        archive
            .rewrite(&mut out, &replacements, CompressionMethod::Deflated)
            .unwrap();

        let rewritten = Archive::open(out.into_inner()).unwrap();
        assert_eq!(
            rewritten.entry_names(),
            ["mimetype", "keep.txt", "swap.txt", "added.txt"]
        );
        assert_eq!(rewritten.read_entry("swap.txt").unwrap(), b"new");
        assert_eq!(rewritten.read_entry("keep.txt").unwrap(), b"keep");
        assert_eq!(rewritten.read_entry("added.txt").unwrap(), b"added");
    }

    #[test]
    fn test_not_a_zip() {
        assert!(Archive::open(b"plain text".to_vec()).is_err());
    }
}
