//! Resource identity: an ebook file on disk and its MIME type

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// MIME types with a metadata handler
pub mod mime {
    pub const EPUB: &str = "application/epub+zip";
    pub const PDF: &str = "application/pdf";
    pub const CBZ: &str = "application/x-cbz";
    /// MIME reported for plain metadata exports
    pub const TEXT_XML: &str = "text/xml";
    pub const OCTET_STREAM: &str = "application/octet-stream";
}

/// Guess a MIME type from the file extension
pub fn mime_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "epub" => mime::EPUB,
        "pdf" => mime::PDF,
        "cbz" => mime::CBZ,
        _ => mime::OCTET_STREAM,
    }
}

/// A single ebook file. Equality is by path and MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    path: PathBuf,
    mime_type: String,
}

impl Resource {
    /// Create a resource, deriving its MIME type from the extension
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mime_type = mime_type_for_path(&path).to_string();
        Self { path, mime_type }
    }

    /// Create a resource with an explicit MIME type
    pub fn with_mime_type(path: impl Into<PathBuf>, mime_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// File name for log messages
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }

    /// Current modification stamp, `None` if the file cannot be inspected
    pub fn stamp(&self) -> Option<ResourceStamp> {
        let metadata = std::fs::metadata(&self.path).ok()?;
        Some(ResourceStamp {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        })
    }
}

/// Last-modified time plus size; a mismatch invalidates cached parse results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceStamp {
    pub modified: Option<SystemTime>,
    pub len: u64,
}
