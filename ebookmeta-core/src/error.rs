//! Error types for ebookmeta core

use thiserror::Error;

/// Result type alias using MetadataError
pub type Result<T> = std::result::Result<T, MetadataError>;

/// Top-level error type for all metadata operations
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Write error: {0}")]
    Write(#[from] WriteError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The format has no support for the requested operation
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// The handler was disposed and can no longer be used
    #[error("Handler disposed: {0}")]
    Disposed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that occur while parsing a container
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid zip archive: {0}")]
    InvalidZip(String),

    #[error("Invalid XML: {0}")]
    InvalidXml(String),

    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    #[error("Missing entry: {0}")]
    MissingEntry(String),

    #[error("Malformed content: {0}")]
    MalformedContent(String),
}

/// Errors that occur while rewriting a container
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Refusing to replace {0} with an empty file")]
    EmptyOutput(String),

    #[error("Failed to replace {path}: {reason}")]
    Persist { path: String, reason: String },

    #[error("Encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Malformed date: {0}")]
    InvalidDate(String),
}

/// Errors raised before any byte is written
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} only accepts one of {allowed:?}, got '{value}'")]
    ControlledVocabulary {
        field: String,
        value: String,
        allowed: &'static [&'static str],
    },

    #[error("{field} expects an integer, got '{value}'")]
    NotAnInteger { field: String, value: String },

    #[error("{field} expects a number, got '{value}'")]
    NotANumber { field: String, value: String },

    #[error("Invalid page property name: {0}")]
    InvalidPageProperty(String),

    #[error("Not well-formed XML: {0}")]
    MalformedXml(String),
}
