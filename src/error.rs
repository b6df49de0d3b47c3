//! Error types for skyforest-codecs

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while parsing, reading or writing rasters
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed header or file layout
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Magic number mismatch
    #[error("Invalid magic number: {0}")]
    InvalidMagic(u32),

    /// Required header token not found
    #[error("Missing required header token: {0}")]
    MissingToken(String),

    /// Unsupported feature, pixel code or component type
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Region or pixel access outside the image
    #[error("Out of bounds: {0}")]
    OutOfBounds(String),

    /// The file ended before the requested bytes were read
    #[error("Short read: expected {expected} bytes at offset {offset}")]
    ShortRead { offset: u64, expected: usize },

    /// Scratch buffer could not be allocated
    #[error("Failed to allocate {0} bytes")]
    Allocation(usize),

    /// Operation not provided by this format
    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    /// Caller buffer too small for the region
    #[error("Buffer too small: expected at least {expected} bytes, got {actual}")]
    BufferSize { expected: usize, actual: usize },

    /// No registered codec accepted the file
    #[error("No codec found for {0}")]
    NoCodec(PathBuf),

    /// Metadata serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
