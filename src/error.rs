//! Error types for the firmware bundle extractor.
//!
//! This module provides error handling for all extraction operations,
//! including archive resolution, envelope decoding, payload decompression,
//! device tree parsing, and kernel image processing.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for firmware extraction operations.
#[derive(Error, Debug)]
pub enum Error {
    // ==================== I/O Errors ====================
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to open file '{path}': {source}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ==================== Archive Errors ====================
    #[error("zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("no archive entry starts with '{prefix}'")]
    EntryNotFound { prefix: String },

    // ==================== Decode Errors ====================
    #[error("format error at offset {offset:#x}: {reason}")]
    Format { offset: usize, reason: String },

    #[error("buffer underrun at offset {offset:#x}: need {needed} bytes, have {available}")]
    BufferUnderrun {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("load command {index} size mismatch: ended at offset {actual:#x}, expected {expected:#x}")]
    Consistency {
        index: usize,
        actual: usize,
        expected: usize,
    },

    #[error("unsupported construct at offset {offset:#x}: {reason}")]
    Unsupported { offset: usize, reason: String },

    // ==================== Decompression Errors ====================
    #[error("decompression failed: {reason}")]
    Decompression { reason: String },
}

/// A specialized Result type for firmware extraction operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a format error with a formatted message.
    #[inline]
    pub fn format(offset: usize, reason: impl Into<String>) -> Self {
        Error::Format {
            offset,
            reason: reason.into(),
        }
    }

    /// Creates a buffer underrun error.
    #[inline]
    pub fn underrun(offset: usize, needed: usize, available: usize) -> Self {
        Error::BufferUnderrun {
            offset,
            needed,
            available,
        }
    }

    /// Creates an unsupported-construct error.
    #[inline]
    pub fn unsupported(offset: usize, reason: impl Into<String>) -> Self {
        Error::Unsupported {
            offset,
            reason: reason.into(),
        }
    }

    /// Creates a decompression error.
    #[inline]
    pub fn decompression(reason: impl Into<String>) -> Self {
        Error::Decompression {
            reason: reason.into(),
        }
    }
}
