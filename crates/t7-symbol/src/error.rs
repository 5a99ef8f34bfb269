//! Error types for symbol acquisition

use t7_kwp::KwpError;
use thiserror::Error;

/// Errors that can occur while acquiring or decoding a symbol table
#[derive(Debug, Error)]
pub enum SymbolError {
    /// Layout marker or table missing
    #[error("not found: {0}")]
    NotFound(String),

    /// Image layout this crate cannot read
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Data ended before a complete structure was read
    #[error("truncated {what} at offset 0x{offset:X}")]
    Truncated { what: &'static str, offset: usize },

    /// Decompressed output does not match the declared size
    #[error("decoded data size mismatch: {actual} != {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Corrupt compressed stream
    #[error("decompression failed: {0}")]
    Decompress(String),

    /// Protocol failure talking to the ECU
    #[error(transparent)]
    Kwp(#[from] KwpError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for symbol operations
pub type SymbolResult<T> = Result<T, SymbolError>;
