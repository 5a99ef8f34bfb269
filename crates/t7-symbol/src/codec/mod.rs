//! Symbol name blob decoding
//!
//! The ECU and the firmware image both store symbol names as one compressed
//! blob: a little-endian u32 holding the decompressed size, followed by the
//! compressed payload. Decompressed, the blob is a CRLF separated name list
//! in symbol table order.

pub mod lzhuf;

use crate::error::{SymbolError, SymbolResult};

pub use lzhuf::LzhufCodec;

/// Size of the decompressed-size header
pub const SIZE_HEADER_LEN: usize = 4;

/// Decompression algorithm for the name blob
pub trait NameCodec: Send + Sync {
    fn name(&self) -> &'static str;

    /// Expand `payload` into `declared_size` bytes
    fn decompress(&self, payload: &[u8], declared_size: usize) -> SymbolResult<Vec<u8>>;
}

/// Codec that hands the payload back unchanged
///
/// Lets tests and tools build blobs from plain text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughCodec;

impl NameCodec for PassthroughCodec {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn decompress(&self, payload: &[u8], _declared_size: usize) -> SymbolResult<Vec<u8>> {
        Ok(payload.to_vec())
    }
}

/// Prefix `payload` with the size header for `decompressed_len` bytes
pub fn frame_blob(decompressed_len: usize, payload: &[u8]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(SIZE_HEADER_LEN + payload.len());
    blob.extend_from_slice(&(decompressed_len as u32).to_le_bytes());
    blob.extend_from_slice(payload);
    blob
}

/// Expand a name blob into the ordered list of symbol names
pub fn expand_symbol_names(blob: &[u8], codec: &dyn NameCodec) -> SymbolResult<Vec<String>> {
    let Some((header, payload)) = blob.split_first_chunk::<SIZE_HEADER_LEN>() else {
        return Err(SymbolError::Truncated {
            what: "name blob header",
            offset: 0,
        });
    };
    let declared = u32::from_le_bytes(*header) as usize;

    let text = codec.decompress(payload, declared)?;
    if text.len() != declared {
        return Err(SymbolError::SizeMismatch {
            expected: declared,
            actual: text.len(),
        });
    }
    tracing::debug!(codec = codec.name(), size = declared, "Expanded symbol names");

    let text = String::from_utf8_lossy(&text);
    let mut names: Vec<String> = text.split("\r\n").map(|n| n.trim().to_string()).collect();
    if names.last().is_some_and(|n| n.is_empty()) {
        names.pop();
    }
    Ok(names)
}
