//! Symbol table extraction from a Trionic 7 firmware image

use std::path::Path;

use tracing::{debug, info};

use crate::codec::{expand_symbol_names, NameCodec};
use crate::error::{SymbolError, SymbolResult};
use crate::symbol::{assign_names, Symbol};

/// Marker byte of the packed-table footer entry
pub const PACKED_MARKER: u8 = 0x9B;

/// Footer region searched for the marker
const FOOTER_LEN: usize = 0x90;

/// Where the address table search starts
const SEARCH_START: usize = 0x30000;

/// Bytes following the start of the address table in every packed image
const TABLE_PATTERN: [u8; 14] = [
    0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x20, 0x00,
];

/// Distance from the address table to the pattern
const PATTERN_OFFSET: usize = 6;

/// Address table record: address u32, length u16, mask u16, type u8, pad
const RECORD_LEN: usize = 10;

/// First bytes of the record that ends the address table
const TABLE_END: [u8; 2] = *b"SC";

/// Reported length of record 0, which points at the name blob
const NAME_BLOB_RECORD_LEN: u16 = 8;

/// Footer entry marking a binary packed image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedMarker {
    /// Offset of the marker byte
    pub offset: usize,
    /// Length of the value stored just before the marker
    pub length: usize,
    pub value: u64,
}

/// Location of the symbol table inside an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolTableLocation {
    pub address_table: usize,
    pub sram_offset: u32,
    pub name_blob_offset: u32,
    pub name_blob_length: u16,
}

/// Find the packed marker in the image footer
///
/// The marker is followed by the length of a big-endian value stored
/// immediately before it. Lengths of 0x30 and up are not markers.
pub fn find_packed_marker(image: &[u8]) -> Option<PackedMarker> {
    let footer_start = image.len().checked_sub(FOOTER_LEN)?;
    let footer = &image[footer_start..];

    let t = footer
        .windows(2)
        .position(|w| w[0] == PACKED_MARKER && w[1] < 0x30)?;
    let offset = footer_start + t;
    let length = footer[t + 1] as usize;

    let value_bytes = image.get(offset.checked_sub(length)?..offset)?;
    let value = value_bytes.iter().fold(0u64, |acc, b| acc << 8 | *b as u64);

    Some(PackedMarker {
        offset,
        length,
        value,
    })
}

/// True when the image carries a binary packed symbol table
pub fn is_binary_packed(image: &[u8]) -> bool {
    match find_packed_marker(image) {
        Some(marker) => {
            debug!(
                length = marker.length,
                offset = %format!("0x{:X}", marker.offset),
                value = %format!("0x{:X}", marker.value),
                "Packed marker"
            );
            marker.offset > 0 && marker.length > 0 && marker.length < image.len()
        }
        None => false,
    }
}

/// Locate the address table and the compressed name blob
pub fn locate_symbol_table(image: &[u8]) -> SymbolResult<SymbolTableLocation> {
    let found = image
        .get(SEARCH_START..)
        .and_then(|tail| {
            tail.windows(TABLE_PATTERN.len())
                .position(|w| w == TABLE_PATTERN)
        })
        .ok_or_else(|| SymbolError::NotFound("address table pattern".into()))?;
    let address_table = SEARCH_START + found - PATTERN_OFFSET;

    let location = SymbolTableLocation {
        address_table,
        sram_offset: read_u32(image, address_table - 6, "SRAM offset")?,
        name_blob_offset: read_u32(image, address_table, "name blob offset")?,
        name_blob_length: read_u16(image, address_table + 4, "name blob length")?,
    };

    let valid = location.name_blob_length > 0x1000
        && location.name_blob_offset > 0
        && location.name_blob_offset < 0x70000;
    if !valid {
        return Err(SymbolError::NotFound("symbol table not found".into()));
    }
    Ok(location)
}

/// Read address table records until the end marker
pub fn read_symbol_records(image: &[u8], address_table: usize) -> SymbolResult<Vec<Symbol>> {
    let mut symbols = Vec::new();
    let mut offset = address_table;

    loop {
        let record = image
            .get(offset..offset + RECORD_LEN)
            .ok_or(SymbolError::Truncated {
                what: "address table",
                offset,
            })?;
        if record[..2] == TABLE_END {
            debug!(offset = %format!("0x{:X}", offset), "End of address table");
            break;
        }

        let number = symbols.len() as u32;
        let length = if number == 0 {
            NAME_BLOB_RECORD_LEN
        } else {
            u16::from_be_bytes([record[4], record[5]])
        };
        symbols.push(Symbol::new(
            number,
            u32::from_be_bytes([record[0], record[1], record[2], record[3]]),
            length,
            u16::from_be_bytes([record[6], record[7]]),
            record[8],
        ));
        offset += RECORD_LEN;
    }
    Ok(symbols)
}

/// Extract the named symbol list from a firmware image
pub fn parse_image(
    image: &[u8],
    codec: &dyn NameCodec,
    status: impl Fn(&str),
) -> SymbolResult<Vec<Symbol>> {
    if !is_binary_packed(image) {
        status("Not a binary packed symbol table");
        return Err(SymbolError::Unsupported(
            "image without a binary packed symbol table".into(),
        ));
    }
    status("Found binary packed symbol table");

    let location = locate_symbol_table(image)?;
    status(&format!("Address table offset: {:08X}", location.address_table));
    status(&format!("SRAM table offset: {:08X}", location.sram_offset));
    status(&format!("Symbol table offset: {:08X}", location.name_blob_offset));
    status(&format!("Symbol table length: {:08X}", location.name_blob_length));

    let blob_start = location.name_blob_offset as usize;
    let blob = image
        .get(blob_start..blob_start + location.name_blob_length as usize)
        .ok_or(SymbolError::Truncated {
            what: "name blob",
            offset: blob_start,
        })?;

    let mut symbols = read_symbol_records(image, location.address_table)?;
    status(&format!("Loaded {} symbols from binary", symbols.len()));

    let names = expand_symbol_names(blob, codec)?;
    assign_names(&mut symbols, &names);
    Ok(symbols)
}

/// Read a firmware image from disk and extract its symbols
pub fn load_symbols_from_file(
    path: impl AsRef<Path>,
    codec: &dyn NameCodec,
    status: impl Fn(&str),
) -> SymbolResult<Vec<Symbol>> {
    let path = path.as_ref();
    let image = std::fs::read(path)?;
    info!(path = %path.display(), size = image.len(), "Reading firmware image");
    parse_image(&image, codec, status)
}

fn read_u32(image: &[u8], offset: usize, what: &'static str) -> SymbolResult<u32> {
    image
        .get(offset..offset + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(SymbolError::Truncated { what, offset })
}

fn read_u16(image: &[u8], offset: usize, what: &'static str) -> SymbolResult<u16> {
    image
        .get(offset..offset + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or(SymbolError::Truncated { what, offset })
}

/// Synthetic firmware images for tests
#[cfg(test)]
pub(crate) mod fixture {
    use super::*;

    pub const IMAGE_LEN: usize = 0x80000;
    pub const BLOB_OFFSET: usize = 0x10000;
    pub const TABLE_OFFSET: usize = 0x30100;

    /// Packed image holding `blob` and one record per `(address, length, type)`
    pub fn packed_image(blob: &[u8], records: &[(u32, u16, u8)]) -> Vec<u8> {
        let mut image = vec![0u8; IMAGE_LEN];
        image[BLOB_OFFSET..BLOB_OFFSET + blob.len()].copy_from_slice(blob);

        // SRAM offset precedes the table
        image[TABLE_OFFSET - 6..TABLE_OFFSET - 2].copy_from_slice(&0x00F0_0000u32.to_be_bytes());

        let mut at = TABLE_OFFSET;
        let mut put = |record: [u8; RECORD_LEN]| {
            image[at..at + RECORD_LEN].copy_from_slice(&record);
            at += RECORD_LEN;
        };

        // record 0 points at the blob, record 1 completes the search pattern
        let [o0, o1, o2, o3] = (BLOB_OFFSET as u32).to_be_bytes();
        let [l0, l1] = (blob.len() as u16).to_be_bytes();
        put([o0, o1, o2, o3, l0, l1, 0x00, 0x00, 0x04, 0x00]);
        put([0, 0, 0, 0, 0, 0, 0, 0, 0x20, 0x00]);
        for &(address, length, symbol_type) in records {
            let [a0, a1, a2, a3] = address.to_be_bytes();
            let [l0, l1] = length.to_be_bytes();
            put([a0, a1, a2, a3, l0, l1, 0xFF, 0xFF, symbol_type, 0x00]);
        }
        put([b'S', b'C', 0, 0, 0, 0, 0, 0, 0, 0]);

        // footer: four byte value followed by the marker and its length
        let marker = IMAGE_LEN - 0x20;
        image[marker - 4..marker].copy_from_slice(&0x0007_FF00u32.to_be_bytes());
        image[marker] = PACKED_MARKER;
        image[marker + 1] = 0x04;
        image
    }
}
