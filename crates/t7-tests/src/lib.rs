//! Integration tests for the Trionic 7 datalogger
//!
//! End-to-end tests drive the protocol client, the symbol acquisition and
//! the logging engine against the simulated ECU, so no CAN hardware is
//! needed:
//!
//! ```bash
//! cargo test -p t7-tests
//! ```
//!
//! # Test Structure
//!
//! - `protocol_test.rs` - session handling and polled replies
//! - `symbols_test.rs` - live and offline symbol acquisition
//! - `engine_test.rs` - logging runs, error-rate restarts and retries
//!
//! This module holds the fixtures they share.

use std::sync::Arc;

use t7_kwp::transport::mock::{MockTransport, SymbolRecord};
use t7_kwp::{KwpClient, KwpConfig, MockConfig};
use t7_symbol::codec::frame_blob;

/// Simulated ECU accepting the first security method
pub fn mock_ecu() -> Arc<MockTransport> {
    Arc::new(MockTransport::new(&MockConfig::default()))
}

/// Client talking to `mock` with default timing
pub fn client(mock: &Arc<MockTransport>) -> KwpClient {
    KwpClient::new(mock.clone(), KwpConfig::default())
}

/// `count` distinct symbol names, mixing quantity prefixes
pub fn symbol_names(count: usize) -> Vec<String> {
    const PREFIXES: [&str; 4] = ["n_Engine", "v_Vehicle", "T_Coolant", "p_Boost"];
    (0..count)
        .map(|i| format!("Module{:02}.{}{:04}", i / 16, PREFIXES[i % PREFIXES.len()], i))
        .collect()
}

/// `count` names with pseudo-random hex suffixes, which compress poorly
pub fn scrambled_symbol_names(count: usize, seed: u64) -> Vec<String> {
    let mut state = seed;
    (0..count)
        .map(|i| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            format!("Mod{:02}.X_{:016X}", i % 100, state)
        })
        .collect()
}

/// Uncompressed name blob: size header then `name\r\n` per name
pub fn plain_name_blob(names: &[String]) -> Vec<u8> {
    let text: String = names.iter().map(|n| format!("{}\r\n", n)).collect();
    frame_blob(text.len(), text.as_bytes())
}

/// Symbol records served by the simulated ECU, two bytes each
pub fn symbol_records(count: usize) -> Vec<SymbolRecord> {
    (0..count as u32)
        .map(|i| SymbolRecord {
            address: 0x00F0_2000 + i * 2,
            length: 2,
            symbol_type: (i % 2) as u8,
        })
        .collect()
}

/// Synthetic firmware images
pub mod firmware {
    /// Image size of a Trionic 7 flash dump
    pub const IMAGE_LEN: usize = 0x80000;
    /// Where the name blob is placed
    pub const BLOB_OFFSET: usize = 0x20000;
    /// Where the address table is placed
    pub const TABLE_OFFSET: usize = 0x40000;

    const RECORD_LEN: usize = 10;

    /// Packed image holding `blob` plus one address record per
    /// `(address, length, type)`
    ///
    /// The table always starts with the blob record and a filler record, so
    /// the image yields `records.len() + 2` symbols.
    pub fn packed_image(blob: &[u8], records: &[(u32, u16, u8)]) -> Vec<u8> {
        let mut image = vec![0xFFu8; IMAGE_LEN];
        image[BLOB_OFFSET..BLOB_OFFSET + blob.len()].copy_from_slice(blob);
        image[TABLE_OFFSET - 6..TABLE_OFFSET - 2].copy_from_slice(&0x00F0_0000u32.to_be_bytes());

        let mut table = Vec::new();
        table.extend_from_slice(&(BLOB_OFFSET as u32).to_be_bytes());
        table.extend_from_slice(&(blob.len() as u16).to_be_bytes());
        table.extend_from_slice(&[0x00, 0x00, 0x04, 0x00]);
        table.extend_from_slice(&[0x00; 8]);
        table.extend_from_slice(&[0x20, 0x00]);
        for &(address, length, symbol_type) in records {
            table.extend_from_slice(&address.to_be_bytes());
            table.extend_from_slice(&length.to_be_bytes());
            table.extend_from_slice(&[0xFF, 0xFF, symbol_type, 0x00]);
        }
        table.extend_from_slice(b"SC");
        table.resize(table.len() + RECORD_LEN - 2, 0x00);
        image[TABLE_OFFSET..TABLE_OFFSET + table.len()].copy_from_slice(&table);

        let marker = IMAGE_LEN - 0x40;
        image[marker - 2..marker].copy_from_slice(&[0x7F, 0x00]);
        image[marker] = t7_symbol::binary::PACKED_MARKER;
        image[marker + 1] = 0x02;
        image
    }
}
