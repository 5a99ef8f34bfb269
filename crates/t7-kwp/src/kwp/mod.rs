//! KWP2000 protocol implementation for Trionic 7
//!
//! This module provides the protocol client, the chunk codec used to move
//! messages larger than one CAN frame, security access key derivation and
//! negative response code handling.

pub mod chunk;
mod client;
mod nrc;
pub mod security;

pub use chunk::{encode_chunks, ChunkReader};
pub use client::{KwpClient, SecurityState, SessionState};
pub use nrc::ResponseCode;

/// Well-known CAN identifiers of the Trionic 7 diagnostic link
pub mod can_id {
    /// Session start request
    pub const INIT_REQUEST: u32 = 0x220;
    /// Session start response
    pub const INIT_RESPONSE: u32 = 0x238;
    /// Tester requests
    pub const REQUEST: u32 = 0x240;
    /// Default ECU response identifier (the real one is negotiated)
    pub const RESPONSE: u32 = 0x258;
    /// Tester acknowledgement of a received chunk
    pub const TESTER_ACK: u32 = 0x266;
    /// ECU confirmation of a received chunk
    pub const ECU_ACK: u32 = 0x270;
}

/// KWP2000 service identifiers used by the client
pub mod service_id {
    pub const START_COMMUNICATION: u8 = 0x81;
    pub const STOP_COMMUNICATION: u8 = 0x82;
    pub const READ_DATA_BY_LOCAL_IDENTIFIER: u8 = 0x21;
    pub const SECURITY_ACCESS: u8 = 0x27;
    pub const DYNAMICALLY_DEFINE_LOCAL_IDENTIFIER: u8 = 0x2C;
    pub const START_ROUTINE_BY_LOCAL_IDENTIFIER: u8 = 0x31;
    pub const STOP_ROUTINE_BY_LOCAL_IDENTIFIER: u8 = 0x32;
    pub const REQUEST_ROUTINE_RESULTS_BY_LOCAL_IDENTIFIER: u8 = 0x33;
    pub const TRANSFER_DATA: u8 = 0x36;
    pub const REQUEST_TRANSFER_EXIT: u8 = 0x37;

    /// Negative response marker
    pub const NEGATIVE_RESPONSE: u8 = 0x7F;

    /// Positive response SID for a request SID
    pub const fn positive(service: u8) -> u8 {
        service | 0x40
    }
}

/// Local identifier that collects the dynamically defined variables
pub const DYNAMIC_LOCAL_ID: u8 = 0xF0;

/// Routine that exports the symbol table
pub const SYMBOL_TABLE_ROUTINE: u8 = 0x50;

/// Largest window read per memory request
pub const MEMORY_READ_WINDOW: usize = 0x80;
