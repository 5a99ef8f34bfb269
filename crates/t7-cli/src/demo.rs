//! Simulated ECU used when the transport is `mock`

use std::sync::Arc;

use anyhow::{Context, Result};
use t7_kwp::transport::mock::{MockTransport, SymbolRecord};
use t7_kwp::MockConfig;
use t7_symbol::codec::lzhuf;

/// Name, RAM address, length and type of the symbols the simulated ECU exports
const DEMO_SYMBOLS: &[(&str, u32, u16, u8)] = &[
    ("ActualIn.n_Engine", 0x00F0_1000, 2, 0x00),
    ("In.v_Vehicle", 0x00F0_1002, 2, 0x00),
    ("ActualIn.T_Engine", 0x00F0_1004, 2, 0x01),
    ("In.p_AirInlet", 0x00F0_1006, 2, 0x00),
    ("Out.X_AccPedal", 0x00F0_1008, 2, 0x00),
    ("ActualIn.U_Batt", 0x00F0_100A, 2, 0x00),
    ("Out.fi_Ignition", 0x00F0_100C, 2, 0x01),
    ("MAF.m_AirInlet", 0x00F0_100E, 2, 0x00),
];

/// Plausible idle values for the demo symbols, big-endian
const DEMO_MEMORY: [u8; 16] = [
    0x03, 0x52, // 850 rpm
    0x00, 0x00, // standing still
    0x00, 0x5A, // 90 degrees
    0x03, 0xE8, // 100.0 kPa
    0x00, 0x00, // pedal released
    0x00, 0x8C, // 14.0 V
    0x00, 0x64, // 10.0 degrees
    0x00, 0x96, // 150 mg/c
];

/// Simulated Trionic 7 exporting [`DEMO_SYMBOLS`]
pub fn demo_ecu(config: &MockConfig) -> Result<Arc<MockTransport>> {
    let mock = Arc::new(MockTransport::new(config));

    let mut names = String::from("Symbol.NameTable\r\n");
    let records = DEMO_SYMBOLS
        .iter()
        .map(|&(name, address, length, symbol_type)| {
            names.push_str(name);
            names.push_str("\r\n");
            SymbolRecord {
                address,
                length,
                symbol_type,
            }
        })
        .collect();

    mock.set_symbol_table(records, lzhuf::compress(names.as_bytes()))
        .context("Failed to seed the simulated ECU")?;
    mock.write_memory(DEMO_SYMBOLS[0].1, DEMO_MEMORY.to_vec());
    Ok(mock)
}
