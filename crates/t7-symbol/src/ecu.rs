//! Symbol table acquisition from a connected ECU

use std::time::Instant;

use t7_kwp::kwp::{can_id, SYMBOL_TABLE_ROUTINE};
use t7_kwp::{KwpClient, KwpError};
use tracing::{debug, info};

use crate::codec::{expand_symbol_names, NameCodec};
use crate::error::{SymbolError, SymbolResult};
use crate::symbol::{assign_names, Symbol};

/// Symbol table record sent by the ECU: address u32, length u16, type u8
const RECORD_LEN: usize = 7;

/// Records that fit one TransferData reply: the message length is a single
/// byte covering the positive SID and the records.
pub const MAX_TABLE_RECORDS: usize = (u8::MAX as usize - 1) / RECORD_LEN;

/// Read the symbol table and names from the ECU behind `client`
///
/// Opens its own session and always closes it again, also on failure.
/// Either every symbol is returned or the whole acquisition fails.
///
/// The table arrives in a single TransferData reply, so at most
/// [`MAX_TABLE_RECORDS`] records (name blob pointer included) can be read.
/// A reply that fills the whole length byte is refused as `Unsupported`
/// rather than parsed as a short table.
pub async fn load_symbols_from_ecu(
    client: &KwpClient,
    codec: &dyn NameCodec,
    status: impl Fn(&str) + Send + Sync,
) -> SymbolResult<Vec<Symbol>> {
    client
        .start_session(can_id::INIT_REQUEST, can_id::INIT_RESPONSE)
        .await?;
    status("Connected to ECU");

    let result = fetch_symbols(client, codec, &status).await;
    client.stop_session().await;
    result
}

async fn fetch_symbols(
    client: &KwpClient,
    codec: &dyn NameCodec,
    status: &(impl Fn(&str) + Send + Sync),
) -> SymbolResult<Vec<Symbol>> {
    client.request_security_access(false).await?;
    client.start_routine_by_identifier(SYMBOL_TABLE_ROUTINE).await?;

    status("Fetching Symbol Table");
    let start = Instant::now();
    let first = client.transfer_data().await?;
    let message = client.receive_message(first).await?;
    client.request_transfer_exit().await?;

    let mut symbols = parse_symbol_table(transferred_table(&message)?)?;
    debug!(count = symbols.len(), "Symbol table received");

    status("Fetching Symbol Names");
    let blob_record = &symbols[0];
    let blob = client
        .read_memory_by_address(blob_record.address, blob_record.length as usize)
        .await?;

    let names = expand_symbol_names(&blob, codec)?;
    assign_names(&mut symbols, &names);

    let elapsed = start.elapsed();
    info!(count = symbols.len(), elapsed_ms = elapsed.as_millis() as u64, "Symbols loaded");
    status(&format!(
        "Loaded {} symbols from ECU in {}ms",
        symbols.len(),
        elapsed.as_millis()
    ));
    Ok(symbols)
}

/// Records of a `[length, positive SID, records...]` transfer message
fn transferred_table(message: &[u8]) -> SymbolResult<&[u8]> {
    if message.first() == Some(&u8::MAX) {
        return Err(SymbolError::Unsupported(format!(
            "symbol table fills a whole transfer, more than {} records cannot be read",
            MAX_TABLE_RECORDS
        )));
    }
    Ok(message.get(2..).unwrap_or_default())
}

/// Split a transferred symbol table into numbered symbols
pub fn parse_symbol_table(table: &[u8]) -> SymbolResult<Vec<Symbol>> {
    if table.is_empty() {
        return Err(SymbolError::NotFound("ECU returned an empty symbol table".into()));
    }
    if table.len() > MAX_TABLE_RECORDS * RECORD_LEN {
        return Err(SymbolError::Unsupported(format!(
            "{} byte symbol table exceeds {} records",
            table.len(),
            MAX_TABLE_RECORDS
        )));
    }
    if table.len() % RECORD_LEN != 0 {
        return Err(SymbolError::Kwp(KwpError::ProtocolViolation(format!(
            "symbol table of {} bytes is not a whole number of records",
            table.len()
        ))));
    }

    Ok(table
        .chunks_exact(RECORD_LEN)
        .enumerate()
        .map(|(number, r)| {
            Symbol::new(
                number as u32,
                u32::from_be_bytes([r[0], r[1], r[2], r[3]]),
                u16::from_be_bytes([r[4], r[5]]),
                0,
                r[6],
            )
        })
        .collect())
}
