//! Symbol acquisition tests, live and offline
//!
//! Run with: cargo test -p t7-tests --test symbols_test

use pretty_assertions::assert_eq;
use t7_kwp::{Method, SessionState, VariableDefinition, VariableList};
use t7_symbol::codec::lzhuf;
use t7_symbol::{
    load_symbols_from_ecu, load_symbols_from_file, parse_image, sync_variables, LzhufCodec,
    PassthroughCodec, SymbolError,
};
use t7_tests::firmware::packed_image;
use t7_tests::{
    client, mock_ecu, plain_name_blob, scrambled_symbol_names, symbol_names, symbol_records,
};

// =============================================================================
// Offline (firmware image)
// =============================================================================

#[test]
fn test_synthetic_image_yields_numbered_symbols() {
    let records: Vec<(u32, u16, u8)> = (0..300u32)
        .map(|i| (0x00F0_4000 + i * 4, (i % 4 + 1) as u16, (i % 3) as u8))
        .collect();
    let names = symbol_names(records.len() + 2);
    let image = packed_image(&plain_name_blob(&names), &records);

    let symbols = parse_image(&image, &PassthroughCodec, |_: &str| {}).unwrap();

    assert_eq!(symbols.len(), records.len() + 2);
    for (i, symbol) in symbols.iter().enumerate() {
        assert_eq!(symbol.number, i as u32);
        assert_eq!(symbol.name, names[i]);
    }
    assert_eq!(symbols[2].address, 0x00F0_4000);
    assert_eq!(symbols[301].length, 4);
    assert_eq!(symbols[0].length, 8);
}

#[test]
fn test_compressed_image_from_disk() {
    let records: Vec<(u32, u16, u8)> = (0..1000u32).map(|i| (0x00F0_8000 + i * 2, 2, 0)).collect();
    let names = scrambled_symbol_names(records.len() + 2, 7);
    let text: String = names.iter().map(|n| format!("{}\r\n", n)).collect();
    let blob = lzhuf::compress(text.as_bytes());
    assert!(blob.len() > 0x1000, "blob of {} bytes", blob.len());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("firmware.bin");
    std::fs::write(&path, packed_image(&blob, &records)).unwrap();

    let statuses = std::sync::Mutex::new(Vec::new());
    let symbols = load_symbols_from_file(&path, &LzhufCodec, |s: &str| {
        statuses.lock().unwrap().push(s.to_string())
    })
    .unwrap();

    assert_eq!(symbols.len(), 1002);
    assert_eq!(symbols[1001].name, names[1001]);
    assert_eq!(symbols[1001].unit, "%");
    let statuses = statuses.into_inner().unwrap();
    assert_eq!(statuses[0], "Found binary packed symbol table");
    assert!(statuses.contains(&"Loaded 1002 symbols from binary".to_string()));
}

#[test]
fn test_unpacked_image_is_unsupported() {
    let image = vec![0xFFu8; 0x80000];
    assert!(matches!(
        parse_image(&image, &PassthroughCodec, |_: &str| {}),
        Err(SymbolError::Unsupported(_))
    ));
}

// =============================================================================
// Live (ECU export routine)
// =============================================================================

#[tokio::test]
async fn test_live_symbols_then_sync() {
    let mock = mock_ecu();
    let names = symbol_names(21);
    let text: String = names.iter().map(|n| format!("{}\r\n", n)).collect();
    mock.set_symbol_table(symbol_records(20), lzhuf::compress(text.as_bytes()))
        .unwrap();
    let client = client(&mock);

    let symbols = load_symbols_from_ecu(&client, &LzhufCodec, |_: &str| {})
        .await
        .unwrap();

    assert_eq!(symbols.len(), 21);
    assert_eq!(symbols[5].name, names[5]);
    assert_eq!(symbols[5].address, 0x00F0_2008);
    assert_eq!(client.state(), SessionState::Disconnected);
    assert!(!mock.is_session_active());

    let mut kept = VariableDefinition::new("Custom.raw", Method::Address, 0x1234, 1);
    kept.group = "misc".into();
    let mut stale = VariableDefinition::new(names[5].to_uppercase(), Method::Address, 0, 4);
    stale.group = "engine".into();
    let list = VariableList::new(vec![kept.clone(), stale]);

    assert_eq!(sync_variables(&list, &symbols), 1);
    let snapshot = list.snapshot();
    assert_eq!(snapshot.variables[0], kept);
    let synced = &snapshot.variables[1];
    assert_eq!(synced.method, Method::Symbol);
    assert_eq!(synced.value, 5);
    assert_eq!(synced.length, 2);
    assert_eq!(synced.group, "engine");
}

#[tokio::test]
async fn test_live_symbols_with_uncompressed_names() {
    let mock = mock_ecu();
    let names = symbol_names(11);
    mock.set_symbol_table(symbol_records(10), plain_name_blob(&names))
        .unwrap();
    let client = client(&mock);

    let symbols = load_symbols_from_ecu(&client, &PassthroughCodec, |_: &str| {})
        .await
        .unwrap();
    let loaded: Vec<&str> = symbols.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(loaded, names.iter().map(String::as_str).collect::<Vec<_>>());
}
