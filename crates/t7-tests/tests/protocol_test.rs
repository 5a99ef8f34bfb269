//! Protocol client tests against the simulated ECU
//!
//! Run with: cargo test -p t7-tests --test protocol_test

use chrono::Utc;
use pretty_assertions::assert_eq;
use t7_kwp::kwp::{can_id, DYNAMIC_LOCAL_ID};
use t7_kwp::{KwpError, Method, SessionState, VariableDefinition};
use t7_logger::Sample;
use t7_tests::{client, mock_ecu};

// =============================================================================
// Session lifecycle
// =============================================================================

#[tokio::test]
async fn test_stop_session_before_start_is_harmless() {
    let mock = mock_ecu();
    let client = client(&mock);

    client.stop_session().await;
    client.stop_session().await;

    assert_eq!(client.state(), SessionState::Disconnected);
    assert!(!mock.is_session_active());
}

#[tokio::test]
async fn test_stop_session_twice_after_start() {
    let mock = mock_ecu();
    let client = client(&mock);

    client
        .start_session(can_id::INIT_REQUEST, can_id::INIT_RESPONSE)
        .await
        .unwrap();
    assert!(client.is_active());
    assert!(mock.is_session_active());

    client.stop_session().await;
    client.stop_session().await;

    assert_eq!(client.state(), SessionState::Disconnected);
    assert!(!mock.is_session_active());
    assert!(matches!(
        client.read_data_by_local_identifier(DYNAMIC_LOCAL_ID).await,
        Err(KwpError::NoSession)
    ));
}

// =============================================================================
// Polled replies
// =============================================================================

#[tokio::test]
async fn test_reply_of_defined_length_parses_without_leftovers() {
    let mock = mock_ecu();
    let client = client(&mock);
    client
        .start_session(can_id::INIT_REQUEST, can_id::INIT_RESPONSE)
        .await
        .unwrap();

    let lengths = [1u16, 2, 4, 2, 1, 4, 2];
    let total: usize = lengths.iter().map(|&l| l as usize).sum();
    let variables: Vec<VariableDefinition> = lengths
        .iter()
        .enumerate()
        .map(|(i, &length)| {
            VariableDefinition::new(format!("Var.{}", i), Method::Address, 0x3000 + 0x10 * i as u32, length)
        })
        .collect();
    for (i, var) in variables.iter().enumerate() {
        let value: Vec<u8> = (0..var.length).map(|b| (i as u8) << 4 | b as u8).collect();
        mock.write_memory(var.value, value);
    }

    for (slot, var) in variables.iter().enumerate() {
        client
            .dynamically_define_local_identifier(slot as u8, var)
            .await
            .unwrap();
    }
    let data = client
        .read_data_by_local_identifier(DYNAMIC_LOCAL_ID)
        .await
        .unwrap();

    // reply = service echo + identifier + data
    assert_eq!(data.len() + 2, total + 2);

    let sample = Sample::decode(Utc::now(), &variables, &data).unwrap();
    assert_eq!(sample.readings.len(), variables.len());
    assert!(sample.trailing.is_empty());
    assert_eq!(sample.readings[0].raw, 0x00);
    assert_eq!(sample.readings[1].raw, 0x1011);
    assert_eq!(sample.readings[2].raw, 0x2021_2223);

    client.stop_session().await;
}

#[tokio::test]
async fn test_busy_reply_is_an_ecu_error() {
    let mock = mock_ecu();
    let client = client(&mock);
    client
        .start_session(can_id::INIT_REQUEST, can_id::INIT_RESPONSE)
        .await
        .unwrap();
    let var = VariableDefinition::new("Var.0", Method::Address, 0x3000, 2);
    client.dynamically_define_local_identifier(0, &var).await.unwrap();

    mock.fail_next_reads(1);
    let err = client
        .read_data_by_local_identifier(DYNAMIC_LOCAL_ID)
        .await
        .unwrap_err();
    assert_eq!(err.response_code(), Some(t7_kwp::ResponseCode::BusyRepeatRequest));

    assert!(client.read_data_by_local_identifier(DYNAMIC_LOCAL_ID).await.is_ok());
}

// =============================================================================
// Security access
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_never_accepting_ecu_denies_access() {
    let mock = mock_ecu();
    mock.set_security_method(None);
    let client = client(&mock);
    client
        .start_session(can_id::INIT_REQUEST, can_id::INIT_RESPONSE)
        .await
        .unwrap();

    assert!(matches!(
        client.request_security_access(false).await,
        Err(KwpError::AccessDenied)
    ));
    assert!(!client.has_security_access());

    let seed_requests = mock
        .sent_frames()
        .iter()
        .filter(|f| f.id == can_id::REQUEST && f.data().get(3..5) == Some(&[0x27, 0x05][..]))
        .count();
    assert_eq!(seed_requests, 5);
}

#[tokio::test(start_paused = true)]
async fn test_later_security_method_is_found() {
    let mock = mock_ecu();
    mock.set_security_method(Some(3));
    let client = client(&mock);
    client
        .start_session(can_id::INIT_REQUEST, can_id::INIT_RESPONSE)
        .await
        .unwrap();

    client.request_security_access(false).await.unwrap();
    assert!(client.has_security_access());
}
