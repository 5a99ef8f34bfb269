//! KWP2000 client for one Trionic 7 session

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::chunk::{self, ChunkReader, TESTER_ADDRESS};
use super::{can_id, security, service_id, ResponseCode, DYNAMIC_LOCAL_ID, MEMORY_READ_WINDOW};
use crate::config::KwpConfig;
use crate::definition::{Method, VariableDefinition};
use crate::error::KwpError;
use crate::transport::{CanFrame, CanTransport, FrameKind, MAX_FRAME_LEN};

/// Security access state of an active session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityState {
    Locked,
    Unlocked,
}

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Starting,
    Active {
        /// Identifier negotiated at session start
        response_id: u32,
        security: SecurityState,
    },
    Stopping,
}

/// KWP2000 client
///
/// Owns one session against one ECU. Every request/reply exchange runs to
/// completion before the next one starts; callers drive it sequentially.
pub struct KwpClient {
    transport: Arc<dyn CanTransport>,
    config: KwpConfig,
    state: RwLock<SessionState>,
}

impl KwpClient {
    pub fn new(transport: Arc<dyn CanTransport>, config: KwpConfig) -> Self {
        Self {
            transport,
            config,
            state: RwLock::new(SessionState::Disconnected),
        }
    }

    pub fn transport(&self) -> &Arc<dyn CanTransport> {
        &self.transport
    }

    pub fn config(&self) -> &KwpConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state(), SessionState::Active { .. })
    }

    pub fn has_security_access(&self) -> bool {
        matches!(
            self.state(),
            SessionState::Active {
                security: SecurityState::Unlocked,
                ..
            }
        )
    }

    /// Response identifier negotiated for the active session
    pub fn response_id(&self) -> Result<u32, KwpError> {
        match self.state() {
            SessionState::Active { response_id, .. } => Ok(response_id),
            _ => Err(KwpError::NoSession),
        }
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Open a diagnostic session
    ///
    /// Sends the start-communication request to `request_id` and waits for
    /// the answer on `response_id`. The answer names the identifier the ECU
    /// uses for everything that follows.
    pub async fn start_session(&self, request_id: u32, response_id: u32) -> Result<(), KwpError> {
        *self.state.write() = SessionState::Starting;

        let outcome = self.negotiate(request_id, response_id).await;
        *self.state.write() = match outcome {
            Ok(negotiated) => SessionState::Active {
                response_id: negotiated,
                security: SecurityState::Locked,
            },
            Err(_) => SessionState::Disconnected,
        };

        let negotiated = outcome?;
        info!(response_id = %format!("0x{:03X}", negotiated), "Session started");
        Ok(())
    }

    async fn negotiate(&self, request_id: u32, response_id: u32) -> Result<u32, KwpError> {
        let [req_hi, req_lo] = (can_id::REQUEST as u16).to_be_bytes();
        let frame = CanFrame::response_required(
            request_id,
            vec![
                0x3F,
                service_id::START_COMMUNICATION,
                0x00,
                0x11,
                req_hi,
                req_lo,
                0x00,
                0x00,
            ],
        );
        let reply = self
            .transport
            .send_and_poll(frame, self.config.default_timeout(), response_id)
            .await?;
        debug!(frame = %reply, "Session start reply");

        let status = byte_at(&reply, 3)?;
        if status != service_id::positive(service_id::START_COMMUNICATION) {
            return Err(KwpError::ProtocolRejected(format!(
                "start communication answered with {}",
                reply
            )));
        }
        Ok(u32::from(byte_at(&reply, 6)?) << 8 | u32::from(byte_at(&reply, 7)?))
    }

    /// Close the session
    ///
    /// Fire-and-forget: the stop request is sent without waiting for an
    /// answer and the client ends up disconnected whatever happens. Safe to
    /// call repeatedly or without an active session.
    pub async fn stop_session(&self) {
        let previous = std::mem::replace(&mut *self.state.write(), SessionState::Stopping);

        let frame = CanFrame::outgoing(
            can_id::REQUEST,
            vec![
                chunk::FIRST_CHUNK,
                TESTER_ADDRESS,
                0x02,
                service_id::STOP_COMMUNICATION,
                0x00,
            ],
        );
        if let Err(e) = self.transport.send(frame).await {
            debug!(error = %e, "Stop session request not delivered");
        }

        *self.state.write() = SessionState::Disconnected;
        if matches!(previous, SessionState::Active { .. }) {
            info!("Session stopped");
        }
    }

    // =========================================================================
    // Security access
    // =========================================================================

    /// Unlock the ECU
    ///
    /// Tries every key derivation method in turn, pausing after each
    /// failure. Returns immediately when already unlocked unless `force`.
    pub async fn request_security_access(&self, force: bool) -> Result<(), KwpError> {
        let response_id = self.response_id()?;
        if self.has_security_access() && !force {
            return Ok(());
        }

        for method in 0..security::METHOD_COUNT {
            match self.try_security_method(method, response_id).await {
                Ok(true) => {
                    self.set_security(SecurityState::Unlocked);
                    info!(method, "Security access granted");
                    return Ok(());
                }
                Ok(false) => warn!(method, "Security access key rejected"),
                Err(e) => warn!(method, error = %e, "Security access attempt failed"),
            }
            if method + 1 < security::METHOD_COUNT {
                tokio::time::sleep(self.config.security_retry_delay()).await;
            }
        }

        Err(KwpError::AccessDenied)
    }

    async fn try_security_method(&self, method: u8, response_id: u32) -> Result<bool, KwpError> {
        let timeout = self.config.default_timeout();

        let seed_reply = self
            .transport
            .send_and_poll(request_frame(service_id::SECURITY_ACCESS, &[0x05]), timeout, response_id)
            .await?;
        self.acknowledge(&seed_reply).await;
        check_negative(&seed_reply, service_id::SECURITY_ACCESS)?;

        let seed = u16::from_be_bytes([byte_at(&seed_reply, 5)?, byte_at(&seed_reply, 6)?]);
        let key = security::calculate_key(seed, method).ok_or(KwpError::AccessDenied)?;
        let [hi, lo] = key.to_be_bytes();
        debug!(
            method,
            seed = %format!("0x{:04X}", seed),
            key = %format!("0x{:04X}", key),
            "Sending key"
        );

        let key_reply = self
            .transport
            .send_and_poll(
                request_frame(service_id::SECURITY_ACCESS, &[0x06, hi, lo]),
                timeout,
                response_id,
            )
            .await?;
        self.acknowledge(&key_reply).await;

        Ok(key_reply.byte(3) == Some(service_id::positive(service_id::SECURITY_ACCESS))
            && key_reply.byte(5) == Some(0x34))
    }

    fn set_security(&self, security: SecurityState) {
        if let SessionState::Active { security: s, .. } = &mut *self.state.write() {
            *s = security;
        }
    }

    // =========================================================================
    // Routines and transfer
    // =========================================================================

    pub async fn start_routine_by_identifier(&self, id: u8) -> Result<CanFrame, KwpError> {
        self.request(
            service_id::START_ROUTINE_BY_LOCAL_IDENTIFIER,
            &[id, 0x10],
            self.config.default_timeout(),
        )
        .await
    }

    pub async fn stop_routine_by_identifier(&self, id: u8) -> Result<CanFrame, KwpError> {
        self.request(
            service_id::STOP_ROUTINE_BY_LOCAL_IDENTIFIER,
            &[id],
            self.config.default_timeout(),
        )
        .await
    }

    pub async fn request_routine_results(&self, id: u8) -> Result<CanFrame, KwpError> {
        self.request(
            service_id::REQUEST_ROUTINE_RESULTS_BY_LOCAL_IDENTIFIER,
            &[id],
            self.config.default_timeout(),
        )
        .await
    }

    /// Request the next transfer block; returns the first reply frame as is
    ///
    /// Use [`KwpClient::receive_message`] to pull any continuation frames.
    pub async fn transfer_data(&self) -> Result<CanFrame, KwpError> {
        self.request(service_id::TRANSFER_DATA, &[0x00], self.config.default_timeout())
            .await
    }

    pub async fn request_transfer_exit(&self) -> Result<(), KwpError> {
        self.request(service_id::REQUEST_TRANSFER_EXIT, &[], self.config.default_timeout())
            .await?;
        Ok(())
    }

    // =========================================================================
    // Local identifiers
    // =========================================================================

    /// Place `definition` in `slot` of the dynamic local identifier
    pub async fn dynamically_define_local_identifier(
        &self,
        slot: u8,
        definition: &VariableDefinition,
    ) -> Result<(), KwpError> {
        self.response_id()?;

        let payload = definition.local_id_payload(slot);
        // The length byte counts the payload only, not the service id.
        let mut message = Vec::with_capacity(payload.len() + 2);
        message.push(payload.len() as u8);
        message.push(service_id::DYNAMICALLY_DEFINE_LOCAL_IDENTIFIER);
        message.extend_from_slice(&payload);

        debug!(slot, name = %definition.name, method = %definition.method, "Defining local identifier");
        for frame in chunk::encode_chunks(can_id::REQUEST, TESTER_ADDRESS, &message) {
            match frame.kind {
                FrameKind::Outgoing => self.transport.send(frame).await?,
                FrameKind::ResponseRequired => {
                    let confirmation = self
                        .transport
                        .send_and_poll(frame, self.config.default_timeout(), can_id::ECU_ACK)
                        .await?;
                    check_negative(
                        &confirmation,
                        service_id::DYNAMICALLY_DEFINE_LOCAL_IDENTIFIER,
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Read a local identifier; returns the data with the framing stripped
    pub async fn read_data_by_local_identifier(&self, id: u8) -> Result<Vec<u8>, KwpError> {
        let first = self
            .request(
                service_id::READ_DATA_BY_LOCAL_IDENTIFIER,
                &[id],
                self.config.first_frame_timeout(),
            )
            .await?;
        let message = self.receive_message(first).await?;

        // [length, positive SID, identifier, data...]
        let expected = service_id::positive(service_id::READ_DATA_BY_LOCAL_IDENTIFIER);
        match message.as_slice() {
            [_, sid, _, data @ ..] if *sid == expected => Ok(data.to_vec()),
            _ => Err(KwpError::ProtocolViolation(format!(
                "unexpected read reply {}",
                hex::encode_upper(&message)
            ))),
        }
    }

    /// Reassemble a chunked reply whose first frame is `first`
    ///
    /// Every frame announcing more chunks is acknowledged before the next
    /// one is awaited.
    pub async fn receive_message(&self, first: CanFrame) -> Result<Vec<u8>, KwpError> {
        let response_id = self.response_id()?;
        let mut reader = ChunkReader::new(&first)?;

        while !reader.is_complete() {
            let ack = chunk::acknowledgement(reader.last_control());
            let frame = self
                .transport
                .send_and_poll(ack, self.config.continuation_timeout(), response_id)
                .await?;
            debug!(frame = %frame, remaining = reader.remaining(), "Continuation frame");
            reader.push(&frame)?;
        }
        reader.into_message()
    }

    /// Read `length` bytes of ECU memory starting at `address`
    ///
    /// The dynamic local identifier is redefined by address for each window
    /// and read back, so any existing slot 0 definition is replaced.
    pub async fn read_memory_by_address(
        &self,
        address: u32,
        length: usize,
    ) -> Result<Vec<u8>, KwpError> {
        if address as usize + length > 0x0100_0000 {
            return Err(KwpError::ProtocolViolation(format!(
                "0x{:06X}+{} is outside the 24-bit address space",
                address, length
            )));
        }

        let mut out = Vec::with_capacity(length);
        while out.len() < length {
            let at = address + out.len() as u32;
            let window = (length - out.len()).min(MEMORY_READ_WINDOW);

            let definition = VariableDefinition::new("memory", Method::Address, at, window as u16);
            self.dynamically_define_local_identifier(0, &definition).await?;
            let data = self.read_data_by_local_identifier(DYNAMIC_LOCAL_ID).await?;

            let bytes = data.get(..window).ok_or_else(|| {
                KwpError::ProtocolViolation(format!(
                    "memory read at 0x{:06X} returned {} of {} bytes",
                    at,
                    data.len(),
                    window
                ))
            })?;
            out.extend_from_slice(bytes);
        }
        Ok(out)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Single-frame request; fails on a negative reply
    async fn request(
        &self,
        service: u8,
        params: &[u8],
        timeout: Duration,
    ) -> Result<CanFrame, KwpError> {
        let response_id = self.response_id()?;
        let frame = request_frame(service, params);
        debug!(frame = %frame, "Request");

        let reply = self
            .transport
            .send_and_poll(frame, timeout, response_id)
            .await?;
        debug!(frame = %reply, "Reply");

        check_negative(&reply, service)?;
        Ok(reply)
    }

    /// Acknowledge a reply frame without waiting for anything
    async fn acknowledge(&self, reply: &CanFrame) {
        let control = reply.byte(0).unwrap_or_default();
        if let Err(e) = self.transport.send(chunk::acknowledgement(control)).await {
            debug!(error = %e, "Acknowledgement not delivered");
        }
    }
}

/// `[0x40, 0xA1, length, service, params...]`, zero padded to a full frame
fn request_frame(service: u8, params: &[u8]) -> CanFrame {
    let mut data = Vec::with_capacity(MAX_FRAME_LEN);
    data.extend_from_slice(&[chunk::FIRST_CHUNK, TESTER_ADDRESS, (params.len() + 1) as u8, service]);
    data.extend_from_slice(params);
    data.resize(MAX_FRAME_LEN.max(data.len()), 0x00);
    CanFrame::response_required(can_id::REQUEST, data)
}

fn byte_at(frame: &CanFrame, index: usize) -> Result<u8, KwpError> {
    frame.byte(index).ok_or_else(|| {
        KwpError::ProtocolViolation(format!("{} has no byte {}", frame, index))
    })
}

fn check_negative(reply: &CanFrame, service: u8) -> Result<(), KwpError> {
    if byte_at(reply, 3)? == service_id::NEGATIVE_RESPONSE {
        let code = ResponseCode::from(byte_at(reply, 5)?);
        return Err(KwpError::EcuError { service, code });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MockConfig;
    use crate::transport::mock::{MockTransport, SymbolRecord};
    use pretty_assertions::assert_eq;

    fn setup() -> (Arc<MockTransport>, KwpClient) {
        let mock = Arc::new(MockTransport::new(&MockConfig::default()));
        let client = KwpClient::new(mock.clone(), KwpConfig::default());
        (mock, client)
    }

    async fn connected() -> (Arc<MockTransport>, KwpClient) {
        let (mock, client) = setup();
        client
            .start_session(can_id::INIT_REQUEST, can_id::INIT_RESPONSE)
            .await
            .unwrap();
        (mock, client)
    }

    #[tokio::test]
    async fn start_session_negotiates_response_id() {
        let (mock, client) = connected().await;

        assert_eq!(
            client.state(),
            SessionState::Active {
                response_id: 0x258,
                security: SecurityState::Locked,
            }
        );
        assert_eq!(
            mock.sent_frames()[0].data,
            vec![0x3F, 0x81, 0x00, 0x11, 0x02, 0x40, 0x00, 0x00]
        );
    }

    #[tokio::test]
    async fn start_session_rejected() {
        let (mock, client) = setup();
        mock.add_response(
            vec![0x3F, 0x81, 0x00, 0x11, 0x02, 0x40, 0x00, 0x00],
            CanFrame::outgoing(
                can_id::INIT_RESPONSE,
                vec![0x40, 0xBF, 0x21, 0x7F, 0x81, 0x10, 0x00, 0x00],
            ),
        );

        let err = client
            .start_session(can_id::INIT_REQUEST, can_id::INIT_RESPONSE)
            .await
            .unwrap_err();
        assert!(matches!(err, KwpError::ProtocolRejected(_)));
        assert_eq!(client.state(), SessionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn start_session_times_out() {
        let (mock, client) = setup();
        mock.add_response(
            vec![0x3F, 0x81, 0x00, 0x11, 0x02, 0x40, 0x00, 0x00],
            CanFrame::outgoing(0x123, vec![0x00]),
        );
        let err = client
            .start_session(can_id::INIT_REQUEST, can_id::INIT_RESPONSE)
            .await
            .unwrap_err();
        assert!(matches!(err, KwpError::Timeout(_)));
    }

    #[tokio::test]
    async fn stop_session_is_idempotent() {
        let (mock, client) = setup();

        // before any start
        client.stop_session().await;
        assert_eq!(client.state(), SessionState::Disconnected);

        client
            .start_session(can_id::INIT_REQUEST, can_id::INIT_RESPONSE)
            .await
            .unwrap();
        client.stop_session().await;
        client.stop_session().await;
        assert_eq!(client.state(), SessionState::Disconnected);
        assert!(!mock.is_session_active());

        let stops = mock
            .sent_frames()
            .into_iter()
            .filter(|f| f.data == vec![0x40, 0xA1, 0x02, 0x82, 0x00])
            .count();
        assert_eq!(stops, 3);
    }

    #[tokio::test]
    async fn stop_session_survives_closed_transport() {
        let (mock, client) = connected().await;
        mock.set_connected(false);
        client.stop_session().await;
        assert_eq!(client.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn operations_need_a_session() {
        let (_mock, client) = setup();
        assert!(matches!(
            client.read_data_by_local_identifier(0xF0).await,
            Err(KwpError::NoSession)
        ));
        assert!(matches!(
            client.request_security_access(false).await,
            Err(KwpError::NoSession)
        ));
    }

    #[tokio::test]
    async fn security_access_with_first_method() {
        let (_mock, client) = connected().await;
        client.request_security_access(false).await.unwrap();
        assert!(client.has_security_access());

        // already unlocked: no-op
        client.request_security_access(false).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn security_access_walks_methods() {
        let (mock, client) = connected().await;
        mock.set_security_method(Some(3));

        let started = tokio::time::Instant::now();
        client.request_security_access(false).await.unwrap();

        assert!(client.has_security_access());
        // three rejected methods, each followed by a pause
        assert!(started.elapsed() >= Duration::from_secs(9));
        let keys = mock
            .sent_frames()
            .into_iter()
            .filter(|f| f.data.get(3..5) == Some(&[0x27, 0x06][..]))
            .count();
        assert_eq!(keys, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn security_access_denied_after_all_methods() {
        let (mock, client) = connected().await;
        mock.set_security_method(None);

        let err = client.request_security_access(false).await.unwrap_err();
        assert!(matches!(err, KwpError::AccessDenied));
        assert!(!client.has_security_access());

        let seeds = mock
            .sent_frames()
            .into_iter()
            .filter(|f| f.data.get(3..5) == Some(&[0x27, 0x05][..]))
            .count();
        assert_eq!(seeds, 5);
    }

    #[tokio::test]
    async fn routine_needs_security_access() {
        let (_mock, client) = connected().await;

        let err = client.start_routine_by_identifier(0x50).await.unwrap_err();
        assert_eq!(err.response_code(), Some(ResponseCode::SecurityAccessDenied));

        client.request_security_access(false).await.unwrap();
        let reply = client.start_routine_by_identifier(0x50).await.unwrap();
        assert_eq!(reply.byte(3), Some(0x71));
    }

    #[tokio::test]
    async fn stop_routine_reply() {
        let (mock, client) = connected().await;

        let reply = client.stop_routine_by_identifier(0x50).await.unwrap();
        assert_eq!(reply.id, can_id::RESPONSE);
        assert_eq!(&reply.data[2..5], &[0x02, 0x72, 0x50]);

        mock.reject_service(0x32, ResponseCode::RoutineNotComplete);
        let err = client.stop_routine_by_identifier(0x50).await.unwrap_err();
        assert!(matches!(
            err,
            KwpError::EcuError {
                service: 0x32,
                code: ResponseCode::RoutineNotComplete
            }
        ));

        mock.clear_rejections();
        assert!(client.stop_routine_by_identifier(0x50).await.is_ok());
    }

    #[tokio::test]
    async fn routine_results_reply() {
        let (mock, client) = connected().await;

        let reply = client.request_routine_results(0x50).await.unwrap();
        assert_eq!(&reply.data[2..6], &[0x03, 0x73, 0x50, 0x00]);
        let request = mock.sent_frames().pop().unwrap();
        assert_eq!(request.data, vec![0x40, 0xA1, 0x02, 0x33, 0x50, 0x00, 0x00, 0x00]);

        mock.reject_service(0x33, ResponseCode::ConditionsNotCorrect);
        let err = client.request_routine_results(0x50).await.unwrap_err();
        assert_eq!(err.response_code(), Some(ResponseCode::ConditionsNotCorrect));
    }

    #[tokio::test]
    async fn define_and_read_variables() {
        let (mock, client) = connected().await;
        mock.write_memory(0x1000, vec![0x12, 0x34, 0x56, 0x78, 0x9A]);

        let vars = [
            VariableDefinition::new("a", Method::Address, 0x1000, 2),
            VariableDefinition::new("b", Method::Address, 0x1002, 1),
            VariableDefinition::new("c", Method::Address, 0x1003, 2),
        ];
        for (slot, var) in vars.iter().enumerate() {
            client
                .dynamically_define_local_identifier(slot as u8, var)
                .await
                .unwrap();
        }

        let data = client.read_data_by_local_identifier(0xF0).await.unwrap();
        assert_eq!(data, vec![0x12, 0x34, 0x56, 0x78, 0x9A]);
        assert_eq!(mock.define_requests(), 3);
    }

    #[tokio::test]
    async fn define_request_is_chunked() {
        let (mock, client) = connected().await;
        let var = VariableDefinition::new("a", Method::Address, 0x00AB_CDEF, 4);
        client.dynamically_define_local_identifier(2, &var).await.unwrap();

        let frames: Vec<_> = mock
            .sent_frames()
            .into_iter()
            .filter(|f| f.id == can_id::REQUEST)
            .collect();
        assert_eq!(frames[0].data, vec![0xC1, 0xA1, 0x07, 0x2C, 0xF0, 0x03, 0x02, 0x04]);
        assert_eq!(frames[0].kind, FrameKind::ResponseRequired);
        assert_eq!(frames[1].data, vec![0x00, 0xA1, 0xAB, 0xCD, 0xEF, 0, 0, 0]);
        assert_eq!(frames[1].kind, FrameKind::Outgoing);
    }

    #[tokio::test]
    async fn define_rejected_on_confirmation() {
        let (mock, client) = connected().await;
        mock.reject_service(0x2C, ResponseCode::RequestOutOfRange);

        let var = VariableDefinition::new("a", Method::Symbol, 12, 2);
        let err = client
            .dynamically_define_local_identifier(0, &var)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            KwpError::EcuError {
                service: 0x2C,
                code: ResponseCode::RequestOutOfRange
            }
        ));
    }

    #[tokio::test]
    async fn multi_frame_read_is_acknowledged() {
        let (mock, client) = connected().await;
        let memory: Vec<u8> = (0..20).collect();
        mock.write_memory(0x2000, memory.clone());

        let var = VariableDefinition::new("block", Method::Address, 0x2000, 20);
        client.dynamically_define_local_identifier(0, &var).await.unwrap();
        let data = client.read_data_by_local_identifier(0xF0).await.unwrap();
        assert_eq!(data, memory);

        // 23 message bytes = 4 frames, 3 acknowledgements
        let acks: Vec<_> = mock
            .sent_frames()
            .into_iter()
            .filter(|f| f.id == can_id::TESTER_ACK)
            .map(|f| f.data[3])
            .collect();
        assert_eq!(acks, vec![0x83, 0x82, 0x81]);
    }

    #[tokio::test]
    async fn negative_read_reply() {
        let (mock, client) = connected().await;
        mock.fail_next_reads(1);

        let err = client.read_data_by_local_identifier(0xF0).await.unwrap_err();
        assert_eq!(err.response_code(), Some(ResponseCode::BusyRepeatRequest));
        assert!(client.read_data_by_local_identifier(0xF0).await.is_ok());
    }

    #[tokio::test]
    async fn read_memory_spans_windows() {
        let (mock, client) = connected().await;
        let memory: Vec<u8> = (0..300u32).map(|i| (i * 7) as u8).collect();
        mock.write_memory(0x3000, memory.clone());

        let data = client.read_memory_by_address(0x3000, 300).await.unwrap();
        assert_eq!(data, memory);
    }

    #[tokio::test]
    async fn transfer_data_and_exit() {
        let (mock, client) = connected().await;
        mock.set_symbol_table(
            vec![SymbolRecord {
                address: 0x00F0_1234,
                length: 2,
                symbol_type: 0x01,
            }],
            vec![0xAA; 16],
        )
        .unwrap();

        assert!(client.transfer_data().await.is_err());

        client.request_security_access(false).await.unwrap();
        client.start_routine_by_identifier(0x50).await.unwrap();
        let first = client.transfer_data().await.unwrap();
        let message = client.receive_message(first).await.unwrap();
        client.request_transfer_exit().await.unwrap();

        assert_eq!(message[0] as usize, message.len() - 1);
        assert_eq!(message[1], 0x76);
        assert_eq!(
            &message[2..],
            &[0x00, 0x0F, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0xF0, 0x12, 0x34, 0x00, 0x02, 0x01]
        );
    }

    #[test]
    fn request_frames_are_padded() {
        let frame = request_frame(0x21, &[0xF0]);
        assert_eq!(frame.data, vec![0x40, 0xA1, 0x02, 0x21, 0xF0, 0x00, 0x00, 0x00]);
        let frame = request_frame(0x27, &[0x06, 0x12, 0x34]);
        assert_eq!(frame.data, vec![0x40, 0xA1, 0x04, 0x27, 0x06, 0x12, 0x34, 0x00]);
    }
}
