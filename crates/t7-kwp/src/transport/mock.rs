//! Mock transport simulating a Trionic 7 for testing
//!
//! The simulated ECU answers session start, security access, routine
//! control, TransferData, dynamic local identifier definition and polled
//! reads, using the same chunking and acknowledgement scheme as the real
//! unit.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;

use super::{CanFrame, CanTransport, FrameSubscription, TransportError};
use crate::config::MockConfig;
use crate::kwp::chunk::{self, CONFIRMATION_REQUESTED, ECU_ADDRESS, FIRST_CHUNK};
use crate::kwp::{
    can_id, security, service_id, ResponseCode, DYNAMIC_LOCAL_ID, SYMBOL_TABLE_ROUTINE,
};

/// Where the simulated ECU keeps the compressed symbol name blob
pub const NAME_BLOB_ADDRESS: u32 = 0x000F_0000;

/// Symbol table entry served by the simulated ECU
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolRecord {
    pub address: u32,
    pub length: u16,
    pub symbol_type: u8,
}

impl SymbolRecord {
    fn to_bytes(&self) -> [u8; 7] {
        let a = self.address.to_be_bytes();
        let l = self.length.to_be_bytes();
        [a[0], a[1], a[2], a[3], l[0], l[1], self.symbol_type]
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Address { address: u32, length: u8 },
    LocalId(u8),
    Symbol(u16),
}

/// State of the simulated ECU
#[derive(Debug)]
struct SimulatedEcu {
    security_method: Option<u8>,
    seed: u16,
    session_active: bool,
    unlocked: bool,
    routine_running: bool,
    session_starts: usize,
    define_requests: usize,
    failing_reads: usize,
    rejections: HashMap<u8, u8>,
    slots: BTreeMap<u8, Slot>,
    inbound: Vec<u8>,
    outbound: VecDeque<CanFrame>,
    memory: Vec<(u32, Vec<u8>)>,
    symbols: Vec<SymbolRecord>,
}

impl SimulatedEcu {
    fn new(config: &MockConfig) -> Self {
        Self {
            security_method: config.security_method,
            seed: config.seed,
            session_active: false,
            unlocked: false,
            routine_running: false,
            session_starts: 0,
            define_requests: 0,
            failing_reads: 0,
            rejections: HashMap::new(),
            slots: BTreeMap::new(),
            inbound: Vec::new(),
            outbound: VecDeque::new(),
            memory: Vec::new(),
            symbols: vec![SymbolRecord {
                address: NAME_BLOB_ADDRESS,
                length: 0,
                symbol_type: 0,
            }],
        }
    }

    fn handle(&mut self, frame: &CanFrame) -> Vec<CanFrame> {
        match frame.id {
            can_id::INIT_REQUEST => self.start_session(frame),
            can_id::REQUEST => self.request_chunk(frame),
            can_id::TESTER_ACK => self.outbound.pop_front().into_iter().collect(),
            _ => Vec::new(),
        }
    }

    fn start_session(&mut self, frame: &CanFrame) -> Vec<CanFrame> {
        if frame.byte(1) != Some(service_id::START_COMMUNICATION) {
            return Vec::new();
        }
        self.session_starts += 1;
        self.session_active = true;
        self.unlocked = false;
        self.routine_running = false;
        self.slots.clear();
        self.inbound.clear();
        self.outbound.clear();

        let [hi, lo] = (can_id::RESPONSE as u16).to_be_bytes();
        vec![CanFrame::outgoing(
            can_id::INIT_RESPONSE,
            vec![
                0x40,
                ECU_ADDRESS,
                0x21,
                service_id::positive(service_id::START_COMMUNICATION),
                0x8F,
                0x00,
                hi,
                lo,
            ],
        )]
    }

    fn request_chunk(&mut self, frame: &CanFrame) -> Vec<CanFrame> {
        if !self.session_active {
            return Vec::new();
        }
        let control = frame.byte(0).unwrap_or_default();
        if control & FIRST_CHUNK != 0 {
            self.inbound.clear();
        }
        self.inbound
            .extend_from_slice(frame.data().get(2..).unwrap_or_default());

        if control & CONFIRMATION_REQUESTED != 0 {
            let service = self.inbound.get(1).copied().unwrap_or_default();
            let data = match self.rejections.get(&service) {
                Some(&code) => vec![
                    0x40,
                    ECU_ADDRESS,
                    0x03,
                    service_id::NEGATIVE_RESPONSE,
                    service,
                    code,
                    0x00,
                    0x00,
                ],
                None => vec![
                    0x40,
                    ECU_ADDRESS,
                    0x3F,
                    control & !FIRST_CHUNK,
                    0x00,
                    0x00,
                    0x00,
                    0x00,
                ],
            };
            return vec![CanFrame::outgoing(can_id::ECU_ACK, data)];
        }

        // The declared length is not enforced: define requests declare one
        // byte less than they carry. Parsers skip trailing padding.
        let message = std::mem::take(&mut self.inbound);
        match self.process(&message) {
            Some(reply) => self.reply(&reply),
            None => Vec::new(),
        }
    }

    fn process(&mut self, message: &[u8]) -> Option<Vec<u8>> {
        let service = *message.get(1)?;
        let params = message.get(2..).unwrap_or_default();

        if let Some(&code) = self.rejections.get(&service) {
            return Some(negative(service, code));
        }

        match service {
            service_id::STOP_COMMUNICATION => {
                self.session_active = false;
                self.unlocked = false;
                self.routine_running = false;
                None
            }
            service_id::SECURITY_ACCESS => Some(self.security_access(params)),
            service_id::START_ROUTINE_BY_LOCAL_IDENTIFIER => {
                let id = params.first().copied().unwrap_or_default();
                if id != SYMBOL_TABLE_ROUTINE {
                    return Some(negative(service, 0x31));
                }
                if !self.unlocked {
                    return Some(negative(service, 0x33));
                }
                self.routine_running = true;
                Some(positive(service, &[id]))
            }
            service_id::STOP_ROUTINE_BY_LOCAL_IDENTIFIER => {
                self.routine_running = false;
                Some(positive(service, params.get(..1).unwrap_or_default()))
            }
            service_id::REQUEST_ROUTINE_RESULTS_BY_LOCAL_IDENTIFIER => {
                let id = params.first().copied().unwrap_or_default();
                Some(positive(service, &[id, 0x00]))
            }
            service_id::TRANSFER_DATA => {
                if !self.routine_running {
                    return Some(negative(service, 0x22));
                }
                let table: Vec<u8> = self.symbols.iter().flat_map(|s| s.to_bytes()).collect();
                Some(positive(service, &table))
            }
            service_id::REQUEST_TRANSFER_EXIT => {
                self.routine_running = false;
                Some(positive(service, &[]))
            }
            service_id::DYNAMICALLY_DEFINE_LOCAL_IDENTIFIER => Some(self.define(params)),
            service_id::READ_DATA_BY_LOCAL_IDENTIFIER => Some(self.read_local_id(params)),
            _ => Some(negative(service, 0x11)),
        }
    }

    fn security_access(&mut self, params: &[u8]) -> Vec<u8> {
        let service = service_id::SECURITY_ACCESS;
        match params {
            [0x05, ..] => {
                let [hi, lo] = self.seed.to_be_bytes();
                positive(service, &[0x05, hi, lo])
            }
            [0x06, hi, lo, ..] => {
                let key = u16::from_be_bytes([*hi, *lo]);
                let expected = self
                    .security_method
                    .and_then(|m| security::calculate_key(self.seed, m));
                if expected == Some(key) {
                    self.unlocked = true;
                    positive(service, &[0x06, 0x34])
                } else {
                    negative(service, 0x35)
                }
            }
            _ => negative(service, 0x12),
        }
    }

    fn define(&mut self, params: &[u8]) -> Vec<u8> {
        let service = service_id::DYNAMICALLY_DEFINE_LOCAL_IDENTIFIER;
        self.define_requests += 1;

        let slot = match params {
            [DYNAMIC_LOCAL_ID, 0x03, slot, 0x00, 0x80, hi, lo, ..] => {
                Some((*slot, Slot::Symbol(u16::from_be_bytes([*hi, *lo]))))
            }
            [DYNAMIC_LOCAL_ID, 0x03, slot, length, a2, a1, a0, ..] => Some((
                *slot,
                Slot::Address {
                    address: u32::from_be_bytes([0, *a2, *a1, *a0]),
                    length: *length,
                },
            )),
            [DYNAMIC_LOCAL_ID, 0x01, slot, _, id, ..] => Some((*slot, Slot::LocalId(*id))),
            _ => None,
        };

        match slot {
            Some((slot, definition)) => {
                self.slots.insert(slot, definition);
                positive(service, &[DYNAMIC_LOCAL_ID])
            }
            None => negative(service, 0x12),
        }
    }

    fn read_local_id(&mut self, params: &[u8]) -> Vec<u8> {
        let service = service_id::READ_DATA_BY_LOCAL_IDENTIFIER;
        if params.first() != Some(&DYNAMIC_LOCAL_ID) {
            return negative(service, 0x31);
        }
        if self.failing_reads > 0 {
            self.failing_reads -= 1;
            return negative(service, 0x21);
        }

        let mut data = vec![DYNAMIC_LOCAL_ID];
        for slot in self.slots.values() {
            let bytes = match *slot {
                Slot::Address { address, length } => self.read_memory(address, length as usize),
                Slot::LocalId(id) => vec![0x00, id],
                Slot::Symbol(number) => match self.symbols.get(number as usize) {
                    Some(sym) => self.read_memory(sym.address, sym.length as usize),
                    None => number.to_be_bytes().to_vec(),
                },
            };
            data.extend(bytes);
        }
        if data.len() + 1 > u8::MAX as usize {
            return negative(service, 0x31);
        }
        positive(service, &data)
    }

    fn read_memory(&self, address: u32, length: usize) -> Vec<u8> {
        (0..length as u32)
            .map(|i| {
                let at = address + i;
                self.memory
                    .iter()
                    .find_map(|(base, bytes)| {
                        at.checked_sub(*base)
                            .and_then(|off| bytes.get(off as usize).copied())
                    })
                    .unwrap_or(at as u8)
            })
            .collect()
    }

    /// Encode a reply message; the first frame goes out now, the rest wait
    /// for tester acknowledgements.
    fn reply(&mut self, message: &[u8]) -> Vec<CanFrame> {
        let mut frames: VecDeque<CanFrame> =
            chunk::encode_chunks(can_id::RESPONSE, ECU_ADDRESS, message)
                .into_iter()
                .map(|mut frame| {
                    frame.data[0] |= CONFIRMATION_REQUESTED;
                    frame
                })
                .collect();
        let first = frames.pop_front();
        self.outbound = frames;
        first.into_iter().collect()
    }
}

fn positive(service: u8, params: &[u8]) -> Vec<u8> {
    let mut message = vec![(params.len() + 1) as u8, service_id::positive(service)];
    message.extend_from_slice(params);
    message
}

fn negative(service: u8, code: u8) -> Vec<u8> {
    vec![0x03, service_id::NEGATIVE_RESPONSE, service, code]
}

/// Mock transport backed by a simulated Trionic 7
pub struct MockTransport {
    config: MockConfig,
    connected: AtomicBool,
    incoming_tx: broadcast::Sender<CanFrame>,
    ecu: Mutex<SimulatedEcu>,
    /// Predefined replies checked before the simulation (request data -> reply)
    responses: RwLock<Vec<(Vec<u8>, CanFrame)>>,
    sent: Mutex<Vec<CanFrame>>,
}

impl MockTransport {
    pub fn new(config: &MockConfig) -> Self {
        let (incoming_tx, _) = broadcast::channel(256);
        Self {
            config: config.clone(),
            connected: AtomicBool::new(true),
            incoming_tx,
            ecu: Mutex::new(SimulatedEcu::new(config)),
            responses: RwLock::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Answer frames carrying exactly `request` with `reply`
    pub fn add_response(&self, request: Vec<u8>, reply: CanFrame) {
        self.responses.write().push((request, reply));
    }

    /// Security access method the ECU accepts (`None` rejects every key)
    pub fn set_security_method(&self, method: Option<u8>) {
        self.ecu.lock().security_method = method;
    }

    /// Answer the next `count` polled reads with "busy, repeat request"
    pub fn fail_next_reads(&self, count: usize) {
        self.ecu.lock().failing_reads = count;
    }

    /// Answer every request for `service` with a negative response
    pub fn reject_service(&self, service: u8, code: ResponseCode) {
        self.ecu.lock().rejections.insert(service, code.into());
    }

    pub fn clear_rejections(&self) {
        self.ecu.lock().rejections.clear();
    }

    /// Place `bytes` in the ECU's memory at `address`
    pub fn write_memory(&self, address: u32, bytes: Vec<u8>) {
        let mut ecu = self.ecu.lock();
        ecu.memory.retain(|(base, _)| *base != address);
        ecu.memory.push((address, bytes));
    }

    /// Install the symbol table exported by the table routine
    ///
    /// Record 0 is generated and points at `name_blob`, which is stored at
    /// [`NAME_BLOB_ADDRESS`].
    pub fn set_symbol_table(
        &self,
        records: Vec<SymbolRecord>,
        name_blob: Vec<u8>,
    ) -> Result<(), TransportError> {
        let table_len = (records.len() + 1) * 7;
        if table_len + 1 > u8::MAX as usize {
            return Err(TransportError::InvalidConfig(format!(
                "symbol table of {} bytes does not fit one transfer",
                table_len
            )));
        }
        let blob_len = u16::try_from(name_blob.len()).map_err(|_| {
            TransportError::InvalidConfig(format!("name blob of {} bytes", name_blob.len()))
        })?;

        let mut symbols = vec![SymbolRecord {
            address: NAME_BLOB_ADDRESS,
            length: blob_len,
            symbol_type: 0,
        }];
        symbols.extend(records);
        self.ecu.lock().symbols = symbols;
        self.write_memory(NAME_BLOB_ADDRESS, name_blob);
        Ok(())
    }

    /// Number of session start requests answered
    pub fn session_starts(&self) -> usize {
        self.ecu.lock().session_starts
    }

    /// Number of DynamicallyDefineLocalIdentifier requests processed
    pub fn define_requests(&self) -> usize {
        self.ecu.lock().define_requests
    }

    pub fn is_session_active(&self) -> bool {
        self.ecu.lock().session_active
    }

    /// Every frame sent through this transport, oldest first
    pub fn sent_frames(&self) -> Vec<CanFrame> {
        self.sent.lock().clone()
    }

    /// Set connection state
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Mark the link usable again after `close`
    pub fn reopen(&self) {
        self.set_connected(true);
    }

    fn find_response(&self, frame: &CanFrame) -> Option<CanFrame> {
        self.responses
            .read()
            .iter()
            .find(|(request, _)| *request == frame.data)
            .map(|(_, reply)| reply.clone())
    }
}

#[async_trait]
impl CanTransport for MockTransport {
    async fn send(&self, frame: CanFrame) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }
        frame.validate()?;

        // Simulate latency
        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }

        tracing::debug!(frame = %frame, "Mock transport: sent frame");
        self.sent.lock().push(frame.clone());

        let replies = match self.find_response(&frame) {
            Some(reply) => vec![reply],
            None => self.ecu.lock().handle(&frame),
        };
        for reply in replies {
            tracing::debug!(frame = %reply, "Mock transport: reply");
            let _ = self.incoming_tx.send(reply);
        }
        Ok(())
    }

    fn subscribe(&self, id: u32) -> FrameSubscription {
        FrameSubscription::new(id, self.incoming_tx.subscribe())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}
