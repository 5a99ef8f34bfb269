//! Datalogging engine
//!
//! Drives one protocol client at a fixed rate. Every attempt opens a fresh
//! transport, starts a session, defines the variable list on the dynamic
//! local identifier and polls it until told to stop. Too many failed polls
//! within a second tear the session down and start over.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Utc};
use t7_kwp::kwp::{can_id, DYNAMIC_LOCAL_ID};
use t7_kwp::{KwpClient, KwpConfig, TransportFactory, VariableList, VariableSnapshot};
use tokio::sync::{broadcast, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::LoggerConfig;
use crate::error::LoggerError;
use crate::logfile::{LogFile, Sample};
use crate::sink::Sink;

/// Which attempt of a run is in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    First,
    /// Retry number, starting at 1
    Retry(u32),
}

impl Attempt {
    /// Zero-based attempt index
    pub fn index(self) -> u32 {
        match self {
            Self::First => 0,
            Self::Retry(n) => n,
        }
    }

    pub fn next(self) -> Self {
        Self::Retry(self.index() + 1)
    }
}

/// Running totals of a logging run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    /// Samples written
    pub captured: u64,
    /// Failed polls since the run started
    pub errors: u64,
    /// Failed polls in the last full second
    pub errors_per_second: u32,
}

/// Progress reported while the engine runs
#[derive(Debug, Clone, PartialEq)]
pub enum LoggerEvent {
    /// Human-readable status line
    Status(String),
    Counters(Counters),
}

/// Cooperative stop signal shared between the engine and its controllers
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for StopHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl StopHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request a stop; observed between ticks
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once a stop has been requested
    pub async fn stopped(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in self, so this only returns once stopped
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

/// How an attempt ended when it did not end with a stop
enum Failure {
    /// Could not get to polling; fatal on the first attempt
    Setup(LoggerError),
    /// Session broke down while polling
    Session(LoggerError),
}

impl Failure {
    fn into_error(self) -> LoggerError {
        match self {
            Self::Setup(e) | Self::Session(e) => e,
        }
    }
}

/// Fixed-rate datalogger
pub struct Datalogger {
    config: LoggerConfig,
    kwp: KwpConfig,
    transports: Arc<dyn TransportFactory>,
    variables: VariableList,
    sink: Arc<dyn Sink>,
    events: broadcast::Sender<LoggerEvent>,
    stop: StopHandle,
}

impl Datalogger {
    pub fn new(
        config: LoggerConfig,
        kwp: KwpConfig,
        transports: Arc<dyn TransportFactory>,
        variables: VariableList,
        sink: Arc<dyn Sink>,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            config,
            kwp,
            transports,
            variables,
            sink,
            events,
            stop: StopHandle::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LoggerEvent> {
        self.events.subscribe()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Log until stopped or out of attempts
    ///
    /// Returns the final counters on a clean stop.
    pub async fn run(&self) -> Result<Counters, LoggerError> {
        self.config.validate()?;
        check_slots(self.variables.snapshot().len())?;

        let mut file = LogFile::create(&self.config.log_dir, Local::now())?;
        self.status(format!("Logging to {}", file.path().display()));

        let mut counters = Counters::default();
        let mut attempt = Attempt::First;

        loop {
            if self.stop.is_stopped() {
                return Ok(counters);
            }
            let failure = match self.run_attempt(attempt, &mut file, &mut counters).await {
                Ok(()) => return Ok(counters),
                Err(failure) => failure,
            };

            let fatal = matches!((&failure, attempt), (Failure::Setup(_), Attempt::First));
            let err = failure.into_error();
            if fatal {
                error!(error = %err, "Logging failed to start");
                return Err(err);
            }

            let attempts = attempt.index() + 1;
            if attempts >= self.config.max_attempts {
                error!(error = %err, attempts, "Giving up");
                return Err(LoggerError::RetriesExhausted {
                    attempts,
                    last: Box::new(err),
                });
            }

            self.status(format!("Retry {}: {}", attempts, err));
            tokio::select! {
                _ = self.stop.stopped() => return Ok(counters),
                _ = tokio::time::sleep(self.config.retry_delay()) => {}
            }
            attempt = attempt.next();
        }
    }

    async fn run_attempt(
        &self,
        attempt: Attempt,
        file: &mut LogFile,
        counters: &mut Counters,
    ) -> Result<(), Failure> {
        let transport = self
            .transports
            .open()
            .await
            .map_err(|e| Failure::Setup(e.into()))?;
        let client = KwpClient::new(transport.clone(), self.kwp.clone());

        let result = self.session(attempt, &client, file, counters).await;

        client.stop_session().await;
        if let Err(e) = transport.close().await {
            debug!(error = %e, "Transport close failed");
        }
        result
    }

    async fn session(
        &self,
        attempt: Attempt,
        client: &KwpClient,
        file: &mut LogFile,
        counters: &mut Counters,
    ) -> Result<(), Failure> {
        if let Attempt::Retry(n) = attempt {
            debug!(retry = n, "Resetting session before retry");
            client.stop_session().await;
            tokio::time::sleep(self.config.restart_pause()).await;
        }

        client
            .start_session(can_id::INIT_REQUEST, can_id::INIT_RESPONSE)
            .await
            .map_err(|e| Failure::Setup(e.into()))?;
        self.status("Connected to ECU");

        let mut updates = self.variables.subscribe();
        let mut snapshot = updates.borrow_and_update().clone();
        define_variables(client, &snapshot)
            .await
            .map_err(Failure::Setup)?;

        let period = self.config.poll_period();
        let mut poll = interval_at(Instant::now() + period, period);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let second = Duration::from_secs(1);
        let mut per_second = interval_at(Instant::now() + second, second);
        per_second.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut errors_this_second = 0u32;
        self.status(format!("Live logging at {} fps", self.config.frequency));

        loop {
            tokio::select! {
                _ = self.stop.stopped() => {
                    self.status("Stop logging...");
                    return Ok(());
                }
                changed = updates.changed() => {
                    if changed.is_err() {
                        continue;
                    }
                    snapshot = updates.borrow_and_update().clone();
                    define_variables(client, &snapshot)
                        .await
                        .map_err(Failure::Session)?;
                    info!(count = snapshot.len(), version = snapshot.version, "Variables redefined");
                }
                _ = per_second.tick() => {
                    counters.errors_per_second = errors_this_second;
                    self.publish(*counters);
                    if errors_this_second > self.config.error_limit {
                        return Err(Failure::Session(LoggerError::TooManyErrors {
                            errors: errors_this_second,
                        }));
                    }
                    errors_this_second = 0;
                }
                _ = poll.tick() => {
                    match self.poll_once(client, &snapshot, file).await {
                        Ok(()) => counters.captured += 1,
                        Err(message) => {
                            counters.errors += 1;
                            errors_this_second += 1;
                            self.status(message);
                        }
                    }
                    self.publish(*counters);
                }
            }
        }
    }

    /// One poll; the error is the status line describing the failure
    async fn poll_once(
        &self,
        client: &KwpClient,
        snapshot: &VariableSnapshot,
        file: &mut LogFile,
    ) -> Result<(), String> {
        let data = client
            .read_data_by_local_identifier(DYNAMIC_LOCAL_ID)
            .await
            .map_err(|e| format!("Failed to read data: {}", e))?;

        let timestamp = Utc::now();
        let sample = Sample::decode(timestamp, &snapshot.variables, &data)
            .map_err(|e| format!("Failed to decode reply: {}", e))?;
        if !sample.trailing.is_empty() {
            warn!(count = sample.trailing.len(), "Reply longer than the variable list");
            self.status(format!(
                "Leftovers {}: {}",
                sample.trailing.len(),
                hex::encode_upper(&sample.trailing)
            ));
        }

        file.write_line(&sample.file_line(&Local))
            .map_err(|e| format!("Failed to write log line: {}", e))?;
        self.sink.push(sample.to_message(&Local));
        Ok(())
    }

    fn status(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        let _ = self.events.send(LoggerEvent::Status(message));
    }

    fn publish(&self, counters: Counters) {
        let _ = self.events.send(LoggerEvent::Counters(counters));
    }
}

/// Slots are a single byte on the wire
const MAX_SLOTS: usize = u8::MAX as usize + 1;

fn check_slots(count: usize) -> Result<(), LoggerError> {
    if count > MAX_SLOTS {
        return Err(LoggerError::TooManyVariables {
            count,
            max: MAX_SLOTS,
        });
    }
    Ok(())
}

/// Define every variable on the dynamic local identifier, slot = list index
async fn define_variables(
    client: &KwpClient,
    snapshot: &VariableSnapshot,
) -> Result<(), LoggerError> {
    check_slots(snapshot.len())?;
    for (slot, var) in (0..=u8::MAX).zip(snapshot.iter()) {
        client
            .dynamically_define_local_identifier(slot, var)
            .await
            .map_err(LoggerError::DefineVariables)?;
    }
    debug!(count = snapshot.len(), "Variables defined");
    Ok(())
}
