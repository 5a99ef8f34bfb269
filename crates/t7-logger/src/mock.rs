//! Random sample producer for exercising sinks without an ECU

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use t7_kwp::VariableList;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::info;

use crate::engine::StopHandle;
use crate::logfile::SINK_TIME_FORMAT;
use crate::sink::{LogMessage, Sink};

/// Upper bound (exclusive) of produced values
pub const MOCK_VALUE_RANGE: u32 = 8000;

/// Pushes `number:value` samples for every variable at a fixed rate
pub struct MockProducer {
    variables: VariableList,
    sink: Arc<dyn Sink>,
    frequency: u32,
    rng: StdRng,
    stop: StopHandle,
}

impl MockProducer {
    pub fn new(variables: VariableList, sink: Arc<dyn Sink>, frequency: u32) -> Self {
        Self::with_rng(variables, sink, frequency, StdRng::from_entropy())
    }

    /// Reproducible values, for tests
    pub fn with_seed(variables: VariableList, sink: Arc<dyn Sink>, frequency: u32, seed: u64) -> Self {
        Self::with_rng(variables, sink, frequency, StdRng::seed_from_u64(seed))
    }

    fn with_rng(variables: VariableList, sink: Arc<dyn Sink>, frequency: u32, rng: StdRng) -> Self {
        Self {
            variables,
            sink,
            frequency: frequency.max(1),
            rng,
            stop: StopHandle::new(),
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Produce until stopped; returns the number of samples pushed
    pub async fn run(mut self) -> u64 {
        let period = Duration::from_secs(1) / self.frequency;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(frequency = self.frequency, "Mock producer started");

        let mut produced = 0u64;
        loop {
            tokio::select! {
                _ = self.stop.stopped() => break,
                _ = ticker.tick() => {
                    let message = self.sample();
                    self.sink.push(message);
                    produced += 1;
                }
            }
        }
        info!(produced, "Mock producer stopped");
        produced
    }

    fn sample(&mut self) -> LogMessage {
        let snapshot = self.variables.snapshot();
        let values: Vec<String> = snapshot
            .iter()
            .map(|var| format!("{}:{}", var.value, self.rng.gen_range(0..MOCK_VALUE_RANGE)))
            .collect();
        let timestamp = Utc::now();
        LogMessage {
            timestamp,
            payload: format!(
                "{}|{}",
                timestamp.with_timezone(&Local).format(SINK_TIME_FORMAT),
                values.join(",")
            ),
        }
    }
}
