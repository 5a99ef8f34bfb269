//! Mock command - random samples without an ECU

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use t7_kwp::VariableList;
use t7_logger::{BroadcastSink, MockProducer};

use super::print_sample;
use crate::output::OutputContext;

/// Push random `number:value` samples for the variables in `vars`
pub async fn mock(
    vars: &Path,
    frequency: u32,
    duration: Option<u64>,
    ctx: &OutputContext,
) -> Result<()> {
    let variables = VariableList::load(vars)
        .with_context(|| format!("Failed to read variables from {}", vars.display()))?;

    let sink = BroadcastSink::default();
    let mut samples = sink.subscribe();
    let producer = MockProducer::new(variables, Arc::new(sink), frequency);

    let stop = producer.stop_handle();
    let ctrl_c = stop.clone();
    ctrlc::set_handler(move || ctrl_c.stop())?;
    if let Some(secs) = duration {
        let timer = stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            timer.stop();
        });
    }
    ctx.info(&format!("Mocking at {} fps, press Ctrl+C to stop", frequency));

    let mut task = tokio::spawn(producer.run());
    let produced = loop {
        tokio::select! {
            produced = &mut task => break produced.context("Mock producer panicked")?,
            sample = samples.recv() => {
                if let Ok(message) = sample {
                    print_sample(&message, ctx);
                }
            }
        }
    };

    ctx.success(&format!("Produced {} samples", produced));
    Ok(())
}
