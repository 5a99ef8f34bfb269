//! Log command - fixed-rate datalogging to file

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use t7_kwp::{KwpConfig, TransportFactory, VariableList};
use t7_logger::{BroadcastSink, Counters, Datalogger, LoggerConfig, LoggerEvent};
use tokio::sync::broadcast::error::RecvError;

use super::print_sample;
use crate::output::OutputContext;

/// Log the variables in `vars` until Ctrl+C or until retries run out
pub async fn log(
    vars: &Path,
    transports: Arc<dyn TransportFactory>,
    config: &LoggerConfig,
    kwp: &KwpConfig,
    ctx: &OutputContext,
) -> Result<()> {
    let variables = VariableList::load(vars)
        .with_context(|| format!("Failed to read variables from {}", vars.display()))?;
    if variables.snapshot().is_empty() {
        bail!("No variables defined in {}", vars.display());
    }

    let sink = BroadcastSink::default();
    let mut samples = sink.subscribe();
    let logger = Datalogger::new(
        config.clone(),
        kwp.clone(),
        transports,
        variables,
        Arc::new(sink),
    );
    let mut events = logger.subscribe();

    let stop = logger.stop_handle();
    ctrlc::set_handler(move || stop.stop())?;
    ctx.info("Press Ctrl+C to stop");

    let run = logger.run();
    tokio::pin!(run);

    let mut errors_per_second = 0;
    let result = loop {
        tokio::select! {
            result = &mut run => break result,
            event = events.recv() => match event {
                Ok(LoggerEvent::Status(status)) if status.starts_with("Retry") => ctx.warn(&status),
                Ok(LoggerEvent::Status(status)) => ctx.info(&status),
                Ok(LoggerEvent::Counters(counters)) => errors_per_second = counters.errors_per_second,
                Err(RecvError::Lagged(_)) | Err(RecvError::Closed) => {}
            },
            sample = samples.recv() => {
                if let Ok(message) = sample {
                    print_sample(&message, ctx);
                }
            }
        }
    };

    let counters: Counters = result.context("Logging failed")?;
    ctx.success("Logging stopped");
    ctx.print_kv(&[
        ("Captured", counters.captured.to_string()),
        ("Errors", counters.errors.to_string()),
        ("Errors/s (last)", errors_per_second.to_string()),
    ]);
    Ok(())
}
