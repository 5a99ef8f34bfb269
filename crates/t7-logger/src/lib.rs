//! t7-logger - Fixed-rate Trionic 7 datalogging
//!
//! The [`Datalogger`] defines a [`VariableList`](t7_kwp::VariableList) on the
//! ECU's dynamic local identifier and polls it at a configured frequency.
//! Every sample is appended to a log file and pushed to a [`Sink`].
//!
//! Failures are handled by restarting the whole session: an attempt that
//! sees more than `error_limit` failed polls within one second is torn down
//! and a new one is started after `retry_delay_ms`, up to `max_attempts`.
//!
//! ```ignore
//! let logger = Datalogger::new(config, kwp, Arc::new(transport), variables, Arc::new(sink));
//! let stop = logger.stop_handle();
//! tokio::spawn(async move { tokio::signal::ctrl_c().await.ok(); stop.stop(); });
//! let counters = logger.run().await?;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod logfile;
pub mod mock;
pub mod sink;

pub use config::LoggerConfig;
pub use engine::{Attempt, Counters, Datalogger, LoggerEvent, StopHandle};
pub use error::LoggerError;
pub use logfile::{LogFile, Reading, Sample};
pub use mock::MockProducer;
pub use sink::{BroadcastSink, LogMessage, NullSink, Sink};
