//! Datalogging engine errors

use t7_kwp::{KwpError, TransportError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("Invalid logger configuration: {0}")]
    InvalidConfig(String),

    #[error("Log file error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Kwp(#[from] KwpError),

    #[error("{count} variables exceed the {max} slots of the dynamic local identifier")]
    TooManyVariables { count: usize, max: usize },

    #[error("Failed to define variables: {0}")]
    DefineVariables(KwpError),

    #[error("Too many errors ({errors} in one second), restarting logging")]
    TooManyErrors { errors: u32 },

    #[error("Giving up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<LoggerError>,
    },
}
