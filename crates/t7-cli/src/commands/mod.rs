//! Command implementations for t7log

pub mod log;
pub mod mock;
pub mod symbols;
pub mod sync;

pub use log::log;
pub use mock::mock;
pub use symbols::{symbols, SymbolSource};
pub use sync::sync;

use t7_logger::LogMessage;

use crate::output::{OutputContext, OutputFormat};

/// Print one captured sample in the configured format
fn print_sample(message: &LogMessage, ctx: &OutputContext) {
    if ctx.quiet {
        return;
    }
    match ctx.format {
        OutputFormat::Json => match serde_json::to_string(message) {
            Ok(line) => println!("{}", line),
            Err(e) => ctx.error(&format!("Failed to encode sample: {}", e)),
        },
        OutputFormat::Table | OutputFormat::Csv => println!("{}", message.payload),
    }
}
