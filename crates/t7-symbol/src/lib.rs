//! t7-symbol - Trionic 7 symbol catalog acquisition
//!
//! Recovers the ECU's symbol table (name, address, length and type of every
//! readable variable) either live, through the table export routine of a
//! connected ECU, or offline from a firmware image.
//!
//! Both paths end with the same step: the compressed name blob is expanded
//! through a [`NameCodec`] and the names are assigned to the symbols by
//! position.
//!
//! ```ignore
//! use t7_symbol::{load_symbols_from_file, LzhufCodec};
//!
//! let symbols = load_symbols_from_file("firmware.bin", &LzhufCodec, |s: &str| println!("{s}"))?;
//! for symbol in &symbols {
//!     println!("{symbol}");
//! }
//! ```

pub mod binary;
pub mod codec;
pub mod ecu;
pub mod error;
pub mod factors;
pub mod symbol;
pub mod sync;

pub use binary::{load_symbols_from_file, parse_image};
pub use codec::{expand_symbol_names, LzhufCodec, NameCodec, PassthroughCodec};
pub use ecu::load_symbols_from_ecu;
pub use error::{SymbolError, SymbolResult};
pub use symbol::Symbol;
pub use sync::sync_variables;

use std::path::Path;

/// Save a symbol list as JSON
pub fn save_symbols(path: impl AsRef<Path>, symbols: &[Symbol]) -> SymbolResult<()> {
    let content = serde_json::to_string_pretty(symbols)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Load a symbol list saved with [`save_symbols`]
pub fn load_symbols(path: impl AsRef<Path>) -> SymbolResult<Vec<Symbol>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
