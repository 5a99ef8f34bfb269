//! ECU symbol table entries

use std::fmt;

use serde::{Deserialize, Serialize};
use t7_kwp::{Method, VariableDefinition};

use crate::factors;

/// One readable variable of the ECU
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    /// Position in the symbol table, also the number used to define it
    pub number: u32,
    pub address: u32,
    pub length: u16,
    #[serde(default)]
    pub mask: u16,
    #[serde(rename = "type")]
    pub symbol_type: u8,
    pub correction_factor: String,
    #[serde(default)]
    pub unit: String,
}

impl Symbol {
    /// Unnamed symbol; the name is a placeholder until names are assigned
    pub fn new(number: u32, address: u32, length: u16, mask: u16, symbol_type: u8) -> Self {
        Self {
            name: format!("Symbol-{}", number),
            number,
            address,
            length,
            mask,
            symbol_type,
            correction_factor: "1".to_string(),
            unit: String::new(),
        }
    }

    /// Set the name along with the unit and correction factor it implies
    pub fn with_name(mut self, name: &str) -> Self {
        self.assign_name(name);
        self
    }

    pub(crate) fn assign_name(&mut self, name: &str) {
        let name = name.trim();
        self.unit = factors::unit(name).to_string();
        self.correction_factor = factors::correction_factor(name).to_string();
        self.name = name.to_string();
    }

    /// Variable definition polling this symbol by number
    pub fn to_variable_definition(&self) -> VariableDefinition {
        VariableDefinition {
            name: self.name.clone(),
            method: Method::Symbol,
            value: self.number,
            length: self.length,
            type_flags: self.symbol_type,
            correction_factor: self.correction_factor.clone(),
            unit: self.unit.clone(),
            group: String::new(),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} #{} @{:08X} type: {:02X} len: {}",
            self.name, self.number, self.address, self.symbol_type, self.length
        )
    }
}

/// Assign decompressed names to symbols by position
///
/// Symbols past the end of `names` keep their placeholder name.
pub(crate) fn assign_names(symbols: &mut [Symbol], names: &[String]) {
    if names.len() != symbols.len() {
        tracing::warn!(
            names = names.len(),
            symbols = symbols.len(),
            "Symbol name count does not match the table"
        );
    }
    for (symbol, name) in symbols.iter_mut().zip(names) {
        symbol.assign_name(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn display() {
        let sym = Symbol::new(12, 0x00F0_1234, 2, 0, 0x21).with_name("ActualIn.n_Engine");
        assert_eq!(
            sym.to_string(),
            "ActualIn.n_Engine #12 @00F01234 type: 21 len: 2"
        );
    }

    #[test]
    fn naming_sets_unit_and_factor() {
        let sym = Symbol::new(3, 0, 2, 0, 0).with_name("  In.v_Vehicle ");
        assert_eq!(sym.name, "In.v_Vehicle");
        assert_eq!(sym.unit, "km/h");
        assert_eq!(sym.correction_factor, "0.1");
    }

    #[test]
    fn converts_to_symbol_definition() {
        let sym = Symbol::new(7, 0x1000, 2, 0, 0x01).with_name("ActualIn.T_Engine");
        let def = sym.to_variable_definition();
        assert_eq!(def.method, Method::Symbol);
        assert_eq!(def.value, 7);
        assert_eq!(def.length, 2);
        assert!(def.is_signed());
        assert_eq!(def.unit, "°C");
        assert_eq!(def.local_id_payload(0), vec![0xF0, 0x03, 0x00, 0x00, 0x80, 0x00, 0x07]);
    }

    #[test]
    fn extra_symbols_keep_placeholders() {
        let mut symbols: Vec<_> = (0..3).map(|n| Symbol::new(n, 0, 1, 0, 0)).collect();
        assign_names(&mut symbols, &["a".to_string(), "b".to_string()]);
        assert_eq!(symbols[1].name, "b");
        assert_eq!(symbols[2].name, "Symbol-2");
    }
}
