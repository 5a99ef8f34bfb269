//! Output formatting for t7log (table, json, csv)

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use t7_kwp::VariableDefinition;
use t7_symbol::Symbol;
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(value, true).ok()
    }
}

/// Context for output rendering
pub struct OutputContext {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool, quiet: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format, quiet }
    }

    /// Print a success message (unless in quiet mode)
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg.green());
        }
    }

    /// Print an info message (unless in quiet mode)
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg);
        }
    }

    /// Print a warning message
    pub fn warn(&self, msg: &str) {
        eprintln!("{}", msg.yellow());
    }

    /// Print an error message
    pub fn error(&self, msg: &str) {
        eprintln!("{}", msg.red());
    }

    /// Print data in the configured format
    pub fn print<T: Tabled + Serialize>(&self, data: &[T]) {
        match self.format {
            OutputFormat::Table => {
                if data.is_empty() {
                    if !self.quiet {
                        println!("No data");
                    }
                } else {
                    let table = Table::new(data).to_string();
                    println!("{}", table);
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(data).unwrap_or_else(|_| "[]".to_string())
                );
            }
            OutputFormat::Csv => {
                for line in csv_lines(data) {
                    println!("{}", line);
                }
            }
        }
    }

    /// Print key-value pairs
    pub fn print_kv(&self, pairs: &[(&str, String)]) {
        match self.format {
            OutputFormat::Table => {
                for (key, value) in pairs {
                    println!("{}: {}", key.bold(), value);
                }
            }
            OutputFormat::Json => {
                let map: serde_json::Map<String, serde_json::Value> = pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.clone())))
                    .collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&map).unwrap_or_else(|_| "{}".to_string())
                );
            }
            OutputFormat::Csv => {
                let keys: Vec<&str> = pairs.iter().map(|(k, _)| *k).collect();
                println!("{}", keys.join(","));
                let values: Vec<String> = pairs.iter().map(|(_, v)| escape_csv(v)).collect();
                println!("{}", values.join(","));
            }
        }
    }
}

/// Render rows as CSV, header first, columns sorted by name
fn csv_lines<T: Serialize>(data: &[T]) -> Vec<String> {
    let rows: Vec<serde_json::Map<String, serde_json::Value>> = data
        .iter()
        .filter_map(|item| match serde_json::to_value(item) {
            Ok(serde_json::Value::Object(row)) => Some(row),
            _ => None,
        })
        .collect();
    let Some(first) = rows.first() else {
        return Vec::new();
    };

    let headers: Vec<String> = first.keys().cloned().collect();
    let mut lines = vec![headers.join(",")];
    for row in &rows {
        let values: Vec<String> = headers
            .iter()
            .map(|h| match row.get(h) {
                Some(serde_json::Value::String(s)) => escape_csv(s),
                Some(other) => escape_csv(&other.to_string()),
                None => String::new(),
            })
            .collect();
        lines.push(values.join(","));
    }
    lines
}

/// Escape a value for CSV output
fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

// =============================================================================
// Display types for various commands
// =============================================================================

/// Symbol display for the symbols commands
#[derive(Debug, Tabled, Serialize)]
pub struct SymbolRow {
    #[tabled(rename = "#")]
    pub number: u32,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Address")]
    pub address: String,
    #[tabled(rename = "Length")]
    pub length: u16,
    #[tabled(rename = "Type")]
    pub symbol_type: String,
    #[tabled(rename = "Factor")]
    pub correction_factor: String,
    #[tabled(rename = "Unit")]
    pub unit: String,
}

impl From<&Symbol> for SymbolRow {
    fn from(symbol: &Symbol) -> Self {
        Self {
            number: symbol.number,
            name: symbol.name.clone(),
            address: format!("0x{:08X}", symbol.address),
            length: symbol.length,
            symbol_type: format!("0x{:02X}", symbol.symbol_type),
            correction_factor: symbol.correction_factor.clone(),
            unit: symbol.unit.clone(),
        }
    }
}

/// Variable display for the sync command
#[derive(Debug, Tabled, Serialize)]
pub struct VariableRow {
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Method")]
    pub method: String,
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Length")]
    pub length: u16,
    #[tabled(rename = "Group")]
    pub group: String,
}

impl From<&VariableDefinition> for VariableRow {
    fn from(var: &VariableDefinition) -> Self {
        Self {
            name: var.name.clone(),
            method: var.method.to_string(),
            value: format!("0x{:X}", var.value),
            length: var.length,
            group: var.group.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn csv_escapes_values() {
        let rows = vec![
            VariableRow {
                name: "ActualIn.n_Engine".into(),
                method: "Symbol".into(),
                value: "0x2A".into(),
                length: 2,
                group: "engine, core".into(),
            },
        ];
        assert_eq!(
            csv_lines(&rows),
            vec![
                "group,length,method,name,value".to_string(),
                "\"engine, core\",2,Symbol,ActualIn.n_Engine,0x2A".to_string(),
            ]
        );
    }

    #[test]
    fn symbol_row_formats_numbers() {
        let symbol = Symbol::new(3, 0x00F0_1234, 2, 0, 0x21).with_name("In.v_Vehicle");
        let row = SymbolRow::from(&symbol);
        assert_eq!(row.address, "0x00F01234");
        assert_eq!(row.symbol_type, "0x21");
        assert_eq!(row.unit, "km/h");
    }

    #[test]
    fn format_names() {
        assert_eq!(OutputFormat::parse("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("xml"), None);
        assert_eq!(OutputFormat::Csv.as_str(), "csv");
    }
}
