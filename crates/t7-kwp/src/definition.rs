//! Variable definitions and the shared, versioned variable list

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

use crate::kwp::DYNAMIC_LOCAL_ID;

/// Type flag: value is a two's complement signed integer
pub const SIGNED: u8 = 0x01;

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("{name}: needs {needed} bytes, {available} left in reply")]
    ShortData {
        name: String,
        needed: usize,
        available: usize,
    },

    #[error("{name}: unsupported value length {length}")]
    UnsupportedLength { name: String, length: u16 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// How the ECU locates a variable when defining a local identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Raw RAM address
    Address,
    /// Existing local identifier
    LocalId,
    /// Symbol number from the symbol table
    Symbol,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Address => write!(f, "Address"),
            Self::LocalId => write!(f, "LocalID"),
            Self::Symbol => write!(f, "Symbol"),
        }
    }
}

/// One variable the logger polls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDefinition {
    pub name: String,
    pub method: Method,
    /// Address, local identifier or symbol number, depending on `method`
    pub value: u32,
    /// Byte span the ECU returns for this variable
    #[serde(default)]
    pub length: u16,
    #[serde(default, rename = "type")]
    pub type_flags: u8,
    #[serde(default = "default_correction_factor")]
    pub correction_factor: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub group: String,
}

fn default_correction_factor() -> String {
    "1".to_string()
}

impl VariableDefinition {
    pub fn new(name: impl Into<String>, method: Method, value: u32, length: u16) -> Self {
        Self {
            name: name.into(),
            method,
            value,
            length,
            type_flags: 0,
            correction_factor: default_correction_factor(),
            unit: String::new(),
            group: String::new(),
        }
    }

    pub fn is_signed(&self) -> bool {
        self.type_flags & SIGNED != 0
    }

    /// Payload of the DynamicallyDefineLocalIdentifier request placing this
    /// variable in `slot` of the dynamic local identifier.
    pub fn local_id_payload(&self, slot: u8) -> Vec<u8> {
        let v = self.value;
        match self.method {
            Method::Address => vec![
                DYNAMIC_LOCAL_ID,
                0x03,
                slot,
                self.length as u8,
                (v >> 16) as u8,
                (v >> 8) as u8,
                v as u8,
            ],
            Method::LocalId => vec![DYNAMIC_LOCAL_ID, 0x01, slot, 0x00, v as u8, 0x00],
            Method::Symbol => vec![
                DYNAMIC_LOCAL_ID,
                0x03,
                slot,
                0x00,
                0x80,
                (v >> 8) as u8,
                v as u8,
            ],
        }
    }

    /// Consume this variable's bytes from the front of `data`
    ///
    /// Values are big-endian; signed values are sign-extended from their
    /// width.
    pub fn decode(&self, data: &mut &[u8]) -> Result<i64, DefinitionError> {
        let len = self.length as usize;
        if len == 0 || len > 8 {
            return Err(DefinitionError::UnsupportedLength {
                name: self.name.clone(),
                length: self.length,
            });
        }
        if data.len() < len {
            return Err(DefinitionError::ShortData {
                name: self.name.clone(),
                needed: len,
                available: data.len(),
            });
        }

        let (bytes, rest) = data.split_at(len);
        *data = rest;

        let raw = bytes.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64);
        if self.is_signed() && len < 8 {
            let shift = 64 - 8 * len as u32;
            Ok(((raw << shift) as i64) >> shift)
        } else {
            Ok(raw as i64)
        }
    }

    /// Render a raw value with the correction factor applied
    ///
    /// The number of decimals follows the factor as written, so "0.1"
    /// yields one decimal and "1" an integer.
    pub fn format_value(&self, raw: i64) -> String {
        let factor = self.correction_factor.trim();
        match factor.parse::<f64>() {
            Ok(f) if f != 1.0 => {
                let decimals = factor.split_once('.').map_or(0, |(_, frac)| frac.len());
                format!("{:.*}", decimals, raw as f64 * f)
            }
            _ => raw.to_string(),
        }
    }
}

/// Point-in-time view of the variable list
#[derive(Debug, Clone, Default)]
pub struct VariableSnapshot {
    pub version: u64,
    pub variables: Arc<Vec<VariableDefinition>>,
}

impl VariableSnapshot {
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VariableDefinition> {
        self.variables.iter()
    }
}

/// Ordered, versioned list of variable definitions
///
/// Readers take snapshots or subscribe to changes; every mutation bumps the
/// version and wakes subscribers.
#[derive(Debug, Clone)]
pub struct VariableList {
    tx: Arc<watch::Sender<VariableSnapshot>>,
}

impl Default for VariableList {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl VariableList {
    pub fn new(variables: Vec<VariableDefinition>) -> Self {
        let (tx, _rx) = watch::channel(VariableSnapshot {
            version: 0,
            variables: Arc::new(variables),
        });
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> VariableSnapshot {
        self.tx.borrow().clone()
    }

    pub fn version(&self) -> u64 {
        self.tx.borrow().version
    }

    pub fn subscribe(&self) -> watch::Receiver<VariableSnapshot> {
        self.tx.subscribe()
    }

    /// Replace the whole list
    pub fn replace(&self, variables: Vec<VariableDefinition>) {
        self.update(|vars| *vars = variables);
    }

    /// Edit the list in place
    pub fn update(&self, f: impl FnOnce(&mut Vec<VariableDefinition>)) {
        self.tx.send_modify(|snapshot| {
            let mut variables = snapshot.variables.as_ref().clone();
            f(&mut variables);
            snapshot.variables = Arc::new(variables);
            snapshot.version += 1;
        });
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DefinitionError> {
        let content = std::fs::read_to_string(path)?;
        let variables: Vec<VariableDefinition> = serde_json::from_str(&content)?;
        Ok(Self::new(variables))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DefinitionError> {
        let snapshot = self.snapshot();
        let content = serde_json::to_string_pretty(snapshot.variables.as_ref())?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn var(name: &str, length: u16) -> VariableDefinition {
        VariableDefinition::new(name, Method::Symbol, 1, length)
    }

    #[test]
    fn payload_per_method() {
        let mut def = VariableDefinition::new("ActualIn.n_Engine", Method::Address, 0x00F1_2345, 2);
        assert_eq!(
            def.local_id_payload(3),
            vec![0xF0, 0x03, 0x03, 0x02, 0xF1, 0x23, 0x45]
        );

        def.method = Method::LocalId;
        def.value = 0x42;
        assert_eq!(
            def.local_id_payload(1),
            vec![0xF0, 0x01, 0x01, 0x00, 0x42, 0x00]
        );

        def.method = Method::Symbol;
        def.value = 0x1A2B;
        assert_eq!(
            def.local_id_payload(0),
            vec![0xF0, 0x03, 0x00, 0x00, 0x80, 0x1A, 0x2B]
        );
    }

    #[test]
    fn decode_consumes_in_order() {
        let a = var("a", 2);
        let b = var("b", 1);
        let data = [0x01, 0x02, 0x03, 0xFF];
        let mut cursor: &[u8] = &data;

        assert_eq!(a.decode(&mut cursor).unwrap(), 0x0102);
        assert_eq!(b.decode(&mut cursor).unwrap(), 0x03);
        assert_eq!(cursor, &[0xFF]);
    }

    #[test]
    fn decode_sign_extends() {
        let mut def = var("In.T_AirInlet", 2);
        def.type_flags = SIGNED;
        let data = [0xFF, 0xF6];
        let mut cursor: &[u8] = &data;
        assert_eq!(def.decode(&mut cursor).unwrap(), -10);

        def.type_flags = 0;
        let mut cursor: &[u8] = &data;
        assert_eq!(def.decode(&mut cursor).unwrap(), 0xFFF6);
    }

    #[test]
    fn decode_short_reply() {
        let def = var("Out.X_AccPedal", 4);
        let data = [0x00, 0x01];
        let mut cursor: &[u8] = &data;
        assert!(matches!(
            def.decode(&mut cursor),
            Err(DefinitionError::ShortData {
                needed: 4,
                available: 2,
                ..
            })
        ));
    }

    #[test]
    fn format_applies_correction_factor() {
        let mut def = var("In.v_Vehicle", 2);
        assert_eq!(def.format_value(1234), "1234");

        def.correction_factor = "0.1".into();
        assert_eq!(def.format_value(1234), "123.4");

        def.correction_factor = "0.001".into();
        assert_eq!(def.format_value(-1500), "-1.500");
    }

    #[test]
    fn list_bumps_version_and_notifies() {
        let list = VariableList::new(vec![var("a", 1)]);
        let mut rx = list.subscribe();
        assert_eq!(list.version(), 0);

        list.update(|vars| vars.push(var("b", 2)));

        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(list.snapshot().variables[1].name, "b");
    }

    #[test]
    fn snapshot_is_stable_across_updates() {
        let list = VariableList::new(vec![var("a", 1)]);
        let before = list.snapshot();
        list.replace(vec![]);
        assert_eq!(before.len(), 1);
        assert!(list.snapshot().is_empty());
    }

    #[test]
    fn json_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("variables.json");

        let mut def = var("ActualIn.n_Engine", 2);
        def.unit = "rpm".into();
        def.group = "engine".into();
        let list = VariableList::new(vec![def.clone()]);
        list.save(&path).unwrap();

        let loaded = VariableList::load(&path).unwrap();
        assert_eq!(loaded.snapshot().variables.as_ref(), &vec![def]);
    }

    #[test]
    fn json_defaults() {
        let json = r#"[{ "name": "x", "method": "address", "value": 4096 }]"#;
        let vars: Vec<VariableDefinition> = serde_json::from_str(json).unwrap();
        assert_eq!(vars[0].correction_factor, "1");
        assert_eq!(vars[0].length, 0);
        assert_eq!(vars[0].method, Method::Address);
    }
}
