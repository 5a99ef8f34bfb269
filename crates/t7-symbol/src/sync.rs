//! Refresh variable definitions from a freshly loaded symbol list

use std::collections::HashMap;

use t7_kwp::VariableList;

use crate::symbol::Symbol;

/// Replace every variable whose name matches a symbol with that symbol's
/// definition
///
/// Names compare case-insensitively and the variable keeps its group.
/// Returns the number of variables replaced.
pub fn sync_variables(variables: &VariableList, symbols: &[Symbol]) -> usize {
    let by_name: HashMap<String, &Symbol> = symbols
        .iter()
        .map(|s| (s.name.to_lowercase(), s))
        .collect();

    let mut replaced = 0;
    variables.update(|vars| {
        for var in vars.iter_mut() {
            if let Some(symbol) = by_name.get(&var.name.to_lowercase()) {
                let group = std::mem::take(&mut var.group);
                *var = symbol.to_variable_definition();
                var.group = group;
                replaced += 1;
            }
        }
    });

    tracing::info!(replaced, total = variables.snapshot().len(), "Synced variables with symbols");
    replaced
}
