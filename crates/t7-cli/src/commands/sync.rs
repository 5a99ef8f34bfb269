//! Sync command - refresh a variable file from a symbol list

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use t7_kwp::{KwpConfig, TransportFactory, VariableList};
use t7_symbol::sync_variables;

use super::symbols::{acquire, SymbolSource};
use crate::output::{OutputContext, VariableRow};

/// Replace variables matching a symbol by name and write the list back
pub async fn sync(
    vars: &Path,
    out: Option<&Path>,
    source: &SymbolSource,
    transports: &Arc<dyn TransportFactory>,
    kwp: &KwpConfig,
    ctx: &OutputContext,
) -> Result<()> {
    let variables = VariableList::load(vars)
        .with_context(|| format!("Failed to read variables from {}", vars.display()))?;
    let symbols = acquire(source, transports, kwp, ctx).await?;

    let replaced = sync_variables(&variables, &symbols);

    let target = out.unwrap_or(vars);
    variables
        .save(target)
        .with_context(|| format!("Failed to write variables to {}", target.display()))?;
    ctx.success(&format!(
        "Synced {} of {} variables, saved to {}",
        replaced,
        variables.snapshot().len(),
        target.display()
    ));

    let snapshot = variables.snapshot();
    let rows: Vec<VariableRow> = snapshot.iter().map(VariableRow::from).collect();
    ctx.print(&rows);
    Ok(())
}
