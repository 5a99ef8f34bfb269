//! Symbols commands - symbol table from a live ECU or a firmware image

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use t7_kwp::{KwpClient, KwpConfig, TransportFactory};
use t7_symbol::{load_symbols, load_symbols_from_ecu, load_symbols_from_file, save_symbols, LzhufCodec, Symbol};
use tracing::debug;

use crate::output::{OutputContext, SymbolRow};

/// Where a symbol list comes from
#[derive(Debug, Clone)]
pub enum SymbolSource {
    /// Table export routine of the connected ECU
    Ecu,
    /// Firmware image on disk
    Firmware(PathBuf),
    /// JSON list saved by an earlier `symbols --save`
    Saved(PathBuf),
}

/// Load symbols from `source`, reporting progress as info lines
pub async fn acquire(
    source: &SymbolSource,
    transports: &Arc<dyn TransportFactory>,
    kwp: &KwpConfig,
    ctx: &OutputContext,
) -> Result<Vec<Symbol>> {
    match source {
        SymbolSource::Ecu => {
            let transport = transports
                .open()
                .await
                .context("Failed to open CAN transport")?;
            let client = KwpClient::new(transport.clone(), kwp.clone());
            let result = load_symbols_from_ecu(&client, &LzhufCodec, |s: &str| ctx.info(s)).await;
            if let Err(e) = transport.close().await {
                debug!(error = %e, "Transport close failed");
            }
            result.context("Failed to load symbols from ECU")
        }
        SymbolSource::Firmware(path) => {
            load_symbols_from_file(path, &LzhufCodec, |s: &str| ctx.info(s))
                .with_context(|| format!("Failed to load symbols from {}", path.display()))
        }
        SymbolSource::Saved(path) => load_symbols(path)
            .with_context(|| format!("Failed to read symbol list {}", path.display())),
    }
}

/// Load and list symbols, optionally saving them as JSON
pub async fn symbols(
    source: &SymbolSource,
    transports: &Arc<dyn TransportFactory>,
    kwp: &KwpConfig,
    filter: Option<&str>,
    save: Option<&Path>,
    ctx: &OutputContext,
) -> Result<()> {
    let symbols = acquire(source, transports, kwp, ctx).await?;

    if let Some(path) = save {
        save_symbols(path, &symbols)
            .with_context(|| format!("Failed to save symbols to {}", path.display()))?;
        ctx.success(&format!("Saved {} symbols to {}", symbols.len(), path.display()));
    }

    let rows: Vec<SymbolRow> = matching(&symbols, filter).map(SymbolRow::from).collect();
    ctx.print(&rows);
    Ok(())
}

/// Symbols whose name contains `filter`, ignoring case
fn matching<'a>(symbols: &'a [Symbol], filter: Option<&str>) -> impl Iterator<Item = &'a Symbol> {
    let needle = filter.map(str::to_lowercase);
    symbols.iter().filter(move |s| match &needle {
        Some(needle) => s.name.to_lowercase().contains(needle.as_str()),
        None => true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_ignores_case() {
        let symbols = vec![
            Symbol::new(1, 0, 2, 0, 0).with_name("ActualIn.n_Engine"),
            Symbol::new(2, 0, 2, 0, 0).with_name("In.v_Vehicle"),
        ];
        let names: Vec<_> = matching(&symbols, Some("ENGINE")).map(|s| s.number).collect();
        assert_eq!(names, vec![1]);
        assert_eq!(matching(&symbols, None).count(), 2);
    }
}
