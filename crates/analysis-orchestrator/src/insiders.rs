//! Insider provider chain: every source is asked, results are merged.

use analysis_core::{InsiderSource, ProviderDiagnostics, TransactionRecord};
use insider_analysis::dedupe_transactions;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InsiderFetch {
    /// Deduplicated, newest first.
    pub records: Vec<TransactionRecord>,
    /// One entry per attempted endpoint, in chain order.
    pub attempts: Vec<ProviderDiagnostics>,
    /// Single source name, or "Merged: a, b, ..." when several returned data.
    pub chosen_source: Option<String>,
}

pub fn chosen_source_label(sources_used: &[&str]) -> Option<String> {
    match sources_used {
        [] => None,
        [only] => Some(only.to_string()),
        many => Some(format!("Merged: {}", many.join(", "))),
    }
}

/// Query each source in priority order and merge what came back.
pub async fn fetch_insider_transactions(symbol: &str, sources: &[Box<dyn InsiderSource>]) -> InsiderFetch {
    let mut merged = Vec::new();
    let mut attempts = Vec::new();
    let mut sources_used = Vec::new();

    for source in sources {
        let (records, diagnostics) = source.fetch_transactions(symbol).await;
        attempts.extend(diagnostics);
        if records.is_empty() {
            tracing::debug!("{}: no insider records for {}", source.name(), symbol);
            continue;
        }
        tracing::info!("{}: {} insider record(s) for {}", source.name(), records.len(), symbol);
        sources_used.push(source.name());
        merged.extend(records);
    }

    let records = dedupe_transactions(&merged);
    if merged.len() != records.len() {
        tracing::info!(
            "Insider dedup for {}: {} -> {} record(s)",
            symbol,
            merged.len(),
            records.len()
        );
    }

    InsiderFetch {
        records,
        attempts,
        chosen_source: chosen_source_label(&sources_used),
    }
}
