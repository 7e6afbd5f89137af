use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::{
    AnalysisError, CompanyProfile, MetricKey, PriceSeries, ProviderDiagnostics, TransactionRecord,
};

/// Primary source of quote, fundamentals and price history
#[async_trait]
pub trait FundamentalsSource: Send + Sync {
    async fn profile(&self, symbol: &str) -> Result<CompanyProfile, AnalysisError>;

    /// Daily history over `period` (e.g. "1y", "2y").
    async fn price_history(&self, symbol: &str, period: &str) -> Result<PriceSeries, AnalysisError>;
}

/// Fallback provider of raw fundamental ratios, used to fill gaps
#[async_trait]
pub trait MetricSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Canonical values already mapped from the provider's field names,
    /// percentages as fractions. Empty on any failure.
    async fn fetch_metrics(&self, symbol: &str) -> (BTreeMap<MetricKey, f64>, ProviderDiagnostics);
}

/// Provider of insider transactions
#[async_trait]
pub trait InsiderSource: Send + Sync {
    /// Short label for the chosen-source summary. Records carry their own
    /// endpoint-level `source_provider`.
    fn name(&self) -> &'static str;

    async fn fetch_transactions(&self, symbol: &str) -> (Vec<TransactionRecord>, Vec<ProviderDiagnostics>);
}

/// Optional narrative (LLM) generator
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AnalysisError>;
}
