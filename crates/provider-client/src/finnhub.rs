use std::collections::BTreeMap;

use analysis_core::{InsiderSource, MetricKey, MetricSource, ProviderDiagnostics, TransactionRecord};
use async_trait::async_trait;
use serde_json::Value;

use crate::parse::{extract_records, map_metrics, MetricCandidates};
use crate::records::records_from_maps;
use crate::{json_or_diagnose, missing_key, ProviderClient};

const BASE_URL: &str = "https://finnhub.io/api/v1";

pub const FINNHUB_INSIDER_SOURCE: &str = "Finnhub: insider-transactions";

const FINNHUB_METRICS: [MetricCandidates; 15] = [
    (MetricKey::Pe, &["peTTM", "peAnnual", "peExclExtraTTM"], false),
    (MetricKey::Peg, &["pegTTM", "pegAnnual"], false),
    (MetricKey::Roe, &["roeTTM", "roeAnnual"], true),
    (MetricKey::OperatingMargin, &["operatingMarginTTM", "operatingMarginAnnual"], true),
    (MetricKey::ProfitMargin, &["netMarginTTM", "netMarginAnnual", "profitMarginTTM"], true),
    (MetricKey::GrossMargin, &["grossMarginTTM", "grossMarginAnnual"], true),
    (
        MetricKey::DebtToEquity,
        &[
            "totalDebtToEquityTTM",
            "totalDebt/totalEquityTTM",
            "totalDebt/totalEquityAnnual",
            "totalDebtToEquityAnnual",
        ],
        false,
    ),
    (MetricKey::Pb, &["pbAnnual", "pbTTM", "priceToBookAnnual", "priceToBookTTM"], false),
    (MetricKey::Ps, &["psAnnual", "psTTM", "priceToSalesAnnual", "priceToSalesTTM"], false),
    (MetricKey::EvEbitda, &["evToEbitdaTTM", "evToEbitdaAnnual"], false),
    (MetricKey::CurrentRatio, &["currentRatioAnnual", "currentRatioTTM"], false),
    (MetricKey::QuickRatio, &["quickRatioAnnual", "quickRatioTTM"], false),
    (MetricKey::FcfYield, &["freeCashFlowYieldTTM", "freeCashFlowYieldAnnual", "fcfYieldTTM"], true),
    (MetricKey::RevenueGrowth, &["revenueGrowthTTM", "revenueGrowth5Y"], true),
    (MetricKey::EarningsGrowth, &["epsGrowthTTM", "epsGrowth5Y"], true),
];

/// Canonical metrics from the `metric` object of `/stock/metric?metric=all`.
pub fn metric_payload_values(payload: &Value) -> BTreeMap<MetricKey, f64> {
    payload
        .get("metric")
        .and_then(Value::as_object)
        .map(|m| map_metrics(m, &FINNHUB_METRICS))
        .unwrap_or_default()
}

pub struct FinnhubMetrics {
    http: ProviderClient,
    api_key: Option<String>,
}

impl FinnhubMetrics {
    pub fn new(http: ProviderClient, api_key: Option<String>) -> Self {
        Self { http, api_key }
    }
}

#[async_trait]
impl MetricSource for FinnhubMetrics {
    fn name(&self) -> &'static str {
        "Finnhub"
    }

    async fn fetch_metrics(&self, symbol: &str) -> (BTreeMap<MetricKey, f64>, ProviderDiagnostics) {
        let endpoint = "api/v1/stock/metric?metric=all";
        let Some(key) = self.api_key.as_deref() else {
            return (BTreeMap::new(), missing_key("Finnhub", endpoint, "FINNHUB_API_KEY"));
        };

        let url = format!("{}/stock/metric?symbol={}&metric=all&token={}", BASE_URL, symbol, key);
        let mut diag = ProviderDiagnostics::new("Finnhub", endpoint);
        let reply = self.http.get(&url, &[]).await;
        let values = json_or_diagnose(&reply, &url, &mut diag)
            .map(|j| metric_payload_values(&j))
            .unwrap_or_default();
        diag.item_count = values.len();
        (values, diag)
    }
}

pub struct FinnhubInsider {
    http: ProviderClient,
    api_key: Option<String>,
}

impl FinnhubInsider {
    pub fn new(http: ProviderClient, api_key: Option<String>) -> Self {
        Self { http, api_key }
    }
}

#[async_trait]
impl InsiderSource for FinnhubInsider {
    fn name(&self) -> &'static str {
        "Finnhub"
    }

    async fn fetch_transactions(&self, symbol: &str) -> (Vec<TransactionRecord>, Vec<ProviderDiagnostics>) {
        let endpoint = "api/v1/stock/insider-transactions";
        let Some(key) = self.api_key.as_deref() else {
            return (Vec::new(), vec![missing_key("Finnhub", endpoint, "FINNHUB_API_KEY")]);
        };

        let url = format!("{}/stock/insider-transactions?symbol={}&token={}", BASE_URL, symbol, key);
        let mut diag = ProviderDiagnostics::new("Finnhub", endpoint);
        let reply = self.http.get(&url, &[]).await;
        let records = json_or_diagnose(&reply, &url, &mut diag)
            .map(|j| records_from_maps(&extract_records(&j), FINNHUB_INSIDER_SOURCE))
            .unwrap_or_default();
        diag.item_count = records.len();
        tracing::info!("Finnhub insider for {}: {} rows", symbol, records.len());
        (records, vec![diag])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metric_payload_values() {
        let payload = json!({
            "metric": {
                "peTTM": 31.2,
                "roeTTM": 147.2,
                "grossMarginTTM": 45.6,
                "totalDebt/totalEquityAnnual": 1.45,
                "currentRatioAnnual": 0.98,
                "epsGrowthTTM": 10.5
            },
            "series": {},
            "symbol": "AAPL"
        });
        let out = metric_payload_values(&payload);
        assert_eq!(out[&MetricKey::Pe], 31.2);
        // 147% is outside the percent heuristic and stays as reported
        assert_eq!(out[&MetricKey::Roe], 147.2);
        assert!((out[&MetricKey::GrossMargin] - 0.456).abs() < 1e-12);
        assert_eq!(out[&MetricKey::DebtToEquity], 1.45);
        assert!((out[&MetricKey::EarningsGrowth] - 0.105).abs() < 1e-12);
    }

    #[test]
    fn test_missing_metric_block() {
        assert!(metric_payload_values(&json!({"error": "x"})).is_empty());
    }
}
