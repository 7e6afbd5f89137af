use std::collections::BTreeMap;

use analysis_core::{InsiderSource, MetricKey, MetricSource, ProviderDiagnostics, TransactionRecord};
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::parse::{extract_records, map_metrics, MetricCandidates};
use crate::records::records_from_maps;
use crate::{json_or_diagnose, missing_key, ProviderClient};

const BASE_URL: &str = "https://financialmodelingprep.com";

pub const FMP_STABLE_SOURCE: &str = "FMP stable: insider-trading/search";
pub const FMP_LEGACY_SOURCE: &str = "FMP legacy: company-outlook";

const FMP_METRICS: [MetricCandidates; 13] = [
    (MetricKey::Pe, &["peRatioTTM", "priceEarningsRatioTTM", "peTTM"], false),
    (MetricKey::Peg, &["pegRatioTTM", "pegTTM"], false),
    (MetricKey::DebtToEquity, &["debtEquityRatioTTM", "debtToEquityTTM", "debtToEquity"], false),
    (MetricKey::OperatingMargin, &["operatingProfitMarginTTM", "operatingMarginTTM", "operatingMarginsTTM"], true),
    (MetricKey::ProfitMargin, &["netProfitMarginTTM", "profitMarginTTM", "profitMarginsTTM"], true),
    (MetricKey::GrossMargin, &["grossProfitMarginTTM", "grossMarginTTM", "grossMarginsTTM"], true),
    (MetricKey::Roe, &["returnOnEquityTTM", "roeTTM", "returnOnEquity"], true),
    (MetricKey::Pb, &["priceToBookRatioTTM", "pbRatioTTM", "pbTTM"], false),
    (MetricKey::Ps, &["priceToSalesRatioTTM", "psRatioTTM", "psTTM"], false),
    (MetricKey::EvEbitda, &["enterpriseValueOverEBITDATTM", "evToEbitdaTTM", "evEbitdaTTM"], false),
    (MetricKey::CurrentRatio, &["currentRatioTTM", "currentRatio"], false),
    (MetricKey::QuickRatio, &["quickRatioTTM", "quickRatio"], false),
    (MetricKey::FcfYield, &["freeCashFlowYieldTTM", "fcfYieldTTM", "freeCashFlowYield"], true),
];

/// The single metrics object inside an FMP TTM payload.
///
/// Stable endpoints usually answer with a one-element list; some variants
/// wrap it under `data` / `ratios` / `metrics` / `results`, or return the
/// object itself.
pub fn fmp_metrics_object(payload: &Value) -> Option<Map<String, Value>> {
    let first_object = |v: &Value| v.as_array()?.first()?.as_object().cloned();

    if let Some(obj) = first_object(payload) {
        return Some(obj);
    }
    let obj = payload.as_object()?;
    for key in ["data", "ratios", "metrics", "results"] {
        if let Some(inner) = obj.get(key).and_then(first_object) {
            return Some(inner);
        }
    }
    let has_scalars = obj
        .values()
        .any(|v| v.is_number() || v.is_string());
    (!obj.is_empty() && has_scalars).then(|| obj.clone())
}

/// Records from a legacy company-outlook payload.
pub fn parse_company_outlook(payload: &Value) -> Vec<TransactionRecord> {
    let Some(obj) = payload.as_object() else {
        return Vec::new();
    };
    let inside = ["insideTrades", "insiderTrades", "insiderTrading", "insiderTrade"]
        .iter()
        .find_map(|k| obj.get(*k).filter(|v| !v.is_null()));
    let items = match inside {
        Some(Value::Array(_)) => inside.map(extract_records).unwrap_or_default(),
        Some(Value::Object(nested)) => ["data", "items", "results"]
            .iter()
            .find_map(|k| nested.get(*k).filter(|v| v.is_array()))
            .map(extract_records)
            .unwrap_or_default(),
        _ => Vec::new(),
    };
    records_from_maps(&items, FMP_LEGACY_SOURCE)
}

/// FMP ratios-ttm and key-metrics-ttm, merged with key-metrics winning.
pub struct FmpMetrics {
    http: ProviderClient,
    api_key: Option<String>,
}

impl FmpMetrics {
    pub fn new(http: ProviderClient, api_key: Option<String>) -> Self {
        Self { http, api_key }
    }

    async fn fetch_object(&self, endpoint: &str, symbol: &str, key: &str) -> (Option<Map<String, Value>>, ProviderDiagnostics) {
        let mut diag = ProviderDiagnostics::new("FMP", endpoint);
        let url = format!("{}/{}?symbol={}&apikey={}", BASE_URL, endpoint, symbol, key);
        let reply = self.http.get(&url, &[]).await;
        let obj = json_or_diagnose(&reply, &url, &mut diag).and_then(|j| fmp_metrics_object(&j));
        diag.item_count = obj.as_ref().map_or(0, |o| o.len());
        (obj, diag)
    }
}

#[async_trait]
impl MetricSource for FmpMetrics {
    fn name(&self) -> &'static str {
        "FMP"
    }

    async fn fetch_metrics(&self, symbol: &str) -> (BTreeMap<MetricKey, f64>, ProviderDiagnostics) {
        let Some(key) = self.api_key.as_deref() else {
            return (BTreeMap::new(), missing_key("FMP", "stable/ratios-ttm", "FMP_API_KEY"));
        };

        let (ratios, ratios_diag) = self.fetch_object("stable/ratios-ttm", symbol, key).await;
        let (km, km_diag) = self.fetch_object("stable/key-metrics-ttm", symbol, key).await;

        let mut merged = ratios.unwrap_or_default();
        if let Some(km) = km {
            merged.extend(km);
        }

        let values = map_metrics(&merged, &FMP_METRICS);
        tracing::info!("FMP TTM for {}: {} canonical metrics", symbol, values.len());

        let mut diag = ratios_diag;
        diag.endpoint = "stable/ratios-ttm + stable/key-metrics-ttm".to_string();
        diag.item_count = values.len();
        if diag.error_message.is_none() {
            diag.error_message = km_diag.error_message;
        }
        diag.rate_limited |= km_diag.rate_limited;
        (values, diag)
    }
}

/// FMP stable insider-trading search.
pub struct FmpStableInsider {
    http: ProviderClient,
    api_key: Option<String>,
}

impl FmpStableInsider {
    pub fn new(http: ProviderClient, api_key: Option<String>) -> Self {
        Self { http, api_key }
    }
}

#[async_trait]
impl InsiderSource for FmpStableInsider {
    fn name(&self) -> &'static str {
        "FMP stable"
    }

    async fn fetch_transactions(&self, symbol: &str) -> (Vec<TransactionRecord>, Vec<ProviderDiagnostics>) {
        let endpoint = "stable/insider-trading/search";
        let Some(key) = self.api_key.as_deref() else {
            return (Vec::new(), vec![missing_key("FMP", endpoint, "FMP_API_KEY")]);
        };

        let url = format!(
            "{}/{}?symbol={}&page=0&limit=100&apikey={}",
            BASE_URL, endpoint, symbol, key
        );
        let mut diag = ProviderDiagnostics::new("FMP", endpoint);
        let reply = self.http.get(&url, &[]).await;
        let records = json_or_diagnose(&reply, &url, &mut diag)
            .map(|j| records_from_maps(&extract_records(&j), FMP_STABLE_SOURCE))
            .unwrap_or_default();
        diag.item_count = records.len();
        tracing::info!("FMP stable insider for {}: {} rows (status {:?})", symbol, records.len(), diag.status);
        (records, vec![diag])
    }
}

/// FMP legacy v4 company-outlook, whose payload embeds insider trades.
pub struct FmpLegacyInsider {
    http: ProviderClient,
    api_key: Option<String>,
}

impl FmpLegacyInsider {
    pub fn new(http: ProviderClient, api_key: Option<String>) -> Self {
        Self { http, api_key }
    }
}

#[async_trait]
impl InsiderSource for FmpLegacyInsider {
    fn name(&self) -> &'static str {
        "FMP legacy"
    }

    async fn fetch_transactions(&self, symbol: &str) -> (Vec<TransactionRecord>, Vec<ProviderDiagnostics>) {
        let endpoint = "api/v4/company-outlook";
        let Some(key) = self.api_key.as_deref() else {
            return (Vec::new(), vec![missing_key("FMP", endpoint, "FMP_API_KEY")]);
        };

        let url = format!("{}/{}?symbol={}&apikey={}", BASE_URL, endpoint, symbol, key);
        let mut diag = ProviderDiagnostics::new("FMP", endpoint);
        let reply = self.http.get(&url, &[]).await;
        let records = json_or_diagnose(&reply, &url, &mut diag)
            .map(|j| parse_company_outlook(&j))
            .unwrap_or_default();
        diag.item_count = records.len();
        tracing::info!("FMP legacy insider for {}: {} rows", symbol, records.len());
        (records, vec![diag])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metrics_object_shapes() {
        assert!(fmp_metrics_object(&json!([{"peRatioTTM": 20}])).is_some());
        assert!(fmp_metrics_object(&json!({"ratios": [{"peRatioTTM": 20}]})).is_some());
        assert!(fmp_metrics_object(&json!({"peRatioTTM": 20})).is_some());
        assert!(fmp_metrics_object(&json!([])).is_none());
        assert!(fmp_metrics_object(&json!({})).is_none());
    }

    #[test]
    fn test_fmp_table_normalizes_percentages() {
        let payload = json!({
            "peRatioTTM": 28.4,
            "operatingProfitMarginTTM": 30.1,
            "returnOnEquityTTM": 0.45,
            "debtEquityRatioTTM": 1.8,
            "freeCashFlowYieldTTM": 3.5
        });
        let out = map_metrics(payload.as_object().unwrap(), &FMP_METRICS);
        assert_eq!(out[&MetricKey::Pe], 28.4);
        assert!((out[&MetricKey::OperatingMargin] - 0.301).abs() < 1e-12);
        assert_eq!(out[&MetricKey::Roe], 0.45);
        assert_eq!(out[&MetricKey::DebtToEquity], 1.8);
        assert!((out[&MetricKey::FcfYield] - 0.035).abs() < 1e-12);
        assert!(!out.contains_key(&MetricKey::Peg));
    }

    #[test]
    fn test_company_outlook_nested() {
        let payload = json!({
            "profile": {"symbol": "AAPL"},
            "insideTrades": {"data": [
                {"transactionDate": "2024-02-01", "reportingName": "Cook Timothy", "transactionType": "S-Sale", "securitiesTransacted": 100, "price": 180.0}
            ]}
        });
        let recs = parse_company_outlook(&payload);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].source_provider, FMP_LEGACY_SOURCE);
        assert_eq!(recs[0].notional_value, Some(18_000.0));
    }
}
