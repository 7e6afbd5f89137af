use std::collections::BTreeMap;

use analysis_core::{InsiderSource, MetricKey, MetricSource, ProviderDiagnostics, TransactionRecord};
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::parse::{extract_records, map_metrics, normalize_pct, pick_number, MetricCandidates};
use crate::records::records_from_maps;
use crate::{json_or_diagnose, missing_key, ProviderClient};

const BASE_URL: &str = "https://www.alphavantage.co/query";

pub const AV_INSIDER_SOURCE: &str = "Alpha Vantage: INSIDER_TRANSACTIONS";

const AV_METRICS: [MetricCandidates; 12] = [
    (MetricKey::Pe, &["PERatio", "TrailingPE", "TrailingPERatio", "peTTM"], false),
    (MetricKey::Peg, &["PEGRatio", "PegRatio", "pegTTM"], false),
    (MetricKey::OperatingMargin, &["OperatingMarginTTM"], true),
    (MetricKey::ProfitMargin, &["ProfitMargin"], true),
    (MetricKey::Roe, &["ReturnOnEquityTTM"], true),
    (MetricKey::Pb, &["PriceToBookRatio", "PriceToBook"], false),
    (MetricKey::Ps, &["PriceToSalesRatioTTM", "PriceToSalesRatio"], false),
    (MetricKey::EvEbitda, &["EVToEBITDA", "EVToEBITDAttm"], false),
    (MetricKey::CurrentRatio, &["CurrentRatio"], false),
    (MetricKey::QuickRatio, &["QuickRatio"], false),
    (MetricKey::RevenueGrowth, &["QuarterlyRevenueGrowthYOY"], true),
    (MetricKey::EarningsGrowth, &["QuarterlyEarningsGrowthYOY"], true),
];

fn ratio(map: &Map<String, Value>, num: &[&str], den: &[&str]) -> Option<f64> {
    let n = pick_number(map, num)?;
    let d = pick_number(map, den).filter(|d| *d != 0.0)?;
    Some(n / d)
}

/// Canonical metrics from an OVERVIEW payload, including the ratios
/// Alpha Vantage only exposes as raw totals.
pub fn overview_metrics(overview: &Map<String, Value>) -> BTreeMap<MetricKey, f64> {
    let mut out = map_metrics(overview, &AV_METRICS);

    if let Some(gm) = ratio(overview, &["GrossProfitTTM"], &["RevenueTTM"]) {
        out.insert(MetricKey::GrossMargin, normalize_pct(gm));
    }
    if let Some(y) = ratio(
        overview,
        &["FreeCashFlowTTM", "FCF", "freeCashFlowTTM"],
        &["MarketCapitalization"],
    ) {
        out.insert(MetricKey::FcfYield, normalize_pct(y));
    }
    let de = pick_number(overview, &["DebtToEquity"])
        .or_else(|| ratio(overview, &["TotalDebt"], &["TotalShareholderEquity"]));
    if let Some(de) = de {
        out.insert(MetricKey::DebtToEquity, de);
    }
    out
}

/// OVERVIEW endpoint as a fallback metric source.
pub struct AlphaVantageMetrics {
    http: ProviderClient,
    api_key: Option<String>,
}

impl AlphaVantageMetrics {
    pub fn new(http: ProviderClient, api_key: Option<String>) -> Self {
        Self { http, api_key }
    }
}

#[async_trait]
impl MetricSource for AlphaVantageMetrics {
    fn name(&self) -> &'static str {
        "AlphaVantage"
    }

    async fn fetch_metrics(&self, symbol: &str) -> (BTreeMap<MetricKey, f64>, ProviderDiagnostics) {
        let endpoint = "query?function=OVERVIEW";
        let Some(key) = self.api_key.as_deref() else {
            return (BTreeMap::new(), missing_key("AlphaVantage", endpoint, "ALPHAVANTAGE_API_KEY"));
        };

        let url = format!("{}?function=OVERVIEW&symbol={}&apikey={}", BASE_URL, symbol, key);
        let mut diag = ProviderDiagnostics::new("AlphaVantage", endpoint);
        let reply = self.http.get(&url, &[]).await;
        let payload = json_or_diagnose(&reply, &url, &mut diag);

        // Rate-limit and error notes replace the whole overview.
        let values = match payload.as_ref().and_then(Value::as_object) {
            Some(obj) if !obj.is_empty() && diag.error_message.is_none() => overview_metrics(obj),
            _ => BTreeMap::new(),
        };
        if diag.rate_limited {
            tracing::warn!("Alpha Vantage rate limited for {}", symbol);
        }
        diag.item_count = values.len();
        (values, diag)
    }
}

/// INSIDER_TRANSACTIONS endpoint.
pub struct AlphaVantageInsider {
    http: ProviderClient,
    api_key: Option<String>,
}

impl AlphaVantageInsider {
    pub fn new(http: ProviderClient, api_key: Option<String>) -> Self {
        Self { http, api_key }
    }
}

#[async_trait]
impl InsiderSource for AlphaVantageInsider {
    fn name(&self) -> &'static str {
        "Alpha Vantage"
    }

    async fn fetch_transactions(&self, symbol: &str) -> (Vec<TransactionRecord>, Vec<ProviderDiagnostics>) {
        let endpoint = "query?function=INSIDER_TRANSACTIONS";
        let Some(key) = self.api_key.as_deref() else {
            return (Vec::new(), vec![missing_key("AlphaVantage", endpoint, "ALPHAVANTAGE_API_KEY")]);
        };

        let url = format!(
            "{}?function=INSIDER_TRANSACTIONS&symbol={}&apikey={}",
            BASE_URL, symbol, key
        );
        let mut diag = ProviderDiagnostics::new("AlphaVantage", endpoint);
        let reply = self.http.get(&url, &[]).await;
        let records = json_or_diagnose(&reply, &url, &mut diag)
            .map(|j| records_from_maps(&extract_records(&j), AV_INSIDER_SOURCE))
            .unwrap_or_default();
        diag.item_count = records.len();
        tracing::info!("Alpha Vantage insider for {}: {} rows", symbol, records.len());
        (records, vec![diag])
    }
}
