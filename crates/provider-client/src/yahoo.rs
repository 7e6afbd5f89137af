use analysis_core::{
    AnalysisError, Bar, CashFlowPeriod, CompanyProfile, FinancialPeriod, FundamentalsSource,
    PriceSeries,
};
use async_trait::async_trait;
use chrono::DateTime;
use serde_json::{Map, Value};

use reqwest::Url;
use std::sync::Mutex;

use crate::parse::{parse_date_value, parse_number, pick_number, pick_str};
use crate::{HttpGet, HttpReply, ProviderClient};

const QUOTE_SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const COOKIE_URL: &str = "https://fc.yahoo.com";
const CRUMB_URL: &str = "https://query1.finance.yahoo.com/v1/test/getcrumb";
const USER_AGENT: &str = "Mozilla/5.0";
const MAX_CRUMB_LEN: usize = 64;

const MODULES: &str = "price,summaryDetail,defaultKeyStatistics,financialData,assetProfile,\
calendarEvents,incomeStatementHistory,balanceSheetHistory,cashflowStatementHistory,\
cashflowStatementHistoryQuarterly";

/// Modules merged into one flat lookup, later ones only filling gaps.
const FLAT_MODULES: [&str; 5] = [
    "financialData",
    "defaultKeyStatistics",
    "summaryDetail",
    "price",
    "assetProfile",
];

const OCF_KEYS: [&str; 3] = [
    "totalCashFromOperatingActivities",
    "operatingCashFlow",
    "operatingCashflow",
];
const CAPEX_KEYS: [&str; 3] = ["capitalExpenditures", "capitalExpenditure", "purchaseOfPPE"];
const FCF_KEYS: [&str; 2] = ["freeCashFlow", "freeCashflow"];

/// Quote, fundamentals and price history from Yahoo Finance.
///
/// `quoteSummary` needs a session cookie plus a matching crumb. The crumb is
/// fetched once, reused, and refreshed a single time when a call comes back 401.
pub struct YahooClient {
    http: Box<dyn HttpGet>,
    crumb: Mutex<Option<String>>,
}

/// Append `crumb` as a query parameter, percent-encoded.
pub fn with_crumb(url: &str, crumb: Option<&str>) -> String {
    let Some(crumb) = crumb else {
        return url.to_string();
    };
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.query_pairs_mut().append_pair("crumb", crumb);
            parsed.to_string()
        }
        Err(_) => url.to_string(),
    }
}

/// A usable crumb is a short single token; anything else is an error page.
fn crumb_from_reply(reply: &HttpReply) -> Option<String> {
    if reply.status != Some(200) {
        return None;
    }
    let body = reply.body.as_deref()?.trim();
    let plausible = !body.is_empty()
        && body.len() <= MAX_CRUMB_LEN
        && !body.contains(char::is_whitespace)
        && !body.contains('{')
        && !body.contains('<');
    plausible.then(|| body.to_string())
}

impl YahooClient {
    pub fn new(http: ProviderClient) -> Self {
        Self::with_transport(Box::new(http))
    }

    pub fn with_transport(http: Box<dyn HttpGet>) -> Self {
        Self {
            http,
            crumb: Mutex::new(None),
        }
    }

    fn cached_crumb(&self) -> Option<String> {
        self.crumb.lock().ok().and_then(|c| c.clone())
    }

    fn store_crumb(&self, crumb: Option<String>) {
        if let Ok(mut slot) = self.crumb.lock() {
            *slot = crumb;
        }
    }

    /// Warm the session cookie, then ask for a crumb. `None` when Yahoo
    /// does not hand one out; the call then goes ahead without it.
    async fn fetch_crumb(&self) -> Option<String> {
        let headers = [("User-Agent", USER_AGENT)];
        // Status is irrelevant here; only the Set-Cookie matters.
        self.http.get(COOKIE_URL, &headers).await;

        let reply = self.http.get(CRUMB_URL, &headers).await;
        let crumb = crumb_from_reply(&reply);
        match &crumb {
            Some(_) => tracing::debug!("Yahoo crumb acquired"),
            None => tracing::warn!("Yahoo crumb unavailable (HTTP {:?})", reply.status),
        }
        self.store_crumb(crumb.clone());
        crumb
    }

    async fn crumb(&self) -> Option<String> {
        match self.cached_crumb() {
            Some(c) => Some(c),
            None => self.fetch_crumb().await,
        }
    }

    async fn send(&self, url: &str, crumb: Option<&str>) -> HttpReply {
        let headers = [("User-Agent", USER_AGENT), ("Accept", "application/json")];
        self.http.get(&with_crumb(url, crumb), &headers).await
    }

    async fn get_json(&self, url: &str) -> Result<Value, AnalysisError> {
        let crumb = self.crumb().await;
        let mut reply = self.send(url, crumb.as_deref()).await;

        if reply.status == Some(401) {
            tracing::info!("Yahoo returned 401, refreshing crumb");
            let fresh = self.fetch_crumb().await;
            reply = self.send(url, fresh.as_deref()).await;
        }

        match reply.status {
            Some(200) => {}
            Some(429) => return Err(AnalysisError::RateLimited("Yahoo HTTP 429".to_string())),
            Some(code) => {
                return Err(AnalysisError::ProviderUnavailable(format!("Yahoo HTTP {}", code)))
            }
            None => {
                return Err(AnalysisError::ProviderUnavailable(
                    reply.error.unwrap_or_else(|| "no response".to_string()),
                ))
            }
        }

        reply
            .json()
            .ok_or_else(|| AnalysisError::SchemaMismatch("Yahoo body is not JSON".to_string()))
    }
}

#[async_trait]
impl FundamentalsSource for YahooClient {
    async fn profile(&self, symbol: &str) -> Result<CompanyProfile, AnalysisError> {
        let url = format!("{}/{}?modules={}", QUOTE_SUMMARY_URL, symbol, MODULES);
        let json = self.get_json(&url).await?;
        let profile = profile_from_quote_summary(symbol, &json)?;
        tracing::info!(
            "Yahoo profile for {}: price={:?} sector={:?}",
            symbol,
            profile.current_price,
            profile.sector
        );
        Ok(profile)
    }

    async fn price_history(&self, symbol: &str, period: &str) -> Result<PriceSeries, AnalysisError> {
        let url = format!("{}/{}?range={}&interval=1d", CHART_URL, symbol, period);
        let json = self.get_json(&url).await?;
        let series = price_series_from_chart(&json)?;
        tracing::debug!("Yahoo chart for {}: {} bars", symbol, series.len());
        Ok(series)
    }
}

fn statements<'a>(result: &'a Map<String, Value>, module: &str, list_key: &str) -> Vec<&'a Map<String, Value>> {
    result
        .get(module)
        .and_then(|m| m.get(list_key))
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_object).collect())
        .unwrap_or_default()
}

fn cash_flow_period(row: &Map<String, Value>) -> CashFlowPeriod {
    CashFlowPeriod {
        end_date: row.get("endDate").and_then(parse_date_value),
        free_cash_flow: pick_number(row, &FCF_KEYS),
        operating_cash_flow: pick_number(row, &OCF_KEYS),
        capital_expenditure: pick_number(row, &CAPEX_KEYS),
    }
}

fn newest_first<T>(mut rows: Vec<T>, date: impl Fn(&T) -> Option<chrono::NaiveDate>) -> Vec<T> {
    rows.sort_by(|a, b| date(b).cmp(&date(a)));
    rows
}

/// Build a `CompanyProfile` from a `quoteSummary` response.
pub fn profile_from_quote_summary(symbol: &str, json: &Value) -> Result<CompanyProfile, AnalysisError> {
    let result = json
        .pointer("/quoteSummary/result/0")
        .and_then(Value::as_object)
        .ok_or_else(|| AnalysisError::SchemaMismatch(format!("no quoteSummary result for {}", symbol)))?;

    let mut info = Map::new();
    for module in FLAT_MODULES {
        if let Some(obj) = result.get(module).and_then(Value::as_object) {
            for (k, v) in obj {
                let present = info.get(k).map_or(false, |e| parse_number(e).is_some() || e.is_string());
                if !present {
                    info.insert(k.clone(), v.clone());
                }
            }
        }
    }

    let num = |keys: &[&str]| pick_number(&info, keys);

    let income = statements(result, "incomeStatementHistory", "incomeStatementHistory");
    let balance = statements(result, "balanceSheetHistory", "balanceSheetStatements");
    let annual_cf = statements(result, "cashflowStatementHistory", "cashflowStatements");
    let quarterly_cf = statements(result, "cashflowStatementHistoryQuarterly", "cashflowStatements");

    let mut annual_financials: Vec<FinancialPeriod> = income
        .iter()
        .map(|row| {
            let end_date = row.get("endDate").and_then(parse_date_value);
            let bal = balance
                .iter()
                .find(|b| b.get("endDate").and_then(parse_date_value) == end_date);
            let bnum = |keys: &[&str]| bal.and_then(|b| pick_number(b, keys));
            FinancialPeriod {
                end_date,
                net_income: pick_number(row, &["netIncome", "netIncomeApplicableToCommonShares"]),
                total_revenue: pick_number(row, &["totalRevenue"]),
                ebit: pick_number(row, &["ebit", "operatingIncome"]),
                total_assets: bnum(&["totalAssets"]),
                total_liabilities: bnum(&["totalLiab", "totalLiabilities"]),
                stockholder_equity: bnum(&["totalStockholderEquity"]),
                current_assets: bnum(&["totalCurrentAssets"]),
                current_liabilities: bnum(&["totalCurrentLiabilities"]),
                retained_earnings: bnum(&["retainedEarnings"]),
            }
        })
        .collect();
    annual_financials = newest_first(annual_financials, |p| p.end_date);

    let annual_cash_flows = newest_first(
        annual_cf.iter().map(|r| cash_flow_period(r)).collect::<Vec<CashFlowPeriod>>(),
        |p| p.end_date,
    );
    let quarterly_cash_flows = newest_first(
        quarterly_cf.iter().map(|r| cash_flow_period(r)).collect::<Vec<CashFlowPeriod>>(),
        |p| p.end_date,
    );

    let latest = annual_financials.first().cloned().unwrap_or_default();
    let latest_cf_row = annual_cf.first().copied();
    let buyback = latest_cf_row.and_then(|r| pick_number(r, &["repurchaseOfStock", "commonStockRepurchased"]));
    let depreciation = latest_cf_row.and_then(|r| pick_number(r, &["depreciation", "depreciationAndAmortization"]));

    let next_earnings_date = result
        .get("calendarEvents")
        .and_then(|c| c.pointer("/earnings/earningsDate/0"))
        .and_then(parse_date_value);

    Ok(CompanyProfile {
        symbol: symbol.to_uppercase(),
        name: pick_str(&info, &["longName", "shortName"]),
        sector: pick_str(&info, &["sector"]),
        industry: pick_str(&info, &["industry"]),
        currency: pick_str(&info, &["currency", "financialCurrency"]),

        current_price: num(&["currentPrice", "regularMarketPrice"]),
        market_cap: num(&["marketCap"]),
        shares_outstanding: num(&["sharesOutstanding"]),
        beta: num(&["beta"]),
        trailing_eps: num(&["trailingEps"]),
        book_value_per_share: num(&["bookValue"]),

        trailing_pe: num(&["trailingPE"]),
        forward_pe: num(&["forwardPE"]),
        price_to_book: num(&["priceToBook"]),
        price_to_sales: num(&["priceToSalesTrailing12Months"]),
        peg_ratio: num(&["pegRatio"]),
        ev_to_ebitda: num(&["enterpriseToEbitda"]),

        return_on_equity: num(&["returnOnEquity"]),
        return_on_assets: num(&["returnOnAssets"]),
        operating_margin: num(&["operatingMargins"]),
        profit_margin: num(&["profitMargins"]),
        gross_margin: num(&["grossMargins"]),
        revenue_growth: num(&["revenueGrowth"]),
        revenue_quarterly_growth: num(&["revenueQuarterlyGrowth"]),
        earnings_growth: num(&["earningsGrowth"]),
        earnings_quarterly_growth: num(&["earningsQuarterlyGrowth"]),

        current_ratio: num(&["currentRatio"]),
        quick_ratio: num(&["quickRatio"]),
        debt_to_equity: num(&["debtToEquity"]),
        total_cash: num(&["totalCash"]),
        total_debt: num(&["totalDebt"]),

        operating_cash_flow: num(&["operatingCashflow"]),
        free_cash_flow: num(&["freeCashflow"]),
        net_income_to_common: num(&["netIncomeToCommon"]),
        total_revenue: num(&["totalRevenue"]).or(latest.total_revenue),
        ebit: num(&["ebit"]).or(latest.ebit),
        ebitda: num(&["ebitda"]),
        depreciation_and_amortization: depreciation,
        total_assets: latest.total_assets,
        total_current_assets: latest.current_assets,
        total_current_liabilities: latest.current_liabilities,
        total_liabilities: latest.total_liabilities,
        stockholder_equity: latest.stockholder_equity,
        retained_earnings: latest.retained_earnings,
        repurchase_of_stock: buyback,

        dividend_yield: num(&["dividendYield"]),
        payout_ratio: num(&["payoutRatio"]),
        short_percent_of_float: num(&["shortPercentOfFloat"]),

        target_mean_price: num(&["targetMeanPrice"]),
        target_median_price: num(&["targetMedianPrice"]),
        target_high_price: num(&["targetHighPrice"]),
        target_low_price: num(&["targetLowPrice"]),
        recommendation_key: pick_str(&info, &["recommendationKey"]),
        next_earnings_date,

        annual_financials,
        quarterly_cash_flows,
        annual_cash_flows,
    })
}

/// Build daily bars from a `chart` response. Points with a null close are skipped.
pub fn price_series_from_chart(json: &Value) -> Result<PriceSeries, AnalysisError> {
    let result = json
        .pointer("/chart/result/0")
        .ok_or_else(|| AnalysisError::SchemaMismatch("no chart result".to_string()))?;

    let timestamps = result
        .get("timestamp")
        .and_then(Value::as_array)
        .ok_or_else(|| AnalysisError::InsufficientData("chart has no timestamps".to_string()))?;
    let quote = result
        .pointer("/indicators/quote/0")
        .and_then(Value::as_object)
        .ok_or_else(|| AnalysisError::SchemaMismatch("chart has no quote block".to_string()))?;

    let column = |name: &str| -> Vec<Option<f64>> {
        quote
            .get(name)
            .and_then(Value::as_array)
            .map(|arr| arr.iter().map(parse_number).collect())
            .unwrap_or_default()
    };
    let (open, high, low, close, volume) = (
        column("open"),
        column("high"),
        column("low"),
        column("close"),
        column("volume"),
    );

    let bars = timestamps
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let c = close.get(i).copied().flatten()?;
            let timestamp = DateTime::from_timestamp(ts.as_i64()?, 0)?;
            let at = |col: &Vec<Option<f64>>| col.get(i).copied().flatten();
            Some(Bar {
                timestamp,
                open: at(&open).unwrap_or(c),
                high: at(&high).unwrap_or(c),
                low: at(&low).unwrap_or(c),
                close: c,
                volume: at(&volume).unwrap_or(0.0),
            })
        })
        .collect();

    Ok(PriceSeries::new(bars))
}
