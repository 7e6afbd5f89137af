use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV bar data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Time-ordered daily history. Iterating twice yields the same bars.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceSeries {
    bars: Vec<Bar>,
}

impl PriceSeries {
    /// Builds a series, sorting by timestamp and dropping non-finite closes.
    pub fn new(mut bars: Vec<Bar>) -> Self {
        bars.retain(|b| b.close.is_finite());
        bars.sort_by_key(|b| b.timestamp);
        Self { bars }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bar> {
        self.bars.iter()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars
            .iter()
            .map(|b| b.volume)
            .filter(|v| v.is_finite())
            .collect()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }
}

/// Direction of an insider transaction after label normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
    Other,
}

impl Direction {
    /// Classify a provider's free-text type (or code) plus an optional
    /// acquired/disposed flag. The A/D flag wins when present.
    pub fn classify(raw_type: Option<&str>, acquired_disposed: Option<&str>) -> Self {
        let ad = acquired_disposed.unwrap_or("").trim().to_uppercase();
        if ad == "A" {
            return Direction::Buy;
        }
        if ad == "D" {
            return Direction::Sell;
        }

        let t = raw_type.unwrap_or("").trim().to_lowercase();
        if ["buy", "purchase", "acquire"].iter().any(|k| t.contains(k)) {
            return Direction::Buy;
        }
        if ["sell", "sale", "dispose"].iter().any(|k| t.contains(k)) {
            return Direction::Sell;
        }
        match t.as_str() {
            "p" | "p - purchase" => Direction::Buy,
            "s" | "s - sale" => Direction::Sell,
            _ => Direction::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "Buy",
            Direction::Sell => "Sell",
            Direction::Other => "Other",
        }
    }
}

/// One insider trade as reported by a provider, normalized to a common shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub date: NaiveDate,
    pub direction: Direction,
    pub owner_name: Option<String>,
    pub owner_role: Option<String>,
    pub security_description: Option<String>,
    /// Provider's own transaction type text, kept for noise filtering.
    pub transaction_label: Option<String>,
    /// Form 4 transaction code (P, S, A, M, F, ...) when the provider exposes it.
    pub transaction_code: Option<String>,
    pub share_count: Option<f64>,
    pub price_per_share: Option<f64>,
    pub notional_value: Option<f64>,
    /// Provenance; comma-joined after deduplication.
    pub source_provider: String,
    pub filing_reference: Option<String>,
}

impl TransactionRecord {
    /// Notional value falling back to shares x price.
    pub fn effective_value(&self) -> Option<f64> {
        self.notional_value.or(match (self.share_count, self.price_per_share) {
            (Some(s), Some(p)) => Some(s * p),
            _ => None,
        })
    }
}

/// Per-call diagnostics kept by every adapter. Never carries a raw credential.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderDiagnostics {
    pub provider: String,
    pub endpoint: String,
    /// HTTP status; 0 when the request never completed.
    pub status: Option<u16>,
    pub item_count: usize,
    pub error_message: Option<String>,
    pub note: Option<String>,
    pub redacted_url: Option<String>,
    pub rate_limited: bool,
}

impl ProviderDiagnostics {
    pub fn new(provider: &str, endpoint: &str) -> Self {
        Self {
            provider: provider.to_string(),
            endpoint: endpoint.to_string(),
            ..Default::default()
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == Some(200) && self.error_message.is_none() && !self.rate_limited
    }
}

/// One fiscal period of the income statement and balance sheet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinancialPeriod {
    pub end_date: Option<NaiveDate>,
    pub net_income: Option<f64>,
    pub total_assets: Option<f64>,
    pub total_revenue: Option<f64>,
    pub ebit: Option<f64>,
    pub total_liabilities: Option<f64>,
    pub stockholder_equity: Option<f64>,
    pub current_assets: Option<f64>,
    pub current_liabilities: Option<f64>,
    pub retained_earnings: Option<f64>,
}

/// One period of the cash-flow statement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CashFlowPeriod {
    pub end_date: Option<NaiveDate>,
    pub free_cash_flow: Option<f64>,
    pub operating_cash_flow: Option<f64>,
    pub capital_expenditure: Option<f64>,
}

/// Snapshot of quote and fundamentals for one security.
///
/// Percent-like fields are fractions (0.15 = 15%). `debt_to_equity` is kept
/// as reported; fusion normalizes it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub symbol: String,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub currency: Option<String>,

    pub current_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub shares_outstanding: Option<f64>,
    pub beta: Option<f64>,
    pub trailing_eps: Option<f64>,
    pub book_value_per_share: Option<f64>,

    pub trailing_pe: Option<f64>,
    pub forward_pe: Option<f64>,
    pub price_to_book: Option<f64>,
    pub price_to_sales: Option<f64>,
    pub peg_ratio: Option<f64>,
    pub ev_to_ebitda: Option<f64>,

    pub return_on_equity: Option<f64>,
    pub return_on_assets: Option<f64>,
    pub operating_margin: Option<f64>,
    pub profit_margin: Option<f64>,
    pub gross_margin: Option<f64>,
    pub revenue_growth: Option<f64>,
    pub revenue_quarterly_growth: Option<f64>,
    pub earnings_growth: Option<f64>,
    pub earnings_quarterly_growth: Option<f64>,

    pub current_ratio: Option<f64>,
    pub quick_ratio: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub total_cash: Option<f64>,
    pub total_debt: Option<f64>,

    pub operating_cash_flow: Option<f64>,
    pub free_cash_flow: Option<f64>,
    pub net_income_to_common: Option<f64>,
    pub total_revenue: Option<f64>,
    pub ebit: Option<f64>,
    pub ebitda: Option<f64>,
    pub depreciation_and_amortization: Option<f64>,
    pub total_assets: Option<f64>,
    pub total_current_assets: Option<f64>,
    pub total_current_liabilities: Option<f64>,
    pub total_liabilities: Option<f64>,
    pub stockholder_equity: Option<f64>,
    pub retained_earnings: Option<f64>,
    /// Negative when the company bought back stock.
    pub repurchase_of_stock: Option<f64>,

    pub dividend_yield: Option<f64>,
    pub payout_ratio: Option<f64>,
    pub short_percent_of_float: Option<f64>,

    pub target_mean_price: Option<f64>,
    pub target_median_price: Option<f64>,
    pub target_high_price: Option<f64>,
    pub target_low_price: Option<f64>,
    pub recommendation_key: Option<String>,
    pub next_earnings_date: Option<NaiveDate>,

    /// Newest first.
    pub annual_financials: Vec<FinancialPeriod>,
    /// Newest first.
    pub quarterly_cash_flows: Vec<CashFlowPeriod>,
    /// Newest first.
    pub annual_cash_flows: Vec<CashFlowPeriod>,
}

impl CompanyProfile {
    /// Market cap, falling back to price x shares.
    pub fn market_value_of_equity(&self) -> Option<f64> {
        match self.market_cap {
            Some(mc) if mc != 0.0 => Some(mc),
            _ => match (self.current_price, self.shares_outstanding) {
                (Some(p), Some(s)) if p != 0.0 && s != 0.0 => Some(p * s),
                _ => None,
            },
        }
    }
}

/// Aggregate of surviving Monte Carlo trials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McDistribution {
    pub mean: f64,
    pub median: f64,
    pub p10: f64,
    pub p25: f64,
    pub p75: f64,
    pub p90: f64,
    pub std: f64,
    pub n: usize,
}

/// Result of the implied-growth search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpliedGrowth {
    pub growth: f64,
    /// Fair value hit the price within tolerance.
    pub converged: bool,
    /// The price lay between the fair values at the search endpoints.
    pub bracketed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValuationResult {
    pub fair_value_per_share: Option<f64>,
    pub margin_of_safety: Option<f64>,
    pub implied_growth: Option<ImpliedGrowth>,
    pub distribution: Option<McDistribution>,
    /// Reasons for any missing piece above.
    pub notes: Vec<String>,
}

/// Signal strength
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalStrength {
    StrongBuy,
    Buy,
    Neutral,
    Sell,
    StrongSell,
}

impl SignalStrength {
    /// Band a -100..100 score at 50 / 20 / -20 / -50.
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 50.0 => SignalStrength::StrongBuy,
            s if s >= 20.0 => SignalStrength::Buy,
            s if s >= -20.0 => SignalStrength::Neutral,
            s if s >= -50.0 => SignalStrength::Sell,
            _ => SignalStrength::StrongSell,
        }
    }

    /// Human-readable label for the signal
    pub fn to_label(&self) -> &'static str {
        match self {
            SignalStrength::StrongBuy => "Strong Buy",
            SignalStrength::Buy => "Buy",
            SignalStrength::Neutral => "Neutral",
            SignalStrength::Sell => "Sell",
            SignalStrength::StrongSell => "Strong Sell",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsiderSignal {
    /// -100..100
    pub score: f64,
    pub label: SignalStrength,
    /// 0..1
    pub confidence: f64,
    pub buy_count: usize,
    pub sell_count: usize,
    pub cluster_buying: bool,
    pub cluster_selling: bool,
    pub insights: Vec<String>,
}

impl InsiderSignal {
    pub fn neutral(insight: &str) -> Self {
        Self {
            score: 0.0,
            label: SignalStrength::Neutral,
            confidence: 0.0,
            buy_count: 0,
            sell_count: 0,
            cluster_buying: false,
            cluster_selling: false,
            insights: vec![insight.to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_prefers_acquired_disposed_flag() {
        assert_eq!(Direction::classify(Some("Sale"), Some("A")), Direction::Buy);
        assert_eq!(Direction::classify(Some("Purchase"), Some(" d ")), Direction::Sell);
    }

    #[test]
    fn test_direction_keywords_and_codes() {
        assert_eq!(Direction::classify(Some("Open market purchase"), None), Direction::Buy);
        assert_eq!(Direction::classify(Some("S-Sale+OE"), None), Direction::Sell);
        assert_eq!(Direction::classify(Some("P"), None), Direction::Buy);
        assert_eq!(Direction::classify(Some("s"), None), Direction::Sell);
        assert_eq!(Direction::classify(Some("M-Exempt"), None), Direction::Other);
        assert_eq!(Direction::classify(None, None), Direction::Other);
    }

    #[test]
    fn test_effective_value_falls_back_to_shares_times_price() {
        let rec = TransactionRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            direction: Direction::Buy,
            owner_name: None,
            owner_role: None,
            security_description: None,
            transaction_label: None,
            transaction_code: Some("P".into()),
            share_count: Some(100.0),
            price_per_share: Some(12.5),
            notional_value: None,
            source_provider: "test".into(),
            filing_reference: None,
        };
        assert_eq!(rec.effective_value(), Some(1250.0));
    }

    #[test]
    fn test_signal_strength_bands() {
        assert_eq!(SignalStrength::from_score(50.0), SignalStrength::StrongBuy);
        assert_eq!(SignalStrength::from_score(20.0), SignalStrength::Buy);
        assert_eq!(SignalStrength::from_score(0.0), SignalStrength::Neutral);
        assert_eq!(SignalStrength::from_score(-20.0), SignalStrength::Neutral);
        assert_eq!(SignalStrength::from_score(-50.0), SignalStrength::Sell);
        assert_eq!(SignalStrength::from_score(-50.1), SignalStrength::StrongSell);
    }

    #[test]
    fn test_price_series_sorts_and_restarts() {
        let t0 = Utc::now();
        let bar = |days: i64, close: f64| Bar {
            timestamp: t0 - chrono::Duration::days(days),
            open: close,
            high: close,
            low: close,
            close,
            volume: 10.0,
        };
        let series = PriceSeries::new(vec![bar(1, 2.0), bar(3, 1.0), bar(0, f64::NAN)]);
        assert_eq!(series.closes(), vec![1.0, 2.0]);
        assert_eq!(series.iter().count(), series.iter().count());
    }
}
