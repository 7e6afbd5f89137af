use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use analysis_core::{
    AnalysisError, AppConfig, Bar, CashFlowPeriod, CompanyProfile, Direction, FundamentalsSource, InsiderSource,
    MetricKey, PriceSeries, ProviderDiagnostics, TransactionRecord,
};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use technical_analysis::MarketRegime;

use super::*;

struct FakeFundamentals {
    profiles: HashMap<String, CompanyProfile>,
    bars: usize,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl FakeFundamentals {
    fn new(profiles: Vec<CompanyProfile>, bars: usize) -> Self {
        Self {
            profiles: profiles.into_iter().map(|p| (p.symbol.clone(), p)).collect(),
            bars,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl FundamentalsSource for FakeFundamentals {
    async fn profile(&self, symbol: &str) -> Result<CompanyProfile, AnalysisError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.profiles
            .get(symbol)
            .cloned()
            .ok_or_else(|| AnalysisError::ProviderUnavailable(format!("no profile for {}", symbol)))
    }

    async fn price_history(&self, _symbol: &str, _period: &str) -> Result<PriceSeries, AnalysisError> {
        if self.bars == 0 {
            return Err(AnalysisError::ProviderUnavailable("chart down".to_string()));
        }
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars = (0..self.bars)
            .map(|i| {
                let close = 100.0 * 1.001f64.powi(i as i32);
                Bar {
                    timestamp: start + Duration::days(i as i64),
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: 1_000.0,
                }
            })
            .collect();
        Ok(PriceSeries::new(bars))
    }
}

struct FakeInsiders {
    name: &'static str,
    records: Vec<TransactionRecord>,
}

#[async_trait]
impl InsiderSource for FakeInsiders {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch_transactions(&self, _symbol: &str) -> (Vec<TransactionRecord>, Vec<ProviderDiagnostics>) {
        let mut diag = ProviderDiagnostics::new(self.name, "fake");
        diag.status = Some(200);
        diag.item_count = self.records.len();
        (self.records.clone(), vec![diag])
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 8, 1).unwrap()
}

fn company(symbol: &str, market_cap: f64) -> CompanyProfile {
    let quarter = |fcf: f64| CashFlowPeriod {
        free_cash_flow: Some(fcf),
        ..Default::default()
    };
    CompanyProfile {
        symbol: symbol.to_string(),
        sector: Some("Technology".to_string()),
        current_price: Some(100.0),
        market_cap: Some(market_cap),
        shares_outstanding: Some(market_cap / 100.0),
        beta: Some(1.1),
        trailing_eps: Some(5.0),
        book_value_per_share: Some(20.0),
        trailing_pe: Some(20.0),
        price_to_book: Some(5.0),
        return_on_equity: Some(0.25),
        operating_margin: Some(0.3),
        profit_margin: Some(0.2),
        gross_margin: Some(0.45),
        revenue_growth: Some(0.08),
        earnings_growth: Some(0.1),
        current_ratio: Some(1.2),
        debt_to_equity: Some(150.0),
        total_cash: Some(market_cap * 0.05),
        total_debt: Some(market_cap * 0.04),
        operating_cash_flow: Some(market_cap * 0.05),
        net_income_to_common: Some(market_cap * 0.04),
        target_mean_price: Some(115.0),
        quarterly_cash_flows: vec![quarter(market_cap * 0.01); 4],
        ..Default::default()
    }
}

fn trade(provider: &str, owner: &str, price: f64) -> TransactionRecord {
    TransactionRecord {
        date: today() - Duration::days(10),
        direction: Direction::Buy,
        owner_name: Some(owner.to_string()),
        owner_role: Some("CEO".to_string()),
        security_description: None,
        transaction_label: Some("P-Purchase".to_string()),
        transaction_code: Some("P".to_string()),
        share_count: Some(1000.0),
        price_per_share: Some(price),
        notional_value: None,
        source_provider: provider.to_string(),
        filing_reference: None,
    }
}

fn orchestrator(fundamentals: FakeFundamentals, insiders: Vec<Box<dyn InsiderSource>>) -> AnalysisOrchestrator {
    AnalysisOrchestrator::new(Box::new(fundamentals), Vec::new(), insiders, AppConfig::default())
}

#[tokio::test]
async fn test_full_report_for_known_ticker() {
    let fundamentals = FakeFundamentals::new(
        vec![
            company("AAPL", 3.0e12),
            company("MSFT", 3.2e12),
            company("GOOGL", 2.0e12),
            company("NVDA", 2.5e12),
        ],
        260,
    );
    let insiders: Vec<Box<dyn InsiderSource>> = vec![
        Box::new(FakeInsiders {
            name: "FMP stable",
            records: vec![trade("FMP stable: insider-trading/search", "JANE DOE", 50.0)],
        }),
        Box::new(FakeInsiders {
            name: "SEC Form 4",
            records: vec![trade("SEC Form 4", "Jane Doe ", 50.0001)],
        }),
    ];

    let report = orchestrator(fundamentals, insiders)
        .analyze_as_of(" aapl ", today())
        .await
        .unwrap();

    assert_eq!(report.symbol, "AAPL");
    assert!(report.fair_value().is_some());
    assert!(report.valuation.result.distribution.is_some());
    assert_eq!(report.metrics.value(MetricKey::DebtToEquity), Some(1.5));

    assert_eq!(report.insiders.records.len(), 1);
    assert_eq!(
        report.insiders.records[0].source_provider,
        "FMP stable: insider-trading/search, SEC Form 4"
    );
    assert_eq!(report.insiders.chosen_source.as_deref(), Some("Merged: FMP stable, SEC Form 4"));
    assert_eq!(report.insiders.attempts.len(), 2);
    assert!(report.insider_signal.score > 0.0);

    assert!((report.analyst_mos.unwrap() - 0.15).abs() < 1e-9);
    assert_eq!(report.next_earnings, NaiveDate::from_ymd_opt(2024, 10, 25));

    assert!(report.technical.is_some());
    assert_eq!(report.regime, MarketRegime::LowVolatilityBull);

    // the fake serves one curve for every symbol, so SPY tracks the stock
    let sim = report.simulation.as_ref().unwrap();
    assert_eq!(sim.initial, 100_000.0);
    assert!((sim.stock_return - (1.001f64.powi(259) - 1.0)).abs() < 1e-9);
    assert!(sim.outperformance.unwrap().abs() < 1e-12);
    let ath = report.all_time_high.as_ref().unwrap();
    assert!((ath.price - 100.0 * 1.001f64.powi(259)).abs() < 1e-9);
    assert_eq!(ath.date, NaiveDate::from_ymd_opt(2024, 9, 16).unwrap());

    // META has no profile and is dropped
    let order: Vec<&str> = report.peers.iter().map(|p| p.symbol.as_str()).collect();
    assert_eq!(order, vec!["AAPL", "MSFT", "NVDA", "GOOGL"]);
    assert!((report.peers[0].fcf_yield.unwrap() - 0.04).abs() < 1e-9);
}

#[tokio::test]
async fn test_missing_history_and_unknown_peers() {
    let fundamentals = FakeFundamentals::new(vec![company("ZZZZ", 5.0e9)], 0);
    let report = orchestrator(fundamentals, Vec::new())
        .analyze_as_of("ZZZZ", today())
        .await
        .unwrap();

    assert!(report.technical.is_none());
    assert_eq!(report.regime, MarketRegime::StableNeutral);
    assert!(report.simulation.is_none());
    assert!(report.all_time_high.is_none());
    assert!(report.peers.is_empty());
    assert!(report.insiders.records.is_empty());
    assert_eq!(report.insiders.chosen_source, None);
    assert_eq!(report.insider_signal.score, 0.0);
}

#[tokio::test]
async fn test_profile_failure_is_an_error() {
    let fundamentals = FakeFundamentals::new(Vec::new(), 0);
    let orch = orchestrator(fundamentals, Vec::new());

    assert!(matches!(
        orch.analyze_as_of("AAPL", today()).await,
        Err(AnalysisError::ProviderUnavailable(_))
    ));
    assert!(matches!(
        orch.analyze_as_of("   ", today()).await,
        Err(AnalysisError::InvalidData(_))
    ));
}

#[tokio::test]
async fn test_peer_fan_out_is_bounded() {
    let fundamentals = FakeFundamentals::new(
        vec![
            company("JPM", 5.0e11),
            company("BAC", 3.0e11),
            company("WFC", 2.0e11),
            company("C", 1.0e11),
            company("GS", 1.5e11),
        ],
        0,
    );
    let max_in_flight = fundamentals.max_in_flight.clone();

    let peers = peers_for("JPM");
    let rows = compare_peers(&fundamentals, "JPM", &peers, 2).await;

    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0].symbol, "JPM");
    assert_eq!(rows[1].symbol, "BAC");
    assert_eq!(rows[4].symbol, "C");
    assert!(max_in_flight.load(Ordering::SeqCst) <= 2);
}

#[test]
fn test_peer_table_lookup() {
    assert_eq!(peers_for("TSLA"), vec!["RIVN", "LCID", "F", "GM"]);
    assert_eq!(peers_for("CEZ.PR"), vec!["NEE", "DUK", "SO", "D"]);
    assert!(peers_for("UNKNOWN").is_empty());
}

#[test]
fn test_chosen_source_label() {
    assert_eq!(chosen_source_label(&[]), None);
    assert_eq!(chosen_source_label(&["Finnhub"]).as_deref(), Some("Finnhub"));
    assert_eq!(
        chosen_source_label(&["API Ninjas", "SEC Form 4"]).as_deref(),
        Some("Merged: API Ninjas, SEC Form 4")
    );
}
