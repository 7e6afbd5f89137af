//! Per-ticker pipeline: fetch, fuse, value, score and bundle a `StockReport`.

use analysis_core::{
    AnalysisError, AppConfig, FundamentalsSource, InsiderSource, MetricKey, MetricSource, PriceSeries,
};
use chrono::{NaiveDate, Utc};
use fundamental_analysis::{
    altman_z_score, build_scorecard, decide_verdict, detect_value_trap, earnings_quality, fuse_metrics,
    graham_number, metrics_from_profile, piotroski_f_score, roic, VerdictInputs,
};
use insider_analysis::compute_insider_signal;
use provider_client::{
    AlphaVantageInsider, AlphaVantageMetrics, ApiNinjasInsider, FinnhubInsider, FinnhubMetrics, FmpLegacyInsider,
    FmpMetrics, FmpStableInsider, ProviderClient, SecEdgarInsider, YahooClient,
};
use technical_analysis::{
    all_time_high, compute_technical_context, detect_market_regime, investment_simulation, trailing_years,
};
use valuation_engine::{run_valuation, ttm_free_cash_flow};

pub mod calendar;
pub mod insiders;
pub mod peers;
pub mod report;

pub use calendar::{analyst_margin_of_safety, next_earnings_estimate};
pub use insiders::{chosen_source_label, fetch_insider_transactions, InsiderFetch};
pub use peers::{compare_peers, peers_for, PeerRow, SECTOR_PEERS};
pub use report::StockReport;

#[cfg(test)]
mod tests;

const HISTORY_PERIOD: &str = "1y";
const FULL_HISTORY_PERIOD: &str = "max";
const BENCHMARK_SYMBOL: &str = "SPY";
const ROIC_SOURCE: &str = "Derived (NOPAT / invested capital)";

pub struct AnalysisOrchestrator {
    fundamentals: Box<dyn FundamentalsSource>,
    /// Fallback metric providers, highest priority first.
    metric_sources: Vec<Box<dyn MetricSource>>,
    /// Insider providers, highest priority first.
    insider_sources: Vec<Box<dyn InsiderSource>>,
    config: AppConfig,
}

impl AnalysisOrchestrator {
    pub fn new(
        fundamentals: Box<dyn FundamentalsSource>,
        metric_sources: Vec<Box<dyn MetricSource>>,
        insider_sources: Vec<Box<dyn InsiderSource>>,
        config: AppConfig,
    ) -> Self {
        Self {
            fundamentals,
            metric_sources,
            insider_sources,
            config,
        }
    }

    /// Wire the HTTP adapters. Providers without a credential stay in the
    /// chain and report "no data" through their diagnostics.
    pub fn from_config(config: &AppConfig) -> Self {
        let http = ProviderClient::new(config.provider_timeout_secs);

        let metric_sources: Vec<Box<dyn MetricSource>> = vec![
            Box::new(FmpMetrics::new(http.clone(), config.fmp_api_key.clone())),
            Box::new(AlphaVantageMetrics::new(http.clone(), config.alphavantage_api_key.clone())),
            Box::new(FinnhubMetrics::new(http.clone(), config.finnhub_api_key.clone())),
        ];

        let insider_sources: Vec<Box<dyn InsiderSource>> = vec![
            Box::new(FmpStableInsider::new(http.clone(), config.fmp_api_key.clone())),
            Box::new(FmpLegacyInsider::new(http.clone(), config.fmp_api_key.clone())),
            Box::new(ApiNinjasInsider::new(http.clone(), config.ninjas_api_key.clone())),
            Box::new(AlphaVantageInsider::new(http.clone(), config.alphavantage_api_key.clone())),
            Box::new(FinnhubInsider::new(http.clone(), config.finnhub_api_key.clone())),
            Box::new(SecEdgarInsider::new(http.clone(), config.sec_user_agent.clone())),
        ];

        Self::new(
            Box::new(YahooClient::new(http)),
            metric_sources,
            insider_sources,
            config.clone(),
        )
    }

    pub async fn analyze(&self, symbol: &str) -> Result<StockReport, AnalysisError> {
        self.analyze_as_of(symbol, Utc::now().date_naive()).await
    }

    /// Run the full pipeline with `today` as the reference date for the
    /// insider window and the earnings estimate.
    pub async fn analyze_as_of(&self, symbol: &str, today: NaiveDate) -> Result<StockReport, AnalysisError> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(AnalysisError::InvalidData("empty ticker symbol".to_string()));
        }
        tracing::info!("Starting analysis for {} as of {}", symbol, today);

        let profile = self.fundamentals.profile(&symbol).await?;

        let fcf = ttm_free_cash_flow(&profile);
        for step in &fcf.debug {
            tracing::debug!("{}: {}", symbol, step);
        }

        let seeded = metrics_from_profile(&profile, fcf.value);
        let (mut metrics, fusion) = fuse_metrics(&symbol, seeded, &self.metric_sources).await;

        let insiders = fetch_insider_transactions(&symbol, &self.insider_sources).await;
        let insider_signal = compute_insider_signal(&insiders.records, today, self.config.insider_window_days);
        tracing::info!(
            "Insider signal for {}: {:.1} ({}) from {:?}",
            symbol,
            insider_signal.score,
            insider_signal.label.to_label(),
            insiders.chosen_source
        );

        let valuation = run_valuation(&profile, &metrics, fcf.value, &self.config);

        let piotroski = piotroski_f_score(&profile);
        let altman = altman_z_score(&profile);
        let eps = metrics.value(MetricKey::TrailingEps).or(profile.trailing_eps);
        let bvps = metrics.value(MetricKey::BookValuePerShare).or(profile.book_value_per_share);
        let graham = graham_number(eps, bvps);
        let quality = earnings_quality(profile.operating_cash_flow, profile.net_income_to_common);
        let roic = roic(&profile);
        if let Ok(value) = roic.as_ref() {
            metrics.set(MetricKey::Roic, Some(*value), Some(ROIC_SOURCE));
        }
        let value_trap = detect_value_trap(&metrics, profile.trailing_eps);

        let price = metrics.value(MetricKey::Price).or(profile.current_price);
        let analyst_mos = analyst_margin_of_safety(metrics.value(MetricKey::AnalystTargetMean), price);

        let scorecard = build_scorecard(&metrics, &self.config.scoring);
        let verdict = decide_verdict(
            scorecard.overall,
            &VerdictInputs {
                dcf_mos: valuation.result.margin_of_safety,
                analyst_mos,
                insider_score: insider_signal.score,
                implied_growth: valuation.result.implied_growth.as_ref().map(|g| g.growth),
            },
            &self.config.scoring,
        );
        tracing::info!(
            "Scorecard for {}: {:.1} -> {}",
            symbol,
            scorecard.overall,
            verdict.label.as_str()
        );

        let history = self.history_or_empty(&symbol, HISTORY_PERIOD).await;
        let technical = compute_technical_context(&history);
        let regime = detect_market_regime(&history);

        let full_history = self.history_or_empty(&symbol, FULL_HISTORY_PERIOD).await;
        let ath = all_time_high(&full_history);
        let window = trailing_years(&full_history, self.config.simulation_years);
        let simulation = if window.is_empty() {
            None
        } else {
            let benchmark = self.history_or_empty(BENCHMARK_SYMBOL, FULL_HISTORY_PERIOD).await;
            investment_simulation(&window, &benchmark, self.config.simulation_amount)
        };

        let peer_list = peers_for(&symbol);
        let peers = if peer_list.is_empty() {
            Vec::new()
        } else {
            compare_peers(
                self.fundamentals.as_ref(),
                &symbol,
                &peer_list,
                self.config.peer_concurrency,
            )
            .await
        };

        Ok(StockReport {
            as_of: today,
            short_interest: metrics.value(MetricKey::ShortInterest),
            next_earnings: next_earnings_estimate(profile.next_earnings_date, today),
            symbol,
            profile,
            metrics,
            fusion,
            insiders,
            insider_signal,
            fcf,
            valuation,
            piotroski,
            altman,
            graham_number: graham,
            earnings_quality: quality,
            roic,
            value_trap,
            scorecard,
            verdict,
            technical,
            regime,
            analyst_mos,
            simulation,
            all_time_high: ath,
            peers,
        })
    }

    /// Price history failures degrade to an empty series; the sections that
    /// need it report `None`.
    async fn history_or_empty(&self, symbol: &str, period: &str) -> PriceSeries {
        match self.fundamentals.price_history(symbol, period).await {
            Ok(series) => series,
            Err(e) => {
                tracing::warn!("Price history ({}) unavailable for {}: {}", period, symbol, e);
                PriceSeries::default()
            }
        }
    }
}
