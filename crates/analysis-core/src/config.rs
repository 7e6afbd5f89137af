use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Runtime configuration, read once from the environment (and `.env` via dotenvy in the binary).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    // Provider credentials; a missing key disables that provider
    pub fmp_api_key: Option<String>,
    pub alphavantage_api_key: Option<String>,
    pub finnhub_api_key: Option<String>,
    pub ninjas_api_key: Option<String>,
    pub sec_user_agent: String,

    pub provider_timeout_secs: u64, // 25
    pub peer_concurrency: usize,    // 5
    pub insider_window_days: i64,   // 180

    /// "What if I had invested" comparison against SPY.
    pub simulation_amount: f64, // 100000
    pub simulation_years: u32,  // 3

    pub monte_carlo_trials: usize, // 1000
    pub monte_carlo_seed: u64,     // 42

    pub dcf: DcfDefaults,
    pub scoring: ScoringPolicy,
}

/// Default DCF inputs used when smart parameters are disabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcfDefaults {
    pub years: u32,
    pub terminal_growth: f64,
    pub wacc: f64,
    pub growth: f64,
    pub exit_multiple: f64,
    /// Derive growth/WACC/multiple from the company profile.
    pub smart: bool,
}

impl Default for DcfDefaults {
    fn default() -> Self {
        Self {
            years: 5,
            terminal_growth: 0.03,
            wacc: 0.10,
            growth: 0.10,
            exit_multiple: 25.0,
            smart: true,
        }
    }
}

/// Named constants for scoring and verdict rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringPolicy {
    pub missing_metric_score: f64,
    pub unthresholded_score: f64,
    pub empty_category_score: f64,
    pub strong_buy_at: f64,
    pub buy_at: f64,
    pub hold_at: f64,
    pub caution_at: f64,
    pub mos_upgrade: f64,
    pub mos_downgrade: f64,
    pub analyst_mismatch_mos: f64,
    pub dcf_mismatch_mos: f64,
    pub insider_bullish_note: f64,
    pub insider_bearish_note: f64,
    pub implied_growth_high: f64,
    pub implied_growth_low: f64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            missing_metric_score: 3.0,
            unthresholded_score: 5.0,
            empty_category_score: 50.0,
            strong_buy_at: 85.0,
            buy_at: 60.0,
            hold_at: 45.0,
            caution_at: 30.0,
            mos_upgrade: 0.20,
            mos_downgrade: -0.15,
            analyst_mismatch_mos: 0.15,
            dcf_mismatch_mos: -0.10,
            insider_bullish_note: 50.0,
            insider_bearish_note: -30.0,
            implied_growth_high: 0.25,
            implied_growth_low: 0.0,
        }
    }
}

fn optional_key(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|n| env::var(n).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

fn parse_var<T>(name: &str, default: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .parse()
        .with_context(|| format!("invalid value for {}", name))
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            fmp_api_key: optional_key(&["FMP_API_KEY"]),
            alphavantage_api_key: optional_key(&["ALPHAVANTAGE_API_KEY"]),
            finnhub_api_key: optional_key(&["FINNHUB_API_KEY"]),
            ninjas_api_key: optional_key(&["NINJAS_API_KEY", "Ninjas_API_KEY"]),
            sec_user_agent: env::var("SEC_USER_AGENT")
                .unwrap_or_else(|_| "StockAnalyser/1.0".to_string()),

            provider_timeout_secs: parse_var("PROVIDER_TIMEOUT_SECS", "25")?,
            peer_concurrency: parse_var("PEER_CONCURRENCY", "5")?,
            insider_window_days: parse_var("INSIDER_WINDOW_DAYS", "180")?,

            simulation_amount: parse_var("SIMULATION_AMOUNT", "100000")?,
            simulation_years: parse_var("SIMULATION_YEARS", "3")?,

            monte_carlo_trials: parse_var("MONTE_CARLO_TRIALS", "1000")?,
            monte_carlo_seed: parse_var("MONTE_CARLO_SEED", "42")?,

            dcf: DcfDefaults {
                years: parse_var("DCF_YEARS", "5")?,
                terminal_growth: parse_var("DCF_TERMINAL_GROWTH", "0.03")?,
                wacc: parse_var("DCF_WACC", "0.10")?,
                growth: parse_var("DCF_GROWTH", "0.10")?,
                exit_multiple: parse_var("DCF_EXIT_MULTIPLE", "25")?,
                smart: parse_var("DCF_SMART", "true")?,
            },
            scoring: ScoringPolicy::default(),
        };

        if config.dcf.wacc <= config.dcf.terminal_growth {
            anyhow::bail!(
                "DCF_WACC ({}) must exceed DCF_TERMINAL_GROWTH ({})",
                config.dcf.wacc,
                config.dcf.terminal_growth
            );
        }
        if config.peer_concurrency == 0 {
            anyhow::bail!("PEER_CONCURRENCY must be at least 1");
        }
        if config.simulation_years == 0 {
            anyhow::bail!("SIMULATION_YEARS must be at least 1");
        }

        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            fmp_api_key: None,
            alphavantage_api_key: None,
            finnhub_api_key: None,
            ninjas_api_key: None,
            sec_user_agent: "StockAnalyser/1.0".to_string(),
            provider_timeout_secs: 25,
            peer_concurrency: 5,
            insider_window_days: 180,
            simulation_amount: 100_000.0,
            simulation_years: 3,
            monte_carlo_trials: 1000,
            monte_carlo_seed: 42,
            dcf: DcfDefaults::default(),
            scoring: ScoringPolicy::default(),
        }
    }
}
