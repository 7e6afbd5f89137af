use analysis_core::{CompanyProfile, DcfDefaults, MetricKey, MetricSet};
use serde::{Deserialize, Serialize};

const MEGA_CAP: f64 = 200e9;
const LARGE_CAP: f64 = 50e9;
const SMALL_CAP: f64 = 10e9;

const RISK_FREE: f64 = 0.042;
const EQUITY_RISK_PREMIUM: f64 = 0.05;
const DEFAULT_WACC: f64 = 0.10;
const WACC_BOUNDS: (f64, f64) = (0.09, 0.15);
const SIZE_PREMIUM: f64 = 0.015;

const DEFAULT_GROWTH: f64 = 0.10;
const GROWTH_FLOOR: f64 = 0.03;
const MAX_EXIT_MULTIPLE: f64 = 25.0;

/// Conservative DCF inputs derived from the company itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmartParams {
    pub wacc: f64,
    pub growth: f64,
    pub exit_multiple: f64,
    pub is_mega_cap: bool,
    pub market_cap: f64,
    pub sector: String,
}

fn sector_base_multiple(sector: &str) -> f64 {
    let s = sector.to_lowercase();
    if s.contains("technology") {
        20.0
    } else if s.contains("communication") {
        18.0
    } else if s.contains("consumer cyclical") {
        20.0
    } else if s.contains("financial") || s.contains("energy") {
        12.0
    } else if s.contains("healthcare") {
        18.0
    } else {
        15.0
    }
}

/// +2 above 15%, +1 above 10%.
fn tiered_points(v: Option<f64>) -> f64 {
    match v.unwrap_or(0.0) {
        x if x > 0.15 => 2.0,
        x if x > 0.10 => 1.0,
        _ => 0.0,
    }
}

fn profitability_points(v: Option<f64>) -> f64 {
    match v.unwrap_or(0.0) {
        x if x > 0.20 => 2.0,
        x if x > 0.10 => 1.0,
        _ => 0.0,
    }
}

pub fn estimate_smart_params(profile: &CompanyProfile, metrics: &MetricSet) -> SmartParams {
    let market_cap = profile.market_cap.unwrap_or(0.0);
    let sector = profile.sector.as_deref().unwrap_or("").trim().to_string();

    let is_mega_cap = market_cap > MEGA_CAP;
    let is_large_cap = market_cap > LARGE_CAP;

    let base_wacc = match profile.beta {
        Some(beta) if beta > 0.0 => RISK_FREE + beta * EQUITY_RISK_PREMIUM,
        _ => DEFAULT_WACC,
    };
    let mut wacc = base_wacc.clamp(WACC_BOUNDS.0, WACC_BOUNDS.1);
    if market_cap > 0.0 && market_cap < SMALL_CAP {
        wacc += SIZE_PREMIUM;
    }

    let raw_growth = match (
        metrics.value(MetricKey::RevenueGrowth),
        metrics.value(MetricKey::EarningsGrowth),
    ) {
        (Some(rev), Some(earn)) => 0.7 * rev + 0.3 * earn,
        (Some(rev), None) => rev,
        (None, Some(earn)) => earn,
        (None, None) => DEFAULT_GROWTH,
    };
    let growth_cap = if is_mega_cap {
        0.08
    } else if is_large_cap {
        0.12
    } else {
        0.20
    };
    let growth = raw_growth.clamp(GROWTH_FLOOR, growth_cap);

    let mut quality = tiered_points(metrics.value(MetricKey::Roe))
        + profitability_points(metrics.value(MetricKey::ProfitMargin))
        + tiered_points(metrics.value(MetricKey::Roa));
    if metrics.value(MetricKey::DebtToEquity).is_some_and(|de| de < 0.5) {
        quality += 1.0;
    }
    let exit_multiple = (sector_base_multiple(&sector) + quality).min(MAX_EXIT_MULTIPLE);

    tracing::debug!(
        "Smart DCF params for {}: wacc {:.3}, growth {:.3}, exit {:.1}x",
        profile.symbol, wacc, growth, exit_multiple
    );

    SmartParams {
        wacc,
        growth,
        exit_multiple,
        is_mega_cap,
        market_cap,
        sector,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DcfMode {
    Smart,
    Manual,
}

/// The inputs the production DCF actually used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcfParams {
    pub mode: DcfMode,
    pub growth: f64,
    pub wacc: f64,
    pub exit_multiple: f64,
    pub terminal_growth: f64,
    pub years: u32,
}

/// Smart parameters when enabled, else the configured ones. Terminal growth
/// and horizon always come from configuration.
pub fn resolve_dcf_params(defaults: &DcfDefaults, profile: &CompanyProfile, metrics: &MetricSet) -> DcfParams {
    if defaults.smart {
        let smart = estimate_smart_params(profile, metrics);
        DcfParams {
            mode: DcfMode::Smart,
            growth: smart.growth,
            wacc: smart.wacc,
            exit_multiple: smart.exit_multiple,
            terminal_growth: defaults.terminal_growth,
            years: defaults.years,
        }
    } else {
        DcfParams {
            mode: DcfMode::Manual,
            growth: defaults.growth,
            wacc: defaults.wacc,
            exit_multiple: defaults.exit_multiple,
            terminal_growth: defaults.terminal_growth,
            years: defaults.years,
        }
    }
}
