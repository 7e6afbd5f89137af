//! Gap-filling fusion of the canonical metric set across providers.

use std::collections::BTreeMap;

use analysis_core::metrics::normalize_debt_to_equity;
use analysis_core::stats::round_dp;
use analysis_core::{CompanyProfile, MetricKey, MetricSet, MetricSource, ProviderDiagnostics};
use serde::{Deserialize, Serialize};

pub const PROFILE_SOURCE: &str = "Yahoo Finance";
pub const DERIVED_PEG_SOURCE: &str = "Derived (P/E ÷ EPS Growth%)";

/// What fusion did, for the report's debug panel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FusionDebug {
    /// Metric filled → provider that filled it.
    pub fills: BTreeMap<MetricKey, String>,
    pub steps: Vec<String>,
    pub providers: Vec<ProviderDiagnostics>,
    pub missing_after_fallbacks: Vec<MetricKey>,
}

/// P/E divided by EPS growth in percent points, kept only inside (0.01, 10).
pub fn derive_peg(pe: Option<f64>, earnings_growth: Option<f64>) -> Option<f64> {
    let pe = pe.filter(|v| *v > 0.0)?;
    let eg = earnings_growth.filter(|v| *v > 0.005)?;
    let peg = pe / (eg * 100.0);
    (peg > 0.01 && peg < 10.0).then(|| round_dp(peg, 2))
}

fn nonzero(v: Option<f64>) -> Option<f64> {
    v.filter(|x| *x != 0.0)
}

/// Seed the metric set from the primary quote/fundamentals profile.
///
/// `ttm_fcf` feeds the FCF yield together with market cap.
pub fn metrics_from_profile(profile: &CompanyProfile, ttm_fcf: Option<f64>) -> MetricSet {
    let mut set = MetricSet::new();
    let src = Some(PROFILE_SOURCE);

    let revenue_growth = nonzero(profile.revenue_growth).or(profile.revenue_quarterly_growth);
    let earnings_growth = nonzero(profile.earnings_growth).or(profile.earnings_quarterly_growth);
    let fcf_yield = match (nonzero(ttm_fcf), nonzero(profile.market_cap)) {
        (Some(fcf), Some(mc)) => Some(fcf / mc),
        _ => None,
    };

    set.set(MetricKey::Price, profile.current_price, src);
    set.set(MetricKey::Pe, profile.trailing_pe, src);
    set.set(MetricKey::ForwardPe, profile.forward_pe, src);
    set.set(MetricKey::Pb, profile.price_to_book, src);
    set.set(MetricKey::Ps, profile.price_to_sales, src);
    match profile.peg_ratio {
        Some(peg) => set.set(MetricKey::Peg, Some(peg), src),
        None => {
            let derived = derive_peg(profile.trailing_pe, earnings_growth);
            set.set(MetricKey::Peg, derived, derived.map(|_| DERIVED_PEG_SOURCE));
        }
    }
    set.set(MetricKey::EvEbitda, profile.ev_to_ebitda, src);

    set.set(MetricKey::Roe, profile.return_on_equity, src);
    set.set(MetricKey::Roa, profile.return_on_assets, src);
    set.set(MetricKey::OperatingMargin, profile.operating_margin, src);
    set.set(MetricKey::ProfitMargin, profile.profit_margin, src);
    set.set(MetricKey::GrossMargin, profile.gross_margin, src);
    set.set(MetricKey::RevenueGrowth, revenue_growth, src);
    set.set(MetricKey::EarningsGrowth, earnings_growth, src);

    set.set(MetricKey::CurrentRatio, profile.current_ratio, src);
    set.set(MetricKey::QuickRatio, profile.quick_ratio, src);
    set.set(MetricKey::DebtToEquity, profile.debt_to_equity.map(normalize_debt_to_equity), src);
    set.set(MetricKey::FcfYield, fcf_yield, src);

    set.set(MetricKey::DividendYield, profile.dividend_yield, src);
    set.set(MetricKey::PayoutRatio, profile.payout_ratio, src);
    set.set(MetricKey::ShortInterest, profile.short_percent_of_float, src);
    set.set(MetricKey::MarketCap, profile.market_cap, src);
    set.set(MetricKey::Beta, profile.beta, src);
    set.set(MetricKey::TrailingEps, profile.trailing_eps, src);
    set.set(MetricKey::BookValuePerShare, profile.book_value_per_share, src);

    set.set(MetricKey::AnalystTargetMean, profile.target_mean_price, src);
    set.set(MetricKey::AnalystTargetMedian, profile.target_median_price, src);
    set.set(MetricKey::AnalystTargetHigh, profile.target_high_price, src);
    set.set(MetricKey::AnalystTargetLow, profile.target_low_price, src);

    set
}

fn any_wanted_missing(set: &MetricSet) -> bool {
    MetricKey::WANTED.iter().any(|k| set.is_missing(*k))
}

/// Fill missing wanted metrics from one provider's canonical values.
/// Present values are never overwritten. Returns the keys filled.
pub fn apply_source(
    set: &mut MetricSet,
    values: &BTreeMap<MetricKey, f64>,
    source: &str,
    debug: &mut FusionDebug,
) -> Vec<MetricKey> {
    let mut filled = Vec::new();
    for key in MetricKey::WANTED {
        if !set.is_missing(key) {
            continue;
        }
        let Some(&raw) = values.get(&key) else {
            continue;
        };
        if !raw.is_finite() {
            continue;
        }
        let value = if key == MetricKey::DebtToEquity {
            normalize_debt_to_equity(raw)
        } else {
            raw
        };
        set.set(key, Some(value), Some(source));
        debug.fills.insert(key, source.to_string());
        filled.push(key);
    }
    filled
}

/// Walk the fallback providers in priority order while any wanted metric is
/// missing, then derive PEG as a last resort.
pub async fn fuse_metrics(
    symbol: &str,
    mut set: MetricSet,
    sources: &[Box<dyn MetricSource>],
) -> (MetricSet, FusionDebug) {
    let mut debug = FusionDebug::default();

    if !any_wanted_missing(&set) {
        debug.steps.push(format!("{} complete (no enrichment needed)", PROFILE_SOURCE));
        return (set, debug);
    }

    for source in sources {
        if !any_wanted_missing(&set) {
            break;
        }
        let (values, diag) = source.fetch_metrics(symbol).await;
        let filled = apply_source(&mut set, &values, source.name(), &mut debug);
        tracing::info!(
            "{} filled {} metric(s) for {} ({} offered)",
            source.name(),
            filled.len(),
            symbol,
            values.len()
        );
        debug.steps.push(format!("{}: filled {}", source.name(), filled.len()));
        debug.providers.push(diag);
    }

    debug.missing_after_fallbacks = MetricKey::WANTED
        .iter()
        .copied()
        .filter(|k| set.is_missing(*k))
        .collect();
    if !debug.missing_after_fallbacks.is_empty() {
        let missing = &debug.missing_after_fallbacks;
        tracing::debug!("Still missing after fallbacks for {}: {:?}", symbol, missing);
    }

    if set.is_missing(MetricKey::Peg) {
        if let Some(peg) = derive_peg(set.value(MetricKey::Pe), set.value(MetricKey::EarningsGrowth)) {
            set.set(MetricKey::Peg, Some(peg), Some(DERIVED_PEG_SOURCE));
            debug.fills.insert(MetricKey::Peg, "Derived".to_string());
            debug.steps.push("PEG derived from P/E and EPS growth".to_string());
            debug.missing_after_fallbacks.retain(|k| *k != MetricKey::Peg);
        }
    }

    (set, debug)
}
