use analysis_core::{AppConfig, CompanyProfile, MetricKey, MetricSet, ValuationResult};
use serde::{Deserialize, Serialize};

use crate::dcf::{dcf_fair_value, margin_of_safety, DcfInputs};
use crate::fcf::reinvestment_adjusted_fcf;
use crate::monte_carlo::{monte_carlo_dcf, MonteCarloConfig};
use crate::params::{resolve_dcf_params, DcfParams};
use crate::reverse::implied_growth;

/// Valuation of one company plus the inputs behind it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationOutput {
    pub result: ValuationResult,
    pub params: DcfParams,
    /// FCF fed to the deterministic DCF after any reinvestment adjustment.
    pub dcf_fcf: Option<f64>,
    pub warnings: Vec<String>,
}

/// Production valuation: exit-multiple DCF with the equity bridge, a Monte
/// Carlo around the perpetuity form, and the implied growth at the current
/// price using the configured (manual) discount rate.
pub fn run_valuation(
    profile: &CompanyProfile,
    metrics: &MetricSet,
    ttm_fcf: Option<f64>,
    config: &AppConfig,
) -> ValuationOutput {
    let params = resolve_dcf_params(&config.dcf, profile, metrics);
    let mut result = ValuationResult::default();
    let mut warnings = Vec::new();

    let shares = profile.shares_outstanding.unwrap_or(0.0);
    let price = metrics.value(MetricKey::Price).or(profile.current_price);

    let Some(raw_fcf) = ttm_fcf else {
        result.notes.push("DCF: free cash flow unavailable".to_string());
        return ValuationOutput {
            result,
            params,
            dcf_fcf: None,
            warnings,
        };
    };

    let adjusted = reinvestment_adjusted_fcf(raw_fcf, profile.operating_cash_flow);
    if let Some(w) = adjusted.warning {
        tracing::warn!("{}: {}", profile.symbol, w);
        warnings.push(w);
    }

    let production = DcfInputs::perpetuity(
        adjusted.value,
        params.growth,
        params.terminal_growth,
        params.wacc,
        params.years,
        shares,
    )
    .with_exit_multiple(params.exit_multiple)
    .with_balance_sheet(profile.total_cash.unwrap_or(0.0), profile.total_debt.unwrap_or(0.0));

    match dcf_fair_value(&production) {
        Ok(fv) => {
            result.fair_value_per_share = Some(fv);
            result.margin_of_safety = price.and_then(|p| margin_of_safety(fv, p));
        }
        Err(u) => result.notes.push(format!("DCF: {}", u.reason)),
    }

    let reverse_base = DcfInputs::perpetuity(
        raw_fcf,
        params.growth,
        config.dcf.terminal_growth,
        config.dcf.wacc,
        params.years,
        shares,
    );
    match price {
        Some(p) => match implied_growth(p, &reverse_base) {
            Ok(implied) => {
                if !implied.bracketed {
                    warnings.push(format!(
                        "Reverse DCF: price {:.2} lies outside the fair values of the growth search range",
                        p
                    ));
                }
                result.implied_growth = Some(implied);
            }
            Err(u) => result.notes.push(format!("Reverse DCF: {}", u.reason)),
        },
        None => result.notes.push("Reverse DCF: price unavailable".to_string()),
    }

    let mc_base = DcfInputs::perpetuity(
        raw_fcf,
        params.growth,
        config.dcf.terminal_growth,
        params.wacc,
        params.years,
        shares,
    );
    let mc_config = MonteCarloConfig {
        trials: config.monte_carlo_trials,
        seed: config.monte_carlo_seed,
    };
    match monte_carlo_dcf(&mc_base, &mc_config) {
        Ok(dist) => result.distribution = Some(dist),
        Err(u) => result.notes.push(format!("Monte Carlo: {}", u.reason)),
    }

    tracing::info!(
        "Valuation for {}: fair value {:?}, MOS {:?} ({:?} mode)",
        profile.symbol, result.fair_value_per_share, result.margin_of_safety, params.mode
    );

    ValuationOutput {
        result,
        params,
        dcf_fcf: Some(adjusted.value),
        warnings,
    }
}
