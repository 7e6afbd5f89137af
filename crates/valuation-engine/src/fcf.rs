//! Trailing-twelve-month free cash flow and the reinvestment-heavy adjustment.

use analysis_core::{CashFlowPeriod, CompanyProfile};
use serde::{Deserialize, Serialize};

const TTM_QUARTERS: usize = 4;
const GIANT_MARKET_CAP: f64 = 1e12;
const GIANT_FCF_FLOOR: f64 = 30e9;

const REINVESTMENT_RATIO: f64 = 0.3;
const OCF_PROXY_FACTOR: f64 = 0.6;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FcfEstimate {
    pub value: Option<f64>,
    /// Ordered steps taken, for the report's debug panel.
    pub debug: Vec<String>,
}

fn quarter_values(quarters: &[CashFlowPeriod]) -> Option<(Vec<f64>, &'static str)> {
    let direct: Vec<f64> = quarters.iter().filter_map(|q| q.free_cash_flow).collect();
    if !direct.is_empty() {
        return Some((direct, "quarterly row 'Free Cash Flow'"));
    }
    let computed: Vec<f64> = quarters
        .iter()
        .filter_map(|q| match (q.operating_cash_flow, q.capital_expenditure) {
            (Some(ocf), Some(capex)) => Some(ocf - capex.abs()),
            _ => None,
        })
        .collect();
    (!computed.is_empty()).then_some((computed, "computed: operating cash flow - |capital expenditure|"))
}

fn billions(v: f64) -> String {
    format!("${:.1}B", v / 1e9)
}

/// Annual free cash flow from the newest quarters, with annual and profile
/// fallbacks.
pub fn ttm_free_cash_flow(profile: &CompanyProfile) -> FcfEstimate {
    let mut debug = Vec::new();
    let quarters: Vec<CashFlowPeriod> = profile.quarterly_cash_flows.iter().take(TTM_QUARTERS).cloned().collect();

    if quarters.is_empty() {
        debug.push("FCF: no quarterly cash-flow rows, trying fallbacks".to_string());
    } else {
        let labels: Vec<String> = quarters
            .iter()
            .map(|q| q.end_date.map(|d| d.to_string()).unwrap_or_else(|| "?".to_string()))
            .collect();
        debug.push(format!("FCF: quarters {}", labels.join(", ")));
    }

    let Some((values, method)) = quarter_values(&quarters) else {
        if let Some(v) = profile.annual_cash_flows.first().and_then(|a| a.free_cash_flow) {
            debug.push(format!("FCF: using latest annual 'Free Cash Flow' row, {}", billions(v)));
            return FcfEstimate { value: Some(v), debug };
        }
        if let Some(v) = profile.free_cash_flow {
            debug.push(format!("FCF: using profile freeCashflow (fallback), {}", billions(v)));
            return FcfEstimate { value: Some(v), debug };
        }
        debug.push("FCF: no quarterly, annual or profile value available".to_string());
        return FcfEstimate { value: None, debug };
    };

    let n = values.len();
    let summed = n >= TTM_QUARTERS;
    let mut ttm = if summed {
        values.iter().take(TTM_QUARTERS).sum::<f64>()
    } else {
        values.iter().sum::<f64>() / n as f64 * 4.0
    };

    // A provider sometimes hands back one quarter under an annual label.
    if summed && profile.market_cap.is_some_and(|mc| mc > GIANT_MARKET_CAP) && ttm < GIANT_FCF_FLOOR {
        ttm *= 4.0;
        debug.push("FCF: sanity check (market cap > $1T and FCF < $30B), multiplied by 4".to_string());
    }

    debug.push(format!("FCF method: {}, quarters used: {}", method, n));
    if summed {
        debug.push("FCF: TTM = sum of the last 4 quarters".to_string());
    } else {
        debug.push(format!("FCF: annualized from {} quarter(s), mean x 4", n));
    }
    debug.push(format!("FCF (TTM) used: {}", billions(ttm)));

    FcfEstimate { value: Some(ttm), debug }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustedFcf {
    pub value: f64,
    pub warning: Option<String>,
}

/// Replace a reinvestment-depressed FCF with 0.6 x operating cash flow.
pub fn reinvestment_adjusted_fcf(fcf: f64, operating_cash_flow: Option<f64>) -> AdjustedFcf {
    match operating_cash_flow {
        Some(ocf) if fcf > 0.0 && ocf > 0.0 && fcf < REINVESTMENT_RATIO * ocf => AdjustedFcf {
            value: ocf * OCF_PROXY_FACTOR,
            warning: Some(
                "Heavy reinvestment detected: DCF uses adjusted operating cash flow instead of FCF".to_string(),
            ),
        },
        _ => AdjustedFcf {
            value: fcf,
            warning: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quarter(fcf: Option<f64>, ocf: Option<f64>, capex: Option<f64>) -> CashFlowPeriod {
        CashFlowPeriod {
            end_date: None,
            free_cash_flow: fcf,
            operating_cash_flow: ocf,
            capital_expenditure: capex,
        }
    }

    #[test]
    fn test_sums_newest_four_quarters() {
        let profile = CompanyProfile {
            quarterly_cash_flows: (1..=6).map(|i| quarter(Some(i as f64 * 1e9), None, None)).collect(),
            ..Default::default()
        };
        let est = ttm_free_cash_flow(&profile);
        assert_relative_eq!(est.value.unwrap(), 10e9);
        assert!(est.debug.iter().any(|l| l.contains("sum of the last 4")));
    }

    #[test]
    fn test_annualizes_partial_quarters_from_ocf_minus_capex() {
        let profile = CompanyProfile {
            quarterly_cash_flows: vec![
                quarter(None, Some(5e9), Some(-1e9)),
                quarter(None, Some(3e9), Some(1e9)),
            ],
            ..Default::default()
        };
        // mean(4B, 2B) * 4
        assert_relative_eq!(ttm_free_cash_flow(&profile).value.unwrap(), 12e9);
    }

    #[test]
    fn test_giant_sanity_multiplier() {
        let profile = CompanyProfile {
            market_cap: Some(2e12),
            quarterly_cash_flows: (0..4).map(|_| quarter(Some(5e9), None, None)).collect(),
            ..Default::default()
        };
        assert_relative_eq!(ttm_free_cash_flow(&profile).value.unwrap(), 80e9);
    }

    #[test]
    fn test_fallback_chain() {
        let annual = CompanyProfile {
            annual_cash_flows: vec![quarter(Some(7e9), None, None)],
            free_cash_flow: Some(1e9),
            ..Default::default()
        };
        assert_eq!(ttm_free_cash_flow(&annual).value, Some(7e9));

        let profile_only = CompanyProfile {
            free_cash_flow: Some(1e9),
            ..Default::default()
        };
        assert_eq!(ttm_free_cash_flow(&profile_only).value, Some(1e9));

        let nothing = ttm_free_cash_flow(&CompanyProfile::default());
        assert_eq!(nothing.value, None);
        assert!(!nothing.debug.is_empty());
    }

    #[test]
    fn test_reinvestment_adjustment() {
        let adjusted = reinvestment_adjusted_fcf(10.0, Some(100.0));
        assert_relative_eq!(adjusted.value, 60.0);
        assert!(adjusted.warning.is_some());

        let normal = reinvestment_adjusted_fcf(50.0, Some(100.0));
        assert_eq!(normal.value, 50.0);
        assert!(normal.warning.is_none());

        assert_eq!(reinvestment_adjusted_fcf(-5.0, Some(100.0)).value, -5.0);
        assert_eq!(reinvestment_adjusted_fcf(10.0, None).value, 10.0);
    }
}
