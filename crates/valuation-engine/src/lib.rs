//! Discounted cash-flow valuation: deterministic, Monte Carlo and reverse.

pub mod dcf;
pub mod engine;
pub mod fcf;
pub mod monte_carlo;
pub mod params;
pub mod reverse;

pub use dcf::{dcf_fair_value, margin_of_safety, DcfInputs, TerminalValue};
pub use engine::{run_valuation, ValuationOutput};
pub use fcf::{reinvestment_adjusted_fcf, ttm_free_cash_flow, AdjustedFcf, FcfEstimate};
pub use monte_carlo::{monte_carlo_dcf, MonteCarloConfig};
pub use params::{estimate_smart_params, resolve_dcf_params, DcfMode, DcfParams, SmartParams};
pub use reverse::implied_growth;
