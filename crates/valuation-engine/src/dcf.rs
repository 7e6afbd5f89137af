use analysis_core::Unavailable;
use serde::{Deserialize, Serialize};

/// How the value beyond the explicit horizon is estimated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TerminalValue {
    /// Gordon growth on the last projected FCF.
    Perpetuity,
    /// Multiple of the last projected FCF.
    ExitMultiple(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcfInputs {
    pub fcf: f64,
    pub growth: f64,
    pub terminal_growth: f64,
    pub wacc: f64,
    pub years: u32,
    pub shares: f64,
    pub cash: f64,
    pub debt: f64,
    pub terminal: TerminalValue,
}

impl DcfInputs {
    /// Perpetuity-mode inputs with no balance-sheet adjustment.
    pub fn perpetuity(fcf: f64, growth: f64, terminal_growth: f64, wacc: f64, years: u32, shares: f64) -> Self {
        Self {
            fcf,
            growth,
            terminal_growth,
            wacc,
            years,
            shares,
            cash: 0.0,
            debt: 0.0,
            terminal: TerminalValue::Perpetuity,
        }
    }

    pub fn with_exit_multiple(mut self, multiple: f64) -> Self {
        self.terminal = TerminalValue::ExitMultiple(multiple);
        self
    }

    /// Equity bridge: enterprise value + cash - debt.
    pub fn with_balance_sheet(mut self, cash: f64, debt: f64) -> Self {
        self.cash = cash;
        self.debt = debt;
        self
    }

    pub fn with_growth(&self, growth: f64) -> Self {
        Self { growth, ..self.clone() }
    }
}

/// Fair value per share from a discounted cash-flow projection.
pub fn dcf_fair_value(inputs: &DcfInputs) -> Result<f64, Unavailable> {
    if inputs.fcf.is_nan() || inputs.fcf <= 0.0 {
        return Err(Unavailable::new("free cash flow must be positive"));
    }
    if inputs.shares.is_nan() || inputs.shares <= 0.0 {
        return Err(Unavailable::new("shares outstanding must be positive"));
    }
    if inputs.years == 0 {
        return Err(Unavailable::new("projection horizon must be at least one year"));
    }
    if inputs.wacc <= -1.0 {
        return Err(Unavailable::new("discount rate must exceed -100%"));
    }
    if inputs.terminal == TerminalValue::Perpetuity && inputs.wacc <= inputs.terminal_growth {
        return Err(Unavailable::new("WACC must exceed terminal growth"));
    }

    let mut projected = inputs.fcf;
    let mut pv_sum = 0.0;
    for year in 1..=inputs.years {
        projected *= 1.0 + inputs.growth;
        pv_sum += projected / (1.0 + inputs.wacc).powi(year as i32);
    }

    let terminal_value = match inputs.terminal {
        TerminalValue::Perpetuity => {
            projected * (1.0 + inputs.terminal_growth) / (inputs.wacc - inputs.terminal_growth)
        }
        TerminalValue::ExitMultiple(multiple) => projected * multiple,
    };
    let pv_terminal = terminal_value / (1.0 + inputs.wacc).powi(inputs.years as i32);

    let equity_value = pv_sum + pv_terminal + inputs.cash - inputs.debt;
    let per_share = equity_value / inputs.shares;

    if per_share.is_finite() {
        Ok(per_share)
    } else {
        Err(Unavailable::new("DCF produced a non-finite value"))
    }
}

/// (fair value / price) - 1.
pub fn margin_of_safety(fair_value: f64, price: f64) -> Option<f64> {
    (price > 0.0 && fair_value.is_finite()).then(|| fair_value / price - 1.0)
}
