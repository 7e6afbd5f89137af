use analysis_core::stats::{mean, std_sample};
use analysis_core::PriceSeries;
use serde::{Deserialize, Serialize};

use crate::indicators::pct_returns;

const MIN_BARS: usize = 20;
const ANNUALIZATION: f64 = 252.0;

/// Coarse market regime from annualized volatility and drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketRegime {
    HighVolatilityBear,
    LowVolatilityBull,
    StableTransition,
    /// Not enough history to tell.
    StableNeutral,
}

impl MarketRegime {
    pub fn label(&self) -> &'static str {
        match self {
            MarketRegime::HighVolatilityBear => "High Volatility / Bear",
            MarketRegime::LowVolatilityBull => "Low Volatility / Bull",
            MarketRegime::StableTransition => "Stable / Transition",
            MarketRegime::StableNeutral => "Stable / Neutral",
        }
    }
}

pub fn detect_market_regime(series: &PriceSeries) -> MarketRegime {
    if series.len() < MIN_BARS {
        return MarketRegime::StableNeutral;
    }
    let returns = pct_returns(&series.closes());
    let (Some(sd), Some(avg)) = (std_sample(&returns), mean(&returns)) else {
        return MarketRegime::StableNeutral;
    };

    let vol = sd * ANNUALIZATION.sqrt();
    let drift = avg * ANNUALIZATION;

    if vol > 0.28 && drift < -0.10 {
        MarketRegime::HighVolatilityBear
    } else if vol < 0.18 && drift > 0.05 {
        MarketRegime::LowVolatilityBull
    } else {
        MarketRegime::StableTransition
    }
}
