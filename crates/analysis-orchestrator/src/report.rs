use analysis_core::{CompanyProfile, InsiderSignal, MetricSet, Unavailable};
use chrono::NaiveDate;
use fundamental_analysis::{AltmanZ, EarningsQuality, FusionDebug, PiotroskiScore, Scorecard, ValueTrap, Verdict};
use serde::{Deserialize, Serialize};
use technical_analysis::{AllTimeHigh, InvestmentSimulation, MarketRegime, TechnicalContext};
use valuation_engine::{FcfEstimate, ValuationOutput};

use crate::insiders::InsiderFetch;
use crate::peers::PeerRow;

/// Everything computed for one ticker. Immutable once built; presentation
/// layers consume it as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockReport {
    pub symbol: String,
    pub as_of: NaiveDate,
    pub profile: CompanyProfile,

    /// Fused metrics; each value carries its provider.
    pub metrics: MetricSet,
    pub fusion: FusionDebug,

    pub insiders: InsiderFetch,
    pub insider_signal: InsiderSignal,

    pub fcf: FcfEstimate,
    pub valuation: ValuationOutput,

    pub piotroski: PiotroskiScore,
    pub altman: Result<AltmanZ, Unavailable>,
    pub graham_number: Result<f64, Unavailable>,
    pub earnings_quality: Result<EarningsQuality, Unavailable>,
    pub roic: Result<f64, Unavailable>,
    pub value_trap: ValueTrap,

    pub scorecard: Scorecard,
    pub verdict: Verdict,

    /// `None` when price history was unavailable or too short.
    pub technical: Option<TechnicalContext>,
    pub regime: MarketRegime,
    pub short_interest: Option<f64>,

    pub analyst_mos: Option<f64>,
    pub next_earnings: Option<NaiveDate>,
    /// Buy-and-hold over the configured years against SPY.
    pub simulation: Option<InvestmentSimulation>,
    pub all_time_high: Option<AllTimeHigh>,
    pub peers: Vec<PeerRow>,
}

impl StockReport {
    pub fn fair_value(&self) -> Option<f64> {
        self.valuation.result.fair_value_per_share
    }

    pub fn margin_of_safety(&self) -> Option<f64> {
        self.valuation.result.margin_of_safety
    }
}
