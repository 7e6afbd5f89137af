//! Risk and quality scorers: Piotroski, Altman, Graham, earnings quality,
//! value trap and ROIC.

use analysis_core::metrics::normalize_debt_to_equity;
use analysis_core::stats::round_dp;
use analysis_core::{CompanyProfile, FinancialPeriod, MetricKey, MetricSet, Unavailable};
use serde::{Deserialize, Serialize};

const US_TAX_KEEP: f64 = 0.79;

fn nonzero(v: Option<f64>) -> Option<f64> {
    v.filter(|x| *x != 0.0)
}

fn safe_div(num: Option<f64>, den: Option<f64>) -> Option<f64> {
    Some(num? / nonzero(den)?)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub name: String,
    /// 0 or 1
    pub points: u8,
}

/// Piotroski F-Score. Criteria whose inputs are missing are left out of
/// `breakdown` and contribute nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiotroskiScore {
    pub score: u8,
    pub breakdown: Vec<Criterion>,
}

impl PiotroskiScore {
    /// Number of criteria that could be evaluated.
    pub fn evaluated(&self) -> usize {
        self.breakdown.len()
    }

    fn record(&mut self, name: &str, passed: bool) {
        let points = u8::from(passed);
        self.score += points;
        self.breakdown.push(Criterion {
            name: name.to_string(),
            points,
        });
    }
}

fn roa_of(period: &FinancialPeriod) -> Option<f64> {
    let ni = nonzero(period.net_income)?;
    let ta = nonzero(period.total_assets)?;
    Some(ni / ta)
}

pub fn piotroski_f_score(profile: &CompanyProfile) -> PiotroskiScore {
    let mut out = PiotroskiScore {
        score: 0,
        breakdown: Vec::new(),
    };

    // Profitability
    let roa = profile.return_on_assets;
    if let Some(roa) = roa {
        out.record("ROA > 0", roa > 0.0);
    }
    let ocf = profile.operating_cash_flow;
    if let Some(ocf) = ocf {
        out.record("OCF > 0", ocf > 0.0);
    }
    if let [current, previous, ..] = profile.annual_financials.as_slice() {
        if let (Some(now), Some(before)) = (roa_of(current), roa_of(previous)) {
            out.record("ΔROA > 0", now > before);
        }
    }
    if let (Some(ocf), Some(roa), Some(ta)) = (ocf, roa, profile.total_assets.filter(|t| *t > 0.0)) {
        out.record("OCF/Assets > ROA", ocf / ta > roa);
    }

    // Leverage and liquidity
    if let Some(de) = profile.debt_to_equity.map(normalize_debt_to_equity) {
        out.record("D/E < 1.0", de < 1.0);
    }
    if let Some(cr) = profile.current_ratio {
        out.record("Current Ratio > 1", cr > 1.0);
    }
    if nonzero(profile.shares_outstanding).is_some() {
        match profile.repurchase_of_stock {
            Some(buyback) => out.record("Buybacks (no dilution)", buyback < 0.0),
            // Shares known but no buyback line: scored as a fail, not skipped.
            None => out.record("Buybacks (no dilution)", false),
        }
    }

    // Efficiency
    if let Some(gm) = profile.gross_margin {
        out.record("Gross Margin > 30%", gm > 0.30);
    }
    if let Some(turnover) = safe_div(profile.total_revenue, profile.total_assets) {
        out.record("Asset Turnover > 0.5", turnover > 0.5);
    }

    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AltmanZone {
    Safe,
    Grey,
    Distress,
}

impl AltmanZone {
    pub fn from_z(z: f64) -> Self {
        if z > 2.99 {
            AltmanZone::Safe
        } else if z > 1.81 {
            AltmanZone::Grey
        } else {
            AltmanZone::Distress
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AltmanZone::Safe => "Safe zone",
            AltmanZone::Grey => "Grey zone",
            AltmanZone::Distress => "Distress zone",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AltmanZ {
    pub x1: f64,
    pub x2: f64,
    pub x3: f64,
    pub x4: f64,
    pub x5: f64,
    /// Rounded to 2 decimals.
    pub z_score: f64,
    pub zone: AltmanZone,
    /// Sub-terms that defaulted to 0 (WC, RE, EBIT, Sales, MVE); sorted.
    pub estimated_terms: Vec<String>,
}

fn is_financial(profile: &CompanyProfile) -> bool {
    let sector = profile.sector.as_deref().unwrap_or("").to_lowercase();
    let industry = profile.industry.as_deref().unwrap_or("").to_lowercase();
    sector.contains("financial")
        || ["bank", "insurance", "capital markets"]
            .iter()
            .any(|k| industry.contains(k))
}

/// Classic Altman Z for public manufacturers.
pub fn altman_z_score(profile: &CompanyProfile) -> Result<AltmanZ, Unavailable> {
    if is_financial(profile) {
        return Err(Unavailable::new("not applicable to the financial sector"));
    }

    let latest = profile.annual_financials.first();
    let from_latest = |f: fn(&FinancialPeriod) -> Option<f64>| latest.and_then(f);
    let mut estimated: Vec<&str> = Vec::new();

    let total_assets = nonzero(profile.total_assets)
        .or_else(|| from_latest(|p| p.total_assets))
        .filter(|ta| *ta > 0.0)
        .ok_or_else(|| Unavailable::new("total assets unavailable"))?;

    let current_assets = nonzero(profile.total_current_assets).or_else(|| from_latest(|p| p.current_assets));
    let current_liabilities =
        nonzero(profile.total_current_liabilities).or_else(|| from_latest(|p| p.current_liabilities));
    if current_assets.is_none() || current_liabilities.is_none() {
        estimated.push("WC");
    }
    let working_capital = current_assets.unwrap_or(0.0) - current_liabilities.unwrap_or(0.0);

    let retained_earnings = nonzero(profile.retained_earnings)
        .or_else(|| nonzero(from_latest(|p| p.retained_earnings)))
        .unwrap_or(0.0);
    if retained_earnings == 0.0 {
        estimated.push("RE");
    }

    let ebit = nonzero(profile.ebit)
        .or_else(|| nonzero(from_latest(|p| p.ebit)))
        .or_else(|| nonzero(profile.ebitda))
        .unwrap_or(0.0);
    if ebit == 0.0 {
        estimated.push("EBIT");
    }

    let revenue = nonzero(profile.total_revenue)
        .or_else(|| nonzero(from_latest(|p| p.total_revenue)))
        .unwrap_or(0.0);
    if revenue == 0.0 {
        estimated.push("Sales");
    }

    let market_value = profile.market_value_of_equity().unwrap_or(0.0);
    if market_value == 0.0 {
        estimated.push("MVE");
    }

    let total_liabilities = nonzero(profile.total_liabilities)
        .or_else(|| from_latest(|p| p.total_liabilities))
        .filter(|tl| *tl > 0.0)
        .or_else(|| {
            from_latest(|p| p.stockholder_equity)
                .or(profile.stockholder_equity)
                .map(|equity| total_assets - equity)
        })
        .filter(|tl| *tl > 0.0)
        .ok_or_else(|| Unavailable::new("total liabilities unavailable"))?;

    let x1 = working_capital / total_assets;
    let x2 = retained_earnings / total_assets;
    let x3 = ebit / total_assets;
    let x4 = market_value / total_liabilities;
    let x5 = revenue / total_assets;
    let z = 1.2 * x1 + 1.4 * x2 + 3.3 * x3 + 0.6 * x4 + 1.0 * x5;

    estimated.sort_unstable();
    estimated.dedup();
    if !estimated.is_empty() {
        tracing::debug!("Altman Z for {} estimated without {:?}", profile.symbol, estimated);
    }

    Ok(AltmanZ {
        x1,
        x2,
        x3,
        x4,
        x5,
        z_score: round_dp(z, 2),
        zone: AltmanZone::from_z(z),
        estimated_terms: estimated.into_iter().map(str::to_string).collect(),
    })
}

/// √(22.5 · EPS · BVPS), only for strictly positive inputs.
pub fn graham_number(eps: Option<f64>, book_value_per_share: Option<f64>) -> Result<f64, Unavailable> {
    match (eps, book_value_per_share) {
        (Some(e), Some(b)) if e > 0.0 && b > 0.0 => Ok((22.5 * e * b).sqrt()),
        _ => Err(Unavailable::new("EPS and book value per share must both be positive")),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EarningsQualityBand {
    Excellent,
    Good,
    Mixed,
    Weak,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsQuality {
    /// OCF / |net income|, 2 decimals.
    pub ratio: f64,
    pub band: EarningsQualityBand,
}

pub fn earnings_quality(operating_cash_flow: Option<f64>, net_income: Option<f64>) -> Result<EarningsQuality, Unavailable> {
    let (Some(ocf), Some(ni)) = (operating_cash_flow, net_income) else {
        return Err(Unavailable::new("operating cash flow or net income missing"));
    };
    if ni == 0.0 {
        return Err(Unavailable::new("net income is zero"));
    }
    let ratio = ocf / ni.abs();
    let band = match ratio {
        r if r >= 1.1 => EarningsQualityBand::Excellent,
        r if r >= 0.8 => EarningsQualityBand::Good,
        r if r >= 0.5 => EarningsQualityBand::Mixed,
        _ => EarningsQualityBand::Weak,
    };
    Ok(EarningsQuality {
        ratio: round_dp(ratio, 2),
        band,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueTrap {
    pub is_trap: bool,
    pub reasons: Vec<String>,
}

/// Cheap on P/E (< 10) while the business shows a reason to be cheap.
pub fn detect_value_trap(metrics: &MetricSet, trailing_eps: Option<f64>) -> ValueTrap {
    let mut reasons = Vec::new();
    if let Some(pe) = nonzero(metrics.value(MetricKey::Pe)).filter(|pe| *pe < 10.0) {
        if metrics.value(MetricKey::RevenueGrowth).is_some_and(|g| g < -0.05) {
            reasons.push("Declining revenue (YoY)".to_string());
        }
        if metrics.value(MetricKey::DebtToEquity).is_some_and(|de| de > 2.0) {
            reasons.push("High leverage (D/E > 2)".to_string());
        }
        if trailing_eps.is_some_and(|eps| eps <= 0.0) {
            reasons.push("Negative or zero EPS".to_string());
        }
        if !reasons.is_empty() {
            tracing::debug!("Value trap flags at P/E {:.1}: {:?}", pe, reasons);
        }
    }
    ValueTrap {
        is_trap: !reasons.is_empty(),
        reasons,
    }
}

/// NOPAT / invested capital with a 21% tax proxy.
pub fn roic(profile: &CompanyProfile) -> Result<f64, Unavailable> {
    let ebit = profile
        .ebit
        .or_else(|| profile.ebitda.map(|e| e - profile.depreciation_and_amortization.unwrap_or(0.0)))
        .ok_or_else(|| Unavailable::new("EBIT unavailable"))?;
    let invested = profile.total_debt.unwrap_or(0.0) + profile.stockholder_equity.unwrap_or(0.0);
    if invested == 0.0 {
        return Err(Unavailable::new("invested capital is zero"));
    }
    Ok(ebit * US_TAX_KEEP / invested)
}
