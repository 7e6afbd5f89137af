use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Canonical metric identifiers shared by every provider adapter and scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    Pe,
    ForwardPe,
    Peg,
    Pb,
    Ps,
    EvEbitda,
    Roe,
    Roa,
    Roic,
    OperatingMargin,
    ProfitMargin,
    GrossMargin,
    RevenueGrowth,
    EarningsGrowth,
    CurrentRatio,
    QuickRatio,
    DebtToEquity,
    FcfYield,
    DividendYield,
    PayoutRatio,
    ShortInterest,
    MarketCap,
    Beta,
    TrailingEps,
    BookValuePerShare,
    Price,
    AnalystTargetMean,
    AnalystTargetMedian,
    AnalystTargetHigh,
    AnalystTargetLow,
}

impl MetricKey {
    /// Metrics fusion tries to fill from fallback providers.
    pub const WANTED: [MetricKey; 15] = [
        MetricKey::Pe,
        MetricKey::Peg,
        MetricKey::Pb,
        MetricKey::Ps,
        MetricKey::EvEbitda,
        MetricKey::DebtToEquity,
        MetricKey::OperatingMargin,
        MetricKey::ProfitMargin,
        MetricKey::GrossMargin,
        MetricKey::Roe,
        MetricKey::CurrentRatio,
        MetricKey::QuickRatio,
        MetricKey::FcfYield,
        MetricKey::RevenueGrowth,
        MetricKey::EarningsGrowth,
    ];

    /// Ratios where a non-positive value means "no usable data".
    pub fn is_ratio(&self) -> bool {
        matches!(
            self,
            MetricKey::Pe
                | MetricKey::Peg
                | MetricKey::Pb
                | MetricKey::Ps
                | MetricKey::EvEbitda
                | MetricKey::CurrentRatio
                | MetricKey::QuickRatio
                | MetricKey::DebtToEquity
        )
    }

    /// Threshold rule and weight used by the scorecard.
    pub fn rule(&self) -> (ComparisonRule, f64) {
        use ComparisonRule::*;
        match self {
            MetricKey::Pe => (LowerIsBetter(25.0), 1.5),
            MetricKey::Pb => (LowerIsBetter(3.0), 1.0),
            MetricKey::Ps => (LowerIsBetter(2.0), 1.0),
            MetricKey::Peg => (LowerIsBetter(1.5), 1.5),
            MetricKey::EvEbitda => (LowerIsBetter(15.0), 1.0),
            MetricKey::Roe => (HigherIsBetter(0.15), 2.0),
            MetricKey::Roa => (HigherIsBetter(0.05), 1.0),
            MetricKey::OperatingMargin => (HigherIsBetter(0.15), 1.5),
            MetricKey::ProfitMargin => (HigherIsBetter(0.10), 1.5),
            MetricKey::GrossMargin => (HigherIsBetter(0.30), 1.0),
            MetricKey::RevenueGrowth => (HigherIsBetter(0.10), 2.0),
            MetricKey::EarningsGrowth => (HigherIsBetter(0.10), 2.0),
            MetricKey::CurrentRatio => (HigherIsBetter(1.5), 1.0),
            MetricKey::QuickRatio => (HigherIsBetter(1.0), 0.8),
            MetricKey::DebtToEquity => (LowerIsBetter(1.0), 1.5),
            MetricKey::FcfYield => (HigherIsBetter(0.05), 2.0),
            MetricKey::DividendYield => (HigherIsBetter(0.02), 0.5),
            MetricKey::PayoutRatio => (LowerIsBetter(0.70), 0.5),
            _ => (Unscored, 0.0),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKey::Pe => "pe",
            MetricKey::ForwardPe => "forward_pe",
            MetricKey::Peg => "peg",
            MetricKey::Pb => "pb",
            MetricKey::Ps => "ps",
            MetricKey::EvEbitda => "ev_ebitda",
            MetricKey::Roe => "roe",
            MetricKey::Roa => "roa",
            MetricKey::Roic => "roic",
            MetricKey::OperatingMargin => "operating_margin",
            MetricKey::ProfitMargin => "profit_margin",
            MetricKey::GrossMargin => "gross_margin",
            MetricKey::RevenueGrowth => "revenue_growth",
            MetricKey::EarningsGrowth => "earnings_growth",
            MetricKey::CurrentRatio => "current_ratio",
            MetricKey::QuickRatio => "quick_ratio",
            MetricKey::DebtToEquity => "debt_to_equity",
            MetricKey::FcfYield => "fcf_yield",
            MetricKey::DividendYield => "dividend_yield",
            MetricKey::PayoutRatio => "payout_ratio",
            MetricKey::ShortInterest => "short_interest",
            MetricKey::MarketCap => "market_cap",
            MetricKey::Beta => "beta",
            MetricKey::TrailingEps => "trailing_eps",
            MetricKey::BookValuePerShare => "book_value_per_share",
            MetricKey::Price => "price",
            MetricKey::AnalystTargetMean => "analyst_target_mean",
            MetricKey::AnalystTargetMedian => "analyst_target_median",
            MetricKey::AnalystTargetHigh => "analyst_target_high",
            MetricKey::AnalystTargetLow => "analyst_target_low",
        }
    }
}

/// Percent heuristic: values in (1.5, 100] by magnitude are taken as percent.
pub fn normalize_pct(v: f64) -> f64 {
    if v.abs() > 1.5 && v.abs() <= 100.0 {
        v / 100.0
    } else {
        v
    }
}

/// Debt/equity reported in the x100 convention (10..2000) back to a ratio.
pub fn normalize_debt_to_equity(v: f64) -> f64 {
    if v > 10.0 && v < 2000.0 {
        crate::stats::round_dp(v / 100.0, 4)
    } else {
        v
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ComparisonRule {
    LowerIsBetter(f64),
    HigherIsBetter(f64),
    Unscored,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalMetric {
    pub key: MetricKey,
    pub value: Option<f64>,
    /// Which provider supplied the value.
    pub source: Option<String>,
    pub weight: f64,
    pub rule: ComparisonRule,
}

/// Bag of canonical metrics, at most one entry per key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricSet {
    entries: BTreeMap<MetricKey, CanonicalMetric>,
}

impl MetricSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: MetricKey) -> Option<&CanonicalMetric> {
        self.entries.get(&key)
    }

    pub fn value(&self, key: MetricKey) -> Option<f64> {
        self.entries.get(&key).and_then(|m| m.value)
    }

    pub fn source(&self, key: MetricKey) -> Option<&str> {
        self.entries.get(&key).and_then(|m| m.source.as_deref())
    }

    /// Insert or replace a value. Non-finite values are stored as absent.
    pub fn set(&mut self, key: MetricKey, value: Option<f64>, source: Option<&str>) {
        let (rule, weight) = key.rule();
        let value = value.filter(|v| v.is_finite());
        self.entries.insert(
            key,
            CanonicalMetric {
                key,
                value,
                source: source.map(str::to_string),
                weight,
                rule,
            },
        );
    }

    /// Absent, non-finite, or a non-positive ratio.
    pub fn is_missing(&self, key: MetricKey) -> bool {
        match self.value(key) {
            None => true,
            Some(v) if !v.is_finite() => true,
            Some(v) if key.is_ratio() && v <= 0.0 => true,
            _ => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &CanonicalMetric> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_non_positive_counts_as_missing() {
        let mut set = MetricSet::new();
        set.set(MetricKey::Pe, Some(-3.0), Some("Yahoo"));
        set.set(MetricKey::Roe, Some(-0.1), Some("Yahoo"));
        assert!(set.is_missing(MetricKey::Pe));
        assert!(!set.is_missing(MetricKey::Roe));
        assert!(set.is_missing(MetricKey::Pb));
    }

    #[test]
    fn test_non_finite_stored_as_absent() {
        let mut set = MetricSet::new();
        set.set(MetricKey::Roe, Some(f64::NAN), None);
        assert_eq!(set.value(MetricKey::Roe), None);
        assert!(set.get(MetricKey::Roe).is_some());
    }

    #[test]
    fn test_normalize_pct_range() {
        assert_eq!(normalize_pct(15.0), 0.15);
        assert_eq!(normalize_pct(-20.0), -0.2);
        assert_eq!(normalize_pct(100.0), 1.0);
        assert_eq!(normalize_pct(0.25), 0.25);
        assert_eq!(normalize_pct(1.5), 1.5);
        assert_eq!(normalize_pct(150.0), 150.0);
    }

    #[test]
    fn test_normalize_debt_to_equity() {
        assert_eq!(normalize_debt_to_equity(150.0), 1.5);
        assert_eq!(normalize_debt_to_equity(1.5), 1.5);
        assert_eq!(normalize_debt_to_equity(2500.0), 2500.0);
        assert_eq!(normalize_debt_to_equity(normalize_debt_to_equity(150.0)), 1.5);
    }

    #[test]
    fn test_rule_lookup() {
        assert_eq!(MetricKey::Pe.rule(), (ComparisonRule::LowerIsBetter(25.0), 1.5));
        assert_eq!(MetricKey::Beta.rule(), (ComparisonRule::Unscored, 0.0));
        assert_eq!(MetricKey::WANTED.len(), 15);
    }
}
