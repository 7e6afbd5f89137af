//! Per-metric scoring, category rollup and the final verdict.

use analysis_core::{ComparisonRule, MetricKey, MetricSet, ScoringPolicy};
use serde::{Deserialize, Serialize};

pub const CATEGORIES: [(&str, &[MetricKey]); 4] = [
    (
        "Valuation",
        &[MetricKey::Pe, MetricKey::Pb, MetricKey::Ps, MetricKey::Peg, MetricKey::EvEbitda],
    ),
    (
        "Quality",
        &[
            MetricKey::Roe,
            MetricKey::Roa,
            MetricKey::OperatingMargin,
            MetricKey::ProfitMargin,
            MetricKey::GrossMargin,
        ],
    ),
    ("Growth", &[MetricKey::RevenueGrowth, MetricKey::EarningsGrowth]),
    (
        "Financial Health",
        &[
            MetricKey::CurrentRatio,
            MetricKey::QuickRatio,
            MetricKey::DebtToEquity,
            MetricKey::FcfYield,
        ],
    ),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricScore {
    pub key: MetricKey,
    pub value: Option<f64>,
    /// 0..10
    pub score: f64,
    pub weight: f64,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub name: String,
    /// 0..100
    pub score: f64,
    pub metrics: Vec<MetricScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scorecard {
    /// 0..100, unweighted mean of the categories.
    pub overall: f64,
    pub categories: Vec<CategoryScore>,
}

impl Scorecard {
    pub fn category(&self, name: &str) -> Option<&CategoryScore> {
        self.categories.iter().find(|c| c.name == name)
    }
}

/// 0..10 score for one value under its comparison rule.
pub fn metric_score(value: Option<f64>, rule: ComparisonRule, policy: &ScoringPolicy) -> f64 {
    let Some(v) = value else {
        return policy.missing_metric_score;
    };
    match rule {
        ComparisonRule::LowerIsBetter(t) => {
            if v <= t * 0.7 {
                10.0
            } else if v <= t {
                8.0
            } else if v <= t * 1.5 {
                5.0
            } else {
                2.0
            }
        }
        ComparisonRule::HigherIsBetter(t) => {
            if v >= t * 1.5 {
                10.0
            } else if v >= t {
                8.0
            } else if v >= t * 0.5 {
                5.0
            } else {
                2.0
            }
        }
        ComparisonRule::Unscored => policy.unthresholded_score,
    }
}

/// Roll the metric set into the four fixed categories.
///
/// Keys absent from the set, or carrying zero weight, are not scorable; a
/// present key with no value gets the missing-metric score.
pub fn build_scorecard(metrics: &MetricSet, policy: &ScoringPolicy) -> Scorecard {
    let categories: Vec<CategoryScore> = CATEGORIES
        .iter()
        .map(|(name, keys)| {
            let scored: Vec<MetricScore> = keys
                .iter()
                .filter_map(|k| metrics.get(*k))
                .filter(|m| m.weight > 0.0)
                .map(|m| MetricScore {
                    key: m.key,
                    value: m.value,
                    score: metric_score(m.value, m.rule, policy),
                    weight: m.weight,
                    source: m.source.clone(),
                })
                .collect();

            let total_weight: f64 = scored.iter().map(|m| m.weight).sum();
            let score = if scored.is_empty() || total_weight <= 0.0 {
                policy.empty_category_score
            } else {
                scored.iter().map(|m| m.score * m.weight).sum::<f64>() / total_weight * 10.0
            };

            CategoryScore {
                name: name.to_string(),
                score,
                metrics: scored,
            }
        })
        .collect();

    let overall = categories.iter().map(|c| c.score).sum::<f64>() / categories.len() as f64;
    tracing::debug!("Scorecard overall {:.1}", overall);

    Scorecard { overall, categories }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerdictLabel {
    StrongBuy,
    Buy,
    Hold,
    Caution,
    Avoid,
}

impl VerdictLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictLabel::StrongBuy => "STRONG BUY",
            VerdictLabel::Buy => "BUY",
            VerdictLabel::Hold => "HOLD",
            VerdictLabel::Caution => "CAUTION",
            VerdictLabel::Avoid => "AVOID",
        }
    }

    /// Display color token.
    pub fn color(&self) -> &'static str {
        match self {
            VerdictLabel::StrongBuy => "#00ff88",
            VerdictLabel::Buy => "#88ff00",
            VerdictLabel::Hold => "#ffaa00",
            VerdictLabel::Caution => "#ff8800",
            VerdictLabel::Avoid => "#ff4444",
        }
    }

    pub fn from_score(score: f64, policy: &ScoringPolicy) -> Self {
        if score >= policy.strong_buy_at {
            VerdictLabel::StrongBuy
        } else if score >= policy.buy_at {
            VerdictLabel::Buy
        } else if score >= policy.hold_at {
            VerdictLabel::Hold
        } else if score >= policy.caution_at {
            VerdictLabel::Caution
        } else {
            VerdictLabel::Avoid
        }
    }
}

/// Signals that may adjust or annotate the base verdict.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerdictInputs {
    pub dcf_mos: Option<f64>,
    pub analyst_mos: Option<f64>,
    pub insider_score: f64,
    pub implied_growth: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub label: VerdictLabel,
    pub color: String,
    /// Ordered as the rules fire.
    pub warnings: Vec<String>,
}

pub fn decide_verdict(overall: f64, inputs: &VerdictInputs, policy: &ScoringPolicy) -> Verdict {
    let mut label = VerdictLabel::from_score(overall, policy);
    let mut warnings = Vec::new();

    if let Some(mos) = inputs.dcf_mos {
        if mos >= policy.mos_upgrade {
            if matches!(label, VerdictLabel::Hold | VerdictLabel::Caution) {
                label = VerdictLabel::Buy;
            }
        } else if mos < policy.mos_downgrade && matches!(label, VerdictLabel::StrongBuy | VerdictLabel::Buy) {
            label = VerdictLabel::Hold;
            warnings.push(format!(
                "DCF model shows overvaluation ({:.0}% MOS)",
                policy.mos_downgrade * 100.0
            ));
        }
    }

    if let (Some(analyst), Some(dcf)) = (inputs.analyst_mos, inputs.dcf_mos) {
        if analyst > policy.analyst_mismatch_mos && dcf < policy.dcf_mismatch_mos {
            warnings.push(format!(
                "MISMATCH WARNING: analysts see +{:.0}% upside but the DCF model shows {:.0}% overvaluation",
                policy.analyst_mismatch_mos * 100.0,
                policy.dcf_mismatch_mos * 100.0
            ));
            warnings.push("   -> The market may be pricing in more growth than the conservative DCF assumes".to_string());
        }
    }

    if inputs.insider_score > policy.insider_bullish_note {
        warnings.push(format!(
            "Strong insider buying signal (+{:.0}) supports the BUY thesis",
            inputs.insider_score
        ));
    } else if inputs.insider_score < policy.insider_bearish_note {
        warnings.push(format!("Negative insider selling signal ({:.0})", inputs.insider_score));
    }

    if let Some(g) = inputs.implied_growth {
        if g > policy.implied_growth_high {
            warnings.push(format!(
                "Market implies very aggressive FCF growth ({:.0}% per year), high expectations",
                g * 100.0
            ));
        } else if g < policy.implied_growth_low {
            warnings.push(format!(
                "Market implies FCF decline ({:.0}%), possibly an undervalued opportunity",
                g * 100.0
            ));
        }
    }

    Verdict {
        label,
        color: label.color().to_string(),
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_metric_score_bands() {
        let p = ScoringPolicy::default();
        let lower = ComparisonRule::LowerIsBetter(20.0);
        assert_eq!(metric_score(Some(14.0), lower, &p), 10.0);
        assert_eq!(metric_score(Some(20.0), lower, &p), 8.0);
        assert_eq!(metric_score(Some(30.0), lower, &p), 5.0);
        assert_eq!(metric_score(Some(31.0), lower, &p), 2.0);

        let higher = ComparisonRule::HigherIsBetter(0.10);
        assert_eq!(metric_score(Some(0.15), higher, &p), 10.0);
        assert_eq!(metric_score(Some(0.10), higher, &p), 8.0);
        assert_eq!(metric_score(Some(0.05), higher, &p), 5.0);
        assert_eq!(metric_score(Some(0.01), higher, &p), 2.0);

        assert_eq!(metric_score(None, higher, &p), p.missing_metric_score);
        assert_eq!(metric_score(Some(1.0), ComparisonRule::Unscored, &p), p.unthresholded_score);
    }

    #[test]
    fn test_policy_constants() {
        let p = ScoringPolicy::default();
        assert_eq!(p.missing_metric_score, 3.0);
        assert_eq!(p.empty_category_score, 50.0);
    }

    #[test]
    fn test_empty_set_defaults_every_category() {
        let card = build_scorecard(&MetricSet::new(), &ScoringPolicy::default());
        assert_eq!(card.categories.len(), 4);
        assert!(card.categories.iter().all(|c| c.score == 50.0));
        assert_eq!(card.overall, 50.0);
    }

    #[test]
    fn test_category_weighted_mean() {
        let mut m = MetricSet::new();
        // Growth: revenue 0.20 (10 pts, w2), earnings missing (3 pts, w2)
        m.set(MetricKey::RevenueGrowth, Some(0.20), Some("Yahoo Finance"));
        m.set(MetricKey::EarningsGrowth, None, None);
        let card = build_scorecard(&m, &ScoringPolicy::default());
        let growth = card.category("Growth").unwrap();
        assert_relative_eq!(growth.score, 65.0);
        assert_eq!(growth.metrics.len(), 2);
        assert_relative_eq!(card.overall, (50.0 * 3.0 + 65.0) / 4.0);
    }

    #[test]
    fn test_verdict_thresholds() {
        let p = ScoringPolicy::default();
        let none = VerdictInputs::default();
        assert_eq!(decide_verdict(85.0, &none, &p).label, VerdictLabel::StrongBuy);
        assert_eq!(decide_verdict(60.0, &none, &p).label, VerdictLabel::Buy);
        assert_eq!(decide_verdict(45.0, &none, &p).label, VerdictLabel::Hold);
        assert_eq!(decide_verdict(30.0, &none, &p).label, VerdictLabel::Caution);
        let avoid = decide_verdict(29.9, &none, &p);
        assert_eq!(avoid.label, VerdictLabel::Avoid);
        assert_eq!(avoid.color, "#ff4444");
        assert!(avoid.warnings.is_empty());
    }

    #[test]
    fn test_mos_adjustments() {
        let p = ScoringPolicy::default();
        let cheap = VerdictInputs {
            dcf_mos: Some(0.25),
            ..Default::default()
        };
        assert_eq!(decide_verdict(35.0, &cheap, &p).label, VerdictLabel::Buy);
        // Avoid is not upgraded
        assert_eq!(decide_verdict(10.0, &cheap, &p).label, VerdictLabel::Avoid);

        let rich = VerdictInputs {
            dcf_mos: Some(-0.2),
            ..Default::default()
        };
        let v = decide_verdict(90.0, &rich, &p);
        assert_eq!(v.label, VerdictLabel::Hold);
        assert_eq!(v.color, "#ffaa00");
        assert_eq!(v.warnings.len(), 1);
    }

    #[test]
    fn test_mismatch_warns_without_changing_label() {
        let p = ScoringPolicy::default();
        let inputs = VerdictInputs {
            dcf_mos: Some(-0.12),
            analyst_mos: Some(0.2),
            ..Default::default()
        };
        let v = decide_verdict(50.0, &inputs, &p);
        assert_eq!(v.label, VerdictLabel::Hold);
        assert_eq!(v.warnings.len(), 2);
        assert!(v.warnings[0].starts_with("MISMATCH"));
    }

    #[test]
    fn test_insider_and_implied_growth_notes() {
        let p = ScoringPolicy::default();
        let inputs = VerdictInputs {
            insider_score: 60.0,
            implied_growth: Some(0.3),
            ..Default::default()
        };
        let v = decide_verdict(50.0, &inputs, &p);
        assert_eq!(v.warnings.len(), 2);
        assert!(v.warnings[0].contains("+60"));
        assert!(v.warnings[1].contains("30%"));

        let bearish = VerdictInputs {
            insider_score: -40.0,
            implied_growth: Some(-0.05),
            ..Default::default()
        };
        let v = decide_verdict(50.0, &bearish, &p);
        assert!(v.warnings[0].contains("(-40)"));
        assert!(v.warnings[1].contains("decline"));
    }
}
