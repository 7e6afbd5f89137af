use std::collections::HashSet;

use analysis_core::{Direction, InsiderSignal, SignalStrength, TransactionRecord};
use chrono::{Duration, NaiveDate};

const ROLE_WEIGHTS: [(&str, f64); 10] = [
    ("ceo", 3.0),
    ("chief executive officer", 3.0),
    ("cfo", 2.5),
    ("chief financial officer", 2.5),
    ("president", 2.0),
    ("coo", 2.0),
    ("director", 1.5),
    ("vice president", 1.2),
    ("vp", 1.2),
    ("officer", 1.0),
];

const NOISE_MARKERS: [&str; 4] = ["tax", "withhold", "10b5", "automatic"];

const CLUSTER_WINDOW_DAYS: i64 = 30;
const CLUSTER_MIN_OWNERS: usize = 3;
const CLUSTER_ADJUSTMENT: f64 = 12.0;
const FULL_CONFIDENCE_COUNT: f64 = 12.0;

/// Largest weight among role substrings found in the title; 1.0 otherwise.
pub fn role_weight(role: Option<&str>) -> f64 {
    let title = role.unwrap_or("").split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    ROLE_WEIGHTS
        .iter()
        .filter(|(needle, _)| title.contains(needle))
        .map(|(_, w)| *w)
        .fold(1.0, f64::max)
}

/// At least `CLUSTER_MIN_OWNERS` distinct owners trading within any
/// `CLUSTER_WINDOW_DAYS` span.
fn has_cluster(mut trades: Vec<(NaiveDate, String)>) -> bool {
    if trades.len() < CLUSTER_MIN_OWNERS {
        return false;
    }
    trades.sort_by_key(|(d, _)| *d);
    (0..trades.len()).any(|i| {
        let start = trades[i].0;
        let owners: HashSet<&str> = trades[i..]
            .iter()
            .take_while(|(d, _)| (*d - start).num_days() <= CLUSTER_WINDOW_DAYS)
            .map(|(_, o)| o.as_str())
            .collect();
        owners.len() >= CLUSTER_MIN_OWNERS
    })
}

fn is_noise(rec: &TransactionRecord) -> bool {
    let text = rec.transaction_label.as_deref().unwrap_or("").to_lowercase();
    NOISE_MARKERS.iter().any(|m| text.contains(m))
}

/// Open-market side of a trade. A Form 4 code, when present, must be P or S;
/// otherwise the normalized direction decides.
fn open_market_side(rec: &TransactionRecord) -> Option<Direction> {
    let code = rec.transaction_code.as_deref().unwrap_or("").trim().to_uppercase();
    if !code.is_empty() {
        return match code.as_str() {
            "P" => Some(Direction::Buy),
            "S" => Some(Direction::Sell),
            _ => None,
        };
    }
    match rec.direction {
        Direction::Other => None,
        side => Some(side),
    }
}

/// Role-weighted insider buy/sell signal over the trailing window ending at `today`.
pub fn compute_insider_signal(records: &[TransactionRecord], today: NaiveDate, window_days: i64) -> InsiderSignal {
    if records.is_empty() {
        return InsiderSignal::neutral("No insider transactions available");
    }

    let cutoff = today - Duration::days(window_days);
    let mut buy_total = 0.0;
    let mut sell_total = 0.0;
    let mut buy_count = 0usize;
    let mut sell_count = 0usize;
    let mut buy_trades: Vec<(NaiveDate, String)> = Vec::new();
    let mut sell_trades: Vec<(NaiveDate, String)> = Vec::new();

    for rec in records.iter().filter(|r| r.date >= cutoff && !is_noise(r)) {
        let Some(side) = open_market_side(rec) else {
            continue;
        };
        let weighted = rec.effective_value().unwrap_or(0.0).abs() * role_weight(rec.owner_role.as_deref());
        let owner = rec.owner_name.as_deref().unwrap_or("").trim().to_uppercase();

        let (total, count, trades) = match side {
            Direction::Buy => (&mut buy_total, &mut buy_count, &mut buy_trades),
            _ => (&mut sell_total, &mut sell_count, &mut sell_trades),
        };
        *total += weighted;
        *count += 1;
        if !owner.is_empty() {
            trades.push((rec.date, owner));
        }
    }

    let cluster_buying = has_cluster(buy_trades);
    let cluster_selling = has_cluster(sell_trades);

    let mut score = 100.0 * (buy_total - sell_total) / (buy_total + sell_total).max(1.0);
    if cluster_buying {
        score += CLUSTER_ADJUSTMENT;
    }
    if cluster_selling {
        score -= CLUSTER_ADJUSTMENT;
    }
    let score = score.clamp(-100.0, 100.0);

    let mut insights = Vec::new();
    if buy_count > 0 {
        insights.push(format!("{} insider purchases in the last {} days", buy_count, window_days));
    }
    if sell_count > 0 {
        insights.push(format!("{} insider sales in the last {} days", sell_count, window_days));
    }
    if cluster_buying {
        insights.push("Cluster buying: several insiders bought in the same period".to_string());
    }
    if cluster_selling {
        insights.push("Cluster selling: several insiders sold in the same period".to_string());
    }
    if score > 30.0 {
        insights.push(format!("Strong bullish insider signal ({:.0}/100)", score));
    } else if score < -30.0 {
        insights.push(format!("Strong bearish insider signal ({:.0}/100)", score));
    }
    if insights.is_empty() {
        insights.push("No significant insider activity".to_string());
    }

    tracing::debug!(
        "Insider signal {:.1}: {} buys, {} sells, clusters buy={} sell={}",
        score, buy_count, sell_count, cluster_buying, cluster_selling
    );

    InsiderSignal {
        score,
        label: SignalStrength::from_score(score),
        confidence: ((buy_count + sell_count) as f64 / FULL_CONFIDENCE_COUNT).min(1.0),
        buy_count,
        sell_count,
        cluster_buying,
        cluster_selling,
        insights,
    }
}
