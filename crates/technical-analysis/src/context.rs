use analysis_core::stats::mean;
use analysis_core::PriceSeries;
use serde::{Deserialize, Serialize};

use crate::indicators::{bollinger, last_sma, macd, rsi, BollingerBands, MacdReading};

const MIN_CLOSES: usize = 20;
const TRADING_YEAR: usize = 252;

/// Snapshot of common indicators at the last bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalContext {
    pub current_price: f64,
    pub rsi: Option<f64>,
    pub macd: Option<MacdReading>,
    pub ma50: Option<f64>,
    pub ma200: Option<f64>,
    pub high_52w: f64,
    pub low_52w: f64,
    pub bollinger: Option<BollingerBands>,
    /// price / MA200 - 1
    pub pct_from_ma200: Option<f64>,
    /// mean(last 20 volumes) / mean(last 60) - 1
    pub volume_trend: Option<f64>,
}

fn trailing(data: &[f64], n: usize) -> &[f64] {
    &data[data.len().saturating_sub(n)..]
}

/// `None` when the series has fewer than 20 closes.
pub fn compute_technical_context(series: &PriceSeries) -> Option<TechnicalContext> {
    let closes = series.closes();
    if closes.len() < MIN_CLOSES {
        return None;
    }
    let current_price = *closes.last()?;

    let year = trailing(&closes, TRADING_YEAR);
    let high_52w = year.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let low_52w = year.iter().copied().fold(f64::INFINITY, f64::min);

    let ma200 = last_sma(&closes, 200);
    let pct_from_ma200 = ma200.filter(|m| *m > 0.0).map(|m| current_price / m - 1.0);

    let volumes = series.volumes();
    let volume_trend = if volumes.len() >= 60 {
        match (mean(trailing(&volumes, 20)), mean(trailing(&volumes, 60))) {
            (Some(short), Some(long)) if long != 0.0 => Some(short / long - 1.0),
            _ => None,
        }
    } else {
        None
    };

    Some(TechnicalContext {
        current_price,
        rsi: rsi(&closes, 14),
        macd: macd(&closes, 12, 26, 9),
        ma50: last_sma(&closes, 50),
        ma200,
        high_52w,
        low_52w,
        bollinger: bollinger(&closes, 20, 2.0),
        pct_from_ma200,
        volume_trend,
    })
}
