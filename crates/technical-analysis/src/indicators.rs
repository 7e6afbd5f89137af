use analysis_core::stats::{mean, std_sample};
use serde::{Deserialize, Serialize};

/// Simple Moving Average
pub fn sma(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period {
        return vec![];
    }

    data.windows(period).map(|w| w.iter().sum::<f64>() / period as f64).collect()
}

/// Mean of the last `period` values.
pub fn last_sma(data: &[f64], period: usize) -> Option<f64> {
    if period == 0 || data.len() < period {
        return None;
    }
    sma(&data[data.len() - period..], period).last().copied()
}

/// Recursive exponential average seeded with the first value,
/// `alpha = 2 / (span + 1)`. One output per input.
pub fn ewm(data: &[f64], span: usize) -> Vec<f64> {
    let Some(&first) = data.first() else {
        return vec![];
    };
    let alpha = 2.0 / (span as f64 + 1.0);

    let mut result = Vec::with_capacity(data.len());
    result.push(first);
    for value in &data[1..] {
        let prev = result[result.len() - 1];
        result.push(alpha * value + (1.0 - alpha) * prev);
    }
    result
}

/// Latest RSI using simple rolling means of gains and losses.
///
/// `None` with fewer than `period + 1` values or when the window had no
/// losses.
pub fn rsi(data: &[f64], period: usize) -> Option<f64> {
    if period == 0 || data.len() < period + 1 {
        return None;
    }

    let window = &data[data.len() - period - 1..];
    let (gain, loss) = window.windows(2).fold((0.0, 0.0), |(g, l), w| {
        let change = w[1] - w[0];
        if change > 0.0 {
            (g + change, l)
        } else {
            (g, l - change)
        }
    });

    let avg_gain = gain / period as f64;
    let avg_loss = loss / period as f64;
    if avg_loss == 0.0 {
        return None;
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MacdTrend {
    Bullish,
    Bearish,
    Neutral,
}

impl MacdTrend {
    pub fn label(&self) -> &'static str {
        match self {
            MacdTrend::Bullish => "Bullish crossover",
            MacdTrend::Bearish => "Bearish crossover",
            MacdTrend::Neutral => "Neutral",
        }
    }
}

/// MACD (Moving Average Convergence Divergence), latest reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdReading {
    pub macd: f64,
    pub signal: f64,
    pub trend: MacdTrend,
}

pub const MACD_MIN_CLOSES: usize = 35;

pub fn macd(data: &[f64], fast: usize, slow: usize, signal: usize) -> Option<MacdReading> {
    if data.len() < MACD_MIN_CLOSES || fast == 0 || slow <= fast || signal == 0 {
        return None;
    }

    let ema_fast = ewm(data, fast);
    let ema_slow = ewm(data, slow);
    let line: Vec<f64> = ema_fast.iter().zip(&ema_slow).map(|(f, s)| f - s).collect();
    let signal_line = ewm(&line, signal);

    let m = *line.last()?;
    let s = *signal_line.last()?;
    let trend = if m > s {
        MacdTrend::Bullish
    } else if m < s {
        MacdTrend::Bearish
    } else {
        MacdTrend::Neutral
    };

    Some(MacdReading { macd: m, signal: s, trend })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Bands at `k` sample standard deviations around the `period` mean.
pub fn bollinger(data: &[f64], period: usize, k: f64) -> Option<BollingerBands> {
    if period < 2 || data.len() < period {
        return None;
    }
    let window = &data[data.len() - period..];
    let middle = mean(window)?;
    let sd = std_sample(window)?;
    Some(BollingerBands {
        upper: middle + k * sd,
        middle,
        lower: middle - k * sd,
    })
}

/// Simple percentage returns between consecutive values.
pub fn pct_returns(data: &[f64]) -> Vec<f64> {
    data.windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .filter(|r| r.is_finite())
        .collect()
}
