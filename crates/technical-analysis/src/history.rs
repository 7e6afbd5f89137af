use analysis_core::{Bar, PriceSeries};
use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Fewer bars than this and a buy-and-hold comparison is meaningless.
const MIN_SIMULATION_BARS: usize = 10;

/// Outcome of buying `initial` worth of the stock at the first close of the
/// window and holding to the last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentSimulation {
    pub initial: f64,
    pub final_value: f64,
    pub stock_return: f64,
    /// Same window on the benchmark; `None` when its history is empty.
    pub benchmark_return: Option<f64>,
    pub benchmark_final_value: Option<f64>,
    pub outperformance: Option<f64>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllTimeHigh {
    pub price: f64,
    pub date: NaiveDate,
    /// Last close relative to the high, `<= 0` unless the data is odd.
    pub from_high: Option<f64>,
}

fn window_return<'a>(mut bars: impl Iterator<Item = &'a Bar>) -> Option<f64> {
    let first = bars.next()?.close;
    let last = bars.last().map_or(first, |b| b.close);
    if first <= 0.0 {
        return None;
    }
    Some(last / first - 1.0)
}

/// Bars from the last `years` years of `series`, measured back from its
/// final bar.
pub fn trailing_years(series: &PriceSeries, years: u32) -> PriceSeries {
    let Some(start) = series
        .last()
        .and_then(|b| b.timestamp.checked_sub_months(Months::new(years.saturating_mul(12))))
    else {
        return PriceSeries::default();
    };
    PriceSeries::new(series.iter().filter(|b| b.timestamp >= start).cloned().collect())
}

/// Buy-and-hold value of `amount` over `series`, next to the same amount in
/// `benchmark`. Benchmark bars outside the stock's first and last date are
/// ignored, so a longer benchmark history can be passed as is.
pub fn investment_simulation(
    series: &PriceSeries,
    benchmark: &PriceSeries,
    amount: f64,
) -> Option<InvestmentSimulation> {
    if series.len() < MIN_SIMULATION_BARS || !amount.is_finite() {
        return None;
    }
    let stock_return = window_return(series.iter())?;
    let start_date = series.iter().next()?.timestamp.date_naive();
    let end_date = series.last()?.timestamp.date_naive();

    let benchmark_return = window_return(benchmark.iter().filter(|b| {
        let day = b.timestamp.date_naive();
        day >= start_date && day <= end_date
    }));
    let benchmark_final_value = benchmark_return.map(|r| amount * (1.0 + r));

    Some(InvestmentSimulation {
        initial: amount,
        final_value: amount * (1.0 + stock_return),
        stock_return,
        benchmark_return,
        benchmark_final_value,
        outperformance: benchmark_return.map(|r| stock_return - r),
        start_date,
        end_date,
    })
}

/// Highest intraday high over the whole series. Bars with a non-finite high
/// fall back to their close.
pub fn all_time_high(series: &PriceSeries) -> Option<AllTimeHigh> {
    let (price, date) = series
        .iter()
        .map(|b| {
            let high = if b.high.is_finite() { b.high } else { b.close };
            (high, b.timestamp.date_naive())
        })
        .filter(|(h, _)| h.is_finite())
        .fold(None, |best: Option<(f64, NaiveDate)>, (h, d)| match best {
            Some((bh, _)) if bh >= h => best,
            _ => Some((h, d)),
        })?;

    let from_high = series
        .last()
        .filter(|_| price > 0.0)
        .map(|b| b.close / price - 1.0);

    Some(AllTimeHigh { price, date, from_high })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone, Utc};

    fn series(closes: &[f64]) -> PriceSeries {
        let start = Utc.with_ymd_and_hms(2021, 3, 1, 0, 0, 0).unwrap();
        PriceSeries::new(
            closes
                .iter()
                .enumerate()
                .map(|(i, &c)| Bar {
                    timestamp: start + Duration::days(i as i64),
                    open: c,
                    high: c * 1.01,
                    low: c * 0.99,
                    close: c,
                    volume: 1.0,
                })
                .collect(),
        )
    }

    fn ramp(from: f64, to: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| from + (to - from) * i as f64 / (n - 1) as f64)
            .collect()
    }

    #[test]
    fn test_simulation_against_benchmark() {
        let stock = series(&ramp(50.0, 100.0, 30));
        let spy = series(&ramp(400.0, 480.0, 30));

        let sim = investment_simulation(&stock, &spy, 100_000.0).unwrap();
        assert_relative_eq!(sim.stock_return, 1.0, epsilon = 1e-12);
        assert_relative_eq!(sim.final_value, 200_000.0, epsilon = 1e-6);
        assert_relative_eq!(sim.benchmark_return.unwrap(), 0.2, epsilon = 1e-12);
        assert_relative_eq!(sim.benchmark_final_value.unwrap(), 120_000.0, epsilon = 1e-6);
        assert_relative_eq!(sim.outperformance.unwrap(), 0.8, epsilon = 1e-12);
        assert_eq!(sim.start_date, NaiveDate::from_ymd_opt(2021, 3, 1).unwrap());
        assert_eq!(sim.end_date, NaiveDate::from_ymd_opt(2021, 3, 30).unwrap());
    }

    #[test]
    fn test_simulation_needs_ten_bars() {
        let spy = series(&ramp(400.0, 480.0, 30));
        assert!(investment_simulation(&series(&ramp(50.0, 60.0, 9)), &spy, 1000.0).is_none());
        assert!(investment_simulation(&series(&ramp(50.0, 60.0, 10)), &spy, 1000.0).is_some());
    }

    #[test]
    fn test_simulation_without_benchmark() {
        let stock = series(&ramp(100.0, 80.0, 12));
        let sim = investment_simulation(&stock, &PriceSeries::default(), 1000.0).unwrap();
        assert_relative_eq!(sim.final_value, 800.0, epsilon = 1e-9);
        assert_eq!(sim.benchmark_return, None);
        assert_eq!(sim.outperformance, None);
    }

    #[test]
    fn test_benchmark_clipped_to_stock_window() {
        // benchmark starts 5 days earlier and runs 5 days longer
        let stock = series(&ramp(10.0, 20.0, 20));
        let start = Utc.with_ymd_and_hms(2021, 2, 24, 0, 0, 0).unwrap();
        let spy = PriceSeries::new(
            (0..30)
                .map(|i| {
                    let close = if (5..25).contains(&i) { 100.0 + (i - 5) as f64 } else { 1.0 };
                    Bar {
                        timestamp: start + Duration::days(i),
                        open: close,
                        high: close,
                        low: close,
                        close,
                        volume: 1.0,
                    }
                })
                .collect(),
        );
        let sim = investment_simulation(&stock, &spy, 1000.0).unwrap();
        assert_relative_eq!(sim.benchmark_return.unwrap(), 0.19, epsilon = 1e-12);
    }

    #[test]
    fn test_trailing_years_window() {
        let start = Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap();
        let long = PriceSeries::new(
            (0..6)
                .map(|i| Bar {
                    timestamp: start.checked_add_months(Months::new(12 * i)).unwrap(),
                    open: 1.0,
                    high: 1.0,
                    low: 1.0,
                    close: 1.0 + i as f64,
                    volume: 1.0,
                })
                .collect(),
        );
        // 2019..=2024, three years back from 2024-01-01 keeps 2021..=2024
        assert_eq!(trailing_years(&long, 3).closes(), vec![3.0, 4.0, 5.0, 6.0]);
        assert!(trailing_years(&PriceSeries::default(), 3).is_empty());
    }

    #[test]
    fn test_all_time_high_uses_highs() {
        let mut closes = ramp(10.0, 40.0, 20);
        closes.extend(ramp(39.0, 30.0, 10));
        let ath = all_time_high(&series(&closes)).unwrap();

        assert_relative_eq!(ath.price, 40.4, epsilon = 1e-9);
        assert_eq!(ath.date, NaiveDate::from_ymd_opt(2021, 3, 20).unwrap());
        assert_relative_eq!(ath.from_high.unwrap(), 30.0 / 40.4 - 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_all_time_high_empty() {
        assert!(all_time_high(&PriceSeries::default()).is_none());
    }
}
