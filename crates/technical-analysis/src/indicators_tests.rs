#[cfg(test)]
mod tests {
    use super::super::context::*;
    use super::super::indicators::*;
    use super::super::regime::*;
    use analysis_core::{Bar, PriceSeries};
    use chrono::Utc;

    // Helper function to create sample price data
    fn sample_prices() -> Vec<f64> {
        vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08,
            45.89, 46.03, 45.61, 46.28, 46.28, 46.00, 46.03, 46.41, 46.22, 45.64,
        ]
    }

    fn series_from(closes: &[f64], volumes: &[f64]) -> PriceSeries {
        let n = closes.len() as i64;
        let bars = closes
            .iter()
            .zip(volumes)
            .enumerate()
            .map(|(i, (&close, &volume))| Bar {
                timestamp: Utc::now() - chrono::Duration::days(n - i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume,
            })
            .collect();
        PriceSeries::new(bars)
    }

    fn compounding(start: f64, returns: impl Iterator<Item = f64>) -> Vec<f64> {
        let mut price = start;
        let mut out = vec![price];
        for r in returns {
            price *= 1.0 + r;
            out.push(price);
        }
        out
    }

    #[test]
    fn test_sma_basic() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = sma(&data, 3);

        assert_eq!(result.len(), 3);
        assert!((result[0] - 2.0).abs() < 0.001);
        assert!((result[2] - 4.0).abs() < 0.001);
        assert_eq!(last_sma(&data, 5), Some(3.0));
        assert_eq!(last_sma(&data, 6), None);
    }

    #[test]
    fn test_ewm_seeded_with_first_value() {
        let result = ewm(&[1.0, 2.0, 3.0], 3);
        assert_eq!(result, vec![1.0, 1.5, 2.25]);
        assert!(ewm(&[], 3).is_empty());
    }

    #[test]
    fn test_rsi_rolling_mean() {
        // last two changes: +1, -0.5
        let value = rsi(&[9.0, 10.0, 11.0, 10.5], 2).unwrap();
        assert!((value - 200.0 / 3.0).abs() < 1e-9);

        let sample = rsi(&sample_prices(), 14).unwrap();
        assert!(sample > 0.0 && sample < 100.0);
    }

    #[test]
    fn test_rsi_undefined_cases() {
        assert_eq!(rsi(&[1.0, 2.0, 3.0], 14), None);
        // no losses in the window
        let uptrend: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        assert_eq!(rsi(&uptrend, 14), None);
    }

    #[test]
    fn test_macd_needs_35_closes() {
        assert!(macd(&sample_prices(), 12, 26, 9).is_none());

        let rising: Vec<f64> = (0..60).map(|i| 100.0 + i as f64 * 0.5).collect();
        let reading = macd(&rising, 12, 26, 9).unwrap();
        assert!(reading.macd > 0.0);
        assert_eq!(reading.trend, MacdTrend::Bullish);

        let falling: Vec<f64> = rising.iter().rev().copied().collect();
        assert_eq!(macd(&falling, 12, 26, 9).unwrap().trend, MacdTrend::Bearish);
    }

    #[test]
    fn test_bollinger_sample_std() {
        let data = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let bands = bollinger(&data, 8, 2.0).unwrap();
        let sd = (32.0f64 / 7.0).sqrt();
        assert!((bands.middle - 5.0).abs() < 1e-12);
        assert!((bands.upper - (5.0 + 2.0 * sd)).abs() < 1e-12);
        assert!(bands.lower < bands.middle);
        assert!(bollinger(&data, 20, 2.0).is_none());
    }

    #[test]
    fn test_context_requires_twenty_closes() {
        let short = series_from(&sample_prices()[..19], &[1.0; 19]);
        assert!(compute_technical_context(&short).is_none());

        let ctx = compute_technical_context(&series_from(&sample_prices(), &[1.0; 20])).unwrap();
        assert_eq!(ctx.current_price, 45.64);
        assert_eq!(ctx.high_52w, 46.41);
        assert_eq!(ctx.low_52w, 43.61);
        assert!(ctx.ma50.is_none());
        assert!(ctx.bollinger.is_some());
        assert!(ctx.volume_trend.is_none());
    }

    #[test]
    fn test_context_long_history() {
        let closes: Vec<f64> = (0..260).map(|i| 100.0 + i as f64).collect();
        let volumes: Vec<f64> = (0..260).map(|i| if i >= 240 { 200.0 } else { 100.0 }).collect();
        let ctx = compute_technical_context(&series_from(&closes, &volumes)).unwrap();

        assert_eq!(ctx.high_52w, 359.0);
        // 252-close window starts at index 8
        assert_eq!(ctx.low_52w, 108.0);
        let ma200 = ctx.ma200.unwrap();
        assert!((ma200 - 259.5).abs() < 1e-9);
        assert!((ctx.pct_from_ma200.unwrap() - (359.0 / 259.5 - 1.0)).abs() < 1e-12);
        assert!((ctx.volume_trend.unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(ctx.macd.map(|m| m.trend), Some(MacdTrend::Bullish));
    }

    #[test]
    fn test_regime_labels() {
        let few = series_from(&sample_prices()[..10], &[1.0; 10]);
        assert_eq!(detect_market_regime(&few).label(), "Stable / Neutral");

        let calm_up = compounding(100.0, std::iter::repeat(0.001).take(120));
        let volumes = vec![1.0; calm_up.len()];
        assert_eq!(detect_market_regime(&series_from(&calm_up, &volumes)), MarketRegime::LowVolatilityBull);

        let choppy_down = compounding(100.0, (0..120).map(|i| if i % 2 == 0 { -0.06 } else { 0.04 }));
        assert_eq!(
            detect_market_regime(&series_from(&choppy_down, &volumes)),
            MarketRegime::HighVolatilityBear
        );

        let flat = compounding(100.0, (0..120).map(|i| if i % 2 == 0 { 0.01 } else { -0.01 }));
        assert_eq!(detect_market_regime(&series_from(&flat, &volumes)), MarketRegime::StableTransition);
    }
}
