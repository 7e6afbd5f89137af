use chrono::{Datelike, NaiveDate};

/// Provider date when known, otherwise the 25th of the next reporting month
/// (Apr, Jul, Oct, then Jan of the next year).
pub fn next_earnings_estimate(provider_date: Option<NaiveDate>, today: NaiveDate) -> Option<NaiveDate> {
    if provider_date.is_some() {
        return provider_date;
    }
    let (year, month) = match today.month() {
        1..=3 => (today.year(), 4),
        4..=6 => (today.year(), 7),
        7..=9 => (today.year(), 10),
        _ => (today.year() + 1, 1),
    };
    NaiveDate::from_ymd_opt(year, month, 25)
}

/// Upside to the mean analyst target: target / price - 1.
pub fn analyst_margin_of_safety(target_mean: Option<f64>, price: Option<f64>) -> Option<f64> {
    match (target_mean, price) {
        (Some(t), Some(p)) if p > 0.0 && t.is_finite() => Some(t / p - 1.0),
        _ => None,
    }
}
