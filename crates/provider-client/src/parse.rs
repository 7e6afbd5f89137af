//! Tolerant field access over loosely-typed provider JSON.

pub use analysis_core::metrics::normalize_pct;
use analysis_core::MetricKey;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::OnceLock;

const NULL_SENTINELS: [&str; 5] = ["", "nan", "none", "n/a", "null"];

/// Parse a JSON value into a finite f64.
///
/// Accepts bare numbers, numeric strings with thousands separators, and
/// Yahoo-style `{"raw": .., "fmt": ..}` wrappers. Sentinels yield `None`.
pub fn parse_number(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let cleaned = s.trim().replace(',', "");
            if NULL_SENTINELS.contains(&cleaned.to_lowercase().as_str()) {
                return None;
            }
            cleaned.parse::<f64>().ok()?
        }
        Value::Object(map) => return map.get("raw").and_then(parse_number),
        _ => return None,
    };
    v.is_finite().then_some(v)
}

/// First candidate key holding a parseable number.
pub fn pick_number(map: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| map.get(*k).and_then(parse_number))
}

/// First candidate key holding a non-empty string (numbers are stringified).
pub fn pick_str(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match map.get(*k)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Calendar date from the common provider formats. Time components are dropped.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    // "2024-01-05-05:00" style offsets in Form 4 XML
    s.get(..10)
        .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
}

/// Date from a JSON value: string dates, epoch seconds, or a `{raw}` wrapper.
pub fn parse_date_value(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(s) => parse_date(s),
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|dt| dt.date_naive()),
        Value::Object(map) => map.get("raw").and_then(parse_date_value),
        _ => None,
    }
}

/// One row of a provider's metric table: canonical key, candidate field
/// names in priority order, and whether the value is percent-like.
pub type MetricCandidates = (MetricKey, &'static [&'static str], bool);

/// Resolve every row of a candidate table against a flat payload.
pub fn map_metrics(map: &Map<String, Value>, table: &[MetricCandidates]) -> BTreeMap<MetricKey, f64> {
    table
        .iter()
        .filter_map(|(key, candidates, pct)| {
            let v = pick_number(map, candidates)?;
            Some((*key, if *pct { normalize_pct(v) } else { v }))
        })
        .collect()
}

/// Locate the list of record objects inside a provider payload.
pub fn extract_records(payload: &Value) -> Vec<Map<String, Value>> {
    fn as_records(v: &Value) -> Option<Vec<Map<String, Value>>> {
        let arr = v.as_array()?;
        if arr.first().map_or(true, Value::is_object) {
            Some(arr.iter().filter_map(|x| x.as_object().cloned()).collect())
        } else {
            None
        }
    }

    if let Some(recs) = as_records(payload) {
        return recs;
    }
    let Some(obj) = payload.as_object() else {
        return Vec::new();
    };
    for key in [
        "data",
        "items",
        "results",
        "insiderTrades",
        "insideTrades",
        "insiderTransactions",
        "transactions",
    ] {
        if let Some(recs) = obj.get(key).and_then(as_records) {
            return recs;
        }
    }
    obj.values().find_map(as_records).unwrap_or_default()
}

/// Provider error or rate-limit note embedded in a JSON body.
pub fn error_text(payload: &Value) -> Option<String> {
    let obj = payload.as_object()?;
    [
        "Error Message",
        "error",
        "Error",
        "message",
        "Information",
        "Note",
        "detail",
    ]
    .iter()
    .find_map(|k| match obj.get(*k)? {
        Value::String(s) if !s.is_empty() => Some(truncate(s, 500)),
        Value::Null | Value::Bool(false) => None,
        Value::String(_) => None,
        other => Some(truncate(&other.to_string(), 500)),
    })
}

/// Mask credentials in query strings.
pub fn redact_url(url: &str) -> String {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    match RE.get_or_init(|| Regex::new(r"(?i)(apikey=|token=)[^&\s]+").ok()) {
        Some(re) => re.replace_all(url, "${1}***").into_owned(),
        None => url.to_string(),
    }
}

pub fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
