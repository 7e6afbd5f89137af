use std::collections::HashMap;

use analysis_core::TransactionRecord;
use chrono::NaiveDate;

/// Identity of a trade across providers after text and numeric normalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TradeKey {
    date: NaiveDate,
    owner: String,
    code: String,
    direction: String,
    shares: Option<i64>,
    price_cents: Option<i64>,
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl TradeKey {
    fn of(rec: &TransactionRecord) -> Self {
        let text = |s: &Option<String>| s.as_deref().map(collapse_whitespace).unwrap_or_default();
        Self {
            date: rec.date,
            owner: text(&rec.owner_name).to_uppercase(),
            code: text(&rec.transaction_code).to_uppercase(),
            direction: rec.direction.as_str().to_lowercase(),
            shares: rec.share_count.map(|s| s.round() as i64),
            // Rounded to whole cents: prices within half a cent of each other
            // (50.004 and 50.000) share a key, 50.006 and 50.000 do not.
            price_cents: rec.price_per_share.map(|p| (p * 100.0).round() as i64),
        }
    }
}

fn fill<T: Clone>(slot: &mut Option<T>, other: &Option<T>) {
    if slot.is_none() {
        slot.clone_from(other);
    }
}

/// Merge records from several providers into one list without duplicates.
///
/// Input order is provider priority: for every field the first non-null
/// value wins, and provenance accumulates in first-seen order. The output is
/// sorted newest first.
pub fn dedupe_transactions(records: &[TransactionRecord]) -> Vec<TransactionRecord> {
    let mut index: HashMap<TradeKey, usize> = HashMap::new();
    let mut merged: Vec<TransactionRecord> = Vec::new();
    let mut sources: Vec<Vec<String>> = Vec::new();

    for rec in records {
        let source = collapse_whitespace(&rec.source_provider);
        let key = TradeKey::of(rec);

        match index.get(&key) {
            Some(&i) => {
                let target = &mut merged[i];
                fill(&mut target.owner_name, &rec.owner_name);
                fill(&mut target.owner_role, &rec.owner_role);
                fill(&mut target.security_description, &rec.security_description);
                fill(&mut target.transaction_label, &rec.transaction_label);
                fill(&mut target.transaction_code, &rec.transaction_code);
                fill(&mut target.share_count, &rec.share_count);
                fill(&mut target.price_per_share, &rec.price_per_share);
                fill(&mut target.notional_value, &rec.notional_value);
                fill(&mut target.filing_reference, &rec.filing_reference);

                // A provenance entry may itself be a joined list from an earlier merge.
                for part in source.split(", ").filter(|p| !p.is_empty()) {
                    if !sources[i].iter().any(|s| s == part) {
                        sources[i].push(part.to_string());
                    }
                }
            }
            None => {
                index.insert(key, merged.len());
                merged.push(rec.clone());
                let mut seen: Vec<String> = Vec::new();
                for part in source.split(", ").filter(|p| !p.is_empty()) {
                    if !seen.iter().any(|s| s == part) {
                        seen.push(part.to_string());
                    }
                }
                sources.push(seen);
            }
        }
    }

    for (rec, provenance) in merged.iter_mut().zip(sources) {
        rec.source_provider = provenance.join(", ");
    }
    merged.sort_by(|a, b| b.date.cmp(&a.date));

    tracing::debug!("Deduplicated {} insider rows into {}", records.len(), merged.len());
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::Direction;

    fn trade(date: (i32, u32, u32), owner: &str, code: &str, shares: f64, price: f64, source: &str) -> TransactionRecord {
        TransactionRecord {
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            direction: Direction::classify(Some(code), None),
            owner_name: Some(owner.to_string()),
            owner_role: None,
            security_description: None,
            transaction_label: None,
            transaction_code: Some(code.to_string()),
            share_count: Some(shares),
            price_per_share: Some(price),
            notional_value: None,
            source_provider: source.to_string(),
            filing_reference: None,
        }
    }

    #[test]
    fn test_same_trade_from_two_providers_collapses() {
        let a = trade((2024, 1, 5), "JANE DOE", "P", 1000.0, 50.00, "FMP stable: insider-trading/search");
        let mut b = trade((2024, 1, 5), "Jane Doe ", "P", 1000.0, 50.0001, "SEC Form 4");
        b.owner_role = Some("Chief Financial Officer".into());
        b.filing_reference = Some("https://www.sec.gov/x.xml".into());

        let out = dedupe_transactions(&[a, b]);
        assert_eq!(out.len(), 1);
        let rec = &out[0];
        assert_eq!(rec.source_provider, "FMP stable: insider-trading/search, SEC Form 4");
        assert_eq!(rec.owner_name.as_deref(), Some("JANE DOE"));
        // gaps in the first record are filled from the second
        assert_eq!(rec.owner_role.as_deref(), Some("Chief Financial Officer"));
        assert_eq!(rec.filing_reference.as_deref(), Some("https://www.sec.gov/x.xml"));
    }

    #[test]
    fn test_price_key_has_cent_resolution() {
        let base = trade((2024, 1, 5), "JANE DOE", "P", 1000.0, 50.000, "FMP stable: insider-trading/search");
        let near = trade((2024, 1, 5), "JANE DOE", "P", 1000.0, 50.004, "SEC Form 4");
        let apart = trade((2024, 1, 5), "JANE DOE", "P", 1000.0, 50.006, "Finnhub");

        assert_eq!(dedupe_transactions(&[base.clone(), near]).len(), 1);
        assert_eq!(dedupe_transactions(&[base, apart]).len(), 2);
    }

    #[test]
    fn test_distinct_trades_kept_and_sorted() {
        let rows = vec![
            trade((2024, 1, 5), "JANE DOE", "P", 1000.0, 50.0, "A"),
            trade((2024, 3, 1), "JANE DOE", "P", 1000.0, 50.0, "A"),
            trade((2024, 1, 5), "JANE DOE", "S", 1000.0, 50.0, "A"),
            trade((2024, 1, 5), "JOHN ROE", "P", 1000.0, 50.0, "A"),
        ];
        let out = dedupe_transactions(&rows);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0].date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let rows = vec![
            trade((2024, 1, 5), "JANE DOE", "P", 1000.0, 50.0, "A"),
            trade((2024, 2, 5), "JOHN ROE", "S", 10.0, 12.5, "B"),
        ];
        let once = dedupe_transactions(&rows);
        let mut doubled = once.clone();
        doubled.extend(once.clone());
        let twice = dedupe_transactions(&doubled);
        assert_eq!(twice.len(), once.len());
        assert_eq!(twice, once);
    }

    #[test]
    fn test_order_insensitive_core_fields() {
        let a = trade((2024, 1, 5), "JANE DOE", "P", 1000.0, 50.0, "A");
        let b = trade((2024, 1, 5), "jane  doe", "p", 1000.4, 50.001, "B");
        let ab = dedupe_transactions(&[a.clone(), b.clone()]);
        let ba = dedupe_transactions(&[b, a]);
        assert_eq!(ab.len(), 1);
        assert_eq!(ba.len(), 1);
        assert_eq!(ab[0].date, ba[0].date);
        assert_eq!(ab[0].direction, ba[0].direction);
        assert_eq!(ab[0].source_provider, "A, B");
        assert_eq!(ba[0].source_provider, "B, A");
    }
}
