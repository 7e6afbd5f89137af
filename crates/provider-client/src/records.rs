//! Candidate-key table mapping heterogeneous insider payloads to `TransactionRecord`.

use analysis_core::{Direction, TransactionRecord};
use serde_json::{Map, Value};

use crate::parse::{parse_date, parse_date_value, pick_number, pick_str};

/// Ordered candidate keys per canonical field; first present key wins.
pub struct RecordKeys {
    pub date: &'static [&'static str],
    pub transaction_type: &'static [&'static str],
    pub acquired_disposed: &'static [&'static str],
    pub owner: &'static [&'static str],
    pub role: &'static [&'static str],
    pub code: &'static [&'static str],
    pub security: &'static [&'static str],
    pub shares: &'static [&'static str],
    pub price: &'static [&'static str],
    pub value: &'static [&'static str],
    pub filing_url: &'static [&'static str],
}

pub const RECORD_KEYS: RecordKeys = RecordKeys {
    date: &[
        "transactionDate",
        "transaction_date",
        "filingDate",
        "filing_date",
        "acceptedDate",
        "date",
    ],
    transaction_type: &[
        "transactionType",
        "transaction_type",
        "transaction_name",
        "transactionName",
        "type",
        "transactionCode",
        "transaction_code",
    ],
    acquired_disposed: &[
        "acquisitionOrDisposition",
        "transactionAcquiredDisposedCode",
        "acquiredDisposedCode",
        "acquisition_or_disposal",
    ],
    owner: &[
        "insider_name",
        "insiderName",
        "name",
        "reportingName",
        "reporting_name",
        "reportingOwner",
        "reportingOwnerName",
        "reporting_owner_name",
        "executive",
    ],
    role: &[
        "insider_position",
        "insiderPosition",
        "insider_title",
        "reportingTitle",
        "ownerTitle",
        "typeOfOwner",
        "role",
        "executive_title",
    ],
    code: &["transactionCode", "transaction_code"],
    security: &[
        "securityTitle",
        "security",
        "security_title",
        "securityTitleValue",
        "security_type",
    ],
    shares: &[
        "securitiesTransacted",
        "securities_transacted",
        "transactionShares",
        "shares",
        "share",
    ],
    price: &[
        "price",
        "transactionPrice",
        "transactionPricePerShare",
        "transaction_price",
        "transaction_price_per_share",
        "share_price",
    ],
    value: &[
        "transactionValue",
        "transaction_value",
        "value",
        "totalValue",
        "amount",
    ],
    filing_url: &[
        "sec_filing_url",
        "secFilingUrl",
        "filingURL",
        "filingUrl",
        "url",
    ],
};

/// Map one payload object. Rows without a parseable date are dropped.
pub fn record_from_map(item: &Map<String, Value>, source: &str) -> Option<TransactionRecord> {
    let keys = &RECORD_KEYS;

    let date = keys.date.iter().find_map(|k| match item.get(*k)? {
        Value::String(s) => parse_date(s),
        other => parse_date_value(other),
    })?;

    let tx_type = pick_str(item, keys.transaction_type);
    let ad = pick_str(item, keys.acquired_disposed);
    let shares = pick_number(item, keys.shares);
    let price = pick_number(item, keys.price);
    let value = pick_number(item, keys.value).or(match (shares, price) {
        (Some(s), Some(p)) => Some(s * p),
        _ => None,
    });

    Some(TransactionRecord {
        date,
        direction: Direction::classify(tx_type.as_deref(), ad.as_deref()),
        owner_name: pick_str(item, keys.owner),
        owner_role: pick_str(item, keys.role),
        security_description: pick_str(item, keys.security),
        transaction_label: tx_type,
        transaction_code: pick_str(item, keys.code),
        share_count: shares,
        price_per_share: price,
        notional_value: value,
        source_provider: source.to_string(),
        filing_reference: pick_str(item, keys.filing_url),
    })
}

/// Map every object, newest first.
pub fn records_from_maps(items: &[Map<String, Value>], source: &str) -> Vec<TransactionRecord> {
    let mut out: Vec<TransactionRecord> = items
        .iter()
        .filter_map(|it| record_from_map(it, source))
        .collect();
    out.sort_by(|a, b| b.date.cmp(&a.date));
    out
}
