//! SEC EDGAR Form 4 adapter: ticker → CIK → recent Form 4 filings → XML.
//!
//! No key is needed, but the SEC requires a descriptive User-Agent.

use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

use analysis_core::{Direction, InsiderSource, ProviderDiagnostics, TransactionRecord};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use crate::parse::{parse_date, parse_number};
use crate::{json_or_diagnose, ProviderClient};

const TICKERS_URL: &str = "https://www.sec.gov/files/company_tickers.json";
const SUBMISSIONS_URL: &str = "https://data.sec.gov/submissions";
const ARCHIVES_DATA_URL: &str = "https://data.sec.gov/Archives/edgar/data";
const ARCHIVES_WWW_URL: &str = "https://www.sec.gov/Archives/edgar/data";

pub const SEC_SOURCE: &str = "SEC Form 4";

const MAX_FILINGS: usize = 12;
const MAX_TRANSACTIONS: usize = 250;
const FILING_PAUSE: Duration = Duration::from_millis(120);

/// Ticker → CIK from `company_tickers.json`.
pub fn parse_company_tickers(payload: &Value) -> HashMap<String, u64> {
    let Some(obj) = payload.as_object() else {
        return HashMap::new();
    };
    obj.values()
        .filter_map(|entry| {
            let ticker = entry.get("ticker")?.as_str()?.trim().to_uppercase();
            let cik = entry.get("cik_str").and_then(parse_number)?;
            (cik > 0.0 && !ticker.is_empty()).then_some((ticker, cik as u64))
        })
        .collect()
}

/// Accession numbers and filing dates of the newest Form 4 filings.
pub fn recent_form4_filings(submissions: &Value, max: usize) -> Vec<(String, String)> {
    let recent = &submissions["filings"]["recent"];
    let column = |name: &str| -> Vec<&str> {
        recent[name]
            .as_array()
            .map(|a| a.iter().map(|v| v.as_str().unwrap_or("")).collect())
            .unwrap_or_default()
    };
    let forms = column("form");
    let accessions = column("accessionNumber");
    let dates = column("filingDate");

    forms
        .iter()
        .enumerate()
        .filter(|(_, form)| form.starts_with('4'))
        .filter_map(|(i, _)| {
            let acc = accessions.get(i).filter(|a| !a.is_empty())?;
            let date = dates.get(i).copied().unwrap_or("");
            Some((acc.to_string(), date.to_string()))
        })
        .take(max)
        .collect()
}

fn xml_name_score(name: &str) -> i32 {
    let lower = name.to_lowercase();
    let mut score = 0;
    if lower.ends_with(".xml") {
        score += 100;
    }
    if lower.contains("xsl") {
        score -= 50;
    }
    if lower.contains("form4") || lower.contains("f345") {
        score += 30;
    }
    if lower.contains("primary") {
        score += 15;
    }
    score
}

/// Best Form 4 XML document in a filing's `index.json`.
pub fn pick_form4_xml(index: &Value) -> Option<String> {
    index["directory"]["item"]
        .as_array()?
        .iter()
        .filter_map(|item| item.get("name")?.as_str())
        .filter(|name| name.to_lowercase().ends_with(".xml"))
        .max_by(|a, b| {
            xml_name_score(a)
                .cmp(&xml_name_score(b))
                .then_with(|| b.len().cmp(&a.len()))
        })
        .map(str::to_string)
}

fn tag_regex(tag: &str) -> Option<Regex> {
    Regex::new(&format!(r"(?s)<{0}(?:\s[^>]*)?>(.*?)</{0}>", regex::escape(tag))).ok()
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Inner text of the first `<tag>`; a nested `<value>` is unwrapped.
fn element_text(xml: &str, tag: &str) -> Option<String> {
    let inner = tag_regex(tag)?.captures(xml)?.get(1)?.as_str();
    let text = match value_regex().and_then(|re| re.captures(inner)) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()),
        None => inner,
    };
    let text = unescape(text.trim());
    (!text.is_empty() && !text.starts_with('<')).then_some(text)
}

fn value_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| tag_regex("value")).as_ref()
}

fn transaction_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| tag_regex("nonDerivativeTransaction")).as_ref()
}

/// Non-derivative transactions of one Form 4 document.
pub fn parse_form4_xml(xml: &str, filing_date: &str, filing_url: &str) -> Vec<TransactionRecord> {
    let Some(tx_re) = transaction_regex() else {
        return Vec::new();
    };
    let owner = element_text(xml, "rptOwnerName");
    let role = element_text(xml, "officerTitle")
        .or_else(|| owner.as_ref().map(|_| "Director/Officer".to_string()));
    let fallback_date = parse_date(filing_date);

    tx_re
        .captures_iter(xml)
        .filter_map(|caps| {
            let block = caps.get(1)?.as_str();
            let date = element_text(block, "transactionDate")
                .and_then(|d| parse_date(&d))
                .or(fallback_date)?;
            let code = element_text(block, "transactionCode");
            let ad = element_text(block, "transactionAcquiredDisposedCode");
            let number = |tag: &str| {
                element_text(block, tag).and_then(|t| parse_number(&Value::String(t)))
            };
            let shares = number("transactionShares");
            let price = number("transactionPricePerShare");
            let value = match (shares, price) {
                (Some(s), Some(p)) => Some(s * p),
                _ => None,
            };
            Some(TransactionRecord {
                date,
                direction: Direction::classify(code.as_deref(), ad.as_deref()),
                owner_name: owner.clone(),
                owner_role: role.clone(),
                security_description: element_text(block, "securityTitle"),
                transaction_label: None,
                transaction_code: code,
                share_count: shares,
                price_per_share: price,
                notional_value: value,
                source_provider: SEC_SOURCE.to_string(),
                filing_reference: Some(filing_url.to_string()),
            })
        })
        .collect()
}

#[derive(Debug, Default)]
struct Form4Counters {
    filings_tried: usize,
    xml_downloaded: usize,
    parsed: usize,
    tx_found: usize,
    index_errors: usize,
}

impl Form4Counters {
    fn note(&self) -> String {
        format!(
            "filings_tried={} xml_downloaded={} parsed={} tx_found={} index_errors={}",
            self.filings_tried, self.xml_downloaded, self.parsed, self.tx_found, self.index_errors
        )
    }
}

pub struct SecEdgarInsider {
    http: ProviderClient,
    user_agent: String,
    cik_map: OnceLock<HashMap<String, u64>>,
}

impl SecEdgarInsider {
    pub fn new(http: ProviderClient, user_agent: impl Into<String>) -> Self {
        Self {
            http,
            user_agent: user_agent.into(),
            cik_map: OnceLock::new(),
        }
    }

    async fn get_json(&self, url: &str, diag: &mut ProviderDiagnostics) -> Option<Value> {
        let headers = [("User-Agent", self.user_agent.as_str()), ("Accept", "application/json")];
        let reply = self.http.get(url, &headers).await;
        json_or_diagnose(&reply, url, diag)
    }

    /// The ticker map is fetched once per adapter; a failed fetch is retried next call.
    async fn cik_for(&self, symbol: &str, diags: &mut Vec<ProviderDiagnostics>) -> Result<Option<u64>, ()> {
        if self.cik_map.get().is_none() {
            let mut diag = ProviderDiagnostics::new("SEC", "files/company_tickers.json");
            let map = self
                .get_json(TICKERS_URL, &mut diag)
                .await
                .map(|j| parse_company_tickers(&j))
                .unwrap_or_default();
            diag.item_count = map.len();
            diags.push(diag);
            if map.is_empty() {
                return Err(());
            }
            let _ = self.cik_map.set(map);
        }
        Ok(self
            .cik_map
            .get()
            .and_then(|m| m.get(&symbol.trim().to_uppercase()).copied()))
    }

    async fn fetch_form4_xml(&self, cik: u64, acc_nodash: &str, counters: &mut Form4Counters) -> Option<(String, String)> {
        let index_url = format!("{}/{}/{}/index.json", ARCHIVES_DATA_URL, cik, acc_nodash);
        let mut index_diag = ProviderDiagnostics::new("SEC", "Archives/index.json");
        let Some(index) = self.get_json(&index_url, &mut index_diag).await else {
            counters.index_errors += 1;
            tracing::debug!("SEC index failed for {}: {:?}", acc_nodash, index_diag.error_message);
            return None;
        };
        let xml_name = pick_form4_xml(&index)?;
        let xml_url = format!("{}/{}/{}/{}", ARCHIVES_WWW_URL, cik, acc_nodash, xml_name);
        let headers = [
            ("User-Agent", self.user_agent.as_str()),
            ("Accept", "application/xml,text/xml,text/plain,*/*"),
        ];
        let reply = self.http.get(&xml_url, &headers).await;
        if !reply.is_ok() {
            return None;
        }
        counters.xml_downloaded += 1;
        reply.body.map(|body| (body, xml_url))
    }
}

#[async_trait]
impl InsiderSource for SecEdgarInsider {
    fn name(&self) -> &'static str {
        SEC_SOURCE
    }

    async fn fetch_transactions(&self, symbol: &str) -> (Vec<TransactionRecord>, Vec<ProviderDiagnostics>) {
        let mut diags = Vec::new();

        let cik = match self.cik_for(symbol, &mut diags).await {
            Ok(Some(cik)) => cik,
            Ok(None) => {
                diags.push(ProviderDiagnostics::new("SEC", "cik lookup").with_note("ticker not found in SEC CIK map"));
                return (Vec::new(), diags);
            }
            Err(()) => {
                tracing::warn!("SEC CIK map unavailable");
                return (Vec::new(), diags);
            }
        };

        let submissions_url = format!("{}/CIK{:010}.json", SUBMISSIONS_URL, cik);
        let mut sub_diag = ProviderDiagnostics::new("SEC", "submissions");
        let filings = self
            .get_json(&submissions_url, &mut sub_diag)
            .await
            .map(|j| recent_form4_filings(&j, MAX_FILINGS))
            .unwrap_or_default();
        sub_diag.item_count = filings.len();
        diags.push(sub_diag);

        let mut counters = Form4Counters::default();
        let mut records: Vec<TransactionRecord> = Vec::new();
        for (i, (accession, filing_date)) in filings.iter().enumerate() {
            if records.len() >= MAX_TRANSACTIONS {
                break;
            }
            if i > 0 {
                tokio::time::sleep(FILING_PAUSE).await;
            }
            counters.filings_tried += 1;
            let acc_nodash = accession.replace('-', "");
            let Some((xml, xml_url)) = self.fetch_form4_xml(cik, &acc_nodash, &mut counters).await else {
                continue;
            };
            let parsed = parse_form4_xml(&xml, filing_date, &xml_url);
            counters.parsed += 1;
            counters.tx_found += parsed.len();
            records.extend(parsed);
        }
        records.truncate(MAX_TRANSACTIONS);
        records.sort_by(|a, b| b.date.cmp(&a.date));

        let mut summary = ProviderDiagnostics::new("SEC", "Form 4 XML").with_note(counters.note());
        summary.item_count = records.len();
        tracing::info!("SEC Form 4 for {} (CIK {}): {}", symbol, cik, counters.note());
        diags.push(summary);
        (records, diags)
    }
}
