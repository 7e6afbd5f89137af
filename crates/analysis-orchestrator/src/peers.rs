//! Peer comparison against a static sector table.

use analysis_core::FundamentalsSource;
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use valuation_engine::ttm_free_cash_flow;

const MAX_PEERS: usize = 5;

type PeerMap = &'static [(&'static str, &'static [&'static str])];

/// Sector → ticker → peers. Lookup walks sectors in order; the first hit wins.
pub const SECTOR_PEERS: &[(&str, PeerMap)] = &[
    (
        "Technology",
        &[
            ("AAPL", &["MSFT", "GOOGL", "META", "NVDA"]),
            ("MSFT", &["AAPL", "GOOGL", "META", "AMZN"]),
            ("GOOGL", &["AAPL", "MSFT", "META", "AMZN"]),
            ("META", &["AAPL", "GOOGL", "SNAP", "PINS"]),
            ("NVDA", &["AMD", "INTC", "QCOM", "AVGO"]),
            ("TSLA", &["RIVN", "LCID", "F", "GM"]),
            ("NFLX", &["DIS", "PARA", "WBD"]),
        ],
    ),
    (
        "Consumer Cyclical",
        &[
            ("AMZN", &["WMT", "TGT", "EBAY", "BABA"]),
            ("TSLA", &["F", "GM", "RIVN", "LCID"]),
        ],
    ),
    (
        "Healthcare",
        &[
            ("JNJ", &["PFE", "UNH", "ABT", "MRK"]),
            ("PFE", &["JNJ", "MRK", "ABBV", "LLY"]),
        ],
    ),
    (
        "Financial Services",
        &[
            ("JPM", &["BAC", "WFC", "C", "GS"]),
            ("V", &["MA", "PYPL", "SQ"]),
            ("KOMB.PR", &["MONETA.PR", "JPM", "BAC"]),
            ("MONETA.PR", &["KOMB.PR", "JPM", "BAC"]),
        ],
    ),
    ("Communication Services", &[("T", &["VZ", "TMUS"])]),
    (
        "Utilities",
        &[
            ("CEZ.PR", &["NEE", "DUK", "SO", "D"]),
            ("NEE", &["DUK", "SO", "D", "AEP"]),
        ],
    ),
];

/// Up to five peers for `symbol`; empty for tickers not in the table.
pub fn peers_for(symbol: &str) -> Vec<String> {
    SECTOR_PEERS
        .iter()
        .flat_map(|(_, map)| map.iter())
        .find(|(ticker, _)| *ticker == symbol)
        .map(|(_, peers)| peers.iter().take(MAX_PEERS).map(|p| p.to_string()).collect())
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerRow {
    pub symbol: String,
    pub pe: Option<f64>,
    pub operating_margin: Option<f64>,
    pub revenue_growth: Option<f64>,
    /// TTM free cash flow / market cap
    pub fcf_yield: Option<f64>,
    pub market_cap: Option<f64>,
    pub roe: Option<f64>,
    pub gross_margin: Option<f64>,
}

impl PeerRow {
    fn is_empty(&self) -> bool {
        [
            self.pe,
            self.operating_margin,
            self.revenue_growth,
            self.fcf_yield,
            self.market_cap,
            self.roe,
            self.gross_margin,
        ]
        .iter()
        .all(Option::is_none)
    }
}

async fn fetch_row(source: &dyn FundamentalsSource, symbol: String) -> Option<PeerRow> {
    let profile = match source.profile(&symbol).await {
        Ok(p) => p,
        Err(e) => {
            tracing::debug!("Peer {} dropped: {}", symbol, e);
            return None;
        }
    };

    let market_cap = profile.market_cap.filter(|mc| *mc != 0.0);
    let fcf_yield = match (ttm_free_cash_flow(&profile).value, market_cap) {
        (Some(fcf), Some(mc)) if fcf != 0.0 => Some(fcf / mc),
        _ => None,
    };

    let row = PeerRow {
        symbol,
        pe: profile.trailing_pe,
        operating_margin: profile.operating_margin,
        revenue_growth: profile.revenue_growth,
        fcf_yield,
        market_cap,
        roe: profile.return_on_equity,
        gross_margin: profile.gross_margin,
    };
    (!row.is_empty()).then_some(row)
}

/// Fetch `symbol` and its peers with at most `concurrency` requests in
/// flight. Failed or empty rows are dropped. The main ticker comes first,
/// the rest by market cap descending.
pub async fn compare_peers(
    source: &dyn FundamentalsSource,
    symbol: &str,
    peers: &[String],
    concurrency: usize,
) -> Vec<PeerRow> {
    let tickers: Vec<String> = std::iter::once(symbol.to_string()).chain(peers.iter().cloned()).collect();

    let rows: Vec<PeerRow> = stream::iter(tickers)
        .map(|t| fetch_row(source, t))
        .buffer_unordered(concurrency.max(1))
        .filter_map(|row| async move { row })
        .collect()
        .await;

    let (mut main, mut rest): (Vec<PeerRow>, Vec<PeerRow>) = rows.into_iter().partition(|r| r.symbol == symbol);
    rest.sort_by(|a, b| {
        let a = a.market_cap.unwrap_or(f64::NEG_INFINITY);
        let b = b.market_cap.unwrap_or(f64::NEG_INFINITY);
        b.partial_cmp(&a).unwrap_or(std::cmp::Ordering::Equal)
    });

    tracing::info!("Peer comparison for {}: {} row(s)", symbol, main.len() + rest.len());
    main.append(&mut rest);
    main
}
