pub mod alpha_vantage;
pub mod api_ninjas;
pub mod fetch;
pub mod finnhub;
pub mod fmp;
pub mod narrative;
pub mod parse;
pub mod records;
pub mod sec_edgar;
pub mod yahoo;

pub use alpha_vantage::{AlphaVantageInsider, AlphaVantageMetrics};
pub use api_ninjas::ApiNinjasInsider;
pub use fetch::{retry_with_clock, Clock, FetchOutcome, TokioClock};
pub use finnhub::{FinnhubInsider, FinnhubMetrics};
pub use fmp::{FmpLegacyInsider, FmpMetrics, FmpStableInsider};
pub use narrative::generate_with_retry;
pub use sec_edgar::SecEdgarInsider;
pub use yahoo::YahooClient;

use analysis_core::ProviderDiagnostics;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::parse::{error_text, redact_url, truncate};

/// Outcome of one GET. Never an error: failures are recorded in the fields.
#[derive(Debug, Clone, Default)]
pub struct HttpReply {
    /// `None` when the request never got a response.
    pub status: Option<u16>,
    pub body: Option<String>,
    pub error: Option<String>,
}

impl HttpReply {
    pub fn is_ok(&self) -> bool {
        self.status == Some(200) && self.body.is_some()
    }

    pub fn json(&self) -> Option<Value> {
        self.body.as_deref().and_then(|b| serde_json::from_str(b).ok())
    }
}

/// Shared HTTP plumbing for every adapter.
#[derive(Clone)]
pub struct ProviderClient {
    client: Client,
}

impl ProviderClient {
    pub fn new(timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .cookie_store(true)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client }
    }

    /// GET with optional extra headers. The URL is only logged redacted.
    pub async fn get(&self, url: &str, headers: &[(&str, &str)]) -> HttpReply {
        let mut builder = self.client.get(url);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        tracing::debug!("GET {}", redact_url(url));

        let response = match builder.send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Request failed for {}: {}", redact_url(url), redact_url(&e.to_string()));
                return HttpReply {
                    status: None,
                    body: None,
                    error: Some(truncate(&redact_url(&e.to_string()), 500)),
                };
            }
        };

        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => HttpReply {
                status: Some(status),
                body: Some(body),
                error: None,
            },
            Err(e) => HttpReply {
                status: Some(status),
                body: None,
                error: Some(truncate(&e.to_string(), 500)),
            },
        }
    }
}

/// GET seam so adapters with a handshake can be driven by scripted replies.
#[async_trait]
pub trait HttpGet: Send + Sync {
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> HttpReply;
}

#[async_trait]
impl HttpGet for ProviderClient {
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> HttpReply {
        ProviderClient::get(self, url, headers).await
    }
}

/// Fill the common diagnostic fields from a reply and decode JSON when the
/// status is 200. Error notes inside a 200 body (rate limit, bad key) are
/// recorded but the payload is still returned; callers decide whether the
/// rest of it is usable.
pub(crate) fn json_or_diagnose(
    reply: &HttpReply,
    url: &str,
    diag: &mut ProviderDiagnostics,
) -> Option<Value> {
    diag.status = reply.status;
    diag.redacted_url = Some(redact_url(url));

    if let Some(err) = &reply.error {
        diag.error_message = Some(err.clone());
        return None;
    }

    if reply.status == Some(429) {
        diag.rate_limited = true;
        diag.error_message = Some("HTTP 429".to_string());
        return None;
    }

    let json = reply.json();
    if reply.status != Some(200) {
        let msg = json
            .as_ref()
            .and_then(error_text)
            .or_else(|| reply.body.as_deref().map(|b| truncate(b, 500)))
            .unwrap_or_default();
        diag.error_message = Some(format!("HTTP {}: {}", reply.status.unwrap_or(0), msg));
        return None;
    }

    let json = match json {
        Some(j) => j,
        None => {
            diag.error_message = Some("response was not valid JSON".to_string());
            return None;
        }
    };

    if let Some(msg) = error_text(&json) {
        let lower = msg.to_lowercase();
        if ["limit", "frequency", "premium"].iter().any(|k| lower.contains(k)) {
            diag.rate_limited = true;
        }
        diag.error_message = Some(msg);
    }

    Some(json)
}

/// Diagnostics for a provider skipped because its key is not configured.
pub(crate) fn missing_key(provider: &str, endpoint: &str, env_name: &str) -> ProviderDiagnostics {
    ProviderDiagnostics::new(provider, endpoint).with_note(format!("{} not set", env_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reply(status: u16, body: Value) -> HttpReply {
        HttpReply {
            status: Some(status),
            body: Some(body.to_string()),
            error: None,
        }
    }

    #[test]
    fn test_json_or_diagnose_success() {
        let mut diag = ProviderDiagnostics::new("FMP", "ratios-ttm");
        let out = json_or_diagnose(
            &reply(200, json!([{"peRatioTTM": 20.0}])),
            "https://x.test/a?symbol=AAPL&apikey=SECRET",
            &mut diag,
        );
        assert!(out.is_some());
        assert_eq!(diag.status, Some(200));
        assert_eq!(
            diag.redacted_url.as_deref(),
            Some("https://x.test/a?symbol=AAPL&apikey=***")
        );
    }

    #[test]
    fn test_json_or_diagnose_rate_limit_note() {
        let mut diag = ProviderDiagnostics::new("Alpha Vantage", "OVERVIEW");
        let out = json_or_diagnose(
            &reply(200, json!({"Note": "Thank you for using Alpha Vantage! Our standard API rate limit is 25 requests per day."})),
            "https://x.test/query?apikey=K",
            &mut diag,
        );
        assert!(out.is_some());
        assert!(diag.rate_limited);
        assert!(!diag.is_success());
    }

    #[test]
    fn test_json_or_diagnose_non_200() {
        let mut diag = ProviderDiagnostics::new("Finnhub", "metric");
        let out = json_or_diagnose(
            &reply(403, json!({"error": "You don't have access to this resource."})),
            "https://x.test/m?token=abc",
            &mut diag,
        );
        assert!(out.is_none());
        assert_eq!(diag.status, Some(403));
        assert!(diag.error_message.unwrap().contains("access"));
    }

    #[test]
    fn test_transport_error_recorded() {
        let mut diag = ProviderDiagnostics::new("SEC", "submissions");
        let r = HttpReply {
            status: None,
            body: None,
            error: Some("timed out".into()),
        };
        assert!(json_or_diagnose(&r, "https://data.sec.gov/x", &mut diag).is_none());
        assert_eq!(diag.status, None);
        assert_eq!(diag.error_message.as_deref(), Some("timed out"));
    }
}
