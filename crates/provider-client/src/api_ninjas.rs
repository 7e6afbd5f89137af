use analysis_core::{InsiderSource, ProviderDiagnostics, TransactionRecord};
use async_trait::async_trait;

use crate::parse::extract_records;
use crate::records::records_from_maps;
use crate::{json_or_diagnose, missing_key, ProviderClient};

const BASE_URL: &str = "https://api.api-ninjas.com/v1/insidertransactions";

pub const NINJAS_SOURCE: &str = "API Ninjas: insidertransactions";

/// API Ninjas insider transactions. The key travels in a header, so the
/// URL itself never carries a credential.
pub struct ApiNinjasInsider {
    http: ProviderClient,
    api_key: Option<String>,
}

impl ApiNinjasInsider {
    pub fn new(http: ProviderClient, api_key: Option<String>) -> Self {
        Self { http, api_key }
    }
}

#[async_trait]
impl InsiderSource for ApiNinjasInsider {
    fn name(&self) -> &'static str {
        "API Ninjas"
    }

    async fn fetch_transactions(&self, symbol: &str) -> (Vec<TransactionRecord>, Vec<ProviderDiagnostics>) {
        let endpoint = "v1/insidertransactions";
        let Some(key) = self.api_key.as_deref() else {
            return (Vec::new(), vec![missing_key("APINinjas", endpoint, "NINJAS_API_KEY")]);
        };

        let url = format!("{}?ticker={}", BASE_URL, symbol);
        let mut diag = ProviderDiagnostics::new("APINinjas", endpoint);
        let reply = self
            .http
            .get(&url, &[("X-Api-Key", key), ("Accept", "application/json")])
            .await;
        let records = json_or_diagnose(&reply, &url, &mut diag)
            .map(|j| records_from_maps(&extract_records(&j), NINJAS_SOURCE))
            .unwrap_or_default();
        diag.item_count = records.len();
        tracing::info!("API Ninjas insider for {}: {} rows", symbol, records.len());
        (records, vec![diag])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::Direction;
    use serde_json::json;

    #[test]
    fn test_ninjas_array_payload() {
        let payload = json!([
            {
                "ticker": "AAPL",
                "insider_name": "Jeffrey Williams",
                "insider_position": "COO",
                "transaction_date": "2024-04-01",
                "transaction_code": "S",
                "shares": "-59162",
                "transaction_price": "170.03",
                "transaction_value": "-10059315.86"
            }
        ]);
        let recs = records_from_maps(&extract_records(&payload), NINJAS_SOURCE);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].direction, Direction::Sell);
        assert_eq!(recs[0].owner_role.as_deref(), Some("COO"));
        assert_eq!(recs[0].notional_value, Some(-10059315.86));
    }
}
