use analysis_core::NarrativeGenerator;
use std::time::Duration;

use crate::fetch::{retry_with_clock, Clock, FetchOutcome};

pub const NARRATIVE_MAX_ATTEMPTS: u32 = 3;
pub const NARRATIVE_RETRY_DELAY: Duration = Duration::from_secs(2);

const RATE_LIMIT_MARKERS: [&str; 4] = ["429", "quota", "rate limit", "too many"];

pub fn looks_rate_limited(message: &str) -> bool {
    let lower = message.to_lowercase();
    RATE_LIMIT_MARKERS.iter().any(|m| lower.contains(m))
}

/// Ask the narrative generator for text, retrying rate-limit failures only.
pub async fn generate_with_retry(
    generator: &dyn NarrativeGenerator,
    prompt: &str,
    clock: &dyn Clock,
) -> FetchOutcome<String> {
    retry_with_clock(clock, NARRATIVE_MAX_ATTEMPTS, NARRATIVE_RETRY_DELAY, |_| async move {
        match generator.generate(prompt).await {
            Ok(text) => FetchOutcome::Success(text),
            Err(e) => {
                let msg = e.to_string();
                if looks_rate_limited(&msg) {
                    FetchOutcome::RateLimited
                } else {
                    FetchOutcome::Failed(msg)
                }
            }
        }
    })
    .await
}
