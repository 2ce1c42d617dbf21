//! JSON POST with exponential-backoff retry, shared by the embedding and
//! chat clients.
//!
//! - HTTP 429 and 5xx: retry
//! - other 4xx: fail immediately
//! - network errors: retry
//! - backoff: 1s, 2s, 4s, ... capped at 32s

use anyhow::{anyhow, bail, Result};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

pub struct JsonPost<'a> {
    pub client: &'a reqwest::Client,
    pub url: &'a str,
    pub bearer: Option<&'a str>,
    pub body: &'a Value,
    pub max_retries: u32,
    /// Names the remote service in error messages.
    pub service: &'a str,
}

impl JsonPost<'_> {
    pub async fn send(&self) -> Result<Value> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = backoff(attempt);
                debug!(service = self.service, attempt, ?delay, "retrying");
                tokio::time::sleep(delay).await;
            }

            let mut req = self
                .client
                .post(self.url)
                .header("Content-Type", "application/json")
                .json(self.body);
            if let Some(token) = self.bearer {
                req = req.header("Authorization", format!("Bearer {}", token));
            }

            match req.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response.json().await?);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!(service = self.service, %status, attempt, "transient API error");
                        last_err = Some(anyhow!("{} API error {}: {}", self.service, status, body_text));
                        continue;
                    }
                    bail!("{} API error {}: {}", self.service, status, body_text);
                }
                Err(e) => {
                    warn!(service = self.service, error = %e, attempt, "request failed");
                    last_err = Some(anyhow!("{} request to {} failed: {}", self.service, self.url, e));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("{} request failed after retries", self.service)))
    }
}

/// Delay before retry number `attempt` (1-based).
pub fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt.saturating_sub(1)).min(5))
}
