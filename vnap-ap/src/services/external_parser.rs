//! Optional external address parser client
//!
//! **[APA-EXT-010]** An auxiliary parser (off by default) can contribute a
//! coverage hint when the rule-based score is low. Its contract:
//! - consulted only when the flag forces it or the rule-based score falls
//!   below the configured trigger,
//! - contributes exactly one scoring term (`external_coverage`),
//! - never overrides the internal normalized text or fingerprint.
//!
//! Failures degrade to "no hint"; the pipeline never waits on a broken
//! dependency past its own timeout.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// External parser client errors
#[derive(Debug, Error)]
pub enum ExternalParserError {
    #[error("client build failed: {0}")]
    ClientBuild(String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Request body sent to the external parser endpoint.
#[derive(Debug, Serialize)]
struct ExternalParseRequest<'a> {
    text: &'a str,
}

/// Response shape: labeled component spans over the submitted text.
#[derive(Debug, Deserialize)]
struct ExternalParseResponse {
    #[serde(default)]
    components: HashMap<String, String>,
}

/// HTTP client for the external parser sidecar.
pub struct ExternalParserClient {
    client: reqwest::Client,
    base_url: String,
}

impl ExternalParserClient {
    /// Build a client with a short per-request timeout so a slow sidecar
    /// cannot eat the request deadline.
    pub fn new(base_url: &str) -> Result<Self, ExternalParserError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(600))
            .build()
            .map_err(|e| ExternalParserError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Coverage hint for the normalized text: the fraction of tokens the
    /// external parser labeled with any component. Errors degrade to `None`.
    pub async fn coverage(&self, normalized: &str) -> Option<f64> {
        let total = normalized.split_whitespace().count();
        if total == 0 {
            return None;
        }

        let response = self
            .client
            .post(format!("{}/parse", self.base_url))
            .json(&ExternalParseRequest { text: normalized })
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(error = %e, "External parser unreachable, skipping hint");
                return None;
            }
        };

        let parsed: ExternalParseResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => {
                tracing::debug!(error = %e, "External parser returned malformed body");
                return None;
            }
        };

        let covered: usize = parsed
            .components
            .values()
            .map(|span| span.split_whitespace().count())
            .sum();

        let coverage = (covered as f64 / total as f64).clamp(0.0, 1.0);
        tracing::debug!(coverage, "External parser coverage hint");
        Some(coverage)
    }
}
