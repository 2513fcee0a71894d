//! HTTP plan oracle.
//!
//! POSTs [`oracle_payload`](super::oracle_payload) to an endpoint and parses
//! the response body as a plan (JSON or a fenced text response).

use super::oracle_payload;
use async_trait::async_trait;
use conductor_application::ports::plan_oracle::{OracleError, PlanOracle, PlanRequest};
use conductor_domain::{Plan, parse_plan};
use std::time::Duration;
use tracing::debug;

pub struct HttpPlanOracle {
    name: String,
    endpoint: String,
    client: reqwest::Client,
}

impl HttpPlanOracle {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, OracleError> {
        let endpoint = endpoint.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Other(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            name: format!("http:{}", endpoint),
            endpoint,
            client,
        })
    }
}

#[async_trait]
impl PlanOracle for HttpPlanOracle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn propose(&self, request: &PlanRequest) -> Result<Plan, OracleError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&oracle_payload(request))
            .send()
            .await
            .map_err(|e| OracleError::Unavailable(format!("Failed to reach oracle: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::RequestFailed(format!(
                "HTTP error: {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| OracleError::RequestFailed(format!("Failed to read response body: {}", e)))?;
        debug!(oracle = %self.name, bytes = body.len(), "Oracle responded");

        parse_plan(&body).map_err(|e| OracleError::InvalidResponse(e.to_string()))
    }
}
