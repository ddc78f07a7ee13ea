//! HttpCollector - REST implementation of the usage collector.
//!
//! Posts one JSON body per report to `{base_url}/usage/{heartbeat|partial|close}`.
//! Each call is a single attempt; non-2xx responses are delivery errors.

use async_trait::async_trait;
use dwell_core::config::CollectorConfig;
use dwell_core::error::{DwellError, Result};
use dwell_core::report::{CloseReason, UsageCollector};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

#[derive(Clone)]
pub struct HttpCollector {
    client: Client,
    base_url: String,
    api_token: Option<String>,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct HeartbeatBody<'a> {
    session_id: &'a str,
}

#[derive(Debug, Serialize)]
struct PartialBody<'a> {
    session_id: &'a str,
    active_ms: u64,
}

#[derive(Debug, Serialize)]
struct CloseBody<'a> {
    session_id: &'a str,
    active_ms: u64,
    reason: CloseReason,
}

impl HttpCollector {
    pub fn new(config: &CollectorConfig, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            timeout,
        }
    }

    fn endpoint(&self, operation: &str) -> String {
        format!("{}/usage/{}", self.base_url, operation)
    }

    async fn post<B: Serialize + Sync>(&self, operation: &str, body: &B) -> Result<()> {
        let url = self.endpoint(operation);

        let mut request = self.client.post(&url).json(body).timeout(self.timeout);

        if let Some(token) = &self.api_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DwellError::Timeout(self.timeout.as_millis() as u64)
            } else {
                DwellError::delivery(format!("Failed to send {} report: {}", operation, e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(DwellError::delivery(format!(
                "Collector error on {} ({}): {}",
                operation, status, error_text
            )));
        }

        tracing::debug!("[HttpCollector] {} accepted ({})", operation, status);
        Ok(())
    }
}

#[async_trait]
impl UsageCollector for HttpCollector {
    async fn heartbeat(&self, session_id: &str) -> Result<()> {
        self.post("heartbeat", &HeartbeatBody { session_id }).await
    }

    async fn partial(&self, session_id: &str, active_ms: u64) -> Result<()> {
        self.post(
            "partial",
            &PartialBody {
                session_id,
                active_ms,
            },
        )
        .await
    }

    async fn close(&self, session_id: &str, active_ms: u64, reason: CloseReason) -> Result<()> {
        self.post(
            "close",
            &CloseBody {
                session_id,
                active_ms,
                reason,
            },
        )
        .await
    }
}
