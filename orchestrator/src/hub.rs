// Agent Hub client with the bounded retry envelope

use std::time::Duration;

use contracts::{HubInvokeResponse, InvokeRequest, RetryExecutor, RetryPolicy};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubCallError {
    #[error("hub request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("hub returned {status}: {body}")]
    Status { status: u16, body: String },
}

impl HubCallError {
    /// Network errors and 5xx are retried; 4xx are fatal except 429.
    fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HubClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl HubClient {
    pub fn new(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            retry: RetryPolicy::default(),
        }
    }

    /// `POST /invoke/{agent}` with per-call timeout. Retries ride inside the
    /// shared envelope: 3 attempts, 1s initial backoff, factor 2, ≤10s total.
    pub async fn invoke(
        &self,
        agent: &str,
        request: &InvokeRequest,
        timeout: Duration,
    ) -> Result<HubInvokeResponse, HubCallError> {
        let url = format!("{}/invoke/{}", self.base_url.trim_end_matches('/'), agent);
        let executor = RetryExecutor::new(self.retry.clone());

        executor
            .execute(
                || async {
                    let response = self
                        .http
                        .post(&url)
                        .timeout(timeout)
                        .json(request)
                        .send()
                        .await?;

                    let status = response.status();
                    if !status.is_success() {
                        let body = response.text().await.unwrap_or_default();
                        return Err(HubCallError::Status {
                            status: status.as_u16(),
                            body,
                        });
                    }

                    Ok(response.json::<HubInvokeResponse>().await?)
                },
                HubCallError::is_retryable,
            )
            .await
    }
}
