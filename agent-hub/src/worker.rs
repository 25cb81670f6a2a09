// Worker client: opaque HTTP to `POST /invoke` with the retry envelope

use contracts::{InvokeRequest, InvokeResponse, RetryExecutor, RetryPolicy};
use thiserror::Error;

use crate::config::AgentConfig;
use crate::error::HubError;

#[derive(Debug, Error)]
pub enum WorkerCallError {
    #[error("worker timed out after {0}s")]
    Timeout(u64),

    #[error("worker unreachable: {0}")]
    Network(reqwest::Error),

    #[error("worker returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("worker protocol violation: {0}")]
    Protocol(String),
}

impl WorkerCallError {
    /// Timeouts, network errors and 5xx (plus 429) get another attempt;
    /// other 4xx and malformed responses are fatal.
    fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Network(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Protocol(_) => false,
        }
    }
}

impl From<WorkerCallError> for HubError {
    fn from(error: WorkerCallError) -> Self {
        match error {
            WorkerCallError::Timeout(_) => HubError::WorkerTimeout(error.to_string()),
            _ => HubError::WorkerError(error.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerClient {
    http: reqwest::Client,
    retry: RetryPolicy,
}

impl WorkerClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            retry: RetryPolicy::default(),
        }
    }

    /// Invoke an agent's worker endpoint, bounded by the agent's configured
    /// timeout per attempt.
    pub async fn invoke(
        &self,
        agent: &AgentConfig,
        request: &InvokeRequest,
    ) -> Result<InvokeResponse, WorkerCallError> {
        let url = format!("{}/invoke", agent.url.trim_end_matches('/'));
        let timeout = agent.timeout();
        let executor = RetryExecutor::new(self.retry.clone());

        let response = executor
            .execute(
                || async {
                    let response = self
                        .http
                        .post(&url)
                        .timeout(timeout)
                        .json(request)
                        .send()
                        .await
                        .map_err(|e| {
                            if e.is_timeout() {
                                WorkerCallError::Timeout(agent.default_timeout)
                            } else {
                                WorkerCallError::Network(e)
                            }
                        })?;

                    let status = response.status();
                    if !status.is_success() {
                        let body = response.text().await.unwrap_or_default();
                        return Err(WorkerCallError::Status {
                            status: status.as_u16(),
                            body,
                        });
                    }

                    response
                        .json::<InvokeResponse>()
                        .await
                        .map_err(|e| WorkerCallError::Protocol(e.to_string()))
                },
                WorkerCallError::is_retryable,
            )
            .await?;

        response.validate().map_err(WorkerCallError::Protocol)?;
        Ok(response)
    }
}

impl Default for WorkerClient {
    fn default() -> Self {
        Self::new()
    }
}
