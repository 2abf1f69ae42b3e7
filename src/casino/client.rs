use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::ports::{LedgerTransfer, TransferError, TransferReceipt, TransferRequest};

#[derive(Error, Debug)]
pub enum CasinoError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("transfer request timed out")]
    Timeout,
    #[error("casino API returned status {0}")]
    ApiStatus(u16),
    #[error("invalid response from casino API: {0}")]
    InvalidResponse(String),
    #[error("circuit breaker open: {0}")]
    CircuitBreakerOpen(String),
}

#[derive(Debug, Serialize)]
struct TransferRequestBody {
    amount: String,
    account_id: String,
    username: String,
    nonce: String,
}

#[derive(Debug, Clone, Deserialize)]
struct TransferResponseBody {
    success: bool,
    transfer_id: Option<String>,
    message: Option<String>,
}

/// HTTP client for the casino ledger transfer API.
///
/// Carries a bounded per-request timeout so one hung transfer cannot stall a
/// webhook response or a whole sweep batch, and a circuit breaker so a dead
/// casino API is backed off instead of hammered.
#[derive(Clone)]
pub struct CasinoClient {
    client: Client,
    base_url: String,
    api_key: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl CasinoClient {
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> Self {
        Self::with_circuit_breaker(base_url, api_key, timeout, 3, 60)
    }

    pub fn with_circuit_breaker(
        base_url: String,
        api_key: String,
        timeout: Duration,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        CasinoClient {
            client,
            base_url,
            api_key,
            circuit_breaker,
        }
    }

    /// Returns the current state of the circuit breaker
    pub fn circuit_state(&self) -> String {
        if self.circuit_breaker.is_call_permitted() {
            "closed".to_string()
        } else {
            "open".to_string()
        }
    }

    /// Reachability probe. Any response that is not a server error counts:
    /// the API being up matters here, not the route.
    pub async fn ping(&self) -> Result<(), CasinoError> {
        let response = self
            .client
            .get(self.base_url.trim_end_matches('/'))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CasinoError::Timeout
                } else {
                    CasinoError::RequestError(e)
                }
            })?;

        if response.status().is_server_error() {
            return Err(CasinoError::ApiStatus(response.status().as_u16()));
        }
        Ok(())
    }

    pub async fn send_transfer(
        &self,
        req: &TransferRequest,
    ) -> Result<TransferReceipt, CasinoError> {
        let url = format!(
            "{}/api/v1/transfers",
            self.base_url.trim_end_matches('/')
        );
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let body = TransferRequestBody {
            amount: req.amount.to_string(),
            account_id: req.account_id.clone(),
            username: req.username.clone(),
            nonce: req.nonce.clone(),
        };

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client
                    .post(&url)
                    .bearer_auth(&api_key)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| {
                        if e.is_timeout() {
                            CasinoError::Timeout
                        } else {
                            CasinoError::RequestError(e)
                        }
                    })?;

                let status = response.status();
                if !status.is_success() {
                    return Err(CasinoError::ApiStatus(status.as_u16()));
                }

                let parsed = response
                    .json::<TransferResponseBody>()
                    .await
                    .map_err(|e| CasinoError::InvalidResponse(e.to_string()))?;
                Ok(parsed)
            })
            .await;

        match result {
            Ok(parsed) => Ok(TransferReceipt {
                success: parsed.success,
                transfer_id: parsed.transfer_id,
                message: parsed.message,
            }),
            Err(FailsafeError::Rejected) => Err(CasinoError::CircuitBreakerOpen(
                "casino API circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

#[async_trait]
impl LedgerTransfer for CasinoClient {
    async fn transfer(&self, req: TransferRequest) -> Result<TransferReceipt, TransferError> {
        self.send_transfer(&req).await.map_err(|e| match e {
            CasinoError::Timeout => TransferError::Timeout,
            CasinoError::CircuitBreakerOpen(msg) => TransferError::Unavailable(msg),
            other => TransferError::Transport(other.to_string()),
        })
    }
}
