//! Failure queue client: records unrecoverable send failures for an
//! independent retry worker to consume.
//!
//! Best-effort, never raises — matching the teacher's
//! `mark_broadcast`-style RPC calls in `signer.rs`, which log and
//! swallow rather than propagate.

use async_trait::async_trait;
use tracing::warn;

use crate::scanner::LIQ_QUEUE_CHAIN_ID;

const MAX_ERROR_LEN: usize = 500;

#[async_trait]
pub trait FailureQueueClient: Send + Sync {
    async fn enqueue(&self, wallet: &str, market_hex: &str, error: &str, priority: u32);
}

pub struct RemoteFailureQueueClient {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl RemoteFailureQueueClient {
    pub fn new(base_url: Option<String>) -> Self {
        Self { client: reqwest::Client::new(), base_url }
    }
}

#[async_trait]
impl FailureQueueClient for RemoteFailureQueueClient {
    async fn enqueue(&self, wallet: &str, market_hex: &str, error: &str, priority: u32) {
        let Some(base_url) = &self.base_url else {
            warn!(wallet, market_hex, priority, "no failure queue configured, dropping job");
            return;
        };

        let truncated: String = error.chars().take(MAX_ERROR_LEN).collect();
        let result = self
            .client
            .post(format!("{base_url}/enqueue_liq_job"))
            .json(&serde_json::json!({
                "address": wallet.to_ascii_lowercase(),
                "marketId": market_hex.to_ascii_lowercase(),
                "chainId": LIQ_QUEUE_CHAIN_ID,
                "error": truncated,
                "priority": priority,
            }))
            .send()
            .await;

        if let Err(e) = result {
            warn!(wallet, market_hex, error = %e, "failure queue enqueue failed");
        }
    }
}
