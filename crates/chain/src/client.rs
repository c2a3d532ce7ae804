//! EVM RPC client abstraction.
//!
//! Everything the core needs from the chain is expressed as a trait so
//! the scanner and reconciler can be exercised against an in-memory
//! fake. [`AlloyChainClient`] is the production implementation, built
//! on `alloy` providers the same way `ProviderManager`/`TransactionSender`
//! were in the original bot.

use std::time::Duration;

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, B256, I256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::contracts::ICoreVault;

/// Tagged send-path failures, replacing substring matching on error text.
///
/// The RPC error text is still inspected, but only here, at the single
/// point that actually has the raw message — everything downstream
/// matches on the variant.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("block gas limit exceeded")]
    BlockGasLimit,
    #[error("transaction reverted: {0}")]
    Reverted(B256),
    #[error("receipt wait timed out: {0}")]
    ReceiptTimeout(B256),
    #[error("{0}")]
    Other(String),
}

impl SendError {
    /// True for failures the scanner should retry on the big pool.
    pub fn is_retryable_on_big_pool(&self) -> bool {
        matches!(self, Self::BlockGasLimit | Self::Reverted(_) | Self::ReceiptTimeout(_))
    }

    fn classify(raw: &str) -> Self {
        let lower = raw.to_ascii_lowercase();
        if lower.contains("block gas limit") || lower.contains("exceeds block gas limit") || lower.contains("gas limit reached") {
            Self::BlockGasLimit
        } else {
            Self::Other(raw.to_string())
        }
    }
}

/// Outcome of waiting for a transaction receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

/// Position summary as read from `CoreVault::getPositionSummary`.
#[derive(Debug, Clone, Copy)]
pub struct PositionSummary {
    pub size: I256,
    pub entry_price: U256,
    pub margin_locked: U256,
}

/// Everything the liquidation core reads from or writes to the chain.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// `getLiquidationPrice(user, marketId) -> (uint256, bool)`.
    async fn get_liquidation_price(
        &self,
        core_vault: Address,
        user: Address,
        market_id: B256,
    ) -> anyhow::Result<(U256, bool)>;

    /// `getPositionSummary(user, marketId) -> (int256, uint256, uint256)`.
    async fn get_position_summary(
        &self,
        core_vault: Address,
        user: Address,
        market_id: B256,
    ) -> anyhow::Result<PositionSummary>;

    /// `OrderBook::calculateMarkPrice()`.
    async fn calculate_mark_price(&self, order_book: Address) -> anyhow::Result<U256>;

    /// Estimate gas for a `liquidateDirect` call. Failure is not fatal to
    /// the caller — the scanner falls back to the preferred pool.
    async fn estimate_gas(
        &self,
        core_vault: Address,
        from: Address,
        market_id: B256,
        trader: Address,
    ) -> anyhow::Result<u64>;

    /// Dry-run `liquidateDirect` without broadcasting. A revert here is
    /// deterministic and must not be queued for retry.
    async fn simulate_contract(
        &self,
        core_vault: Address,
        from: Address,
        market_id: B256,
        trader: Address,
    ) -> Result<(), SendError>;

    /// Pending transaction count for `address`, used as the nonce
    /// fallback when the allocator is disabled or unreachable.
    async fn get_transaction_count(&self, address: Address) -> anyhow::Result<u64>;

    /// Sign and broadcast `liquidateDirect(marketId, trader)` from the
    /// relayer identified by `signing_key`, at the given nonce.
    async fn write_contract(
        &self,
        core_vault: Address,
        signing_key: &str,
        chain_id: u64,
        market_id: B256,
        trader: Address,
        nonce: u64,
        gas_limit: Option<u64>,
    ) -> Result<(B256, Address), SendError>;

    /// Block until a receipt is available or `timeout` elapses.
    async fn wait_for_receipt(&self, tx_hash: B256, timeout: Duration) -> Result<ReceiptStatus, SendError>;
}

/// Production [`ChainClient`] backed by `alloy` HTTP providers.
pub struct AlloyChainClient {
    read_url: String,
    send_url: String,
}

impl AlloyChainClient {
    pub fn new(read_url: impl Into<String>, send_url: impl Into<String>) -> Self {
        Self {
            read_url: read_url.into(),
            send_url: send_url.into(),
        }
    }

    fn read_provider(&self) -> anyhow::Result<impl Provider> {
        Ok(ProviderBuilder::new().on_http(self.read_url.parse()?))
    }
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    async fn get_liquidation_price(
        &self,
        core_vault: Address,
        user: Address,
        market_id: B256,
    ) -> anyhow::Result<(U256, bool)> {
        let provider = self.read_provider()?;
        let contract = ICoreVault::new(core_vault, provider);
        let result = contract.getLiquidationPrice(user, market_id).call().await?;
        Ok((result._0, result._1))
    }

    async fn get_position_summary(
        &self,
        core_vault: Address,
        user: Address,
        market_id: B256,
    ) -> anyhow::Result<PositionSummary> {
        let provider = self.read_provider()?;
        let contract = ICoreVault::new(core_vault, provider);
        let result = contract.getPositionSummary(user, market_id).call().await?;
        Ok(PositionSummary {
            size: result.size,
            entry_price: result.entryPrice,
            margin_locked: result.marginLocked,
        })
    }

    async fn calculate_mark_price(&self, order_book: Address) -> anyhow::Result<U256> {
        let provider = self.read_provider()?;
        let contract = crate::contracts::IOrderBook::new(order_book, provider);
        let price = contract.calculateMarkPrice().call().await?;
        Ok(price._0)
    }

    async fn estimate_gas(
        &self,
        core_vault: Address,
        from: Address,
        market_id: B256,
        trader: Address,
    ) -> anyhow::Result<u64> {
        let provider = self.read_provider()?;
        let calldata = ICoreVault::liquidateDirectCall { marketId: market_id, trader }.abi_encode();
        let tx = TransactionRequest::default()
            .with_from(from)
            .with_to(core_vault)
            .with_input(Bytes::from(calldata));
        let gas = provider.estimate_gas(tx).await?;
        Ok(gas)
    }

    async fn simulate_contract(
        &self,
        core_vault: Address,
        from: Address,
        market_id: B256,
        trader: Address,
    ) -> Result<(), SendError> {
        let provider = self
            .read_provider()
            .map_err(|e| SendError::Other(e.to_string()))?;
        let calldata = ICoreVault::liquidateDirectCall { marketId: market_id, trader }.abi_encode();
        let tx = TransactionRequest::default()
            .with_from(from)
            .with_to(core_vault)
            .with_input(Bytes::from(calldata));
        provider
            .call(tx)
            .await
            .map(|_| ())
            .map_err(|e| SendError::Other(e.to_string()))
    }

    async fn get_transaction_count(&self, address: Address) -> anyhow::Result<u64> {
        let provider = self.read_provider()?;
        Ok(provider.get_transaction_count(address).await?)
    }

    async fn write_contract(
        &self,
        core_vault: Address,
        signing_key: &str,
        chain_id: u64,
        market_id: B256,
        trader: Address,
        nonce: u64,
        gas_limit: Option<u64>,
    ) -> Result<(B256, Address), SendError> {
        let key_str = signing_key.trim_start_matches("0x");
        let signer: PrivateKeySigner = key_str
            .parse()
            .map_err(|e| SendError::Other(format!("{e}")))?;
        let address = signer.address();
        let wallet = EthereumWallet::from(signer);

        let calldata = ICoreVault::liquidateDirectCall { marketId: market_id, trader }.abi_encode();
        let mut tx = TransactionRequest::default()
            .with_to(core_vault)
            .with_input(Bytes::from(calldata))
            .with_nonce(nonce)
            .with_chain_id(chain_id);
        if let Some(limit) = gas_limit {
            tx = tx.with_gas_limit(limit);
        }

        let send_url = self
            .send_url
            .parse()
            .map_err(|e| SendError::Other(format!("invalid send url: {e}")))?;
        let provider = ProviderBuilder::new().wallet(wallet).on_http(send_url);

        let pending = provider
            .send_transaction(tx)
            .await
            .map_err(|e| SendError::classify(&e.to_string()))?;
        let tx_hash = *pending.tx_hash();
        debug!(tx_hash = %tx_hash, relayer = %address, "liquidateDirect submitted");
        Ok((tx_hash, address))
    }

    async fn wait_for_receipt(&self, tx_hash: B256, timeout: Duration) -> Result<ReceiptStatus, SendError> {
        let provider = self
            .read_provider()
            .map_err(|e| SendError::Other(e.to_string()))?;

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match provider.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    return Ok(if receipt.status() {
                        ReceiptStatus::Success
                    } else {
                        ReceiptStatus::Reverted
                    });
                }
                Ok(None) => {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(SendError::ReceiptTimeout(tx_hash));
                    }
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
                Err(e) => {
                    warn!(tx_hash = %tx_hash, error = %e, "receipt check failed");
                    if tokio::time::Instant::now() >= deadline {
                        return Err(SendError::ReceiptTimeout(tx_hash));
                    }
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
            }
        }
    }
}
