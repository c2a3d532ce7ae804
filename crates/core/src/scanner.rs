//! Liquidation scanner: for a `(market, mark_price)`, enumerates
//! candidates, verifies them on-chain, routes to a relayer pool,
//! simulates, sends, retries, and enqueues unrecoverable failures.
//!
//! Each candidate's evaluation is encoded as an explicit outcome
//! variant rather than the teacher's flat `continue`-based control
//! flow in its own `scanner.rs` — the per-candidate state machine
//! below is this core's own, built around `Skipped | Rejected | Sent
//! | Failed` so the full trace of a candidate survives to the
//! response instead of being lost to an early `continue`.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, I256, U256};
use liquidator_chain::{ChainClient, ReceiptStatus, SendError};
use tracing::{info, warn};
use uuid::Uuid;

use crate::failure_queue::FailureQueueClient;
use crate::fixed;
use crate::nonce::NonceAllocatorClient;
use crate::reconcile;
use crate::relayer::{PoolName, RelayerPool};
use crate::store::{self, Store};

const RECEIPT_TIMEOUT: Duration = Duration::from_secs(60);
const GAS_ESTIMATE_MARGIN: u64 = 50_000;
pub const LIQ_QUEUE_CHAIN_ID: u64 = 999;

const PRIORITY_SEND_FAIL: u32 = 5;
const PRIORITY_BIG_SEND_FAIL: u32 = 8;
const PRIORITY_NO_RELAYER: u32 = 10;

/// Per-candidate state machine stages, retained for observability even
/// though only the terminal [`CandidateOutcome`] is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Loaded,
    Checked,
    Reconciled,
    Eligible,
    Estimated,
    Simulated,
    Sent,
    Confirmed,
}

#[derive(Debug, Clone)]
pub enum SkipReason {
    NoPosition,
    ZeroPosition,
    NoLiquidationPrice,
    NotEligible,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NoPosition => "SKIPPED_NO_POS",
            SkipReason::ZeroPosition => "SKIPPED_ZERO",
            SkipReason::NoLiquidationPrice => "SKIPPED_NO_LIQ",
            SkipReason::NotEligible => "SKIPPED_NOT_ELIGIBLE",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LiquidationOutcome {
    pub wallet: String,
    pub market_hex: String,
    pub tx_hash: String,
    pub relayer_address: String,
    pub pool_used: &'static str,
    pub rerouted_to_big: bool,
    pub estimated_gas: Option<u64>,
}

#[derive(Debug, Clone)]
pub enum CandidateOutcome {
    Skipped(SkipReason),
    Rejected,
    Sent(LiquidationOutcome),
    Failed(String),
}

pub struct ScanResult {
    pub liquidations: Vec<LiquidationOutcome>,
    pub checked: usize,
}

pub struct ScannerContext {
    pub store: Arc<dyn Store>,
    pub chain: Arc<dyn ChainClient>,
    pub relayers: Arc<RelayerPool>,
    pub nonce_allocator: Arc<dyn NonceAllocatorClient>,
    pub failure_queue: Arc<dyn FailureQueueClient>,
    pub core_vault: Address,
}

/// Entry point: scans every aggregated wallet in `market` against
/// `mark_price` and attempts to liquidate each eligible one,
/// sequentially — a deliberate choice (see spec's concurrency model)
/// so simulate/send against a relayer's pending-nonce view does not
/// race across candidates within the same request.
pub async fn scan_and_liquidate(
    ctx: &ScannerContext,
    market: Uuid,
    market_hex: &str,
    mark_price: U256,
) -> anyhow::Result<ScanResult> {
    let candidates = store::load_candidates(ctx.store.as_ref(), market).await?;
    let mut liquidations = Vec::new();
    let checked = candidates.len();

    for candidate in candidates {
        let outcome = evaluate_candidate(ctx, market, market_hex, mark_price, &candidate).await;
        if let CandidateOutcome::Sent(outcome) = outcome {
            liquidations.push(outcome);
        }
    }

    Ok(ScanResult { liquidations, checked })
}

async fn evaluate_candidate(
    ctx: &ScannerContext,
    market: Uuid,
    market_hex: &str,
    mark_price: U256,
    candidate: &store::WalletAggregate,
) -> CandidateOutcome {
    let wallet: Address = match candidate.wallet.parse() {
        Ok(w) => w,
        Err(_) => return CandidateOutcome::Skipped(SkipReason::NoPosition),
    };
    let market_id = match market_hex.parse() {
        Ok(id) => id,
        Err(_) => return CandidateOutcome::Skipped(SkipReason::NoPosition),
    };

    // LOADED -> CHECKED: read on-chain liquidation price and position flag.
    let (liq_on_chain, has_pos) = match ctx.chain.get_liquidation_price(ctx.core_vault, wallet, market_id).await {
        Ok(v) => v,
        Err(e) => {
            warn!(wallet = %candidate.wallet, error = %e, "get_liquidation_price failed, treating as no position");
            return CandidateOutcome::Skipped(SkipReason::NoPosition);
        }
    };
    if !has_pos {
        return CandidateOutcome::Skipped(SkipReason::NoPosition);
    }

    // CHECKED -> RECONCILED: on-chain size becomes the effective net.
    let reconcile_outcome = reconcile::reconcile(
        ctx.store.as_ref(),
        ctx.chain.as_ref(),
        ctx.core_vault,
        market,
        market_hex,
        wallet,
        candidate.net_raw,
    )
    .await;

    let effective_net = reconcile_outcome.on_chain_size.unwrap_or(candidate.net_raw);
    if effective_net.is_zero() {
        return CandidateOutcome::Skipped(SkipReason::ZeroPosition);
    }

    let liq_price: U256 = if !liq_on_chain.is_zero() {
        liq_on_chain
    } else {
        match candidate.liq_hint {
            Some(hint) if !hint.is_zero() => hint.into_raw(),
            _ => return CandidateOutcome::Skipped(SkipReason::NoLiquidationPrice),
        }
    };

    // RECONCILED -> ELIGIBLE
    let long = effective_net.is_positive();
    let eligible = if long { mark_price <= liq_price } else { mark_price >= liq_price };
    if !eligible {
        return CandidateOutcome::Skipped(SkipReason::NotEligible);
    }

    send_with_retry(ctx, market_hex, wallet, &candidate.wallet).await
}

/// ELIGIBLE -> ESTIMATED -> SIMULATED -> SENT -> CONFIRMED, with the
/// single retry-on-big-pool fallback per spec.
async fn send_with_retry(
    ctx: &ScannerContext,
    market_hex: &str,
    trader: Address,
    wallet_display: &str,
) -> CandidateOutcome {
    let market_id = match market_hex.parse() {
        Ok(id) => id,
        Err(_) => return CandidateOutcome::Skipped(SkipReason::NoPosition),
    };

    let (pool, estimated_gas) = route_pool(ctx, market_id, trader).await;

    match attempt_send(ctx, market_hex, trader, market_id, pool, estimated_gas).await {
        Ok(mut outcome) => {
            outcome.wallet = wallet_display.to_string();
            CandidateOutcome::Sent(outcome)
        }
        Err(AttemptError::Rejected) => CandidateOutcome::Rejected,
        Err(AttemptError::Retryable(err)) => {
            if pool == PoolName::Big || ctx.relayers.is_empty(PoolName::Big) {
                let priority = if pool == PoolName::Big { PRIORITY_BIG_SEND_FAIL } else { PRIORITY_SEND_FAIL };
                enqueue_failure(ctx, wallet_display, market_hex, &err.to_string(), priority).await;
                return CandidateOutcome::Failed(err.to_string());
            }
            match attempt_send(ctx, market_hex, trader, market_id, PoolName::Big, None).await {
                Ok(mut outcome) => {
                    outcome.wallet = wallet_display.to_string();
                    outcome.rerouted_to_big = true;
                    CandidateOutcome::Sent(outcome)
                }
                Err(AttemptError::Rejected) => CandidateOutcome::Rejected,
                Err(AttemptError::Retryable(err2)) => {
                    enqueue_failure(ctx, wallet_display, market_hex, &err2.to_string(), PRIORITY_BIG_SEND_FAIL).await;
                    CandidateOutcome::Failed(err2.to_string())
                }
                Err(AttemptError::NoRelayer) => {
                    enqueue_failure(ctx, wallet_display, market_hex, "no_relayer_available", PRIORITY_NO_RELAYER).await;
                    CandidateOutcome::Failed("no_relayer_available".to_string())
                }
            }
        }
        Err(AttemptError::NoRelayer) => {
            enqueue_failure(ctx, wallet_display, market_hex, "no_relayer_available", PRIORITY_NO_RELAYER).await;
            CandidateOutcome::Failed("no_relayer_available".to_string())
        }
    }
}

async fn route_pool(ctx: &ScannerContext, market_id: alloy::primitives::B256, trader: Address) -> (PoolName, Option<u64>) {
    let from = ctx
        .relayers
        .pick_round_robin(PoolName::Small)
        .map(|r| r.address)
        .unwrap_or(Address::ZERO);

    match ctx.chain.estimate_gas(ctx.core_vault, from, market_id, trader).await {
        Ok(estimated) => {
            let buffered = ctx.relayers.buffered_gas(estimated);
            if buffered > crate::relayer::SMALL_BLOCK_GAS {
                (PoolName::Big, Some(estimated))
            } else if !ctx.relayers.is_empty(PoolName::Small) {
                (PoolName::Small, Some(estimated))
            } else {
                (PoolName::Big, Some(estimated))
            }
        }
        Err(_) => {
            let preferred = if !ctx.relayers.is_empty(PoolName::Small) { PoolName::Small } else { PoolName::Big };
            (preferred, None)
        }
    }
}

enum AttemptError {
    Rejected,
    Retryable(SendError),
    NoRelayer,
}

async fn attempt_send(
    ctx: &ScannerContext,
    market_hex: &str,
    trader: Address,
    market_id: alloy::primitives::B256,
    pool: PoolName,
    estimated_gas: Option<u64>,
) -> Result<LiquidationOutcome, AttemptError> {
    let relayer = ctx.relayers.pick_round_robin(pool).ok_or(AttemptError::NoRelayer)?;

    // SIMULATED: a revert here is deterministic, so it is rejected, not queued.
    if let Err(e) = ctx
        .chain
        .simulate_contract(ctx.core_vault, relayer.address, market_id, trader)
        .await
    {
        warn!(trader = %trader, pool = pool.as_str(), error = %e, "simulation reverted, rejecting candidate");
        return Err(AttemptError::Rejected);
    }

    let buffered = estimated_gas.map(|g| ctx.relayers.buffered_gas(g));
    let desired_gas = buffered.map(|b| b + GAS_ESTIMATE_MARGIN);
    let gas_limit = desired_gas.map(|g| g.min(ctx.relayers.gas_cap(pool)));

    match send_liquidation_tx(ctx, relayer.clone(), pool, market_hex, market_id, trader, gas_limit).await {
        Ok(mut outcome) => {
            outcome.estimated_gas = estimated_gas;
            Ok(outcome)
        }
        Err(e) => Err(AttemptError::Retryable(e)),
    }
}

/// `send_liquidation_tx`: allocate nonce, broadcast, best-effort mark,
/// wait for receipt.
async fn send_liquidation_tx(
    ctx: &ScannerContext,
    relayer: crate::relayer::Relayer,
    pool: PoolName,
    market_hex: &str,
    market_id: alloy::primitives::B256,
    trader: Address,
    gas_limit: Option<u64>,
) -> Result<LiquidationOutcome, SendError> {
    let nonce = ctx
        .nonce_allocator
        .allocate(relayer.address, LIQ_QUEUE_CHAIN_ID, market_hex, "liquidateDirect")
        .await
        .map_err(|e| SendError::Other(format!("nonce allocation failed: {e}")))?;

    let (tx_hash, relayer_address) = ctx
        .chain
        .write_contract(
            ctx.core_vault,
            &relayer.signing_key,
            LIQ_QUEUE_CHAIN_ID,
            market_id,
            trader,
            nonce,
            gas_limit,
        )
        .await?;

    ctx.nonce_allocator.mark_broadcast(relayer.address, LIQ_QUEUE_CHAIN_ID, nonce, tx_hash).await;

    match ctx.chain.wait_for_receipt(tx_hash, RECEIPT_TIMEOUT).await? {
        ReceiptStatus::Success => {
            info!(trader = %trader, tx_hash = %tx_hash, pool = pool.as_str(), "liquidation confirmed");
            Ok(LiquidationOutcome {
                wallet: String::new(),
                market_hex: market_hex.to_string(),
                tx_hash: format!("{tx_hash:#x}"),
                relayer_address: format!("{relayer_address:#x}"),
                pool_used: pool.as_str(),
                rerouted_to_big: false,
                estimated_gas: None,
            })
        }
        ReceiptStatus::Reverted => Err(SendError::Reverted(tx_hash)),
    }
}

async fn enqueue_failure(ctx: &ScannerContext, wallet: &str, market_hex: &str, error: &str, priority: u32) {
    ctx.failure_queue.enqueue(wallet, market_hex, error, priority).await;
}

#[allow(dead_code)]
fn amount_display(v: I256) -> String {
    fixed::format_units(v, fixed::AMOUNT_DECIMALS)
}
