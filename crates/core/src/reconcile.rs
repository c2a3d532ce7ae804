//! Position reconciler: brings the database net position into
//! agreement with the on-chain truth.
//!
//! Grounded in the teacher's accumulation-style position math
//! (`u256_math.rs`/`position.rs`), generalized to an async paginated
//! fetch (`store::db_net_position`) and an on-chain read through
//! [`ChainClient`] instead of a synchronous in-memory tracker.

use alloy::primitives::{Address, I256, U256};
use liquidator_chain::ChainClient;
use tracing::{info, warn};
use uuid::Uuid;

use crate::store::Store;

#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub on_chain_size: Option<I256>,
    pub reconciled: bool,
}

/// Reads on-chain position for `(wallet, market)` and, if it diverges
/// from `db_net`, applies a synthetic correcting row through
/// `net_user_trade`. Reconciliation failures are logged and never
/// propagated — a candidate evaluation must continue regardless.
pub async fn reconcile(
    store: &dyn Store,
    chain: &dyn ChainClient,
    core_vault: Address,
    market: Uuid,
    market_hex: &str,
    wallet: Address,
    db_net: I256,
) -> ReconcileOutcome {
    let market_id = match market_hex.parse() {
        Ok(id) => id,
        Err(e) => {
            warn!(market_hex, error = %e, "invalid market hex, skipping reconciliation");
            return ReconcileOutcome { on_chain_size: None, reconciled: false };
        }
    };

    let summary = match chain.get_position_summary(core_vault, wallet, market_id).await {
        Ok(s) => s,
        Err(e) => {
            warn!(wallet = %wallet, market_hex, error = %e, "failed to read on-chain position, skipping reconciliation");
            return ReconcileOutcome { on_chain_size: None, reconciled: false };
        }
    };

    if summary.size.is_zero() || summary.size == db_net {
        return ReconcileOutcome { on_chain_size: Some(summary.size), reconciled: false };
    }

    let delta = summary.size - db_net;
    let wallet_lower = format!("{wallet:#x}");
    let now = chrono_now_secs();

    match store
        .net_user_trade(market, &wallet_lower, delta, I256::ZERO, None, now, "")
        .await
    {
        Ok(()) => {
            info!(
                wallet = %wallet_lower,
                market_hex,
                delta = %crate::fixed::format_units(delta, crate::fixed::AMOUNT_DECIMALS),
                "reconciled DB position to on-chain"
            );
            ReconcileOutcome { on_chain_size: Some(summary.size), reconciled: true }
        }
        Err(e) => {
            warn!(wallet = %wallet_lower, market_hex, error = %e, "reconciliation write failed");
            ReconcileOutcome { on_chain_size: Some(summary.size), reconciled: false }
        }
    }
}

/// Reconciles a trader's DB position to `remaining_size` after a
/// `LiquidationCompleted` event — applies only the delta, closing the
/// position exactly when `remaining_size` is zero.
pub async fn reconcile_to_remaining_size(
    store: &dyn Store,
    market: Uuid,
    wallet: Address,
    db_net: I256,
    remaining_size: I256,
) -> anyhow::Result<()> {
    let delta = remaining_size - db_net;
    if delta.is_zero() {
        return Ok(());
    }
    let wallet_lower = format!("{wallet:#x}");
    let now = chrono_now_secs();
    store.net_user_trade(market, &wallet_lower, delta, I256::ZERO, None, now, "").await
}

fn chrono_now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Convenience: formats a `U256` price as a price-scale display string.
pub fn format_price(price: U256) -> String {
    let signed = I256::from_raw(price);
    crate::fixed::format_units(signed, crate::fixed::PRICE_DECIMALS)
}
