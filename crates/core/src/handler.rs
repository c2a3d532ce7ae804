//! Event handler: dispatches decoded webhook logs per event kind and
//! accumulates a structured per-log result list.
//!
//! `HandlerContext` bundles every external collaborator behind `Arc`,
//! mirroring how the teacher wires `Arc<...>` components once into
//! `Scanner::new` in `initialize_components` rather than passing raw
//! handles around.

use std::sync::Arc;

use alloy::primitives::U256;
use liquidator_chain::ChainClient;
use serde::Serialize;
use tracing::warn;

use crate::events::{self, DecodedEvent, RawLog};
use crate::failure_queue::FailureQueueClient;
use crate::fixed;
use crate::market::MarketResolver;
use crate::nonce::NonceAllocatorClient;
use crate::reconcile;
use crate::relayer::RelayerPool;
use crate::scanner::{self, ScannerContext};
use crate::store::{self, Store};

pub struct HandlerContext {
    pub store: Arc<dyn Store>,
    pub chain: Arc<dyn ChainClient>,
    pub market_resolver: Arc<MarketResolver>,
    pub relayers: Arc<RelayerPool>,
    pub nonce_allocator: Arc<dyn NonceAllocatorClient>,
    pub failure_queue: Arc<dyn FailureQueueClient>,
    pub core_vault: alloy::primitives::Address,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogResult {
    pub status: &'static str,
    pub event: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liquidations_triggered: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked: Option<usize>,
}

impl LogResult {
    fn ok(event: &'static str, market_id: Option<String>) -> Self {
        Self { status: "ok", event, market_id, reason: None, liquidations_triggered: None, checked: None }
    }

    fn skipped(event: &'static str, reason: impl Into<String>) -> Self {
        Self { status: "skipped", event, market_id: None, reason: Some(reason.into()), liquidations_triggered: None, checked: None }
    }
}

pub struct WebhookResult {
    pub processed: usize,
    pub results: Vec<LogResult>,
}

/// Parses the body, extracts the log list (tolerating a malformed
/// body by proceeding with an empty one), decodes and dispatches each
/// log, and accumulates a result per log.
pub async fn handle_webhook(body: &serde_json::Value, ctx: &HandlerContext) -> WebhookResult {
    let logs = events::extract_logs(body);
    let mut results = Vec::with_capacity(logs.len());

    for log in &logs {
        let decoded = events::decode_log(log);
        let result = match decoded {
            Some(event) => handle_event(ctx, log, event).await,
            None => continue,
        };
        results.push(result);
    }

    WebhookResult { processed: results.len(), results }
}

async fn handle_event(ctx: &HandlerContext, log: &RawLog, event: DecodedEvent) -> LogResult {
    match event {
        DecodedEvent::TradeRecorded { market_id, buyer, seller, price, amount, liquidation_price } => {
            handle_trade_recorded(ctx, &market_id, buyer, seller, price, amount, liquidation_price).await
        }
        DecodedEvent::PriceUpdated { current_mark_price } => {
            handle_price_updated(ctx, log, current_mark_price).await
        }
        DecodedEvent::OrderPlaced => handle_order_event(ctx, log, "OrderPlaced").await,
        DecodedEvent::OrderCancelled => handle_order_event(ctx, log, "OrderCancelled").await,
        DecodedEvent::OrderModified => handle_order_event(ctx, log, "OrderModified").await,
        DecodedEvent::LiquidationCompleted { trader, remaining_size } => {
            handle_liquidation_completed(ctx, log, trader, remaining_size).await
        }
    }
}

async fn handle_trade_recorded(
    ctx: &HandlerContext,
    market_id_hex: &str,
    buyer: alloy::primitives::Address,
    seller: alloy::primitives::Address,
    price: U256,
    amount: U256,
    liquidation_price: U256,
) -> LogResult {
    let market = match ctx.market_resolver.resolve_by_hex(ctx.store.as_ref(), market_id_hex).await {
        Ok(Some(m)) => m,
        Ok(None) => return LogResult::skipped("TradeRecorded", "market_not_found"),
        Err(e) => {
            warn!(error = %e, "market lookup failed");
            return LogResult::skipped("TradeRecorded", "store_read_failed");
        }
    };

    if amount.is_zero() {
        return LogResult::skipped("TradeRecorded", "zero_amount");
    }

    let signed_amount = alloy::primitives::I256::from_raw(amount);
    let signed_price = alloy::primitives::I256::from_raw(price);
    let signed_liq_price = if liquidation_price.is_zero() { None } else { Some(alloy::primitives::I256::from_raw(liquidation_price)) };
    let now = chrono::Utc::now().timestamp();

    let buyer_lower = format!("{buyer:#x}");
    let seller_lower = format!("{seller:#x}");

    if let Err(e) = ctx
        .store
        .net_user_trade(market, &buyer_lower, signed_amount, signed_price, None, now, "")
        .await
    {
        warn!(error = %e, wallet = %buyer_lower, "buyer trade write failed");
    }
    if let Err(e) = ctx
        .store
        .net_user_trade(market, &seller_lower, -signed_amount, signed_price, signed_liq_price, now, "")
        .await
    {
        warn!(error = %e, wallet = %seller_lower, "seller trade write failed");
    }

    for (wallet, addr) in [(&buyer_lower, buyer), (&seller_lower, seller)] {
        let net = match store::db_net_position(ctx.store.as_ref(), market, wallet).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, wallet, "could not read db net position for reconciliation");
                continue;
            }
        };
        reconcile::reconcile(
            ctx.store.as_ref(),
            ctx.chain.as_ref(),
            ctx.core_vault,
            market,
            market_id_hex,
            addr,
            net,
        )
        .await;
    }

    LogResult::ok("TradeRecorded", Some(market_id_hex.to_string()))
}

async fn handle_price_updated(ctx: &HandlerContext, log: &RawLog, current_mark_price: U256) -> LogResult {
    let Some(source) = source_address(log) else {
        return LogResult::skipped("PriceUpdated", "no_source_address");
    };
    let market = match ctx.market_resolver.resolve_by_address(ctx.store.as_ref(), &source).await {
        Ok(Some(m)) => m,
        Ok(None) => return LogResult::skipped("PriceUpdated", "market_not_found"),
        Err(e) => {
            warn!(error = %e, "market lookup failed");
            return LogResult::skipped("PriceUpdated", "store_read_failed");
        }
    };

    run_scan(ctx, market.uuid, &market.hex, current_mark_price, "PriceUpdated").await
}

async fn handle_order_event(ctx: &HandlerContext, log: &RawLog, event: &'static str) -> LogResult {
    let Some(source) = source_address(log) else {
        return LogResult::skipped(event, "no_source_address");
    };
    let market = match ctx.market_resolver.resolve_by_address(ctx.store.as_ref(), &source).await {
        Ok(Some(m)) => m,
        Ok(None) => return LogResult::skipped(event, "market_not_found"),
        Err(e) => {
            warn!(error = %e, "market lookup failed");
            return LogResult::skipped(event, "store_read_failed");
        }
    };

    let order_book: alloy::primitives::Address = match source.parse() {
        Ok(a) => a,
        Err(_) => return LogResult::skipped(event, "invalid_source_address"),
    };
    let mark_price = match ctx.chain.calculate_mark_price(order_book).await {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "calculateMarkPrice failed");
            return LogResult::skipped(event, "mark_price_read_failed");
        }
    };

    run_scan(ctx, market.uuid, &market.hex, mark_price, event).await
}

async fn run_scan(ctx: &HandlerContext, market_uuid: uuid::Uuid, market_hex: &str, mark_price: U256, event: &'static str) -> LogResult {
    let scanner_ctx = ScannerContext {
        store: ctx.store.clone(),
        chain: ctx.chain.clone(),
        relayers: ctx.relayers.clone(),
        nonce_allocator: ctx.nonce_allocator.clone(),
        failure_queue: ctx.failure_queue.clone(),
        core_vault: ctx.core_vault,
    };

    match scanner::scan_and_liquidate(&scanner_ctx, market_uuid, market_hex, mark_price).await {
        Ok(result) => LogResult {
            status: "ok",
            event,
            market_id: Some(market_hex.to_string()),
            reason: None,
            liquidations_triggered: Some(result.liquidations.len()),
            checked: Some(result.checked),
        },
        Err(e) => {
            warn!(error = %e, "scan failed");
            LogResult::skipped(event, "scan_failed")
        }
    }
}

async fn handle_liquidation_completed(
    ctx: &HandlerContext,
    log: &RawLog,
    trader: alloy::primitives::Address,
    remaining_size: alloy::primitives::I256,
) -> LogResult {
    // The ABI carries no market id on this event, so the market is
    // resolved from the log's source address the same way order
    // events resolve it.
    let Some(source) = source_address(log) else {
        return LogResult::skipped("LiquidationCompleted", "no_source_address");
    };
    let market = match ctx.market_resolver.resolve_by_address(ctx.store.as_ref(), &source).await {
        Ok(Some(m)) => m.uuid,
        Ok(None) => return LogResult::skipped("LiquidationCompleted", "market_not_found"),
        Err(e) => {
            warn!(error = %e, "market lookup failed");
            return LogResult::skipped("LiquidationCompleted", "store_read_failed");
        }
    };

    let trader_lower = format!("{trader:#x}");

    let db_net = match store::db_net_position(ctx.store.as_ref(), market, &trader_lower).await {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "could not read db net position");
            return LogResult::skipped("LiquidationCompleted", "store_read_failed");
        }
    };

    match reconcile::reconcile_to_remaining_size(ctx.store.as_ref(), market, trader, db_net, remaining_size).await {
        Ok(()) => LogResult::ok("LiquidationCompleted", None),
        Err(e) => {
            warn!(error = %e, "reconciliation to remaining size failed");
            LogResult::skipped("LiquidationCompleted", "reconcile_failed")
        }
    }
}

fn source_address(log: &RawLog) -> Option<String> {
    events::extract_source_addresses(&log.raw).into_iter().next()
}

#[allow(dead_code)]
fn format_amount(v: alloy::primitives::I256) -> String {
    fixed::format_units(v, fixed::AMOUNT_DECIMALS)
}
