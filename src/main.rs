//! Webhook-driven liquidation engine.
//!
//! Consumes authenticated on-chain event notifications, reconciles the
//! off-chain position database against on-chain truth, detects
//! accounts at or past their liquidation price, and dispatches
//! `liquidateDirect` transactions through a pool of relayer signers.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use liquidator_api::AppState;
use liquidator_chain::AlloyChainClient;
use liquidator_core::{Config, HandlerContext, MarketResolver, RelayerPool, RemoteFailureQueueClient, RemoteNonceAllocator};

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,liquidator_core=debug,liquidator_chain=debug")),
        )
        .init();

    info!("Starting liquidation engine");
    info!("Chain: HyperLiquid EVM (999)");

    let config = Config::from_env()?;
    config.log_config();

    let state = initialize_components(&config).await?;

    let addr = std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    info!(%addr, "Starting webhook server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, liquidator_api::app(state)).await?;

    Ok(())
}

async fn initialize_components(config: &Config) -> Result<AppState> {
    info!("Initializing components...");

    let chain: Arc<dyn liquidator_chain::ChainClient> =
        Arc::new(AlloyChainClient::new(config.hub_rpc_url.clone(), config.hub_rpc_url.clone()));

    let relayers = Arc::new(RelayerPool::from_config(config));
    info!("Relayer pool loaded");

    let nonce_allocator = Arc::new(RemoteNonceAllocator::new(
        config.nonce_allocator_url.clone(),
        config.nonce_allocator_disabled(),
        chain.clone(),
    ));

    let failure_queue = Arc::new(RemoteFailureQueueClient::new(config.failure_queue_url.clone()));

    let store: Arc<dyn liquidator_core::Store> = Arc::new(InMemoryStore::default());

    let market_resolver = Arc::new(MarketResolver::new());

    let ctx = Arc::new(HandlerContext {
        store,
        chain,
        market_resolver,
        relayers,
        nonce_allocator,
        failure_queue,
        core_vault: config.core_vault_address,
    });

    info!("All components initialized");

    Ok(AppState { ctx, hmac_secret: config.hmac_secret.clone() })
}

/// Placeholder [`liquidator_core::Store`] used until a real Postgres
/// implementation is wired in — storage is out of scope for this
/// core (see DESIGN.md); this keeps the binary runnable end to end
/// against an empty store.
#[derive(Default)]
struct InMemoryStore {
    inner: parking_lot::Mutex<InMemoryStoreData>,
}

#[derive(Default)]
struct InMemoryStoreData {
    markets_by_hex: std::collections::HashMap<String, uuid::Uuid>,
    markets_by_address: std::collections::HashMap<String, (uuid::Uuid, String)>,
    trades: Vec<(uuid::Uuid, liquidator_core::TradeRow)>,
}

#[async_trait::async_trait]
impl liquidator_core::Store for InMemoryStore {
    async fn lookup_market_by_hex(&self, market_hex: &str) -> Result<Option<uuid::Uuid>> {
        Ok(self.inner.lock().markets_by_hex.get(market_hex).copied())
    }

    async fn lookup_market_by_address(&self, address: &str) -> Result<Option<(uuid::Uuid, String)>> {
        Ok(self.inner.lock().markets_by_address.get(address).cloned())
    }

    async fn fetch_user_trades(
        &self,
        market: uuid::Uuid,
        wallet: Option<&str>,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<liquidator_core::TradeRow>> {
        let guard = self.inner.lock();
        Ok(guard
            .trades
            .iter()
            .filter(|(m, row)| *m == market && wallet.map(|w| row.user_wallet == w).unwrap_or(true))
            .skip(offset as usize)
            .take(limit as usize)
            .map(|(_, row)| row.clone())
            .collect())
    }

    async fn net_user_trade(
        &self,
        market: uuid::Uuid,
        wallet: &str,
        delta: alloy::primitives::I256,
        _price: alloy::primitives::I256,
        liquidation_price: Option<alloy::primitives::I256>,
        _trade_ts: i64,
        _order_book: &str,
    ) -> Result<()> {
        self.inner.lock().trades.push((
            market,
            liquidator_core::TradeRow { user_wallet: wallet.to_string(), liquidation_price, amount: delta },
        ));
        Ok(())
    }
}

fn print_banner() {
    println!(
        r#"
    ╦  ┬┌─┐ ┬ ┬┬┌┬┐┌─┐┌┬┐┌─┐┬─┐
    ║  │├─┤ │││ │ │ │├┬┘
    ╩═╝┴┴ ┴└┴┘┴ ┴ └─┘┴ ┴┴└─
    Liquidation Engine v0.1.0
    "#
    );
}
