//! Storage abstraction.
//!
//! Everything this core needs from Postgres is expressed as a trait —
//! a real implementation is out of scope, but the boundary itself is
//! an ambient concern every external collaborator needs, the same way
//! the teacher constructs `ProviderManager`/`BlockAnaliticaClient` as
//! swappable clients rather than calling a database directly from
//! business logic.

use alloy::primitives::I256;
use async_trait::async_trait;
use uuid::Uuid;

use crate::fixed;

/// One trade row as read from storage.
#[derive(Debug, Clone)]
pub struct TradeRow {
    pub user_wallet: String,
    pub liquidation_price: Option<I256>,
    pub amount: I256,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn lookup_market_by_hex(&self, market_hex: &str) -> anyhow::Result<Option<Uuid>>;

    async fn lookup_market_by_address(&self, address: &str) -> anyhow::Result<Option<(Uuid, String)>>;

    /// Fetches one page of trade rows for `(market, wallet)` — `wallet`
    /// is `None` to fetch all wallets in the market (used by the
    /// scanner's candidate load).
    async fn fetch_user_trades(
        &self,
        market: Uuid,
        wallet: Option<&str>,
        offset: u64,
        limit: u64,
    ) -> anyhow::Result<Vec<TradeRow>>;

    #[allow(clippy::too_many_arguments)]
    async fn net_user_trade(
        &self,
        market: Uuid,
        wallet: &str,
        delta: I256,
        price: I256,
        liquidation_price: Option<I256>,
        trade_ts: i64,
        order_book: &str,
    ) -> anyhow::Result<()>;
}

/// Sums signed amounts across paginated trade rows for a `(market,
/// wallet)` pair, honoring the 1000-per-page / 5000-total cap.
pub async fn db_net_position(store: &dyn Store, market: Uuid, wallet: &str) -> anyhow::Result<I256> {
    const PAGE_SIZE: u64 = 1000;
    const SCAN_CAP: u64 = 5000;

    let mut total = I256::ZERO;
    let mut offset = 0u64;
    loop {
        let rows = store.fetch_user_trades(market, Some(wallet), offset, PAGE_SIZE).await?;
        let fetched = rows.len() as u64;
        for row in &rows {
            total += row.amount;
        }
        offset += fetched;
        if fetched < PAGE_SIZE || offset >= SCAN_CAP {
            break;
        }
    }
    Ok(total)
}

/// Aggregated per-wallet candidate state built from the full market
/// trade set, used by the scanner's load step.
#[derive(Debug, Clone)]
pub struct WalletAggregate {
    pub wallet: String,
    pub net_raw: I256,
    pub liq_hint: Option<I256>,
}

/// Loads up to 5000 trade rows for the market and aggregates them by
/// lowercase wallet, dropping wallets whose net delta is zero.
pub async fn load_candidates(store: &dyn Store, market: Uuid) -> anyhow::Result<Vec<WalletAggregate>> {
    const PAGE_SIZE: u64 = 1000;
    const SCAN_CAP: u64 = 5000;

    let mut by_wallet: std::collections::HashMap<String, WalletAggregate> = std::collections::HashMap::new();
    let mut offset = 0u64;
    loop {
        let rows = store.fetch_user_trades(market, None, offset, PAGE_SIZE).await?;
        let fetched = rows.len() as u64;
        for row in &rows {
            if row.amount.is_zero() {
                continue;
            }
            let wallet = row.user_wallet.to_ascii_lowercase();
            let entry = by_wallet.entry(wallet.clone()).or_insert_with(|| WalletAggregate {
                wallet,
                net_raw: I256::ZERO,
                liq_hint: None,
            });
            entry.net_raw += row.amount;
            if entry.liq_hint.is_none() {
                entry.liq_hint = row.liquidation_price;
            }
        }
        offset += fetched;
        if fetched < PAGE_SIZE || offset >= SCAN_CAP {
            break;
        }
    }

    Ok(by_wallet.into_values().filter(|a| !a.net_raw.is_zero()).collect())
}

pub fn format_amount(amount: I256) -> String {
    fixed::format_units(amount, fixed::AMOUNT_DECIMALS)
}
