//! Market resolver: maps market-id hex and order-book address to a
//! database market UUID, backed by a process-lifetime cache.
//!
//! Reuses the teacher's `DashMap`-backed caching idiom from
//! `api/src/liqd.rs`'s `LiqdClient` route cache, generalized from a
//! TTL-expiring cache to one that is never evicted — markets are
//! immutable for the purposes of this core.

use dashmap::DashMap;
use uuid::Uuid;

use crate::store::Store;

#[derive(Debug, Clone)]
pub struct ResolvedMarket {
    pub uuid: Uuid,
    pub hex: String,
}

/// Process-wide, never-evicted market lookup cache.
#[derive(Default)]
pub struct MarketResolver {
    by_hex: DashMap<String, Uuid>,
    by_address: DashMap<String, ResolvedMarket>,
}

impl MarketResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves a 32-byte market-id hex to its database UUID. Caches
    /// only the positive result for the process lifetime; a miss is
    /// not cached here (negative caching, if any, is per-request and
    /// owned by the caller).
    pub async fn resolve_by_hex(&self, store: &dyn Store, hex: &str) -> anyhow::Result<Option<Uuid>> {
        let hex = normalize_market_hex(hex);
        let Some(hex) = hex else { return Ok(None) };

        if let Some(uuid) = self.by_hex.get(&hex) {
            return Ok(Some(*uuid));
        }
        match store.lookup_market_by_hex(&hex).await? {
            Some(uuid) => {
                self.by_hex.insert(hex, uuid);
                Ok(Some(uuid))
            }
            None => Ok(None),
        }
    }

    /// Resolves an order-book address to its market. Populates both
    /// caches on a fresh lookup so a later `resolve_by_hex` for the
    /// same market is also a hit.
    pub async fn resolve_by_address(
        &self,
        store: &dyn Store,
        address: &str,
    ) -> anyhow::Result<Option<ResolvedMarket>> {
        let address = normalize_address(address);
        let Some(address) = address else { return Ok(None) };

        if let Some(market) = self.by_address.get(&address) {
            return Ok(Some(market.clone()));
        }
        match store.lookup_market_by_address(&address).await? {
            Some((uuid, hex)) => {
                let market = ResolvedMarket { uuid, hex: hex.clone() };
                self.by_address.insert(address, market.clone());
                self.by_hex.insert(hex, uuid);
                Ok(Some(market))
            }
            None => Ok(None),
        }
    }
}

fn normalize_market_hex(hex: &str) -> Option<String> {
    let lower = hex.to_ascii_lowercase();
    let body = lower.strip_prefix("0x")?;
    if body.len() == 64 && body.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(lower)
    } else {
        None
    }
}

fn normalize_address(addr: &str) -> Option<String> {
    let lower = addr.to_ascii_lowercase();
    let body = lower.strip_prefix("0x")?;
    if body.len() == 40 && body.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(lower)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStore {
        calls: AtomicUsize,
        uuid: Uuid,
    }

    #[async_trait]
    impl Store for CountingStore {
        async fn lookup_market_by_hex(&self, _market_hex: &str) -> anyhow::Result<Option<Uuid>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(self.uuid))
        }
        async fn lookup_market_by_address(&self, _address: &str) -> anyhow::Result<Option<(Uuid, String)>> {
            Ok(None)
        }
        async fn fetch_user_trades(
            &self,
            _market: Uuid,
            _wallet: Option<&str>,
            _offset: u64,
            _limit: u64,
        ) -> anyhow::Result<Vec<crate::store::TradeRow>> {
            Ok(Vec::new())
        }
        async fn net_user_trade(
            &self,
            _market: Uuid,
            _wallet: &str,
            _delta: alloy::primitives::I256,
            _price: alloy::primitives::I256,
            _liquidation_price: Option<alloy::primitives::I256>,
            _trade_ts: i64,
            _order_book: &str,
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn resolve_by_hex_caches_after_first_lookup() {
        let store = CountingStore { calls: AtomicUsize::new(0), uuid: Uuid::new_v4() };
        let resolver = MarketResolver::new();
        let hex = format!("0x{}", "ab".repeat(32));

        resolver.resolve_by_hex(&store, &hex).await.unwrap();
        resolver.resolve_by_hex(&store, &hex).await.unwrap();

        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn resolve_by_hex_rejects_malformed() {
        let store = CountingStore { calls: AtomicUsize::new(0), uuid: Uuid::new_v4() };
        let resolver = MarketResolver::new();
        assert!(resolver.resolve_by_hex(&store, "not-hex").await.unwrap().is_none());
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }
}
