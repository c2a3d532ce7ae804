//! Relayer pool: two named pools of signers, round-robin dispatch,
//! and the gas caps routing decisions are made against.
//!
//! Loaded once from [`crate::config::Config`], the way the teacher
//! constructs `TransactionSender` once in `initialize_components`.
//! Round-robin uses a bare `AtomicUsize` `fetch_add` + modulo — no
//! `parking_lot::Mutex` needed, unlike the teacher's other shared
//! caches, since a lock-free counter is simpler here.

use std::sync::atomic::{AtomicUsize, Ordering};

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use tracing::warn;

use crate::config::Config;

pub const SMALL_BLOCK_GAS: u64 = 2_000_000;
pub const BIG_BLOCK_GAS: u64 = 30_000_000;
pub const GAS_BUFFER_BPS: u32 = 13_000;
pub const SMALL_SAFETY_RESERVE: u64 = 120_000;
pub const BIG_SAFETY_RESERVE: u64 = 300_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolName {
    Small,
    Big,
}

impl PoolName {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolName::Small => "small",
            PoolName::Big => "big",
        }
    }
}

#[derive(Clone)]
pub struct Relayer {
    pub address: Address,
    pub signing_key: String,
}

pub struct RelayerPool {
    small: Vec<Relayer>,
    big: Vec<Relayer>,
    small_rr: AtomicUsize,
    big_rr: AtomicUsize,
    small_block_gas: u64,
    big_block_gas: u64,
    gas_buffer_bps: u32,
}

impl RelayerPool {
    /// Builds the pool from raw configured key lists: parses keys,
    /// drops malformed ones with a warning, and removes any key that
    /// appears in both lists from the small pool (one-directional
    /// exclusion — see DESIGN.md).
    pub fn from_config(config: &Config) -> Self {
        let big: Vec<Relayer> = load_relayers(&config.relayer_keys.big);
        let big_keys: std::collections::HashSet<String> =
            big.iter().map(|r| r.signing_key.clone()).collect();

        let small: Vec<Relayer> = load_relayers(&config.relayer_keys.small)
            .into_iter()
            .filter(|r| !big_keys.contains(&r.signing_key))
            .collect();

        Self {
            small,
            big,
            small_rr: AtomicUsize::new(0),
            big_rr: AtomicUsize::new(0),
            small_block_gas: config.small_block_gas_limit,
            big_block_gas: config.big_block_gas_limit,
            gas_buffer_bps: config.gas_estimate_buffer_bps,
        }
    }

    pub fn is_empty(&self, pool: PoolName) -> bool {
        self.pool_vec(pool).is_empty()
    }

    /// Next relayer in insertion order, wrapping around. `None` if the
    /// pool is empty.
    pub fn pick_round_robin(&self, pool: PoolName) -> Option<Relayer> {
        let (vec, counter) = match pool {
            PoolName::Small => (&self.small, &self.small_rr),
            PoolName::Big => (&self.big, &self.big_rr),
        };
        if vec.is_empty() {
            return None;
        }
        let idx = counter.fetch_add(1, Ordering::Relaxed) % vec.len();
        Some(vec[idx].clone())
    }

    fn pool_vec(&self, pool: PoolName) -> &[Relayer] {
        match pool {
            PoolName::Small => &self.small,
            PoolName::Big => &self.big,
        }
    }

    pub fn gas_cap(&self, pool: PoolName) -> u64 {
        match pool {
            PoolName::Small => self.small_block_gas.saturating_sub(SMALL_SAFETY_RESERVE),
            PoolName::Big => self.big_block_gas.saturating_sub(BIG_SAFETY_RESERVE),
        }
    }

    pub fn buffered_gas(&self, estimated: u64) -> u64 {
        (estimated as u128 * self.gas_buffer_bps as u128 / 10_000) as u64
    }
}

fn load_relayers(keys: &[String]) -> Vec<Relayer> {
    keys.iter()
        .filter_map(|k| match parse_signer(k) {
            Ok(signer) => Some(Relayer { address: signer.address(), signing_key: k.clone() }),
            Err(e) => {
                warn!(error = %e, "dropping malformed relayer key");
                None
            }
        })
        .collect()
}

fn parse_signer(key: &str) -> anyhow::Result<PrivateKeySigner> {
    let trimmed = key.trim_start_matches("0x");
    trimmed.parse().map_err(|e| anyhow::anyhow!("invalid private key: {e}"))
}
