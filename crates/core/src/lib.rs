//! Liquidation core: event codec, market resolver, position
//! reconciler, liquidation scanner, relayer pool, nonce allocator,
//! failure queue client, and the webhook event handler that wires
//! them together.

pub mod config;
pub mod events;
pub mod failure_queue;
pub mod fixed;
pub mod handler;
pub mod market;
pub mod nonce;
pub mod reconcile;
pub mod relayer;
pub mod scanner;
pub mod store;

pub use config::{Config, ConfigError};
pub use events::{decode_log, extract_logs, extract_source_addresses, DecodedEvent, RawLog};
pub use failure_queue::{FailureQueueClient, RemoteFailureQueueClient};
pub use handler::{handle_webhook, HandlerContext, LogResult, WebhookResult};
pub use market::{MarketResolver, ResolvedMarket};
pub use nonce::{NonceAllocatorClient, RemoteNonceAllocator};
pub use relayer::{PoolName, Relayer, RelayerPool};
pub use scanner::{scan_and_liquidate, CandidateOutcome, LiquidationOutcome, ScanResult, ScannerContext};
pub use store::{Store, TradeRow};
