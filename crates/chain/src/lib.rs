//! EVM chain interaction layer for the liquidation core.
//!
//! Provides:
//! - ABI bindings for `CoreVault` and `OrderBook` (`contracts`)
//! - A `ChainClient` trait abstracting estimate/simulate/read/write/wait,
//!   with an `alloy`-backed production implementation (`AlloyChainClient`)

mod client;
pub mod contracts;

pub use client::{AlloyChainClient, ChainClient, PositionSummary, ReceiptStatus, SendError};
