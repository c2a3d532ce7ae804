//! Event codec: decode raw webhook log tuples into typed events.
//!
//! The webhook body is untyped JSON, not an `alloy::rpc::types::Log`
//! subscription, so decoding here works on string topics/hex data the
//! same way the teacher's `event_listener.rs` matches `log.topics()[0]`
//! against precomputed signature constants from `contracts::event_signatures`
//! — just against `serde_json::Value` instead of a typed log.

use alloy::primitives::{Address, I256, U256};
use liquidator_chain::contracts::event_signatures;
use serde_json::Value;

/// A single decoded log in its raw wire shape. `raw` retains the full
/// JSON the log was parsed from so source-address lookup can consult
/// any of the ten accepted field paths a webhook may carry it under.
#[derive(Debug, Clone, Default)]
pub struct RawLog {
    pub topics: Vec<String>,
    pub data: String,
    pub raw: Value,
}

#[derive(Debug, Clone)]
pub enum DecodedEvent {
    TradeRecorded {
        market_id: String,
        buyer: Address,
        seller: Address,
        price: U256,
        amount: U256,
        liquidation_price: U256,
    },
    PriceUpdated {
        current_mark_price: U256,
    },
    OrderPlaced,
    OrderCancelled,
    OrderModified,
    LiquidationCompleted {
        trader: Address,
        remaining_size: I256,
    },
}

impl DecodedEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DecodedEvent::TradeRecorded { .. } => "TradeRecorded",
            DecodedEvent::PriceUpdated { .. } => "PriceUpdated",
            DecodedEvent::OrderPlaced => "OrderPlaced",
            DecodedEvent::OrderCancelled => "OrderCancelled",
            DecodedEvent::OrderModified => "OrderModified",
            DecodedEvent::LiquidationCompleted { .. } => "LiquidationCompleted",
        }
    }
}

/// Decodes a raw log by matching its topic-0 against the four known
/// signatures. Returns `None` (not an error) when the topic is
/// unrecognized or the payload fails to parse.
pub fn decode_log(log: &RawLog) -> Option<DecodedEvent> {
    let topic0 = log.topics.first()?;
    let topic0 = normalize_hex(topic0);

    if topic0 == hex_lower(&event_signatures::trade_recorded()) {
        decode_trade_recorded(log)
    } else if topic0 == hex_lower(&event_signatures::price_updated()) {
        decode_price_updated(log)
    } else if topic0 == hex_lower(&event_signatures::order_placed()) {
        Some(DecodedEvent::OrderPlaced)
    } else if topic0 == hex_lower(&event_signatures::order_cancelled()) {
        Some(DecodedEvent::OrderCancelled)
    } else if topic0 == hex_lower(&event_signatures::order_modified()) {
        Some(DecodedEvent::OrderModified)
    } else if topic0 == hex_lower(&event_signatures::liquidation_completed()) {
        decode_liquidation_completed(log)
    } else {
        None
    }
}

fn decode_trade_recorded(log: &RawLog) -> Option<DecodedEvent> {
    let market_id = normalize_hex(log.topics.get(1)?);
    let buyer = address_from_topic(log.topics.get(2)?)?;
    let seller = address_from_topic(log.topics.get(3)?)?;

    // Non-indexed payload order: price, amount, buyerFee, sellerFee,
    // timestamp, liquidationPrice.
    let words = data_words(&log.data);
    let price = *words.first()?;
    let amount = *words.get(1)?;
    let liquidation_price = *words.get(5)?;

    Some(DecodedEvent::TradeRecorded {
        market_id,
        buyer,
        seller,
        price,
        amount,
        liquidation_price,
    })
}

fn decode_price_updated(log: &RawLog) -> Option<DecodedEvent> {
    let words = data_words(&log.data);
    let current_mark_price = *words.get(1)?;
    Some(DecodedEvent::PriceUpdated { current_mark_price })
}

fn decode_liquidation_completed(log: &RawLog) -> Option<DecodedEvent> {
    let trader = address_from_topic(log.topics.get(1)?)?;
    let words = data_words(&log.data);
    // Head layout: liquidationsTriggered, offset-to-`method` (dynamic
    // string occupies a pointer slot, not inline), startSize, remainingSize.
    let remaining_size_word = *words.get(3)?;
    let remaining_size = I256::from_raw(remaining_size_word);
    Some(DecodedEvent::LiquidationCompleted { trader, remaining_size })
}

/// Splits a hex data blob into 32-byte big-endian words.
fn data_words(data: &str) -> Vec<U256> {
    let hex = data.trim_start_matches("0x");
    let bytes = match hex::decode(hex) {
        Ok(b) => b,
        Err(_) => return Vec::new(),
    };
    bytes
        .chunks(32)
        .filter(|c| c.len() == 32)
        .map(U256::from_be_slice)
        .collect()
}

fn address_from_topic(topic: &str) -> Option<Address> {
    let hex = normalize_hex(topic);
    let hex = hex.trim_start_matches("0x");
    let hex = if hex.len() > 40 { &hex[hex.len() - 40..] } else { hex };
    format!("0x{hex}").parse().ok()
}

fn normalize_hex(s: &str) -> String {
    s.to_ascii_lowercase()
}

fn hex_lower(b: &alloy::primitives::B256) -> String {
    format!("{b:#x}")
}

/// Candidate field names, in precedence order, that may carry a log's
/// source address.
const ADDRESS_FIELDS: &[&str] = &[
    "address",
    "contractAddress",
    "toAddress",
    "fromAddress",
    "raw.address",
    "event.address",
    "account",
    "account.address",
    "transaction.to",
    "transaction.from",
];

/// Extracts the ordered, de-duplicated, lowercase list of addresses a
/// log or webhook body might carry as its source.
pub fn extract_source_addresses(body: &Value) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for path in ADDRESS_FIELDS {
        if let Some(v) = lookup_path(body, path) {
            if let Some(addr) = v.as_str() {
                let lower = addr.to_ascii_lowercase();
                if is_address_shaped(&lower) && seen.insert(lower.clone()) {
                    out.push(lower);
                }
            }
        }
    }
    out
}

fn is_address_shaped(s: &str) -> bool {
    let hex = s.trim_start_matches("0x");
    s.starts_with("0x") && hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit())
}

/// Resolves a dotted path (e.g. `"raw.address"`) against a JSON value,
/// falling back to `<field>.address` for paths like `transaction.to`.
fn lookup_path<'a>(body: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = body;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    if current.is_object() {
        current.get("address")
    } else {
        Some(current)
    }
}

/// Implements the five accepted webhook body shapes, in precedence
/// order, producing the canonical log list.
pub fn extract_logs(body: &Value) -> Vec<RawLog> {
    if let Some(logs) = body.get("logs").and_then(Value::as_array) {
        return logs.iter().filter_map(parse_raw_log).collect();
    }
    if let Some(logs) = body.pointer("/event/logs").and_then(Value::as_array) {
        return logs.iter().filter_map(parse_raw_log).collect();
    }
    if let Some(logs) = body.pointer("/event/data/logs").and_then(Value::as_array) {
        return logs.iter().filter_map(parse_raw_log).collect();
    }
    if let Some(logs) = body.pointer("/event/data/block/logs").and_then(Value::as_array) {
        return logs.iter().filter_map(parse_raw_log).collect();
    }
    if let Some(activity) = body.pointer("/event/activity").and_then(Value::as_array) {
        return activity.iter().filter_map(|item| item.get("log").and_then(parse_raw_log)).collect();
    }
    Vec::new()
}

fn parse_raw_log(v: &Value) -> Option<RawLog> {
    let topics = v
        .get("topics")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|t| t.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    let data = v.get("data").and_then(Value::as_str).unwrap_or("0x").to_string();

    Some(RawLog { topics, data, raw: v.clone() })
}
