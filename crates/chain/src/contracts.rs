//! ABI bindings for the perpetuals contracts this core talks to.
//!
//! `CoreVault` is the contract holding positions and exposing the
//! liquidation read/write surface; `OrderBook` is the per-market
//! contract exposing the mark price. Event selectors are derived from
//! the `sol!`-generated types rather than hand-copied byte arrays, so
//! they stay correct if the ABI ever changes shape.

use alloy::primitives::B256;
use alloy::sol;
use alloy::sol_types::SolEvent;

sol! {
    /// CoreVault: holds positions, exposes liquidation reads and the
    /// liquidateDirect entrypoint relayers call.
    #[sol(rpc)]
    interface ICoreVault {
        event TradeRecorded(
            bytes32 indexed marketId,
            address indexed buyer,
            address indexed seller,
            uint256 price,
            uint256 amount,
            uint256 buyerFee,
            uint256 sellerFee,
            uint256 timestamp,
            uint256 liquidationPrice
        );

        event PriceUpdated(uint256 lastTradePrice, uint256 currentMarkPrice);

        event OrderPlaced(
            uint256 indexed orderId,
            address indexed trader,
            uint256 price,
            uint256 amount,
            bool isBuy,
            bool isMarginOrder
        );

        event OrderCancelled(uint256 indexed orderId, address indexed trader);

        event OrderModified(
            uint256 indexed oldOrderId,
            uint256 indexed newOrderId,
            address indexed trader,
            uint256 newPrice,
            uint256 newAmount
        );

        event LiquidationCompleted(
            address indexed trader,
            uint256 liquidationsTriggered,
            string method,
            int256 startSize,
            int256 remainingSize
        );

        function getLiquidationPrice(address user, bytes32 marketId) external view returns (uint256, bool);

        function getPositionSummary(address user, bytes32 marketId)
            external
            view
            returns (int256 size, uint256 entryPrice, uint256 marginLocked);

        function liquidateDirect(bytes32 marketId, address trader) external;
    }

    /// OrderBook: one per market, exposes the current mark price.
    #[sol(rpc)]
    interface IOrderBook {
        function calculateMarkPrice() external view returns (uint256);
    }
}

/// Topic-0 selectors for the four event kinds the webhook decoder
/// recognizes, as lowercase `0x`-prefixed hex.
pub mod event_signatures {
    use super::*;

    pub fn trade_recorded() -> B256 {
        ICoreVault::TradeRecorded::SIGNATURE_HASH
    }

    pub fn price_updated() -> B256 {
        ICoreVault::PriceUpdated::SIGNATURE_HASH
    }

    pub fn order_placed() -> B256 {
        ICoreVault::OrderPlaced::SIGNATURE_HASH
    }

    pub fn order_cancelled() -> B256 {
        ICoreVault::OrderCancelled::SIGNATURE_HASH
    }

    pub fn order_modified() -> B256 {
        ICoreVault::OrderModified::SIGNATURE_HASH
    }

    pub fn liquidation_completed() -> B256 {
        ICoreVault::LiquidationCompleted::SIGNATURE_HASH
    }
}
