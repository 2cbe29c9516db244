use std::collections::HashSet;

use async_trait::async_trait;
use cashgate_core::{CurrencyPair, Order, OrderBookSnapshot, OrderId, Ticker};
use rust_decimal::Decimal;

use crate::error::AdapterResult;

/// Port to a remote exchange's trading API
///
/// The only component that talks to the exchange. Implementations own the wire
/// protocol (signing, transport, parsing); the gateway only sees these calls.
/// Any call may fail; the gateway never retries on its own.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Exchange name for log lines
    fn name(&self) -> &str;

    /// Ticker (last, best bid, best ask) for a pair
    async fn ticker(&self, pair: &CurrencyPair) -> AdapterResult<Ticker>;

    /// Current order book for a pair
    async fn order_book(&self, pair: &CurrencyPair) -> AdapterResult<OrderBookSnapshot>;

    /// Available balance of a currency
    async fn balance(&self, currency: &str) -> AdapterResult<Decimal>;

    /// Submit a limit order
    ///
    /// `Ok(None)` means the exchange accepted the call but reported no order id.
    async fn place_limit_order(&self, order: &Order) -> AdapterResult<Option<OrderId>>;

    /// Submit a market order
    ///
    /// `Ok(None)` means the exchange accepted the call but reported no order id.
    async fn place_market_order(&self, order: &Order) -> AdapterResult<Option<OrderId>>;

    /// Ids of all orders still open on the account
    async fn open_orders(&self) -> AdapterResult<HashSet<OrderId>>;

    /// Withdraw funds; returns the exchange's raw result token
    async fn withdraw(
        &self,
        currency: &str,
        amount: Decimal,
        address: &str,
    ) -> AdapterResult<String>;

    /// Request a deposit address for a currency
    async fn deposit_address(&self, currency: &str) -> AdapterResult<String>;

    /// Interpret the raw token returned by [`withdraw`](Self::withdraw)
    fn is_withdrawal_successful(&self, result: &str) -> bool {
        !result.trim().is_empty()
    }
}
