use rust_decimal::Decimal;

/// Adapter operations, for call accounting and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterCall {
    Ticker,
    OrderBook,
    Balance,
    PlaceLimitOrder,
    PlaceMarketOrder,
    OpenOrders,
    Withdraw,
    DepositAddress,
}

impl AdapterCall {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ticker => "ticker",
            Self::OrderBook => "order_book",
            Self::Balance => "balance",
            Self::PlaceLimitOrder => "place_limit_order",
            Self::PlaceMarketOrder => "place_market_order",
            Self::OpenOrders => "open_orders",
            Self::Withdraw => "withdraw",
            Self::DepositAddress => "deposit_address",
        }
    }
}

/// A withdrawal the simulator accepted
#[derive(Debug, Clone, PartialEq)]
pub struct Withdrawal {
    pub currency: String,
    pub amount: Decimal,
    pub address: String,
}
