mod currency;
mod market_data;
mod order;
mod order_type;
mod side;

pub use currency::{CurrencyCode, CurrencyPair};
pub use market_data::{BookLevel, OrderBookSnapshot, Ticker};
pub use order::Order;
pub use order_type::OrderType;
pub use side::Side;
