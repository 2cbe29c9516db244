//! Cashgate Core Domain
//!
//! Pure domain types for the cashgate trading gateway.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod entities;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{
    BookLevel, CurrencyCode, CurrencyPair, Order, OrderBookSnapshot, OrderType, Side, Ticker,
};
pub use values::{OrderId, Price, Quantity, Timestamp};
