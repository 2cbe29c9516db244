//! Simulated exchange
//!
//! An in-memory [`ExchangeAdapter`](cashgate_ports::ExchangeAdapter) for tests
//! and dry runs. Market data and balances are set directly; placed orders stay
//! open until the test fills or cancels them. Every adapter call is counted,
//! and any call can be made to fail.

pub mod exchange;
pub mod model;

// Re-export main types for convenience
pub use exchange::SimulatedExchange;
pub use model::{AdapterCall, Withdrawal};
