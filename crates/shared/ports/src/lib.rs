//! Cashgate Ports
//!
//! Port definitions (traits) for the cashgate trading gateway.
//! These define the boundaries between gateway logic and infrastructure:
//! the time source and the exchange the gateway trades on.

mod clock;
mod error;
mod exchange;

pub use clock::Clock;
pub use error::{AdapterError, AdapterResult};
pub use exchange::ExchangeAdapter;
