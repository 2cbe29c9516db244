//! Cashgate Gateway
//!
//! Trading gateway engine between a network of cash-to-crypto terminals and
//! an exchange's trading API. Provides:
//! - Currency support gating ([`CurrencyGate`])
//! - TTL caching with single-flight loads for rates and balances ([`ExpiringCache`])
//! - Token-bucket limiting of order book fetches ([`RateLimiter`])
//! - Marginal pricing by walking the order book ([`OrderBookPricer`])
//! - Resumable, externally stepped order tracking ([`OrderTask`])
//!
//! ## Architecture
//!
//! ```text
//!   Terminals / host scheduler
//!            │
//!   ┌────────▼────────┐
//!   │ TradingGateway  │  gate ─ caches ─ rate limiter ─ pricer
//!   │                 │  OrderTask (create / step)
//!   └────────┬────────┘
//!            │ ExchangeAdapter (port)
//!   ┌────────▼────────┐
//!   │ Exchange wire   │  signing, HTTP, parsing (out of this crate)
//!   └─────────────────┘
//! ```
//!
//! The gateway never surfaces adapter errors: callers see decimals, `None`,
//! or task states.

pub mod cache;
pub mod config;
pub mod currency;
pub mod error;
pub mod gateway;
pub mod pricing;
pub mod rate_limit;
pub mod task;

// Re-export commonly used types
pub use cache::ExpiringCache;
pub use config::{ConfigError, GatewayConfig, load_config, load_config_from_str, load_default_config};
pub use currency::{CurrencyGate, CurrencyKind};
pub use error::{GatewayError, Result};
pub use gateway::{TradingGateway, WITHDRAWAL_SUCCESS};
pub use pricing::OrderBookPricer;
pub use rate_limit::RateLimiter;
pub use task::{OrderTask, SKIPPED_RESULT, TaskSettings, TaskSnapshot, TaskState};
