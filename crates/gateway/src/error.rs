//! Error types for the gateway crate

use cashgate_ports::AdapterError;
use rust_decimal::Decimal;
use thiserror::Error;

/// Gateway-level errors
///
/// Public gateway operations turn these into neutral results (`None`, zero,
/// a failed task) at their boundary; the `try_*` variants expose them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("Insufficient liquidity: requested {requested}, book depth {available}")]
    InsufficientLiquidity {
        requested: Decimal,
        available: Decimal,
    },

    #[error("Invalid volume: {0}")]
    InvalidVolume(Decimal),

    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),
}

pub type Result<T> = std::result::Result<T, GatewayError>;
