use serde::{Deserialize, Serialize};
use std::fmt;

/// Currency code as used by an exchange (e.g. "BTC", "USD")
pub type CurrencyCode = String;

/// A tradeable pair: crypto base priced in a fiat (or crypto) quote
///
/// Equality is by the two codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub base: CurrencyCode,
    pub quote: CurrencyCode,
}

impl CurrencyPair {
    pub fn new(base: impl Into<CurrencyCode>, quote: impl Into<CurrencyCode>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    /// Cache key in the `"BASE:QUOTE"` form
    pub fn key(&self) -> String {
        format!("{}:{}", self.base, self.quote)
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}
