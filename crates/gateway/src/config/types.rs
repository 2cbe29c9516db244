use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use crate::task::TaskSettings;

/// Longest cache TTL or task timeout accepted, in seconds (100 years)
pub const MAX_DURATION_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Whole seconds as a chrono duration, capped at [`MAX_DURATION_SECS`]
fn bounded_seconds(secs: u64) -> chrono::Duration {
    let max = chrono::Duration::seconds(MAX_DURATION_SECS as i64);
    i64::try_from(secs.min(MAX_DURATION_SECS))
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(max)
}

/// Gateway configuration for one exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Exchange display name, used in log lines
    pub name: String,
    /// Cryptocurrencies the exchange trades
    pub crypto_currencies: BTreeSet<String>,
    /// Fiat currencies the exchange quotes in
    pub fiat_currencies: BTreeSet<String>,
    /// Caller code -> exchange code, applied before the support check
    pub currency_aliases: HashMap<String, String>,
    /// Order book fetches allowed per second
    pub allowed_calls_per_second: f64,
    /// Lifetime of cached rates and balances
    pub cache_ttl_secs: u64,
    /// Pause after placing an order before the open-order list is trusted
    pub settle_delay_ms: u64,
    /// How long a task keeps polling before it gives up
    pub task_timeout_secs: u64,
    /// Shortest allowed gap between two steps of one task
    pub min_step_interval_secs: u64,
    /// Volume priced to derive unit buy/sell rates
    pub reference_volume: Decimal,
    /// Decimal places of buy/sell rate quotes
    pub quote_scale: u32,
    /// Step budget of the blocking purchase/sell helpers
    pub blocking_poll_attempts: u32,
    /// Gap between steps of the blocking purchase/sell helpers
    pub blocking_poll_interval_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            name: "exchange".to_string(),
            crypto_currencies: BTreeSet::new(),
            fiat_currencies: BTreeSet::new(),
            currency_aliases: HashMap::new(),
            allowed_calls_per_second: 1.0,
            cache_ttl_secs: 30,
            settle_delay_ms: 2_000,
            task_timeout_secs: 5 * 60 * 60,
            min_step_interval_secs: 5,
            reference_volume: Decimal::TEN,
            quote_scale: 2,
            blocking_poll_attempts: 10,
            blocking_poll_interval_ms: 3_000,
        }
    }
}

impl GatewayConfig {
    /// Minimal config for an exchange trading the given currencies
    pub fn new<C, F>(name: impl Into<String>, crypto: C, fiat: F) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        F: IntoIterator,
        F::Item: Into<String>,
    {
        Self {
            name: name.into(),
            crypto_currencies: crypto.into_iter().map(Into::into).collect(),
            fiat_currencies: fiat.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Add a currency alias (builder style)
    pub fn with_alias(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.currency_aliases.insert(from.into(), to.into());
        self
    }

    /// Set the order book fetch rate (builder style)
    pub fn with_calls_per_second(mut self, rate: f64) -> Self {
        self.allowed_calls_per_second = rate;
        self
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        bounded_seconds(self.cache_ttl_secs)
    }

    pub fn blocking_poll_interval(&self) -> Duration {
        Duration::from_millis(self.blocking_poll_interval_ms)
    }

    /// Timing settings handed to every order task
    pub fn task_settings(&self) -> TaskSettings {
        TaskSettings {
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            timeout: bounded_seconds(self.task_timeout_secs),
            min_step_interval_secs: self.min_step_interval_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_durations_from_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.cache_ttl(), chrono::Duration::seconds(30));
        assert_eq!(config.task_settings().timeout, chrono::Duration::hours(5));
        assert_eq!(config.task_settings().settle_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_oversized_durations_are_capped() {
        let config = GatewayConfig {
            cache_ttl_secs: 10_000_000_000_000_000,
            task_timeout_secs: u64::MAX,
            ..GatewayConfig::default()
        };
        let cap = chrono::Duration::seconds(MAX_DURATION_SECS as i64);
        assert_eq!(config.cache_ttl(), cap);
        assert_eq!(config.task_settings().timeout, cap);
    }
}
