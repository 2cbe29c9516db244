//! Trading gateway facade
//!
//! Public entry points used by terminals. Each one runs its currency codes
//! through the [`CurrencyGate`] first and answers with a neutral value
//! (zero balance, `None` rate, no task) when a code is unsupported. Adapter
//! failures are logged and surface as `None`; no transport error reaches
//! the caller.
//!
//! ```text
//! rate / balance:  gate ─▶ ExpiringCache ─(miss)─▶ ExchangeAdapter
//! price to fill:   gate ─▶ RateLimiter ─▶ order book ─▶ OrderBookPricer
//! buy / sell:      gate ─▶ OrderTask ─create/step─▶ ExchangeAdapter
//! ```

use cashgate_clock::SystemClock;
use cashgate_core::{CurrencyCode, CurrencyPair, OrderId, Price, Quantity, Side};
use cashgate_ports::{AdapterError, Clock, ExchangeAdapter};
use log::{debug, error, info};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::cache::ExpiringCache;
use crate::config::GatewayConfig;
use crate::currency::{CurrencyGate, CurrencyKind};
use crate::error::{GatewayError, Result};
use crate::pricing::OrderBookPricer;
use crate::rate_limit::RateLimiter;
use crate::task::OrderTask;

/// Returned by [`TradingGateway::withdraw`] when the exchange confirms it
pub const WITHDRAWAL_SUCCESS: &str = "success";

/// Gateway engine for one exchange
///
/// Caches and the rate limiter belong to the instance, so several gateways
/// can run side by side without sharing state.
pub struct TradingGateway {
    config: GatewayConfig,
    gate: CurrencyGate,
    adapter: Arc<dyn ExchangeAdapter>,
    clock: Arc<dyn Clock>,
    rate_cache: ExpiringCache<Decimal, AdapterError>,
    balance_cache: ExpiringCache<Decimal, AdapterError>,
    rate_limiter: RateLimiter,
}

impl TradingGateway {
    /// Create a gateway on the system clock
    pub fn new(config: GatewayConfig, adapter: Arc<dyn ExchangeAdapter>) -> Self {
        Self::with_clock(config, adapter, Arc::new(SystemClock::new()))
    }

    /// Create a gateway with an explicit time source
    pub fn with_clock(
        config: GatewayConfig,
        adapter: Arc<dyn ExchangeAdapter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ttl = config.cache_ttl();
        Self {
            gate: CurrencyGate::from_config(&config),
            rate_cache: ExpiringCache::new("rate", ttl, clock.clone()),
            balance_cache: ExpiringCache::new("balance", ttl, clock.clone()),
            rate_limiter: RateLimiter::new(config.allowed_calls_per_second),
            config,
            adapter,
            clock,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn crypto_currencies(&self) -> &BTreeSet<CurrencyCode> {
        self.gate.crypto_currencies()
    }

    pub fn fiat_currencies(&self) -> &BTreeSet<CurrencyCode> {
        self.gate.fiat_currencies()
    }

    // === Rates ===

    /// Last traded price of `crypto` in `fiat`, cached for the TTL
    pub async fn exchange_rate_last(&self, crypto: &str, fiat: &str) -> Option<Price> {
        let pair = self.check_pair(crypto, fiat)?;
        let key = pair.key();
        let adapter = self.adapter.clone();
        let loaded = self
            .rate_cache
            .get_or_load(&key, || async move { adapter.ticker(&pair).await.map(|t| t.last) })
            .await;
        match loaded {
            Ok(rate) => {
                debug!("{} exchange rate request: {} = {}", self.name(), key, rate);
                Some(rate)
            }
            Err(e) => {
                error!("{} exchange rate request: {} failed: {}", self.name(), key, e);
                None
            }
        }
    }

    /// Unit price to buy `crypto` with `fiat`, rounded up
    pub async fn exchange_rate_for_buy(&self, crypto: &str, fiat: &str) -> Option<Price> {
        self.unit_rate(crypto, fiat, Side::Buy).await
    }

    /// Unit price received selling `crypto` for `fiat`, rounded down
    pub async fn exchange_rate_for_sell(&self, crypto: &str, fiat: &str) -> Option<Price> {
        self.unit_rate(crypto, fiat, Side::Sell).await
    }

    async fn unit_rate(&self, crypto: &str, fiat: &str, side: Side) -> Option<Price> {
        let reference = self.config.reference_volume;
        let total = self.calculate_price(crypto, fiat, side, reference).await?;
        OrderBookPricer::unit_rate(total, reference, side, self.config.quote_scale)
    }

    // === Order book pricing ===

    /// Marginal price of the book level that fills `volume`
    ///
    /// `None` for unsupported currencies, adapter failures and books too
    /// shallow to fill the volume.
    pub async fn price_to_fill(
        &self,
        crypto: &str,
        fiat: &str,
        side: Side,
        volume: Quantity,
    ) -> Option<Price> {
        match self.try_price_to_fill(crypto, fiat, side, volume).await {
            Ok(price) => Some(price),
            Err(GatewayError::UnsupportedCurrency(code)) => {
                debug!("{} exchange doesn't support '{}'", self.name(), code);
                None
            }
            Err(e @ GatewayError::InsufficientLiquidity { .. }) => {
                debug!("{} exchange {} {}/{}: {}", self.name(), side, crypto, fiat, e);
                None
            }
            Err(e) => {
                error!(
                    "{} exchange failed to calculate {} price: {}",
                    self.name(),
                    side,
                    e
                );
                None
            }
        }
    }

    /// Like [`price_to_fill`](Self::price_to_fill), keeping the reason there is no price
    pub async fn try_price_to_fill(
        &self,
        crypto: &str,
        fiat: &str,
        side: Side,
        volume: Quantity,
    ) -> Result<Price> {
        let pair = self.try_check_pair(crypto, fiat)?;
        if volume <= Decimal::ZERO {
            return Err(GatewayError::InvalidVolume(volume));
        }
        self.rate_limiter.acquire().await;
        let book = self.adapter.order_book(&pair).await?;
        let price = OrderBookPricer::try_price_to_fill(&book, side, volume)?;
        debug!(
            "Called {} exchange for {} rate: {} = {}",
            self.name(),
            side,
            pair.key(),
            price
        );
        Ok(price)
    }

    /// Total fiat cost of buying `volume` at the marginal ask
    pub async fn calculate_buy_price(&self, crypto: &str, fiat: &str, volume: Quantity) -> Option<Price> {
        self.calculate_price(crypto, fiat, Side::Buy, volume).await
    }

    /// Total fiat proceeds of selling `volume` at the marginal bid
    pub async fn calculate_sell_price(&self, crypto: &str, fiat: &str, volume: Quantity) -> Option<Price> {
        self.calculate_price(crypto, fiat, Side::Sell, volume).await
    }

    async fn calculate_price(
        &self,
        crypto: &str,
        fiat: &str,
        side: Side,
        volume: Quantity,
    ) -> Option<Price> {
        let marginal = self.price_to_fill(crypto, fiat, side, volume).await?;
        marginal.checked_mul(volume)
    }

    // === Balances ===

    /// Balance of a cryptocurrency; zero if unsupported, `None` if the exchange failed
    pub async fn crypto_balance(&self, crypto: &str) -> Option<Decimal> {
        match self.check(crypto, CurrencyKind::Crypto) {
            Some(code) => self.load_balance(code).await,
            None => Some(Decimal::ZERO),
        }
    }

    /// Balance of a fiat currency; zero if unsupported, `None` if the exchange failed
    pub async fn fiat_balance(&self, fiat: &str) -> Option<Decimal> {
        match self.check(fiat, CurrencyKind::Fiat) {
            Some(code) => self.load_balance(code).await,
            None => Some(Decimal::ZERO),
        }
    }

    /// Balance of any supported currency
    pub async fn balance(&self, currency: &str) -> Option<Decimal> {
        match self.gate.check_any(currency) {
            Some((code, _)) => self.load_balance(code).await,
            None => {
                debug!("{} exchange doesn't support currency '{}'", self.name(), currency);
                Some(Decimal::ZERO)
            }
        }
    }

    async fn load_balance(&self, currency: CurrencyCode) -> Option<Decimal> {
        let adapter = self.adapter.clone();
        let key = currency.clone();
        let loaded = self
            .balance_cache
            .get_or_load(&key, || async move { adapter.balance(&currency).await })
            .await;
        match loaded {
            Ok(balance) => {
                debug!("{} exchange balance request: {} = {}", self.name(), key, balance);
                Some(balance)
            }
            Err(e) => {
                error!("{} exchange balance request: {} failed: {}", self.name(), key, e);
                None
            }
        }
    }

    // === Trading ===

    /// New buy task, not yet created; `None` for unsupported currencies
    pub fn create_buy_task(
        &self,
        volume: Quantity,
        crypto: &str,
        fiat: &str,
        description: &str,
    ) -> Option<OrderTask> {
        self.create_task(Side::Buy, volume, crypto, fiat, description)
    }

    /// New sell task, not yet created; `None` for unsupported currencies
    pub fn create_sell_task(
        &self,
        volume: Quantity,
        crypto: &str,
        fiat: &str,
        description: &str,
    ) -> Option<OrderTask> {
        self.create_task(Side::Sell, volume, crypto, fiat, description)
    }

    fn create_task(
        &self,
        side: Side,
        volume: Quantity,
        crypto: &str,
        fiat: &str,
        description: &str,
    ) -> Option<OrderTask> {
        let pair = self.check_pair(crypto, fiat)?;
        Some(OrderTask::new(
            side,
            pair,
            volume,
            description,
            self.adapter.clone(),
            self.clock.clone(),
            self.config.task_settings(),
        ))
    }

    /// Buy and wait for the order to settle, within the blocking poll budget
    pub async fn purchase_coins(
        &self,
        volume: Quantity,
        crypto: &str,
        fiat: &str,
        description: &str,
    ) -> Option<OrderId> {
        let task = self.create_buy_task(volume, crypto, fiat, description)?;
        self.run_to_completion(task).await
    }

    /// Sell and wait for the order to settle, within the blocking poll budget
    pub async fn sell_coins(
        &self,
        volume: Quantity,
        crypto: &str,
        fiat: &str,
        description: &str,
    ) -> Option<OrderId> {
        let task = self.create_sell_task(volume, crypto, fiat, description)?;
        self.run_to_completion(task).await
    }

    async fn run_to_completion(&self, mut task: OrderTask) -> Option<OrderId> {
        if !task.create().await {
            return None;
        }
        for attempt in 0..self.config.blocking_poll_attempts {
            if attempt > 0 {
                tokio::time::sleep(self.config.blocking_poll_interval()).await;
            }
            if task.step().await {
                break;
            }
            debug!("Waiting for order to be processed.");
        }
        task.on_finish();
        match task.result() {
            Some(order_id) if task.order_id() == Some(order_id) => Some(order_id.to_string()),
            _ => None,
        }
    }

    // === Transfers ===

    /// Deposit address for `crypto`
    pub async fn deposit_address(&self, crypto: &str) -> Option<String> {
        let crypto = self.check(crypto, CurrencyKind::Crypto)?;
        match self.adapter.deposit_address(&crypto).await {
            Ok(address) => Some(address),
            Err(e) => {
                error!("{} exchange deposit address for {} failed: {}", self.name(), crypto, e);
                None
            }
        }
    }

    /// Withdraw `amount` of `crypto` to `address`; `Some("success")` if the exchange confirms
    pub async fn withdraw(&self, crypto: &str, amount: Decimal, address: &str) -> Option<String> {
        let crypto = self.check(crypto, CurrencyKind::Crypto)?;
        info!(
            "{} exchange withdrawing {} {} to {}",
            self.name(),
            amount,
            crypto,
            address
        );
        match self.adapter.withdraw(&crypto, amount, address).await {
            Ok(result) if self.adapter.is_withdrawal_successful(&result) => {
                debug!("{} exchange withdrawal completed with result: {}", self.name(), result);
                Some(WITHDRAWAL_SUCCESS.to_string())
            }
            Ok(result) => {
                error!("{} exchange withdrawal failed with result: '{}'", self.name(), result);
                None
            }
            Err(e) => {
                error!("{} exchange withdrawal failed: {}", self.name(), e);
                None
            }
        }
    }

    // === Currency gate ===

    fn check(&self, code: &str, kind: CurrencyKind) -> Option<CurrencyCode> {
        let normalized = self.gate.normalize(code, kind);
        if normalized.is_none() {
            debug!("{} exchange doesn't support {} '{}'", self.name(), kind.as_str(), code);
        }
        normalized
    }

    fn check_pair(&self, crypto: &str, fiat: &str) -> Option<CurrencyPair> {
        let crypto = self.check(crypto, CurrencyKind::Crypto);
        let fiat = self.check(fiat, CurrencyKind::Fiat);
        Some(CurrencyPair::new(crypto?, fiat?))
    }

    fn try_check_pair(&self, crypto: &str, fiat: &str) -> Result<CurrencyPair> {
        let base = self
            .gate
            .check_crypto(crypto)
            .ok_or_else(|| GatewayError::UnsupportedCurrency(crypto.to_string()))?;
        let quote = self
            .gate
            .check_fiat(fiat)
            .ok_or_else(|| GatewayError::UnsupportedCurrency(fiat.to_string()))?;
        Ok(CurrencyPair::new(base, quote))
    }
}
