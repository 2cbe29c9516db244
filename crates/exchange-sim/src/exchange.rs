use async_trait::async_trait;
use cashgate_core::{CurrencyPair, Order, OrderBookSnapshot, OrderId, OrderType, Side, Ticker};
use cashgate_ports::{AdapterError, AdapterResult, ExchangeAdapter};
use dashmap::DashMap;
use log::{debug, info};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::model::{AdapterCall, Withdrawal};

/// Result token the simulator returns for an accepted withdrawal
pub const WITHDRAWAL_OK: &str = "OK";

/// In-memory exchange
pub struct SimulatedExchange {
    name: String,

    /// Market data, keyed by pair
    tickers: RwLock<HashMap<CurrencyPair, Ticker>>,
    books: RwLock<HashMap<CurrencyPair, OrderBookSnapshot>>,

    /// Account state
    balances: RwLock<HashMap<String, Decimal>>,
    open_orders: RwLock<HashMap<OrderId, Order>>,
    placed_orders: RwLock<Vec<(OrderId, Order)>>,
    deposit_addresses: RwLock<HashMap<String, String>>,
    withdrawals: RwLock<Vec<Withdrawal>>,

    /// Call accounting and failure injection
    calls: DashMap<AdapterCall, usize>,
    failures: DashMap<AdapterCall, AdapterError>,

    /// Artificial delay applied to every call, in milliseconds
    latency_ms: AtomicU64,
    /// Accept orders without reporting an id
    withhold_order_ids: AtomicBool,
    next_order_id: AtomicU64,
}

impl SimulatedExchange {
    /// Create an empty exchange
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tickers: RwLock::new(HashMap::new()),
            books: RwLock::new(HashMap::new()),
            balances: RwLock::new(HashMap::new()),
            open_orders: RwLock::new(HashMap::new()),
            placed_orders: RwLock::new(Vec::new()),
            deposit_addresses: RwLock::new(HashMap::new()),
            withdrawals: RwLock::new(Vec::new()),
            calls: DashMap::new(),
            failures: DashMap::new(),
            latency_ms: AtomicU64::new(0),
            withhold_order_ids: AtomicBool::new(false),
            next_order_id: AtomicU64::new(1),
        }
    }

    // ============ Market data ============

    pub async fn set_ticker(&self, pair: CurrencyPair, ticker: Ticker) {
        self.tickers.write().await.insert(pair, ticker);
    }

    pub async fn set_order_book(&self, pair: CurrencyPair, book: OrderBookSnapshot) {
        self.books.write().await.insert(pair, book);
    }

    // ============ Account state ============

    pub async fn set_balance(&self, currency: &str, amount: Decimal) {
        self.balances.write().await.insert(currency.to_string(), amount);
    }

    pub async fn set_deposit_address(&self, currency: &str, address: &str) {
        self.deposit_addresses
            .write()
            .await
            .insert(currency.to_string(), address.to_string());
    }

    /// Mark an open order as filled: it leaves the open list and balances move
    ///
    /// Limit orders settle at their limit price, market orders at the
    /// ticker's last price (or without a quote movement if there is none).
    pub async fn fill_order(&self, order_id: &str) -> bool {
        let Some(order) = self.open_orders.write().await.remove(order_id) else {
            return false;
        };
        let price = match order.order_type {
            OrderType::Limit => order.limit_price,
            OrderType::Market => self.tickers.read().await.get(&order.pair).map(|t| t.last),
        };
        let cost = price.map(|p| p * order.volume).unwrap_or(Decimal::ZERO);

        let mut balances = self.balances.write().await;
        let (base_delta, quote_delta) = match order.side {
            Side::Buy => (order.volume, -cost),
            Side::Sell => (-order.volume, cost),
        };
        *balances.entry(order.pair.base.clone()).or_default() += base_delta;
        *balances.entry(order.pair.quote.clone()).or_default() += quote_delta;

        info!("{} filled order {}: {:?}", self.name, order_id, order);
        true
    }

    /// Remove an open order without touching balances
    pub async fn cancel_order(&self, order_id: &str) -> bool {
        let removed = self.open_orders.write().await.remove(order_id).is_some();
        if removed {
            info!("{} cancelled order {}", self.name, order_id);
        }
        removed
    }

    /// Orders placed so far, oldest first
    pub async fn placed_orders(&self) -> Vec<(OrderId, Order)> {
        self.placed_orders.read().await.clone()
    }

    pub async fn withdrawals(&self) -> Vec<Withdrawal> {
        self.withdrawals.read().await.clone()
    }

    // ============ Test controls ============

    /// Number of times `call` has been made
    pub fn calls(&self, call: AdapterCall) -> usize {
        self.calls.get(&call).map(|c| *c).unwrap_or(0)
    }

    /// Make every future `call` fail with a transport error
    pub fn fail(&self, call: AdapterCall) {
        self.fail_with(
            call,
            AdapterError::Transport(format!("{} unavailable", call.as_str())),
        );
    }

    pub fn fail_with(&self, call: AdapterCall, error: AdapterError) {
        self.failures.insert(call, error);
    }

    /// Stop failing `call`
    pub fn recover(&self, call: AdapterCall) {
        self.failures.remove(&call);
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Accept orders but report no order id
    pub fn withhold_order_ids(&self, withhold: bool) {
        self.withhold_order_ids.store(withhold, Ordering::SeqCst);
    }

    /// Count the call, apply latency, and return the injected failure if any
    async fn enter(&self, call: AdapterCall) -> AdapterResult<()> {
        *self.calls.entry(call).or_insert(0) += 1;
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        let failure = self.failures.get(&call).map(|e| e.value().clone());
        match failure {
            Some(error) => {
                debug!("{} injected failure on {}: {}", self.name, call.as_str(), error);
                Err(error)
            }
            None => Ok(()),
        }
    }

    async fn accept_order(&self, order: &Order) -> AdapterResult<Option<OrderId>> {
        if !order.validate() {
            return Err(AdapterError::Api {
                code: 400,
                message: format!("invalid order: {:?}", order),
            });
        }
        let id = format!("sim-{}", self.next_order_id.fetch_add(1, Ordering::SeqCst));
        self.open_orders
            .write()
            .await
            .insert(id.clone(), order.clone());
        self.placed_orders
            .write()
            .await
            .push((id.clone(), order.clone()));
        info!("{} accepted order {}: {:?}", self.name, id, order);

        if self.withhold_order_ids.load(Ordering::SeqCst) {
            Ok(None)
        } else {
            Ok(Some(id))
        }
    }
}

#[async_trait]
impl ExchangeAdapter for SimulatedExchange {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ticker(&self, pair: &CurrencyPair) -> AdapterResult<Ticker> {
        self.enter(AdapterCall::Ticker).await?;
        self.tickers
            .read()
            .await
            .get(pair)
            .copied()
            .ok_or_else(|| AdapterError::Api {
                code: 404,
                message: format!("unknown pair {}", pair),
            })
    }

    async fn order_book(&self, pair: &CurrencyPair) -> AdapterResult<OrderBookSnapshot> {
        self.enter(AdapterCall::OrderBook).await?;
        Ok(self.books.read().await.get(pair).cloned().unwrap_or_default())
    }

    async fn balance(&self, currency: &str) -> AdapterResult<Decimal> {
        self.enter(AdapterCall::Balance).await?;
        Ok(self
            .balances
            .read()
            .await
            .get(currency)
            .copied()
            .unwrap_or(Decimal::ZERO))
    }

    async fn place_limit_order(&self, order: &Order) -> AdapterResult<Option<OrderId>> {
        self.enter(AdapterCall::PlaceLimitOrder).await?;
        if order.order_type != OrderType::Limit {
            return Err(AdapterError::Api {
                code: 400,
                message: "expected a limit order".to_string(),
            });
        }
        self.accept_order(order).await
    }

    async fn place_market_order(&self, order: &Order) -> AdapterResult<Option<OrderId>> {
        self.enter(AdapterCall::PlaceMarketOrder).await?;
        if order.order_type != OrderType::Market {
            return Err(AdapterError::Api {
                code: 400,
                message: "expected a market order".to_string(),
            });
        }
        self.accept_order(order).await
    }

    async fn open_orders(&self) -> AdapterResult<HashSet<OrderId>> {
        self.enter(AdapterCall::OpenOrders).await?;
        Ok(self.open_orders.read().await.keys().cloned().collect())
    }

    async fn withdraw(
        &self,
        currency: &str,
        amount: Decimal,
        address: &str,
    ) -> AdapterResult<String> {
        self.enter(AdapterCall::Withdraw).await?;
        let mut balances = self.balances.write().await;
        let available = balances.get(currency).copied().unwrap_or(Decimal::ZERO);
        if amount <= Decimal::ZERO || amount > available {
            return Ok(format!("REJECTED: insufficient {} balance", currency));
        }
        balances.insert(currency.to_string(), available - amount);
        drop(balances);

        self.withdrawals.write().await.push(Withdrawal {
            currency: currency.to_string(),
            amount,
            address: address.to_string(),
        });
        Ok(WITHDRAWAL_OK.to_string())
    }

    async fn deposit_address(&self, currency: &str) -> AdapterResult<String> {
        self.enter(AdapterCall::DepositAddress).await?;
        self.deposit_addresses
            .read()
            .await
            .get(currency)
            .cloned()
            .ok_or_else(|| AdapterError::Api {
                code: 404,
                message: format!("no deposit address for {}", currency),
            })
    }

    fn is_withdrawal_successful(&self, result: &str) -> bool {
        result == WITHDRAWAL_OK
    }
}
