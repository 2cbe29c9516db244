//! Order task state machine
//!
//! One task tracks one buy or sell from placement to settlement. The host
//! scheduler drives it: `create` once, then `step` repeatedly (no more often
//! than [`OrderTask::min_interval_seconds`]) until the task is finished.
//!
//! ```text
//! Created ──create──▶ Polling ──step──▶ Finished (result = order id)
//!    │                   │
//!    │ step, no order    └──step, past deadline──▶ Failed
//!    ▼
//! Finished (result = "skipped")
//! ```
//!
//! Settlement is detected by the order id disappearing from the exchange's
//! open orders. A cancelled order disappears the same way and is reported as
//! finished too; the adapter exposes nothing that tells the two apart.

use cashgate_core::{CurrencyPair, Order, OrderId, OrderType, Quantity, Side, Timestamp};
use cashgate_ports::{AdapterError, Clock, ExchangeAdapter};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Result reported by a task whose order was never placed
pub const SKIPPED_RESULT: &str = "skipped";

/// Task lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    /// Constructed; no order on the exchange yet
    Created,
    /// Order placed, waiting for it to leave the open-order list
    Polling,
    /// Done; `result` holds the order id or [`SKIPPED_RESULT`]
    Finished,
    /// Gave up or could not place the order; no result
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }
}

/// Timing shared by every task of a gateway
#[derive(Debug, Clone)]
pub struct TaskSettings {
    /// Pause after placing an order so the exchange lists it as open
    pub settle_delay: Duration,
    /// Time from task creation after which polling gives up
    pub timeout: chrono::Duration,
    /// Shortest gap the host should leave between two steps
    pub min_step_interval_secs: u64,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(2),
            timeout: chrono::Duration::hours(5),
            min_step_interval_secs: 5,
        }
    }
}

/// Serializable task state, for hosts that persist tasks across restarts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: Uuid,
    pub side: Side,
    pub pair: CurrencyPair,
    pub volume: Quantity,
    pub description: String,
    pub order_id: Option<OrderId>,
    pub created_at: Timestamp,
    pub deadline: Timestamp,
    pub state: TaskState,
    pub result: Option<String>,
}

/// One in-flight buy or sell
pub struct OrderTask {
    id: Uuid,
    side: Side,
    pair: CurrencyPair,
    volume: Quantity,
    description: String,
    /// Set at most once, by `create`
    order_id: Option<OrderId>,
    created_at: Timestamp,
    deadline: Timestamp,
    state: TaskState,
    /// Only ever `Some` in `Finished`
    result: Option<String>,
    adapter: Arc<dyn ExchangeAdapter>,
    clock: Arc<dyn Clock>,
    settings: TaskSettings,
}

impl OrderTask {
    /// Create a task; the deadline runs from now
    ///
    /// Currency codes are expected to have been checked already.
    pub fn new(
        side: Side,
        pair: CurrencyPair,
        volume: Quantity,
        description: impl Into<String>,
        adapter: Arc<dyn ExchangeAdapter>,
        clock: Arc<dyn Clock>,
        settings: TaskSettings,
    ) -> Self {
        let created_at = clock.now();
        Self {
            id: Uuid::new_v4(),
            side,
            pair,
            volume,
            description: description.into(),
            order_id: None,
            created_at,
            deadline: created_at + settings.timeout,
            state: TaskState::Created,
            result: None,
            adapter,
            clock,
            settings,
        }
    }

    /// Rebuild a task from a snapshot; polling resumes against the original deadline
    pub fn resume(
        snapshot: TaskSnapshot,
        adapter: Arc<dyn ExchangeAdapter>,
        clock: Arc<dyn Clock>,
        settings: TaskSettings,
    ) -> Self {
        // Keep the invariants even for a hand-edited snapshot.
        let result = match snapshot.state {
            TaskState::Finished => snapshot.result,
            _ => None,
        };
        Self {
            id: snapshot.id,
            side: snapshot.side,
            pair: snapshot.pair,
            volume: snapshot.volume,
            description: snapshot.description,
            order_id: snapshot.order_id,
            created_at: snapshot.created_at,
            deadline: snapshot.deadline,
            state: snapshot.state,
            result,
            adapter,
            clock,
            settings,
        }
    }

    /// Capture the task's state
    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            id: self.id,
            side: self.side,
            pair: self.pair.clone(),
            volume: self.volume,
            description: self.description.clone(),
            order_id: self.order_id.clone(),
            created_at: self.created_at,
            deadline: self.deadline,
            state: self.state,
            result: self.result.clone(),
        }
    }

    /// Place the order
    ///
    /// Returns true if the exchange returned an order id; the task then waits
    /// the settle delay and moves to `Polling`. If the exchange accepted the
    /// call without an id, the task stays `Created` and its next step finishes
    /// it as skipped. An adapter failure fails the task.
    ///
    /// Calling it again after an order was placed does nothing.
    pub async fn create(&mut self) -> bool {
        if self.state != TaskState::Created || self.order_id.is_some() {
            return self.order_id.is_some();
        }
        info!(
            "{} exchange {} task {}: {} {} ({})",
            self.adapter.name(),
            self.kind(),
            self.id,
            self.volume,
            self.pair,
            self.description
        );

        match self.place_order().await {
            Ok(Some(order_id)) => {
                debug!("{} exchange order placed: {}", self.adapter.name(), order_id);
                self.order_id = Some(order_id);
                tokio::time::sleep(self.settings.settle_delay).await;
                self.state = TaskState::Polling;
                true
            }
            Ok(None) => {
                warn!(
                    "{} exchange {} task {}: no order id returned",
                    self.adapter.name(),
                    self.kind(),
                    self.id
                );
                false
            }
            Err(e) => {
                error!(
                    "{} exchange {} task {} failed: {}",
                    self.adapter.name(),
                    self.kind(),
                    self.id,
                    e
                );
                self.state = TaskState::Failed;
                false
            }
        }
    }

    /// Poll once; returns true once the task is finished
    ///
    /// Never blocks beyond one open-orders request. A terminal task is left
    /// untouched.
    pub async fn step(&mut self) -> bool {
        if self.state.is_terminal() {
            return true;
        }

        let Some(order_id) = self.order_id.clone() else {
            debug!(
                "{} exchange {} task {}: giving up, the order was never placed",
                self.adapter.name(),
                self.kind(),
                self.id
            );
            self.finish(SKIPPED_RESULT.to_string());
            return true;
        };

        if self.clock.now() > self.deadline {
            warn!(
                "{} exchange {} task {}: giving up on order {} after deadline {}",
                self.adapter.name(),
                self.kind(),
                self.id,
                order_id,
                self.deadline
            );
            self.state = TaskState::Failed;
            return true;
        }

        match self.adapter.open_orders().await {
            Ok(open) if open.contains(&order_id) => {
                debug!(
                    "{} exchange order {} still open, waiting",
                    self.adapter.name(),
                    order_id
                );
                false
            }
            Ok(_) => {
                info!(
                    "{} exchange order {} no longer open, {} task {} finished",
                    self.adapter.name(),
                    order_id,
                    self.kind(),
                    self.id
                );
                self.finish(order_id);
                true
            }
            Err(e) => {
                warn!(
                    "{} exchange open orders unavailable, retrying next step: {}",
                    self.adapter.name(),
                    e
                );
                false
            }
        }
    }

    /// Host notification after the result has been consumed
    pub fn on_finish(&self) {
        debug!("{} task {} finished.", capitalize(self.kind()), self.id);
    }

    /// True in either terminal state
    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn is_failed(&self) -> bool {
        self.state == TaskState::Failed
    }

    /// Order id, or [`SKIPPED_RESULT`], once finished
    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    /// Shortest interval the host should leave between steps
    pub fn min_interval_seconds(&self) -> u64 {
        self.settings.min_step_interval_secs
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn pair(&self) -> &CurrencyPair {
        &self.pair
    }

    pub fn volume(&self) -> Quantity {
        self.volume
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn order_id(&self) -> Option<&str> {
        self.order_id.as_deref()
    }

    pub fn deadline(&self) -> Timestamp {
        self.deadline
    }

    fn finish(&mut self, result: String) {
        self.state = TaskState::Finished;
        self.result = Some(result);
    }

    /// Build the side's order and submit it
    ///
    /// The side decides the order: a buy is a limit order at the current best
    /// ask, a sell is a market order.
    async fn place_order(&self) -> Result<Option<OrderId>, AdapterError> {
        let order = match self.side {
            Side::Buy => {
                let ticker = self.adapter.ticker(&self.pair).await?;
                let Some(ask) = ticker.ask else {
                    warn!("{} exchange has no ask for {}", self.adapter.name(), self.pair);
                    return Ok(None);
                };
                Order::limit(Side::Buy, self.pair.clone(), self.volume, ask)
            }
            Side::Sell => Order::market(Side::Sell, self.pair.clone(), self.volume),
        };
        debug!("{} exchange submitting {:?}", self.adapter.name(), order);

        let order_id = match order.order_type {
            OrderType::Limit => self.adapter.place_limit_order(&order).await?,
            OrderType::Market => self.adapter.place_market_order(&order).await?,
        };
        Ok(order_id.filter(|id| !id.trim().is_empty()))
    }

    fn kind(&self) -> &'static str {
        match self.side {
            Side::Buy => "purchase",
            Side::Sell => "sale",
        }
    }
}

impl std::fmt::Debug for OrderTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderTask")
            .field("id", &self.id)
            .field("side", &self.side)
            .field("pair", &self.pair)
            .field("volume", &self.volume)
            .field("order_id", &self.order_id)
            .field("state", &self.state)
            .field("result", &self.result)
            .field("deadline", &self.deadline)
            .finish()
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cashgate_clock::ManualClock;
    use cashgate_core::{OrderBookSnapshot, Ticker};
    use cashgate_ports::AdapterResult;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Adapter whose open orders are set directly by the test
    #[derive(Default)]
    struct ScriptedAdapter {
        open: Mutex<HashSet<OrderId>>,
        next_id: Mutex<Option<OrderId>>,
        placed: Mutex<Vec<Order>>,
    }

    #[async_trait]
    impl ExchangeAdapter for ScriptedAdapter {
        fn name(&self) -> &str {
            "Scripted"
        }

        async fn ticker(&self, _pair: &CurrencyPair) -> AdapterResult<Ticker> {
            Ok(Ticker::new(dec!(100), Some(dec!(99)), Some(dec!(101))))
        }

        async fn order_book(&self, _pair: &CurrencyPair) -> AdapterResult<OrderBookSnapshot> {
            Ok(OrderBookSnapshot::default())
        }

        async fn balance(&self, _currency: &str) -> AdapterResult<Decimal> {
            Ok(Decimal::ZERO)
        }

        async fn place_limit_order(&self, order: &Order) -> AdapterResult<Option<OrderId>> {
            self.placed.lock().unwrap().push(order.clone());
            let id = self.next_id.lock().unwrap().take();
            if let Some(id) = &id {
                self.open.lock().unwrap().insert(id.clone());
            }
            Ok(id)
        }

        async fn place_market_order(&self, order: &Order) -> AdapterResult<Option<OrderId>> {
            self.place_limit_order(order).await
        }

        async fn open_orders(&self) -> AdapterResult<HashSet<OrderId>> {
            Ok(self.open.lock().unwrap().clone())
        }

        async fn withdraw(&self, _: &str, _: Decimal, _: &str) -> AdapterResult<String> {
            Err(AdapterError::Unsupported("withdraw".to_string()))
        }

        async fn deposit_address(&self, _: &str) -> AdapterResult<String> {
            Err(AdapterError::Unsupported("deposit".to_string()))
        }
    }

    fn task(side: Side, adapter: Arc<ScriptedAdapter>, clock: Arc<ManualClock>) -> OrderTask {
        OrderTask::new(
            side,
            CurrencyPair::new("BTC", "USD"),
            dec!(0.25),
            "test",
            adapter,
            clock,
            TaskSettings::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_buy_places_limit_at_ask() {
        let adapter = Arc::new(ScriptedAdapter::default());
        *adapter.next_id.lock().unwrap() = Some("o-1".to_string());
        let mut task = task(Side::Buy, adapter.clone(), ManualClock::new(None));

        assert!(task.create().await);
        assert_eq!(task.state(), TaskState::Polling);
        assert_eq!(task.order_id(), Some("o-1"));

        let placed = adapter.placed.lock().unwrap();
        assert_eq!(placed[0].order_type, OrderType::Limit);
        assert_eq!(placed[0].limit_price, Some(dec!(101)));
        assert_eq!(placed[0].volume, dec!(0.25));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sell_places_market_order() {
        let adapter = Arc::new(ScriptedAdapter::default());
        *adapter.next_id.lock().unwrap() = Some("o-2".to_string());
        let mut task = task(Side::Sell, adapter.clone(), ManualClock::new(None));

        assert!(task.create().await);
        let placed = adapter.placed.lock().unwrap();
        assert_eq!(placed[0].order_type, OrderType::Market);
        assert_eq!(placed[0].side, Side::Sell);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_waits_settle_delay() {
        let adapter = Arc::new(ScriptedAdapter::default());
        *adapter.next_id.lock().unwrap() = Some("o-3".to_string());
        let mut task = task(Side::Sell, adapter, ManualClock::new(None));

        let start = tokio::time::Instant::now();
        task.create().await;
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_twice_keeps_first_order() {
        let adapter = Arc::new(ScriptedAdapter::default());
        *adapter.next_id.lock().unwrap() = Some("o-4".to_string());
        let mut task = task(Side::Buy, adapter.clone(), ManualClock::new(None));

        assert!(task.create().await);
        *adapter.next_id.lock().unwrap() = Some("o-5".to_string());
        assert!(task.create().await);
        assert_eq!(task.order_id(), Some("o-4"));
        assert_eq!(adapter.placed.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_order_id_counts_as_none() {
        let adapter = Arc::new(ScriptedAdapter::default());
        *adapter.next_id.lock().unwrap() = Some("  ".to_string());
        let mut task = task(Side::Sell, adapter, ManualClock::new(None));

        assert!(!task.create().await);
        assert_eq!(task.state(), TaskState::Created);
        assert!(task.step().await);
        assert_eq!(task.result(), Some(SKIPPED_RESULT));
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_resume_keeps_deadline() {
        let adapter = Arc::new(ScriptedAdapter::default());
        *adapter.next_id.lock().unwrap() = Some("o-6".to_string());
        let clock = ManualClock::new(None);
        let mut task = task(Side::Buy, adapter.clone(), clock.clone());
        task.create().await;

        let json = serde_json::to_string(&task.snapshot()).unwrap();
        let snapshot: TaskSnapshot = serde_json::from_str(&json).unwrap();
        let mut resumed =
            OrderTask::resume(snapshot, adapter.clone(), clock.clone(), TaskSettings::default());

        assert_eq!(resumed.id(), task.id());
        assert_eq!(resumed.deadline(), task.deadline());
        assert_eq!(resumed.state(), TaskState::Polling);
        assert!(!resumed.step().await);

        adapter.open.lock().unwrap().clear();
        assert!(resumed.step().await);
        assert_eq!(resumed.result(), Some("o-6"));
    }

    #[test]
    fn test_resume_drops_result_outside_finished() {
        let adapter = Arc::new(ScriptedAdapter::default());
        let clock = ManualClock::new(None);
        let mut snapshot = task(Side::Buy, adapter.clone(), clock.clone()).snapshot();
        snapshot.state = TaskState::Failed;
        snapshot.result = Some("o-7".to_string());

        let resumed = OrderTask::resume(snapshot, adapter, clock, TaskSettings::default());
        assert!(resumed.is_failed());
        assert_eq!(resumed.result(), None);
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("purchase"), "Purchase");
        assert_eq!(capitalize(""), "");
    }
}
