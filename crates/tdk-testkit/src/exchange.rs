use std::sync::Mutex;

use tdk_alerts::{Notifier, OrderFeed};
use tdk_exchange::{ExchangeClient, ExchangeError, FetchedOrders, FetchedTrades};
use tdk_schemas::{Order, OrderAlert, TradeRecord};

/// Exchange stand-in. Holds the exchange-side trade history and answers
/// `getMyTrades` with every trade at or after `startTime`, like the real
/// endpoint. Errors can be queued for the next call.
#[derive(Default)]
pub struct ScriptedExchange {
    trades: Mutex<Vec<TradeRecord>>,
    orders: Mutex<Vec<Order>>,
    next_error: Mutex<Option<ExchangeError>>,
    cursors: Mutex<Vec<Option<i64>>>,
}

impl ScriptedExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trades(trades: Vec<TradeRecord>) -> Self {
        let ex = Self::new();
        ex.push_trades(trades);
        ex
    }

    pub fn push_trades(&self, trades: Vec<TradeRecord>) {
        if let Ok(mut t) = self.trades.lock() {
            t.extend(trades);
        }
    }

    pub fn set_orders(&self, orders: Vec<Order>) {
        if let Ok(mut o) = self.orders.lock() {
            *o = orders;
        }
    }

    pub fn fail_next(&self, err: ExchangeError) {
        if let Ok(mut e) = self.next_error.lock() {
            *e = Some(err);
        }
    }

    /// `startTime` values received, in call order.
    pub fn requested_cursors(&self) -> Vec<Option<i64>> {
        self.cursors.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn take_error(&self) -> Option<ExchangeError> {
        self.next_error.lock().ok().and_then(|mut e| e.take())
    }
}

#[async_trait::async_trait]
impl ExchangeClient for ScriptedExchange {
    fn source_name(&self) -> &str {
        "scripted"
    }

    async fn fetch_my_trades(&self, start_time_ms: Option<i64>) -> Result<FetchedTrades, ExchangeError> {
        if let Ok(mut c) = self.cursors.lock() {
            c.push(start_time_ms);
        }
        if let Some(err) = self.take_error() {
            return Err(err);
        }
        let trades = self
            .trades
            .lock()
            .map_err(|_| ExchangeError::Transport("scripted exchange lock poisoned".to_string()))?
            .iter()
            .filter(|t| start_time_ms.map_or(true, |s| t.executed_at.timestamp_millis() >= s))
            .cloned()
            .collect();
        Ok(FetchedTrades {
            trades,
            rejected: Vec::new(),
        })
    }

    async fn fetch_orders(&self) -> Result<FetchedOrders, ExchangeError> {
        if let Some(err) = self.take_error() {
            return Err(err);
        }
        let orders = self
            .orders
            .lock()
            .map_err(|_| ExchangeError::Transport("scripted exchange lock poisoned".to_string()))?
            .clone();
        Ok(FetchedOrders {
            orders,
            rejected: Vec::new(),
        })
    }
}

/// Order feed whose contents the test replaces between polls.
#[derive(Default)]
pub struct ScriptedOrderFeed {
    orders: Mutex<Vec<Order>>,
}

impl ScriptedOrderFeed {
    pub fn new(orders: Vec<Order>) -> Self {
        Self {
            orders: Mutex::new(orders),
        }
    }

    pub fn set(&self, orders: Vec<Order>) {
        if let Ok(mut o) = self.orders.lock() {
            *o = orders;
        }
    }
}

#[async_trait::async_trait]
impl OrderFeed for ScriptedOrderFeed {
    async fn list_orders(&self) -> anyhow::Result<Vec<Order>> {
        self.orders
            .lock()
            .map(|o| o.clone())
            .map_err(|_| anyhow::anyhow!("order feed lock poisoned"))
    }
}

/// Notification layer that only records what it was asked to show.
#[derive(Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<OrderAlert>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<OrderAlert> {
        self.delivered.lock().map(|d| d.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut d) = self.delivered.lock() {
            d.clear();
        }
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, alert: &OrderAlert) -> anyhow::Result<()> {
        self.delivered
            .lock()
            .map_err(|_| anyhow::anyhow!("notifier lock poisoned"))?
            .push(alert.clone());
        Ok(())
    }
}
