use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tdk_schemas::{EngineError, Order, OrderAlert};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::cache::OrderSnapshotCache;
use crate::classify::{classify, AlertThresholds};
use crate::dispatcher::{AlertDispatcher, DispatchReport};

/// Source of the current order list.
#[async_trait::async_trait]
pub trait OrderFeed: Send + Sync {
    async fn list_orders(&self) -> anyhow::Result<Vec<Order>>;
}

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("order feed unavailable: {0:#}")]
    Feed(anyhow::Error),
}

impl From<AlertError> for EngineError {
    fn from(e: AlertError) -> Self {
        EngineError::TransientNetwork(e.to_string())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PollReport {
    pub orders: usize,
    /// First poll: cache filled, nothing dispatched.
    pub primed: bool,
    pub evicted: usize,
    pub alerts: Vec<OrderAlert>,
    pub dispatch: DispatchReport,
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Polls the feed and dispatches alerts. Polls are serialized on the cache
/// lock, so a refresh racing the scheduled poll cannot double-fire.
pub struct AlertPoller {
    feed: Arc<dyn OrderFeed>,
    dispatcher: Arc<AlertDispatcher>,
    thresholds: AlertThresholds,
    cache: Mutex<OrderSnapshotCache>,
    clock: Clock,
}

impl AlertPoller {
    pub fn new(
        feed: Arc<dyn OrderFeed>,
        dispatcher: Arc<AlertDispatcher>,
        thresholds: AlertThresholds,
    ) -> Self {
        Self {
            feed,
            dispatcher,
            thresholds,
            cache: Mutex::new(OrderSnapshotCache::new()),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn dispatcher(&self) -> &Arc<AlertDispatcher> {
        &self.dispatcher
    }

    pub async fn cached_orders(&self) -> usize {
        self.cache.lock().await.len()
    }

    pub async fn poll_once(&self) -> Result<PollReport, AlertError> {
        let orders = self.feed.list_orders().await.map_err(AlertError::Feed)?;
        let now = (self.clock)();

        let mut cache = self.cache.lock().await;
        let mut report = PollReport {
            orders: orders.len(),
            ..PollReport::default()
        };

        if !cache.is_primed() {
            cache.prime(&orders, now);
            report.primed = true;
            tracing::info!(orders = orders.len(), "alert cache primed");
            return Ok(report);
        }

        let mut seen: HashSet<String> = HashSet::with_capacity(orders.len());
        for order in orders {
            let kinds = classify(cache.get(&order.id), &order, now, &self.thresholds);
            for kind in kinds {
                report.alerts.push(OrderAlert {
                    order_id: order.id.clone(),
                    order_number: order.order_number.clone(),
                    alert_type: kind,
                    counterparty: order.counterparty.clone(),
                    amount: order.amount,
                    urgent: kind.is_urgent(),
                    fired_at: now,
                });
            }
            seen.insert(order.id.clone());
            cache.record(order, now);
        }
        report.evicted = cache.retain_seen(&seen);

        report.dispatch = self.dispatcher.dispatch(&report.alerts).await;
        drop(cache);

        if !report.alerts.is_empty() || report.evicted > 0 {
            tracing::info!(
                orders = report.orders,
                alerts = report.alerts.len(),
                delivered = report.dispatch.delivered,
                suppressed = report.dispatch.suppressed,
                evicted = report.evicted,
                "alert poll"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Notifier;
    use crate::kv::MemoryKeyValueStore;
    use chrono::Duration;
    use std::sync::Mutex as StdMutex;
    use tdk_schemas::{AlertType, Side};

    struct Feed(StdMutex<Vec<Order>>);

    #[async_trait::async_trait]
    impl OrderFeed for Feed {
        async fn list_orders(&self) -> anyhow::Result<Vec<Order>> {
            Ok(self.0.lock().unwrap().clone())
        }
    }

    #[derive(Default)]
    struct Sink(StdMutex<Vec<OrderAlert>>);

    #[async_trait::async_trait]
    impl Notifier for Sink {
        async fn notify(&self, alert: &OrderAlert) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(alert.clone());
            Ok(())
        }
    }

    fn order(id: &str) -> Order {
        Order {
            id: id.to_string(),
            order_number: format!("n-{id}"),
            side: Side::Sell,
            raw_status: "TRADING".to_string(),
            amount: None,
            asset: Some("USDT".to_string()),
            fiat: Some("EUR".to_string()),
            counterparty: Some("alice".to_string()),
            payment_deadline: None,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn first_poll_primes_then_new_orders_alert_and_missing_are_evicted() {
        let feed = Arc::new(Feed(StdMutex::new(vec![order("a"), order("b")])));
        let sink = Arc::new(Sink::default());
        let dispatcher = Arc::new(AlertDispatcher::new(
            Arc::new(MemoryKeyValueStore::new()),
            sink.clone(),
            "op",
        ));
        let t0 = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let poller = AlertPoller::new(feed.clone(), dispatcher, AlertThresholds::default())
            .with_clock(move || t0);

        let r = poller.poll_once().await.unwrap();
        assert!(r.primed);
        assert!(r.alerts.is_empty());
        assert_eq!(poller.cached_orders().await, 2);

        *feed.0.lock().unwrap() = vec![order("b"), order("c")];
        let r = poller.poll_once().await.unwrap();
        assert!(!r.primed);
        assert_eq!(r.evicted, 1);
        assert_eq!(r.alerts.len(), 1);
        assert_eq!(r.alerts[0].order_id, "c");
        assert_eq!(r.alerts[0].alert_type, AlertType::NewOrder);
        assert_eq!(r.dispatch.delivered, 1);
        assert_eq!(sink.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn timer_alerts_are_urgent() {
        let t0 = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let mut o = order("a");
        o.payment_deadline = Some(t0 + Duration::minutes(6));
        let feed = Arc::new(Feed(StdMutex::new(vec![o])));
        let dispatcher = Arc::new(AlertDispatcher::new(
            Arc::new(MemoryKeyValueStore::new()),
            Arc::new(Sink::default()),
            "op",
        ));
        let now = Arc::new(StdMutex::new(t0));
        let clock = now.clone();
        let poller = AlertPoller::new(feed, dispatcher, AlertThresholds::default())
            .with_clock(move || *clock.lock().unwrap());

        poller.poll_once().await.unwrap();
        *now.lock().unwrap() = t0 + Duration::minutes(2);
        let r = poller.poll_once().await.unwrap();
        assert_eq!(r.alerts.len(), 1);
        assert_eq!(r.alerts[0].alert_type, AlertType::PaymentTimer);
        assert!(r.alerts[0].urgent);
    }
}
