use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tdk_lifecycle::{order_status, CanonicalStatus};
use tdk_schemas::Order;

/// Last observation of one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedOrder {
    pub order: Order,
    pub status: CanonicalStatus,
    pub observed_at: DateTime<Utc>,
}

impl ObservedOrder {
    pub fn new(order: Order, observed_at: DateTime<Utc>) -> Self {
        Self {
            status: order_status(&order),
            order,
            observed_at,
        }
    }
}

/// Order snapshots keyed by order id. Owned by the poller; nothing global.
#[derive(Debug, Default)]
pub struct OrderSnapshotCache {
    orders: HashMap<String, ObservedOrder>,
    primed: bool,
}

impl OrderSnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `false` until the first poll has been recorded.
    pub fn is_primed(&self) -> bool {
        self.primed
    }

    pub fn get(&self, order_id: &str) -> Option<&ObservedOrder> {
        self.orders.get(order_id)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Record the first poll without producing alerts.
    pub fn prime(&mut self, orders: &[Order], now: DateTime<Utc>) {
        for o in orders {
            self.record(o.clone(), now);
        }
        self.primed = true;
    }

    pub fn record(&mut self, order: Order, now: DateTime<Utc>) {
        self.orders
            .insert(order.id.clone(), ObservedOrder::new(order, now));
    }

    /// Drop orders absent from the latest feed. Returns how many were evicted.
    pub fn retain_seen(&mut self, seen: &HashSet<String>) -> usize {
        let before = self.orders.len();
        self.orders.retain(|id, _| seen.contains(id));
        before - self.orders.len()
    }
}
