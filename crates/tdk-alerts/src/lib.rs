//! tdk-alerts
//!
//! Order alert dispatcher.
//!
//! The poller owns an explicit [`OrderSnapshotCache`]; each poll compares the
//! feed against the last observation and classifies the differences into
//! alerts. Delivery is gated by a per-user mute flag read from the injected
//! [`KeyValueStore`] on every dispatch. Suppressed alerts are dropped.

mod cache;
mod classify;
mod dispatcher;
mod kv;
mod poller;

pub use cache::{ObservedOrder, OrderSnapshotCache};
pub use classify::{classify, AlertThresholds};
pub use dispatcher::{
    is_muted, mute_key, navigation_for, set_muted, AlertDispatcher, DispatchReport, Navigation,
    Notifier,
};
pub use kv::{KeyValueStore, KvChange, MemoryKeyValueStore};
pub use poller::{AlertError, AlertPoller, OrderFeed, PollReport};
