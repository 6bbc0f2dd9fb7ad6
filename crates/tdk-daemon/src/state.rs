//! Shared runtime state for tdk-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The engine parts are
//! built once by the composition root and shared here by `Arc`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tdk_alerts::{AlertDispatcher, AlertPoller, Notifier};
use tdk_reconcile::Scanner;
use tdk_runtime::Engine;
use tdk_schemas::OrderAlert;
use tdk_sync::{SyncReport, TradeSyncWorker};
use tokio::sync::{broadcast, watch, RwLock};

// ---------------------------------------------------------------------------
// BusMsg — SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Status(StatusSnapshot),
    Sync(SyncReport),
    Alert(OrderAlert),
    LogLine { level: String, msg: String },
}

impl BusMsg {
    pub fn event_name(&self) -> &'static str {
        match self {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::Status(_) => "status",
            BusMsg::Sync(_) => "sync",
            BusMsg::Alert(_) => "alert",
            BusMsg::LogLine { .. } => "log",
        }
    }
}

/// Notification layer for the GUI: every delivered alert becomes an SSE
/// `alert` event. Having no subscriber is not a failure.
pub struct BusNotifier {
    bus: broadcast::Sender<BusMsg>,
}

impl BusNotifier {
    pub fn new(bus: broadcast::Sender<BusMsg>) -> Self {
        Self { bus }
    }
}

#[async_trait::async_trait]
impl Notifier for BusNotifier {
    async fn notify(&self, alert: &OrderAlert) -> anyhow::Result<()> {
        let _ = self.bus.send(BusMsg::Alert(alert.clone()));
        Ok(())
    }
}

pub fn new_bus() -> broadcast::Sender<BusMsg> {
    let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
    bus
}

// ---------------------------------------------------------------------------
// BuildInfo / StatusSnapshot
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Point-in-time view of the daemon, returned by GET /v1/status and carried
/// inside SSE `status` events.
#[derive(Clone, Debug, Serialize)]
pub struct StatusSnapshot {
    pub daemon_uptime_secs: u64,
    pub engine_id: String,
    pub sync_running: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_sync: Option<SyncReport>,
    pub alerts_muted: bool,
    pub alerts_user_id: String,
    pub cached_orders: usize,
}

#[derive(Clone, Debug, Default)]
pub struct LastSync {
    pub at: Option<DateTime<Utc>>,
    pub report: Option<SyncReport>,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub engine_id: String,
    pub worker: Arc<TradeSyncWorker>,
    pub scanner: Arc<Scanner>,
    pub poller: Arc<AlertPoller>,
    pub dispatcher: Arc<AlertDispatcher>,
    pub last_sync: Arc<RwLock<LastSync>>,
}

impl AppState {
    /// `bus` must be the one the engine's [`BusNotifier`] publishes to.
    pub fn new(engine: &Engine, bus: broadcast::Sender<BusMsg>) -> Self {
        Self {
            bus,
            build: BuildInfo {
                service: "tdk-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            engine_id: engine.config.engine.engine_id.clone(),
            worker: engine.worker.clone(),
            scanner: engine.scanner.clone(),
            poller: engine.poller.clone(),
            dispatcher: engine.dispatcher.clone(),
            last_sync: Arc::new(RwLock::new(LastSync::default())),
        }
    }

    /// Record a completed sync cycle and publish it on the bus.
    pub async fn record_sync(&self, report: SyncReport) {
        {
            let mut last = self.last_sync.write().await;
            last.at = Some(Utc::now());
            last.report = Some(report.clone());
        }
        let _ = self.bus.send(BusMsg::Sync(report));
    }

    pub async fn snapshot(&self) -> StatusSnapshot {
        let last = self.last_sync.read().await.clone();
        let alerts_muted = match self.dispatcher.muted().await {
            Ok(m) => m,
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "mute flag unreadable");
                false
            }
        };
        StatusSnapshot {
            daemon_uptime_secs: uptime_secs(),
            engine_id: self.engine_id.clone(),
            sync_running: self.worker.is_running(),
            last_sync_at: last.at,
            last_sync: last.report,
            alerts_muted,
            alerts_user_id: self.dispatcher.user_id().to_string(),
            cached_orders: self.poller.cached_orders().await,
        }
    }

    pub fn log(&self, level: &str, msg: impl Into<String>) {
        let _ = self.bus.send(BusMsg::LogLine {
            level: level.to_string(),
            msg: msg.into(),
        });
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Seconds since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Emit a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}

/// Forward scheduled sync reports into the status snapshot and the bus.
pub fn spawn_sync_forwarder(state: Arc<AppState>, mut reports: watch::Receiver<Option<SyncReport>>) {
    tokio::spawn(async move {
        while reports.changed().await.is_ok() {
            let report = reports.borrow_and_update().clone();
            if let Some(report) = report {
                state.record_sync(report).await;
            }
        }
    });
}
