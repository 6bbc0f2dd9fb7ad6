//! Composition root: builds the sync worker, scanner and alert poller from
//! config plus injected storage/exchange seams, and schedules them.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tdk_alerts::{AlertDispatcher, AlertPoller, AlertThresholds, KeyValueStore, Notifier};
use tdk_config::secrets::ResolvedSecrets;
use tdk_config::{EngineConfig, MAX_WINDOW_SECS};
use tdk_exchange::{ExchangeClient, HttpExchangeClient};
use tdk_reconcile::{FindingsStore, LedgerSource, ScanConfig, Scanner};
use tdk_sync::{LedgerStore, SyncReport, TradeSyncWorker};
use tokio::sync::watch;

use crate::feed::ExchangeOrderFeed;
use crate::jobs::{AlertJob, ScanJob, SyncJob};
use crate::pg::{PgFindingsStore, PgLedger, PgSettingsKv};
use crate::scheduler::{JobHandle, Scheduler};

/// Everything the engine talks to.
#[derive(Clone)]
pub struct EngineParts {
    pub exchange: Arc<dyn ExchangeClient>,
    pub ledger: Arc<dyn LedgerStore>,
    pub ledger_source: Arc<dyn LedgerSource>,
    pub findings: Arc<dyn FindingsStore>,
    pub kv: Arc<dyn KeyValueStore>,
    pub notifier: Arc<dyn Notifier>,
}

impl EngineParts {
    /// Production wiring over one Postgres pool.
    pub fn postgres(pool: PgPool, exchange: Arc<dyn ExchangeClient>, notifier: Arc<dyn Notifier>) -> Self {
        let ledger = Arc::new(PgLedger::new(pool.clone()));
        Self {
            exchange,
            ledger: ledger.clone(),
            ledger_source: ledger,
            findings: Arc::new(PgFindingsStore::new(pool.clone())),
            kv: Arc::new(PgSettingsKv::new(pool)),
            notifier,
        }
    }
}

pub fn exchange_client(cfg: &EngineConfig, secrets: &ResolvedSecrets) -> HttpExchangeClient {
    HttpExchangeClient::new(
        &cfg.exchange.base_url,
        secrets.exchange_api_key.clone(),
        Duration::from_secs(cfg.exchange.timeout_secs.max(1)),
    )
    .with_source(cfg.sync.source.clone())
}

/// Seconds as a chrono duration, clamped to the range config validation allows.
fn window(secs: i64) -> chrono::Duration {
    chrono::Duration::seconds(secs.clamp(0, MAX_WINDOW_SECS))
}

pub fn scan_config(cfg: &EngineConfig) -> ScanConfig {
    ScanConfig {
        quote_tolerance: cfg.reconcile.quote_tolerance,
        stale_after: window(cfg.reconcile.stale_after_secs),
        ..ScanConfig::default()
    }
}

pub fn alert_thresholds(cfg: &EngineConfig) -> AlertThresholds {
    AlertThresholds {
        payment: window(cfg.alerts.payment_threshold_secs),
        order: window(cfg.alerts.order_threshold_secs),
    }
}

pub struct Engine {
    pub config: EngineConfig,
    pub worker: Arc<TradeSyncWorker>,
    pub scanner: Arc<Scanner>,
    pub poller: Arc<AlertPoller>,
    pub dispatcher: Arc<AlertDispatcher>,
    pub kv: Arc<dyn KeyValueStore>,
}

impl Engine {
    pub fn build(config: EngineConfig, parts: EngineParts) -> Self {
        let worker = Arc::new(
            TradeSyncWorker::new(parts.exchange.clone(), parts.ledger)
                .with_batch_size(config.sync.batch_size),
        );
        let scanner = Arc::new(Scanner::new(
            parts.ledger_source,
            parts.findings,
            scan_config(&config),
        ));
        let dispatcher = Arc::new(AlertDispatcher::new(
            parts.kv.clone(),
            parts.notifier,
            config.alerts.user_id.clone(),
        ));
        let poller = Arc::new(AlertPoller::new(
            Arc::new(ExchangeOrderFeed::new(parts.exchange)),
            dispatcher.clone(),
            alert_thresholds(&config),
        ));

        Self {
            config,
            worker,
            scanner,
            poller,
            dispatcher,
            kv: parts.kv,
        }
    }

    /// Schedule sync, alert polling and (when configured) periodic scans.
    pub fn start(&self) -> RunningEngine {
        let mut scheduler = Scheduler::new();

        let sync_job = Arc::new(SyncJob::new(self.worker.clone()));
        let sync_reports = sync_job.reports();
        let sync = scheduler.spawn(
            sync_job,
            Duration::from_secs(self.config.sync.interval_secs),
        );

        let alerts = scheduler.spawn(
            Arc::new(AlertJob::new(self.poller.clone())),
            Duration::from_secs(self.config.alerts.poll_secs),
        );

        let scan = self.config.reconcile.schedule().map(|secs| {
            scheduler.spawn(
                Arc::new(ScanJob::new(
                    self.scanner.clone(),
                    self.config.reconcile.default_scope.clone(),
                )),
                Duration::from_secs(secs),
            )
        });

        tracing::info!(
            engine_id = %self.config.engine.engine_id,
            jobs = scheduler.job_count(),
            "engine started"
        );

        RunningEngine {
            scheduler,
            sync,
            alerts,
            scan,
            sync_reports,
        }
    }
}

pub struct RunningEngine {
    scheduler: Scheduler,
    pub sync: JobHandle,
    pub alerts: JobHandle,
    pub scan: Option<JobHandle>,
    pub sync_reports: watch::Receiver<Option<SyncReport>>,
}

impl RunningEngine {
    pub async fn shutdown(self) {
        self.scheduler.shutdown().await;
        tracing::info!("engine stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unvalidated_windows_are_clamped() {
        let mut cfg = EngineConfig::default();
        cfg.alerts.payment_threshold_secs = i64::MAX;
        cfg.alerts.order_threshold_secs = -5;
        cfg.reconcile.stale_after_secs = i64::MIN;

        let t = alert_thresholds(&cfg);
        assert_eq!(t.payment.num_seconds(), MAX_WINDOW_SECS);
        assert_eq!(t.order.num_seconds(), 0);
        assert_eq!(scan_config(&cfg).stale_after.num_seconds(), 0);
    }
}
