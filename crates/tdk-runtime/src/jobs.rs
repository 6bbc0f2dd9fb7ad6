use std::sync::Arc;

use tdk_alerts::AlertPoller;
use tdk_reconcile::{ScanRequest, Scanner};
use tdk_schemas::EngineError;
use tdk_sync::{CycleOutcome, SyncReport, TradeSyncWorker};
use tokio::sync::watch;

use crate::scheduler::PeriodicJob;

pub const SCHEDULED_TRIGGER: &str = "scheduler";

/// Runs one sync cycle per tick and publishes the latest report.
pub struct SyncJob {
    worker: Arc<TradeSyncWorker>,
    last: watch::Sender<Option<SyncReport>>,
}

impl SyncJob {
    pub fn new(worker: Arc<TradeSyncWorker>) -> Self {
        let (last, _rx) = watch::channel(None);
        Self { worker, last }
    }

    pub fn reports(&self) -> watch::Receiver<Option<SyncReport>> {
        self.last.subscribe()
    }
}

#[async_trait::async_trait]
impl PeriodicJob for SyncJob {
    fn name(&self) -> &'static str {
        "trade_sync"
    }

    async fn run(&self) -> anyhow::Result<()> {
        match self.worker.run_cycle().await {
            Ok(CycleOutcome::Completed(report)) => {
                self.last.send_replace(Some(report));
                Ok(())
            }
            Ok(CycleOutcome::Skipped) => Ok(()),
            Err(err) => Err(EngineError::from(err).into()),
        }
    }
}

pub struct AlertJob {
    poller: Arc<AlertPoller>,
}

impl AlertJob {
    pub fn new(poller: Arc<AlertPoller>) -> Self {
        Self { poller }
    }
}

#[async_trait::async_trait]
impl PeriodicJob for AlertJob {
    fn name(&self) -> &'static str {
        "order_alerts"
    }

    async fn run(&self) -> anyhow::Result<()> {
        self.poller
            .poll_once()
            .await
            .map(|_| ())
            .map_err(|e| EngineError::from(e).into())
    }
}

/// Scheduled reconciliation over a fixed scope.
pub struct ScanJob {
    scanner: Arc<Scanner>,
    scope: Vec<String>,
}

impl ScanJob {
    pub fn new(scanner: Arc<Scanner>, scope: Vec<String>) -> Self {
        Self { scanner, scope }
    }
}

#[async_trait::async_trait]
impl PeriodicJob for ScanJob {
    fn name(&self) -> &'static str {
        "reconcile_scan"
    }

    async fn run(&self) -> anyhow::Result<()> {
        let req = ScanRequest {
            scope: self.scope.clone(),
            triggered_by: SCHEDULED_TRIGGER.to_string(),
        };
        match self.scanner.scan(&req).await {
            Ok(outcome) => {
                tracing::info!(
                    scan_id = %outcome.log.id,
                    findings = outcome.log.findings_count,
                    critical = outcome.log.critical_count,
                    new = outcome.new_findings,
                    "scheduled scan"
                );
                Ok(())
            }
            Err(err) => Err(EngineError::from(err).into()),
        }
    }
}
