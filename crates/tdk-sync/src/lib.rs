//! tdk-sync
//!
//! Trade sync worker: incremental, duplicate-free ingestion of exchange trade
//! history into the ledger.
//!
//! One cycle:
//! 1. read the resume cursor from committed ledger state
//! 2. fetch trades at or after the cursor
//! 3. insert in bounded batches, duplicates ignored by the store
//!
//! A failed batch records a retry floor (its oldest `executed_at`) in the
//! store before any newer batch commits. The next cursor never passes the
//! floor, so rows behind a failed batch are fetched again even after newer
//! rows landed. The floor is cleared by the first cycle that commits
//! everything it fetched.
//!
//! At most one cycle runs at a time per worker. A trigger that arrives while
//! a cycle is in flight is dropped, not queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tdk_exchange::{ExchangeClient, ExchangeError};
use tdk_schemas::{EngineError, TradeRecord};
use thiserror::Error;

pub const DEFAULT_BATCH_SIZE: usize = 50;

// ---------------------------------------------------------------------------
// Ledger seam
// ---------------------------------------------------------------------------

/// Write side of the trade ledger as seen by the worker.
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    /// Newest committed `executed_at`, `None` for an empty ledger.
    async fn latest_executed_at(&self) -> anyhow::Result<Option<DateTime<Utc>>>;

    /// Insert rows, silently skipping keys that already exist. Returns the
    /// number of rows actually inserted.
    async fn insert_batch(&self, rows: &[TradeRecord]) -> anyhow::Result<u64>;

    /// Oldest `executed_at` of a batch that failed and has not been
    /// committed since. `None` when nothing is pending.
    async fn retry_floor(&self) -> anyhow::Result<Option<DateTime<Utc>>>;

    /// Persist the retry floor; `None` clears it.
    async fn set_retry_floor(&self, floor: Option<DateTime<Utc>>) -> anyhow::Result<()>;
}

/// Lower bound for the next fetch: newest committed trade + 1 ms.
pub fn resume_cursor(latest: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    latest.map(|t| t + Duration::milliseconds(1))
}

/// Resume cursor capped by the retry floor.
pub fn next_cursor(
    latest: Option<DateTime<Utc>>,
    floor: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    match (resume_cursor(latest), floor) {
        (Some(c), Some(f)) => Some(c.min(f)),
        (c, f) => c.or(f),
    }
}

// ---------------------------------------------------------------------------
// Errors & report
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("ledger unavailable: {0:#}")]
    Ledger(anyhow::Error),
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}

impl From<SyncError> for EngineError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::Ledger(err) => EngineError::TransientNetwork(format!("{err:#}")),
            SyncError::Exchange(err) => err.into(),
        }
    }
}

/// Per-cycle counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Lower bound sent to the exchange (epoch ms).
    pub cursor_ms: Option<i64>,
    pub fetched: usize,
    /// Records dropped during normalization.
    pub rejected: usize,
    pub inserted: u64,
    pub duplicates: u64,
    pub batches: usize,
    pub failed_batches: usize,
    /// Rows in failed batches; they are picked up again by a later cycle.
    pub failed_rows: usize,
    /// Retry floor left for the next cycle (epoch ms).
    pub retry_floor_ms: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Another cycle was already running.
    Skipped,
    Completed(SyncReport),
}

// ---------------------------------------------------------------------------
// Re-entrancy guard
// ---------------------------------------------------------------------------

/// Holds the worker's running flag; cleared on drop, including early returns.
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

pub struct TradeSyncWorker {
    exchange: Arc<dyn ExchangeClient>,
    ledger: Arc<dyn LedgerStore>,
    batch_size: usize,
    running: AtomicBool,
}

impl TradeSyncWorker {
    pub fn new(exchange: Arc<dyn ExchangeClient>, ledger: Arc<dyn LedgerStore>) -> Self {
        Self {
            exchange,
            ledger,
            batch_size: DEFAULT_BATCH_SIZE,
            running: AtomicBool::new(false),
        }
    }

    /// Rows per insert statement. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run one sync cycle.
    ///
    /// Exchange or cursor-read failures abort the cycle before anything is
    /// written. Batch write failures are logged and counted; the remaining
    /// batches still commit once the retry floor is stored. If the floor
    /// cannot be stored the cycle stops there with a ledger error.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, SyncError> {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            tracing::debug!("trade sync already running; trigger dropped");
            return Ok(CycleOutcome::Skipped);
        };

        let latest = self
            .ledger
            .latest_executed_at()
            .await
            .map_err(SyncError::Ledger)?;
        let floor = self
            .ledger
            .retry_floor()
            .await
            .map_err(SyncError::Ledger)?;
        let cursor_ms = next_cursor(latest, floor).map(|c| c.timestamp_millis());

        let fetched = self.exchange.fetch_my_trades(cursor_ms).await?;

        let mut report = SyncReport {
            cursor_ms,
            fetched: fetched.trades.len(),
            rejected: fetched.rejected.len(),
            retry_floor_ms: floor.map(|f| f.timestamp_millis()),
            ..SyncReport::default()
        };

        if fetched.trades.is_empty() {
            tracing::info!(cursor_ms = ?cursor_ms, rejected = report.rejected, "trade sync: nothing new");
            return Ok(CycleOutcome::Completed(report));
        }

        let mut trades = fetched.trades;
        trades.sort_by(|a, b| a.executed_at.cmp(&b.executed_at));

        let mut new_floor: Option<DateTime<Utc>> = None;
        for (idx, chunk) in trades.chunks(self.batch_size).enumerate() {
            report.batches += 1;
            match self.ledger.insert_batch(chunk).await {
                Ok(n) => {
                    report.inserted += n;
                    report.duplicates += (chunk.len() as u64).saturating_sub(n);
                }
                Err(err) => {
                    report.failed_batches += 1;
                    report.failed_rows += chunk.len();
                    tracing::warn!(
                        batch = idx,
                        rows = chunk.len(),
                        error = %format!("{err:#}"),
                        "trade sync batch failed; skipped"
                    );
                    if new_floor.is_none() {
                        // Chunks are sorted, so the first row is the oldest.
                        let at = chunk[0].executed_at;
                        self.ledger
                            .set_retry_floor(Some(at))
                            .await
                            .map_err(|e| SyncError::Ledger(e.context("store retry floor")))?;
                        new_floor = Some(at);
                    }
                }
            }
        }

        if new_floor.is_none() && floor.is_some() {
            match self.ledger.set_retry_floor(None).await {
                Ok(()) => tracing::info!("trade sync: retry floor cleared"),
                // A stale floor only causes a wider refetch next cycle.
                Err(err) => tracing::warn!(error = %format!("{err:#}"), "trade sync: retry floor not cleared"),
            }
        }
        report.retry_floor_ms = new_floor.map(|at| at.timestamp_millis());

        tracing::info!(
            cursor_ms = ?report.cursor_ms,
            fetched = report.fetched,
            inserted = report.inserted,
            duplicates = report.duplicates,
            failed_batches = report.failed_batches,
            retry_floor_ms = ?report.retry_floor_ms,
            "trade sync cycle complete"
        );
        Ok(CycleOutcome::Completed(report))
    }
}
