//! Postgres-backed implementations of the engine's storage seams.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use tdk_alerts::{KeyValueStore, KvChange};
use tdk_reconcile::{FindingsStore, LedgerSource};
use tdk_schemas::{FindingStatus, ReconciliationFinding, ScanLogEntry, TradeRecord};
use tdk_sync::LedgerStore;
use tokio::sync::broadcast;
use uuid::Uuid;

/// `settings` key holding the sync retry floor (epoch ms, or null).
pub const SYNC_RETRY_FLOOR_KEY: &str = "sync.retry_floor_ms";

/// The `trades` table, seen by both the sync worker and the scanner.
#[derive(Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl LedgerStore for PgLedger {
    async fn latest_executed_at(&self) -> anyhow::Result<Option<DateTime<Utc>>> {
        tdk_db::max_executed_at(&self.pool).await
    }

    async fn insert_batch(&self, rows: &[TradeRecord]) -> anyhow::Result<u64> {
        tdk_db::insert_trades_ignore_conflicts(&self.pool, rows).await
    }

    async fn retry_floor(&self) -> anyhow::Result<Option<DateTime<Utc>>> {
        let v = tdk_db::get_setting(&self.pool, SYNC_RETRY_FLOOR_KEY).await?;
        Ok(v.and_then(|v| v.as_i64()).and_then(DateTime::from_timestamp_millis))
    }

    async fn set_retry_floor(&self, floor: Option<DateTime<Utc>>) -> anyhow::Result<()> {
        let v = floor.map_or(Value::Null, |f| Value::from(f.timestamp_millis()));
        tdk_db::set_setting(&self.pool, SYNC_RETRY_FLOOR_KEY, &v).await
    }
}

#[async_trait::async_trait]
impl LedgerSource for PgLedger {
    async fn load_trades(&self) -> anyhow::Result<Vec<TradeRecord>> {
        tdk_db::load_trades(&self.pool).await
    }
}

#[derive(Clone)]
pub struct PgFindingsStore {
    pool: PgPool,
}

impl PgFindingsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl FindingsStore for PgFindingsStore {
    async fn insert_if_new(&self, finding: &ReconciliationFinding) -> anyhow::Result<bool> {
        tdk_db::insert_finding_if_new(&self.pool, finding).await
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<ReconciliationFinding>> {
        tdk_db::fetch_finding(&self.pool, id).await
    }

    async fn list(
        &self,
        status: Option<FindingStatus>,
    ) -> anyhow::Result<Vec<ReconciliationFinding>> {
        tdk_db::list_findings(&self.pool, status).await
    }

    async fn review_open(
        &self,
        id: Uuid,
        status: FindingStatus,
        at: DateTime<Utc>,
        note: Option<&str>,
    ) -> anyhow::Result<bool> {
        tdk_db::review_open_finding(&self.pool, id, status, at, note).await
    }

    async fn append_scan_log(&self, entry: &ScanLogEntry) -> anyhow::Result<()> {
        tdk_db::insert_scan_log(&self.pool, entry).await
    }

    async fn list_scans(&self, limit: i64) -> anyhow::Result<Vec<ScanLogEntry>> {
        tdk_db::list_scan_log(&self.pool, limit).await
    }
}

/// `settings` table as a key/value store. Change notifications cover writes
/// made through this handle only.
pub struct PgSettingsKv {
    pool: PgPool,
    changes: broadcast::Sender<KvChange>,
}

impl PgSettingsKv {
    pub fn new(pool: PgPool) -> Self {
        let (changes, _rx) = broadcast::channel(64);
        Self { pool, changes }
    }
}

#[async_trait::async_trait]
impl KeyValueStore for PgSettingsKv {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
        tdk_db::get_setting(&self.pool, key).await
    }

    async fn set(&self, key: &str, value: Value) -> anyhow::Result<()> {
        tdk_db::set_setting(&self.pool, key, &value).await?;
        let _ = self.changes.send(KvChange {
            key: key.to_string(),
            value,
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<KvChange> {
        self.changes.subscribe()
    }
}
