use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, bail};
use chrono::{DateTime, Utc};
use tdk_reconcile::LedgerSource;
use tdk_schemas::TradeRecord;
use tdk_sync::LedgerStore;

/// In-memory `trades` table with the same (external_trade_id, symbol)
/// uniqueness as the Postgres schema. Batch failures can be injected by
/// insert-call index (0-based, counted across the ledger's lifetime).
#[derive(Default)]
pub struct MemoryLedger {
    rows: Mutex<Vec<TradeRecord>>,
    retry_floor: Mutex<Option<DateTime<Utc>>>,
    failing_calls: Mutex<HashSet<usize>>,
    insert_calls: AtomicUsize,
    reads_fail: AtomicBool,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<TradeRecord>) -> Self {
        let ledger = Self::new();
        if let Ok(mut guard) = ledger.rows.lock() {
            *guard = rows;
        }
        ledger
    }

    pub fn fail_insert_call(&self, call_index: usize) {
        if let Ok(mut set) = self.failing_calls.lock() {
            set.insert(call_index);
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut set) = self.failing_calls.lock() {
            set.clear();
        }
        self.reads_fail.store(false, Ordering::SeqCst);
    }

    /// Make `latest_executed_at` and `load_trades` error.
    pub fn fail_reads(&self) {
        self.reads_fail.store(true, Ordering::SeqCst);
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.rows.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn rows(&self) -> Vec<TradeRecord> {
        self.rows.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn check_reads(&self) -> anyhow::Result<()> {
        if self.reads_fail.load(Ordering::SeqCst) {
            bail!("injected ledger read failure");
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl LedgerStore for MemoryLedger {
    async fn latest_executed_at(&self) -> anyhow::Result<Option<DateTime<Utc>>> {
        self.check_reads()?;
        let rows = self.rows.lock().map_err(|_| anyhow!("ledger lock poisoned"))?;
        Ok(rows.iter().map(|r| r.executed_at).max())
    }

    async fn insert_batch(&self, batch: &[TradeRecord]) -> anyhow::Result<u64> {
        let call = self.insert_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failing_calls
            .lock()
            .map_err(|_| anyhow!("ledger lock poisoned"))?
            .contains(&call);
        if failing {
            bail!("injected failure on insert call {call}");
        }

        let mut rows = self.rows.lock().map_err(|_| anyhow!("ledger lock poisoned"))?;
        let mut keys: HashSet<(String, String)> = rows
            .iter()
            .map(|r| (r.external_trade_id.clone(), r.symbol.clone()))
            .collect();
        let mut inserted = 0u64;
        for t in batch {
            if keys.insert((t.external_trade_id.clone(), t.symbol.clone())) {
                rows.push(t.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn retry_floor(&self) -> anyhow::Result<Option<DateTime<Utc>>> {
        self.check_reads()?;
        Ok(*self.retry_floor.lock().map_err(|_| anyhow!("ledger lock poisoned"))?)
    }

    async fn set_retry_floor(&self, floor: Option<DateTime<Utc>>) -> anyhow::Result<()> {
        *self.retry_floor.lock().map_err(|_| anyhow!("ledger lock poisoned"))? = floor;
        Ok(())
    }
}

#[async_trait::async_trait]
impl LedgerSource for MemoryLedger {
    async fn load_trades(&self) -> anyhow::Result<Vec<TradeRecord>> {
        self.check_reads()?;
        let mut out = self.rows.lock().map_err(|_| anyhow!("ledger lock poisoned"))?.clone();
        out.sort_by(|a, b| a.executed_at.cmp(&b.executed_at));
        Ok(out)
    }
}
