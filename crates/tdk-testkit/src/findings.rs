use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, bail};
use chrono::{DateTime, Utc};
use tdk_reconcile::FindingsStore;
use tdk_schemas::{FindingStatus, ReconciliationFinding, ScanLogEntry};
use uuid::Uuid;

/// In-memory findings + scan log. Mirrors the conditional update of the
/// Postgres store: a review only applies while the row is open.
#[derive(Default)]
pub struct MemoryFindingsStore {
    findings: Mutex<Vec<ReconciliationFinding>>,
    scans: Mutex<Vec<ScanLogEntry>>,
    inserts_fail: AtomicBool,
}

impl MemoryFindingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.inserts_fail.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Vec<ReconciliationFinding> {
        self.findings.lock().map(|f| f.clone()).unwrap_or_default()
    }

    pub fn open_count(&self) -> usize {
        self.snapshot()
            .iter()
            .filter(|f| f.status == FindingStatus::Open)
            .count()
    }

    pub fn scan_count(&self) -> usize {
        self.scans.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Change a row's status behind the scanner's back (simulates another
    /// reviewer winning the race).
    pub fn force_status(&self, id: Uuid, status: FindingStatus) {
        if let Ok(mut rows) = self.findings.lock() {
            if let Some(f) = rows.iter_mut().find(|f| f.id == id) {
                f.status = status;
            }
        }
    }
}

#[async_trait::async_trait]
impl FindingsStore for MemoryFindingsStore {
    async fn insert_if_new(&self, finding: &ReconciliationFinding) -> anyhow::Result<bool> {
        if self.inserts_fail.load(Ordering::SeqCst) {
            bail!("injected findings insert failure");
        }
        let mut rows = self.findings.lock().map_err(|_| anyhow!("findings lock poisoned"))?;
        if rows.iter().any(|f| f.fingerprint == finding.fingerprint) {
            return Ok(false);
        }
        rows.push(finding.clone());
        Ok(true)
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<ReconciliationFinding>> {
        let rows = self.findings.lock().map_err(|_| anyhow!("findings lock poisoned"))?;
        Ok(rows.iter().find(|f| f.id == id).cloned())
    }

    async fn list(
        &self,
        status: Option<FindingStatus>,
    ) -> anyhow::Result<Vec<ReconciliationFinding>> {
        let rows = self.findings.lock().map_err(|_| anyhow!("findings lock poisoned"))?;
        let mut out: Vec<_> = rows
            .iter()
            .filter(|f| status.map_or(true, |s| f.status == s))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn review_open(
        &self,
        id: Uuid,
        status: FindingStatus,
        at: DateTime<Utc>,
        note: Option<&str>,
    ) -> anyhow::Result<bool> {
        let mut rows = self.findings.lock().map_err(|_| anyhow!("findings lock poisoned"))?;
        match rows
            .iter_mut()
            .find(|f| f.id == id && f.status == FindingStatus::Open)
        {
            Some(f) => {
                f.status = status;
                f.feedback_at = Some(at);
                f.feedback_note = note.map(str::to_string);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn append_scan_log(&self, entry: &ScanLogEntry) -> anyhow::Result<()> {
        self.scans
            .lock()
            .map_err(|_| anyhow!("scan log lock poisoned"))?
            .push(entry.clone());
        Ok(())
    }

    async fn list_scans(&self, limit: i64) -> anyhow::Result<Vec<ScanLogEntry>> {
        let scans = self.scans.lock().map_err(|_| anyhow!("scan log lock poisoned"))?;
        let limit = usize::try_from(limit.max(0)).unwrap_or(0);
        Ok(scans.iter().rev().take(limit).cloned().collect())
    }
}
