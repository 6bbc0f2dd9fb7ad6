use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tdk_schemas::{
    EngineError, FindingStatus, NewFinding, ReconcileResponse, ReconciliationFinding,
    ScanLogEntry, Severity, TradeRecord,
};
use thiserror::Error;
use uuid::Uuid;

use crate::review::{validate_transition, ReviewError, ReviewRequest};
use crate::rules::{audit, AuditContext};
use crate::scope::{parse_scope, scope_labels};
use crate::summary::{summarize, FindingSummary};

// ---------------------------------------------------------------------------
// Store seams
// ---------------------------------------------------------------------------

/// Read side of the trade ledger.
#[async_trait::async_trait]
pub trait LedgerSource: Send + Sync {
    /// Every ledger row in execution order.
    async fn load_trades(&self) -> anyhow::Result<Vec<TradeRecord>>;
}

/// Findings and scan log persistence.
#[async_trait::async_trait]
pub trait FindingsStore: Send + Sync {
    /// Insert unless the fingerprint is already on record (any status).
    /// Returns `true` when a new row was written.
    async fn insert_if_new(&self, finding: &ReconciliationFinding) -> anyhow::Result<bool>;

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<ReconciliationFinding>>;

    async fn list(&self, status: Option<FindingStatus>)
        -> anyhow::Result<Vec<ReconciliationFinding>>;

    /// Conditional update: applies only while the row is still open.
    async fn review_open(
        &self,
        id: Uuid,
        status: FindingStatus,
        at: DateTime<Utc>,
        note: Option<&str>,
    ) -> anyhow::Result<bool>;

    async fn append_scan_log(&self, entry: &ScanLogEntry) -> anyhow::Result<()>;

    /// Most recent first.
    async fn list_scans(&self, limit: i64) -> anyhow::Result<Vec<ScanLogEntry>>;
}

// ---------------------------------------------------------------------------
// Requests, results, errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    pub scope: Vec<String>,
    pub triggered_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanOutcome {
    pub log: ScanLogEntry,
    /// Findings first recorded by this scan.
    pub new_findings: usize,
    /// Findings detected again; the existing row was kept as is.
    pub reused_findings: usize,
    pub detected: Vec<NewFinding>,
}

impl ScanOutcome {
    pub fn response(&self) -> ReconcileResponse {
        ReconcileResponse {
            findings_count: self.log.findings_count,
            critical_count: self.log.critical_count,
        }
    }
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("{0}")]
    Validation(String),
    #[error("ledger unavailable: {0:#}")]
    Ledger(anyhow::Error),
    #[error("findings store failed: {0:#}")]
    Store(anyhow::Error),
}

impl From<EngineError> for ScanError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Validation(msg) => ScanError::Validation(msg),
            other => ScanError::Validation(other.to_string()),
        }
    }
}

impl From<ScanError> for EngineError {
    fn from(e: ScanError) -> Self {
        match e {
            ScanError::Validation(msg) => EngineError::Validation(msg),
            ScanError::Ledger(_) => EngineError::TransientNetwork(e.to_string()),
            ScanError::Store(_) => EngineError::Unclassified(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    pub quote_tolerance: Decimal,
    pub stale_after: Duration,
    pub clock_skew: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            quote_tolerance: Decimal::new(1, 3),
            stale_after: Duration::hours(24),
            clock_skew: Duration::minutes(1),
        }
    }
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// Stateless per invocation; safe to run concurrently.
#[derive(Clone)]
pub struct Scanner {
    ledger: Arc<dyn LedgerSource>,
    store: Arc<dyn FindingsStore>,
    config: ScanConfig,
    clock: Clock,
}

impl Scanner {
    pub fn new(ledger: Arc<dyn LedgerSource>, store: Arc<dyn FindingsStore>, config: ScanConfig) -> Self {
        Self {
            ledger,
            store,
            config,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Audit the requested scope and persist the result.
    ///
    /// Each detected finding is persisted independently. The scan log row is
    /// written last and only when everything before it succeeded.
    pub async fn scan(&self, req: &ScanRequest) -> Result<ScanOutcome, ScanError> {
        let domains = parse_scope(&req.scope)?;
        let triggered_by = req.triggered_by.trim();
        if triggered_by.is_empty() {
            return Err(ScanError::Validation("triggered_by must not be empty".to_string()));
        }

        let scan_id = Uuid::new_v4();
        let started_at = self.now();

        let trades = self.ledger.load_trades().await.map_err(ScanError::Ledger)?;
        let ctx = AuditContext {
            now: started_at,
            quote_tolerance: self.config.quote_tolerance,
            stale_after: self.config.stale_after,
            clock_skew: self.config.clock_skew,
        };
        let detected = audit(&domains, &trades, &ctx);

        let mut new_findings = 0usize;
        for f in &detected {
            let row = ReconciliationFinding::from_new(Uuid::new_v4(), scan_id, f, started_at);
            if self.store.insert_if_new(&row).await.map_err(ScanError::Store)? {
                new_findings += 1;
            }
        }

        let critical = detected
            .iter()
            .filter(|f| f.severity == Severity::Critical)
            .count();
        let log = ScanLogEntry {
            id: scan_id,
            started_at,
            finished_at: self.now().max(started_at),
            scope: scope_labels(&domains),
            findings_count: detected.len() as i64,
            critical_count: critical as i64,
            triggered_by: triggered_by.to_string(),
        };
        self.store
            .append_scan_log(&log)
            .await
            .map_err(ScanError::Store)?;

        tracing::info!(
            scan_id = %scan_id,
            scope = ?log.scope,
            trades = trades.len(),
            findings = log.findings_count,
            critical = log.critical_count,
            new = new_findings,
            triggered_by = %log.triggered_by,
            "reconciliation scan complete"
        );

        Ok(ScanOutcome {
            reused_findings: detected.len() - new_findings,
            new_findings,
            log,
            detected,
        })
    }

    /// Move an open finding to acknowledged or resolved.
    pub async fn review(
        &self,
        id: Uuid,
        req: &ReviewRequest,
    ) -> Result<ReconciliationFinding, ReviewError> {
        let current = self
            .store
            .get(id)
            .await
            .map_err(ReviewError::Store)?
            .ok_or(ReviewError::NotFound(id))?;
        validate_transition(current.status, req.status)?;

        let note = req
            .note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());
        let at = self.now();
        let applied = self
            .store
            .review_open(id, req.status, at, note)
            .await
            .map_err(ReviewError::Store)?;
        if !applied {
            return Err(ReviewError::Conflict(id));
        }

        tracing::info!(finding_id = %id, status = req.status.as_str(), "finding reviewed");
        Ok(ReconciliationFinding {
            status: req.status,
            feedback_at: Some(at),
            feedback_note: note.map(str::to_string),
            ..current
        })
    }

    pub async fn findings(
        &self,
        status: Option<FindingStatus>,
    ) -> anyhow::Result<Vec<ReconciliationFinding>> {
        self.store.list(status).await
    }

    /// Recomputed from the full finding set on every call.
    pub async fn summary(&self) -> anyhow::Result<FindingSummary> {
        Ok(summarize(&self.store.list(None).await?))
    }

    pub async fn scans(&self, limit: i64) -> anyhow::Result<Vec<ScanLogEntry>> {
        self.store.list_scans(limit).await
    }
}
