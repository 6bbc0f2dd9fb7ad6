//! Scenario: Findings Review Is Forward Only
//!
//! # Invariants under test
//! - open -> acknowledged and open -> resolved are the only legal moves.
//! - Every other transition is rejected as a validation error and the row is
//!   left untouched.
//! - Losing the conditional update to a concurrent reviewer surfaces as a
//!   persistence conflict.

use std::sync::Arc;

use rust_decimal_macros::dec;
use tdk_reconcile::{FindingsStore, ReviewError, ReviewRequest, ScanConfig, ScanRequest, Scanner};
use tdk_schemas::{EngineError, ErrorKind, FindingStatus, ReconciliationFinding, Side};
use tdk_testkit::fixtures::{at_ms, trade, T0_MS};
use tdk_testkit::{MemoryFindingsStore, MemoryLedger};
use uuid::Uuid;

async fn one_open_finding() -> (Scanner, Arc<MemoryFindingsStore>, ReconciliationFinding) {
    let ledger = Arc::new(MemoryLedger::with_rows(vec![trade(
        "q0",
        Side::Buy,
        dec!(0),
        dec!(5),
        T0_MS,
    )]));
    let store = Arc::new(MemoryFindingsStore::new());
    let sc = Scanner::new(ledger, store.clone(), ScanConfig::default())
        .with_clock(|| at_ms(T0_MS + 1_000));
    sc.scan(&ScanRequest {
        scope: vec!["trades".to_string()],
        triggered_by: "test".to_string(),
    })
    .await
    .unwrap();
    let f = store.snapshot().remove(0);
    assert_eq!(f.status, FindingStatus::Open);
    (sc, store, f)
}

fn to(status: FindingStatus) -> ReviewRequest {
    ReviewRequest { status, note: None }
}

#[tokio::test]
async fn acknowledge_records_time_and_note() {
    let (sc, store, f) = one_open_finding().await;

    let updated = sc
        .review(
            f.id,
            &ReviewRequest {
                status: FindingStatus::Acknowledged,
                note: Some("  looking into it  ".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.status, FindingStatus::Acknowledged);
    assert_eq!(updated.feedback_at, Some(at_ms(T0_MS + 1_000)));
    assert_eq!(updated.feedback_note.as_deref(), Some("looking into it"));

    let stored = store.snapshot().remove(0);
    assert_eq!(stored, updated);
}

#[tokio::test]
async fn non_open_findings_cannot_move() {
    let (sc, store, f) = one_open_finding().await;
    sc.review(f.id, &to(FindingStatus::Acknowledged)).await.unwrap();

    for target in [
        FindingStatus::Open,
        FindingStatus::Acknowledged,
        FindingStatus::Resolved,
    ] {
        let err = sc.review(f.id, &to(target)).await.unwrap_err();
        assert!(matches!(err, ReviewError::IllegalTransition { .. }), "{target:?}");
        assert_eq!(EngineError::from(err).kind(), ErrorKind::Validation);
    }
    assert_eq!(store.snapshot()[0].status, FindingStatus::Acknowledged);
}

#[tokio::test]
async fn open_to_open_is_rejected() {
    let (sc, _store, f) = one_open_finding().await;
    let err = sc.review(f.id, &to(FindingStatus::Open)).await.unwrap_err();
    assert!(matches!(err, ReviewError::IllegalTransition { .. }));
}

#[tokio::test]
async fn unknown_finding_is_not_found() {
    let (sc, _store, _f) = one_open_finding().await;
    let err = sc
        .review(Uuid::new_v4(), &to(FindingStatus::Resolved))
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::NotFound(_)));
}

/// Store whose row flips to resolved between the scanner's read and its
/// conditional update.
struct RacingStore {
    inner: MemoryFindingsStore,
}

#[async_trait::async_trait]
impl FindingsStore for RacingStore {
    async fn insert_if_new(&self, f: &ReconciliationFinding) -> anyhow::Result<bool> {
        self.inner.insert_if_new(f).await
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<ReconciliationFinding>> {
        let row = self.inner.get(id).await?;
        self.inner.force_status(id, FindingStatus::Resolved);
        Ok(row)
    }

    async fn list(
        &self,
        status: Option<FindingStatus>,
    ) -> anyhow::Result<Vec<ReconciliationFinding>> {
        self.inner.list(status).await
    }

    async fn review_open(
        &self,
        id: Uuid,
        status: FindingStatus,
        at: chrono::DateTime<chrono::Utc>,
        note: Option<&str>,
    ) -> anyhow::Result<bool> {
        self.inner.review_open(id, status, at, note).await
    }

    async fn append_scan_log(&self, e: &tdk_schemas::ScanLogEntry) -> anyhow::Result<()> {
        self.inner.append_scan_log(e).await
    }

    async fn list_scans(&self, limit: i64) -> anyhow::Result<Vec<tdk_schemas::ScanLogEntry>> {
        self.inner.list_scans(limit).await
    }
}

#[tokio::test]
async fn lost_race_is_a_persistence_conflict() {
    let ledger = Arc::new(MemoryLedger::with_rows(vec![trade(
        "q1",
        Side::Buy,
        dec!(-1),
        dec!(5),
        T0_MS,
    )]));
    let store = Arc::new(RacingStore {
        inner: MemoryFindingsStore::new(),
    });
    let sc = Scanner::new(ledger, store.clone(), ScanConfig::default())
        .with_clock(|| at_ms(T0_MS + 1_000));
    sc.scan(&ScanRequest {
        scope: vec!["trades".to_string()],
        triggered_by: "test".to_string(),
    })
    .await
    .unwrap();
    let id = store.inner.snapshot()[0].id;

    let err = sc.review(id, &to(FindingStatus::Acknowledged)).await.unwrap_err();
    assert!(matches!(err, ReviewError::Conflict(_)));
    assert_eq!(EngineError::from(err).kind(), ErrorKind::PersistenceConflict);
    // The concurrent reviewer's decision stands.
    assert_eq!(store.inner.snapshot()[0].status, FindingStatus::Resolved);
}
