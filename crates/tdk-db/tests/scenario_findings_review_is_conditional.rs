//! Findings dedupe on fingerprint and review only ever moves an open row.
//!
//! DB-backed test, skipped if TDK_DATABASE_URL is not set.

use chrono::Utc;
use tdk_schemas::{AuditDomain, FindingStatus, NewFinding, ReconciliationFinding, Severity};
use uuid::Uuid;

fn finding(fingerprint: &str) -> ReconciliationFinding {
    let nf = NewFinding {
        category: AuditDomain::Trades,
        severity: Severity::Critical,
        finding_type: "NON_POSITIVE_QUANTITY".to_string(),
        asset: "BTCUSDT".to_string(),
        detail: "quantity=0".to_string(),
        fingerprint: fingerprint.to_string(),
    };
    ReconciliationFinding::from_new(Uuid::new_v4(), Uuid::new_v4(), &nf, Utc::now())
}

#[tokio::test]
async fn fingerprint_dedupe_and_forward_only_review() -> anyhow::Result<()> {
    let url = match std::env::var(tdk_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: TDK_DATABASE_URL not set");
            return Ok(());
        }
    };
    let pool = tdk_db::connect(&url).await?;
    tdk_db::migrate(&pool).await?;

    let fp = format!("trades:NON_POSITIVE_QUANTITY:BTCUSDT:{}", Uuid::new_v4());
    let first = finding(&fp);
    assert!(tdk_db::insert_finding_if_new(&pool, &first).await?);
    // Same fingerprint from a later scan is not inserted again.
    assert!(!tdk_db::insert_finding_if_new(&pool, &finding(&fp)).await?);

    let stored = tdk_db::fetch_finding_by_fingerprint(&pool, &fp)
        .await?
        .expect("finding exists");
    assert_eq!(stored.id, first.id);
    assert_eq!(stored.status, FindingStatus::Open);

    let now = Utc::now();
    assert!(
        tdk_db::review_open_finding(&pool, first.id, FindingStatus::Resolved, now, Some("fixed"))
            .await?
    );
    // Second review loses: the row is no longer open.
    assert!(
        !tdk_db::review_open_finding(&pool, first.id, FindingStatus::Acknowledged, now, None)
            .await?
    );

    let after = tdk_db::fetch_finding(&pool, first.id).await?.expect("finding exists");
    assert_eq!(after.status, FindingStatus::Resolved);
    assert_eq!(after.feedback_note.as_deref(), Some("fixed"));
    assert!(after.feedback_at.is_some());

    let resolved = tdk_db::list_findings(&pool, Some(FindingStatus::Resolved)).await?;
    assert!(resolved.iter().any(|f| f.id == first.id));
    Ok(())
}

#[tokio::test]
async fn settings_last_write_wins() -> anyhow::Result<()> {
    let url = match std::env::var(tdk_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: TDK_DATABASE_URL not set");
            return Ok(());
        }
    };
    let pool = tdk_db::connect(&url).await?;
    tdk_db::migrate(&pool).await?;

    let key = format!("test.{}", Uuid::new_v4());
    assert_eq!(tdk_db::get_setting(&pool, &key).await?, None);
    tdk_db::set_setting(&pool, &key, &serde_json::json!(true)).await?;
    tdk_db::set_setting(&pool, &key, &serde_json::json!(false)).await?;
    assert_eq!(tdk_db::get_setting(&pool, &key).await?, Some(serde_json::json!(false)));
    Ok(())
}
