//! The sync retry floor lives in Postgres `settings`, so a restarted worker
//! still refetches rows behind a failed batch.
//!
//! DB-backed test, skipped if TDK_DATABASE_URL is not set.

use chrono::DateTime;
use tdk_runtime::{PgLedger, SYNC_RETRY_FLOOR_KEY};
use tdk_sync::LedgerStore;

#[tokio::test]
async fn retry_floor_round_trips_and_clears() -> anyhow::Result<()> {
    let url = match std::env::var(tdk_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: TDK_DATABASE_URL not set");
            return Ok(());
        }
    };
    let pool = tdk_db::connect(&url).await?;
    tdk_db::migrate(&pool).await?;
    let ledger = PgLedger::new(pool.clone());

    let at = DateTime::from_timestamp_millis(1_700_000_004_000).expect("valid ts");
    ledger.set_retry_floor(Some(at)).await?;
    assert_eq!(ledger.retry_floor().await?, Some(at));

    let raw = tdk_db::get_setting(&pool, SYNC_RETRY_FLOOR_KEY).await?;
    assert_eq!(raw.and_then(|v| v.as_i64()), Some(1_700_000_004_000));

    ledger.set_retry_floor(None).await?;
    assert_eq!(ledger.retry_floor().await?, None);
    Ok(())
}
