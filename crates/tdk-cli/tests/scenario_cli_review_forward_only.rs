//! `tdk scan` then `tdk findings review` against a real database.
//!
//! DB-backed test, skipped if TDK_DATABASE_URL is not set.

use assert_cmd::Command;
use predicates::prelude::*;

#[tokio::test]
async fn cli_review_moves_a_finding_forward_once() -> anyhow::Result<()> {
    let url = match std::env::var(tdk_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: TDK_DATABASE_URL not set");
            return Ok(());
        }
    };
    let pool = match tdk_db::connect(&url).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("SKIP: cannot connect to DB: {e}");
            return Ok(());
        }
    };
    tdk_db::migrate(&pool).await?;

    // An empty or stale ledger always yields a sync-domain finding.
    Command::cargo_bin("tdk")?
        .env("TDK_DATABASE_URL", &url)
        .args(["scan", "--scope", "sync", "--by", "cli-test"])
        .assert()
        .success()
        .stdout(predicate::str::contains("scan_id="));

    let open = tdk_db::list_findings(&pool, Some(tdk_schemas::FindingStatus::Open)).await?;
    let Some(target) = open.first() else {
        eprintln!("SKIP: no open finding available to review");
        return Ok(());
    };
    let id = target.id.to_string();

    Command::cargo_bin("tdk")?
        .env("TDK_DATABASE_URL", &url)
        .args(["findings", "review", "--id", &id, "--status", "acknowledged", "--note", "cli"])
        .assert()
        .success()
        .stdout(predicate::str::contains("status=acknowledged"));

    Command::cargo_bin("tdk")?
        .env("TDK_DATABASE_URL", &url)
        .args(["findings", "review", "--id", &id, "--status", "resolved"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("illegal review transition"));

    Ok(())
}
