use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tdk_schemas::ScanLogEntry;

pub async fn insert_scan_log(pool: &PgPool, e: &ScanLogEntry) -> Result<()> {
    sqlx::query(
        r#"
        insert into scan_log (
          id, started_at, finished_at, scope, findings_count, critical_count, triggered_by
        ) values ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(e.id)
    .bind(e.started_at)
    .bind(e.finished_at)
    .bind(&e.scope)
    .bind(e.findings_count)
    .bind(e.critical_count)
    .bind(&e.triggered_by)
    .execute(pool)
    .await
    .context("insert_scan_log failed")?;
    Ok(())
}

/// Most recent scans first.
pub async fn list_scan_log(pool: &PgPool, limit: i64) -> Result<Vec<ScanLogEntry>> {
    let rows = sqlx::query(
        r#"
        select id, started_at, finished_at, scope, findings_count, critical_count, triggered_by
        from scan_log
        order by started_at desc
        limit $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("list_scan_log query failed")?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(ScanLogEntry {
            id: row.try_get("id")?,
            started_at: row.try_get("started_at")?,
            finished_at: row.try_get("finished_at")?,
            scope: row.try_get("scope")?,
            findings_count: row.try_get("findings_count")?,
            critical_count: row.try_get("critical_count")?,
            triggered_by: row.try_get("triggered_by")?,
        });
    }
    Ok(out)
}
