use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tdk_schemas::{AuditDomain, FindingStatus, ReconciliationFinding, Severity};
use uuid::Uuid;

const FINDING_COLUMNS: &str = "id, scan_id, category, severity, finding_type, asset, detail, \
     fingerprint, status, created_at, feedback_at, feedback_note";

/// Insert unless a finding with the same fingerprint exists (in any status).
/// Returns `true` when a new row was written.
pub async fn insert_finding_if_new(pool: &PgPool, f: &ReconciliationFinding) -> Result<bool> {
    let res = sqlx::query(
        r#"
        insert into reconciliation_findings (
          id, scan_id, category, severity, finding_type, asset, detail,
          fingerprint, status, created_at
        ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        on conflict (fingerprint) do nothing
        "#,
    )
    .bind(f.id)
    .bind(f.scan_id)
    .bind(f.category.as_str())
    .bind(f.severity.as_str())
    .bind(&f.finding_type)
    .bind(&f.asset)
    .bind(&f.detail)
    .bind(&f.fingerprint)
    .bind(f.status.as_str())
    .bind(f.created_at)
    .execute(pool)
    .await
    .context("insert_finding_if_new failed")?;

    Ok(res.rows_affected() == 1)
}

pub async fn fetch_finding(pool: &PgPool, id: Uuid) -> Result<Option<ReconciliationFinding>> {
    let sql = format!("select {FINDING_COLUMNS} from reconciliation_findings where id = $1");
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("fetch_finding query failed")?;
    row.as_ref().map(decode_finding).transpose()
}

pub async fn fetch_finding_by_fingerprint(
    pool: &PgPool,
    fingerprint: &str,
) -> Result<Option<ReconciliationFinding>> {
    let sql =
        format!("select {FINDING_COLUMNS} from reconciliation_findings where fingerprint = $1");
    let row = sqlx::query(&sql)
        .bind(fingerprint)
        .fetch_optional(pool)
        .await
        .context("fetch_finding_by_fingerprint query failed")?;
    row.as_ref().map(decode_finding).transpose()
}

/// All findings, optionally filtered by status, newest first.
pub async fn list_findings(
    pool: &PgPool,
    status: Option<FindingStatus>,
) -> Result<Vec<ReconciliationFinding>> {
    let sql = format!(
        "select {FINDING_COLUMNS} from reconciliation_findings \
         where ($1::text is null or status = $1) \
         order by created_at desc, id asc"
    );
    let rows = sqlx::query(&sql)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(pool)
        .await
        .context("list_findings query failed")?;
    rows.iter().map(decode_finding).collect()
}

/// Move an open finding to `status`. The update only applies while the row
/// is still open; returns `false` when it no longer is (or does not exist).
pub async fn review_open_finding(
    pool: &PgPool,
    id: Uuid,
    status: FindingStatus,
    feedback_at: DateTime<Utc>,
    note: Option<&str>,
) -> Result<bool> {
    let res = sqlx::query(
        r#"
        update reconciliation_findings
        set status = $2,
            feedback_at = $3,
            feedback_note = $4
        where id = $1
          and status = 'open'
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .bind(feedback_at)
    .bind(note)
    .execute(pool)
    .await
    .context("review_open_finding update failed")?;

    Ok(res.rows_affected() == 1)
}

fn decode_finding(row: &PgRow) -> Result<ReconciliationFinding> {
    let category: String = row.try_get("category")?;
    let severity: String = row.try_get("severity")?;
    let status: String = row.try_get("status")?;
    Ok(ReconciliationFinding {
        id: row.try_get("id")?,
        scan_id: row.try_get("scan_id")?,
        category: AuditDomain::parse(&category)?,
        severity: Severity::parse(&severity)?,
        finding_type: row.try_get("finding_type")?,
        asset: row.try_get("asset")?,
        detail: row.try_get("detail")?,
        fingerprint: row.try_get("fingerprint")?,
        status: FindingStatus::parse(&status)?,
        created_at: row.try_get("created_at")?,
        feedback_at: row.try_get("feedback_at")?,
        feedback_note: row.try_get("feedback_note")?,
    })
}
