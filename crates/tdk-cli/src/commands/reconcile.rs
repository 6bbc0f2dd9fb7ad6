//! Reconciliation commands: scan, findings, scan log.

use std::sync::Arc;

use anyhow::Result;
use sqlx::PgPool;
use tdk_reconcile::{ReviewRequest, ScanRequest, Scanner};
use tdk_runtime::{PgFindingsStore, PgLedger};
use tdk_schemas::EngineError;

use super::{load_config, parse_finding_status, parse_uuid, print_json};

fn scanner(pool: PgPool, config_paths: &[String]) -> Result<(Scanner, Vec<String>)> {
    let (_, cfg) = load_config(config_paths)?;
    let scanner = Scanner::new(
        Arc::new(PgLedger::new(pool.clone())),
        Arc::new(PgFindingsStore::new(pool)),
        tdk_runtime::scan_config(&cfg),
    );
    Ok((scanner, cfg.reconcile.default_scope))
}

pub async fn scan(
    pool: PgPool,
    config_paths: &[String],
    scope: Vec<String>,
    triggered_by: String,
) -> Result<()> {
    let (scanner, default_scope) = scanner(pool, config_paths)?;
    let scope = if scope.is_empty() { default_scope } else { scope };
    let outcome = scanner
        .scan(&ScanRequest {
            scope,
            triggered_by,
        })
        .await
        .map_err(EngineError::from)?;

    println!("scan_id={}", outcome.log.id);
    println!("scope={}", outcome.log.scope.join(","));
    println!("findings_count={}", outcome.log.findings_count);
    println!("critical_count={}", outcome.log.critical_count);
    println!("new_findings={}", outcome.new_findings);
    println!("reused_findings={}", outcome.reused_findings);
    Ok(())
}

pub async fn list_findings(pool: PgPool, config_paths: &[String], status: Option<String>) -> Result<()> {
    let status = status.as_deref().map(parse_finding_status).transpose()?;
    let (scanner, _) = scanner(pool, config_paths)?;
    let findings = scanner.findings(status).await?;
    for f in &findings {
        println!(
            "{} {} {} {} {} {}",
            f.id,
            f.status.as_str(),
            f.severity.as_str(),
            f.category.as_str(),
            f.finding_type,
            f.detail
        );
    }
    println!("count={}", findings.len());
    Ok(())
}

pub async fn summary(pool: PgPool, config_paths: &[String]) -> Result<()> {
    let (scanner, _) = scanner(pool, config_paths)?;
    print_json(&scanner.summary().await?)
}

pub async fn review(
    pool: PgPool,
    config_paths: &[String],
    id: String,
    status: String,
    note: Option<String>,
) -> Result<()> {
    let id = parse_uuid(&id, "finding")?;
    let req = ReviewRequest {
        status: parse_finding_status(&status)?,
        note,
    };
    let (scanner, _) = scanner(pool, config_paths)?;
    let finding = scanner.review(id, &req).await.map_err(EngineError::from)?;
    println!(
        "reviewed=true finding_id={} status={}",
        finding.id,
        finding.status.as_str()
    );
    Ok(())
}

pub async fn list_scans(pool: PgPool, config_paths: &[String], limit: i64) -> Result<()> {
    let (scanner, _) = scanner(pool, config_paths)?;
    for s in scanner.scans(limit.max(1)).await? {
        println!(
            "{} {} scope={} findings={} critical={} by={}",
            s.id,
            s.started_at.to_rfc3339(),
            s.scope.join(","),
            s.findings_count,
            s.critical_count,
            s.triggered_by
        );
    }
    Ok(())
}
