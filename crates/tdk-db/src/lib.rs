use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};

mod findings;
mod scan_log;
mod settings;
mod trades;

pub use findings::{
    fetch_finding, fetch_finding_by_fingerprint, insert_finding_if_new, list_findings,
    review_open_finding,
};
pub use scan_log::{insert_scan_log, list_scan_log};
pub use settings::{get_setting, set_setting};
pub use trades::{count_trades, insert_trades_ignore_conflicts, load_trades, max_executed_at};

pub const ENV_DB_URL: &str = "TDK_DATABASE_URL";

/// Connect to Postgres using TDK_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url =
        std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url).await
}

pub async fn connect(url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to Postgres")
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_trades_table: bool,
    pub has_findings_table: bool,
    /// Ledger size; `None` before migrations ran.
    pub trade_count: Option<i64>,
}

/// Connectivity + schema presence.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let has_trades_table = table_exists(pool, "trades").await?;
    let trade_count = if has_trades_table {
        Some(count_trades(pool).await?)
    } else {
        None
    };

    Ok(DbStatus {
        ok: one == 1,
        has_trades_table,
        has_findings_table: table_exists(pool, "reconciliation_findings").await?,
        trade_count,
    })
}

async fn table_exists(pool: &PgPool, table: &str) -> Result<bool> {
    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema = 'public' and table_name = $1
        )
        "#,
    )
    .bind(table)
    .fetch_one(pool)
    .await
    .with_context(|| format!("status table-exists query failed for {table}"))?;
    Ok(exists)
}
