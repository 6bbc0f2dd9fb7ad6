use anyhow::{Context, Result};
use serde_json::Value;
use sqlx::PgPool;

pub async fn get_setting(pool: &PgPool, key: &str) -> Result<Option<Value>> {
    let v: Option<Value> = sqlx::query_scalar("select value from settings where key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("get_setting failed for {key}"))?;
    Ok(v)
}

/// Last write wins.
pub async fn set_setting(pool: &PgPool, key: &str, value: &Value) -> Result<()> {
    sqlx::query(
        r#"
        insert into settings (key, value, updated_at)
        values ($1, $2, now())
        on conflict (key) do update set
          value = excluded.value,
          updated_at = excluded.updated_at
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await
    .with_context(|| format!("set_setting failed for {key}"))?;
    Ok(())
}
