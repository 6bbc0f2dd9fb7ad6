use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tdk_schemas::{Side, TradeRecord};

/// Insert a batch in one statement. Rows whose `(external_trade_id, symbol)`
/// already exists are skipped by the database; returns the number of rows
/// actually inserted.
pub async fn insert_trades_ignore_conflicts(pool: &PgPool, rows: &[TradeRecord]) -> Result<u64> {
    if rows.is_empty() {
        return Ok(0);
    }

    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
        "insert into trades (external_trade_id, symbol, side, quantity, price, \
         quote_quantity, commission, commission_asset, executed_at, source) ",
    );
    qb.push_values(rows, |mut b, t| {
        b.push_bind(&t.external_trade_id)
            .push_bind(&t.symbol)
            .push_bind(t.side.as_str())
            .push_bind(t.quantity)
            .push_bind(t.price)
            .push_bind(t.quote_quantity)
            .push_bind(t.commission)
            .push_bind(&t.commission_asset)
            .push_bind(t.executed_at)
            .push_bind(&t.source);
    });
    qb.push(" on conflict (external_trade_id, symbol) do nothing");

    let res = qb
        .build()
        .execute(pool)
        .await
        .context("insert trades batch failed")?;
    Ok(res.rows_affected())
}

/// Newest committed execution time, `None` for an empty ledger.
pub async fn max_executed_at(pool: &PgPool) -> Result<Option<DateTime<Utc>>> {
    let max: Option<DateTime<Utc>> = sqlx::query_scalar("select max(executed_at) from trades")
        .fetch_one(pool)
        .await
        .context("max_executed_at query failed")?;
    Ok(max)
}

pub async fn count_trades(pool: &PgPool) -> Result<i64> {
    let (n,): (i64,) = sqlx::query_as::<_, (i64,)>("select count(*)::bigint from trades")
        .fetch_one(pool)
        .await
        .context("count_trades failed")?;
    Ok(n)
}

/// Full ledger in execution order (ties broken by insertion order).
pub async fn load_trades(pool: &PgPool) -> Result<Vec<TradeRecord>> {
    let rows = sqlx::query(
        r#"
        select external_trade_id, symbol, side, quantity, price, quote_quantity,
               commission, commission_asset, executed_at, source
        from trades
        order by executed_at asc, id asc
        "#,
    )
    .fetch_all(pool)
    .await
    .context("load_trades query failed")?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let side: String = row.try_get("side")?;
        out.push(TradeRecord {
            external_trade_id: row.try_get("external_trade_id")?,
            symbol: row.try_get("symbol")?,
            side: Side::parse(&side).with_context(|| format!("trades.side corrupt: {side}"))?,
            quantity: row.try_get("quantity")?,
            price: row.try_get("price")?,
            quote_quantity: row.try_get("quote_quantity")?,
            commission: row.try_get("commission")?,
            commission_asset: row.try_get("commission_asset")?,
            executed_at: row.try_get("executed_at")?,
            source: row.try_get("source")?,
        });
    }
    Ok(out)
}
