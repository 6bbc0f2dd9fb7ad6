use std::fs;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tdk_exchange::normalize::{normalize_orders, normalize_trades};
use tdk_exchange::{Envelope, Rejected};
use tdk_schemas::{Order, Side, TradeRecord};

pub const T0_MS: i64 = 1_700_000_000_000;

pub fn at_ms(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// A well-formed BTCUSDT trade with quote = qty * price.
pub fn trade(id: &str, side: Side, qty: Decimal, price: Decimal, executed_ms: i64) -> TradeRecord {
    TradeRecord {
        external_trade_id: id.to_string(),
        symbol: "BTCUSDT".to_string(),
        side,
        quantity: qty,
        price,
        quote_quantity: qty * price,
        commission: Decimal::ZERO,
        commission_asset: "USDT".to_string(),
        executed_at: at_ms(executed_ms),
        source: "scripted".to_string(),
    }
}

/// `n` unit buys one second apart starting at `T0_MS`, ids `prefix-0..n`.
pub fn trade_series(prefix: &str, n: usize) -> Vec<TradeRecord> {
    (0..n)
        .map(|i| {
            trade(
                &format!("{prefix}-{i}"),
                Side::Buy,
                Decimal::ONE,
                Decimal::new(100, 0),
                T0_MS + (i as i64) * 1_000,
            )
        })
        .collect()
}

pub fn order(id: &str, side: Side, raw_status: &str) -> Order {
    Order {
        id: id.to_string(),
        order_number: format!("N{id}"),
        side,
        raw_status: raw_status.to_string(),
        amount: Some(Decimal::new(250, 0)),
        asset: Some("USDT".to_string()),
        fiat: Some("EUR".to_string()),
        counterparty: Some("counterparty".to_string()),
        payment_deadline: None,
        expires_at: None,
    }
}

/// Read a `getMyTrades` response body from disk and normalize it.
pub fn load_trades_json(path: &str, source: &str) -> Result<(Vec<TradeRecord>, Vec<Rejected>)> {
    let s = fs::read_to_string(path).with_context(|| format!("read trades fixture: {path}"))?;
    let env: Envelope = serde_json::from_str(&s).context("parse exchange envelope")?;
    let data = env.into_data()?;
    Ok(normalize_trades(&data, source))
}

/// Read a `getOrders` response body from disk and normalize it.
pub fn load_orders_json(path: &str) -> Result<(Vec<Order>, Vec<Rejected>)> {
    let s = fs::read_to_string(path).with_context(|| format!("read orders fixture: {path}"))?;
    let env: Envelope = serde_json::from_str(&s).context("parse exchange envelope")?;
    let data = env.into_data()?;
    Ok(normalize_orders(&data))
}
