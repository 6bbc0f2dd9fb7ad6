//! Lenient decoding of exchange records into ledger / order types.
//!
//! The exchange is inconsistent about field types: booleans arrive as
//! `true`, `"true"`, `1` or `"BUY"`; numbers arrive as JSON numbers or
//! strings. Numeric amounts that fail to parse become zero. A record is
//! rejected only when it cannot be keyed (id, symbol) or ordered (time).

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tdk_schemas::{Order, Side, TradeRecord};

// ---------------------------------------------------------------------------
// Raw wire records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawTrade {
    #[serde(alias = "tradeId")]
    pub id: Value,
    pub symbol: Value,
    #[serde(rename = "isBuyer")]
    pub is_buyer: Value,
    pub side: Value,
    #[serde(alias = "quantity")]
    pub qty: Value,
    pub price: Value,
    #[serde(rename = "quoteQty")]
    pub quote_qty: Value,
    pub commission: Value,
    #[serde(rename = "commissionAsset")]
    pub commission_asset: Value,
    pub time: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawOrder {
    #[serde(alias = "orderId")]
    pub id: Value,
    #[serde(rename = "orderNumber")]
    pub order_number: Value,
    #[serde(rename = "tradeType", alias = "side")]
    pub trade_type: Value,
    #[serde(rename = "orderStatus", alias = "status")]
    pub order_status: Value,
    #[serde(rename = "totalPrice", alias = "amount")]
    pub total_price: Value,
    pub asset: Value,
    pub fiat: Value,
    #[serde(rename = "counterPartNickName", alias = "counterparty")]
    pub counterparty: Value,
    #[serde(rename = "payDeadline")]
    pub pay_deadline: Value,
    #[serde(rename = "expiresAt")]
    pub expires_at: Value,
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    NotAnObject,
    MissingId,
    MissingSymbol,
    UnknownSide(String),
    MissingTime,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::NotAnObject => write!(f, "record is not a JSON object"),
            RejectReason::MissingId => write!(f, "missing id"),
            RejectReason::MissingSymbol => write!(f, "missing symbol"),
            RejectReason::UnknownSide(v) => write!(f, "unrecognised side indicator '{v}'"),
            RejectReason::MissingTime => write!(f, "missing or unparseable time"),
        }
    }
}

/// A record dropped during normalization, by position in the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    pub index: usize,
    pub reason: RejectReason,
}

// ---------------------------------------------------------------------------
// Field parsers
// ---------------------------------------------------------------------------

/// Non-empty trimmed text from a string or number.
pub fn text(v: &Value) -> Option<String> {
    let s = match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

/// Decimal from a number or numeric string; anything else is zero.
pub fn lenient_decimal(v: &Value) -> Decimal {
    let raw = match v {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return Decimal::ZERO,
    };
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .unwrap_or(Decimal::ZERO)
}

fn optional_decimal(v: &Value) -> Option<Decimal> {
    match v {
        Value::Null => None,
        other => Some(lenient_decimal(other)),
    }
}

/// Side from a boolean-like buyer flag or an explicit BUY/SELL label.
pub fn side_indicator(v: &Value) -> Option<Side> {
    match v {
        Value::Bool(true) => Some(Side::Buy),
        Value::Bool(false) => Some(Side::Sell),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(Side::Buy),
            Some(0) => Some(Side::Sell),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "buy" | "buyer" => Some(Side::Buy),
            "false" | "0" | "sell" | "seller" => Some(Side::Sell),
            _ => None,
        },
        _ => None,
    }
}

/// Epoch milliseconds (number or digit string) or an RFC 3339 string.
pub fn timestamp(v: &Value) -> Option<DateTime<Utc>> {
    match v {
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(ms) = s.parse::<i64>() {
                return DateTime::from_timestamp_millis(ms);
            }
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

pub fn normalize_trade(raw: &RawTrade, source: &str) -> Result<TradeRecord, RejectReason> {
    let external_trade_id = text(&raw.id).ok_or(RejectReason::MissingId)?;
    let symbol = text(&raw.symbol).ok_or(RejectReason::MissingSymbol)?;

    let indicator = if raw.is_buyer.is_null() {
        &raw.side
    } else {
        &raw.is_buyer
    };
    let side = side_indicator(indicator)
        .ok_or_else(|| RejectReason::UnknownSide(indicator.to_string()))?;

    let executed_at = timestamp(&raw.time).ok_or(RejectReason::MissingTime)?;

    Ok(TradeRecord {
        external_trade_id,
        symbol,
        side,
        quantity: lenient_decimal(&raw.qty),
        price: lenient_decimal(&raw.price),
        quote_quantity: lenient_decimal(&raw.quote_qty),
        commission: lenient_decimal(&raw.commission),
        commission_asset: text(&raw.commission_asset).unwrap_or_default(),
        executed_at,
        source: source.to_string(),
    })
}

/// Decode a whole `data` array, keeping the survivors in response order.
pub fn normalize_trades(data: &[Value], source: &str) -> (Vec<TradeRecord>, Vec<Rejected>) {
    let mut trades = Vec::with_capacity(data.len());
    let mut rejected = Vec::new();
    for (index, v) in data.iter().enumerate() {
        let res = if v.is_object() {
            serde_json::from_value::<RawTrade>(v.clone())
                .map_err(|_| RejectReason::NotAnObject)
                .and_then(|raw| normalize_trade(&raw, source))
        } else {
            Err(RejectReason::NotAnObject)
        };
        match res {
            Ok(t) => trades.push(t),
            Err(reason) => rejected.push(Rejected { index, reason }),
        }
    }
    (trades, rejected)
}

pub fn normalize_order(raw: &RawOrder) -> Result<Order, RejectReason> {
    let order_number = text(&raw.order_number);
    let id = text(&raw.id)
        .or_else(|| order_number.clone())
        .ok_or(RejectReason::MissingId)?;
    let side = side_indicator(&raw.trade_type)
        .ok_or_else(|| RejectReason::UnknownSide(raw.trade_type.to_string()))?;

    Ok(Order {
        order_number: order_number.unwrap_or_else(|| id.clone()),
        id,
        side,
        raw_status: text(&raw.order_status).unwrap_or_default(),
        amount: optional_decimal(&raw.total_price),
        asset: text(&raw.asset),
        fiat: text(&raw.fiat),
        counterparty: text(&raw.counterparty),
        payment_deadline: timestamp(&raw.pay_deadline),
        expires_at: timestamp(&raw.expires_at),
    })
}

pub fn normalize_orders(data: &[Value]) -> (Vec<Order>, Vec<Rejected>) {
    let mut orders = Vec::with_capacity(data.len());
    let mut rejected = Vec::new();
    for (index, v) in data.iter().enumerate() {
        let res = if v.is_object() {
            serde_json::from_value::<RawOrder>(v.clone())
                .map_err(|_| RejectReason::NotAnObject)
                .and_then(|raw| normalize_order(&raw))
        } else {
            Err(RejectReason::NotAnObject)
        };
        match res {
            Ok(o) => orders.push(o),
            Err(reason) => rejected.push(Rejected { index, reason }),
        }
    }
    (orders, rejected)
}
