//! tdk-exchange
//!
//! Exchange client boundary: trade history and open orders.
//!
//! This crate owns the wire envelope and lenient record normalization. It
//! does **not** write to the ledger; the sync worker hands normalized trades
//! to the store.

pub mod normalize;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tdk_schemas::{EngineError, Order, TradeRecord};
use thiserror::Error;

pub use normalize::{RejectReason, Rejected};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Connection, timeout or TLS failure.
    #[error("exchange transport error: {0}")]
    Transport(String),
    #[error("exchange http error status={status}: {body}")]
    Http { status: u16, body: String },
    /// `{success: false, error}` envelope.
    #[error("exchange api error: {0}")]
    Api(String),
    #[error("exchange response decode error: {0}")]
    Decode(String),
}

impl ExchangeError {
    /// Failures the next scheduled cycle can be expected to clear.
    pub fn is_transient(&self) -> bool {
        match self {
            ExchangeError::Transport(_) | ExchangeError::Api(_) => true,
            ExchangeError::Http { status, .. } => *status == 429 || *status >= 500,
            ExchangeError::Decode(_) => false,
        }
    }
}

impl From<ExchangeError> for EngineError {
    fn from(e: ExchangeError) -> Self {
        if e.is_transient() {
            EngineError::TransientNetwork(e.to_string())
        } else {
            EngineError::Unclassified(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Wire envelope
// ---------------------------------------------------------------------------

/// Request body: `{action, startTime?}`.
#[derive(Debug, Clone, Serialize)]
pub struct ExchangeRequest<'a> {
    pub action: &'a str,
    #[serde(rename = "startTime", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
}

/// `{success: true, data: [...]}` | `{success: false, error}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(default)]
    pub data: Option<Vec<Value>>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl Envelope {
    pub fn into_data(self) -> Result<Vec<Value>, ExchangeError> {
        if !self.success {
            let msg = match self.error {
                Some(Value::String(s)) => s,
                Some(other) => other.to_string(),
                None => "unknown".to_string(),
            };
            return Err(ExchangeError::Api(msg));
        }
        Ok(self.data.unwrap_or_default())
    }
}

pub const ACTION_MY_TRADES: &str = "getMyTrades";
pub const ACTION_ORDERS: &str = "getOrders";

// ---------------------------------------------------------------------------
// Client contract
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct FetchedTrades {
    pub trades: Vec<TradeRecord>,
    pub rejected: Vec<Rejected>,
}

#[derive(Debug, Clone, Default)]
pub struct FetchedOrders {
    pub orders: Vec<Order>,
    pub rejected: Vec<Rejected>,
}

#[async_trait::async_trait]
pub trait ExchangeClient: Send + Sync {
    fn source_name(&self) -> &str;

    /// Trades executed at or after `start_time_ms` (all history when `None`).
    async fn fetch_my_trades(&self, start_time_ms: Option<i64>)
        -> Result<FetchedTrades, ExchangeError>;

    async fn fetch_orders(&self) -> Result<FetchedOrders, ExchangeError>;
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

/// JSON-over-HTTP exchange gateway. API key is passed in by the caller; do
/// not log it.
#[derive(Debug, Clone)]
pub struct HttpExchangeClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    source: String,
}

impl HttpExchangeClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            endpoint: format!("{}/exchange", base_url.trim_end_matches('/')),
            api_key,
            source: "exchange".to_string(),
        }
    }

    /// Label written into `TradeRecord::source`.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    async fn call(&self, req: &ExchangeRequest<'_>) -> Result<Vec<Value>, ExchangeError> {
        let mut builder = self.http.post(&self.endpoint).json(req);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ExchangeError::Http {
                status: status.as_u16(),
                body: truncate(&body, 256),
            });
        }

        let env: Envelope = resp
            .json()
            .await
            .map_err(|e| ExchangeError::Decode(e.to_string()))?;
        env.into_data()
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((i, _)) => format!("{}...", &s[..i]),
        None => s.to_string(),
    }
}

#[async_trait::async_trait]
impl ExchangeClient for HttpExchangeClient {
    fn source_name(&self) -> &str {
        &self.source
    }

    async fn fetch_my_trades(
        &self,
        start_time_ms: Option<i64>,
    ) -> Result<FetchedTrades, ExchangeError> {
        let data = self
            .call(&ExchangeRequest {
                action: ACTION_MY_TRADES,
                start_time: start_time_ms,
            })
            .await?;
        let (trades, rejected) = normalize::normalize_trades(&data, &self.source);
        for r in &rejected {
            tracing::warn!(index = r.index, reason = %r.reason, "exchange trade rejected");
        }
        Ok(FetchedTrades { trades, rejected })
    }

    async fn fetch_orders(&self) -> Result<FetchedOrders, ExchangeError> {
        let data = self
            .call(&ExchangeRequest {
                action: ACTION_ORDERS,
                start_time: None,
            })
            .await?;
        let (orders, rejected) = normalize::normalize_orders(&data);
        for r in &rejected {
            tracing::warn!(index = r.index, reason = %r.reason, "exchange order rejected");
        }
        Ok(FetchedOrders { orders, rejected })
    }
}
