//! tdk-schemas
//!
//! Shared data contracts for the trade desk kernel: ledger rows, findings,
//! scan log entries, orders, alerts, and the request/response bodies exchanged
//! with collaborators. No IO, no business logic beyond parsing of labels.

mod error;

pub use error::{EngineError, ErrorKind};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// Trade / order side from the desk's own perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    pub fn parse(s: &str) -> Result<Self, EngineError> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            other => Err(EngineError::Validation(format!(
                "invalid side '{other}'. expected one of: BUY | SELL"
            ))),
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// One trade execution in the ledger.
///
/// Unique on `(external_trade_id, symbol)`. Rows are only created by the
/// trade sync worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub external_trade_id: String,
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Decimal,
    pub quote_quantity: Decimal,
    pub commission: Decimal,
    pub commission_asset: String,
    pub executed_at: DateTime<Utc>,
    /// Ingestion source label (e.g. `"exchange"`).
    pub source: String,
}

impl TradeRecord {
    /// Ledger identity.
    pub fn key(&self) -> (&str, &str) {
        (&self.external_trade_id, &self.symbol)
    }
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// Named audit domain a reconciliation scan can cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditDomain {
    Trades,
    Positions,
    Sync,
}

impl AuditDomain {
    pub const ALL: [AuditDomain; 3] = [AuditDomain::Trades, AuditDomain::Positions, AuditDomain::Sync];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditDomain::Trades => "trades",
            AuditDomain::Positions => "positions",
            AuditDomain::Sync => "sync",
        }
    }

    pub fn parse(s: &str) -> Result<Self, EngineError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trades" => Ok(AuditDomain::Trades),
            "positions" => Ok(AuditDomain::Positions),
            "sync" => Ok(AuditDomain::Sync),
            other => Err(EngineError::Validation(format!(
                "unknown audit domain '{other}'. expected one of: all | trades | positions | sync"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Result<Self, EngineError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            other => Err(EngineError::Validation(format!("invalid severity '{other}'"))),
        }
    }
}

/// Review status of a finding. Only moves forward, never back to `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    Open,
    Acknowledged,
    Resolved,
}

impl FindingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingStatus::Open => "open",
            FindingStatus::Acknowledged => "acknowledged",
            FindingStatus::Resolved => "resolved",
        }
    }

    pub fn parse(s: &str) -> Result<Self, EngineError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(FindingStatus::Open),
            "acknowledged" => Ok(FindingStatus::Acknowledged),
            "resolved" => Ok(FindingStatus::Resolved),
            other => Err(EngineError::Validation(format!(
                "invalid finding status '{other}'. expected one of: open | acknowledged | resolved"
            ))),
        }
    }
}

/// A discrepancy detected by an audit rule, before persistence.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NewFinding {
    pub category: AuditDomain,
    pub severity: Severity,
    /// Stable machine code, e.g. `QUOTE_QTY_MISMATCH`.
    pub finding_type: String,
    /// Asset, symbol or trade identifier the finding is about.
    pub asset: String,
    pub detail: String,
    /// Identity of the anomaly across scans.
    pub fingerprint: String,
}

/// A persisted finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationFinding {
    pub id: Uuid,
    /// Scan whose scope created this finding.
    pub scan_id: Uuid,
    pub category: AuditDomain,
    pub severity: Severity,
    pub finding_type: String,
    pub asset: String,
    pub detail: String,
    pub fingerprint: String,
    pub status: FindingStatus,
    pub created_at: DateTime<Utc>,
    pub feedback_at: Option<DateTime<Utc>>,
    pub feedback_note: Option<String>,
}

impl ReconciliationFinding {
    pub fn from_new(id: Uuid, scan_id: Uuid, f: &NewFinding, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            scan_id,
            category: f.category,
            severity: f.severity,
            finding_type: f.finding_type.clone(),
            asset: f.asset.clone(),
            detail: f.detail.clone(),
            fingerprint: f.fingerprint.clone(),
            status: FindingStatus::Open,
            created_at,
            feedback_at: None,
            feedback_note: None,
        }
    }
}

/// One row per successful scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanLogEntry {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub scope: Vec<String>,
    pub findings_count: i64,
    pub critical_count: i64,
    pub triggered_by: String,
}

/// Body of the reconciliation trigger endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileRequest {
    #[serde(default)]
    pub scope: Vec<String>,
    pub triggered_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileResponse {
    pub findings_count: i64,
    pub critical_count: i64,
}

// ---------------------------------------------------------------------------
// Orders & alerts
// ---------------------------------------------------------------------------

/// An exchange order as observed by the desk. The canonical lifecycle status
/// is always derived from `raw_status` + `side`, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub order_number: String,
    pub side: Side,
    /// Numeric code or free text exactly as the exchange reported it.
    pub raw_status: String,
    pub amount: Option<Decimal>,
    pub asset: Option<String>,
    pub fiat: Option<String>,
    pub counterparty: Option<String>,
    pub payment_deadline: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    NewOrder,
    InfoUpdate,
    PaymentTimer,
    OrderTimer,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::NewOrder => "new_order",
            AlertType::InfoUpdate => "info_update",
            AlertType::PaymentTimer => "payment_timer",
            AlertType::OrderTimer => "order_timer",
        }
    }

    /// Both timer kinds are urgent.
    pub fn is_urgent(&self) -> bool {
        matches!(self, AlertType::PaymentTimer | AlertType::OrderTimer)
    }
}

/// Transient alert handed to the notification layer. Never ledger truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAlert {
    pub order_id: String,
    pub order_number: String,
    pub alert_type: AlertType,
    pub counterparty: Option<String>,
    pub amount: Option<Decimal>,
    pub urgent: bool,
    pub fired_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_parse_is_case_insensitive() {
        assert_eq!(Side::parse("buy").unwrap(), Side::Buy);
        assert_eq!(Side::parse(" SELL ").unwrap(), Side::Sell);
        assert!(Side::parse("hold").is_err());
    }

    #[test]
    fn audit_domain_roundtrips_labels() {
        for d in AuditDomain::ALL {
            assert_eq!(AuditDomain::parse(d.as_str()).unwrap(), d);
        }
        let err = AuditDomain::parse("payroll").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn timer_alerts_are_urgent() {
        assert!(AlertType::PaymentTimer.is_urgent());
        assert!(AlertType::OrderTimer.is_urgent());
        assert!(!AlertType::NewOrder.is_urgent());
        assert!(!AlertType::InfoUpdate.is_urgent());
    }

    #[test]
    fn finding_status_serializes_snake_case() {
        let s = serde_json::to_string(&FindingStatus::Acknowledged).unwrap();
        assert_eq!(s, "\"acknowledged\"");
    }

    #[test]
    fn reconcile_request_scope_defaults_to_empty() {
        let r: ReconcileRequest = serde_json::from_str(r#"{"triggered_by":"ops"}"#).unwrap();
        assert!(r.scope.is_empty());
    }

    #[test]
    fn trade_record_serializes_decimals_as_strings() {
        let t = TradeRecord {
            external_trade_id: "1".to_string(),
            symbol: "BTCUSDT".to_string(),
            side: Side::Buy,
            quantity: rust_decimal_macros::dec!(0.5),
            price: rust_decimal_macros::dec!(100),
            quote_quantity: rust_decimal_macros::dec!(50),
            commission: Decimal::ZERO,
            commission_asset: String::new(),
            executed_at: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
            source: "exchange".to_string(),
        };
        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(v["quantity"], "0.5");
        assert_eq!(v["side"], "BUY");
    }
}
