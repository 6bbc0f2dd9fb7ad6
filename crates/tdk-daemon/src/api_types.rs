//! Request and response types for tdk-daemon HTTP endpoints that are not
//! already shared contracts in `tdk-schemas`. No business logic lives here.

use serde::{Deserialize, Serialize};
use tdk_sync::SyncReport;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// "validation" | "not_found" | "persistence_conflict" | "transient_network" | "unclassified"
    pub kind: String,
}

// ---------------------------------------------------------------------------
// /v1/findings, /v1/scans
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FindingsQuery {
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScansQuery {
    pub limit: Option<i64>,
}

// ---------------------------------------------------------------------------
// /v1/sync/trigger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct SyncTriggerResponse {
    /// false when a cycle was already running and this trigger was dropped.
    pub ran: bool,
    pub report: Option<SyncReport>,
}

// ---------------------------------------------------------------------------
// /v1/alerts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct AlertRefreshResponse {
    pub primed: bool,
    pub orders: usize,
    pub alerts: usize,
    pub delivered: usize,
    pub suppressed: usize,
    pub evicted: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MuteRequest {
    pub muted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MuteResponse {
    pub user_id: String,
    pub muted: bool,
}
