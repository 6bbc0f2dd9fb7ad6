//! Axum router and all HTTP handlers for tdk-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Handlers are `pub(crate)`; scenario tests in `tests/`
//! compose the router directly.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use tdk_reconcile::{ReviewError, ReviewRequest, ScanError, ScanRequest};
use tdk_schemas::{EngineError, FindingStatus, ReconcileRequest};
use tdk_sync::CycleOutcome;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;
use uuid::Uuid;

use crate::{
    api_types::{
        AlertRefreshResponse, ErrorResponse, FindingsQuery, HealthResponse, MuteRequest,
        MuteResponse, ScansQuery, SyncTriggerResponse,
    },
    state::{AppState, BusMsg},
};

const DEFAULT_SCAN_LIMIT: i64 = 20;
const MAX_SCAN_LIMIT: i64 = 500;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/stream", get(stream))
        .route("/v1/reconcile", post(reconcile))
        .route("/v1/findings", get(list_findings))
        .route("/v1/findings/summary", get(findings_summary))
        .route("/v1/findings/:id/review", post(review_finding))
        .route("/v1/scans", get(list_scans))
        .route("/v1/sync/trigger", post(sync_trigger))
        .route("/v1/alerts/refresh", post(alerts_refresh))
        .route("/v1/alerts/mute", get(get_mute).post(set_mute))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Every handler failure funnels through here so the response shape is the
/// same regardless of which component raised it.
pub(crate) enum ApiError {
    Engine(EngineError),
    NotFound(String),
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Engine(e)
    }
}

impl From<ScanError> for ApiError {
    fn from(e: ScanError) -> Self {
        ApiError::Engine(e.into())
    }
}

impl From<ReviewError> for ApiError {
    fn from(e: ReviewError) -> Self {
        match e {
            ReviewError::NotFound(_) => ApiError::NotFound(e.to_string()),
            other => ApiError::Engine(other.into()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Engine(EngineError::unclassified(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, body) = match self {
            ApiError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorResponse {
                    error: msg,
                    kind: "not_found".to_string(),
                },
            ),
            ApiError::Engine(err) => {
                let kind = err.kind();
                let code = match &err {
                    EngineError::TransientNetwork(_) => StatusCode::SERVICE_UNAVAILABLE,
                    EngineError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    EngineError::PersistenceConflict(_) => StatusCode::CONFLICT,
                    EngineError::Unclassified(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if code.is_server_error() {
                    tracing::warn!(kind = kind.as_str(), error = %err, "request failed");
                }
                (
                    code,
                    ErrorResponse {
                        error: err.to_string(),
                        kind: kind.as_str().to_string(),
                    },
                )
            }
        };
        (code, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let snap = st.snapshot().await;
    let _ = st.bus.send(BusMsg::Status(snap.clone()));
    (StatusCode::OK, Json(snap))
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(m.event_name()).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}

// ---------------------------------------------------------------------------
// POST /v1/reconcile
// ---------------------------------------------------------------------------

pub(crate) async fn reconcile(
    State(st): State<Arc<AppState>>,
    Json(body): Json<ReconcileRequest>,
) -> Result<Response, ApiError> {
    let req = ScanRequest {
        scope: body.scope,
        triggered_by: body.triggered_by,
    };
    let outcome = st.scanner.scan(&req).await?;

    info!(
        scan_id = %outcome.log.id,
        findings = outcome.log.findings_count,
        new = outcome.new_findings,
        "scan requested over http"
    );
    st.log(
        "INFO",
        format!(
            "scan {} by {}: {} findings ({} critical)",
            outcome.log.id,
            outcome.log.triggered_by,
            outcome.log.findings_count,
            outcome.log.critical_count
        ),
    );
    Ok((StatusCode::OK, Json(outcome.response())).into_response())
}

// ---------------------------------------------------------------------------
// GET /v1/findings, GET /v1/findings/summary
// ---------------------------------------------------------------------------

pub(crate) async fn list_findings(
    State(st): State<Arc<AppState>>,
    Query(q): Query<FindingsQuery>,
) -> Result<Response, ApiError> {
    let status = match q.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(FindingStatus::parse(raw)?),
        None => None,
    };
    let findings = st.scanner.findings(status).await?;
    Ok((StatusCode::OK, Json(findings)).into_response())
}

pub(crate) async fn findings_summary(
    State(st): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let summary = st.scanner.summary().await?;
    Ok((StatusCode::OK, Json(summary)).into_response())
}

// ---------------------------------------------------------------------------
// POST /v1/findings/:id/review
// ---------------------------------------------------------------------------

pub(crate) async fn review_finding(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<ReviewRequest>,
) -> Result<Response, ApiError> {
    let finding = st.scanner.review(id, &body).await?;
    st.log(
        "INFO",
        format!("finding {id} marked {}", finding.status.as_str()),
    );
    Ok((StatusCode::OK, Json(finding)).into_response())
}

// ---------------------------------------------------------------------------
// GET /v1/scans
// ---------------------------------------------------------------------------

pub(crate) async fn list_scans(
    State(st): State<Arc<AppState>>,
    Query(q): Query<ScansQuery>,
) -> Result<Response, ApiError> {
    let limit = q.limit.unwrap_or(DEFAULT_SCAN_LIMIT).clamp(1, MAX_SCAN_LIMIT);
    let scans = st.scanner.scans(limit).await?;
    Ok((StatusCode::OK, Json(scans)).into_response())
}

// ---------------------------------------------------------------------------
// POST /v1/sync/trigger
// ---------------------------------------------------------------------------

/// Run one sync cycle inline. A cycle already in flight wins; this call then
/// reports `ran: false` instead of waiting.
pub(crate) async fn sync_trigger(State(st): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let outcome = st
        .worker
        .run_cycle()
        .await
        .map_err(EngineError::from)?;

    let resp = match outcome {
        CycleOutcome::Skipped => SyncTriggerResponse {
            ran: false,
            report: None,
        },
        CycleOutcome::Completed(report) => {
            st.record_sync(report.clone()).await;
            SyncTriggerResponse {
                ran: true,
                report: Some(report),
            }
        }
    };
    Ok((StatusCode::OK, Json(resp)).into_response())
}

// ---------------------------------------------------------------------------
// POST /v1/alerts/refresh, GET|POST /v1/alerts/mute
// ---------------------------------------------------------------------------

pub(crate) async fn alerts_refresh(
    State(st): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let report = st.poller.poll_once().await.map_err(EngineError::from)?;
    Ok((
        StatusCode::OK,
        Json(AlertRefreshResponse {
            primed: report.primed,
            orders: report.orders,
            alerts: report.alerts.len(),
            delivered: report.dispatch.delivered,
            suppressed: report.dispatch.suppressed,
            evicted: report.evicted,
        }),
    )
        .into_response())
}

pub(crate) async fn get_mute(State(st): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let muted = st.dispatcher.muted().await?;
    Ok((
        StatusCode::OK,
        Json(MuteResponse {
            user_id: st.dispatcher.user_id().to_string(),
            muted,
        }),
    )
        .into_response())
}

pub(crate) async fn set_mute(
    State(st): State<Arc<AppState>>,
    Json(body): Json<MuteRequest>,
) -> Result<Response, ApiError> {
    st.dispatcher.set_muted(body.muted).await?;
    info!(user_id = st.dispatcher.user_id(), muted = body.muted, "alert mute flag set");
    Ok((
        StatusCode::OK,
        Json(MuteResponse {
            user_id: st.dispatcher.user_id().to_string(),
            muted: body.muted,
        }),
    )
        .into_response())
}
