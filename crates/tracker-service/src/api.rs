//! HTTP endpoints for the tracker-service.
//!
//! The relay posts uplinks to any path; every request that is not one of
//! the `/api` routes below is treated as an uplink.
//!
//! # Error Handling
//!
//! Under [`AckPolicy::Always`] the relay always receives the acknowledgement
//! body and failures are only logged and counted. Under
//! [`AckPolicy::OnSuccess`] failures return a JSON [`AppError`] body.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use crate::config::AckPolicy;
use crate::state::{AppState, IngestCounters};

/// Create the API router.
///
/// Unmatched requests fall through to the uplink handler.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/stats", get(stats))
        .fallback(uplink)
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
    })
}

/// Store and ingestion statistics.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub reports: u64,
    pub points: u64,
    pub hotspot_connections: u64,
    pub hotspot_names: u64,
    pub ingest: IngestCounters,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
}

async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<StatsResponse>, AppError> {
    let store = state.store.lock().await;
    Ok(Json(StatsResponse {
        reports: store.count_reports()?,
        points: store.count_points()?,
        hotspot_connections: store.count_hotspot_connections()?,
        hotspot_names: store.count_hotspot_names()?,
        ingest: state.stats.snapshot(),
        started_at: state.started_at,
    }))
}

/// Uplink endpoint for every other path.
///
/// A `POST` body is decoded and stored; any other method only gets the
/// acknowledgement.
async fn uplink(
    State(state): State<Arc<AppState>>,
    method: Method,
    body: Bytes,
) -> Result<Response, AppError> {
    if method != Method::POST {
        debug!("{} request acknowledged without ingestion", method);
        return Ok(ack(&state));
    }

    let result = {
        let mut store = state.store.lock().await;
        store.record(&body)
    };

    match result {
        Ok(receipt) => {
            state.stats.record_accepted();
            debug!(report_id = receipt.report_id, "Uplink stored");
            Ok(ack(&state))
        }
        Err(e) if e.is_rejection() => {
            state.stats.record_rejected();
            warn!(
                error = %e,
                "Rejected uplink: {}",
                String::from_utf8_lossy(&body)
            );
            match state.config.ingest.ack_policy {
                AckPolicy::Always => Ok(ack(&state)),
                AckPolicy::OnSuccess => Err(AppError::BadRequest(e.to_string())),
            }
        }
        Err(e) => {
            state.stats.record_failed();
            error!(error = %e, "Failed to store uplink");
            match state.config.ingest.ack_policy {
                AckPolicy::Always => Ok(ack(&state)),
                AckPolicy::OnSuccess => Err(AppError::Store(e)),
            }
        }
    }
}

fn ack(state: &AppState) -> Response {
    (
        [(header::CONTENT_TYPE, "text/html")],
        state.config.server.ack_body.clone(),
    )
        .into_response()
}

/// API error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Store(tracker_store::Error),
}

impl From<tracker_store::Error> for AppError {
    fn from(e: tracker_store::Error) -> Self {
        AppError::Store(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };

        info!(%status, "Request failed: {}", message);
        let body = serde_json::json!({
            "error": message,
        });

        (status, Json(body)).into_response()
    }
}
