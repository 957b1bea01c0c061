//! # Sweep Trigger API
//!
//! Thin HTTP surface for the external cron service. `POST /internal/sweep`
//! runs one full sweep and returns the aggregated stats; it is guarded by a
//! bearer secret when one is configured and open otherwise (the dev-mode
//! escape hatch). Partial item failures still return success with stats —
//! only a store outage produces an error response.
//!
//! - **Version**: 1.0.0
//! - **Since**: 2.0.0
//! - **Toggleable**: false

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use log::error;
use tokio_util::sync::CancellationToken;

use crate::features::reminders::SweepOrchestrator;

pub struct AppState {
    pub orchestrator: SweepOrchestrator,
    /// Bearer secret for the sweep endpoint. `None` leaves it open.
    pub sweep_auth_token: Option<String>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/internal/sweep", post(run_sweep))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "stride",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn authorized(state: &AppState, headers: &HeaderMap) -> bool {
    let Some(expected) = state.sweep_auth_token.as_deref() else {
        return true;
    };
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token == expected)
}

/// Run one reminder sweep. Invoked by the external cron trigger.
async fn run_sweep(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> (StatusCode, Json<serde_json::Value>) {
    if !authorized(&state, &headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "success": false,
                "error": "unauthorized",
            })),
        );
    }

    let now = Utc::now();
    match state.orchestrator.run(now, &CancellationToken::new()).await {
        Ok(report) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "stats": report,
                "timestamp": now.to_rfc3339(),
            })),
        ),
        Err(e) => {
            error!("Sweep aborted: {e}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "success": false,
                    "error": e.to_string(),
                    "timestamp": now.to_rfc3339(),
                })),
            )
        }
    }
}
