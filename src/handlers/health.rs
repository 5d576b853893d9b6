use std::time::Instant;

use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router,
};
use chrono::Utc;
use serde_json::json;

use crate::{names, AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route(names::HEALTH_URL, get(health))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let started = Instant::now();
    let healthy = match state.db.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("database health check failed: {e:?}");
            false
        }
    };
    let response_time_ms = started.elapsed().as_millis() as u64;

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "timestamp": Utc::now().to_rfc3339(),
        "version": names::VERSION,
        "checks": {
            "database": {
                "healthy": healthy,
                "responseTimeMs": response_time_ms,
            }
        }
    });

    (status, Json(body))
}
