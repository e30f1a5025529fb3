/// Health check endpoints
///
/// `/health` probes the database and answers 503 when it is unreachable;
/// `/health/live` only proves the process is serving requests.
use crate::{context::AppContext, db};
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Health status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// "healthy" or "unhealthy"
    pub status: String,
    pub version: String,
    pub database: ComponentHealth,
}

/// Health status of individual component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: String,

    /// Response time in milliseconds
    pub response_time_ms: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Build health check routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health))
        .route("/health/live", get(liveness_probe))
}

pub async fn health(State(ctx): State<AppContext>) -> (StatusCode, Json<HealthStatus>) {
    let start = Instant::now();
    let probe = db::test_connection(&ctx.db).await;
    let response_time_ms = start.elapsed().as_millis() as u64;

    let (status_code, database) = match probe {
        Ok(()) => (
            StatusCode::OK,
            ComponentHealth {
                status: "healthy".to_string(),
                response_time_ms,
                error: None,
            },
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health_check_failed: database unreachable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                ComponentHealth {
                    status: "unhealthy".to_string(),
                    response_time_ms,
                    error: Some(e.to_string()),
                },
            )
        }
    };

    let health = HealthStatus {
        status: database.status.clone(),
        version: ctx.config.service.version.clone(),
        database,
    };

    (status_code, Json(health))
}

pub async fn liveness_probe() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
