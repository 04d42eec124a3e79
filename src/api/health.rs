//! Liveness and readiness probes

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Reachability of the backing stores
#[derive(Serialize, ToSchema)]
pub struct ReadinessResponse {
    pub status: String,
    pub version: String,
    pub database: bool,
    pub redis: bool,
}

/// The process is up
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Postgres and Redis both answer
#[utoipa::path(
    get,
    path = "/ready",
    tag = "health",
    responses(
        (status = 200, description = "Service is ready", body = ReadinessResponse),
        (status = 503, description = "A backing store is unreachable", body = ReadinessResponse)
    )
)]
pub async fn readiness_check(State(state): State<crate::AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let (database, redis) = tokio::join!(
        state.services.repository.ping(),
        state.services.rate_limit.ping()
    );

    if let Err(e) = &database {
        tracing::warn!("Readiness: database unreachable: {}", e);
    }
    if let Err(e) = &redis {
        tracing::warn!("Readiness: redis unreachable: {}", e);
    }

    let body = ReadinessResponse {
        database: database.is_ok(),
        redis: redis.is_ok(),
        status: String::new(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    if body.database && body.redis {
        (StatusCode::OK, Json(ReadinessResponse { status: "ready".to_string(), ..body }))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse { status: "degraded".to_string(), ..body }),
        )
    }
}
