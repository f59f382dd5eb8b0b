use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::context::AppContext;
use crate::metrics;

/// GET /health
///
/// Verifies the database and Redis are reachable.
pub async fn health_check(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    if let Err(e) = sqlx::query("SELECT 1").execute(&ctx.db_pool).await {
        tracing::error!(error = %e, "Health check: database unreachable");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unhealthy", "component": "database" })),
        );
    }

    {
        let mut sessions = ctx.sessions.lock().await;
        if let Err(e) = sessions.ping().await {
            tracing::error!(error = %e, "Health check: redis unreachable");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unhealthy", "component": "redis" })),
            );
        }
    }

    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// GET /metrics
pub async fn metrics_endpoint() -> impl IntoResponse {
    match metrics::gather_metrics() {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to gather metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, String::new()).into_response()
        }
    }
}
