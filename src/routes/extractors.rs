// ============================================================================
// Axum Extractors
// ============================================================================
//
// AuthenticatedUser: extracts and validates the JWT bearer token from the
// Authorization header, then checks the access-token denylist so tokens
// revoked by logout stop working before they expire.
//
// ============================================================================

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::Claims;
use crate::context::AppContext;
use crate::error::AppError;

/// Authenticated identity of the current request.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    /// jti of the presented access token; denylisted on logout
    pub jti: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppContext>> for AuthenticatedUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppContext>,
    ) -> Result<Self, Self::Rejection> {
        let claims = extract_claims(state, parts).map_err(|e| {
            tracing::warn!(error = %e, "JWT authentication failed");
            let status = e.status_code();
            let body = json!({
                "error": e.user_message(),
                "error_code": e.error_code(),
            });
            (status, axum::Json(body)).into_response()
        })?;

        // Check the denylist (soft logout)
        {
            let mut sessions = state.sessions.lock().await;
            match sessions.is_access_token_revoked(&claims.jti).await {
                Ok(true) => {
                    drop(sessions);
                    let body = json!({
                        "error": "Token was revoked (logged out)",
                        "error_code": "TOKEN_REVOKED",
                    });
                    return Err(
                        (axum::http::StatusCode::UNAUTHORIZED, axum::Json(body)).into_response()
                    );
                }
                Ok(false) => {}
                Err(e) => {
                    // Fail open - a cache outage must not lock everyone out
                    tracing::error!(error = %e, "Failed to check token denylist");
                }
            }
        }

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| {
            let body = json!({
                "error": "Invalid user ID in token",
                "error_code": "AUTH_ERROR",
            });
            (axum::http::StatusCode::UNAUTHORIZED, axum::Json(body)).into_response()
        })?;

        Ok(AuthenticatedUser {
            user_id,
            jti: claims.jti,
        })
    }
}

fn extract_claims(ctx: &AppContext, parts: &Parts) -> Result<Claims, AppError> {
    let auth_header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Auth("Missing Authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Invalid Authorization header format".to_string()))?;

    ctx.auth_manager
        .verify_token(token)
        .map_err(|e| AppError::Auth(format!("Invalid or expired token: {}", e)))
}
