// ============================================================================
// Account Routes
// ============================================================================
//
// Endpoints:
// - GET    /api/accounts/me/ - Current user details
// - DELETE /api/accounts/    - Delete account and revoke all tokens
//
// ============================================================================

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::context::AppContext;
use crate::db;
use crate::error::AppError;
use crate::routes::extractors::AuthenticatedUser;
use crate::utils::log_safe_id;

/// GET /api/accounts/me/
pub async fn me(
    State(ctx): State<Arc<AppContext>>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let record = db::get_user_by_id(&ctx.db_pool, &user.user_id)
        .await?
        .ok_or_else(|| AppError::Auth("Session is invalid or expired".to_string()))?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "id": record.id.to_string(),
            "username": record.username,
            "mobile": record.mobile,
            "onboarding_completed": record.onboarding_completed,
        })),
    ))
}

/// DELETE /api/accounts/
///
/// Revokes every refresh token, then deletes the user. The profile,
/// settings, meal log, and cached recommendations cascade with the row.
pub async fn delete_account(
    State(ctx): State<Arc<AppContext>>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    {
        let mut sessions = ctx.sessions.lock().await;
        if let Err(e) = sessions
            .revoke_all_user_tokens(&user.user_id.to_string())
            .await
        {
            tracing::error!(error = %e, "Failed to revoke tokens during account deletion");
            // Continue anyway - the tokens expire on their own
        }
        if let Err(e) = sessions
            .revoke_access_token(&user.jti, ctx.auth_manager.access_token_ttl_seconds())
            .await
        {
            tracing::error!(error = %e, "Failed to denylist access token");
        }
    }

    db::delete_user(&ctx.db_pool, &user.user_id).await?;

    tracing::info!(
        user_hash = %log_safe_id(&user.user_id.to_string(), &ctx.config.logging.hash_salt),
        "Account deleted"
    );

    Ok((
        StatusCode::OK,
        Json(json!({ "message": "Account deleted" })),
    ))
}
