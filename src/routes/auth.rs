// ============================================================================
// Authentication Routes
// ============================================================================
//
// Endpoints:
// - POST /api/accounts/register/      - Create account, issue token pair
// - POST /api/accounts/login/         - Verify credentials, issue token pair
// - POST /api/accounts/token/refresh/ - Rotate the token pair
// - POST /api/accounts/logout/        - Revoke tokens (idempotent)
// - POST /api/accounts/otp/send/      - Send a login OTP over SMS
// - POST /api/accounts/otp/verify/    - OTP login (creates user on first use)
//
// ============================================================================

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::{OTP_TTL_SECONDS, SECONDS_PER_DAY};
use crate::context::AppContext;
use crate::db;
use crate::error::AppError;
use crate::metrics;
use crate::routes::extractors::AuthenticatedUser;
use crate::utils::{log_safe_id, validate_mobile, validate_password_strength, validate_username};

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Token pair issued at registration, login, and OTP verification
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthTokensResponse {
    /// Access token (short-lived)
    pub access: String,
    /// Refresh token (long-lived, revocable)
    pub refresh: String,
    /// Access token expiration timestamp (Unix epoch seconds)
    pub expires_at: i64,
    pub user_id: String,
    pub onboarding_completed: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshTokenRequest {
    /// Refresh token (JWT)
    pub refresh: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshTokenResponse {
    pub access: String,
    pub refresh: String,
    pub expires_at: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LogoutRequest {
    /// Refresh token to revoke
    #[serde(default)]
    pub refresh: Option<String>,
    /// If true, revoke every refresh token the user holds
    #[serde(default)]
    pub all_devices: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendOtpRequest {
    pub mobile: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyOtpRequest {
    pub mobile: String,
    pub otp: String,
}

struct TokenPair {
    access: String,
    refresh: String,
    expires_at: i64,
}

/// Creates an access/refresh pair and registers the refresh jti in Redis.
async fn issue_token_pair(ctx: &AppContext, user_id: &Uuid) -> Result<TokenPair, AppError> {
    let (access, _access_jti, expires_at) =
        ctx.auth_manager.create_token(user_id).map_err(|e| {
            tracing::error!(error = %e, "Failed to create access token");
            AppError::Unknown(e)
        })?;

    let (refresh, refresh_jti, _refresh_expires) =
        ctx.auth_manager.create_refresh_token(user_id).map_err(|e| {
            tracing::error!(error = %e, "Failed to create refresh token");
            AppError::Unknown(e)
        })?;

    {
        let mut sessions = ctx.sessions.lock().await;
        let refresh_ttl_seconds = ctx.config.auth.refresh_token_ttl_days * SECONDS_PER_DAY;

        if let Err(e) = sessions
            .store_refresh_token(&refresh_jti, &user_id.to_string(), refresh_ttl_seconds)
            .await
        {
            tracing::error!(error = %e, "Failed to store refresh token");
            // Continue anyway - token was created, just not tracked
        }
    }

    Ok(TokenPair {
        access,
        refresh,
        expires_at,
    })
}

/// POST /api/accounts/register/
///
/// Creates a user and issues a token pair. A duplicate username or a weak
/// password fails with 400 and creates no user row.
#[utoipa::path(
    post,
    path = "/api/accounts/register/",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created", body = AuthTokensResponse),
        (status = 400, description = "Duplicate username or invalid credentials"),
    ),
    tag = "accounts"
)]
pub async fn register(
    State(ctx): State<Arc<AppContext>>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_username(&request.username).map_err(AppError::Validation)?;
    validate_password_strength(&request.password).map_err(AppError::Validation)?;

    let user = db::create_user(
        &ctx.db_pool,
        &request.username,
        request.email.as_deref(),
        &request.password,
    )
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db_err) if db_err.constraint() == Some("users_username_key") => {
            AppError::Validation(format!(
                "Username '{}' is already taken",
                request.username
            ))
        }
        _ => AppError::Database(e),
    })?;

    tracing::info!(
        user_hash = %log_safe_id(&user.id.to_string(), &ctx.config.logging.hash_salt),
        "User registered"
    );
    metrics::REGISTRATIONS_TOTAL.inc();

    let pair = issue_token_pair(&ctx, &user.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthTokensResponse {
            access: pair.access,
            refresh: pair.refresh,
            expires_at: pair.expires_at,
            user_id: user.id.to_string(),
            onboarding_completed: user.onboarding_completed,
        }),
    ))
}

/// POST /api/accounts/login/
///
/// The unknown-user and wrong-password paths return the same message so the
/// endpoint cannot be used to enumerate accounts.
#[utoipa::path(
    post,
    path = "/api/accounts/login/",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token pair issued", body = AuthTokensResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Too many failed attempts"),
    ),
    tag = "accounts"
)]
pub async fn login(
    State(ctx): State<Arc<AppContext>>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = db::get_user_by_username(&ctx.db_pool, &request.username).await?;

    // Unknown-user and wrong-password take the same path and message
    let user = match user {
        Some(u) if db::verify_password(&u, &request.password) => u,
        _ => {
            let mut sessions = ctx.sessions.lock().await;
            match sessions
                .increment_failed_login_count(&request.username)
                .await
            {
                Ok(count) if count > ctx.config.security.max_failed_login_attempts => {
                    drop(sessions);
                    tracing::warn!(
                        user_hash = %log_safe_id(&request.username, &ctx.config.logging.hash_salt),
                        "Login rate limit exceeded"
                    );
                    return Err(AppError::TooManyRequests(
                        "Too many failed login attempts, try again later".to_string(),
                    ));
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(error = %e, "Failed to track login attempt");
                }
            }
            return Err(AppError::Auth("Invalid credentials".to_string()));
        }
    };

    {
        let mut sessions = ctx.sessions.lock().await;
        if let Err(e) = sessions.reset_failed_login_count(&request.username).await {
            tracing::error!(error = %e, "Failed to reset login counter");
        }
    }

    tracing::info!(
        user_hash = %log_safe_id(&user.id.to_string(), &ctx.config.logging.hash_salt),
        "User logged in"
    );
    metrics::LOGINS_TOTAL.inc();

    let pair = issue_token_pair(&ctx, &user.id).await?;

    Ok((
        StatusCode::OK,
        Json(AuthTokensResponse {
            access: pair.access,
            refresh: pair.refresh,
            expires_at: pair.expires_at,
            user_id: user.id.to_string(),
            onboarding_completed: user.onboarding_completed,
        }),
    ))
}

/// POST /api/accounts/token/refresh/
///
/// Security:
/// - Validates refresh token signature and expiration
/// - Checks the registry: a revoked token fails with 401
/// - Rotates: revokes the old refresh jti, issues and stores a new pair
#[utoipa::path(
    post,
    path = "/api/accounts/token/refresh/",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "New token pair", body = RefreshTokenResponse),
        (status = 401, description = "Invalid, expired, or revoked refresh token"),
    ),
    tag = "accounts"
)]
pub async fn refresh_token(
    State(ctx): State<Arc<AppContext>>,
    Json(request): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    // 1. Verify refresh token
    let claims = ctx
        .auth_manager
        .verify_token(&request.refresh)
        .map_err(|e| {
            tracing::warn!(error = %e, "Invalid refresh token");
            AppError::Auth("Invalid or expired refresh token".to_string())
        })?;

    // 2. Check the registry (revoked by logout?)
    {
        let mut sessions = ctx.sessions.lock().await;
        match sessions.check_refresh_token(&claims.jti).await {
            Ok(Some(_)) => {
                // Token is valid, continue
            }
            Ok(None) => {
                drop(sessions);
                tracing::warn!(
                    jti = %claims.jti,
                    user_hash = %log_safe_id(&claims.sub, &ctx.config.logging.hash_salt),
                    "Refresh token was revoked"
                );
                return Err(AppError::Auth("Refresh token was revoked".to_string()));
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to check refresh token");
                // Fail open - continue but log error
            }
        }

        // 3. Revoke old refresh token (token rotation)
        if let Err(e) = sessions.revoke_refresh_token(&claims.jti).await {
            tracing::error!(error = %e, "Failed to revoke old refresh token");
            // Continue anyway - token rotation is best effort
        }
    }

    // 4. Parse user ID and issue the new pair
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Validation("Invalid user ID in refresh token".to_string()))?;

    let pair = issue_token_pair(&ctx, &user_id).await?;

    tracing::info!(
        user_hash = %log_safe_id(&user_id.to_string(), &ctx.config.logging.hash_salt),
        "Token refreshed successfully"
    );

    Ok((
        StatusCode::OK,
        Json(RefreshTokenResponse {
            access: pair.access,
            refresh: pair.refresh,
            expires_at: pair.expires_at,
        }),
    ))
}

/// POST /api/accounts/logout/
///
/// Revokes the supplied refresh token and denylists the presented access
/// token. Revoking an already-revoked token still returns 200.
#[utoipa::path(
    post,
    path = "/api/accounts/logout/",
    request_body = LogoutRequest,
    responses(
        (status = 200, description = "Logged out"),
        (status = 401, description = "Missing or invalid access token"),
    ),
    tag = "accounts"
)]
pub async fn logout(
    State(ctx): State<Arc<AppContext>>,
    user: AuthenticatedUser,
    Json(request): Json<LogoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut sessions = ctx.sessions.lock().await;

    if request.all_devices {
        if let Err(e) = sessions
            .revoke_all_user_tokens(&user.user_id.to_string())
            .await
        {
            tracing::error!(error = %e, "Failed to revoke all user tokens");
            // Continue anyway
        }
    } else if let Some(refresh) = &request.refresh {
        // An invalid or foreign refresh token is ignored rather than failed:
        // logout stays idempotent
        if let Ok(claims) = ctx.auth_manager.verify_token(refresh) {
            if claims.sub == user.user_id.to_string() {
                if let Err(e) = sessions.revoke_refresh_token(&claims.jti).await {
                    tracing::error!(error = %e, "Failed to revoke refresh token");
                }
            }
        }
    }

    // The access token dies with the session
    if let Err(e) = sessions
        .revoke_access_token(&user.jti, ctx.auth_manager.access_token_ttl_seconds())
        .await
    {
        tracing::error!(error = %e, "Failed to denylist access token");
    }
    drop(sessions);

    tracing::info!(
        user_hash = %log_safe_id(&user.user_id.to_string(), &ctx.config.logging.hash_salt),
        "User logged out"
    );

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "message": "Logged out successfully"
        })),
    ))
}

/// POST /api/accounts/otp/send/
///
/// Generates a 6-digit OTP with a 5-minute TTL. In debug mode the code is
/// echoed in the response instead of being sent over SMS.
pub async fn send_otp(
    State(ctx): State<Arc<AppContext>>,
    Json(request): Json<SendOtpRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_mobile(&request.mobile).map_err(AppError::Validation)?;

    {
        let mut sessions = ctx.sessions.lock().await;
        match sessions.increment_otp_send_count(&request.mobile).await {
            Ok(count) if count > ctx.config.security.max_otp_sends_per_hour => {
                drop(sessions);
                return Err(AppError::TooManyRequests(
                    "Too many OTP requests, try again later".to_string(),
                ));
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "Failed to track OTP sends");
            }
        }
    }

    let code = format!("{:06}", rand::thread_rng().gen_range(100000..=999999));

    {
        let mut sessions = ctx.sessions.lock().await;
        sessions
            .store_otp(&request.mobile, &code, OTP_TTL_SECONDS)
            .await
            .map_err(AppError::Unknown)?;
    }

    tracing::info!(
        mobile_hash = %log_safe_id(&request.mobile, &ctx.config.logging.hash_salt),
        "OTP generated"
    );

    if ctx.config.debug {
        return Ok((
            StatusCode::OK,
            Json(json!({
                "message": "OTP generated successfully (TEST MODE)",
                "otp": code,
            })),
        ));
    }

    let body = format!("Your NutriTrack OTP is {}. It is valid for 5 minutes.", code);
    ctx.notifier.send_sms(&request.mobile, &body).await?;
    metrics::OTP_SMS_SENT_TOTAL.inc();

    Ok((
        StatusCode::OK,
        Json(json!({ "message": "OTP sent successfully" })),
    ))
}

/// POST /api/accounts/otp/verify/
///
/// Verifies the single-use OTP, creating the user on first login. Records
/// login history and prunes entries older than 7 days.
pub async fn verify_otp(
    State(ctx): State<Arc<AppContext>>,
    Json(request): Json<VerifyOtpRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_mobile(&request.mobile).map_err(AppError::Validation)?;

    let matched = {
        let mut sessions = ctx.sessions.lock().await;
        sessions
            .take_otp(&request.mobile, &request.otp)
            .await
            .map_err(AppError::Unknown)?
    };

    if !matched {
        return Err(AppError::Validation("Invalid or expired OTP".to_string()));
    }

    let (user, is_new_user) = db::get_or_create_user_by_mobile(&ctx.db_pool, &request.mobile).await?;

    db::record_login(&ctx.db_pool, &user.id, &request.mobile, is_new_user).await?;
    if let Err(e) = db::prune_login_history(&ctx.db_pool, 7).await {
        tracing::error!(error = %e, "Failed to prune login history");
    }

    tracing::info!(
        user_hash = %log_safe_id(&user.id.to_string(), &ctx.config.logging.hash_salt),
        is_new_user,
        "OTP login"
    );
    metrics::LOGINS_TOTAL.inc();

    let pair = issue_token_pair(&ctx, &user.id).await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "access": pair.access,
            "refresh": pair.refresh,
            "expires_at": pair.expires_at,
            "is_new_user": is_new_user,
            "onboarding_completed": user.onboarding_completed,
        })),
    ))
}
