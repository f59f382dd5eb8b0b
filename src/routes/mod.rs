// ============================================================================
// Axum Routes Module
// ============================================================================
//
// Structure:
// - mod.rs: Router assembly, middleware stack, OpenAPI document
// - auth.rs: Registration, login, token refresh/logout, OTP flow
// - account.rs: Current-user info and account deletion
// - profile.rs: Profile, onboarding, app settings
// - meals.rs: Meal log
// - dashboard.rs: Nutrition dashboards
// - recommendations.rs: AI meal recommendations
// - health.rs: Health check and metrics endpoints
// - extractors.rs: AuthenticatedUser JWT extractor
// - middleware.rs: Request logging, security headers
//
// ============================================================================

mod account;
mod auth;
mod dashboard;
mod extractors;
mod health;
mod meals;
mod middleware;
mod profile;
mod recommendations;

use axum::{
    routing::{delete, get, patch, post},
    Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::context::AppContext;

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register,
        auth::login,
        auth::refresh_token,
        auth::logout,
        profile::get_profile,
        profile::update_profile,
    ),
    components(schemas(
        auth::RegisterRequest,
        auth::LoginRequest,
        auth::AuthTokensResponse,
        auth::RefreshTokenRequest,
        auth::RefreshTokenResponse,
        auth::LogoutRequest,
        auth::SendOtpRequest,
        auth::VerifyOtpRequest,
        profile::UpdateProfileRequest,
        profile::UpdateSettingsRequest,
        meals::AddMealRequest,
    )),
    tags(
        (name = "accounts", description = "Authentication and profile management")
    )
)]
struct ApiDoc;

/// GET /api/schema/
async fn openapi_schema() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Create the main application router with all routes
pub fn create_router(app_context: Arc<AppContext>) -> Router {
    Router::new()
        // Health and monitoring
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics_endpoint))
        .route("/api/schema/", get(openapi_schema))
        // Accounts
        .route("/api/accounts/register/", post(auth::register))
        .route("/api/accounts/login/", post(auth::login))
        .route("/api/accounts/token/refresh/", post(auth::refresh_token))
        .route("/api/accounts/logout/", post(auth::logout))
        .route("/api/accounts/otp/send/", post(auth::send_otp))
        .route("/api/accounts/otp/verify/", post(auth::verify_otp))
        .route("/api/accounts/me/", get(account::me))
        .route("/api/accounts/", delete(account::delete_account))
        // Profile and onboarding
        .route(
            "/api/accounts/profile/",
            get(profile::get_profile)
                .put(profile::update_profile)
                .patch(profile::update_profile),
        )
        .route(
            "/api/accounts/onboarding/options/",
            get(profile::onboarding_options),
        )
        .route(
            "/api/accounts/onboarding/complete/",
            post(profile::onboarding_complete),
        )
        .route(
            "/api/accounts/settings/",
            get(profile::get_settings).put(profile::update_settings),
        )
        // Meal log
        .route("/api/meals/categories/", get(meals::meal_categories))
        .route("/api/meals/day/", get(meals::day_meals))
        .route("/api/meals/", post(meals::add_meal))
        .route("/api/meals/:entry_id/", delete(meals::remove_meal))
        .route(
            "/api/meals/:entry_id/eaten/",
            patch(meals::toggle_meal_eaten),
        )
        // Recommendations
        .route(
            "/api/meals/recommendations/",
            get(recommendations::meal_recommendations),
        )
        // Dashboards
        .route("/api/dashboard/today/", get(dashboard::today))
        .route("/api/dashboard/weekly/", get(dashboard::weekly))
        .route("/api/dashboard/monthly/", get(dashboard::monthly))
        .route(
            "/api/dashboard/calories-trend/",
            get(dashboard::calories_trend),
        )
        // Middleware (order matters - last added runs first)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn(middleware::request_logging))
                .layer(axum::middleware::from_fn(middleware::add_security_headers))
                .into_inner(),
        )
        .with_state(app_context)
}
