//! REST backend for the NutriTrack diet app.
//!
//! Authentication (password and SMS-OTP) issues revocable JWT pairs;
//! profiles, meal logs, and nutrition summaries live in Postgres; ephemeral
//! token/OTP state lives in Redis; meal recommendations are delegated to an
//! OpenAI-compatible chat-completion endpoint.

pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod metrics;
pub mod notifier;
pub mod nutrition;
pub mod recommender;
pub mod routes;
pub mod sessions;
pub mod utils;

use anyhow::Result;
use std::sync::Arc;

use crate::auth::AuthManager;
use crate::config::Config;
use crate::context::AppContext;
use crate::notifier::SmsNotifier;
use crate::recommender::MealRecommender;
use crate::sessions::SessionStore;

/// Builds the shared application context from configuration.
pub async fn build_context(config: Config) -> Result<Arc<AppContext>> {
    let db_pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations").run(&db_pool).await?;
    tracing::info!("Migrations applied");

    let sessions = SessionStore::new(&config).await?;
    tracing::info!("Connected to Redis");

    let auth_manager = AuthManager::new(&config.auth);
    let recommender = MealRecommender::new(config.ai.clone())?;
    let notifier = SmsNotifier::new(config.sms.clone())?;

    if !recommender.is_configured() {
        tracing::warn!("OPENAI_API_KEY not set - meal recommendations unavailable");
    }
    if !notifier.is_enabled() {
        tracing::info!("Twilio credentials not set - SMS delivery disabled");
    }

    Ok(Arc::new(AppContext::new(
        db_pool,
        sessions,
        auth_manager,
        recommender,
        notifier,
        config,
    )))
}

/// Runs the HTTP server until the listener fails.
pub async fn run_server(
    context: Arc<AppContext>,
    listener: tokio::net::TcpListener,
) -> Result<()> {
    let router = routes::create_router(context);
    axum::serve(listener, router).await?;
    Ok(())
}
